//! External collaborators: document acquisition, name/structure
//! resolution, and the compound availability registry. The core (RS, TE,
//! PE, EC, EA, AO, NR) depends only on the trait interfaces defined in
//! their owning modules (`availability::RegistryBackend`,
//! `resolver::ResolverBackend`, `expansion::DocumentSource`,
//! `expansion::ReactionExtractor`); these are one concrete wiring of
//! those interfaces against real services, kept deliberately thin since
//! the spec treats them as out of scope beyond the interface they expose.
pub mod compound_registry;
pub mod name_resolvers;
pub mod paper;
pub mod patent;
pub mod pdf;
