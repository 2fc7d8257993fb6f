//! Entity Aligner (EA): canonicalizes substance names across documents so
//! the tree engine and pathway enumerator see one name per structural
//! entity. See spec §4.4.
//!
//! Three independent passes, each optional and composable:
//! - structural alignment, grouping names that resolve to the same NR key
//! - synonym alignment, grouping names an LLM judges to name one substance
//! - root alignment, rewriting every target-referring name in a document
//!   to the pipeline's canonical target string
use crate::llm::CachedLlm;
use crate::model::Reaction;
use crate::resolver::NameResolver;
use std::collections::{HashMap, HashSet};

/// Collects every reactant/product name in `reactions`, deduplicated but
/// preserving first-seen order, so passes that need a canonical
/// "first member" of a group (spec.md: "choose a canonical representative
/// (the first member)") can rely on the order substances are returned in.
fn ordered_substance_names(reactions: &[Reaction]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for reaction in reactions {
        for name in reaction.reactants.iter().chain(reaction.products.iter()) {
            if seen.insert(name.clone()) {
                names.push(name.clone());
            }
        }
    }
    names
}

/// Rewrites every reactant/product name in `reactions` through `rename`,
/// leaving names absent from the map untouched.
fn apply_rename(reactions: &mut [Reaction], rename: &HashMap<String, String>) {
    for reaction in reactions.iter_mut() {
        for name in reaction.reactants.iter_mut().chain(reaction.products.iter_mut()) {
            if let Some(canonical) = rename.get(name) {
                *name = canonical.clone();
            }
        }
    }
}

/// Pass 1: groups substance names that resolve to the same structural
/// key and rewrites every member of a group to its canonical
/// representative, the first member encountered when walking `reactions`
/// in order (spec.md: "choose a canonical representative (the first
/// member)") — not the lexicographically smallest, which is a different
/// and unspecified rule.
pub async fn structural_align(reactions: &mut [Reaction], resolver: &mut NameResolver<'_>) {
    let names = ordered_substance_names(reactions);
    let mut by_key: HashMap<String, Vec<String>> = HashMap::new();
    for name in names {
        let key = resolver.to_key(&name).await;
        by_key.entry(key).or_default().push(name);
    }

    let mut rename = HashMap::new();
    for group in by_key.into_values() {
        if group.len() < 2 {
            continue;
        }
        let canonical = group[0].clone();
        for name in group.into_iter().skip(1) {
            rename.insert(name, canonical.clone());
        }
    }
    apply_rename(reactions, &rename);
}

/// Parses the LLM's synonym-clustering response, shaped as repeated
/// pairs of lines:
///
/// ```text
/// Different names for the same substance: name a, name b, name c
/// Standardized name: name a
/// ```
///
/// into a `name -> standardized name` map, dropping identity mappings.
pub fn parse_synonym_clusters(response: &str) -> HashMap<String, String> {
    let mut rename = HashMap::new();
    let mut pending_names: Option<Vec<String>> = None;

    for line in response.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Different names for the same substance:") {
            pending_names = Some(
                rest.trim()
                    .split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect(),
            );
        } else if let Some(rest) = line.strip_prefix("Standardized name:") {
            let standardized = rest.trim().to_lowercase();
            if let Some(names) = pending_names.take() {
                for name in names {
                    if name != standardized {
                        rename.insert(name, standardized.clone());
                    }
                }
            }
        }
    }
    rename
}

/// Pass 2: asks the LLM to cluster substance names that are synonyms for
/// one substance and rewrites every cluster member to its standardized
/// name. The call is cached under `cache_key` so a re-run replays the
/// same clustering rather than re-querying.
pub async fn synonym_align(
    reactions: &mut [Reaction],
    llm: &mut CachedLlm<'_>,
    cache_key: &str,
    prompt_template: impl Fn(&[String]) -> String,
) -> crate::error::Result<()> {
    let mut names = ordered_substance_names(reactions);
    names.sort();
    if names.is_empty() {
        return Ok(());
    }
    let prompt = prompt_template(&names);
    let response = llm.complete(cache_key, &prompt).await?;
    let rename = parse_synonym_clusters(&response);
    apply_rename(reactions, &rename);
    Ok(())
}

/// Root alignment: for one document's raw reaction-extraction text,
/// rewrites every name that refers to `material` (the pipeline's target
/// substance) to a single canonical spelling, before that text is parsed
/// into `Reaction`s at all. Cached per document id so a re-run never
/// re-issues the rewrite for a document already processed.
pub async fn align_root_node(
    llm: &mut CachedLlm<'_>,
    document_id: &str,
    material: &str,
    reactions_text: &str,
    prompt_template: impl Fn(&str, &str) -> String,
) -> crate::error::Result<String> {
    let prompt = prompt_template(material, reactions_text);
    llm.complete(document_id, &prompt).await
}
