//! Availability Oracle (AO): decides whether a substance counts as a
//! purchasable/available starting material, terminating tree expansion.
//! See spec §4.1.
use crate::cache::JsonCache;
use crate::error::Result;
use log::{info, warn};
use std::collections::HashSet;
use std::time::Duration;

const MAX_RETRIES: u32 = 3;
const BASE_DELAY: Duration = Duration::from_secs(2);

/// A remote lookup for whether a structural key is a known, obtainable
/// compound (e.g. a compound registry search). `Ok(false)` is a confident
/// negative; `Err` signals a transient failure worth retrying.
#[async_trait::async_trait]
pub trait RegistryBackend: Send + Sync {
    async fn is_registered(&self, structural_key: &str) -> Result<bool>;
}

/// The builtin inventory: a small set of substances considered available
/// without ever touching the network, grounded in the original corpus's
/// polymer list plus its emol reagent catalog.
pub fn builtin_inventory() -> HashSet<String> {
    const POLYMERS: &[&str] = &[
        "polyethylene",
        "polypropylene",
        "polystyrene",
        "polyvinyl chloride",
        "polyethylene terephthalate",
        "polytetrafluoroethylene",
        "polycarbonate",
        "poly(methyl methacrylate)",
        "polyurethane",
        "polyamide",
        "polyvinyl acetate",
        "polybutadiene",
        "polychloroprene",
        "poly(acrylonitrile-butadiene-styrene)",
        "polyoxymethylene",
        "polylactic acid",
        "polyethylene glycol",
        "poly(vinyl alcohol)",
        "polyacrylamide",
        "polyethylene oxide",
        "poly(ethylene-co-vinyl acetate)",
    ];
    let mut set: HashSet<String> = POLYMERS.iter().map(|s| s.to_string()).collect();
    set.insert("2-chlorotrifluoromethylbenzene".to_string());
    set
}

pub struct AvailabilityOracle<'a> {
    cache: JsonCache<bool>,
    inventory: HashSet<String>,
    registry: &'a dyn RegistryBackend,
}

impl<'a> AvailabilityOracle<'a> {
    pub fn new(cache_path: impl Into<std::path::PathBuf>, registry: &'a dyn RegistryBackend) -> Result<Self> {
        Ok(Self {
            cache: JsonCache::load(cache_path)?,
            inventory: builtin_inventory(),
            registry,
        })
    }

    /// Adds extra entries to the builtin inventory (used by tests and by
    /// callers that seed a known local reagent list).
    pub fn extend_inventory(&mut self, extra: impl IntoIterator<Item = String>) {
        self.inventory.extend(extra);
    }

    /// Determines availability for `name`, memoized on the input name (not
    /// the resolved structural key), since the same raw name always maps
    /// to the same resolved key and the lookup is otherwise pure.
    pub async fn is_available(&mut self, name: &str, structural_key: &str) -> bool {
        if let Some(cached) = self.cache.get(name) {
            return *cached;
        }

        let result = if self.inventory.contains(structural_key) {
            info!("'{}' resolved via builtin inventory", name);
            true
        } else {
            self.query_registry_with_retry(structural_key).await
        };

        if let Err(e) = self.cache.insert(name.to_string(), result) {
            warn!("failed to persist availability cache entry for '{}': {}", name, e);
        }
        result
    }

    /// Queries the remote registry with up to `MAX_RETRIES` attempts.
    /// Transient (transport/IO) errors back off exponentially; any other
    /// error backs off at a constant delay. Exhausting all attempts
    /// degrades to `false` rather than propagating the error, matching
    /// the oracle's "never block the tree on a flaky network" contract.
    async fn query_registry_with_retry(&self, structural_key: &str) -> bool {
        let mut attempt = 0;
        loop {
            match self.registry.is_registered(structural_key).await {
                Ok(found) => return found,
                Err(e) => {
                    attempt += 1;
                    if attempt >= MAX_RETRIES {
                        warn!(
                            "registry lookup for '{}' failed after {} attempts: {}",
                            structural_key, attempt, e
                        );
                        return false;
                    }
                    let delay = if e.is_transient() {
                        BASE_DELAY * (attempt + 1)
                    } else {
                        BASE_DELAY
                    };
                    warn!(
                        "registry lookup for '{}' failed (attempt {}/{}): {}, retrying in {:?}",
                        structural_key, attempt, MAX_RETRIES, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RetroSynError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::tempdir;

    struct AlwaysTrue;
    #[async_trait::async_trait]
    impl RegistryBackend for AlwaysTrue {
        async fn is_registered(&self, _key: &str) -> Result<bool> {
            Ok(true)
        }
    }

    struct AlwaysFalse;
    #[async_trait::async_trait]
    impl RegistryBackend for AlwaysFalse {
        async fn is_registered(&self, _key: &str) -> Result<bool> {
            Ok(false)
        }
    }

    struct FlakyThenSucceeds {
        calls: AtomicU32,
        fail_until: u32,
    }
    #[async_trait::async_trait]
    impl RegistryBackend for FlakyThenSucceeds {
        async fn is_registered(&self, _key: &str) -> Result<bool> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_until {
                return Err(RetroSynError::IoError(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "simulated transient failure",
                )));
            }
            Ok(true)
        }
    }

    struct AlwaysFails;
    #[async_trait::async_trait]
    impl RegistryBackend for AlwaysFails {
        async fn is_registered(&self, _key: &str) -> Result<bool> {
            Err(RetroSynError::IoError(std::io::Error::other("down")))
        }
    }

    #[tokio::test]
    async fn test_builtin_inventory_skips_network() {
        let dir = tempdir().unwrap();
        let registry = AlwaysFails;
        let mut ao = AvailabilityOracle::new(dir.path().join("ao.json"), &registry).unwrap();
        assert!(ao.is_available("polyethylene", "polyethylene").await);
    }

    #[tokio::test]
    async fn test_registry_hit_returns_true() {
        let dir = tempdir().unwrap();
        let registry = AlwaysTrue;
        let mut ao = AvailabilityOracle::new(dir.path().join("ao.json"), &registry).unwrap();
        assert!(ao.is_available("water", "O").await);
    }

    #[tokio::test]
    async fn test_registry_miss_returns_false() {
        let dir = tempdir().unwrap();
        let registry = AlwaysFalse;
        let mut ao = AvailabilityOracle::new(dir.path().join("ao.json"), &registry).unwrap();
        assert!(!ao.is_available("unobtainium", "Xx").await);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let dir = tempdir().unwrap();
        let registry = FlakyThenSucceeds {
            calls: AtomicU32::new(0),
            fail_until: 2,
        };
        let mut ao = AvailabilityOracle::new(dir.path().join("ao.json"), &registry).unwrap();
        assert!(ao.is_available("flaky", "F").await);
        assert_eq!(registry.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_degrade_to_false() {
        let dir = tempdir().unwrap();
        let registry = AlwaysFails;
        let mut ao = AvailabilityOracle::new(dir.path().join("ao.json"), &registry).unwrap();
        assert!(!ao.is_available("mystery", "M").await);
    }

    #[tokio::test]
    async fn test_result_is_memoized_by_input_name() {
        let dir = tempdir().unwrap();
        let registry = FlakyThenSucceeds {
            calls: AtomicU32::new(0),
            fail_until: 0,
        };
        let mut ao = AvailabilityOracle::new(dir.path().join("ao.json"), &registry).unwrap();
        assert!(ao.is_available("water", "O").await);
        assert!(ao.is_available("water", "O").await);
        assert_eq!(registry.calls.load(Ordering::SeqCst), 1);
    }
}
