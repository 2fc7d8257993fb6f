//! Name Resolver (NR): maps free-text substance names to canonical
//! structural keys, with a synchronous disk-backed cache. See spec §4.2.
use crate::cache::JsonCache;
use crate::error::Result;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

/// Matches the structural-string character set. Anything longer than 100
/// characters is never treated as a bare structural string even if every
/// character matches (spec: "length <= 100").
static STRUCTURAL_KEY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9@+\-#()\\/=\[\].%:?]+$").expect("valid structural-key regex"));

const MAX_STRUCTURAL_KEY_LEN: usize = 100;

/// Heuristic bracket-balance check over `()` and `[]`, applied on top of
/// the character-set regex (spec §7: "structural validation of the
/// target input (balanced brackets on structural strings ...):
/// heuristic only"). A string with the right alphabet but mismatched
/// brackets is not a plausible structural key and is routed through NR
/// as a name instead.
fn brackets_balanced(s: &str) -> bool {
    let mut parens = 0i32;
    let mut square = 0i32;
    for c in s.chars() {
        match c {
            '(' => parens += 1,
            ')' => parens -= 1,
            '[' => square += 1,
            ']' => square -= 1,
            _ => {}
        }
        if parens < 0 || square < 0 {
            return false;
        }
    }
    parens == 0 && square == 0
}

pub fn looks_like_structural_key(name: &str) -> bool {
    name.len() <= MAX_STRUCTURAL_KEY_LEN && STRUCTURAL_KEY_REGEX.is_match(name) && brackets_balanced(name)
}

/// A resolver backend queried by name; returns `Ok(None)` for an
/// unambiguous "no match", `Err` for transport/parse failure.
#[async_trait::async_trait]
pub trait ResolverBackend: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<Option<String>>;
}

pub struct NameResolver<'a> {
    cache: JsonCache<String>,
    primary: &'a dyn ResolverBackend,
    fallback: &'a dyn ResolverBackend,
}

impl<'a> NameResolver<'a> {
    pub fn new(
        cache_path: impl Into<std::path::PathBuf>,
        primary: &'a dyn ResolverBackend,
        fallback: &'a dyn ResolverBackend,
    ) -> Result<Self> {
        Ok(Self {
            cache: JsonCache::load(cache_path)?,
            primary,
            fallback,
        })
    }

    /// Resolves `name` to a structural key, consulting (in order): the
    /// structural-shape heuristic, the disk cache, resolver A, resolver B,
    /// and finally falling back to the original name unchanged.
    pub async fn to_key(&mut self, name: &str) -> String {
        if looks_like_structural_key(name) {
            return name.to_string();
        }
        if let Some(cached) = self.cache.get(name) {
            return cached.clone();
        }

        let key = match self.primary.resolve(name).await {
            Ok(Some(key)) => Some(key),
            Ok(None) => None,
            Err(e) => {
                warn!("primary name resolver failed for '{}': {}", name, e);
                None
            }
        };

        let key = match key {
            Some(key) => key,
            None => match self.fallback.resolve(name).await {
                Ok(Some(key)) => key,
                Ok(None) => {
                    info!(
                        "no structural key found for '{}'; using name as degraded key",
                        name
                    );
                    name.to_string()
                }
                Err(e) => {
                    warn!("fallback name resolver failed for '{}': {}", name, e);
                    name.to_string()
                }
            },
        };

        if let Err(e) = self.cache.insert(name.to_string(), key.clone()) {
            warn!("failed to persist name resolver cache entry for '{}': {}", name, e);
        }
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RetroSynError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct Stub {
        response: Option<String>,
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ResolverBackend for Stub {
        async fn resolve(&self, _name: &str) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RetroSynError::LlmResponseFormatError("boom".to_string()));
            }
            Ok(self.response.clone())
        }
    }

    #[test]
    fn test_structural_key_shape() {
        assert!(looks_like_structural_key("CC(=O)OC1=CC=CC=C1C(=O)O"));
        assert!(!looks_like_structural_key("aspirin"));
        assert!(!looks_like_structural_key(&"C".repeat(101)));
    }

    #[test]
    fn test_unbalanced_brackets_rejected() {
        assert!(!looks_like_structural_key("CC(=O)OC1=CC=CC=C1C(=O)O("));
        assert!(!looks_like_structural_key("C[CH3"));
        assert!(!looks_like_structural_key("C)C(C"));
    }

    #[tokio::test]
    async fn test_structural_string_returned_unchanged() {
        let primary = Stub {
            response: None,
            fail: false,
            calls: AtomicUsize::new(0),
        };
        let fallback = Stub {
            response: None,
            fail: false,
            calls: AtomicUsize::new(0),
        };
        let dir = tempdir().unwrap();
        let mut nr = NameResolver::new(dir.path().join("nr.json"), &primary, &fallback).unwrap();
        let key = nr.to_key("CC(=O)O").await;
        assert_eq!(key, "CC(=O)O");
        assert_eq!(primary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_primary_success_used_and_cached() {
        let primary = Stub {
            response: Some("KEY1".to_string()),
            fail: false,
            calls: AtomicUsize::new(0),
        };
        let fallback = Stub {
            response: Some("KEY2".to_string()),
            fail: false,
            calls: AtomicUsize::new(0),
        };
        let dir = tempdir().unwrap();
        let mut nr = NameResolver::new(dir.path().join("nr.json"), &primary, &fallback).unwrap();
        assert_eq!(nr.to_key("aspirin").await, "KEY1");
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
        // second call hits the cache, no further backend calls
        assert_eq!(nr.to_key("aspirin").await, "KEY1");
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_falls_back_to_secondary_on_empty_primary() {
        let primary = Stub {
            response: None,
            fail: false,
            calls: AtomicUsize::new(0),
        };
        let fallback = Stub {
            response: Some("KEY2".to_string()),
            fail: false,
            calls: AtomicUsize::new(0),
        };
        let dir = tempdir().unwrap();
        let mut nr = NameResolver::new(dir.path().join("nr.json"), &primary, &fallback).unwrap();
        assert_eq!(nr.to_key("ibuprofen").await, "KEY2");
    }

    #[tokio::test]
    async fn test_degrades_to_original_name_when_both_fail() {
        let primary = Stub {
            response: None,
            fail: true,
            calls: AtomicUsize::new(0),
        };
        let fallback = Stub {
            response: None,
            fail: true,
            calls: AtomicUsize::new(0),
        };
        let dir = tempdir().unwrap();
        let mut nr = NameResolver::new(dir.path().join("nr.json"), &primary, &fallback).unwrap();
        assert_eq!(nr.to_key("mystery compound").await, "mystery compound");
    }
}
