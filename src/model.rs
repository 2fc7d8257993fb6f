//! The core data model: a `Reaction` is an ordered (reactants, products,
//! conditions) tuple keyed by a stable string id, with a source document
//! for provenance. See spec §3.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reaction {
    pub idx: String,
    pub reactants: Vec<String>,
    pub products: Vec<String>,
    pub conditions: String,
    pub source: String,
}

impl Reaction {
    /// Lower-cases every reactant/product name in place (spec: "Names are
    /// lowercased on ingest").
    pub fn normalize_case(&mut self) {
        for name in self.reactants.iter_mut().chain(self.products.iter_mut()) {
            *name = name.to_lowercase();
        }
    }

    /// A reaction must not simultaneously consume and produce the same
    /// substance (spec §3 invariant: `reactants ∩ products = ∅`).
    pub fn is_well_formed(&self) -> bool {
        !self
            .reactants
            .iter()
            .any(|r| self.products.iter().any(|p| p == r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reaction(reactants: &[&str], products: &[&str]) -> Reaction {
        Reaction {
            idx: "1".to_string(),
            reactants: reactants.iter().map(|s| s.to_string()).collect(),
            products: products.iter().map(|s| s.to_string()).collect(),
            conditions: String::new(),
            source: "d1".to_string(),
        }
    }

    #[test]
    fn test_normalize_case() {
        let mut r = reaction(&["Benzene", "HNO3"], &["Nitrobenzene"]);
        r.normalize_case();
        assert_eq!(r.reactants, vec!["benzene", "hno3"]);
        assert_eq!(r.products, vec!["nitrobenzene"]);
    }

    #[test]
    fn test_well_formed_disjoint() {
        let r = reaction(&["a", "b"], &["c"]);
        assert!(r.is_well_formed());
    }

    #[test]
    fn test_not_well_formed_overlap() {
        let r = reaction(&["a", "b"], &["a"]);
        assert!(!r.is_well_formed());
    }
}
