//! Reaction Store (RS): the authoritative mapping from reaction ids to
//! reactant/product/condition/source tuples, plus the derived reverse
//! index `product_index: name -> set<idx>`. See spec §4.3.
use crate::error::{RetroSynError, Result};
use crate::model::Reaction;
use log::warn;
use std::collections::{HashMap, HashSet};

/// The single source of truth shared by the aligner, tree engine, pathway
/// enumerator, and expansion controller. `product_index` is derived state
/// and is never exposed for direct mutation — it is recomputed whenever
/// the forward table changes (Design Notes: "ownership of mutable state").
#[derive(Debug, Default, Clone)]
pub struct ReactionStore {
    reactions: HashMap<String, Reaction>,
    product_index: HashMap<String, HashSet<String>>,
}

impl ReactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a batch of reactions into the store. Colliding ids are last
    /// write wins. The reverse index is rebuilt once after the whole batch
    /// lands, never mid-merge (spec §5 ordering guarantee).
    pub fn add_reactions(&mut self, batch: Vec<Reaction>) {
        for mut reaction in batch {
            reaction.normalize_case();
            self.reactions.insert(reaction.idx.clone(), reaction);
        }
        self.rebuild_product_index();
    }

    fn rebuild_product_index(&mut self) {
        let mut index: HashMap<String, HashSet<String>> = HashMap::new();
        for reaction in self.reactions.values() {
            for product in &reaction.products {
                index
                    .entry(product.clone())
                    .or_default()
                    .insert(reaction.idx.clone());
            }
        }
        self.product_index = index;
    }

    pub fn get(&self, idx: &str) -> Option<&Reaction> {
        self.reactions.get(idx)
    }

    /// Reaction ids known to produce `name`, in a stable order (sorted by
    /// id) so tree construction is deterministic across runs.
    pub fn producers(&self, name: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .product_index
            .get(name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn iterate(&self) -> impl Iterator<Item = &Reaction> {
        self.reactions.values()
    }

    pub fn len(&self) -> usize {
        self.reactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reactions.is_empty()
    }

    /// Projects the store down to exactly the reactions named in `allowed`
    /// (used by the optional reaction filter, spec §4.8).
    pub fn project(&self, allowed: &HashSet<String>) -> ReactionStore {
        let mut projected = ReactionStore::new();
        let batch = self
            .reactions
            .values()
            .filter(|r| allowed.contains(&r.idx))
            .cloned()
            .collect();
        projected.add_reactions(batch);
        projected
    }

    /// Parses the line-structured reaction-extraction output (spec §6)
    /// into a batch of reactions. Malformed blocks are dropped, logging
    /// the source document id, rather than aborting the whole batch
    /// (spec §7 "Parse failure").
    pub fn parse_text(blob: &str, default_source: &str) -> Vec<Reaction> {
        let mut reactions = Vec::new();
        for block in split_blocks(blob) {
            match parse_block(&block, default_source) {
                Ok(reaction) => reactions.push(reaction),
                Err(e) => warn!(
                    "dropping unparsable reaction block from document '{}': {}",
                    default_source, e
                ),
            }
        }
        reactions
    }
}

fn split_blocks(blob: &str) -> Vec<String> {
    blob.split("\n\n")
        .map(|b| b.trim())
        .filter(|b| !b.is_empty())
        .map(|b| b.to_string())
        .collect()
}

fn parse_block(block: &str, default_source: &str) -> Result<Reaction> {
    let mut idx = None;
    let mut reactants = None;
    let mut products = None;
    let mut conditions = String::new();
    let mut source = None;

    for line in block.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Reaction idx:") {
            idx = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("Reactants:") {
            reactants = Some(split_names(rest));
        } else if let Some(rest) = line.strip_prefix("Products:") {
            products = Some(split_names(rest));
        } else if let Some(rest) = line.strip_prefix("Conditions:") {
            conditions = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("Source:") {
            source = Some(rest.trim().to_string());
        }
    }

    let idx = idx.ok_or_else(|| RetroSynError::ReactionParseError {
        reason: "missing 'Reaction idx:' line".to_string(),
    })?;
    let reactants = reactants.ok_or_else(|| RetroSynError::ReactionParseError {
        reason: format!("reaction {idx} missing 'Reactants:' line"),
    })?;
    let products = products.ok_or_else(|| RetroSynError::ReactionParseError {
        reason: format!("reaction {idx} missing 'Products:' line"),
    })?;
    // Source is optional; RS fills it in from the document id if absent.
    let source = source.unwrap_or_else(|| default_source.to_string());

    let mut reaction = Reaction {
        idx,
        reactants,
        products,
        conditions,
        source,
    };
    reaction.normalize_case();
    if !reaction.is_well_formed() {
        return Err(RetroSynError::ReactionParseError {
            reason: format!(
                "reaction {} consumes and produces the same substance",
                reaction.idx
            ),
        });
    }
    Ok(reaction)
}

fn split_names(field: &str) -> Vec<String> {
    field
        .trim()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
