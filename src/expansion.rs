//! Expansion Controller (EC): when the tree has unexpandable
//! intermediates, fetches additional literature for each, extracts new
//! reactions, and merges them into the store, iterating to a fixed point
//! or an iteration budget. See spec §4.7.
use crate::availability::AvailabilityOracle;
use crate::error::Result;
use crate::resolver::NameResolver;
use crate::store::ReactionStore;
use crate::tree::Tree;
use log::{info, warn};
use std::collections::HashMap;

const MAX_DOCS_PER_SUBSTANCE: usize = 3;
const MAX_ATTEMPTS_PER_SUBSTANCE: u32 = 3;

/// Fetches raw document text for an unexpandable substance. A single call
/// may return fewer documents than requested (exhausted search results);
/// the controller retries up to `MAX_ATTEMPTS_PER_SUBSTANCE` times.
#[async_trait::async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, substance: &str, num_results: u32) -> Result<Vec<String>>;
}

/// Extracts line-structured reaction text (spec §6 format) from one raw
/// document's text.
#[async_trait::async_trait]
pub trait ReactionExtractor: Send + Sync {
    async fn extract(&self, document_text: &str) -> Result<String>;
}

pub struct ExpansionController<'a> {
    max_iter: u32,
    document_source: &'a dyn DocumentSource,
    extractor: &'a dyn ReactionExtractor,
    /// Documents acquired so far for each substance, persisted across
    /// outer `run()` iterations (spec §4.7: "ensure a per-s document
    /// folder exists" — the folder, and its document count, survive
    /// between iterations even though the attempt counter does not).
    doc_counts: HashMap<String, usize>,
}

pub struct ExpansionOutcome {
    pub tree: Tree,
    pub iterations_used: u32,
    pub reached_fixed_point: bool,
}

impl<'a> ExpansionController<'a> {
    pub fn new(max_iter: u32, document_source: &'a dyn DocumentSource, extractor: &'a dyn ReactionExtractor) -> Self {
        Self {
            max_iter,
            document_source,
            extractor,
            doc_counts: HashMap::new(),
        }
    }

    /// Runs the fixed-point loop against `store`, mutating it in place as
    /// new reactions are discovered. Returns the last tree built and
    /// whether the loop ended because the tree was fully expandable
    /// (`reached_fixed_point`) rather than exhausting `max_iter`.
    pub async fn run(
        &mut self,
        target: &str,
        store: &mut ReactionStore,
        ao: &mut AvailabilityOracle<'_>,
        resolver: &mut NameResolver<'_>,
    ) -> ExpansionOutcome {
        let mut iteration = 0;
        loop {
            iteration += 1;
            let tree = Tree::build(target, store, ao, resolver).await;
            let fixed_point = tree.unexpandable.is_empty();

            if fixed_point || iteration >= self.max_iter {
                return ExpansionOutcome {
                    tree,
                    iterations_used: iteration,
                    reached_fixed_point: fixed_point,
                };
            }

            info!(
                "expansion iteration {}: {} unexpandable substances",
                iteration,
                tree.unexpandable.len()
            );
            let len_before = store.len();
            let mut pending: Vec<String> = tree.unexpandable.into_iter().collect();
            pending.sort();
            for substance in pending {
                self.expand_substance(&substance, store).await;
            }
            if store.len() == len_before {
                info!("expansion iteration {}: no new reactions found, stopping early", iteration);
                let tree = Tree::build(target, store, ao, resolver).await;
                let fixed_point = tree.unexpandable.is_empty();
                return ExpansionOutcome {
                    tree,
                    iterations_used: iteration,
                    reached_fixed_point: fixed_point,
                };
            }
        }
    }

    /// Fetches and extracts new reactions for one unexpandable substance,
    /// merging them into `store`. The substance's document count persists
    /// across outer `run()` iterations, but the attempt counter is fresh
    /// on every call: a substance that stayed below `MAX_DOCS_PER_SUBSTANCE`
    /// after one iteration's attempts is retried on the next iteration it
    /// is still unexpandable, exactly as spec §4.7's pseudocode loops
    /// `while documents(s) < 3 and attempts < 3` on every outer pass.
    async fn expand_substance(&mut self, substance: &str, store: &mut ReactionStore) {
        let mut doc_count = *self.doc_counts.get(substance).unwrap_or(&0);
        if doc_count >= MAX_DOCS_PER_SUBSTANCE {
            return;
        }

        let mut documents = Vec::new();
        let mut attempt = 0;
        while doc_count + documents.len() < MAX_DOCS_PER_SUBSTANCE && attempt < MAX_ATTEMPTS_PER_SUBSTANCE {
            attempt += 1;
            match self.document_source.fetch(substance, attempt).await {
                Ok(fetched) => {
                    let remaining = MAX_DOCS_PER_SUBSTANCE - (doc_count + documents.len());
                    if fetched.len() > remaining {
                        info!(
                            "dropping {} document(s) fetched for '{}' beyond the {}-document cap",
                            fetched.len() - remaining,
                            substance,
                            MAX_DOCS_PER_SUBSTANCE
                        );
                    }
                    documents.extend(fetched.into_iter().take(remaining));
                }
                Err(e) => warn!(
                    "document fetch for '{}' failed (attempt {}/{}): {}",
                    substance, attempt, MAX_ATTEMPTS_PER_SUBSTANCE, e
                ),
            }
        }

        doc_count += documents.len();
        self.doc_counts.insert(substance.to_string(), doc_count);

        if documents.is_empty() {
            warn!(
                "failed to acquire any additional literature for '{}' after {} attempts ({}/{} documents so far)",
                substance, MAX_ATTEMPTS_PER_SUBSTANCE, doc_count, MAX_DOCS_PER_SUBSTANCE
            );
            return;
        }

        let mut new_reactions = Vec::new();
        for document_text in documents {
            match self.extractor.extract(&document_text).await {
                Ok(extracted) => new_reactions.extend(ReactionStore::parse_text(&extracted, substance)),
                Err(e) => warn!("reaction extraction failed for a document about '{}': {}", substance, e),
            }
        }
        store.add_reactions(new_reactions);
    }
}
