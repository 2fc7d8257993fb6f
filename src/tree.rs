//! Tree Engine (TE): recursively decomposes a target substance into a
//! retrosynthesis tree of producible precursors, stopping at substances
//! the Availability Oracle calls available or that the Reaction Store has
//! no producers for. See spec §4.5.
use crate::availability::AvailabilityOracle;
use crate::resolver::NameResolver;
use crate::store::ReactionStore;
use async_recursion::async_recursion;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One substance in the tree. `ancestor_set` is derived state: the set of
/// substance names on the path from the root down to (but excluding)
/// this node, used only for cycle detection during construction. It is
/// never serialized (see `Tree::from_snapshot`) since it is cheap to
/// recompute and storing it would duplicate the parent chain already
/// implied by tree structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub substance: String,
    pub reaction_index: Option<String>,
    pub reaction_line: Vec<String>,
    #[serde(skip, default)]
    pub ancestor_set: HashSet<String>,
    pub is_leaf: bool,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn root(substance: String) -> Self {
        Self {
            substance,
            reaction_index: None,
            reaction_line: Vec::new(),
            ancestor_set: HashSet::new(),
            is_leaf: false,
            children: Vec::new(),
        }
    }

    fn child_of(parent: &TreeNode, substance: String, reaction_idx: String) -> Self {
        let mut ancestor_set = parent.ancestor_set.clone();
        ancestor_set.insert(parent.substance.clone());
        let mut reaction_line = parent.reaction_line.clone();
        reaction_line.push(reaction_idx.clone());
        Self {
            substance,
            reaction_index: Some(reaction_idx),
            reaction_line,
            ancestor_set,
            is_leaf: false,
            children: Vec::new(),
        }
    }

    /// Removes every child produced by `reaction_idx`, including ones
    /// appended earlier in the same reaction's reactant list. Called when
    /// one reactant of a reaction would close a cycle back to an
    /// ancestor: the whole reaction is invalid as a decomposition step,
    /// not just the offending reactant (spec invariant: atomic removal).
    fn remove_children_by_reaction(&mut self, reaction_idx: &str) {
        self.children
            .retain(|c| c.reaction_index.as_deref() != Some(reaction_idx));
    }

    fn count_nodes(&self) -> usize {
        1 + self.children.iter().map(TreeNode::count_nodes).sum::<usize>()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub target_substance: String,
    pub root: TreeNode,
    /// Substances visited during construction that have no producing
    /// reaction and are not available (spec's unexpandable set U).
    pub unexpandable: HashSet<String>,
}

impl Tree {
    /// Builds the full retrosynthesis tree for `target` against the
    /// current contents of `store`.
    pub async fn build(
        target: &str,
        store: &ReactionStore,
        ao: &mut AvailabilityOracle<'_>,
        resolver: &mut NameResolver<'_>,
    ) -> Tree {
        let mut root = TreeNode::root(target.to_string());
        let mut unexpandable = HashSet::new();
        expand(&mut root, store, ao, resolver, &mut unexpandable).await;
        Tree {
            target_substance: target.to_string(),
            root,
            unexpandable,
        }
    }

    pub fn node_count(&self) -> usize {
        self.root.count_nodes()
    }

    /// Reconstructs a tree loaded from a snapshot that omitted
    /// `ancestor_set` fields, by walking the tree top-down and rebuilding
    /// each node's ancestor set from its parent, exactly as construction
    /// would have produced it (spec §6: "parent pointers reconstructed on
    /// load, never serialized directly").
    pub fn from_snapshot(target_substance: String, mut root: TreeNode, unexpandable: HashSet<String>) -> Tree {
        rebuild_ancestor_sets(&mut root, &HashSet::new());
        Tree {
            target_substance,
            root,
            unexpandable,
        }
    }
}

fn rebuild_ancestor_sets(node: &mut TreeNode, parent_ancestors: &HashSet<String>) {
    node.ancestor_set = parent_ancestors.clone();
    let mut child_ancestors = parent_ancestors.clone();
    child_ancestors.insert(node.substance.clone());
    for child in node.children.iter_mut() {
        rebuild_ancestor_sets(child, &child_ancestors);
    }
}

/// Recursively expands `node`. Returns `true` if `node` is either
/// available directly or reachable through at least one valid child
/// decomposition; `false` if it is a dead end (spec §4.5 "is_leaf"/"dead
/// end" semantics).
#[async_recursion]
async fn expand(
    node: &mut TreeNode,
    store: &ReactionStore,
    ao: &mut AvailabilityOracle<'_>,
    resolver: &mut NameResolver<'_>,
    unexpandable: &mut HashSet<String>,
) -> bool {
    let key = resolver.to_key(&node.substance).await;
    if ao.is_available(&node.substance, &key).await {
        node.is_leaf = true;
        return true;
    }

    let reaction_idxs = store.producers(&node.substance);
    if reaction_idxs.is_empty() {
        unexpandable.insert(node.substance.clone());
        return false;
    }

    'reactions: for reaction_idx in reaction_idxs {
        let reaction = match store.get(&reaction_idx) {
            Some(r) => r.clone(),
            None => continue,
        };
        for reactant in reaction.reactants.iter().cloned() {
            let child = TreeNode::child_of(node, reactant, reaction_idx.clone());
            let closes_cycle = child.ancestor_set.contains(&child.substance);
            node.children.push(child);
            if closes_cycle {
                node.remove_children_by_reaction(&reaction_idx);
                continue 'reactions;
            }
            let last = node.children.last_mut().expect("just pushed");
            let valid = expand(last, store, ao, resolver, unexpandable).await;
            if !valid {
                node.children.last_mut().expect("just pushed").is_leaf = false;
            }
        }
    }

    !node.children.is_empty()
}
