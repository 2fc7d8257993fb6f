//! Pathway Enumerator (PE): extracts every minimal reaction-id sequence
//! from root to leaves of a built tree. See spec §4.6.
use crate::tree::{Tree, TreeNode};
use std::collections::{HashSet, LinkedList};

/// Enumerates pathways for `tree`: deduplicates reaction ids within each
/// pathway, drops exact-duplicate pathways, then drops any pathway that
/// is a proper superset of another (spec §7 invariant 4: minimality).
pub fn enumerate_pathways(tree: &Tree) -> Vec<Vec<String>> {
    let raw = search_pathways(&tree.root);
    let cleaned: Vec<Vec<String>> = raw.into_iter().map(dedup_preserve_order).collect();
    let deduped = dedup_pathways(cleaned);
    remove_supersets(deduped)
}

/// Post-order traversal: a leaf contributes one empty pathway (nothing
/// left to synthesize). An internal node groups its children by the
/// reaction that produced them, Cartesian-combines the sub-pathways
/// within each group (since a reaction's reactants must all be sourced
/// together), and unions the results across groups (each group is an
/// independent alternative route to this node).
fn search_pathways(node: &TreeNode) -> Vec<Vec<String>> {
    if node.is_leaf {
        return vec![Vec::new()];
    }

    let mut group_order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<Vec<String>>> = std::collections::HashMap::new();

    for child in &node.children {
        let reaction_idx = match &child.reaction_index {
            Some(idx) => idx.clone(),
            None => continue,
        };
        let child_paths = search_pathways(child);

        let entry = groups.entry(reaction_idx.clone());
        match entry {
            std::collections::hash_map::Entry::Vacant(v) => {
                group_order.push(reaction_idx);
                v.insert(child_paths);
            }
            std::collections::hash_map::Entry::Occupied(mut o) => {
                let existing = o.get_mut();
                if is_trivial(existing) {
                    *existing = child_paths;
                } else if !child_paths.is_empty() {
                    let mut combined = Vec::with_capacity(existing.len() * child_paths.len());
                    for prev in existing.iter() {
                        for curr in &child_paths {
                            let mut merged = prev.clone();
                            merged.extend(curr.iter().cloned());
                            combined.push(merged);
                        }
                    }
                    *existing = combined;
                }
            }
        }
    }

    let mut pathways = Vec::new();
    for reaction_idx in group_order {
        if let Some(paths) = groups.remove(&reaction_idx) {
            for path in paths {
                let mut full = vec![reaction_idx.clone()];
                full.extend(path);
                pathways.push(full);
            }
        }
    }
    pathways
}

fn is_trivial(paths: &[Vec<String>]) -> bool {
    paths.len() == 1 && paths[0].is_empty()
}

fn dedup_preserve_order(path: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut result = LinkedList::new();
    for id in path {
        if seen.insert(id.clone()) {
            result.push_back(id);
        }
    }
    result.into_iter().collect()
}

/// Drops pathways whose reaction-id set exactly matches one already kept,
/// preserving the order of first appearance.
fn dedup_pathways(paths: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let mut seen_sets: Vec<HashSet<String>> = Vec::new();
    let mut result = Vec::new();
    for path in paths {
        let set: HashSet<String> = path.iter().cloned().collect();
        if seen_sets.iter().any(|s| *s == set) {
            continue;
        }
        seen_sets.push(set);
        result.push(path);
    }
    result
}

/// Drops any pathway whose reaction-id set is a proper superset of
/// another surviving pathway's set (spec §4.6: "if path A ⊇ path B as
/// sets with A != B, discard A").
fn remove_supersets(paths: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let sets: Vec<HashSet<String>> = paths.iter().map(|p| p.iter().cloned().collect()).collect();
    let mut result = Vec::new();
    for (i, current) in sets.iter().enumerate() {
        let is_proper_superset_of_other = sets
            .iter()
            .enumerate()
            .any(|(j, other)| i != j && current != other && current.is_superset(other));
        if !is_proper_superset_of_other {
            result.push(paths[i].clone());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet as StdHashSet;

    fn leaf(substance: &str, reaction_index: Option<&str>) -> TreeNode {
        TreeNode {
            substance: substance.to_string(),
            reaction_index: reaction_index.map(|s| s.to_string()),
            reaction_line: vec![],
            ancestor_set: StdHashSet::new(),
            is_leaf: true,
            children: vec![],
        }
    }

    fn internal(substance: &str, reaction_index: Option<&str>, children: Vec<TreeNode>) -> TreeNode {
        TreeNode {
            substance: substance.to_string(),
            reaction_index: reaction_index.map(|s| s.to_string()),
            reaction_line: vec![],
            ancestor_set: StdHashSet::new(),
            is_leaf: false,
            children,
        }
    }

    fn tree_from(root: TreeNode) -> Tree {
        Tree {
            target_substance: root.substance.clone(),
            root,
            unexpandable: StdHashSet::new(),
        }
    }

    #[test]
    fn test_single_leaf_target_has_empty_pathway() {
        let mut root = leaf("target", None);
        root.is_leaf = true;
        let tree = tree_from(root);
        let pathways = enumerate_pathways(&tree);
        assert_eq!(pathways, vec![Vec::<String>::new()]);
    }

    #[test]
    fn test_one_reaction_two_reactants_combined() {
        let root = internal(
            "target",
            None,
            vec![leaf("a", Some("1")), leaf("b", Some("1"))],
        );
        let tree = tree_from(root);
        let pathways = enumerate_pathways(&tree);
        assert_eq!(pathways, vec![vec!["1".to_string()]]);
    }

    #[test]
    fn test_two_alternative_reactions_union() {
        let root = internal(
            "target",
            None,
            vec![leaf("a", Some("1")), leaf("b", Some("2"))],
        );
        let tree = tree_from(root);
        let mut pathways = enumerate_pathways(&tree);
        pathways.sort();
        assert_eq!(pathways, vec![vec!["1".to_string()], vec!["2".to_string()]]);
    }

    #[test]
    fn test_superset_pathway_removed() {
        // route via reaction "1" alone reaches a leaf (minimal);
        // route via reaction "3" requires both "1" and "2" (superset) and must be dropped.
        let via_one = leaf("x", Some("1"));
        let via_two_from_three = internal("y", Some("2"), vec![leaf("c", Some("1"))]);
        let root = internal(
            "target",
            None,
            vec![via_one.clone(), internal("z", Some("3"), vec![via_two_from_three])],
        );
        let _ = via_one;
        let tree = tree_from(root);
        let pathways = enumerate_pathways(&tree);
        assert!(pathways.contains(&vec!["1".to_string()]));
        assert!(!pathways.iter().any(|p| {
            let set: StdHashSet<&String> = p.iter().collect();
            set.contains(&"3".to_string()) && set.contains(&"1".to_string())
        }));
    }

    #[test]
    fn test_dedup_within_path_removes_repeats() {
        // reaction "1" appears in two disjoint branches of the same overall pathway
        let branch_a = leaf("a", Some("1"));
        let branch_b = internal("mid", Some("2"), vec![leaf("c", Some("1"))]);
        let root = internal("target", None, vec![branch_a, branch_b]);
        let tree = tree_from(root);
        let pathways = enumerate_pathways(&tree);
        assert!(pathways.iter().any(|p| {
            let mut sorted = p.clone();
            sorted.sort();
            sorted.dedup();
            sorted.len() == p.len()
        }));
    }

    #[test]
    fn test_dead_end_child_contributes_no_pathway() {
        let mut dead_end = leaf("ghost", Some("9"));
        dead_end.is_leaf = false;
        let root = internal("target", None, vec![dead_end]);
        let tree = tree_from(root);
        let pathways = enumerate_pathways(&tree);
        assert!(pathways.is_empty());
    }
}
