//! Optional Filtration stage: an LLM-driven post-processing pass that
//! narrows the reactions kept in a tree, and separately narrows the
//! enumerated pathways, to the ones an LLM judges chemically sound. See
//! spec §4.8. Disabled by default (CLI `--filtration False`); every call
//! here is replayed from disk on a re-run via `CachedLlm`.
use crate::llm::CachedLlm;
use crate::model::Reaction;
use crate::store::ReactionStore;
use crate::tree::{Tree, TreeNode};
use std::collections::HashSet;

pub fn render_reaction_block(idx: &str, reaction: &Reaction) -> String {
    format!(
        "Reaction idx: {}\nReactants: {}\nProducts: {}\nConditions: {}\nSource: {}\n",
        idx,
        reaction.reactants.join(", "),
        reaction.products.join(", "),
        reaction.conditions,
        reaction.source,
    )
}

/// Collects every reaction id referenced anywhere in `tree` and renders
/// them in tree order, matching the original pipeline's
/// `get_reactions_in_tree`.
pub fn render_reactions_in_tree(tree: &Tree, store: &ReactionStore) -> String {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    collect_reaction_ids(&tree.root, &mut seen, &mut ordered);

    ordered
        .into_iter()
        .filter_map(|idx| store.get(&idx).map(|r| render_reaction_block(&idx, r)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_reaction_ids(node: &TreeNode, seen: &mut HashSet<String>, ordered: &mut Vec<String>) {
    if let Some(idx) = &node.reaction_index {
        if seen.insert(idx.clone()) {
            ordered.push(idx.clone());
        }
    }
    for child in &node.children {
        collect_reaction_ids(child, seen, ordered);
    }
}

/// Parses a response of the form `...Remaining Reactions:\n...` and
/// extracts every `Reaction idx: N` occurring after that marker.
fn parse_remaining_reaction_ids(response: &str) -> HashSet<String> {
    let remainder = response
        .split("Remaining Reactions:")
        .last()
        .unwrap_or(response);
    remainder
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Reaction idx:"))
        .map(|rest| rest.trim().to_string())
        .collect()
}

/// Sends the tree's rendered reactions to the LLM and returns a store
/// projected down to whatever ids the response kept.
pub async fn filter_reactions(
    tree: &Tree,
    store: &ReactionStore,
    llm: &mut CachedLlm<'_>,
    cache_key: &str,
    prompt_template: impl Fn(&str) -> String,
) -> crate::error::Result<ReactionStore> {
    let reactions_txt = render_reactions_in_tree(tree, store);
    if reactions_txt.is_empty() {
        return Ok(store.clone());
    }
    let prompt = prompt_template(&reactions_txt);
    let response = llm.complete(cache_key, &prompt).await?;
    let remaining = parse_remaining_reaction_ids(&response);
    Ok(store.project(&remaining))
}

/// Renders every pathway with its constituent reaction blocks, labeling
/// each pathway by its comma-joined reaction id sequence.
pub fn render_pathways_with_reactions(pathways: &[Vec<String>], store: &ReactionStore) -> String {
    let mut blocks = Vec::new();
    for path in pathways {
        let mut block = format!("Pathway: {}\n", path.join(", "));
        for idx in path {
            if let Some(reaction) = store.get(idx) {
                block.push_str(&render_reaction_block(idx, reaction));
            }
        }
        blocks.push(block);
    }
    blocks.join("\n")
}

fn parse_remaining_pathway_labels(response: &str) -> HashSet<String> {
    let remainder = response
        .split("Remaining Reaction Pathways:")
        .last()
        .unwrap_or(response);
    remainder
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Pathway:"))
        .map(|rest| rest.trim().to_string())
        .collect()
}

pub async fn filter_pathways(
    pathways: Vec<Vec<String>>,
    store: &ReactionStore,
    llm: &mut CachedLlm<'_>,
    cache_key: &str,
    prompt_template: impl Fn(&str) -> String,
) -> crate::error::Result<Vec<Vec<String>>> {
    if pathways.is_empty() {
        return Ok(pathways);
    }
    let rendered = render_pathways_with_reactions(&pathways, store);
    let prompt = prompt_template(&rendered);
    let response = llm.complete(cache_key, &prompt).await?;
    let remaining_labels = parse_remaining_pathway_labels(&response);
    Ok(pathways
        .into_iter()
        .filter(|path| remaining_labels.contains(&path.join(", ")))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmClient;
    use std::collections::HashSet as StdHashSet;
    use tempfile::tempdir;

    struct FixedResponse(String);
    #[async_trait::async_trait]
    impl LlmClient for FixedResponse {
        async fn complete(&self, _prompt: &str) -> crate::error::Result<String> {
            Ok(self.0.clone())
        }
    }

    fn reaction(reactants: &[&str], products: &[&str]) -> Reaction {
        Reaction {
            idx: "x".to_string(),
            reactants: reactants.iter().map(|s| s.to_string()).collect(),
            products: products.iter().map(|s| s.to_string()).collect(),
            conditions: String::new(),
            source: "d1".to_string(),
        }
    }

    fn sample_store() -> ReactionStore {
        let mut store = ReactionStore::new();
        store.add_reactions(vec![
            Reaction {
                idx: "1".to_string(),
                ..reaction(&["a"], &["target"])
            },
            Reaction {
                idx: "2".to_string(),
                ..reaction(&["b"], &["a"])
            },
        ]);
        store
    }

    fn sample_tree() -> Tree {
        Tree {
            target_substance: "target".to_string(),
            root: TreeNode {
                substance: "target".to_string(),
                reaction_index: None,
                reaction_line: vec![],
                ancestor_set: StdHashSet::new(),
                is_leaf: false,
                children: vec![TreeNode {
                    substance: "a".to_string(),
                    reaction_index: Some("1".to_string()),
                    reaction_line: vec!["1".to_string()],
                    ancestor_set: StdHashSet::new(),
                    is_leaf: false,
                    children: vec![TreeNode {
                        substance: "b".to_string(),
                        reaction_index: Some("2".to_string()),
                        reaction_line: vec!["1".to_string(), "2".to_string()],
                        ancestor_set: StdHashSet::new(),
                        is_leaf: true,
                        children: vec![],
                    }],
                }],
            },
            unexpandable: StdHashSet::new(),
        }
    }

    #[test]
    fn test_render_reactions_in_tree_order() {
        let tree = sample_tree();
        let store = sample_store();
        let rendered = render_reactions_in_tree(&tree, &store);
        assert!(rendered.find("Reaction idx: 1").unwrap() < rendered.find("Reaction idx: 2").unwrap());
    }

    #[tokio::test]
    async fn test_filter_reactions_keeps_only_remaining_ids() {
        let tree = sample_tree();
        let store = sample_store();
        let client = FixedResponse("some reasoning\nRemaining Reactions:\nReaction idx: 1\n".to_string());
        let dir = tempdir().unwrap();
        let mut llm = CachedLlm::new(&client, dir.path().join("llm.json")).unwrap();
        let filtered = filter_reactions(&tree, &store, &mut llm, "key", |txt| txt.to_string())
            .await
            .unwrap();
        assert!(filtered.get("1").is_some());
        assert!(filtered.get("2").is_none());
    }

    #[tokio::test]
    async fn test_filter_pathways_keeps_matching_label() {
        let store = sample_store();
        let pathways = vec![vec!["1".to_string()], vec!["1".to_string(), "2".to_string()]];
        let client = FixedResponse("noise\nRemaining Reaction Pathways:\nPathway: 1\n".to_string());
        let dir = tempdir().unwrap();
        let mut llm = CachedLlm::new(&client, dir.path().join("llm.json")).unwrap();
        let filtered = filter_pathways(pathways, &store, &mut llm, "key", |txt| txt.to_string())
            .await
            .unwrap();
        assert_eq!(filtered, vec![vec!["1".to_string()]]);
    }

    #[tokio::test]
    async fn test_filter_pathways_empty_input_short_circuits() {
        let store = sample_store();
        let client = FixedResponse("unused".to_string());
        let dir = tempdir().unwrap();
        let mut llm = CachedLlm::new(&client, dir.path().join("llm.json")).unwrap();
        let filtered = filter_pathways(vec![], &store, &mut llm, "key", |txt| txt.to_string())
            .await
            .unwrap();
        assert!(filtered.is_empty());
    }
}
