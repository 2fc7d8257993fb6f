//! On-disk layout for pipeline artifacts, grounded in the original
//! corpus's `res_pi` / `tree_pi` directories and `TreeLoader` pickle
//! save/load, reimplemented as atomic JSON writes (spec §9: "the tree
//! serialization format is an implementation artifact; reimplementations
//! may choose any format that preserves the §3 invariants").
use crate::cache::atomic_write_json;
use crate::error::{RetroSynError, Result};
use crate::tree::{Tree, TreeNode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub struct PathLayout {
    pub result_folder: PathBuf,
    pub tree_folder: PathBuf,
}

impl PathLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            result_folder: root.join("res_pi"),
            tree_folder: root.join("tree_pi"),
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.result_folder)?;
        fs::create_dir_all(&self.tree_folder)?;
        Ok(())
    }

    pub fn extraction_results(&self, result_json_name: &str) -> PathBuf {
        self.result_folder.join(format!("{result_json_name}.json"))
    }

    pub fn aligned_root_results(&self, result_json_name: &str) -> PathBuf {
        self.result_folder.join(format!("{result_json_name}_modified.json"))
    }

    pub fn additional_results(&self, result_json_name: &str) -> PathBuf {
        self.result_folder.join(format!("{result_json_name}_add.json"))
    }

    pub fn tree_snapshot(&self, material: &str, expanded: bool, aligned: bool) -> PathBuf {
        let exp_tag = if expanded { "w_exp" } else { "wo_exp" };
        let alg_tag = if aligned { "_alg" } else { "" };
        self.tree_folder.join(format!("{material}_{exp_tag}{alg_tag}.json"))
    }
}

/// A tree as written to disk: identical to `Tree` except `TreeNode`'s
/// derived `ancestor_set` field is already skipped by its own
/// `#[serde(skip)]`, so this wrapper exists only to make the omission
/// explicit at the call site.
#[derive(Serialize, Deserialize)]
struct TreeSnapshot {
    target_substance: String,
    root: TreeNode,
    unexpandable: std::collections::HashSet<String>,
}

pub fn save_tree(tree: &Tree, path: &Path) -> Result<()> {
    let snapshot = TreeSnapshot {
        target_substance: tree.target_substance.clone(),
        root: tree.root.clone(),
        unexpandable: tree.unexpandable.clone(),
    };
    atomic_write_json(path, &snapshot)
}

/// Loads a tree snapshot, rebuilding `ancestor_set` on every node from
/// the parent chain rather than trusting anything persisted (there is
/// nothing persisted for it — see `TreeSnapshot`).
pub fn load_tree(path: &Path) -> Result<Tree> {
    let raw = fs::read_to_string(path)?;
    let snapshot: TreeSnapshot = serde_json::from_str(&raw).map_err(RetroSynError::JsonDecodeError)?;
    Ok(Tree::from_snapshot(snapshot.target_substance, snapshot.root, snapshot.unexpandable))
}
