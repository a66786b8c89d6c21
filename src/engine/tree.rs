//! # Directory Merkle Tree Construction
//!
//! Builds the deterministic directory hash that becomes a commit's
//! `SnapshotId`. A single pass buckets files by parent directory and
//! collects every ancestor up to the root `"."`; a second pass folds
//! directories bottom-up (deepest first) into their hashes. Neither pass is
//! quadratic in the number of files or directories.

use crate::hash::{hash_tree, tree_entry, Hash};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

#[derive(Default)]
struct DirNode {
    files: BTreeMap<String, Hash>,
    subdirs: BTreeSet<String>,
}

/// Splits `path` into its parent directory (`"."` for top-level paths) and
/// file name.
fn parent_and_name(path: &str) -> (String, String) {
    match path.rsplit_once('/') {
        Some((dir, name)) => (dir.to_string(), name.to_string()),
        None => (".".to_string(), path.to_string()),
    }
}

/// Splits a directory path into its parent directory and own name. Must
/// not be called with `"."`, which has no parent.
fn dir_parent_and_name(dir: &str) -> (String, String) {
    match dir.rsplit_once('/') {
        Some((parent, name)) => (parent.to_string(), name.to_string()),
        None => (".".to_string(), dir.to_string()),
    }
}

/// All ancestor directories of `dir`, from `dir` itself up to `"."`
/// inclusive.
fn ancestors_of(dir: &str) -> Vec<String> {
    if dir == "." {
        return vec![".".to_string()];
    }
    let parts: Vec<&str> = dir.split('/').collect();
    let mut out = Vec::with_capacity(parts.len() + 1);
    for i in (1..=parts.len()).rev() {
        out.push(parts[..i].join("/"));
    }
    out.push(".".to_string());
    out
}

fn depth_of(dir: &str) -> usize {
    if dir == "." {
        0
    } else {
        dir.matches('/').count() + 1
    }
}

fn child_path(dir: &str, name: &str) -> String {
    if dir == "." {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Computes the root directory hash over `files` (a path → blob-hash map).
/// Identical for identical `{path: hash}` sets regardless of insertion
/// order; an empty map yields the well-defined `hash_tree([])` constant.
pub fn root_hash(files: &BTreeMap<String, Hash>) -> Hash {
    let mut dirs: HashMap<String, DirNode> = HashMap::new();
    let mut all_dirs: HashSet<String> = HashSet::new();
    all_dirs.insert(".".to_string());

    for (path, hash) in files {
        let (dir, name) = parent_and_name(path);
        dirs.entry(dir.clone()).or_default().files.insert(name, *hash);
        for ancestor in ancestors_of(&dir) {
            all_dirs.insert(ancestor);
        }
    }

    for dir in all_dirs.iter() {
        dirs.entry(dir.clone()).or_default();
        if dir != "." {
            let (parent, name) = dir_parent_and_name(dir);
            dirs.entry(parent).or_default().subdirs.insert(name);
        }
    }

    let mut ordered: Vec<&String> = all_dirs.iter().collect();
    ordered.sort_by(|a, b| depth_of(b).cmp(&depth_of(a)).then_with(|| b.cmp(a)));

    let mut tree_hash: HashMap<String, Hash> = HashMap::new();
    for dir in ordered {
        let node = dirs.get(dir).expect("directory registered above");
        let mut entries: Vec<String> = Vec::with_capacity(node.files.len() + node.subdirs.len());
        for (name, hash) in &node.files {
            entries.push(tree_entry(name, false, hash));
        }
        for name in &node.subdirs {
            let child = child_path(dir, name);
            let child_hash = tree_hash
                .get(&child)
                .expect("child directory processed before its parent");
            entries.push(tree_entry(name, true, child_hash));
        }
        entries.sort();
        tree_hash.insert(dir.clone(), hash_tree(entries));
    }

    *tree_hash.get(".").expect("root is always present")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_blob;

    fn files(pairs: &[(&str, &str)]) -> BTreeMap<String, Hash> {
        pairs
            .iter()
            .map(|(p, c)| (p.to_string(), hash_blob(c.as_bytes())))
            .collect()
    }

    #[test]
    fn empty_tree_matches_hash_tree_constant() {
        let empty: BTreeMap<String, Hash> = BTreeMap::new();
        assert_eq!(root_hash(&empty), hash_tree(Vec::<&str>::new()));
    }

    #[test]
    fn order_independent_for_same_content() {
        let f1 = files(&[("a.txt", "A"), ("b.txt", "B")]);
        let f2 = files(&[("b.txt", "B"), ("a.txt", "A")]);
        assert_eq!(root_hash(&f1), root_hash(&f2));
    }

    #[test]
    fn sensitive_to_content_change() {
        let f1 = files(&[("a.txt", "A"), ("b.txt", "B")]);
        let f2 = files(&[("a.txt", "A"), ("b.txt", "B2")]);
        assert_ne!(root_hash(&f1), root_hash(&f2));
    }

    #[test]
    fn nested_directories_fold_bottom_up() {
        let a = files(&[("src/a.go", "a"), ("src/b.go", "b"), ("docs/readme.md", "# hi")]);
        let b = files(&[("docs/readme.md", "# hi"), ("src/b.go", "b"), ("src/a.go", "a")]);
        assert_eq!(root_hash(&a), root_hash(&b));
    }

    #[test]
    fn sibling_directories_do_not_affect_each_other() {
        let a = files(&[("src/a.go", "a"), ("docs/readme.md", "# hi")]);
        let b = files(&[("src/a.go", "a"), ("docs/readme.md", "# changed")]);
        assert_ne!(root_hash(&a), root_hash(&b));
    }

    #[test]
    fn deep_nesting_builds_deterministically() {
        let pairs: Vec<(String, String)> = (0..50)
            .map(|i| (format!("a/b/c/d/e/file_{i}.txt"), format!("content_{i}")))
            .collect();
        let f: BTreeMap<String, Hash> = pairs
            .iter()
            .map(|(p, c)| (p.clone(), hash_blob(c.as_bytes())))
            .collect();
        assert_eq!(root_hash(&f), root_hash(&f));
    }
}
