//! Repository snapshots and their tree projection.
//!
//! A snapshot maps every visible file (posix path relative to the root) to
//! its size and lowercased extension. It is always rebuilt by a full walk;
//! nothing is updated incrementally.

use crate::ignore::IgnoreResolver;
use devpilot_util::TimingGuard;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Metadata recorded for a visible file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    /// Size in bytes, 0 if it could not be determined.
    pub size: u64,
    /// Lowercased extension including the dot, or `""`.
    pub ext: String,
}

/// The filtered view of files under a repository root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoSnapshot {
    files: BTreeMap<String, FileMeta>,
}

impl RepoSnapshot {
    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&FileMeta> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileMeta)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Project the snapshot into a tree.
    pub fn tree(&self) -> TreeNode {
        build_tree(self.paths())
    }
}

impl FromIterator<(String, FileMeta)> for RepoSnapshot {
    fn from_iter<T: IntoIterator<Item = (String, FileMeta)>>(iter: T) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// Lowercased extension of a path, with its leading dot.
fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn relative_posix(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root)
        .ok()
        .map(devpilot_util::path::to_posix)
        .filter(|rel| !rel.is_empty())
}

/// Walk `root` and record every regular file the resolver lets through.
///
/// Symlinks are not followed. Directories whose whole subtree is ignored are
/// not descended into. Entries that cannot be read are logged and skipped,
/// and files whose metadata cannot be read are recorded with size 0.
pub fn build_snapshot(root: &Path, resolver: &IgnoreResolver) -> RepoSnapshot {
    let _timing = TimingGuard::new("snapshot", root.display().to_string());
    let mut files = BTreeMap::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            match relative_posix(root, entry.path()) {
                Some(rel) => !resolver.is_subtree_ignored(&rel),
                None => true,
            }
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(rel) = relative_posix(root, entry.path()) else {
            continue;
        };
        if resolver.is_ignored(&rel) {
            continue;
        }

        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                debug!(path = %rel, error = %e, "Could not stat file, recording size 0");
                0
            }
        };
        let ext = extension_of(entry.path());
        files.insert(rel, FileMeta { size, ext });
    }

    debug!(root = %root.display(), files = files.len(), "Built snapshot");
    RepoSnapshot { files }
}

/// A node of the repository tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    #[serde(rename = "isDir")]
    pub is_dir: bool,
    /// `None` for files.
    pub children: Option<Vec<TreeNode>>,
}

impl TreeNode {
    /// The empty root node.
    pub fn root() -> Self {
        Self::dir("/", "")
    }

    fn dir(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            is_dir: true,
            children: Some(Vec::new()),
        }
    }

    fn file(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            is_dir: false,
            children: None,
        }
    }

    /// Find a node by its full path.
    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        if self.path == path {
            return Some(self);
        }
        self.children
            .as_ref()?
            .iter()
            .find_map(|child| child.find(path))
    }
}

/// Group sorted paths into a tree rooted at `/`.
///
/// Children appear in the order their first descendant is encountered in
/// the sorted path list.
pub fn build_tree<'a>(paths: impl IntoIterator<Item = &'a str>) -> TreeNode {
    // Flat arena; each directory keeps the indices of its children.
    struct Slot {
        node: TreeNode,
        children: Vec<usize>,
    }

    let mut slots = vec![Slot {
        node: TreeNode::root(),
        children: Vec::new(),
    }];
    let mut index: HashMap<String, usize> = HashMap::new();
    index.insert(String::new(), 0);

    let mut sorted: Vec<&str> = paths.into_iter().collect();
    sorted.sort_unstable();

    for rel in sorted {
        let parts: Vec<&str> = rel.split('/').collect();
        let mut parent = 0;
        let mut acc = String::new();
        for (i, part) in parts.iter().enumerate() {
            let is_last = i == parts.len() - 1;
            if !acc.is_empty() {
                acc.push('/');
            }
            acc.push_str(part);

            let slot = match index.get(&acc) {
                Some(&slot) => slot,
                None => {
                    let node = if is_last {
                        TreeNode::file(part, &acc)
                    } else {
                        TreeNode::dir(part, &acc)
                    };
                    slots.push(Slot {
                        node,
                        children: Vec::new(),
                    });
                    let slot = slots.len() - 1;
                    slots[parent].children.push(slot);
                    index.insert(acc.clone(), slot);
                    slot
                }
            };
            parent = slot;
        }
    }

    fn assemble(slots: &mut [Option<Slot>], idx: usize) -> TreeNode {
        let Some(Slot { mut node, children }) = slots[idx].take() else {
            return TreeNode::root();
        };
        if node.is_dir {
            node.children = Some(children.into_iter().map(|c| assemble(slots, c)).collect());
        }
        node
    }

    let mut slots: Vec<Option<Slot>> = slots.into_iter().map(Some).collect();
    assemble(&mut slots, 0)
}
