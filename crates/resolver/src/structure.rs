use crate::cancel::CancelSignal;
use crate::error::Result;
use crate::path;
use crate::probe::{PathExistenceProbe, ProbeOutcome};
use crate::source::RepositorySource;
use crate::types::{Listing, RepositoryRef, TreeEntry};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureNode {
    #[serde(flatten)]
    pub entry: TreeEntry,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<StructureNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepoStructure {
    pub repository: RepositoryRef,
    pub root: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub exists: bool,
    pub max_depth: usize,
    pub entry_count: usize,
    /// The entry cap stopped the walk before every directory was expanded.
    pub truncated: bool,
    pub entries: Vec<StructureNode>,
}

impl RepoStructure {
    /// Every file in the tree, depth first.
    pub fn files(&self) -> Vec<&TreeEntry> {
        let mut out = Vec::new();
        let mut stack: Vec<&StructureNode> = self.entries.iter().rev().collect();
        while let Some(node) = stack.pop() {
            if node.entry.is_directory() {
                stack.extend(node.children.iter().rev());
            } else {
                out.push(&node.entry);
            }
        }
        out
    }
}

struct Slot {
    entry: TreeEntry,
    children: Vec<usize>,
}

/// Breadth-first listing of a subtree, bounded by depth and entry count.
#[derive(Clone)]
pub struct StructureWalker {
    probe: PathExistenceProbe,
    max_entries: usize,
}

impl StructureWalker {
    pub fn new(source: Arc<dyn RepositorySource>, max_entries: usize) -> Self {
        Self {
            probe: PathExistenceProbe::new(source),
            max_entries,
        }
    }

    pub async fn walk(
        &self,
        repo: &RepositoryRef,
        root: &str,
        branch: Option<&str>,
        max_depth: usize,
        cancel: &CancelSignal,
    ) -> Result<RepoStructure> {
        let root = path::normalize(root);
        let max_depth = max_depth.max(1);
        let mut out = RepoStructure {
            repository: repo.clone(),
            root: root.clone(),
            branch: branch.map(str::to_string),
            exists: false,
            max_depth,
            entry_count: 0,
            truncated: false,
            entries: Vec::new(),
        };

        let top = match self.probe.probe(repo, &root, branch, cancel).await? {
            ProbeOutcome::NotFound => return Ok(out),
            ProbeOutcome::Exists(Listing::File(entry)) => vec![entry],
            ProbeOutcome::Exists(Listing::Directory(entries)) => entries,
        };
        out.exists = true;

        let mut arena: Vec<Slot> = Vec::new();
        let mut roots: Vec<usize> = Vec::new();
        let mut queue: VecDeque<(usize, usize)> = VecDeque::new();

        for entry in top {
            if arena.len() >= self.max_entries {
                out.truncated = true;
                break;
            }
            let idx = arena.len();
            if entry.is_directory() && max_depth > 1 {
                queue.push_back((idx, 1));
            }
            arena.push(Slot {
                entry,
                children: Vec::new(),
            });
            roots.push(idx);
        }

        'walk: while let Some((idx, depth)) = queue.pop_front() {
            let dir = arena[idx].entry.path.clone();
            let entries = match self.probe.probe(repo, &dir, branch, cancel).await? {
                ProbeOutcome::Exists(Listing::Directory(entries)) => entries,
                // Vanished or turned out to be a file: leave it childless.
                _ => continue,
            };
            for entry in entries {
                if arena.len() >= self.max_entries {
                    out.truncated = true;
                    break 'walk;
                }
                let child = arena.len();
                if entry.is_directory() && depth + 1 < max_depth {
                    queue.push_back((child, depth + 1));
                }
                arena.push(Slot {
                    entry,
                    children: Vec::new(),
                });
                arena[idx].children.push(child);
            }
        }

        out.entry_count = arena.len();
        out.entries = assemble(arena, &roots);
        log::info!(
            "structure {repo}:{} -> {} entries{}",
            path::display(&root),
            out.entry_count,
            if out.truncated { " (truncated)" } else { "" }
        );
        Ok(out)
    }
}

/// Children always sit after their parent in the arena, so one reverse pass
/// can build every subtree before it is needed.
fn assemble(arena: Vec<Slot>, roots: &[usize]) -> Vec<StructureNode> {
    let mut built: Vec<Option<StructureNode>> = (0..arena.len()).map(|_| None).collect();
    for (idx, slot) in arena.into_iter().enumerate().rev() {
        let children = slot
            .children
            .iter()
            .filter_map(|c| built[*c].take())
            .collect();
        built[idx] = Some(StructureNode {
            entry: slot.entry,
            children,
        });
    }
    roots.iter().filter_map(|i| built[*i].take()).collect()
}
