/*!
 * Reachability resolution
 *
 * Walks an assembled [`FileTree`] depth-first, following symlink edges, and
 * records for every catalog identity each path whose terminal entry is
 * owned by that identity's user or group name. The input tree and catalog
 * are never mutated; resolution operates on a deep copy of the catalog, so
 * repeated resolutions against one shared tree are safe to run
 * independently.
 */

use std::collections::HashMap;

use crate::bail;
use crate::error::Result;
use crate::permissions::PlatformPermissions;
use crate::types::{EntryId, FileEntry, FileTree, FileType};
use crate::utils::join_path;

/// Resolve which tree paths are reachable by each catalog identity.
///
/// Fails with an integrity error when the tree has no root entry or when
/// any entry's parent directory was never observed.
pub fn resolve(catalog: &PlatformPermissions, tree: &FileTree) -> Result<PlatformPermissions> {
    let mut resolved = catalog.clone();

    let index = tree.path_index();
    let root = match tree.root() {
        Some(root) => root,
        None => bail!(Integrity, "an entry for the root does not exist"),
    };

    // Precompute the parent -> children adjacency once, in entry insertion
    // order. Symlinks with a resolved target get that target as an extra
    // child, which lets the traversal follow the link as one extra hop.
    let mut adjacency: HashMap<EntryId, Vec<EntryId>> = HashMap::new();
    for (id, entry) in tree.entries.iter().enumerate() {
        if id == root {
            continue;
        }
        let parent = match index.get(&entry.directory_path) {
            Some(parent) => *parent,
            None => bail!(Integrity, "no entry for parent path '{}'", entry.directory_path),
        };
        adjacency.entry(parent).or_default().push(id);

        if entry.file_type == FileType::Symlink {
            if let Some(target) = entry.link_entry {
                adjacency.entry(id).or_default().push(target);
            }
        }
    }

    // Iterative DFS with explicit (node, next child index) frames. A node
    // is finalized on the pop where it has nothing further to descend
    // into: children exhausted, the symlink cycle guard fired, or the node
    // sits in a pruned subtree.
    let mut stack: Vec<(EntryId, usize)> = vec![(root, 0)];
    while let Some((cur, child_index)) = stack.pop() {
        let entry = &tree.entries[cur];
        let descend = match adjacency.get(&cur) {
            Some(children) if child_index < children.len() => {
                let on_stack = |id: EntryId| stack.iter().any(|&(node, _)| node == id);
                let link_blocked = entry.file_type == FileType::Symlink
                    && (on_stack(cur) || entry.link_entry.map_or(false, on_stack));
                !link_blocked && !is_pruned(entry, &stack, tree)
            }
            _ => false,
        };

        if descend {
            let next = adjacency[&cur][child_index];
            stack.push((cur, child_index + 1));
            stack.push((next, 0));
        } else {
            let mut path: Option<Vec<FileEntry>> = None;
            for user in &mut resolved.users {
                if entry.user.as_deref() == Some(user.name.as_str()) {
                    let path = path.get_or_insert_with(|| traversal_path(&stack, cur, tree));
                    user.add_path(path.clone());
                }
            }
            for group in &mut resolved.groups {
                if entry.group.as_deref() == Some(group.name.as_str()) {
                    let path = path.get_or_insert_with(|| traversal_path(&stack, cur, tree));
                    group.add_path(path.clone());
                }
            }
        }
    }

    Ok(resolved)
}

/// The file descriptors under /proc and the subsystem symlinks under /sys
/// expand into unbounded path sets with nothing of interest in them, so
/// both subtrees are cut off wholesale.
fn is_pruned(entry: &FileEntry, stack: &[(EntryId, usize)], tree: &FileTree) -> bool {
    if stack.len() <= 2 {
        return false;
    }
    let top_level = tree.entries[stack[1].0].name.as_str();
    (entry.name == "fd" && top_level == "proc")
        || (entry.name == "subsystem" && top_level == "sys")
}

/// Clone the active root-to-node entry sequence
fn traversal_path(stack: &[(EntryId, usize)], cur: EntryId, tree: &FileTree) -> Vec<FileEntry> {
    let mut path: Vec<FileEntry> = stack
        .iter()
        .map(|&(id, _)| tree.entries[id].clone())
        .collect();
    path.push(tree.entries[cur].clone());
    path
}

/// Collapse a traversal path into a single display entry.
///
/// The collapsed name and directory path describe the route actually
/// walked: a component advances the directory path only when its
/// predecessor is not a symlink, so a path that hops through a symlink
/// keeps the link's name as the terminal component while carrying the
/// target entry's metadata.
pub fn collapse_path(path: &[FileEntry]) -> Result<FileEntry> {
    let (first, rest) = match path.split_first() {
        Some(split) => split,
        None => bail!(Integrity, "encountered a traversal path with no parts"),
    };
    if rest.is_empty() {
        // Can only be the root path
        let mut entry = first.clone();
        entry.name = "/".to_string();
        entry.directory_path = String::new();
        return Ok(entry);
    }

    let mut directory_path = first.name.clone();
    let mut name: Option<String> = None;
    let mut parent = first;
    for cur in rest {
        match name.take() {
            None => name = Some(cur.name.clone()),
            Some(prev) => {
                if parent.file_type != FileType::Symlink {
                    directory_path = join_path(&directory_path, &prev);
                    name = Some(cur.name.clone());
                } else {
                    name = Some(prev);
                }
            }
        }
        parent = cur;
    }

    let mut entry = parent.clone();
    entry.name = name.unwrap_or_default();
    entry.directory_path = directory_path;
    Ok(entry)
}
