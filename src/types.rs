/*!
 * Core types and data structures for the dacmap application
 */

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::utils::join_path;

/// Index of an entry inside [`FileTree::entries`].
///
/// Symlink back-references are stored as indices rather than owning
/// references so the tree itself stays acyclic even when the symlink
/// topology contains loops.
pub type EntryId = usize;

/// Represents different types of filesystem entries as reported by the
/// first character of a long-format listing record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum FileType {
    /// Entry whose metadata could not be determined
    #[strum(serialize = "unknown")]
    Unknown,
    /// Regular file
    #[strum(serialize = "regular file")]
    Regular,
    /// Directory containing other entries
    #[strum(serialize = "directory")]
    Directory,
    /// Block device file
    #[strum(serialize = "block device file")]
    BlockDevice,
    /// Character device file
    #[strum(serialize = "character device file")]
    CharDevice,
    /// Symbolic link to another entry
    #[strum(serialize = "symbolic link")]
    Symlink,
    /// Unix domain socket
    #[strum(serialize = "socket file")]
    Socket,
    /// Named pipe
    #[strum(serialize = "named pipe")]
    Pipe,
}

impl FileType {
    /// Map the leading character of a permission string to a file type.
    /// Returns `None` for characters no listing should produce.
    pub fn from_type_char(c: char) -> Option<Self> {
        match c {
            '-' => Some(FileType::Regular),
            'd' => Some(FileType::Directory),
            'b' => Some(FileType::BlockDevice),
            'c' => Some(FileType::CharDevice),
            'l' => Some(FileType::Symlink),
            's' => Some(FileType::Socket),
            'p' => Some(FileType::Pipe),
            _ => None,
        }
    }

    /// The single-character form used when rendering permission strings
    pub fn type_char(&self) -> char {
        match self {
            FileType::Regular => '-',
            FileType::Directory => 'd',
            FileType::BlockDevice => 'b',
            FileType::CharDevice => 'c',
            FileType::Symlink => 'l',
            FileType::Socket => 's',
            FileType::Pipe => 'p',
            FileType::Unknown => '?',
        }
    }
}

/// Mandatory-access-control label attached to an entry: four required
/// components plus an optional ordered category list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SELinuxContext {
    pub user: String,
    pub role: String,
    pub ty: String,
    pub level: String,
    pub categories: Option<Vec<String>>,
}

impl fmt::Display for SELinuxContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.user, self.role, self.ty, self.level)?;
        if let Some(categories) = &self.categories {
            write!(f, ":{}", categories.join(","))?;
        }
        Ok(())
    }
}

/// One reconstructed filesystem object.
///
/// Exactly one of `size` or the device-id pair is present for entries with
/// a determinate type; neither is present for `Unknown` entries created
/// from permission-denied lines. Entry identity is `(name, directory_path)`;
/// lookups key on [`FileEntry::full_path`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Base name (`/` for the root entry)
    pub name: String,
    /// Absolute parent directory path (empty for the root entry)
    pub directory_path: String,
    /// True when the entry's contents or metadata could not be enumerated
    pub is_no_access: bool,
    pub file_type: FileType,
    /// For symlinks, the resolved absolute target path string
    pub link_path: Option<String>,
    /// Index of the entry whose full path equals `link_path`, when that
    /// entry was observed in the dump
    pub link_entry: Option<EntryId>,
    /// Owning user name
    pub user: Option<String>,
    /// Owning group name
    pub group: Option<String>,
    /// 0-7 bitfield, 4=read 2=write 1=execute
    pub user_permissions: Option<u8>,
    pub group_permissions: Option<u8>,
    pub global_permissions: Option<u8>,
    pub is_set_uid: bool,
    pub is_set_gid: bool,
    pub is_sticky: bool,
    pub selinux_context: Option<SELinuxContext>,
    /// Hard link count, preserved verbatim as parsed
    pub hard_links: Option<String>,
    /// Byte size as listed; absent for device entries
    pub size: Option<String>,
    /// Present only for block/character devices, replacing `size`
    pub major_device_id: Option<String>,
    pub minor_device_id: Option<String>,
    /// Normalized `[YYYY-MM-DD HH:MM]` timestamp
    pub mod_date_time: Option<String>,
}

impl FileEntry {
    /// Create the minimal entry used for objects that only ever appeared
    /// in a permission-denied diagnostic
    pub fn no_access(name: impl Into<String>, directory_path: impl Into<String>) -> Self {
        FileEntry {
            name: name.into(),
            directory_path: directory_path.into(),
            is_no_access: true,
            file_type: FileType::Unknown,
            link_path: None,
            link_entry: None,
            user: None,
            group: None,
            user_permissions: None,
            group_permissions: None,
            global_permissions: None,
            is_set_uid: false,
            is_set_gid: false,
            is_sticky: false,
            selinux_context: None,
            hard_links: None,
            size: None,
            major_device_id: None,
            minor_device_id: None,
            mod_date_time: None,
        }
    }

    /// Absolute path of the entry. The separator is elided when the
    /// directory path is empty or already ends in `/`, so the root entry
    /// renders as `/` and `/system` + `bin` renders as `/system/bin`.
    pub fn full_path(&self) -> String {
        join_path(&self.directory_path, &self.name)
    }

    /// True for the unique root entry `("", "/")`
    pub fn is_root(&self) -> bool {
        self.directory_path.is_empty() && self.name == "/"
    }

    /// Render the 10-character `ls -l` permission string, substituting
    /// `s`/`S`, `s`/`S` and `t`/`T` for the execute positions when the
    /// setuid, setgid and sticky bits are set. Unknown entries render as
    /// `??????????`.
    pub fn permission_string(&self) -> String {
        if self.file_type == FileType::Unknown {
            return "??????????".to_string();
        }
        let mut out = String::with_capacity(10);
        out.push(self.file_type.type_char());
        push_triad(&mut out, self.user_permissions.unwrap_or(0), self.is_set_uid, 's', 'S');
        push_triad(&mut out, self.group_permissions.unwrap_or(0), self.is_set_gid, 's', 'S');
        push_triad(&mut out, self.global_permissions.unwrap_or(0), self.is_sticky, 't', 'T');
        out
    }
}

fn push_triad(out: &mut String, bits: u8, special: bool, with_exec: char, without_exec: char) {
    out.push(if bits & 4 == 4 { 'r' } else { '-' });
    out.push(if bits & 2 == 2 { 'w' } else { '-' });
    if bits & 1 == 1 {
        out.push(if special { with_exec } else { 'x' });
    } else {
        out.push(if special { without_exec } else { '-' });
    }
}

/// The reconstructed tree: an insertion-ordered arena of entries.
///
/// No parent/child pointers are stored; adjacency is derived from
/// `directory_path` equality against a candidate parent's full path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileTree {
    pub entries: Vec<FileEntry>,
}

impl FileTree {
    pub fn new() -> Self {
        FileTree::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a full-path index over all entries. Full paths are unique by
    /// construction, so insertion order does not matter.
    pub fn path_index(&self) -> HashMap<String, EntryId> {
        self.entries
            .iter()
            .enumerate()
            .map(|(id, entry)| (entry.full_path(), id))
            .collect()
    }

    /// Locate the root entry, if the dump produced one
    pub fn root(&self) -> Option<EntryId> {
        self.entries.iter().position(FileEntry::is_root)
    }

    /// Number of symlinks whose target was observed in the dump
    pub fn resolved_link_count(&self) -> usize {
        self.entries.iter().filter(|e| e.link_entry.is_some()).count()
    }
}
