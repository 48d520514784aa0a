/*!
 * Persistence for dacmap
 *
 * Two formats with different contracts: the binary snapshot is lossless
 * and order-preserving (`decode(encode(x)) == x`, symlink back-references
 * included), while the canonical JSON export renders the same data through
 * view structs whose field declaration order is the fixed priority table,
 * for diff-stable output that is not required to round-trip.
 */

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::permissions::{Identity, PlatformPermissions};
use crate::types::{FileEntry, FileTree, SELinuxContext};

/// Write a lossless binary snapshot of a tree or catalog
pub fn write_snapshot<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, value)?;
    Ok(())
}

/// Reload a snapshot written by [`write_snapshot`]
pub fn read_snapshot<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(reader)?)
}

/// Write a canonical JSON export document
pub fn write_export<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

fn is_false(value: &bool) -> bool {
    !value
}

/// Canonical export of a [`FileTree`]
#[derive(Serialize)]
pub struct TreeExport<'a> {
    entries: Vec<EntryExport<'a>>,
}

impl<'a> TreeExport<'a> {
    pub fn new(tree: &'a FileTree) -> Self {
        TreeExport {
            entries: tree
                .entries
                .iter()
                .map(|entry| EntryExport::new(entry, Some(tree)))
                .collect(),
        }
    }
}

/// Shallow `(name, directoryPath)` reference to a symlink's target entry
#[derive(Serialize)]
struct LinkRef<'a> {
    name: &'a str,
    #[serde(rename = "directoryPath")]
    directory_path: &'a str,
}

/// One entry rendered with the fixed field-priority table. Absent options
/// and false booleans are omitted to keep the document compact.
#[derive(Serialize)]
pub struct EntryExport<'a> {
    name: &'a str,
    #[serde(rename = "directoryPath")]
    directory_path: &'a str,
    #[serde(rename = "isNoAccess", skip_serializing_if = "is_false")]
    is_no_access: bool,
    #[serde(rename = "type")]
    file_type: String,
    #[serde(rename = "linkPath", skip_serializing_if = "Option::is_none")]
    link_path: Option<&'a str>,
    #[serde(rename = "linkEntry", skip_serializing_if = "Option::is_none")]
    link_entry: Option<LinkRef<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<&'a str>,
    #[serde(rename = "userPermissions", skip_serializing_if = "Option::is_none")]
    user_permissions: Option<u8>,
    #[serde(rename = "groupPermissions", skip_serializing_if = "Option::is_none")]
    group_permissions: Option<u8>,
    #[serde(rename = "globalPermissions", skip_serializing_if = "Option::is_none")]
    global_permissions: Option<u8>,
    #[serde(rename = "isSetUID", skip_serializing_if = "is_false")]
    is_set_uid: bool,
    #[serde(rename = "isSetGID", skip_serializing_if = "is_false")]
    is_set_gid: bool,
    #[serde(rename = "isSticky", skip_serializing_if = "is_false")]
    is_sticky: bool,
    #[serde(rename = "selinuxContext", skip_serializing_if = "Option::is_none")]
    selinux_context: Option<ContextExport<'a>>,
    #[serde(rename = "hardLinks", skip_serializing_if = "Option::is_none")]
    hard_links: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<&'a str>,
    #[serde(rename = "majorDeviceId", skip_serializing_if = "Option::is_none")]
    major_device_id: Option<&'a str>,
    #[serde(rename = "minorDeviceId", skip_serializing_if = "Option::is_none")]
    minor_device_id: Option<&'a str>,
    #[serde(rename = "modDateTime", skip_serializing_if = "Option::is_none")]
    mod_date_time: Option<&'a str>,
}

impl<'a> EntryExport<'a> {
    /// Build the view for one entry. The tree, when given, is used to
    /// resolve the symlink back-reference into a shallow identity ref.
    pub fn new(entry: &'a FileEntry, tree: Option<&'a FileTree>) -> Self {
        let link_entry = entry
            .link_entry
            .and_then(|id| tree.and_then(|tree| tree.entries.get(id)))
            .map(|target| LinkRef {
                name: &target.name,
                directory_path: &target.directory_path,
            });
        EntryExport {
            name: &entry.name,
            directory_path: &entry.directory_path,
            is_no_access: entry.is_no_access,
            file_type: entry.file_type.to_string(),
            link_path: entry.link_path.as_deref(),
            link_entry,
            user: entry.user.as_deref(),
            group: entry.group.as_deref(),
            user_permissions: entry.user_permissions,
            group_permissions: entry.group_permissions,
            global_permissions: entry.global_permissions,
            is_set_uid: entry.is_set_uid,
            is_set_gid: entry.is_set_gid,
            is_sticky: entry.is_sticky,
            selinux_context: entry.selinux_context.as_ref().map(ContextExport::new),
            hard_links: entry.hard_links.as_deref(),
            size: entry.size.as_deref(),
            major_device_id: entry.major_device_id.as_deref(),
            minor_device_id: entry.minor_device_id.as_deref(),
            mod_date_time: entry.mod_date_time.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct ContextExport<'a> {
    #[serde(rename = "seUser")]
    user: &'a str,
    #[serde(rename = "seRole")]
    role: &'a str,
    #[serde(rename = "seType")]
    ty: &'a str,
    #[serde(rename = "seLevel")]
    level: &'a str,
    #[serde(rename = "seCategories", skip_serializing_if = "Option::is_none")]
    categories: Option<&'a [String]>,
}

impl<'a> ContextExport<'a> {
    fn new(context: &'a SELinuxContext) -> Self {
        ContextExport {
            user: &context.user,
            role: &context.role,
            ty: &context.ty,
            level: &context.level,
            categories: context.categories.as_deref(),
        }
    }
}

/// Canonical export of a [`PlatformPermissions`] catalog, resolved or not
#[derive(Serialize)]
pub struct CatalogExport<'a> {
    users: Vec<IdentityExport<'a>>,
    groups: Vec<IdentityExport<'a>>,
}

impl<'a> CatalogExport<'a> {
    pub fn new(catalog: &'a PlatformPermissions, tree: Option<&'a FileTree>) -> Self {
        let render = |identities: &'a [Identity]| {
            identities
                .iter()
                .map(|identity| IdentityExport::new(identity, tree))
                .collect()
        };
        CatalogExport {
            users: render(&catalog.users),
            groups: render(&catalog.groups),
        }
    }
}

#[derive(Serialize)]
pub struct IdentityExport<'a> {
    name: &'a str,
    permissions: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    paths: Option<Vec<Vec<EntryExport<'a>>>>,
}

impl<'a> IdentityExport<'a> {
    fn new(identity: &'a Identity, tree: Option<&'a FileTree>) -> Self {
        IdentityExport {
            name: &identity.name,
            permissions: &identity.permissions,
            paths: identity.paths.as_ref().map(|paths| {
                paths
                    .iter()
                    .map(|path| {
                        path.iter()
                            .map(|entry| EntryExport::new(entry, tree))
                            .collect()
                    })
                    .collect()
            }),
        }
    }
}
