/*!
 * Platform permission catalog
 *
 * Parses permission declaration documents into a [`PlatformPermissions`]
 * catalog: named users and groups, each with the ordered list of permission
 * names declared for it. The catalog is an explicit builder threaded through
 * each document-processing call; multiple documents accumulate into one
 * catalog.
 */

use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::bail;
use crate::error::{DacMapError, Result};
use crate::types::FileEntry;

/// A named user or group with its declared permissions.
///
/// `paths` stays `None` until the reachability resolver populates it; each
/// path is the root-to-node entry sequence of a reachable filesystem object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    /// Declared permission names, insertion-ordered, duplicates allowed
    pub permissions: Vec<String>,
    pub paths: Option<Vec<Vec<FileEntry>>>,
}

impl Identity {
    fn new(name: &str) -> Self {
        Identity {
            name: name.to_string(),
            permissions: Vec::new(),
            paths: None,
        }
    }

    pub fn add_permission(&mut self, permission: &str) {
        self.permissions.push(permission.to_string());
    }

    pub fn add_path(&mut self, path: Vec<FileEntry>) {
        self.paths.get_or_insert_with(Vec::new).push(path);
    }

    pub fn path_count(&self) -> usize {
        self.paths.as_ref().map_or(0, Vec::len)
    }
}

/// Catalog of identities named by permission declaration documents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformPermissions {
    pub users: Vec<Identity>,
    pub groups: Vec<Identity>,
}

impl PlatformPermissions {
    pub fn new() -> Self {
        PlatformPermissions::default()
    }

    /// Append a permission to the named user, creating the identity on
    /// first reference
    pub fn add_user_permission(&mut self, name: &str, permission: &str) {
        Self::add_to(&mut self.users, name, permission);
    }

    /// Append a permission to the named group, creating the identity on
    /// first reference
    pub fn add_group_permission(&mut self, name: &str, permission: &str) {
        Self::add_to(&mut self.groups, name, permission);
    }

    fn add_to(identities: &mut Vec<Identity>, name: &str, permission: &str) {
        if let Some(identity) = identities.iter_mut().find(|i| i.name == name) {
            identity.add_permission(permission);
            return;
        }
        let mut identity = Identity::new(name);
        identity.add_permission(permission);
        identities.push(identity);
    }

    pub fn identity_count(&self) -> usize {
        self.users.len() + self.groups.len()
    }

    /// Parse one declaration document and accumulate its records.
    ///
    /// Two record kinds are recognized:
    /// `<permission name="P"><group gid="G"/>...</permission>` declares `P`
    /// for each listed group, and `<assign-permission name="P" uid="U"/>`
    /// assigns `P` to a user. Everything else in the document is ignored.
    pub fn parse_xml(&mut self, xml: &str, source: &str) -> Result<()> {
        let mut reader = Reader::from_str(xml);
        let mut current_permission: Option<String> = None;
        loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"permission" => {
                    let name = match required_attr(&e, "name", source)? {
                        Some(name) => name,
                        None => bail!(
                            Parse,
                            "missing permission name for 'permission' entry in '{}'",
                            source
                        ),
                    };
                    current_permission = Some(name);
                }
                Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"group" => {
                    if let Some(permission) = current_permission.clone() {
                        let gid = match required_attr(&e, "gid", source)? {
                            Some(gid) => gid,
                            None => bail!(Parse, "found a group with no gid in '{}'", source),
                        };
                        self.add_group_permission(&gid, &permission);
                    }
                }
                Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"assign-permission" => {
                    let permission = match required_attr(&e, "name", source)? {
                        Some(permission) => permission,
                        None => bail!(
                            Parse,
                            "missing permission name for 'assign-permission' entry in '{}'",
                            source
                        ),
                    };
                    let uid = match required_attr(&e, "uid", source)? {
                        Some(uid) => uid,
                        None => bail!(
                            Parse,
                            "missing uid for 'assign-permission' entry in '{}'",
                            source
                        ),
                    };
                    self.add_user_permission(&uid, &permission);
                }
                Event::End(e) if e.name().as_ref() == b"permission" => {
                    current_permission = None;
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(())
    }

    /// Parse a single declaration file
    pub fn load_xml_file(&mut self, path: &Path) -> Result<()> {
        let xml = fs::read_to_string(path)?;
        self.parse_xml(&xml, &path.display().to_string())
    }

    /// Load declarations from a file or from every `*.xml` file under a
    /// directory tree, in file-name order
    pub fn load_path(&mut self, path: &Path) -> Result<()> {
        if path.is_file() {
            return self.load_xml_file(path);
        }
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.map_err(|e| {
                    DacMapError::InvalidArgument(format!(
                        "unable to walk permissions directory '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
                if entry.file_type().is_file() && has_xml_extension(entry.path()) {
                    self.load_xml_file(entry.path())?;
                }
            }
            return Ok(());
        }
        bail!(
            InvalidArgument,
            "the platform permissions path is not a file or directory '{}'",
            path.display()
        )
    }
}

fn has_xml_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("xml"))
        .unwrap_or(false)
}

/// Extract one attribute by name, or `None` if it is absent
fn required_attr(element: &BytesStart<'_>, name: &str, source: &str) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr
            .map_err(|e| DacMapError::Parse(format!("bad attribute in '{}': {}", source, e)))?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|e| DacMapError::Parse(format!("bad attribute in '{}': {}", source, e)))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}
