/*!
 * Dump parsing functionality
 *
 * Turns a recursive long-format directory listing (`ls -laRZ` output) into
 * a [`FileTree`]. Parsing is strict: any malformed line aborts the dump,
 * since a partially reconstructed tree would silently corrupt later
 * reachability results.
 */

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDateTime;
use indicatif::ProgressBar;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;
use crate::types::{EntryId, FileEntry, FileTree, FileType, SELinuxContext};
use crate::utils::{join_path, normalize_abs_path, split_path};
use crate::{bail, ensure};

static NO_ACCESS_PAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^ls:\s+(.+):\s+Permission\s+denied$").unwrap());

static MISSING_PAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^ls:\s+(.+):\s+No\s+such\s+file\s+or\s+directory$").unwrap());

static LONG_FORMAT_PAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\S+)\s+(\d+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\d+|\d+,\s+\d+)\s+([\d-]+)\s+([\d:]+)\s+(.+)$",
    )
    .unwrap()
});

/// Per-character permission weights. The setuid/setgid/sticky letters carry
/// the execute contribution of their lowercase form only.
fn permission_bit(c: char) -> u8 {
    match c {
        'r' => 4,
        'w' => 2,
        'x' | 's' | 't' => 1,
        _ => 0,
    }
}

/// Streaming parser for recursive directory listings
pub struct DumpParser {
    /// Progress bar, incremented once per input line
    progress: Arc<ProgressBar>,
    /// Directory the following records belong to, set by header lines
    current_dir: Option<String>,
    /// Accepted records in input order
    entries: Vec<FileEntry>,
}

impl DumpParser {
    /// Create a new parser
    pub fn new(progress: Arc<ProgressBar>) -> Self {
        Self {
            progress,
            current_dir: None,
            entries: Vec::new(),
        }
    }

    /// Parse a whole dump file line by line
    pub fn parse_file(&mut self, path: &Path) -> Result<()> {
        let reader = BufReader::new(File::open(path)?);
        for line in reader.lines() {
            let line = line?;
            self.progress.inc(1);
            self.parse_line(&line)?;
        }
        Ok(())
    }

    /// Parse an in-memory dump
    pub fn parse_str(&mut self, input: &str) -> Result<()> {
        for line in input.lines() {
            self.progress.inc(1);
            self.parse_line(line)?;
        }
        Ok(())
    }

    /// Classify and consume a single line of the dump
    pub fn parse_line(&mut self, raw: &str) -> Result<()> {
        let line = raw.trim();

        if line.is_empty()
            || line.starts_with('#')
            || line.starts_with("total")
            || MISSING_PAT.is_match(line)
        {
            return Ok(());
        }

        if let Some(rest) = line.strip_prefix('.') {
            return self.parse_directory_header(rest, line);
        }

        if let Some(caps) = NO_ACCESS_PAT.captures(line) {
            let path = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            return self.parse_permission_denied(path, line);
        }

        self.parse_record(line)
    }

    /// Finish pass 1 and run pass 2: synthesize the root entry, drop the
    /// `.`/`..` bookkeeping entries and resolve symlink targets against a
    /// full-path index of the survivors.
    pub fn finish(mut self) -> FileTree {
        // The dump has no record for the root itself, only its '.' entry.
        // Rewriting that entry keeps the root's permissions and makes links
        // to '/' resolvable.
        for entry in &mut self.entries {
            if entry.directory_path == "/" && entry.name == "." {
                entry.directory_path = String::new();
                entry.name = "/".to_string();
                break;
            }
        }
        self.entries.retain(|e| e.name != "." && e.name != "..");

        let index: HashMap<String, EntryId> = self
            .entries
            .iter()
            .enumerate()
            .map(|(id, entry)| (entry.full_path(), id))
            .collect();
        for entry in &mut self.entries {
            if entry.file_type == FileType::Symlink {
                entry.link_entry = entry
                    .link_path
                    .as_ref()
                    .and_then(|target| index.get(target))
                    .copied();
            }
        }

        FileTree {
            entries: self.entries,
        }
    }

    /// Header lines name the directory the following records belong to.
    /// `.:` denotes the root; anything else is `.<path>:`.
    fn parse_directory_header(&mut self, rest: &str, line: &str) -> Result<()> {
        if rest.starts_with(':') {
            self.current_dir = Some("/".to_string());
        } else {
            let dir = rest.strip_suffix(':').unwrap_or(rest);
            ensure!(!dir.is_empty(), Parse, "malformed directory header '{}'", line);
            self.current_dir = Some(dir.to_string());
        }
        Ok(())
    }

    /// A `Permission denied` diagnostic names either a never-listed object
    /// (path starting with `.`) or a directory that appeared as a child
    /// record earlier but could not be traversed (bare name).
    fn parse_permission_denied(&mut self, path: &str, line: &str) -> Result<()> {
        if let Some(stripped) = path.strip_prefix('.') {
            let (dir, name) = split_path(stripped);
            self.entries.push(FileEntry::no_access(name, dir));
            return Ok(());
        }

        // The diagnostic carries the bare name only, so the best available
        // match is the most recently inserted directory with that name and
        // no recorded children. Two same-named childless directories in
        // different parents are indistinguishable here.
        for idx in (0..self.entries.len()).rev() {
            if self.entries[idx].name == path && self.entries[idx].file_type == FileType::Directory
            {
                let full_path = self.entries[idx].full_path();
                let has_children = self.entries.iter().rev().any(|e| e.directory_path == full_path);
                if !has_children {
                    self.entries[idx].is_no_access = true;
                    return Ok(());
                }
            }
        }
        bail!(
            Parse,
            "no matching inaccessible directory found for '{}' in line '{}'",
            path,
            line
        )
    }

    /// Decode a long-format record into a [`FileEntry`]
    fn parse_record(&mut self, line: &str) -> Result<()> {
        let caps = match LONG_FORMAT_PAT.captures(line) {
            Some(caps) => caps,
            None => bail!(Parse, "unable to parse line '{}'", line),
        };

        let perms: Vec<char> = caps[1].chars().collect();
        ensure!(
            perms.len() == 10,
            Parse,
            "invalid permission string '{}' in line '{}'",
            &caps[1],
            line
        );
        let file_type = match FileType::from_type_char(perms[0]) {
            Some(file_type) => file_type,
            None => bail!(Parse, "unknown file type '{}' in line '{}'", perms[0], line),
        };
        ensure!(
            perms[1..]
                .iter()
                .all(|c| matches!(c, 'r' | 'w' | 'x' | 'S' | 's' | 'T' | 't' | '-')),
            Parse,
            "invalid permission string '{}' in line '{}'",
            &caps[1],
            line
        );

        let user_permissions = permission_bit(perms[1]) + permission_bit(perms[2]) + permission_bit(perms[3]);
        let group_permissions = permission_bit(perms[4]) + permission_bit(perms[5]) + permission_bit(perms[6]);
        let global_permissions = permission_bit(perms[7]) + permission_bit(perms[8]) + permission_bit(perms[9]);
        let is_set_uid = matches!(perms[3], 'S' | 's');
        let is_set_gid = matches!(perms[6], 'S' | 's');
        let is_sticky = matches!(perms[9], 'T' | 't');

        let selinux_context = parse_label(&caps[5], line)?;

        // Devices list `major, minor` ids in place of a size
        let (size, major_device_id, minor_device_id) =
            if matches!(file_type, FileType::BlockDevice | FileType::CharDevice) {
                match caps[6].split_once(',') {
                    Some((major, minor)) => (
                        None,
                        Some(major.trim().to_string()),
                        Some(minor.trim().to_string()),
                    ),
                    None => bail!(Parse, "missing device ids in line '{}'", line),
                }
            } else {
                (Some(caps[6].to_string()), None, None)
            };

        let stamp = format!("{} {}", &caps[7], &caps[8]);
        let mod_date_time = match NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M") {
            Ok(parsed) => parsed.format("[%Y-%m-%d %H:%M]").to_string(),
            Err(_) => bail!(Parse, "invalid timestamp '{}' in line '{}'", stamp, line),
        };

        let current_dir = match &self.current_dir {
            Some(dir) => dir.clone(),
            None => bail!(Parse, "record outside any directory listing '{}'", line),
        };

        // Symlink records carry a `name -> target` suffix; relative targets
        // resolve against the current directory.
        let file_name = caps[9].trim();
        let (name, link_path) = if file_type == FileType::Symlink {
            match file_name.split_once(" -> ") {
                Some((name, target)) => {
                    let target = target.trim();
                    let resolved = if target.starts_with('/') {
                        target.to_string()
                    } else {
                        normalize_abs_path(&join_path(&current_dir, target))
                    };
                    (name.trim().to_string(), Some(resolved))
                }
                None => bail!(Parse, "malformed symlink record '{}'", line),
            }
        } else {
            (file_name.to_string(), None)
        };

        self.entries.push(FileEntry {
            name,
            directory_path: current_dir,
            is_no_access: false,
            file_type,
            link_path,
            link_entry: None,
            user: Some(caps[3].to_string()),
            group: Some(caps[4].to_string()),
            user_permissions: Some(user_permissions),
            group_permissions: Some(group_permissions),
            global_permissions: Some(global_permissions),
            is_set_uid,
            is_set_gid,
            is_sticky,
            selinux_context: Some(selinux_context),
            hard_links: Some(caps[2].to_string()),
            size,
            major_device_id,
            minor_device_id,
            mod_date_time: Some(mod_date_time),
        });
        Ok(())
    }
}

/// Split an access-control label into its 4 required components and the
/// optional trailing category list
fn parse_label(label: &str, line: &str) -> Result<SELinuxContext> {
    let parts: Vec<&str> = label.split(':').collect();
    ensure!(
        parts.len() == 4 || parts.len() == 5,
        Parse,
        "unknown label format '{}' in line '{}'",
        label,
        line
    );
    let categories = if parts.len() == 5 {
        Some(parts[4].split(',').map(str::to_string).collect())
    } else {
        None
    };
    Ok(SELinuxContext {
        user: parts[0].trim().to_string(),
        role: parts[1].trim().to_string(),
        ty: parts[2].trim().to_string(),
        level: parts[3].trim().to_string(),
        categories,
    })
}
