/*!
 * Utility functions for dacmap
 */

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Join a directory path and a base name the way the entry model does:
/// the separator is elided when the directory part is empty or already
/// ends in `/`.
pub fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() || dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Split an absolute path into `(dirname, basename)`.
///
/// `/vendor/secret` becomes `("/vendor", "secret")` and `/secret` becomes
/// `("/", "secret")`. A path with no separator splits into an empty dirname.
pub fn split_path(path: &str) -> (String, String) {
    match path.rfind('/') {
        Some(0) => ("/".to_string(), path[1..].to_string()),
        Some(idx) => (path[..idx].to_string(), path[idx + 1..].to_string()),
        None => (String::new(), path.to_string()),
    }
}

/// Normalize an absolute path: collapse repeated separators and resolve
/// `.` and `..` components. `..` above the root stays at the root.
pub fn normalize_abs_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// Count the lines of a file for progress tracking
pub fn count_lines(path: &Path) -> io::Result<u64> {
    let reader = BufReader::new(File::open(path)?);
    let mut count = 0;
    for line in reader.lines() {
        line?;
        count += 1;
    }
    Ok(count)
}
