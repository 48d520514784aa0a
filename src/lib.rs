/*!
 * dacmap - Reconstruct filesystem trees from recursive ls dumps
 *
 * This library parses recursive long-format directory listings into typed
 * filesystem trees (ownership, permissions, SELinux labels, symlink
 * topology), joins them with platform permission declarations, and answers
 * which files and directories are reachable by a given set of privileged
 * users and groups.
 */

pub mod codec;
pub mod config;
pub mod error;
pub mod parser;
pub mod permissions;
pub mod report;
pub mod resolver;
pub mod types;
pub mod utils;

#[cfg(test)]
mod tests;

// Re-export main components for easier access
pub use config::{ArtifactKeys, Args, Config};
pub use error::{DacMapError, Result};
pub use parser::DumpParser;
pub use permissions::{Identity, PlatformPermissions};
pub use report::{DumpReport, ListingFilter, ReportFormat, Reporter, RunReport};
pub use resolver::{collapse_path, resolve};
pub use types::{EntryId, FileEntry, FileTree, FileType, SELinuxContext};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
