/*!
 * Configuration handling for dacmap
 */

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::bail;
use crate::error::Result;

/// Command-line arguments for dacmap
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "dacmap",
    version = env!("CARGO_PKG_VERSION"),
    about = "Reconstruct filesystem trees from recursive ls dumps and map privileged identities to reachable paths",
    long_about = "Parses recursive long-format directory listing dumps (ls -laRZ) into filesystem trees, \
                  optionally joins them with platform permission declarations, and reports every path \
                  reachable by each declared user and group."
)]
pub struct Args {
    /// Input dump file name, relative to the working directory (repeatable)
    #[clap(short = 'f', long = "file", required = true)]
    pub files: Vec<String>,

    /// Working directory containing the input files; all artifacts are written here
    #[clap(short = 'd', long = "dir")]
    pub dir: String,

    /// XML file or directory of XML files declaring the platform permissions,
    /// relative to the working directory
    #[clap(short = 'p', long = "platform-permissions")]
    pub platform_permissions: Option<String>,

    /// Additionally write canonical JSON exports
    #[clap(long)]
    pub json: bool,

    /// Locate every file with a user or group matching the platform permissions
    #[clap(long = "find-users-and-groups")]
    pub find_users_and_groups: bool,

    /// Number of threads to use for processing
    #[clap(long, default_value = "4")]
    pub threads: usize,
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Working directory for inputs and artifacts
    pub working_dir: PathBuf,

    /// Dump files to process
    pub dump_files: Vec<PathBuf>,

    /// Platform permission declarations (file or directory)
    pub permissions_path: Option<PathBuf>,

    /// Whether to write canonical JSON exports
    pub write_json: bool,

    /// Whether to run the reachability resolver
    pub find_users_and_groups: bool,

    /// Number of threads to use for processing
    pub num_threads: usize,
}

/// Artifact locations for one processed dump. All writes are guarded by
/// [`Config::artifact_exists`]; an existing artifact is never regenerated.
#[derive(Clone, Debug)]
pub struct ArtifactKeys {
    /// Binary tree snapshot (`<stem>_db.bin`)
    pub tree_snapshot: PathBuf,
    /// Canonical tree export (`<stem>_db.json`)
    pub tree_export: PathBuf,
    /// Augmented-catalog snapshot
    pub resolved_snapshot: PathBuf,
    /// Augmented-catalog export
    pub resolved_export: PathBuf,
    /// Identity report over all paths
    pub report: PathBuf,
    /// Identity report excluding `/proc/`
    pub report_no_proc: PathBuf,
    /// Symlink-only listing
    pub links_report: PathBuf,
    /// Symlink-only listing excluding `/proc/`
    pub links_report_no_proc: PathBuf,
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args(args: Args) -> Self {
        let working_dir = PathBuf::from(args.dir);
        Self {
            dump_files: args.files.iter().map(|f| working_dir.join(f)).collect(),
            permissions_path: args.platform_permissions.map(|p| working_dir.join(p)),
            working_dir,
            write_json: args.json,
            find_users_and_groups: args.find_users_and_groups,
            num_threads: args.threads,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.working_dir.exists() || !self.working_dir.is_dir() {
            bail!(
                InvalidArgument,
                "unable to find the working directory '{}'",
                self.working_dir.display()
            );
        }
        for dump in &self.dump_files {
            if !dump.is_file() {
                // A dump whose snapshot already exists does not need the
                // original text around anymore
                if !Self::artifact_exists(&self.artifact_keys(dump).tree_snapshot) {
                    bail!(
                        InvalidArgument,
                        "unable to access input file '{}'",
                        dump.display()
                    );
                }
            }
        }
        if let Some(path) = &self.permissions_path {
            if !path.exists() && !Self::artifact_exists(&self.permissions_snapshot_path()) {
                bail!(
                    InvalidArgument,
                    "unable to find the platform permissions path at '{}'",
                    path.display()
                );
            }
        }
        Ok(())
    }

    /// Does an artifact already exist at this output key?
    pub fn artifact_exists(path: &Path) -> bool {
        path.exists()
    }

    /// Catalog snapshot location (`platform-permissions_db.bin`)
    pub fn permissions_snapshot_path(&self) -> PathBuf {
        self.working_dir.join("platform-permissions_db.bin")
    }

    /// Catalog export location (`platform-permissions_db.json`)
    pub fn permissions_export_path(&self) -> PathBuf {
        self.working_dir.join("platform-permissions_db.json")
    }

    /// Artifact locations for one dump file
    pub fn artifact_keys(&self, dump: &Path) -> ArtifactKeys {
        let stem = dump
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let out = |suffix: &str| self.working_dir.join(format!("{}{}", stem, suffix));
        ArtifactKeys {
            tree_snapshot: out("_db.bin"),
            tree_export: out("_db.json"),
            resolved_snapshot: out("_and_platform-permissions_db.bin"),
            resolved_export: out("_and_platform-permissions_db.json"),
            report: out("_and_platform-permissions.txt"),
            report_no_proc: out("_and_platform-permissions_no_proc.txt"),
            links_report: out("_links_only.txt"),
            links_report_no_proc: out("_links_only_no_proc.txt"),
        }
    }
}
