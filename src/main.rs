/*!
 * Command-line interface for dacmap
 */

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use dacmap::codec::{self, CatalogExport, TreeExport};
use dacmap::config::{Args, Config};
use dacmap::error::Result;
use dacmap::parser::DumpParser;
use dacmap::permissions::PlatformPermissions;
use dacmap::report::{DumpReport, ListingFilter, ReportFormat, Reporter, RunReport};
use dacmap::types::{FileTree, FileType};
use dacmap::utils::count_lines;
use dacmap::{report, resolver};

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Create configuration
    let config = Config::from_args(args);

    // Validate configuration
    config.validate()?;

    // Configure thread pool; dumps are processed one worker per dump
    if let Err(e) = ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .build_global()
    {
        eprintln!("Warning: Failed to set thread pool size: {}", e);
    }

    // Create progress bar
    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} {wide_msg:.dim.white} {pos}/{len} ({percent}%) Elapsed: {elapsed_precise}")
            .unwrap(),
    );
    progress.enable_steady_tick(std::time::Duration::from_millis(100));
    progress.set_prefix("Setup");

    // Count dump lines for progress tracking; dumps with an existing
    // snapshot are loaded instead of re-parsed and contribute nothing
    let mut total_lines = 0;
    for dump in &config.dump_files {
        if !Config::artifact_exists(&config.artifact_keys(dump).tree_snapshot) {
            match count_lines(dump) {
                Ok(count) => total_lines += count,
                Err(e) => progress.set_message(format!(
                    "Warning: failed to count lines of {}: {}",
                    dump.display(),
                    e
                )),
            }
        }
    }
    progress.set_length(total_lines);
    progress.set_prefix("Processing");
    progress.set_message(format!("Processing {} dump(s)...", config.dump_files.len()));

    let start_time = Instant::now();

    // Load or parse the permission catalog before touching any dump
    let catalog = load_catalog(&config)?;

    // Process dumps in parallel; each worker reads the shared catalog only
    let progress = Arc::new(progress);
    let dumps: Vec<DumpReport> = config
        .dump_files
        .par_iter()
        .map(|dump| process_dump(&config, dump, catalog.as_ref(), Arc::clone(&progress)))
        .collect();

    progress.finish_and_clear();

    let run_report = RunReport {
        dumps,
        identities: catalog.as_ref().map(PlatformPermissions::identity_count),
        duration: start_time.elapsed(),
    };

    let reporter = Reporter::new(ReportFormat::ConsoleTable);
    reporter.print_report(&run_report);

    Ok(())
}

/// Load the permission catalog from its snapshot, or parse the declaration
/// documents and write the snapshot (plus the canonical export when
/// requested)
fn load_catalog(config: &Config) -> Result<Option<PlatformPermissions>> {
    let path = match &config.permissions_path {
        Some(path) => path,
        None => return Ok(None),
    };

    let snapshot = config.permissions_snapshot_path();
    let catalog = if Config::artifact_exists(&snapshot) {
        codec::read_snapshot(&snapshot)?
    } else {
        let mut catalog = PlatformPermissions::new();
        catalog.load_path(path)?;
        codec::write_snapshot(&snapshot, &catalog)?;
        catalog
    };

    let export = config.permissions_export_path();
    if config.write_json && !Config::artifact_exists(&export) {
        codec::write_export(&export, &CatalogExport::new(&catalog, None))?;
    }

    Ok(Some(catalog))
}

/// Process a single dump document. Failures are reported and isolated;
/// they never abort the other documents.
fn process_dump(
    config: &Config,
    dump: &Path,
    catalog: Option<&PlatformPermissions>,
    progress: Arc<ProgressBar>,
) -> DumpReport {
    let start = Instant::now();
    let dump_file = dump
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| dump.display().to_string());

    match run_dump(config, dump, catalog, progress) {
        Ok((entries, links_resolved, artifacts_written)) => DumpReport {
            dump_file,
            entries,
            links_resolved,
            artifacts_written,
            duration: start.elapsed(),
            error: None,
        },
        Err(e) => {
            eprintln!("Error processing {}: {}", dump.display(), e);
            DumpReport {
                dump_file,
                entries: 0,
                links_resolved: 0,
                artifacts_written: 0,
                duration: start.elapsed(),
                error: Some(e.to_string()),
            }
        }
    }
}

fn run_dump(
    config: &Config,
    dump: &Path,
    catalog: Option<&PlatformPermissions>,
    progress: Arc<ProgressBar>,
) -> Result<(usize, usize, usize)> {
    let keys = config.artifact_keys(dump);
    let mut artifacts_written = 0;

    let tree: FileTree = if Config::artifact_exists(&keys.tree_snapshot) {
        codec::read_snapshot(&keys.tree_snapshot)?
    } else {
        let mut parser = DumpParser::new(progress);
        parser.parse_file(dump)?;
        let tree = parser.finish();
        codec::write_snapshot(&keys.tree_snapshot, &tree)?;
        artifacts_written += 1;
        tree
    };

    if config.write_json && !Config::artifact_exists(&keys.tree_export) {
        codec::write_export(&keys.tree_export, &TreeExport::new(&tree))?;
        artifacts_written += 1;
    }

    if config.find_users_and_groups {
        if let Some(catalog) = catalog {
            let resolved = resolver::resolve(catalog, &tree)?;

            if !Config::artifact_exists(&keys.resolved_snapshot) {
                codec::write_snapshot(&keys.resolved_snapshot, &resolved)?;
                artifacts_written += 1;
            }
            if config.write_json && !Config::artifact_exists(&keys.resolved_export) {
                codec::write_export(&keys.resolved_export, &CatalogExport::new(&resolved, Some(&tree)))?;
                artifacts_written += 1;
            }
            if !Config::artifact_exists(&keys.report) {
                fs::write(&keys.report, report::render_catalog(&resolved, None)?)?;
                artifacts_written += 1;
            }
            if !Config::artifact_exists(&keys.report_no_proc) {
                fs::write(
                    &keys.report_no_proc,
                    report::render_catalog(&resolved, Some("/proc/"))?,
                )?;
                artifacts_written += 1;
            }

            let links_only = ListingFilter {
                exclude_prefix: None,
                only_type: Some(FileType::Symlink),
            };
            if !Config::artifact_exists(&keys.links_report) {
                fs::write(
                    &keys.links_report,
                    report::render_entries(&tree.entries, "", &links_only),
                )?;
                artifacts_written += 1;
            }
            let links_only_no_proc = ListingFilter {
                exclude_prefix: Some("/proc/"),
                only_type: Some(FileType::Symlink),
            };
            if !Config::artifact_exists(&keys.links_report_no_proc) {
                fs::write(
                    &keys.links_report_no_proc,
                    report::render_entries(&tree.entries, "", &links_only_no_proc),
                )?;
                artifacts_written += 1;
            }
        }
    }

    Ok((tree.len(), tree.resolved_link_count(), artifacts_written))
}
