/*!
 * Reporting functionality for dacmap
 *
 * Two renderers live here: the fixed-width columnar listing that reproduces
 * `ls -l`-style records from reconstructed entries (a byte-stable output
 * contract), and the end-of-run console summary rendered with the tabled
 * library.
 */

use std::time::Duration;

use tabled::{
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

use crate::error::Result;
use crate::permissions::{Identity, PlatformPermissions};
use crate::resolver::collapse_path;
use crate::types::{FileEntry, FileType};

/// Filters applied before rendering a listing
#[derive(Debug, Clone, Copy, Default)]
pub struct ListingFilter<'a> {
    /// Skip entries whose full path starts with this prefix
    pub exclude_prefix: Option<&'a str>,
    /// Keep only entries of this type
    pub only_type: Option<FileType>,
}

impl ListingFilter<'_> {
    fn keeps(&self, entry: &FileEntry, full_path: &str) -> bool {
        if let Some(prefix) = self.exclude_prefix {
            if full_path.starts_with(prefix) {
                return false;
            }
        }
        if let Some(only_type) = self.only_type {
            if entry.file_type != only_type {
                return false;
            }
        }
        true
    }
}

/// Render entries as a fixed-width columnar listing.
///
/// Every column is right-justified to the widest value in the filtered set.
/// Unknown-typed entries render as `?` placeholders for every column.
/// Symlink paths carry a ` -> target` suffix.
pub fn render_entries(entries: &[FileEntry], padding: &str, filter: &ListingFilter) -> String {
    let mut perms = Vec::new();
    let mut hard_links = Vec::new();
    let mut users = Vec::new();
    let mut groups = Vec::new();
    let mut labels = Vec::new();
    let mut sizes = Vec::new();
    let mut dates = Vec::new();
    let mut paths = Vec::new();

    for entry in entries {
        let full_path = entry.full_path();
        if !filter.keeps(entry, &full_path) {
            continue;
        }
        if entry.file_type == FileType::Unknown {
            perms.push("??????????".to_string());
            hard_links.push("?".to_string());
            users.push("?".to_string());
            groups.push("?".to_string());
            labels.push("?".to_string());
            sizes.push("?".to_string());
            dates.push("[????-??-?? ??:??]".to_string());
            paths.push(full_path);
        } else {
            perms.push(entry.permission_string());
            hard_links.push(entry.hard_links.clone().unwrap_or_default());
            users.push(entry.user.clone().unwrap_or_default());
            groups.push(entry.group.clone().unwrap_or_default());
            labels.push(
                entry
                    .selinux_context
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            );
            sizes.push(match (&entry.size, &entry.major_device_id, &entry.minor_device_id) {
                (Some(size), _, _) => size.clone(),
                (None, Some(major), Some(minor)) => format!("{}, {}", major, minor),
                _ => String::new(),
            });
            dates.push(entry.mod_date_time.clone().unwrap_or_default());
            let mut path = full_path;
            if entry.file_type == FileType::Symlink {
                if let Some(target) = &entry.link_path {
                    path.push_str(" -> ");
                    path.push_str(target);
                }
            }
            paths.push(path);
        }
    }

    let width = |column: &[String]| column.iter().map(String::len).max().unwrap_or(0);
    let w_links = width(&hard_links);
    let w_users = width(&users);
    let w_groups = width(&groups);
    let w_labels = width(&labels);
    let w_sizes = width(&sizes);

    let mut out = String::new();
    out.push_str(&format!("{}File Entries [Size={}]:\n", padding, perms.len()));
    for i in 0..perms.len() {
        out.push_str(&format!(
            "{}  {} {:>lw$} {:>uw$} {:>gw$} {:>cw$} {:>sw$} {} {}\n",
            padding,
            perms[i],
            hard_links[i],
            users[i],
            groups[i],
            labels[i],
            sizes[i],
            dates[i],
            paths[i],
            lw = w_links,
            uw = w_users,
            gw = w_groups,
            cw = w_labels,
            sw = w_sizes,
        ));
    }
    out
}

/// Collapse an identity's traversal paths into display entries
fn collapsed_entries(identity: &Identity) -> Result<Vec<FileEntry>> {
    identity
        .paths
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|path| collapse_path(path))
        .collect()
}

/// Render one identity section: header, declared permissions, then the
/// collapsed-entry listing
pub fn render_identity(label: &str, identity: &Identity, exclude_prefix: Option<&str>) -> Result<String> {
    let mut out = String::new();
    out.push_str(&format!("{}: {}\n", label, identity.name));
    out.push_str("  Permissions: \n");
    for permission in &identity.permissions {
        out.push_str(&format!("    {}\n", permission));
    }
    let entries = collapsed_entries(identity)?;
    let filter = ListingFilter {
        exclude_prefix,
        only_type: None,
    };
    out.push_str(&render_entries(&entries, "  ", &filter));
    Ok(out)
}

/// Render the full identity report for a resolved catalog: entry totals
/// followed by a section per user and per group
pub fn render_catalog(catalog: &PlatformPermissions, exclude_prefix: Option<&str>) -> Result<String> {
    let visible = |identity: &Identity| -> Result<usize> {
        let entries = collapsed_entries(identity)?;
        Ok(entries
            .iter()
            .filter(|entry| match exclude_prefix {
                Some(prefix) => !entry.full_path().starts_with(prefix),
                None => true,
            })
            .count())
    };

    let mut user_entries = 0;
    let mut group_entries = 0;
    let mut sections = Vec::new();
    for user in &catalog.users {
        user_entries += visible(user)?;
        sections.push(render_identity("User", user, exclude_prefix)?);
    }
    for group in &catalog.groups {
        group_entries += visible(group)?;
        sections.push(render_identity("Group", group, exclude_prefix)?);
    }

    let mut out = String::new();
    out.push_str(&format!("Total File Entries: {}\n", user_entries + group_entries));
    out.push_str(&format!("Total User File Entries: {}\n", user_entries));
    out.push_str(&format!("Total Group File Entries: {}\n\n", group_entries));
    out.push_str(&sections.join("\n"));
    Ok(out)
}

/// Outcome of processing one dump document
#[derive(Debug, Clone)]
pub struct DumpReport {
    /// Dump file name
    pub dump_file: String,
    /// Entries in the reconstructed tree
    pub entries: usize,
    /// Symlinks whose target was observed
    pub links_resolved: usize,
    /// Artifacts written this run (existing ones are never regenerated)
    pub artifacts_written: usize,
    /// Time taken for this document
    pub duration: Duration,
    /// Failure, if the document was aborted
    pub error: Option<String>,
}

/// Statistics for a whole run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Per-document outcomes
    pub dumps: Vec<DumpReport>,
    /// Identities in the permission catalog, if one was loaded
    pub identities: Option<usize>,
    /// Total wall-clock time
    pub duration: Duration,
}

/// Format of the report output
pub enum ReportFormat {
    /// Console table output
    ConsoleTable,
}

/// Report generator for run results
pub struct Reporter {
    format: ReportFormat,
}

impl Reporter {
    /// Create a new reporter
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    /// Format a number with human-readable units
    fn format_number(&self, num: usize) -> String {
        if num >= 1_000_000 {
            format!("{:.1}M", num as f64 / 1_000_000.0)
        } else if num >= 1_000 {
            format!("{:.1}K", num as f64 / 1_000.0)
        } else {
            num.to_string()
        }
    }

    /// Generate a report string based on run statistics
    pub fn generate_report(&self, report: &RunReport) -> String {
        match self.format {
            ReportFormat::ConsoleTable => self.generate_console_report(report),
        }
    }

    /// Print the report to stdout
    pub fn print_report(&self, report: &RunReport) {
        println!("\n{}", self.generate_report(report));
    }

    // Create the per-dump table using the tabled crate
    fn create_dumps_table(&self, report: &RunReport) -> String {
        #[derive(Tabled)]
        struct DumpRow {
            #[tabled(rename = "Dump")]
            dump: String,

            #[tabled(rename = "Entries")]
            entries: String,

            #[tabled(rename = "Links")]
            links: String,

            #[tabled(rename = "Artifacts")]
            artifacts: String,

            #[tabled(rename = "Time")]
            time: String,

            #[tabled(rename = "Status")]
            status: String,
        }

        let rows: Vec<DumpRow> = report
            .dumps
            .iter()
            .map(|dump| DumpRow {
                dump: dump.dump_file.clone(),
                entries: self.format_number(dump.entries),
                links: self.format_number(dump.links_resolved),
                artifacts: dump.artifacts_written.to_string(),
                time: format!("{:.2?}", dump.duration),
                status: match &dump.error {
                    Some(error) => format!("failed: {}", error),
                    None => "ok".to_string(),
                },
            })
            .collect();

        let mut table = Table::new(rows);
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        table.to_string()
    }

    // Create the summary table using the tabled crate
    fn create_summary_table(&self, report: &RunReport) -> String {
        #[derive(Tabled)]
        struct SummaryRow {
            #[tabled(rename = "Metric")]
            key: String,

            #[tabled(rename = "Value")]
            value: String,
        }

        let processed = report.dumps.iter().filter(|d| d.error.is_none()).count();
        let total_entries: usize = report.dumps.iter().map(|d| d.entries).sum();

        let mut rows = Vec::new();
        rows.push(SummaryRow {
            key: "Dumps Processed".to_string(),
            value: format!("{}/{}", processed, report.dumps.len()),
        });
        rows.push(SummaryRow {
            key: "Total Entries".to_string(),
            value: self.format_number(total_entries),
        });
        if let Some(identities) = report.identities {
            rows.push(SummaryRow {
                key: "Catalog Identities".to_string(),
                value: self.format_number(identities),
            });
        }
        rows.push(SummaryRow {
            key: "Process Time".to_string(),
            value: format!("{:.4?}", report.duration),
        });

        let mut table = Table::new(rows);
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        table.to_string()
    }

    // Generate a console table report
    fn generate_console_report(&self, report: &RunReport) -> String {
        let dumps_table = self.create_dumps_table(report);
        let summary_table = self.create_summary_table(report);

        format!(
            "PROCESSED DUMPS\n{}\n\nRUN SUMMARY\n{}",
            dumps_table, summary_table
        )
    }
}
