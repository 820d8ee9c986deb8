use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use super::{ConflictReport, ProjectReport};
use crate::dependency::DifferenceView;
use crate::models::{CompatibilityState, Library, License, LicenseId, LogStatus, Project};
use crate::pipeline::BatchSummary;
use crate::query::{DependencyRow, PaginatedResults};
use crate::store::Graph;

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            header
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
    table
}

fn title(project: &Project) {
    println!(
        "\n {} v{}",
        "license-ledger".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(" Project: {}\n", project);
}

/// Colour for the risk at `index` of `len` risks sorted by ascending level.
fn risk_color(index: usize, len: usize) -> Color {
    if len <= 1 {
        Color::Yellow
    } else if index == 0 {
        Color::Green
    } else if index + 1 == len {
        Color::Red
    } else {
        Color::Yellow
    }
}

pub fn render_project(report: &ProjectReport, verbose: bool, quiet: bool) {
    let overview = &report.overview;
    let completeness = &report.completeness;

    if quiet {
        println!(
            "Libraries: {}  Licenses: {}  Reviewed: {}/{}",
            overview.libraries,
            overview.licenses,
            completeness.reviewed,
            completeness.total,
        );
        return;
    }

    title(&report.project);

    let review_mark = if completeness.is_complete() {
        "✓".green()
    } else {
        "⚠".yellow()
    };
    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "OVERVIEW".bold());
    println!(
        " │  {:<48} │",
        format!(
            "Libraries          : {:>4}  (previous {})",
            overview.libraries, overview.libraries_previous
        )
    );
    println!(
        " │  {:<48} │",
        format!(
            "Licenses           : {:>4}  (previous {})",
            overview.licenses, overview.licenses_previous
        )
    );
    println!(
        " │  {:<48} │",
        format!(
            "{}  Reviewed        : {:>4}  of {}",
            review_mark, completeness.reviewed, completeness.total
        )
    );
    println!(
        " │  {:<48} │",
        format!("Manually added     : {:>4}", report.manual_dependencies)
    );
    println!(" └────────────────────────────────────────────────────┘\n");

    if !report.distribution.is_empty() {
        println!(" {} Licenses to publish:\n", "[LICENSES]".cyan().bold());
        let mut t = table(&["License", "Full name", "Libraries"]);
        for entry in &report.distribution {
            t.add_row(vec![
                Cell::new(&entry.license.short_identifier),
                Cell::new(&entry.license.full_name),
                Cell::new(entry.count).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{t}\n");
    }

    let risks: Vec<_> = if verbose {
        report.risks.iter().collect()
    } else {
        report.risks.iter().filter(|r| r.count > 0).collect()
    };
    if !risks.is_empty() {
        println!(" {} Libraries by risk:\n", "[RISK]".yellow().bold());
        let mut t = table(&["Risk", "Level", "Libraries"]);
        let len = report.risks.len();
        for entry in risks {
            let index = report
                .risks
                .iter()
                .position(|r| r.risk.id == entry.risk.id)
                .unwrap_or(0);
            t.add_row(vec![
                Cell::new(&entry.risk.name).fg(risk_color(index, len)),
                Cell::new(entry.risk.level).set_alignment(CellAlignment::Right),
                Cell::new(entry.count).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{t}\n");
    }
}

fn library_table(libraries: &[Library]) -> Table {
    let mut t = table(&["Type", "Namespace", "Name", "Version", "Original license"]);
    for library in libraries {
        t.add_row(vec![
            Cell::new(library.library_type.to_string()),
            Cell::new(&library.namespace),
            Cell::new(&library.name),
            Cell::new(&library.version),
            Cell::new(library.original_license.as_deref().unwrap_or("unknown")),
        ]);
    }
    t
}

pub fn render_difference(first: &Project, second: &Project, view: &DifferenceView, verbose: bool) {
    println!("\n {} {} → {}\n", "Comparing".bold(), second, first);
    println!(
        " Same: {}  Added: {}  Removed: {}  New: {}  Dropped: {}\n",
        view.same.len(),
        view.added.len().to_string().green(),
        view.removed.len().to_string().red(),
        view.first_new.len(),
        view.second_new.len(),
    );

    let mut sections = vec![
        ("[ADDED]".green().bold(), &view.added),
        ("[REMOVED]".red().bold(), &view.removed),
    ];
    if verbose {
        sections.push(("[SAME]".normal().bold(), &view.same));
    }
    for (label, libraries) in sections {
        if libraries.is_empty() {
            continue;
        }
        println!(" {label}\n");
        println!("{}\n", library_table(libraries));
    }
}

pub fn render_conflicts(report: &ConflictReport) {
    println!(
        "\n {} {} ({})\n",
        "Conflicts of".bold(),
        report.license.short_identifier,
        report.license.full_name
    );
    if report.conflicts.is_empty() {
        println!(" {} No conflicts recorded", "✓".green());
        return;
    }
    let mut t = table(&["License", "Compatibility", "Comment"]);
    for entry in &report.conflicts {
        let color = match entry.compatibility {
            CompatibilityState::Compatible => Color::Green,
            CompatibilityState::Incompatible => Color::Red,
            CompatibilityState::Unknown => Color::DarkGrey,
        };
        t.add_row(vec![
            Cell::new(
                entry
                    .second
                    .as_ref()
                    .map(|l| l.short_identifier.as_str())
                    .unwrap_or("?"),
            ),
            Cell::new(entry.compatibility.to_string())
                .fg(color)
                .set_alignment(CellAlignment::Center),
            Cell::new(entry.comment.as_deref().unwrap_or("")),
        ]);
    }
    println!("{t}");
}

pub fn render_pair(first: &License, second: &License, compatibility: CompatibilityState) {
    let mark = match compatibility {
        CompatibilityState::Compatible => "✓".green(),
        CompatibilityState::Incompatible => "✗".red(),
        CompatibilityState::Unknown => "?".dimmed(),
    };
    println!(
        " {mark} {} / {} : {compatibility}",
        first.short_identifier, second.short_identifier
    );
}

pub fn render_enrichment(summary: &BatchSummary) {
    let status = if summary.cancelled {
        "cancelled".yellow()
    } else {
        "done".green()
    };
    println!(
        "Enrichment {status}: {} processed, {} updated, {} with failures",
        summary.processed,
        summary.updated.to_string().green(),
        summary.failed.to_string().red(),
    );
}

/// Row types the `query` command can print.
pub trait Tabular {
    const HEADER: &'static [&'static str];

    fn cells(&self, graph: &Graph) -> Vec<String>;
}

fn short_identifiers<'a>(graph: &Graph, ids: impl Iterator<Item = &'a LicenseId>) -> String {
    ids.filter_map(|id| graph.license(*id))
        .map(|l| l.short_identifier.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn open_issues(library: &Library) -> usize {
    library
        .error_logs
        .iter()
        .filter(|e| e.status == LogStatus::Open)
        .count()
}

fn opt_id(id: Option<impl ToString>) -> String {
    id.map(|i| i.to_string()).unwrap_or_default()
}

impl Tabular for Library {
    const HEADER: &'static [&'static str] =
        &["Id", "Type", "Namespace", "Name", "Version", "Publish", "Issues"];

    fn cells(&self, graph: &Graph) -> Vec<String> {
        vec![
            opt_id(self.id),
            self.library_type.to_string(),
            self.namespace.clone(),
            self.name.clone(),
            self.version.clone(),
            short_identifiers(graph, self.license_to_publish.iter()),
            open_issues(self).to_string(),
        ]
    }
}

impl Tabular for License {
    const HEADER: &'static [&'static str] = &["Id", "Short", "Full name", "SPDX", "Risk"];

    fn cells(&self, graph: &Graph) -> Vec<String> {
        vec![
            opt_id(self.id),
            self.short_identifier.clone(),
            self.full_name.clone(),
            self.spdx_identifier.clone().unwrap_or_default(),
            self.license_risk
                .and_then(|r| graph.risk(r))
                .map(|r| r.name.clone())
                .unwrap_or_default(),
        ]
    }
}

impl Tabular for Project {
    const HEADER: &'static [&'static str] =
        &["Id", "Name", "Label", "Version", "State", "Delivered", "Libraries"];

    fn cells(&self, _graph: &Graph) -> Vec<String> {
        vec![
            opt_id(self.id),
            self.name.clone(),
            self.label.clone(),
            self.version.clone(),
            self.upload_state.to_string(),
            self.delivered.to_string(),
            self.dependencies.len().to_string(),
        ]
    }
}

impl Tabular for DependencyRow {
    const HEADER: &'static [&'static str] =
        &["Id", "Project", "Library", "Licenses", "Manual", "Hidden"];

    fn cells(&self, graph: &Graph) -> Vec<String> {
        let library = graph.library(self.dependency.library);
        vec![
            opt_id(self.dependency.id),
            graph
                .project(self.project)
                .map(|p| p.to_string())
                .unwrap_or_else(|| self.project.to_string()),
            library
                .map(|l| l.to_string())
                .unwrap_or_else(|| self.dependency.library.to_string()),
            library
                .map(|l| short_identifiers(graph, l.licenses.iter().map(|ll| &ll.license)))
                .unwrap_or_default(),
            self.dependency.added_manually.to_string(),
            self.dependency.hide_for_publishing.to_string(),
        ]
    }
}

pub fn render_rows<R: Tabular>(graph: &Graph, page: &PaginatedResults<R>) {
    let mut t = table(R::HEADER);
    for row in &page.results {
        t.add_row(row.cells(graph));
    }
    println!("{t}");
    println!(
        " Page {} of {} ({} rows)",
        page.page + 1,
        page.number_of_pages.max(1),
        page.number_of_items
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::tests::fixture;

    #[test]
    fn risk_colors_run_from_green_to_red() {
        assert_eq!(risk_color(0, 3), Color::Green);
        assert_eq!(risk_color(1, 3), Color::Yellow);
        assert_eq!(risk_color(2, 3), Color::Red);
        assert_eq!(risk_color(0, 1), Color::Yellow);
    }

    #[test]
    fn library_cells_list_published_licenses() {
        let f = fixture();
        let graph = f.store.read().unwrap();
        let library = graph.library(f.libs[1]).unwrap();
        let cells = library.cells(&graph);
        assert_eq!(cells.len(), Library::HEADER.len());
        assert_eq!(cells[5], "MIT, Apache-2.0");
    }
}
