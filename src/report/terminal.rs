use std::path::Path;

use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::models::ResolvedLicense;

/// Print a colored summary of the resolution run.
pub fn render(licenses: &[ResolvedLicense], path: &Path, output: Option<&Path>, verbose: bool, quiet: bool) {
    let total = licenses.len();
    let resolved = licenses.iter().filter(|l| l.is_resolved()).count();
    let missing = total - resolved;
    let distinct = distinct_texts(licenses);

    if quiet {
        println!(
            "Total: {}  Resolved: {}  Missing: {}",
            total,
            resolved.to_string().green(),
            missing.to_string().red(),
        );
        return;
    }

    println!(
        "\n {} v{}",
        "license-notices".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(" Scanning: {}\n", path.display());

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(" │  {:<48} │", format!("Total dependencies : {}", total));
    println!(
        " │  {:<48} │",
        format!("{}  Resolved        : {:>4}  ({} distinct texts)", "✓".green(), resolved, distinct)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Missing         : {:>4}", "✗".red(), missing)
    );
    println!(" └────────────────────────────────────────────────────┘\n");

    if missing > 0 {
        println!(" {} Dependencies without license text:\n", "[MISSING]".red().bold());
        render_table(licenses.iter().filter(|l| !l.is_resolved()));
        println!();
    }

    if verbose && resolved > 0 {
        println!(" {} Resolved dependencies:\n", "[OK]".green().bold());
        render_table(licenses.iter().filter(|l| l.is_resolved()));
        println!();
    }

    if let Some(output) = output {
        println!(" Notices written to {}", output.display().to_string().bold());
    }
}

fn render_table<'a>(licenses: impl Iterator<Item = &'a ResolvedLicense>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Version").add_attribute(Attribute::Bold),
            Cell::new("Project").add_attribute(Attribute::Bold),
            Cell::new("License").add_attribute(Attribute::Bold),
        ]);

    for license in licenses {
        let (heading, color) = match license.license.as_deref() {
            Some(text) => (first_line(text), Color::Green),
            None => ("not found", Color::Red),
        };
        table.add_row(vec![
            Cell::new(&license.name),
            Cell::new(license.version.as_deref().unwrap_or("")),
            Cell::new(license.project_url.as_deref().unwrap_or("")),
            Cell::new(heading).fg(color),
        ]);
    }

    println!("{}", table);
}

/// First non-blank line of a license, usually its title.
fn first_line(text: &str) -> &str {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
}

fn distinct_texts(licenses: &[ResolvedLicense]) -> usize {
    licenses
        .iter()
        .filter_map(|l| l.license.as_deref())
        .collect::<std::collections::HashSet<_>>()
        .len()
}
