use std::path::Path;

use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use super::RunSummary;
use crate::gate::GateOutcome;
use crate::models::AttributionStatus;

/// Render a colored terminal report.
pub fn render(summary: &RunSummary, repo: &Path, quiet: bool) -> Result<()> {
    let changed = summary.changed.len();

    if quiet {
        println!(
            "Commit: {}  Changed: {}",
            summary.commit,
            if changed > 0 {
                changed.to_string().yellow()
            } else {
                changed.to_string().green()
            }
        );
        return Ok(());
    }

    println!(
        "\n {} v{}",
        "license-attribution".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(" Repository: {}", repo.display());
    println!(" Commit    : {}", summary.commit.to_string().cyan());
    let tool = match summary.tool {
        GateOutcome::Reused => "reused from cache".green(),
        GateOutcome::Built => "built".yellow(),
    };
    println!(" Tool      : {} ({})\n", tool, summary.cache_key);

    render_table(summary);
    println!();

    if changed == 0 {
        println!(" {} Attribution files are up to date.", "✓".green());
    } else {
        println!(
            " {} {} attribution file(s) differ from {}:",
            "⚠".yellow(),
            changed,
            summary.commit
        );
        for path in &summary.changed {
            println!("   {}", path.display());
        }
    }

    Ok(())
}

fn render_table(summary: &RunSummary) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Ecosystem").add_attribute(Attribute::Bold),
            Cell::new("Attribution file").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
        ]);

    for report in &summary.attributions {
        let color = match report.status {
            AttributionStatus::Created => Color::Cyan,
            AttributionStatus::Updated => Color::Yellow,
            AttributionStatus::Unchanged => Color::Green,
            AttributionStatus::Skipped => Color::DarkGrey,
        };

        table.add_row(vec![
            Cell::new(report.ecosystem.to_string()),
            Cell::new(report.output.display().to_string()),
            Cell::new(report.status.to_string())
                .fg(color)
                .set_alignment(CellAlignment::Center),
        ]);
    }

    println!("{}", table);
}
