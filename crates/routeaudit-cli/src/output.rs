//! Rendering of audit reports.
//!
//! Text output prints one line per diagnostic followed by a summary; JSON
//! output serializes the report together with the severity counts.

use std::io::{self, Write};

use clap::ValueEnum;
use serde::Serialize;

use routeaudit_lib::{AuditReport, Diagnostic, Severity};

use crate::terminal::ColorPalette;

/// Output formats accepted by `--format`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a AuditReport,
    errors: usize,
    warnings: usize,
}

/// Write `report` to `out` in the requested format.
pub fn render<W: Write>(
    out: &mut W,
    report: &AuditReport,
    format: OutputFormat,
    palette: &ColorPalette,
) -> io::Result<()> {
    match format {
        OutputFormat::Text => render_text(out, report, palette),
        OutputFormat::Json => render_json(out, report),
    }
}

/// Human-readable listing, one diagnostic per line.
pub fn render_text<W: Write>(
    out: &mut W,
    report: &AuditReport,
    palette: &ColorPalette,
) -> io::Result<()> {
    for diagnostic in &report.diagnostics {
        writeln!(out, "{}", format_diagnostic(diagnostic, palette))?;
    }
    if !report.diagnostics.is_empty() {
        writeln!(out)?;
    }
    writeln!(
        out,
        "{}{}{}",
        palette.white_bold,
        summary_line(report),
        palette.reset
    )
}

pub fn render_json<W: Write>(out: &mut W, report: &AuditReport) -> io::Result<()> {
    let document = JsonReport {
        report,
        errors: report.count(Severity::Error),
        warnings: report.count(Severity::Warning),
    };
    serde_json::to_writer_pretty(&mut *out, &document)?;
    writeln!(out)
}

/// `SEVERITY - <context> - <message>`, colored by severity.
pub fn format_diagnostic(diagnostic: &Diagnostic, palette: &ColorPalette) -> String {
    format!(
        "{}{}{} - {}{}{} - {}",
        palette.severity(diagnostic.severity),
        diagnostic.severity.label(),
        palette.reset,
        palette.gray,
        diagnostic.subject.context(),
        palette.reset,
        diagnostic.message
    )
}

/// Relation count, severity totals and the faulty relation ids.
pub fn summary_line(report: &AuditReport) -> String {
    let faulty = if report.faulty_routes.is_empty() {
        "none".to_string()
    } else {
        report
            .faulty_routes
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "Checked {} relations: {} errors, {} warnings. Faulty relations: {}",
        report.checked_routes,
        report.count(Severity::Error),
        report.count(Severity::Warning),
        faulty
    )
}
