//! Results dashboard rows and the two export formats (HTML lab report and
//! JSON data dump).

use crate::domain::{Job, JobStatus, SimulationResults};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const HARTREE_TO_EV: f64 = 27.2114;

pub fn to_ev(hartree: f64) -> f64 {
    hartree * HARTREE_TO_EV
}

pub fn dipole_magnitude(dipole: &[f64; 3]) -> f64 {
    dipole.iter().map(|c| c * c).sum::<f64>().sqrt()
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Job {job_id} is {status}; only completed jobs can be exported")]
    NotCompleted { job_id: String, status: JobStatus },
    #[error("Failed to serialize export: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn completed_results(job: &Job) -> Result<&SimulationResults, ReportError> {
    match (&job.status, &job.results) {
        (JobStatus::Completed, Some(results)) => Ok(results),
        _ => Err(ReportError::NotCompleted {
            job_id: job.id.clone(),
            status: job.status,
        }),
    }
}

/// One dashboard line: label, atomic-unit value, converted value.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub label: &'static str,
    pub atomic: String,
    pub converted: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultsSummary {
    pub rows: Vec<SummaryRow>,
    pub frequencies: Vec<(f64, Option<f64>)>,
}

impl ResultsSummary {
    pub fn from_results(results: &SimulationResults) -> Self {
        let row = |label, atomic: String, converted: Option<String>| SummaryRow {
            label,
            atomic,
            converted,
        };
        let [x, y, z] = results.dipole_moment;
        let rows = vec![
            row("Total Energy", format!("{:.6} Ha", results.energy), None),
            row(
                "HOMO Energy",
                format!("{:.4} Ha", results.homo_energy),
                Some(format!("{:.2} eV", to_ev(results.homo_energy))),
            ),
            row(
                "LUMO Energy",
                format!("{:.4} Ha", results.lumo_energy),
                Some(format!("{:.2} eV", to_ev(results.lumo_energy))),
            ),
            row(
                "HOMO-LUMO Gap",
                format!("{:.4} Ha", results.gap),
                Some(format!("{:.2} eV", to_ev(results.gap))),
            ),
            row(
                "Dipole Moment",
                format!("[{:.2}, {:.2}, {:.2}]", x, y, z),
                Some(format!("{:.4} D", dipole_magnitude(&results.dipole_moment))),
            ),
        ];

        let frequencies = results
            .frequencies
            .as_deref()
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let intensity = results
                    .intensities
                    .as_ref()
                    .and_then(|ints| ints.get(i).copied());
                (*f, intensity)
            })
            .collect();

        Self { rows, frequencies }
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const REPORT_STYLE: &str = "body { font-family: 'Helvetica Neue', Helvetica, Arial, sans-serif; line-height: 1.6; color: #333; max-width: 800px; margin: 0 auto; padding: 40px; }
.header { border-bottom: 2px solid #8b5cf6; padding-bottom: 20px; margin-bottom: 30px; }
.section { margin-bottom: 30px; background: #f9fafb; padding: 20px; border-radius: 8px; border: 1px solid #e5e7eb; }
table { width: 100%; border-collapse: collapse; margin-top: 10px; }
th, td { text-align: left; padding: 12px; border-bottom: 1px solid #ddd; }
.value { font-family: 'Courier New', monospace; font-weight: bold; color: #8b5cf6; }
.ai-analysis { background: #f0fdfa; border: 1px solid #ccfbf1; padding: 20px; border-radius: 8px; white-space: pre-wrap; }
.structure-block { background: #111; color: #0ea5e9; padding: 15px; border-radius: 6px; font-family: monospace; font-size: 12px; white-space: pre; }
.footer { margin-top: 50px; text-align: center; font-size: 12px; color: #9ca3af; }
@media print { body { padding: 0; } .section { break-inside: avoid; } }";

/// Renders a self-contained HTML lab report for a completed job.
pub fn html_report(job: &Job, ai_analysis: Option<&str>) -> Result<String, ReportError> {
    let results = completed_results(job)?;
    let summary = ResultsSummary::from_results(results);
    let name = escape_html(&job.molecule_name);

    let mut rows = String::new();
    for row in &summary.rows {
        rows.push_str(&format!(
            "<tr><td>{}</td><td class=\"value\">{}</td><td class=\"value\">{}</td></tr>\n",
            row.label,
            escape_html(&row.atomic),
            row.converted.as_deref().map(escape_html).unwrap_or_else(|| "-".to_string())
        ));
    }

    let analysis = ai_analysis
        .filter(|a| !a.trim().is_empty())
        .map(|a| {
            format!(
                "<div class=\"section\">\n<h2>AI Interpretation</h2>\n<div class=\"ai-analysis\">{}</div>\n</div>\n",
                escape_html(a)
            )
        })
        .unwrap_or_default();

    let geometry = results
        .optimized_structure
        .as_deref()
        .or(job.structure.as_deref())
        .unwrap_or("Structure not available");

    Ok(format!(
        "<!DOCTYPE html>
<html lang=\"en\">
<head>
<meta charset=\"UTF-8\">
<title>QuantaLab Report - {name}</title>
<style>
{style}
</style>
</head>
<body>
<div class=\"header\">
<h1>Computational Chemistry Report</h1>
<div class=\"meta\"><strong>Molecule:</strong> {name} &bull; <strong>Job ID:</strong> {id} &bull; <strong>Date:</strong> {date}</div>
</div>
<div class=\"section\">
<h2>Calculation Parameters</h2>
<table>
<tr><th>Method (Theory)</th><td>{theory}</td></tr>
<tr><th>Basis Set</th><td>{basis}</td></tr>
<tr><th>Software Engine</th><td>Psi4 via QuantaLab</td></tr>
</table>
</div>
<div class=\"section\">
<h2>Electronic Properties</h2>
<table>
<tr><th>Property</th><th>Value (Atomic Units)</th><th>Value (eV / Debye)</th></tr>
{rows}</table>
</div>
{analysis}<div class=\"section\">
<h2>Optimized Geometry (XYZ)</h2>
<div class=\"structure-block\">{geometry}</div>
</div>
<div class=\"footer\">Generated by QuantaLab</div>
</body>
</html>
",
        name = name,
        style = REPORT_STYLE,
        id = escape_html(&job.id),
        date = escape_html(&job.created_at),
        theory = escape_html(&job.theory),
        basis = escape_html(&job.basis_set),
        rows = rows,
        analysis = analysis,
        geometry = escape_html(geometry),
    ))
}

#[derive(Debug, Serialize)]
struct ExportMeta<'a> {
    version: &'static str,
    generated: String,
    job_id: &'a str,
}

#[derive(Debug, Serialize)]
struct ExportInput<'a> {
    molecule: &'a str,
    smiles: Option<&'a str>,
    theory: &'a str,
    basis: &'a str,
}

#[derive(Debug, Serialize)]
struct ExportDocument<'a> {
    meta: ExportMeta<'a>,
    input: ExportInput<'a>,
    output: &'a SimulationResults,
    ai_analysis: Option<&'a str>,
}

/// Pretty-printed JSON dump of a completed job, stamped with the current time.
pub fn json_export(job: &Job, ai_analysis: Option<&str>) -> Result<String, ReportError> {
    json_export_at(job, ai_analysis, Utc::now())
}

pub fn json_export_at(
    job: &Job,
    ai_analysis: Option<&str>,
    generated: DateTime<Utc>,
) -> Result<String, ReportError> {
    let results = completed_results(job)?;
    let doc = ExportDocument {
        meta: ExportMeta {
            version: "1.0",
            generated: generated.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            job_id: &job.id,
        },
        input: ExportInput {
            molecule: &job.molecule_name,
            smiles: job.smiles.as_deref(),
            theory: &job.theory,
            basis: &job.basis_set,
        },
        output: results,
        ai_analysis: ai_analysis.filter(|a| !a.trim().is_empty()),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Molecule name reduced to characters that are safe in a single path
/// component. Separators, dots and control characters become `_`.
fn file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "molecule".to_string()
    } else {
        stem
    }
}

pub fn report_file_name(job: &Job, date: NaiveDate) -> String {
    format!(
        "Report_{}_{}.html",
        file_stem(&job.molecule_name),
        date.format("%Y-%m-%d")
    )
}

pub fn data_file_name(job: &Job) -> String {
    format!("Data_{}.json", file_stem(&job.molecule_name))
}

/// Writes the HTML report into `dir` under its default file name.
pub async fn write_html_report(
    job: &Job,
    ai_analysis: Option<&str>,
    dir: &Path,
) -> Result<PathBuf, ReportError> {
    let html = html_report(job, ai_analysis)?;
    let path = dir.join(report_file_name(job, Utc::now().date_naive()));
    write_file(&path, html).await?;
    Ok(path)
}

pub async fn write_json_export(
    job: &Job,
    ai_analysis: Option<&str>,
    dir: &Path,
) -> Result<PathBuf, ReportError> {
    let json = json_export(job, ai_analysis)?;
    let path = dir.join(data_file_name(job));
    write_file(&path, json).await?;
    Ok(path)
}

async fn write_file(path: &Path, content: String) -> Result<(), ReportError> {
    tokio::fs::write(path, content)
        .await
        .map_err(|source| ReportError::Io {
            path: path.display().to_string(),
            source,
        })?;
    info!("Wrote {}", path.display());
    Ok(())
}
