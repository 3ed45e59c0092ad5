use console::style;
use quanta_engine::domain::{Job, JobStatus};
use quanta_engine::history::JobHistory;
use quanta_engine::report::ResultsSummary;
use quanta_engine::viewer::{StructureRenderer, TextRenderer, ViewOverlay, ViewTarget};
use tracing::warn;

pub fn status_label(status: JobStatus) -> String {
    let text = status.as_str().to_uppercase();
    match status {
        JobStatus::Pending => style(text).yellow().to_string(),
        JobStatus::Running => style(text).cyan().to_string(),
        JobStatus::Completed => style(text).green().bold().to_string(),
        JobStatus::Failed => style(text).red().bold().to_string(),
    }
}

/// Plain-text results table; empty when the job has no results yet.
pub fn results_table(job: &Job) -> String {
    let Some(results) = job.results.as_ref() else {
        return String::new();
    };
    let summary = ResultsSummary::from_results(results);
    let mut out = String::new();
    for row in &summary.rows {
        out.push_str(&format!(
            "  {:<16}{:>26}  {}\n",
            row.label,
            row.atomic,
            row.converted.as_deref().unwrap_or("")
        ));
    }
    if !summary.frequencies.is_empty() {
        out.push_str("  Vibrational frequencies (cm^-1):\n");
        for (freq, intensity) in &summary.frequencies {
            match intensity {
                Some(i) => out.push_str(&format!("    {:>10.1}  intensity {:.1}\n", freq, i)),
                None => out.push_str(&format!("    {:>10.1}\n", freq)),
            }
        }
    }
    out
}

pub fn print_job(job: &Job) {
    println!(
        "\n{} {}  {}",
        style("Job").bold(),
        style(&job.id).dim(),
        status_label(job.status)
    );
    println!(
        "  {} / {} / {}",
        style(&job.molecule_name).bold().cyan(),
        job.theory,
        job.basis_set
    );
    if let Some(error) = &job.error {
        println!("  {}", style(error).red());
    }
    let table = results_table(job);
    if !table.is_empty() {
        println!("\n{}", style("Electronic Properties").bold().green());
        print!("{}", table);
    }
}

pub fn print_structure(target: &ViewTarget, job: Option<&Job>) {
    let overlay = ViewOverlay::from_results(job.and_then(|j| j.results.as_ref()));
    println!("\n{}", style("Structure").bold().green());
    if let Err(e) = TextRenderer::default().render(target, &overlay) {
        warn!("Could not render structure: {}", e);
        println!("  {}", style(format!("Could not render structure: {}", e)).yellow());
    }
}

pub fn print_history(history: &JobHistory) {
    if history.is_empty() {
        return;
    }
    println!("\n{}", style("Session history").bold());
    for job in history.iter() {
        println!(
            "  {} {:<12} {}",
            style(&job.id).dim(),
            job.molecule_name,
            status_label(job.status)
        );
    }
}
