mod dashboard;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};
use indicatif::ProgressBar;
use quanta_engine::assistant::{ChatSession, GeminiClient, ResultsAnalyst, TextGenerator};
use quanta_engine::backend::{
    FallbackBackend, HttpBackend, InMemoryJobStore, SimulatedBackend, SimulationBackend,
};
use quanta_engine::config::{self, QuantaConfig};
use quanta_engine::domain::constants::PRESET_MOLECULES;
use quanta_engine::domain::{
    BasisSet, CalcType, CalculationOptions, JobStatus, MoleculeData, Solvent, Theory,
};
use quanta_engine::input::{MoleculeInput, OptionsBuilder};
use quanta_engine::logging::SessionJournal;
use quanta_engine::report;
use quanta_engine::{ControllerEvent, JobController};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "quanta", version, about = "Submit and track quantum chemistry calculations")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Directory holding .quantalab/ (config, session journal)
    #[arg(short, long, global = true)]
    work_dir: Option<PathBuf>,

    /// Compute backend base URL (overrides config)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Never switch to simulated results when the backend is unreachable
    #[arg(long, global = true)]
    no_fallback: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a molecule and follow it until it finishes
    Run(RunArgs),
    /// Poll a job once
    Status {
        job_id: String,
        /// Print the raw job JSON
        #[arg(long)]
        raw: bool,
    },
    /// Download the backend-generated report for a job
    Download {
        job_id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Talk to the lab assistant
    Chat,
    /// List the preset molecules
    Presets,
    /// List the available calculation options
    Options,
    /// Write a default config file
    Init,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// SMILES string
    #[arg(long, conflicts_with_all = ["preset", "file"])]
    smiles: Option<String>,

    /// Molecule name (defaults to the file name for uploads)
    #[arg(long)]
    name: Option<String>,

    /// Preset molecule name
    #[arg(long, conflicts_with = "file")]
    preset: Option<String>,

    /// Structure file (.xyz, .mol, .pdb, .sdf)
    #[arg(long)]
    file: Option<PathBuf>,

    #[arg(long)]
    theory: Option<Theory>,

    #[arg(long)]
    basis: Option<BasisSet>,

    #[arg(long)]
    calc_type: Option<CalcType>,

    #[arg(long, allow_hyphen_values = true)]
    charge: Option<i32>,

    #[arg(long)]
    multiplicity: Option<u32>,

    #[arg(long)]
    solvent: Option<Solvent>,

    /// Write the HTML lab report
    #[arg(long)]
    html: bool,

    /// Write the JSON data export
    #[arg(long)]
    json: bool,

    /// Directory for exports (defaults to the working directory)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Ask the assistant to interpret the results
    #[arg(long)]
    analyze: bool,

    /// Skip prompts and confirmation
    #[arg(short, long)]
    yes: bool,
}

fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("info,quanta_cli=debug,quanta_engine=debug")
    } else {
        EnvFilter::new("warn,quanta_cli=info,quanta_engine=info")
    };

    fmt::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

async fn resolve_config(cli: &Cli, work_dir: &Path) -> Result<QuantaConfig> {
    let mut config = config::load_config(work_dir).await?;
    if let Some(url) = &cli.api_url {
        config.api_base_url = url.clone();
    }
    if cli.no_fallback {
        config.demo_fallback = false;
    }
    config.validate().context("Invalid command line overrides")?;
    Ok(config)
}

fn build_backend(config: &QuantaConfig) -> Result<(Arc<dyn SimulationBackend>, HttpBackend)> {
    let http = HttpBackend::new(&config.api_base_url, config.request_timeout())
        .context("Failed to create HTTP client")?;
    let backend: Arc<dyn SimulationBackend> = if config.demo_fallback {
        let simulated = SimulatedBackend::new(Arc::new(InMemoryJobStore::new()))
            .with_delay(config.simulated_delay());
        Arc::new(FallbackBackend::new(http.clone(), simulated))
    } else {
        Arc::new(http.clone())
    };
    Ok((backend, http))
}

fn build_assistant(config: &QuantaConfig) -> Result<Arc<dyn TextGenerator>> {
    let client = GeminiClient::new(config.gemini_api_key.clone())
        .context("Failed to create assistant client")?
        .with_model(&config.gemini_model)
        .with_base_url(&config.gemini_base_url);
    Ok(Arc::new(client))
}

fn theme() -> ColorfulTheme {
    ColorfulTheme::default()
}

fn select<T: Copy + PartialEq + std::fmt::Display>(prompt: &str, items: &[T], default: T) -> Result<T> {
    let labels: Vec<String> = items.iter().map(|i| i.to_string()).collect();
    let default_idx = items.iter().position(|i| *i == default).unwrap_or(0);
    let idx = Select::with_theme(&theme())
        .with_prompt(prompt)
        .items(&labels)
        .default(default_idx)
        .interact()?;
    Ok(items[idx])
}

async fn resolve_molecule(args: &RunArgs) -> Result<MoleculeData> {
    if let Some(path) = &args.file {
        return Ok(MoleculeInput::from_file(path, args.name.as_deref()).await?);
    }
    if let Some(preset) = &args.preset {
        return Ok(MoleculeInput::from_preset(preset)?);
    }
    if let Some(smiles) = &args.smiles {
        let name = match &args.name {
            Some(name) => name.clone(),
            None if args.yes => "Unknown".to_string(),
            None => Input::with_theme(&theme())
                .with_prompt("Molecule name")
                .interact_text()?,
        };
        return Ok(MoleculeInput::from_smiles(&name, smiles)?);
    }
    if args.yes {
        bail!("No molecule given. Use --smiles, --preset or --file.");
    }

    let mut choices: Vec<String> = PRESET_MOLECULES
        .iter()
        .map(|p| format!("{} ({})", p.name, p.smiles))
        .collect();
    choices.push("Custom SMILES".to_string());
    choices.push("Upload structure file".to_string());
    let idx = Select::with_theme(&theme())
        .with_prompt("Molecule")
        .items(&choices)
        .default(0)
        .interact()?;

    if idx < PRESET_MOLECULES.len() {
        let preset = &PRESET_MOLECULES[idx];
        return Ok(MoleculeInput::from_smiles(preset.name, preset.smiles)?);
    }
    if idx == PRESET_MOLECULES.len() {
        let name: String = Input::with_theme(&theme())
            .with_prompt("Molecule name")
            .interact_text()?;
        let smiles: String = Input::with_theme(&theme())
            .with_prompt("SMILES")
            .interact_text()?;
        return Ok(MoleculeInput::from_smiles(&name, &smiles)?);
    }
    let path: String = Input::with_theme(&theme())
        .with_prompt("Structure file (.xyz, .mol, .pdb, .sdf)")
        .interact_text()?;
    Ok(MoleculeInput::from_file(Path::new(path.trim()), args.name.as_deref()).await?)
}

fn resolve_options(args: &RunArgs) -> Result<CalculationOptions> {
    let defaults = CalculationOptions::default();
    let interactive = !args.yes;

    let theory = match args.theory {
        Some(t) => t,
        None if interactive => select("Theory", Theory::ALL, defaults.theory)?,
        None => defaults.theory,
    };
    let basis = match args.basis {
        Some(b) => b,
        None if interactive => select("Basis set", BasisSet::ALL, defaults.basis)?,
        None => defaults.basis,
    };
    let calc_type = match args.calc_type {
        Some(c) => c,
        None if interactive => select("Calculation", CalcType::ALL, defaults.calc_type)?,
        None => defaults.calc_type,
    };

    let mut builder = OptionsBuilder::new()
        .theory(theory)
        .basis(basis)
        .calc_type(calc_type);
    if let Some(charge) = args.charge {
        builder = builder.charge(charge);
    }
    if let Some(multiplicity) = args.multiplicity {
        builder = builder.multiplicity(multiplicity);
    }
    if let Some(solvent) = args.solvent {
        builder = builder.solvation(solvent);
    }
    Ok(builder.build()?)
}

fn confirm_submit(args: &RunArgs, molecule: &MoleculeData, options: &CalculationOptions) -> Result<bool> {
    println!(
        "\n{} {}  {} / {} / {}",
        style("Ready:").bold(),
        style(&molecule.name).cyan().bold(),
        options.theory,
        options.basis,
        options.calc_type.label()
    );
    if args.yes {
        return Ok(true);
    }
    Confirm::with_theme(&theme())
        .with_prompt("Submit calculation?")
        .default(true)
        .interact()
        .context("Failed to read confirmation")
}

fn status_message(event: &ControllerEvent) -> Option<String> {
    match event {
        ControllerEvent::Submitted(job) => Some(format!("Submitted {} ({})", job.molecule_name, job.id)),
        ControllerEvent::JobUpdated(job) => Some(format!("{}: {}", job.molecule_name, job.status)),
        _ => None,
    }
}

async fn run(cli: &Cli, args: &RunArgs, work_dir: &Path) -> Result<()> {
    let config = resolve_config(cli, work_dir).await?;
    let molecule = resolve_molecule(args).await?;
    let options = resolve_options(args)?;
    if !confirm_submit(args, &molecule, &options)? {
        println!("{}", style("Cancelled.").yellow());
        return Ok(());
    }

    let (backend, _) = build_backend(&config)?;
    let controller = JobController::new(backend).with_poll_interval(config.poll_interval());
    let journal = SessionJournal::new(&work_dir.join(config::CONFIG_DIR)).await?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("Submitting {}", molecule.name));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut events = controller.subscribe();
    let progress = spinner.clone();
    let journal_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(msg) = status_message(&event) {
                        progress.set_message(msg);
                    }
                    if let Err(e) = journal.record(&event).await {
                        warn!("Failed to write session journal: {}", e);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Session journal skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        journal
    });

    let submitted = controller.submit(&molecule, &options).await;
    let snapshot = match submitted {
        Ok(job) => {
            info!("Tracking job {}", job.id);
            controller.wait_for_terminal().await
        }
        Err(_) => controller.snapshot(),
    };
    spinner.finish_and_clear();

    let view_target = snapshot.view_target.clone();
    controller.shutdown();
    drop(controller);
    let journal = match tokio::time::timeout(Duration::from_secs(2), journal_task).await {
        Ok(Ok(journal)) => Some(journal),
        _ => None,
    };

    let Some(job) = snapshot.current_job else {
        bail!(
            "{}",
            snapshot
                .last_error
                .unwrap_or_else(|| "Submission failed".to_string())
        );
    };

    dashboard::print_structure(&view_target, Some(&job));
    dashboard::print_job(&job);

    if job.status != JobStatus::Completed {
        bail!(
            "{}",
            snapshot
                .last_error
                .unwrap_or_else(|| format!("Job {} did not complete", job.id))
        );
    }

    let mut analysis = None;
    if args.analyze {
        if let Some(results) = &job.results {
            let spinner = ProgressBar::new_spinner();
            spinner.set_message("Analyzing results");
            spinner.enable_steady_tick(Duration::from_millis(100));
            let analyst = ResultsAnalyst::new(build_assistant(&config)?);
            let text = analyst.analyze(results, &job.molecule_name).await;
            spinner.finish_and_clear();
            println!("\n{}", style("AI Interpretation").bold().green());
            println!("{}", text);
            analysis = Some(text);
        }
    }

    let out_dir = args.out_dir.clone().unwrap_or_else(|| work_dir.to_path_buf());
    if args.html || args.json {
        tokio::fs::create_dir_all(&out_dir).await?;
    }
    let mut written = Vec::new();
    if args.html {
        written.push(report::write_html_report(&job, analysis.as_deref(), &out_dir).await?);
    }
    if args.json {
        written.push(report::write_json_export(&job, analysis.as_deref(), &out_dir).await?);
    }
    for path in &written {
        println!("{} {}", style("Wrote").green(), path.display());
        if let Some(journal) = &journal {
            journal.log_export_written(&job.id, path).await?;
        }
    }

    Ok(())
}

async fn status(cli: &Cli, job_id: &str, raw: bool, work_dir: &Path) -> Result<()> {
    let config = resolve_config(cli, work_dir).await?;
    let (backend, _) = build_backend(&config)?;
    let job = backend.poll(job_id).await?;
    if raw {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }
    dashboard::print_job(&job);
    Ok(())
}

async fn download(cli: &Cli, job_id: &str, out: Option<PathBuf>, work_dir: &Path) -> Result<()> {
    let config = resolve_config(cli, work_dir).await?;
    let (_, http) = build_backend(&config)?;
    let dest = out.unwrap_or_else(|| work_dir.join(format!("{}_report.json", job_id)));
    let bytes = http
        .download_report(job_id, &dest)
        .await
        .with_context(|| format!("Failed to download report from {}", http.report_download_url(job_id)))?;
    println!(
        "{} {} ({} bytes)",
        style("Saved").green(),
        dest.display(),
        bytes
    );
    Ok(())
}

async fn chat(cli: &Cli, work_dir: &Path) -> Result<()> {
    let config = resolve_config(cli, work_dir).await?;
    let mut session = ChatSession::new(build_assistant(&config)?);
    println!("{}", style("Quantum Assistant").bold().on_blue().white());
    println!("{}", style("Type /reset to start over, /exit to leave.").dim());
    if let Some(greeting) = session.messages().first() {
        println!("\n{}", style(&greeting.text).cyan());
    }

    loop {
        let line: String = Input::with_theme(&theme())
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;
        match line.trim() {
            "/exit" | "/quit" => break,
            "/reset" => {
                session.reset();
                if let Some(greeting) = session.messages().first() {
                    println!("\n{}", style(&greeting.text).cyan());
                }
            }
            text => {
                let spinner = ProgressBar::new_spinner();
                spinner.enable_steady_tick(Duration::from_millis(100));
                let reply = session.send(text).await.map(|m| m.text.clone());
                spinner.finish_and_clear();
                if let Some(reply) = reply {
                    println!("\n{}\n", style(reply).cyan());
                }
            }
        }
    }
    Ok(())
}

fn print_presets() {
    println!("{}", style("Preset molecules").bold());
    for preset in PRESET_MOLECULES {
        println!("  {:<10} {}", preset.name, style(preset.smiles).dim());
    }
}

fn print_options() {
    fn list<T: std::fmt::Display>(title: &str, items: &[T]) {
        let names: Vec<String> = items.iter().map(|i| i.to_string()).collect();
        println!("  {:<12} {}", style(title).bold(), names.join(", "));
    }
    let defaults = CalculationOptions::default();
    println!("{}", style("Calculation options").bold());
    list("theory", Theory::ALL);
    list("basis", BasisSet::ALL);
    list("calc-type", CalcType::ALL);
    list("solvent", Solvent::ALL);
    println!(
        "\n  defaults: {} / {} / {}, charge 0, multiplicity 1, {}",
        defaults.theory,
        defaults.basis,
        defaults.calc_type,
        Solvent::Vacuum
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.debug);

    let work_dir = cli.work_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    if !work_dir.exists() {
        tokio::fs::create_dir_all(&work_dir).await?;
    }

    match &cli.command {
        Command::Run(args) => run(&cli, args, &work_dir).await,
        Command::Status { job_id, raw } => status(&cli, job_id, *raw, &work_dir).await,
        Command::Download { job_id, out } => download(&cli, job_id, out.clone(), &work_dir).await,
        Command::Chat => chat(&cli, &work_dir).await,
        Command::Presets => {
            print_presets();
            Ok(())
        }
        Command::Options => {
            print_options();
            Ok(())
        }
        Command::Init => {
            let path = config::ensure_config(&work_dir).await?;
            println!("{} {}", style("Config at").green(), path.display());
            Ok(())
        }
    }
}
