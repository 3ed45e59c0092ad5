use anyhow::Result;
use quanta_engine::backend::{FallbackBackend, InMemoryJobStore, SimulatedBackend};
use quanta_engine::domain::constants::PRESET_MOLECULES;
use quanta_engine::domain::{CalcType, CalculationOptions, JobStatus, MoleculeData};
use quanta_engine::input::{InputError, MoleculeInput, OptionsBuilder};
use quanta_engine::logging::{LogEvent, SessionEventType, SessionJournal};
use quanta_engine::report;
use quanta_engine::testing::MockBackend;
use quanta_engine::viewer::ViewTarget;
use quanta_engine::{ControllerEvent, JobController};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

/// A controller whose primary backend is always unreachable, so every job
/// runs through the simulated backend.
fn offline_controller() -> (JobController, MockBackend) {
    let primary = MockBackend::new();
    let simulated = SimulatedBackend::new(Arc::new(InMemoryJobStore::new()));
    let backend = FallbackBackend::new(primary.clone(), simulated);
    (JobController::new(Arc::new(backend)), primary)
}

#[tokio::test(start_paused = true)]
async fn test_ethanol_demo_session_end_to_end() -> Result<()> {
    let tmp = tempdir()?;
    let (controller, primary) = offline_controller();
    let journal = SessionJournal::new(tmp.path()).await?;
    let mut events = controller.subscribe();

    let molecule = MoleculeInput::from_preset("Ethanol")?;
    let job = controller
        .submit(&molecule, &CalculationOptions::default())
        .await?;
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(primary.submit_calls(), 1);

    let snap = controller.wait_for_terminal().await;
    let done = snap.current_job.clone().expect("a current job");
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.check_consistency().is_ok());
    assert!(snap.last_error.is_none());
    assert_eq!(snap.history.len(), 1);
    assert_eq!(snap.view_target.format, "xyz");
    assert!(snap.view_target.structure.contains("Ethanol"));

    let mut ranks = vec![job.status.rank()];
    let mut completions = 0;
    while let Ok(event) = events.try_recv() {
        match &event {
            ControllerEvent::JobUpdated(job) => ranks.push(job.status.rank()),
            ControllerEvent::Completed(_) => completions += 1,
            _ => {}
        }
        journal.record(&event).await?;
    }
    assert!(ranks.windows(2).all(|w| w[0] <= w[1]), "status went backwards: {:?}", ranks);
    assert_eq!(completions, 1);

    let html = report::write_html_report(&done, None, tmp.path()).await?;
    let json = report::write_json_export(&done, Some("Polar and stable."), tmp.path()).await?;
    journal.log_export_written(&done.id, &json).await?;
    assert!(tokio::fs::read_to_string(&html).await?.contains("Computational Chemistry Report"));
    let exported: serde_json::Value = serde_json::from_str(&tokio::fs::read_to_string(&json).await?)?;
    assert_eq!(exported["meta"]["job_id"], done.id.as_str());
    assert_eq!(exported["ai_analysis"], "Polar and stable.");

    let lines = tokio::fs::read_to_string(journal.log_file_path()).await?;
    let types: Vec<SessionEventType> = lines
        .lines()
        .map(|l| serde_json::from_str::<LogEvent>(l).map(|e| e.event_type))
        .collect::<Result<_, _>>()?;
    assert_eq!(types.first(), Some(&SessionEventType::Submitted));
    assert!(types.contains(&SessionEventType::Completed));
    assert_eq!(types.last(), Some(&SessionEventType::ExportWritten));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_simulated_submissions_start_pending() -> Result<()> {
    let (controller, _) = offline_controller();
    for preset in PRESET_MOLECULES {
        let molecule = MoleculeInput::from_smiles(preset.name, preset.smiles)?;
        let job = controller
            .submit(&molecule, &CalculationOptions::default())
            .await?;
        assert_eq!(job.status, JobStatus::Pending, "{}", preset.name);
        assert!(job.results.is_none());
        assert!(job.error.is_none());
    }
    Ok(())
}

#[tokio::test]
async fn test_docx_upload_is_rejected_before_submission() {
    let (controller, primary) = offline_controller();
    let err = MoleculeInput::from_upload("structure.docx", "PK\u{3}\u{4}", None).unwrap_err();
    assert!(matches!(err, InputError::UnsupportedFormat(_)));
    assert_eq!(primary.submit_calls(), 0);
    assert!(controller.snapshot().current_job.is_none());
    assert!(controller.snapshot().history.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_history_keeps_completion_order_and_reload_is_idempotent() -> Result<()> {
    let (controller, _) = offline_controller();
    let mut ids = Vec::new();
    for name in ["Water", "Benzene", "Caffeine"] {
        let molecule = MoleculeInput::from_preset(name)?;
        let options = OptionsBuilder::new().calc_type(CalcType::Energy).build()?;
        ids.push(controller.submit(&molecule, &options).await?.id);
        controller.wait_for_terminal().await;
    }

    let listed: Vec<String> = controller
        .snapshot()
        .history
        .iter()
        .map(|j| j.id.clone())
        .collect();
    assert_eq!(listed, ids);

    for id in ids.iter().rev() {
        let loaded = controller.load_from_history(id).expect("history entry");
        assert_eq!(&loaded.id, id);
        let snap = controller.snapshot();
        assert!(!snap.is_polling);
        assert_eq!(snap.history.len(), 3);
        assert_eq!(snap.current_job.map(|j| j.id), Some(id.clone()));
    }

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(controller.snapshot().history.len(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_pdb_upload_keeps_input_structure_in_viewer() -> Result<()> {
    let (controller, _) = offline_controller();
    let pdb = "HETATM    1  O   HOH A   1       0.000   0.000   0.000  1.00  0.00           O\nEND\n";
    let molecule: MoleculeData = MoleculeInput::from_upload("water.pdb", pdb, None)?;

    let job = controller
        .submit(&molecule, &CalculationOptions::default())
        .await?;
    assert_eq!(controller.snapshot().view_target, ViewTarget::new(pdb, "pdb"));

    let snap = controller.wait_for_terminal().await;
    let done = snap.current_job.expect("a current job");
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.results.as_ref().and_then(|r| r.optimized_structure.as_ref()).is_none());
    assert_eq!(snap.view_target, ViewTarget::new(pdb, "pdb"));

    controller.load_from_history(&job.id).expect("history entry");
    assert_eq!(controller.snapshot().view_target, ViewTarget::new(pdb, "pdb"));

    let html = report::html_report(&done, None)?;
    assert!(html.contains("HETATM"));
    Ok(())
}
