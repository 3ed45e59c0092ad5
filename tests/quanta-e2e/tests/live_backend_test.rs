#![cfg(feature = "e2e")]

use anyhow::Result;
use quanta_engine::JobController;
use quanta_engine::backend::HttpBackend;
use quanta_engine::domain::{CalcType, JobStatus};
use quanta_engine::input::{MoleculeInput, OptionsBuilder};
use std::sync::Arc;
use std::time::Duration;

/// Runs a water single-point against the backend at `QUANTA_API_URL`
/// (default http://localhost:8000) without any demo fallback.
#[tokio::test]
async fn test_live_backend_water_energy() -> Result<()> {
    let base_url =
        std::env::var("QUANTA_API_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
    let backend = HttpBackend::new(base_url, Duration::from_secs(30))?;
    let controller = JobController::new(Arc::new(backend)).with_poll_interval(Duration::from_secs(2));

    let molecule = MoleculeInput::from_preset("Water")?;
    let options = OptionsBuilder::new().calc_type(CalcType::Energy).build()?;
    controller.submit(&molecule, &options).await?;

    let snap = tokio::time::timeout(Duration::from_secs(600), controller.wait_for_terminal()).await?;
    let job = snap.current_job.expect("a current job");
    assert_eq!(job.status, JobStatus::Completed, "error: {:?}", snap.last_error);
    job.check_consistency()?;
    println!("Water energy: {} Ha", job.results.map(|r| r.energy).unwrap_or_default());
    Ok(())
}
