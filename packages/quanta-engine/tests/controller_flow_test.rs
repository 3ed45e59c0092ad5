use quanta_engine::backend::{FallbackBackend, HttpBackend, InMemoryJobStore, SimulatedBackend};
use quanta_engine::domain::{CalculationOptions, JobStatus, MoleculeData};
use quanta_engine::{ControllerEvent, JobController};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const POLL: Duration = Duration::from_millis(20);

fn ethanol() -> MoleculeData {
    MoleculeData {
        name: "Ethanol".to_string(),
        smiles: Some("CCO".to_string()),
        structure: None,
        format: None,
    }
}

fn fallback_controller(base_url: String) -> (JobController, SimulatedBackend) {
    let http = HttpBackend::new(base_url, Duration::from_secs(2)).unwrap();
    let simulated = SimulatedBackend::new(Arc::new(InMemoryJobStore::new()))
        .with_delay(Duration::from_millis(60));
    let backend = FallbackBackend::new(http, simulated.clone());
    let controller = JobController::new(Arc::new(backend)).with_poll_interval(POLL);
    (controller, simulated)
}

fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    format!("http://{}", listener.local_addr().unwrap())
}

#[tokio::test]
async fn test_unreachable_backend_completes_in_demo_mode() {
    let (controller, simulated) = fallback_controller(closed_port_url());
    let mut events = controller.subscribe();

    let job = controller
        .submit(&ethanol(), &CalculationOptions::default())
        .await
        .unwrap();
    assert!(job.id.starts_with("mock_"));
    assert_eq!(job.status, JobStatus::Pending);

    let snap = tokio::time::timeout(Duration::from_secs(5), controller.wait_for_terminal())
        .await
        .expect("demo job should finish");

    let done = snap.current_job.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    let results = done.results.as_ref().unwrap();
    assert_eq!(results.energy, -76.421);
    assert!(results.optimized_structure.as_deref().unwrap().contains("Ethanol"));
    assert!(snap.last_error.is_none());
    assert_eq!(snap.history.len(), 1);
    assert_eq!(snap.view_target.format, "xyz");
    assert_eq!(simulated.store().len().await, 1);

    // Further polling does not duplicate the history entry.
    assert!(!controller.refresh().await);
    assert_eq!(controller.snapshot().history.len(), 1);

    let mut completed = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, ControllerEvent::Completed(_)) {
            completed += 1;
        }
    }
    assert_eq!(completed, 1);
}

#[tokio::test]
async fn test_invalid_smiles_surfaces_without_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/run_simulation"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "detail": "Invalid SMILES string" })),
        )
        .mount(&server)
        .await;
    let (controller, simulated) = fallback_controller(server.uri());

    let err = controller
        .submit(&ethanol(), &CalculationOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid SMILES string");

    let snap = controller.snapshot();
    assert_eq!(snap.last_error.as_deref(), Some("Invalid SMILES string"));
    assert!(snap.current_job.is_none());
    assert!(!snap.is_polling);
    assert_eq!(simulated.store().len().await, 0);
}

#[tokio::test]
async fn test_remote_404_stops_polling() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/run_simulation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "job_404",
            "status": "pending",
            "moleculeName": "Ethanol",
            "smiles": "CCO",
            "theory": "B3LYP",
            "basisSet": "6-31G*",
            "createdAt": "2026-01-01T00:00:00.000Z"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/results/job_404"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    let (controller, _) = fallback_controller(server.uri());

    controller
        .submit(&ethanol(), &CalculationOptions::default())
        .await
        .unwrap();
    let snap = tokio::time::timeout(Duration::from_secs(5), controller.wait_for_terminal())
        .await
        .expect("polling should stop");

    assert_eq!(snap.last_error.as_deref(), Some("Job not found"));
    assert!(!snap.is_polling);
    assert_eq!(snap.current_job.unwrap().status, JobStatus::Pending);

    // Several intervals later there has still been exactly one poll.
    tokio::time::sleep(POLL * 5).await;
    server.verify().await;
}
