use super::store::{JobStore, JobTransition};
use super::{ClientError, SimulationBackend};
use crate::domain::constants::{self, METHANE_XYZ};
use crate::domain::{CalcType, CalculationOptions, Job, JobStatus, MoleculeData};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_SIMULATED_DELAY: Duration = Duration::from_millis(2500);

/// Local stand-in for the compute service. Every submission starts `pending`,
/// turns `running` halfway through `delay`, and completes with the canned
/// results once `delay` has elapsed.
#[derive(Clone)]
pub struct SimulatedBackend {
    store: Arc<dyn JobStore>,
    delay: Duration,
}

impl SimulatedBackend {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            delay: DEFAULT_SIMULATED_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    fn new_job(molecule: &MoleculeData, options: &CalculationOptions) -> Job {
        let name = if molecule.name.trim().is_empty() {
            "Unknown".to_string()
        } else {
            molecule.name.clone()
        };
        let (structure, format) = match molecule.uploaded_structure() {
            Some((s, f)) => (Some(s.to_string()), Some(f.to_string())),
            None => (None, None),
        };
        Job {
            id: format!("mock_{}", uuid::Uuid::new_v4().simple()),
            status: JobStatus::Pending,
            molecule_name: name,
            smiles: if structure.is_some() {
                None
            } else {
                molecule.smiles.clone()
            },
            structure,
            format,
            theory: options.theory.to_string(),
            basis_set: options.basis.to_string(),
            created_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            results: None,
            error: None,
        }
    }
}

/// Results the simulated backend attaches to `job` on completion.
///
/// An uploaded XYZ structure is echoed back as the optimized geometry. Other
/// uploads get no optimized geometry, so viewers keep the input structure in
/// its own format. SMILES jobs get the canned geometry for the molecule name.
pub fn simulated_results(job: &Job, calc_type: CalcType) -> crate::domain::SimulationResults {
    let optimized = match (job.structure.as_deref(), job.format.as_deref()) {
        (Some(structure), Some(format)) if format.eq_ignore_ascii_case("xyz") => {
            Some(structure.to_string())
        }
        (Some(_), _) => None,
        (None, _) => Some(
            constants::canned_structure(&job.molecule_name)
                .unwrap_or(METHANE_XYZ)
                .to_string(),
        ),
    };

    let mut results = constants::mock_results();
    results.optimized_structure = optimized;
    if calc_type == CalcType::Frequency {
        results.frequencies = Some(constants::MOCK_FREQUENCIES.to_vec());
        results.intensities = Some(constants::MOCK_INTENSITIES.to_vec());
    }
    results
}

#[async_trait]
impl SimulationBackend for SimulatedBackend {
    async fn submit(
        &self,
        molecule: &MoleculeData,
        options: &CalculationOptions,
    ) -> Result<Job, ClientError> {
        let job = Self::new_job(molecule, options);
        self.store.insert(job.clone()).await;
        debug!(job_id = %job.id, "Simulated backend accepted job");

        let store = self.store.clone();
        let delay = self.delay;
        let calc_type = options.calc_type;
        let pending = job.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay / 2).await;
            store.transition(&pending.id, JobTransition::Start).await;
            tokio::time::sleep(delay - delay / 2).await;
            let results = simulated_results(&pending, calc_type);
            store
                .transition(&pending.id, JobTransition::Complete(results))
                .await;
            debug!(job_id = %pending.id, "Simulated job completed");
        });

        Ok(job)
    }

    async fn poll(&self, job_id: &str) -> Result<Job, ClientError> {
        self.store
            .get(job_id)
            .await
            .ok_or_else(|| ClientError::NotFound {
                job_id: job_id.to_string(),
                local: true,
            })
    }
}
