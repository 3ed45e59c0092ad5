use super::simulated::SimulatedBackend;
use super::{ClientError, SimulationBackend};
use crate::domain::{CalculationOptions, Job, MoleculeData};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Routes calls to `primary` and switches to the simulated backend only when
/// the primary is unreachable. Rejections, not-found answers and malformed
/// responses from a reachable primary are returned unchanged.
pub struct FallbackBackend<P> {
    primary: P,
    simulated: SimulatedBackend,
}

impl<P: SimulationBackend> FallbackBackend<P> {
    pub fn new(primary: P, simulated: SimulatedBackend) -> Self {
        Self { primary, simulated }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn simulated(&self) -> &SimulatedBackend {
        &self.simulated
    }
}

#[async_trait]
impl<P: SimulationBackend> SimulationBackend for FallbackBackend<P> {
    async fn submit(
        &self,
        molecule: &MoleculeData,
        options: &CalculationOptions,
    ) -> Result<Job, ClientError> {
        match self.primary.submit(molecule, options).await {
            Err(err) if err.is_network() => {
                warn!(
                    "Backend unreachable ({}). Switching to demo mode with simulated data.",
                    err
                );
                self.simulated.submit(molecule, options).await
            }
            other => other,
        }
    }

    async fn poll(&self, job_id: &str) -> Result<Job, ClientError> {
        match self.primary.poll(job_id).await {
            Err(err) if err.is_network() => {
                debug!("Backend unreachable during polling, checking local store");
                self.simulated.poll(job_id).await
            }
            other => other,
        }
    }
}
