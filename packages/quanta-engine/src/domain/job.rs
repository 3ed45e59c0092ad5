use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lifecycle status of a submitted job. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Position in the forward-only ordering. Both terminal states share the top rank.
    pub fn rank(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Running => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computed properties attached to a completed job. Energies are in Hartree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResults {
    pub energy: f64,
    pub dipole_moment: [f64; 3],
    pub homo_energy: f64,
    pub lumo_energy: f64,
    pub gap: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequencies: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensities: Option<Vec<f64>>,
    /// XYZ text of the optimized geometry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized_structure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orbitals_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homo_cube_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lumo_cube_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_log: Option<String>,
}

/// One submitted simulation and its evolving status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub molecule_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smiles: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub theory: String,
    pub basis_set: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<SimulationResults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobModelError {
    #[error("job {0} is completed but carries no results")]
    MissingResults(String),
    #[error("job {0} carries results but is not completed")]
    UnexpectedResults(String),
    #[error("job {0} is failed but carries no error message")]
    MissingError(String),
    #[error("job {0} carries an error but is not failed")]
    UnexpectedError(String),
    #[error("job {0} has both a SMILES string and an uploaded structure")]
    AmbiguousInput(String),
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The structure a viewer should show for this job: the optimized geometry
    /// when the backend produced one, otherwise the uploaded input.
    pub fn display_structure(&self) -> Option<(&str, &str)> {
        if let Some(optimized) = self
            .results
            .as_ref()
            .and_then(|r| r.optimized_structure.as_deref())
        {
            return Some((optimized, "xyz"));
        }
        match (self.structure.as_deref(), self.format.as_deref()) {
            (Some(structure), Some(format)) => Some((structure, format)),
            _ => None,
        }
    }

    /// Checks the presence rules between status, results and error.
    pub fn check_consistency(&self) -> Result<(), JobModelError> {
        let id = || self.id.clone();
        if self.smiles.is_some() && self.structure.is_some() {
            return Err(JobModelError::AmbiguousInput(id()));
        }
        match (self.status, self.results.is_some(), self.error.is_some()) {
            (JobStatus::Completed, false, _) => Err(JobModelError::MissingResults(id())),
            (JobStatus::Completed, true, true) => Err(JobModelError::UnexpectedError(id())),
            (JobStatus::Failed, _, false) => Err(JobModelError::MissingError(id())),
            (JobStatus::Failed, true, true) => Err(JobModelError::UnexpectedResults(id())),
            (JobStatus::Pending | JobStatus::Running, true, _) => {
                Err(JobModelError::UnexpectedResults(id()))
            }
            (JobStatus::Pending | JobStatus::Running, false, true) => {
                Err(JobModelError::UnexpectedError(id()))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_job() -> Job {
        Job {
            id: "job_1".to_string(),
            status: JobStatus::Pending,
            molecule_name: "Water".to_string(),
            smiles: Some("O".to_string()),
            structure: None,
            format: None,
            theory: "HF".to_string(),
            basis_set: "STO-3G".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            results: None,
            error: None,
        }
    }

    #[test]
    fn test_status_rank_is_forward_only() {
        assert!(JobStatus::Pending.rank() < JobStatus::Running.rank());
        assert!(JobStatus::Running.rank() < JobStatus::Completed.rank());
        assert_eq!(JobStatus::Completed.rank(), JobStatus::Failed.rank());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_deserializes_backend_payload() {
        let payload = r#"{
            "id": "abc",
            "status": "completed",
            "moleculeName": "Ethanol",
            "smiles": "CCO",
            "theory": "B3LYP",
            "basisSet": "6-31G*",
            "createdAt": "2026-01-01T00:00:00Z",
            "results": {
                "energy": -154.9,
                "dipoleMoment": [0.1, 0.2, 1.5],
                "homoEnergy": -0.4,
                "lumoEnergy": 0.1,
                "gap": 0.5,
                "optimizedStructure": "3\nwater\nO 0 0 0"
            }
        }"#;
        let job: Job = serde_json::from_str(payload).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.basis_set, "6-31G*");
        let results = job.results.as_ref().unwrap();
        assert_eq!(results.dipole_moment, [0.1, 0.2, 1.5]);
        assert!(results.frequencies.is_none());
        assert!(job.check_consistency().is_ok());
    }

    #[test]
    fn test_serializes_camel_case_and_omits_absent_fields() {
        let value = serde_json::to_value(pending_job()).unwrap();
        assert_eq!(value["moleculeName"], "Water");
        assert_eq!(value["basisSet"], "STO-3G");
        assert!(value.get("results").is_none());
        assert!(value.get("error").is_none());
        assert!(value.get("structure").is_none());
    }

    #[test]
    fn test_consistency_rules() {
        let mut job = pending_job();
        assert!(job.check_consistency().is_ok());

        job.status = JobStatus::Completed;
        assert_eq!(
            job.check_consistency(),
            Err(JobModelError::MissingResults("job_1".to_string()))
        );

        job.status = JobStatus::Failed;
        assert_eq!(
            job.check_consistency(),
            Err(JobModelError::MissingError("job_1".to_string()))
        );
        job.error = Some("SCF did not converge".to_string());
        assert!(job.check_consistency().is_ok());

        job.status = JobStatus::Running;
        assert!(matches!(
            job.check_consistency(),
            Err(JobModelError::UnexpectedError(_))
        ));
    }

    #[test]
    fn test_display_structure_prefers_optimized_geometry() {
        let mut job = pending_job();
        job.smiles = None;
        job.structure = Some("PDB CONTENT".to_string());
        job.format = Some("pdb".to_string());
        assert_eq!(job.display_structure(), Some(("PDB CONTENT", "pdb")));

        job.status = JobStatus::Completed;
        job.results = Some(SimulationResults {
            energy: -1.0,
            dipole_moment: [0.0, 0.0, 0.0],
            homo_energy: -0.5,
            lumo_energy: 0.1,
            gap: 0.6,
            frequencies: None,
            intensities: None,
            optimized_structure: Some("XYZ CONTENT".to_string()),
            orbitals_url: None,
            homo_cube_url: None,
            lumo_cube_url: None,
            output_log: None,
        });
        assert_eq!(job.display_structure(), Some(("XYZ CONTENT", "xyz")));
    }
}
