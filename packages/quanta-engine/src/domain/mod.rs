pub mod constants;
pub mod job;
pub mod options;

pub use job::{Job, JobModelError, JobStatus, SimulationResults};
pub use options::{
    BasisSet, CalcType, CalculationOptions, MoleculeData, Solvent, SubmissionRequest, Theory,
    UnknownOption,
};
