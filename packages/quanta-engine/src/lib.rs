pub mod assistant;
pub mod backend;
pub mod config;
pub mod controller;
pub mod domain;
pub mod history;
pub mod input;
pub mod logging;
pub mod report;
pub mod testing;
pub mod viewer;

pub use controller::{ControllerEvent, ControllerSnapshot, JobController};
pub use domain::{CalculationOptions, Job, JobStatus, MoleculeData, SimulationResults};
