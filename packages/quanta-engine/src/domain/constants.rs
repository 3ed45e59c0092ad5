use super::job::SimulationResults;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

pub struct MoleculePreset {
    pub name: &'static str,
    pub smiles: &'static str,
}

pub const PRESET_MOLECULES: &[MoleculePreset] = &[
    MoleculePreset { name: "Ethanol", smiles: "CCO" },
    MoleculePreset { name: "Water", smiles: "O" },
    MoleculePreset { name: "Benzene", smiles: "c1ccccc1" },
    MoleculePreset { name: "Caffeine", smiles: "CN1C=NC2=C1C(=O)N(C(=O)N2C)C" },
    MoleculePreset { name: "Aspirin", smiles: "CC(=O)OC1=CC=CC=C1C(=O)O" },
];

pub const METHANE_XYZ: &str = "5
Methane
C     0.000000    0.000000    0.000000
H     0.629118    0.629118    0.629118
H    -0.629118   -0.629118    0.629118
H     0.629118   -0.629118   -0.629118
H    -0.629118    0.629118   -0.629118";

const WATER_XYZ: &str = "3
Water
O     0.000000    0.000000    0.117300
H     0.000000    0.757200   -0.469200
H     0.000000   -0.757200   -0.469200";

const ETHANOL_XYZ: &str = "9
Ethanol
C    -0.047000    0.556000    0.000000
C    -1.260000   -0.358000    0.000000
O     1.140000   -0.235000    0.000000
H    -0.077000    1.199000    0.885000
H    -0.077000    1.199000   -0.885000
H    -2.183000    0.229000    0.000000
H    -1.244000   -0.996000    0.886000
H    -1.244000   -0.996000   -0.886000
H     1.903000    0.347000    0.000000";

/// Canned geometry for a molecule the simulated backend knows by name.
pub fn canned_structure(molecule_name: &str) -> Option<&'static str> {
    match molecule_name {
        "Methane" => Some(METHANE_XYZ),
        "Water" => Some(WATER_XYZ),
        "Ethanol" => Some(ETHANOL_XYZ),
        _ => None,
    }
}

pub const MOCK_FREQUENCIES: [f64; 3] = [1600.0, 3200.0, 3400.0];
pub const MOCK_INTENSITIES: [f64; 3] = [55.2, 12.8, 40.1];

/// Deterministic result payload produced by the simulated backend.
pub fn mock_results() -> SimulationResults {
    SimulationResults {
        energy: -76.421,
        dipole_moment: [0.0, 0.0, 1.85],
        homo_energy: -0.45,
        lumo_energy: 0.12,
        gap: 0.57,
        frequencies: None,
        intensities: None,
        optimized_structure: None,
        orbitals_url: None,
        homo_cube_url: None,
        lumo_cube_url: None,
        output_log: None,
    }
}
