//! Local-only validation of molecule input before anything reaches a backend.

use crate::domain::constants::PRESET_MOLECULES;
use crate::domain::{
    BasisSet, CalcType, CalculationOptions, MoleculeData, Solvent, Theory, UnknownOption,
};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Structure file formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureFormat {
    Xyz,
    Mol,
    Pdb,
    Sdf,
}

impl StructureFormat {
    pub const ALL: [StructureFormat; 4] = [
        StructureFormat::Xyz,
        StructureFormat::Mol,
        StructureFormat::Pdb,
        StructureFormat::Sdf,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StructureFormat::Xyz => "xyz",
            StructureFormat::Mol => "mol",
            StructureFormat::Pdb => "pdb",
            StructureFormat::Sdf => "sdf",
        }
    }

    pub fn from_extension(ext: &str) -> Result<Self, InputError> {
        let wanted = ext.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or(InputError::UnsupportedFormat(wanted))
    }

    pub fn from_path(path: &Path) -> Result<Self, InputError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(ext)
    }
}

impl fmt::Display for StructureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Unsupported file format '{0}'. Please use XYZ, MOL, PDB, or SDF.")]
    UnsupportedFormat(String),
    #[error("Please upload a molecule file.")]
    MissingStructure,
    #[error("Molecule name must not be empty")]
    EmptyName,
    #[error("SMILES string must not be empty")]
    EmptySmiles,
    #[error("Spin multiplicity must be at least 1 (got {0})")]
    InvalidMultiplicity(u32),
    #[error("Unknown preset molecule '{0}'")]
    UnknownPreset(String),
    #[error(transparent)]
    UnknownOption(#[from] UnknownOption),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Builds validated [`MoleculeData`].
pub struct MoleculeInput;

impl MoleculeInput {
    pub fn from_smiles(name: &str, smiles: &str) -> Result<MoleculeData, InputError> {
        let name = name.trim();
        let smiles = smiles.trim();
        if name.is_empty() {
            return Err(InputError::EmptyName);
        }
        if smiles.is_empty() {
            return Err(InputError::EmptySmiles);
        }
        Ok(MoleculeData {
            name: name.to_string(),
            smiles: Some(smiles.to_string()),
            structure: None,
            format: None,
        })
    }

    pub fn from_preset(preset_name: &str) -> Result<MoleculeData, InputError> {
        let preset = preset(preset_name)
            .ok_or_else(|| InputError::UnknownPreset(preset_name.to_string()))?;
        Self::from_smiles(preset.name, preset.smiles)
    }

    /// Builds an upload from file content already in memory. The extension
    /// is checked before the content is looked at.
    pub fn from_upload(
        file_name: &str,
        content: &str,
        name: Option<&str>,
    ) -> Result<MoleculeData, InputError> {
        let path = Path::new(file_name);
        let format = StructureFormat::from_path(path)?;
        if content.trim().is_empty() {
            return Err(InputError::MissingStructure);
        }
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => n.to_string(),
            None => path
                .file_stem()
                .and_then(|s| s.to_str())
                .filter(|s| !s.is_empty())
                .ok_or(InputError::EmptyName)?
                .to_string(),
        };
        Ok(MoleculeData {
            name,
            smiles: None,
            structure: Some(content.to_string()),
            format: Some(format.to_string()),
        })
    }

    /// Reads a structure file from disk. Unsupported extensions are rejected
    /// without touching the file.
    pub async fn from_file(path: &Path, name: Option<&str>) -> Result<MoleculeData, InputError> {
        StructureFormat::from_path(path)?;
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| InputError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        Self::from_upload(file_name, &content, name)
    }
}

pub fn preset(name: &str) -> Option<&'static crate::domain::constants::MoleculePreset> {
    PRESET_MOLECULES
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
}

/// Collects calculation options with the form's defaults.
#[derive(Debug, Clone)]
pub struct OptionsBuilder {
    options: CalculationOptions,
}

impl Default for OptionsBuilder {
    fn default() -> Self {
        Self {
            options: CalculationOptions::default(),
        }
    }
}

impl OptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn theory(mut self, theory: Theory) -> Self {
        self.options.theory = theory;
        self
    }

    pub fn basis(mut self, basis: BasisSet) -> Self {
        self.options.basis = basis;
        self
    }

    pub fn calc_type(mut self, calc_type: CalcType) -> Self {
        self.options.calc_type = calc_type;
        self
    }

    pub fn charge(mut self, charge: i32) -> Self {
        self.options.charge = Some(charge);
        self
    }

    pub fn multiplicity(mut self, multiplicity: u32) -> Self {
        self.options.multiplicity = Some(multiplicity);
        self
    }

    pub fn solvation(mut self, solvent: Solvent) -> Self {
        self.options.solvation = Some(solvent);
        self
    }

    pub fn build(self) -> Result<CalculationOptions, InputError> {
        if let Some(m) = self.options.multiplicity {
            if m < 1 {
                return Err(InputError::InvalidMultiplicity(m));
            }
        }
        Ok(self.options)
    }
}
