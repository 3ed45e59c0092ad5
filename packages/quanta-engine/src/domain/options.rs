use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}' (expected one of: {allowed})")]
pub struct UnknownOption {
    pub kind: &'static str,
    pub value: String,
    pub allowed: String,
}

/// Declares a closed set of string-valued options that round-trip through
/// serde, `Display` and `FromStr` using their wire spelling.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownOption;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| UnknownOption {
                        kind: $kind,
                        value: s.to_string(),
                        allowed: $name::ALL
                            .iter()
                            .map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
            }
        }
    };
}

wire_enum!(
    /// Electronic structure method.
    Theory, "theory", {
        Hf => "HF",
        B3lyp => "B3LYP",
        Pbe0 => "PBE0",
        Mp2 => "MP2",
    }
);

wire_enum!(
    BasisSet, "basis set", {
        Sto3g => "STO-3G",
        Pople321g => "3-21G",
        Pople631gStar => "6-31G*",
        CcPvdz => "cc-pVDZ",
    }
);

wire_enum!(
    /// What the backend should compute.
    CalcType, "calculation type", {
        Energy => "energy",
        Optimization => "optimization",
        Frequency => "frequency",
    }
);

wire_enum!(
    /// Implicit-solvent model. `Vacuum` means no solvation.
    Solvent, "solvent", {
        Vacuum => "Vacuum",
        Water => "Water",
        Ethanol => "Ethanol",
        Benzene => "Benzene",
        Chloroform => "Chloroform",
        Thf => "THF",
    }
);

impl CalcType {
    pub fn label(self) -> &'static str {
        match self {
            CalcType::Energy => "Energy Point",
            CalcType::Optimization => "Geometry Opt",
            CalcType::Frequency => "Frequencies",
        }
    }
}

/// Molecule as supplied by the user: either a SMILES string or the raw
/// content of an uploaded structure file with its format tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoleculeData {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smiles: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl MoleculeData {
    pub fn uploaded_structure(&self) -> Option<(&str, &str)> {
        match (self.structure.as_deref(), self.format.as_deref()) {
            (Some(structure), Some(format)) => Some((structure, format)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationOptions {
    pub theory: Theory,
    pub basis: BasisSet,
    pub calc_type: CalcType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplicity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solvation: Option<Solvent>,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            theory: Theory::B3lyp,
            basis: BasisSet::Pople631gStar,
            calc_type: CalcType::Optimization,
            charge: Some(0),
            multiplicity: Some(1),
            solvation: Some(Solvent::Vacuum),
        }
    }
}

/// Body of `POST /run_simulation`: molecule and options merged into one object.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionRequest<'a> {
    #[serde(flatten)]
    pub molecule: &'a MoleculeData,
    #[serde(flatten)]
    pub options: &'a CalculationOptions,
}
