use crate::domain::constants::METHANE_XYZ;
use serde::Serialize;
use thiserror::Error;

/// Structure text plus its format tag, as handed to a renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewTarget {
    pub structure: String,
    pub format: String,
}

impl ViewTarget {
    pub fn new(structure: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            structure: structure.into(),
            format: format.into(),
        }
    }
}

impl Default for ViewTarget {
    fn default() -> Self {
        Self::new(METHANE_XYZ, "xyz")
    }
}

/// Volumetric data files for frontier orbital surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrbitalSurfaces {
    pub homo: Option<String>,
    pub lumo: Option<String>,
}

/// Extra layers drawn over the structure.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewOverlay {
    pub dipole: Option<[f64; 3]>,
    pub orbitals: Option<OrbitalSurfaces>,
}

impl ViewOverlay {
    pub fn from_results(results: Option<&crate::domain::SimulationResults>) -> Self {
        let Some(results) = results else {
            return Self::default();
        };
        let orbitals = if results.homo_cube_url.is_some() || results.lumo_cube_url.is_some() {
            Some(OrbitalSurfaces {
                homo: results.homo_cube_url.clone(),
                lumo: results.lumo_cube_url.clone(),
            })
        } else {
            None
        };
        Self {
            dipole: Some(results.dipole_moment),
            orbitals,
        }
    }
}

/// Opaque result of a render, identifying what a renderer produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderHandle {
    pub id: String,
    pub atom_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("unsupported structure format '{0}'")]
    UnsupportedFormat(String),
    #[error("malformed {format} structure: {reason}")]
    Malformed { format: String, reason: String },
}

/// Draws a structure. Implementations own whatever scene technology they use.
pub trait StructureRenderer {
    fn render(
        &self,
        target: &ViewTarget,
        overlay: &ViewOverlay,
    ) -> Result<RenderHandle, RenderError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub symbol: String,
    pub position: [f64; 3],
}

/// Parses XYZ text: an atom count line, a comment line, then one
/// `symbol x y z` line per atom.
pub fn xyz_atoms(text: &str) -> Result<Vec<Atom>, RenderError> {
    let malformed = |reason: String| RenderError::Malformed {
        format: "xyz".to_string(),
        reason,
    };
    let mut lines = text.lines();
    let count: usize = lines
        .next()
        .map(str::trim)
        .ok_or_else(|| malformed("empty input".to_string()))?
        .parse()
        .map_err(|_| malformed("first line is not an atom count".to_string()))?;
    lines.next();

    let mut atoms = Vec::new();
    for (idx, line) in lines.filter(|l| !l.trim().is_empty()).take(count).enumerate() {
        let mut fields = line.split_whitespace();
        let symbol = fields
            .next()
            .ok_or_else(|| malformed(format!("atom {} has no symbol", idx + 1)))?;
        let mut position = [0.0; 3];
        for axis in position.iter_mut() {
            *axis = fields
                .next()
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| malformed(format!("atom {} has bad coordinates", idx + 1)))?;
        }
        atoms.push(Atom {
            symbol: symbol.to_string(),
            position,
        });
    }

    if atoms.len() != count {
        return Err(malformed(format!(
            "expected {} atoms, found {}",
            count,
            atoms.len()
        )));
    }
    Ok(atoms)
}

/// Renders a plain-text summary: atom listing for XYZ, line count otherwise.
pub struct TextRenderer {
    pub max_atoms: usize,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self { max_atoms: 12 }
    }
}

impl TextRenderer {
    pub fn describe(&self, target: &ViewTarget, overlay: &ViewOverlay) -> Result<String, RenderError> {
        self.summarize(target, overlay).map(|(text, _)| text)
    }

    fn summarize(
        &self,
        target: &ViewTarget,
        overlay: &ViewOverlay,
    ) -> Result<(String, usize), RenderError> {
        let mut out = String::new();
        let atom_count = match target.format.as_str() {
            "xyz" => {
                let atoms = xyz_atoms(&target.structure)?;
                out.push_str(&format!("{} atoms (xyz)\n", atoms.len()));
                for atom in atoms.iter().take(self.max_atoms) {
                    out.push_str(&format!(
                        "  {:<3}{:>11.6}{:>11.6}{:>11.6}\n",
                        atom.symbol, atom.position[0], atom.position[1], atom.position[2]
                    ));
                }
                if atoms.len() > self.max_atoms {
                    out.push_str(&format!("  ... {} more\n", atoms.len() - self.max_atoms));
                }
                atoms.len()
            }
            "pdb" | "mol" | "sdf" => {
                let lines = target.structure.lines().count();
                out.push_str(&format!("{} structure, {} lines\n", target.format, lines));
                0
            }
            other => return Err(RenderError::UnsupportedFormat(other.to_string())),
        };
        if let Some([x, y, z]) = overlay.dipole {
            out.push_str(&format!(
                "  dipole vector [{:.2}, {:.2}, {:.2}] D\n",
                x, y, z
            ));
        }
        if let Some(orbitals) = &overlay.orbitals {
            for (label, url) in [("HOMO", &orbitals.homo), ("LUMO", &orbitals.lumo)] {
                if let Some(url) = url {
                    out.push_str(&format!("  {} surface: {}\n", label, url));
                }
            }
        }
        Ok((out, atom_count))
    }
}

impl StructureRenderer for TextRenderer {
    fn render(
        &self,
        target: &ViewTarget,
        overlay: &ViewOverlay,
    ) -> Result<RenderHandle, RenderError> {
        let (text, atom_count) = self.summarize(target, overlay)?;
        println!("{}", text.trim_end());
        Ok(RenderHandle {
            id: format!("text-{}", target.format),
            atom_count,
        })
    }
}
