//! Receptor structures: fixed-width PDB/PDBQT parsing, writing and complex
//! assembly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ferroscreen_common::{Result, ScreenError};

/// The twenty standard amino-acid residue names.
pub const STANDARD_AA: [&str; 20] = [
    "ALA", "ARG", "ASN", "ASP", "CYS", "GLN", "GLU", "GLY", "HIS", "ILE", "LEU", "LYS", "MET",
    "PHE", "PRO", "SER", "THR", "TRP", "TYR", "VAL",
];

/// True for the twenty standard amino acids; waters and other HETATM
/// residues are not standard.
pub fn is_standard_residue(res_name: &str) -> bool {
    STANDARD_AA.contains(&res_name.trim())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Atom,
    Hetatm,
}

impl RecordKind {
    fn tag(self) -> &'static str {
        match self {
            RecordKind::Atom => "ATOM",
            RecordKind::Hetatm => "HETATM",
        }
    }
}

/// One ATOM/HETATM record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdbAtom {
    pub record: RecordKind,
    pub name: String,
    pub res_name: String,
    pub chain: char,
    pub res_seq: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub element: String,
}

impl PdbAtom {
    /// `[x, y, z]` in Å.
    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

fn column(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    line.get(start.min(end)..end).unwrap_or("")
}

fn parse_record(line: &str) -> Option<PdbAtom> {
    let record = if line.starts_with("ATOM") {
        RecordKind::Atom
    } else if line.starts_with("HETATM") {
        RecordKind::Hetatm
    } else {
        return None;
    };
    let x = column(line, 30, 38).trim().parse().ok()?;
    let y = column(line, 38, 46).trim().parse().ok()?;
    let z = column(line, 46, 54).trim().parse().ok()?;
    let name = column(line, 12, 16).trim().to_string();
    let mut element = column(line, 76, 78).trim().to_string();
    if element.is_empty() {
        element = name.chars().filter(|c| c.is_ascii_alphabetic()).take(1).collect();
    }
    Some(PdbAtom {
        record,
        name,
        res_name: column(line, 17, 20).trim().to_string(),
        chain: column(line, 21, 22).chars().next().unwrap_or(' '),
        res_seq: column(line, 22, 26).trim().parse().unwrap_or(0),
        x,
        y,
        z,
        element,
    })
}

/// Parses ATOM/HETATM records up to the first `ENDMDL`. Records whose
/// coordinate columns do not parse are skipped.
pub fn parse_pdb(text: &str) -> Vec<PdbAtom> {
    let mut atoms = Vec::new();
    for line in text.lines() {
        if line.trim() == "ENDMDL" {
            break;
        }
        if let Some(atom) = parse_record(line) {
            atoms.push(atom);
        } else if line.starts_with("ATOM") || line.starts_with("HETATM") {
            debug!("Skipping malformed coordinate record: {}", line.trim_end());
        }
    }
    atoms
}

/// AutoDock atom type (columns 78-79 of PDBQT) to element symbol.
fn autodock_element(ad_type: &str) -> String {
    match ad_type {
        "A" => "C".to_string(),
        "OA" | "OS" => "O".to_string(),
        "NA" | "NS" => "N".to_string(),
        "SA" => "S".to_string(),
        "HD" | "HS" => "H".to_string(),
        "CL" | "Cl" => "Cl".to_string(),
        "BR" | "Br" => "Br".to_string(),
        other => other.chars().take(1).collect(),
    }
}

/// Like [`parse_pdb`], but takes elements from the AutoDock type column.
pub fn parse_pdbqt(text: &str) -> Vec<PdbAtom> {
    let mut atoms = Vec::new();
    for line in text.lines() {
        if line.trim() == "ENDMDL" {
            break;
        }
        if let Some(mut atom) = parse_record(line) {
            let ad_type = column(line, 77, 79).trim();
            if !ad_type.is_empty() {
                atom.element = autodock_element(ad_type);
            }
            atoms.push(atom);
        }
    }
    atoms
}

/// Formats atoms as PDB ATOM/HETATM records followed by `END`.
pub fn write_pdb(atoms: &[PdbAtom]) -> String {
    let mut out = String::new();
    for (i, atom) in atoms.iter().enumerate() {
        let name = if atom.name.len() < 4 {
            format!(" {:<3}", atom.name)
        } else {
            atom.name.chars().take(4).collect()
        };
        out.push_str(&format!(
            "{:<6}{:>5} {:<4} {:>3} {}{:>4}    {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}\n",
            atom.record.tag(),
            (i + 1) % 100_000,
            name,
            atom.res_name,
            atom.chain,
            atom.res_seq,
            atom.x,
            atom.y,
            atom.z,
            1.0,
            0.0,
            atom.element,
        ));
    }
    out.push_str("END\n");
    out
}

/// A receptor structure loaded for one screening run.
#[derive(Debug, Clone)]
pub struct ReceptorTarget {
    pub id: String,
    pub path: PathBuf,
    pub atoms: Vec<PdbAtom>,
}

impl ReceptorTarget {
    /// Loads a receptor PDB; a structure without atoms is invalid geometry.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let atoms = parse_pdb(&text);
        if atoms.is_empty() {
            return Err(ScreenError::InvalidGeometry(format!(
                "receptor {} has no ATOM/HETATM records",
                path.display()
            )));
        }
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "receptor".to_string());
        info!("Loaded receptor {} with {} atoms", id, atoms.len());
        Ok(Self {
            id,
            path: path.to_path_buf(),
            atoms,
        })
    }

    /// Coordinates of every receptor atom, in file order.
    pub fn coords(&self) -> Vec<[f64; 3]> {
        self.atoms.iter().map(PdbAtom::coords).collect()
    }

    /// The prepared (charged) sibling file `<stem>.pdbqt`.
    pub fn pdbqt_path(&self) -> PathBuf {
        self.path.with_extension("pdbqt")
    }

    /// Directory fpocket writes for this receptor: `<stem>_out`.
    pub fn pocket_dir(&self) -> PathBuf {
        self.path.with_file_name(format!("{}_out", self.id))
    }
}

/// Finds the receptor for `variant`: the first `<variant>*.pdb` in
/// `receptor_dir`, in name order.
pub fn resolve_receptor(receptor_dir: &Path, variant: &str) -> Result<PathBuf> {
    let missing = || {
        ScreenError::MissingUpstreamArtifact(format!(
            "no receptor matching {}/{}*.pdb",
            receptor_dir.display(),
            variant
        ))
    };
    let entries = std::fs::read_dir(receptor_dir).map_err(|_| missing())?;
    let mut matches: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension().is_some_and(|ext| ext == "pdb")
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(variant))
        })
        .collect();
    matches.sort();
    matches.into_iter().next().ok_or_else(missing)
}

/// Receptor atoms plus the first model of a docked pose, with the pose
/// renamed to residue `LIG` on chain `L`.
pub fn assemble_complex(receptor: &[PdbAtom], pose_pdbqt: &str) -> Vec<PdbAtom> {
    let mut atoms = receptor.to_vec();
    atoms.extend(parse_pdbqt(pose_pdbqt).into_iter().map(|mut a| {
        a.record = RecordKind::Hetatm;
        a.res_name = "LIG".to_string();
        a.chain = 'L';
        a.res_seq = 1;
        a
    }));
    atoms
}

/// Splits a complex into (receptor, ligand) by standard residue names.
pub fn split_complex(atoms: &[PdbAtom]) -> (Vec<PdbAtom>, Vec<PdbAtom>) {
    atoms.iter().cloned().partition(|a| is_standard_residue(&a.res_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RECEPTOR: &str = "\
HEADER    TEST
ATOM      1  N   ALA A   1      11.104   6.134  -6.504  1.00  0.00           N
ATOM      2  CA  ALA A   1      11.639   6.071  -5.147  1.00  0.00           C
HETATM    3  O   HOH A 101       1.000   2.000   3.000  1.00  0.00           O
ENDMDL
ATOM      4  CB  ALA A   1      99.000  99.000  99.000  1.00  0.00           C
";

    #[test]
    fn test_parse_fixed_width_stops_at_endmdl() {
        let atoms = parse_pdb(RECEPTOR);
        assert_eq!(atoms.len(), 3);
        assert_eq!(atoms[0].res_name, "ALA");
        assert_eq!(atoms[0].chain, 'A');
        assert_eq!(atoms[1].coords(), [11.639, 6.071, -5.147]);
        assert_eq!(atoms[2].record, RecordKind::Hetatm);
        assert_eq!(atoms[2].res_seq, 101);
        assert_eq!(atoms[2].element, "O");
    }

    #[test]
    fn test_write_then_parse_keeps_columns() {
        let atoms = parse_pdb(RECEPTOR);
        let text = write_pdb(&atoms);
        assert_eq!(text.lines().count(), atoms.len() + 1);
        assert!(text.lines().take(atoms.len()).all(|l| l.len() == 78));
        assert!(text.ends_with("END\n"));
        assert_eq!(parse_pdb(&text), atoms);
    }

    #[test]
    fn test_standard_residues() {
        assert!(is_standard_residue("ALA"));
        assert!(is_standard_residue(" GLY "));
        assert!(!is_standard_residue("HOH"));
        assert!(!is_standard_residue("LIG"));
    }

    #[test]
    fn test_assemble_and_split_complex() {
        let receptor = parse_pdb(RECEPTOR);
        let pose = "\
MODEL 1
REMARK VINA RESULT:    -7.5      0.000      0.000
ATOM      1  C   UNL     1       2.000   2.000   2.000  0.00  0.00    +0.000 A 
ATOM      2  O   UNL     1       3.000   2.000   2.000  0.00  0.00    -0.300 OA
ENDMDL
MODEL 2
ATOM      1  C   UNL     1       9.000   9.000   9.000  0.00  0.00    +0.000 A 
ENDMDL
";
        let complex = assemble_complex(&receptor, pose);
        assert_eq!(complex.len(), 5);
        let (rec, lig) = split_complex(&complex);
        // the water is not a standard residue either
        assert_eq!(rec.len(), 2);
        assert_eq!(lig.len(), 3);
        let ligand: Vec<&PdbAtom> = lig.iter().filter(|a| a.res_name == "LIG").collect();
        assert_eq!(ligand.len(), 2);
        assert_eq!(ligand[0].element, "C");
        assert_eq!(ligand[1].element, "O");
        assert!(ligand.iter().all(|a| a.chain == 'L'));
    }

    #[test]
    fn test_resolve_receptor_picks_first_sorted_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("G12D_b.pdb"), RECEPTOR).unwrap();
        std::fs::write(dir.path().join("G12D_a.pdb"), RECEPTOR).unwrap();
        std::fs::write(dir.path().join("G12C.pdb"), RECEPTOR).unwrap();
        let found = resolve_receptor(dir.path(), "G12D").unwrap();
        assert_eq!(found.file_name().unwrap(), "G12D_a.pdb");

        let err = resolve_receptor(dir.path(), "Q61H").unwrap_err();
        assert!(matches!(err, ScreenError::MissingUpstreamArtifact(_)));
    }

    #[test]
    fn test_empty_receptor_is_invalid_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pdb");
        std::fs::write(&path, "HEADER nothing here\nEND\n").unwrap();
        assert!(matches!(ReceptorTarget::load(&path), Err(ScreenError::InvalidGeometry(_))));
    }
}
