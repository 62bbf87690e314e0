//! MDL V2000 mol-block reading.

use super::element;
use super::graph::{Atom, BondOrder, MolGraph};
use super::ChemError;

/// Parsed mol block: the graph plus its title line.
#[derive(Debug, Clone)]
pub struct MolBlock {
    pub title: String,
    pub graph: MolGraph,
    /// Heavy-atom coordinates in file order (hydrogens dropped).
    pub coords: Vec<[f64; 3]>,
}

fn field(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    line.get(start.min(end)..end).unwrap_or("").trim()
}

fn parse_field<T: std::str::FromStr>(line: &str, start: usize, end: usize, what: &str) -> Result<T, ChemError> {
    field(line, start, end)
        .parse()
        .map_err(|_| ChemError::MolBlock(format!("bad {what} in line {line:?}")))
}

/// Parses a V2000 mol block (the part of an SDF record up to `M  END`).
pub fn parse_molblock(block: &str) -> Result<MolBlock, ChemError> {
    let lines: Vec<&str> = block.lines().collect();
    if lines.len() < 4 {
        return Err(ChemError::MolBlock("header shorter than four lines".to_string()));
    }
    let title = lines[0].trim().to_string();
    let counts = lines[3];
    if counts.contains("V3000") {
        return Err(ChemError::MolBlock("V3000 mol blocks are not supported".to_string()));
    }
    let n_atoms: usize = parse_field(counts, 0, 3, "atom count")?;
    let n_bonds: usize = parse_field(counts, 3, 6, "bond count")?;
    if lines.len() < 4 + n_atoms + n_bonds {
        return Err(ChemError::MolBlock("truncated atom or bond table".to_string()));
    }

    let mut graph = MolGraph::new();
    let mut coords = Vec::with_capacity(n_atoms);
    for line in &lines[4..4 + n_atoms] {
        let x: f64 = parse_field(line, 0, 10, "x coordinate")?;
        let y: f64 = parse_field(line, 10, 20, "y coordinate")?;
        let z: f64 = parse_field(line, 20, 30, "z coordinate")?;
        let symbol = field(line, 31, 34);
        let info = element::by_symbol(symbol)
            .ok_or_else(|| ChemError::MolBlock(format!("unknown element {symbol:?}")))?;
        let mut atom = Atom::new(info.number);
        atom.charge = match field(line, 36, 39) {
            "1" => 3,
            "2" => 2,
            "3" => 1,
            "5" => -1,
            "6" => -2,
            "7" => -3,
            _ => 0,
        };
        graph.add_atom(atom);
        coords.push([x, y, z]);
    }

    for line in &lines[4 + n_atoms..4 + n_atoms + n_bonds] {
        let a: usize = parse_field(line, 0, 3, "bond atom")?;
        let b: usize = parse_field(line, 3, 6, "bond atom")?;
        let kind: u8 = parse_field(line, 6, 9, "bond type")?;
        let order = match kind {
            1 => BondOrder::Single,
            2 => BondOrder::Double,
            3 => BondOrder::Triple,
            4 => BondOrder::Aromatic,
            other => return Err(ChemError::MolBlock(format!("unsupported bond type {other}"))),
        };
        if a == 0 || b == 0 {
            return Err(ChemError::MolBlock("bond references atom 0".to_string()));
        }
        graph.add_bond(a - 1, b - 1, order)?;
        if order == BondOrder::Aromatic {
            graph.atoms[a - 1].aromatic = true;
            graph.atoms[b - 1].aromatic = true;
        }
    }

    // property block: charges override the atom table
    let mut charges_reset = false;
    for line in &lines[4 + n_atoms + n_bonds..] {
        if line.starts_with("M  END") {
            break;
        }
        if let Some(rest) = line.strip_prefix("M  CHG") {
            if !charges_reset {
                graph.atoms.iter_mut().for_each(|a| a.charge = 0);
                charges_reset = true;
            }
            let values: Vec<i64> = rest
                .split_whitespace()
                .skip(1)
                .filter_map(|t| t.parse().ok())
                .collect();
            for pair in values.chunks_exact(2) {
                let idx = pair[0] as usize;
                if idx >= 1 && idx <= graph.atom_count() {
                    graph.atoms[idx - 1].charge = pair[1] as i8;
                }
            }
        } else if let Some(rest) = line.strip_prefix("M  ISO") {
            let values: Vec<i64> = rest
                .split_whitespace()
                .skip(1)
                .filter_map(|t| t.parse().ok())
                .collect();
            for pair in values.chunks_exact(2) {
                let idx = pair[0] as usize;
                if idx >= 1 && idx <= graph.atom_count() {
                    graph.atoms[idx - 1].isotope = Some(pair[1] as u16);
                }
            }
        }
    }

    let heavy: Vec<bool> = graph.atoms.iter().map(|a| a.atomic_num != 1).collect();
    graph.fold_explicit_hydrogens();
    let coords = if graph.atom_count() == coords.len() {
        coords
    } else {
        coords
            .into_iter()
            .zip(heavy)
            .filter_map(|(c, keep)| keep.then_some(c))
            .collect()
    };
    if graph.atom_count() == 0 {
        return Err(ChemError::Empty);
    }
    graph.assign_implicit_hydrogens();
    graph.sanitize()?;
    graph.perceive_aromaticity();
    Ok(MolBlock { title, graph, coords })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::write_smiles;

    const ETHANOL: &str = "ethanol
  ferroscreen

  3  2  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.5000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    2.0000    1.4000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
  2  3  1  0
M  END
";

    #[test]
    fn test_parse_ethanol() {
        let block = parse_molblock(ETHANOL).unwrap();
        assert_eq!(block.title, "ethanol");
        assert_eq!(block.graph.atom_count(), 3);
        assert_eq!(block.coords[2], [2.0, 1.4, 0.0]);
        assert_eq!(block.graph.atoms[0].h_count, 3);
        assert_eq!(write_smiles(&block.graph), "CCO");
    }

    #[test]
    fn test_charge_block_overrides_atom_table() {
        let block = ETHANOL.replace("M  END", "M  CHG  1   3  -1\nM  END");
        let parsed = parse_molblock(&block).unwrap();
        assert_eq!(parsed.graph.atoms[2].charge, -1);
        assert_eq!(parsed.graph.atoms[2].h_count, 0);
    }

    #[test]
    fn test_truncated_block_is_an_error() {
        let truncated: String = ETHANOL.lines().take(6).collect::<Vec<_>>().join("\n");
        assert!(parse_molblock(&truncated).is_err());
    }
}
