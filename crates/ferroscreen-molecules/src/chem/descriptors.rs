//! Physicochemical and topological descriptors.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::element::{self, H_WEIGHT};
use super::graph::{BondOrder, Chirality, MolGraph};
use super::rings::{self, Ring};

/// Descriptor set computed once per molecule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptors {
    pub mol_weight: f64,
    pub log_p: f64,
    pub tpsa: f64,
    pub rotatable_bonds: usize,
    pub aromatic_proportion: f64,
    pub heavy_atoms: usize,
    pub ring_count: usize,
    pub aromatic_rings: usize,
    /// N, O and S atoms
    pub heteroatoms: usize,
    pub stereocenters: usize,
    pub bridgeheads: usize,
    pub spiro_atoms: usize,
    /// Morgan radius-2 environments (duplicate neighbourhoods removed)
    pub morgan_environments: usize,
}

impl Descriptors {
    /// Computes every descriptor for a sanitised molecule.
    pub fn compute(mol: &MolGraph) -> Self {
        let rings = rings::sssr(mol);
        let (bridgeheads, spiro_atoms) = bridgehead_and_spiro(mol, &rings);
        Self {
            mol_weight: molecular_weight(mol),
            log_p: crippen_log_p(mol),
            tpsa: tpsa(mol, &rings),
            rotatable_bonds: rotatable_bonds(mol),
            aromatic_proportion: aromatic_proportion(mol),
            heavy_atoms: mol.heavy_atom_count(),
            ring_count: rings.len(),
            aromatic_rings: aromatic_ring_count(mol, &rings),
            heteroatoms: heteroatom_count(mol),
            stereocenters: stereocenter_count(mol),
            bridgeheads,
            spiro_atoms,
            morgan_environments: morgan_environment_count(mol, 2),
        }
    }
}

/// Average molecular weight including implicit hydrogens.
pub fn molecular_weight(mol: &MolGraph) -> f64 {
    mol.atoms
        .iter()
        .map(|a| a.element().map_or(0.0, |e| e.weight) + f64::from(a.h_count) * H_WEIGHT)
        .sum()
}

/// Aromatic atoms over heavy atoms; 0 for an empty graph.
pub fn aromatic_proportion(mol: &MolGraph) -> f64 {
    let heavy = mol.heavy_atom_count();
    if heavy == 0 {
        return 0.0;
    }
    mol.atoms.iter().filter(|a| a.aromatic).count() as f64 / heavy as f64
}

/// N, O and S atoms.
pub fn heteroatom_count(mol: &MolGraph) -> usize {
    mol.atoms
        .iter()
        .filter(|a| matches!(a.atomic_num, element::N | element::O | element::S))
        .count()
}

/// SSSR rings whose bonds are all aromatic.
pub fn aromatic_ring_count(mol: &MolGraph, rings: &[Ring]) -> usize {
    rings
        .iter()
        .filter(|r| r.bonds.iter().all(|&b| mol.bonds[b].order == BondOrder::Aromatic))
        .count()
}

#[derive(Debug, Default, Clone, Copy)]
struct BondCounts {
    single: usize,
    double: usize,
    triple: usize,
    aromatic: usize,
}

fn bond_counts(mol: &MolGraph, atom: usize) -> BondCounts {
    let mut counts = BondCounts::default();
    for &(_, b) in mol.neighbors(atom) {
        match mol.bonds[b].order {
            BondOrder::Single => counts.single += 1,
            BondOrder::Double => counts.double += 1,
            BondOrder::Triple => counts.triple += 1,
            BondOrder::Aromatic => counts.aromatic += 1,
        }
    }
    counts
}

// ── logP ────────────────────────────────────────────────────────────────────

const H_ON_CARBON: f64 = 0.1230;
const H_ON_NITROGEN: f64 = 0.2142;
const H_ON_OXYGEN: f64 = -0.2677;

/// Atom-contribution logP in the style of Wildman and Crippen.
///
/// Atom typing is reduced to a few dozen classes, so values track the
/// published model only approximately.
pub fn crippen_log_p(mol: &MolGraph) -> f64 {
    (0..mol.atom_count())
        .map(|i| heavy_contribution(mol, i) + hydrogen_contribution(mol, i))
        .sum()
}

fn is_hetero(atomic_num: u8) -> bool {
    !matches!(atomic_num, 0 | 1 | element::C)
}

fn hydrogen_contribution(mol: &MolGraph, i: usize) -> f64 {
    let atom = &mol.atoms[i];
    let per_h = match atom.atomic_num {
        element::N => H_ON_NITROGEN,
        element::O => H_ON_OXYGEN,
        _ => H_ON_CARBON,
    };
    f64::from(atom.h_count) * per_h
}

fn heavy_contribution(mol: &MolGraph, i: usize) -> f64 {
    let atom = &mol.atoms[i];
    let counts = bond_counts(mol, i);
    let neighbors = mol.neighbors(i);
    match atom.atomic_num {
        element::C if atom.aromatic => {
            if counts.aromatic >= 3 {
                return 0.2955;
            }
            let exocyclic = neighbors
                .iter()
                .find(|&&(_, b)| mol.bonds[b].order != BondOrder::Aromatic)
                .map(|&(n, _)| mol.atoms[n].atomic_num);
            match exocyclic {
                Some(n) if is_hetero(n) => 0.1360,
                Some(_) => 0.2713,
                None => 0.1581,
            }
        }
        element::C => {
            if counts.triple > 0 {
                return 0.0017;
            }
            if counts.double > 0 {
                let hetero_double = neighbors.iter().any(|&(n, b)| {
                    mol.bonds[b].order == BondOrder::Double && is_hetero(mol.atoms[n].atomic_num)
                });
                return if hetero_double { -0.1002 } else { 0.1551 };
            }
            let hetero_nbrs = neighbors.iter().filter(|&&(n, _)| is_hetero(mol.atoms[n].atomic_num)).count();
            match (hetero_nbrs, atom.h_count >= 2) {
                (0, true) => 0.1441,
                (0, false) => 0.0,
                (_, true) => -0.2035,
                (_, false) => -0.2051,
            }
        }
        element::N => {
            if atom.charge != 0 {
                -0.3239
            } else if atom.aromatic {
                -0.4806
            } else if counts.triple > 0 {
                -0.5
            } else if counts.double > 0 {
                -0.4806
            } else {
                match atom.h_count {
                    2.. => -1.0190,
                    1 => -0.7096,
                    0 => -0.3187,
                }
            }
        }
        element::O => {
            let aryl = neighbors.iter().any(|&(n, _)| mol.atoms[n].aromatic);
            if atom.aromatic {
                0.1552
            } else if atom.charge < 0 {
                -1.0
            } else if counts.double > 0 {
                if aryl {
                    0.1129
                } else {
                    -0.1526
                }
            } else if atom.h_count > 0 {
                -0.2893
            } else if aryl {
                -0.4195
            } else {
                -0.0684
            }
        }
        element::S if atom.aromatic => 0.6237,
        element::S => 0.6482,
        element::P => 0.8612,
        element::F => 0.4202,
        element::CL => 0.6895,
        element::BR => 0.8456,
        element::I => 0.8857,
        _ => 0.0,
    }
}

// ── TPSA ────────────────────────────────────────────────────────────────────

/// Topological polar surface area from N and O fragment contributions (Ertl 2000).
pub fn tpsa(mol: &MolGraph, rings: &[Ring]) -> f64 {
    let in_three_ring: Vec<bool> = (0..mol.atom_count())
        .map(|i| rings.iter().any(|r| r.len() == 3 && r.contains_atom(i)))
        .collect();
    (0..mol.atom_count())
        .map(|i| match mol.atoms[i].atomic_num {
            element::N => nitrogen_psa(mol, i, in_three_ring[i]),
            element::O => oxygen_psa(mol, i, in_three_ring[i]),
            _ => 0.0,
        })
        .sum()
}

fn nitrogen_psa(mol: &MolGraph, i: usize, three_ring: bool) -> f64 {
    let atom = &mol.atoms[i];
    let c = bond_counts(mol, i);
    let nbrs = mol.degree(i);
    let h = atom.h_count;
    let known = if !atom.aromatic {
        match (atom.charge, h) {
            (0, 0) => match (c.single, c.double, c.triple, nbrs) {
                (3, 0, 0, 3) => Some(if three_ring { 3.01 } else { 3.24 }),
                (1, 1, 0, 2) => Some(12.36),
                (0, 0, 1, 1) => Some(23.79),
                (1, 2, 0, 3) => Some(11.68),
                (0, 1, 1, 2) => Some(13.60),
                _ => None,
            },
            (0, 1) => match (c.single, c.double, nbrs) {
                (2, 0, 2) => Some(if three_ring { 21.94 } else { 12.03 }),
                (0, 1, 1) => Some(23.85),
                _ => None,
            },
            (0, 2) if c.single == 1 && nbrs == 1 => Some(26.02),
            (1, 0) => match (c.single, c.double, c.triple, nbrs) {
                (4, 0, 0, 4) => Some(0.0),
                (2, 1, 0, 3) => Some(3.01),
                (1, 0, 1, 2) => Some(4.36),
                _ => None,
            },
            (1, 1) => match (c.single, c.double, nbrs) {
                (3, 0, 3) => Some(4.44),
                (0, 1, 1) => Some(13.97),
                _ => None,
            },
            (1, 2) => match (c.single, c.double, nbrs) {
                (2, 0, 2) => Some(16.61),
                (0, 1, 1) => Some(25.59),
                _ => None,
            },
            (1, 3) if c.single == 1 && nbrs == 1 => Some(27.64),
            _ => None,
        }
    } else {
        match (atom.charge, h) {
            (0, 0) => match (c.single, c.double, c.aromatic, nbrs) {
                (0, 0, 2, 2) => Some(12.89),
                (0, 0, 3, 3) => Some(4.41),
                (1, 0, 2, 3) => Some(4.93),
                (0, 1, 2, 3) => Some(8.39),
                _ => None,
            },
            (0, 1) if c.aromatic == 2 && nbrs == 2 => Some(15.79),
            (1, 0) => match (c.single, c.aromatic, nbrs) {
                (0, 3, 3) => Some(4.10),
                (1, 2, 3) => Some(3.88),
                _ => None,
            },
            (1, 1) if c.aromatic == 2 && nbrs == 2 => Some(14.14),
            _ => None,
        }
    };
    known.unwrap_or_else(|| (30.5 - nbrs as f64 * 8.2 + f64::from(h) * 1.5).max(0.0))
}

fn oxygen_psa(mol: &MolGraph, i: usize, three_ring: bool) -> f64 {
    let atom = &mol.atoms[i];
    let c = bond_counts(mol, i);
    let nbrs = mol.degree(i);
    let h = atom.h_count;
    let known = if atom.aromatic {
        (c.aromatic == 2 && nbrs == 2 && h == 0 && atom.charge == 0).then_some(13.14)
    } else {
        match (atom.charge, h, c.single, c.double, nbrs) {
            (0, 0, 2, 0, 2) => Some(if three_ring { 12.53 } else { 9.23 }),
            (0, 0, 0, 1, 1) => Some(17.07),
            (0, 1, 1, 0, 1) => Some(20.23),
            (-1, 0, 1, 0, 1) => Some(23.06),
            _ => None,
        }
    };
    known.unwrap_or_else(|| (28.5 - nbrs as f64 * 8.6 + f64::from(h) * 1.5).max(0.0))
}

// ── Rotatable bonds ─────────────────────────────────────────────────────────

/// Strict rotatable-bond count: acyclic single bonds between non-terminal
/// atoms, excluding triple-bonded atoms, CX3 / t-butyl rotors and amide-like
/// C(=X)-Y bonds.
pub fn rotatable_bonds(mol: &MolGraph) -> usize {
    let ring_bonds = rings::ring_bond_flags(mol);
    mol.bonds
        .iter()
        .enumerate()
        .filter(|(idx, bond)| {
            bond.order == BondOrder::Single
                && !ring_bonds[*idx]
                && rotor_end(mol, bond.a)
                && rotor_end(mol, bond.b)
                && !amide_like(mol, bond.a, bond.b)
                && !amide_like(mol, bond.b, bond.a)
        })
        .count()
}

fn rotor_end(mol: &MolGraph, atom: usize) -> bool {
    if mol.degree(atom) < 2 {
        return false;
    }
    let neighbors = mol.neighbors(atom);
    if neighbors.iter().any(|&(_, b)| mol.bonds[b].order == BondOrder::Triple) {
        return false;
    }
    if mol.atoms[atom].atomic_num == element::C {
        for halogen in [element::F, element::CL, element::BR] {
            if neighbors.iter().filter(|&&(n, _)| mol.atoms[n].atomic_num == halogen).count() >= 3 {
                return false;
            }
        }
        let methyls = neighbors
            .iter()
            .filter(|&&(n, _)| {
                let a = &mol.atoms[n];
                a.atomic_num == element::C && a.h_count == 3 && mol.degree(n) == 1
            })
            .count();
        if methyls >= 3 {
            return false;
        }
    }
    true
}

/// `carbon` is a three-connected C doubly bonded to N/O/S and `other` is a
/// non-terminal N/O/S.
fn amide_like(mol: &MolGraph, carbon: usize, other: usize) -> bool {
    let is_nos = |n: usize| matches!(mol.atoms[n].atomic_num, element::N | element::O | element::S);
    mol.atoms[carbon].atomic_num == element::C
        && mol.degree(carbon) == 3
        && mol
            .neighbors(carbon)
            .iter()
            .any(|&(n, b)| mol.bonds[b].order == BondOrder::Double && is_nos(n))
        && is_nos(other)
        && mol.degree(other) > 1
}

// ── Ring topology ───────────────────────────────────────────────────────────

/// Bridgehead and spiro atom counts from the SSSR.
///
/// A spiro atom is the single atom shared by two rings. Bridgeheads are the
/// end atoms of the path shared by two rings that have more than one bond in
/// common.
pub fn bridgehead_and_spiro(mol: &MolGraph, rings: &[Ring]) -> (usize, usize) {
    let mut spiro: HashSet<usize> = HashSet::new();
    let mut bridgeheads: HashSet<usize> = HashSet::new();
    for (i, a) in rings.iter().enumerate() {
        for b in &rings[i + 1..] {
            let shared_atoms: Vec<usize> = a.atoms.iter().copied().filter(|x| b.contains_atom(*x)).collect();
            let shared_bonds: Vec<usize> = a.bonds.iter().copied().filter(|x| b.bonds.contains(x)).collect();
            if shared_atoms.len() == 1 {
                spiro.insert(shared_atoms[0]);
            } else if shared_bonds.len() > 1 {
                // path ends: shared atoms touched by exactly one shared bond
                for &atom in &shared_atoms {
                    let touching = shared_bonds
                        .iter()
                        .filter(|&&bond| mol.bonds[bond].a == atom || mol.bonds[bond].b == atom)
                        .count();
                    if touching == 1 {
                        bridgeheads.insert(atom);
                    }
                }
            }
        }
    }
    (bridgeheads.len(), spiro.len())
}

// ── Stereo ──────────────────────────────────────────────────────────────────

/// Assigned plus unassigned stereocentres.
///
/// Tetrahedral carbon candidates count when their four substituents (an
/// implicit hydrogen included) fall into distinct symmetry classes. Tagged
/// non-carbon centres are taken as given.
pub fn stereocenter_count(mol: &MolGraph) -> usize {
    let ranks = symmetry_classes(mol);
    (0..mol.atom_count())
        .filter(|&i| {
            let atom = &mol.atoms[i];
            if atom.atomic_num != element::C {
                return atom.chirality != Chirality::None;
            }
            if atom.aromatic || atom.h_count > 1 || mol.degree(i) + usize::from(atom.h_count) != 4 {
                return false;
            }
            if mol.neighbors(i).iter().any(|&(_, b)| mol.bonds[b].order != BondOrder::Single) {
                return false;
            }
            let classes: HashSet<u64> = mol.neighbors(i).iter().map(|&(n, _)| ranks[n]).collect();
            classes.len() == mol.degree(i)
        })
        .count()
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn bond_code(order: BondOrder) -> u8 {
    match order {
        BondOrder::Single => 1,
        BondOrder::Double => 2,
        BondOrder::Triple => 3,
        BondOrder::Aromatic => 4,
    }
}

fn atom_invariant(mol: &MolGraph, i: usize, ring_atoms: &[bool]) -> u64 {
    let a = &mol.atoms[i];
    hash_of(&(
        a.atomic_num,
        mol.degree(i),
        a.h_count,
        a.charge,
        a.isotope,
        a.aromatic,
        ring_atoms[i],
    ))
}

/// Iteratively refined atom classes (Morgan's extended connectivity).
pub fn symmetry_classes(mol: &MolGraph) -> Vec<u64> {
    let ring_bonds = rings::ring_bond_flags(mol);
    let ring_atoms: Vec<bool> = (0..mol.atom_count())
        .map(|i| mol.neighbors(i).iter().any(|&(_, b)| ring_bonds[b]))
        .collect();
    let mut ranks: Vec<u64> = (0..mol.atom_count()).map(|i| atom_invariant(mol, i, &ring_atoms)).collect();
    let mut classes = ranks.iter().collect::<HashSet<_>>().len();
    for _ in 0..mol.atom_count() {
        let next: Vec<u64> = (0..mol.atom_count())
            .map(|i| {
                let mut env: Vec<(u8, u64)> = mol
                    .neighbors(i)
                    .iter()
                    .map(|&(n, b)| (bond_code(mol.bonds[b].order), ranks[n]))
                    .collect();
                env.sort_unstable();
                hash_of(&(ranks[i], env))
            })
            .collect();
        let next_classes = next.iter().collect::<HashSet<_>>().len();
        ranks = next;
        if next_classes == classes {
            break;
        }
        classes = next_classes;
    }
    ranks
}

// ── Morgan environments ─────────────────────────────────────────────────────

/// Number of circular environments up to `radius`, counting one per atom at
/// radius 0 and, for larger radii, one per distinct bond neighbourhood.
pub fn morgan_environment_count(mol: &MolGraph, radius: usize) -> usize {
    let n = mol.atom_count();
    let mut count = n;
    let mut seen: HashSet<Vec<usize>> = HashSet::new();
    // per atom: bonds covered so far and the atom frontier
    let mut covered: Vec<HashSet<usize>> = vec![HashSet::new(); n];
    let mut frontier: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();

    for _ in 0..radius {
        for atom in 0..n {
            let mut grown = false;
            let mut next_frontier = Vec::new();
            for &f in &frontier[atom] {
                for &(nbr, bond) in mol.neighbors(f) {
                    if covered[atom].insert(bond) {
                        grown = true;
                        next_frontier.push(nbr);
                    }
                }
            }
            frontier[atom] = next_frontier;
            if !grown {
                continue;
            }
            let mut key: Vec<usize> = covered[atom].iter().copied().collect();
            key.sort_unstable();
            if seen.insert(key) {
                count += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::parse_smiles;

    fn desc(smiles: &str) -> Descriptors {
        Descriptors::compute(&parse_smiles(smiles).unwrap())
    }

    #[test]
    fn test_molecular_weight() {
        assert!((desc("CCO").mol_weight - 46.069).abs() < 0.01);
        assert!((desc("c1ccccc1").mol_weight - 78.114).abs() < 0.01);
    }

    #[test]
    fn test_log_p_benzene_and_methanol() {
        assert!((desc("c1ccccc1").log_p - 1.6866).abs() < 1e-9);
        assert!((desc("CO").log_p - -0.3915).abs() < 1e-9);
    }

    #[test]
    fn test_tpsa() {
        // acetic acid: carbonyl O + hydroxyl O
        assert!((desc("CC(=O)O").tpsa - 37.30).abs() < 1e-9);
        // pyridine
        assert!((desc("c1ccncc1").tpsa - 12.89).abs() < 1e-9);
        assert_eq!(desc("CCCC").tpsa, 0.0);
    }

    #[test]
    fn test_rotatable_bonds() {
        assert_eq!(desc("CCCC").rotatable_bonds, 1);
        assert_eq!(desc("CC").rotatable_bonds, 0);
        // amide C-N excluded, the ethyl bond counts
        assert_eq!(desc("CCNC(C)=O").rotatable_bonds, 1);
        assert_eq!(desc("c1ccccc1-c1ccccc1").rotatable_bonds, 1);
    }

    #[test]
    fn test_ring_descriptors() {
        let naphthalene = desc("c1ccc2ccccc2c1");
        assert_eq!(naphthalene.ring_count, 2);
        assert_eq!(naphthalene.aromatic_rings, 2);
        assert_eq!(naphthalene.bridgeheads, 0);
        assert_eq!(naphthalene.spiro_atoms, 0);

        let norbornane = desc("C1CC2CCC1C2");
        assert_eq!(norbornane.bridgeheads, 2);

        let spiro = desc("C1CCC2(CC1)CCC2");
        assert_eq!(spiro.spiro_atoms, 1);
        assert_eq!(spiro.bridgeheads, 0);
    }

    #[test]
    fn test_stereocenters() {
        assert_eq!(desc("CC(O)CC").stereocenters, 1);
        assert_eq!(desc("N[C@@H](C)C(=O)O").stereocenters, 1);
        assert_eq!(desc("CC(C)O").stereocenters, 0);
        assert_eq!(desc("CCCC").stereocenters, 0);
    }

    #[test]
    fn test_morgan_environment_count() {
        let methane = parse_smiles("C").unwrap();
        assert_eq!(morgan_environment_count(&methane, 2), 1);
        // ethane: two atoms, one shared one-bond neighbourhood
        let ethane = parse_smiles("CC").unwrap();
        assert_eq!(morgan_environment_count(&ethane, 2), 3);
        // propane: 3 atoms, {b0}, {b1}, {b0,b1}
        let propane = parse_smiles("CCC").unwrap();
        assert_eq!(morgan_environment_count(&propane, 2), 6);
    }

    #[test]
    fn test_heteroatoms_and_aromatic_proportion() {
        let d = desc("c1ccncc1O");
        assert_eq!(d.heteroatoms, 2);
        assert!((d.aromatic_proportion - 6.0 / 7.0).abs() < 1e-12);
    }
}
