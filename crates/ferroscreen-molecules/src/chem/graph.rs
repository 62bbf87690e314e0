//! Molecular graph with hydrogen counts folded onto heavy atoms.

use super::element::{self, ElementInfo};
use super::rings::{self, Ring};
use super::ChemError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    /// Valence contribution; aromatic bonds count as one and are patched up
    /// per atom in [`MolGraph::default_hydrogens`].
    pub fn valence(self) -> u8 {
        match self {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Chirality {
    #[default]
    None,
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub atomic_num: u8,
    pub aromatic: bool,
    pub charge: i8,
    pub isotope: Option<u16>,
    /// Total attached hydrogens (implicit plus explicit).
    pub h_count: u8,
    /// Hydrogen count was given explicitly and must not be recomputed.
    pub fixed_h: bool,
    pub chirality: Chirality,
}

impl Atom {
    pub fn new(atomic_num: u8) -> Self {
        Self {
            atomic_num,
            aromatic: false,
            charge: 0,
            isotope: None,
            h_count: 0,
            fixed_h: false,
            chirality: Chirality::None,
        }
    }

    pub fn element(&self) -> Option<&'static ElementInfo> {
        element::by_number(self.atomic_num)
    }

    pub fn symbol(&self) -> &'static str {
        self.element().map(|e| e.symbol).unwrap_or("*")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bond {
    pub a: usize,
    pub b: usize,
    pub order: BondOrder,
}

impl Bond {
    pub fn other(&self, atom: usize) -> usize {
        if self.a == atom {
            self.b
        } else {
            self.a
        }
    }
}

/// Heavy-atom molecular graph.
#[derive(Debug, Clone, Default)]
pub struct MolGraph {
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl MolGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        self.atoms.len() - 1
    }

    pub fn add_bond(&mut self, a: usize, b: usize, order: BondOrder) -> Result<usize, ChemError> {
        if a == b || a >= self.atoms.len() || b >= self.atoms.len() {
            return Err(ChemError::InvalidBond(a, b));
        }
        if self.bond_between(a, b).is_some() {
            return Err(ChemError::DuplicateBond(a, b));
        }
        let idx = self.bonds.len();
        self.bonds.push(Bond { a, b, order });
        self.adjacency[a].push((b, idx));
        self.adjacency[b].push((a, idx));
        Ok(idx)
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// `(neighbour, bond index)` pairs.
    pub fn neighbors(&self, atom: usize) -> &[(usize, usize)] {
        &self.adjacency[atom]
    }

    pub fn degree(&self, atom: usize) -> usize {
        self.adjacency[atom].len()
    }

    pub fn bond_between(&self, a: usize, b: usize) -> Option<usize> {
        self.adjacency
            .get(a)?
            .iter()
            .find(|(n, _)| *n == b)
            .map(|(_, bond)| *bond)
    }

    /// Number of connected components.
    pub fn component_count(&self) -> usize {
        let mut seen = vec![false; self.atoms.len()];
        let mut count = 0;
        for start in 0..self.atoms.len() {
            if seen[start] {
                continue;
            }
            count += 1;
            let mut stack = vec![start];
            seen[start] = true;
            while let Some(a) = stack.pop() {
                for &(n, _) in self.neighbors(a) {
                    if !seen[n] {
                        seen[n] = true;
                        stack.push(n);
                    }
                }
            }
        }
        count
    }

    fn bond_valence(&self, atom: usize) -> (u8, usize) {
        let mut sum = 0u8;
        let mut aromatic = 0;
        for &(_, b) in self.neighbors(atom) {
            let order = self.bonds[b].order;
            if order == BondOrder::Aromatic {
                aromatic += 1;
            }
            sum = sum.saturating_add(order.valence());
        }
        (sum, aromatic)
    }

    /// Allowed valences for an atom after charge adjustment.
    fn target_valences(atom: &Atom) -> Vec<i16> {
        let Some(info) = atom.element() else {
            return Vec::new();
        };
        let charge = i16::from(atom.charge);
        info.valences
            .iter()
            .map(|&v| {
                let v = i16::from(v);
                match atom.atomic_num {
                    element::B => v - charge,
                    element::C | 14 | 32 => v - charge.abs(),
                    _ => v + charge,
                }
            })
            .filter(|v| *v >= 0)
            .collect()
    }

    /// Hydrogens implied by the lowest default valence that fits the bonds.
    pub fn default_hydrogens(&self, atom: usize) -> u8 {
        let a = &self.atoms[atom];
        let (mut sum, aromatic_bonds) = self.bond_valence(atom);
        let aromatic = a.aromatic || aromatic_bonds > 0;
        // one extra shared electron for aromatic C, N, B, P
        if aromatic && matches!(a.atomic_num, element::C | element::N | element::B | element::P) {
            sum += 1;
        }
        let sum = i16::from(sum);
        let targets = Self::target_valences(a);
        if aromatic {
            return targets
                .first()
                .map(|t| (t - sum).max(0) as u8)
                .unwrap_or(0);
        }
        targets
            .iter()
            .find(|&&t| t >= sum)
            .map(|t| (t - sum) as u8)
            .unwrap_or(0)
    }

    /// Fills `h_count` for every atom without a fixed count.
    pub fn assign_implicit_hydrogens(&mut self) {
        for i in 0..self.atoms.len() {
            if !self.atoms[i].fixed_h {
                self.atoms[i].h_count = self.default_hydrogens(i);
            }
        }
    }

    /// Removes hydrogen atoms attached to exactly one heavy atom, adding them
    /// to that atom's hydrogen count.
    pub fn fold_explicit_hydrogens(&mut self) {
        let removable: Vec<usize> = (0..self.atoms.len())
            .filter(|&i| {
                let a = &self.atoms[i];
                a.atomic_num == 1
                    && a.isotope.is_none()
                    && a.charge == 0
                    && self.degree(i) == 1
                    && self.atoms[self.adjacency[i][0].0].atomic_num != 1
            })
            .collect();
        if removable.is_empty() {
            return;
        }
        let mut drop = vec![false; self.atoms.len()];
        for &h in &removable {
            drop[h] = true;
            let heavy = self.adjacency[h][0].0;
            let atom = &mut self.atoms[heavy];
            atom.h_count = atom.h_count.saturating_add(1);
        }

        let mut remap = vec![usize::MAX; self.atoms.len()];
        let mut rebuilt = MolGraph::new();
        for (i, atom) in self.atoms.iter().enumerate() {
            if !drop[i] {
                remap[i] = rebuilt.add_atom(atom.clone());
            }
        }
        for bond in &self.bonds {
            if drop[bond.a] || drop[bond.b] {
                continue;
            }
            rebuilt.bonds.push(Bond {
                a: remap[bond.a],
                b: remap[bond.b],
                order: bond.order,
            });
            let idx = rebuilt.bonds.len() - 1;
            rebuilt.adjacency[remap[bond.a]].push((remap[bond.b], idx));
            rebuilt.adjacency[remap[bond.b]].push((remap[bond.a], idx));
        }
        *self = rebuilt;
    }

    /// Rejects atoms whose bonds exceed every allowed valence, and aromatic
    /// atoms outside any ring.
    pub fn sanitize(&self) -> Result<(), ChemError> {
        let ring_bonds = rings::ring_bond_flags(self);
        for (i, atom) in self.atoms.iter().enumerate() {
            if atom.aromatic {
                let in_ring = self.neighbors(i).iter().any(|&(_, b)| ring_bonds[b]);
                if !in_ring {
                    return Err(ChemError::NonRingAromatic(i));
                }
                continue;
            }
            let targets = Self::target_valences(atom);
            let Some(&max) = targets.iter().max() else {
                continue;
            };
            let (sum, _) = self.bond_valence(i);
            if i16::from(sum) + i16::from(atom.h_count) > max {
                return Err(ChemError::Valence {
                    atom: i,
                    symbol: atom.symbol().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Marks Kekulé rings that satisfy Hückel's 4n+2 rule as aromatic.
    /// Hydrogen counts must already be assigned.
    pub fn perceive_aromaticity(&mut self) {
        let rings = rings::sssr(self);
        // fused systems may need a second pass once a neighbour ring is aromatic
        for _ in 0..2 {
            let mut changed = false;
            for ring in &rings {
                if ring.atoms.iter().all(|&a| self.atoms[a].aromatic) {
                    continue;
                }
                if self.is_huckel(ring) {
                    for &a in &ring.atoms {
                        self.atoms[a].aromatic = true;
                    }
                    for &b in &ring.bonds {
                        self.bonds[b].order = BondOrder::Aromatic;
                    }
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn is_huckel(&self, ring: &Ring) -> bool {
        let mut electrons = 0u32;
        for &a in &ring.atoms {
            match self.pi_electrons(a, ring) {
                Some(e) => electrons += e,
                None => return false,
            }
        }
        electrons >= 2 && (electrons - 2) % 4 == 0
    }

    fn pi_electrons(&self, atom: usize, ring: &Ring) -> Option<u32> {
        let a = &self.atoms[atom];
        let mut ring_double = false;
        let mut exo_double = false;
        let mut triple = false;
        let mut ring_aromatic = false;
        for &(n, b) in self.neighbors(atom) {
            let in_ring = ring.bonds.contains(&b);
            match self.bonds[b].order {
                BondOrder::Double if in_ring => ring_double = true,
                BondOrder::Double => {
                    if self.atoms[n].atomic_num != element::C {
                        exo_double = true;
                    } else {
                        return None;
                    }
                }
                BondOrder::Triple => triple = true,
                BondOrder::Aromatic if in_ring => ring_aromatic = true,
                _ => {}
            }
        }
        if triple {
            return None;
        }
        if ring_double || ring_aromatic {
            return Some(1);
        }
        if exo_double {
            return Some(0);
        }
        let degree = self.degree(atom) + usize::from(a.h_count);
        match a.atomic_num {
            element::N | element::P if degree <= 3 && a.charge <= 0 => Some(2),
            element::O | element::S | 34 if a.charge == 0 && degree <= 2 => Some(2),
            element::C if a.charge < 0 => Some(2),
            element::C | element::B if a.charge > 0 || a.atomic_num == element::B => Some(0),
            _ => None,
        }
    }

    pub fn heavy_atom_count(&self) -> usize {
        self.atoms.iter().filter(|a| a.atomic_num > 1).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::parse_smiles;

    #[test]
    fn test_implicit_hydrogens() {
        let mol = parse_smiles("CC(=O)N").unwrap();
        let h: Vec<u8> = mol.atoms.iter().map(|a| a.h_count).collect();
        assert_eq!(h, vec![3, 0, 0, 2]);
    }

    #[test]
    fn test_aromatic_hydrogens() {
        let pyrrole = parse_smiles("c1cc[nH]c1").unwrap();
        assert_eq!(pyrrole.atoms.iter().map(|a| u32::from(a.h_count)).sum::<u32>(), 5);
        let pyridine = parse_smiles("c1ccncc1").unwrap();
        assert_eq!(pyridine.atoms[3].h_count, 0);
    }

    #[test]
    fn test_kekule_benzene_is_aromatised() {
        let mol = parse_smiles("C1=CC=CC=C1").unwrap();
        assert!(mol.atoms.iter().all(|a| a.aromatic));
        assert!(mol.bonds.iter().all(|b| b.order == BondOrder::Aromatic));
    }

    #[test]
    fn test_cyclohexadiene_is_not_aromatic() {
        let mol = parse_smiles("C1=CCC=CC1").unwrap();
        assert!(mol.atoms.iter().all(|a| !a.aromatic));
    }

    #[test]
    fn test_explicit_hydrogens_are_folded() {
        let mol = parse_smiles("[H]OC([H])([H])[H]").unwrap();
        assert_eq!(mol.atom_count(), 2);
        assert_eq!(mol.atoms[1].h_count, 3);
        assert_eq!(mol.atoms[0].h_count, 1);
    }

    #[test]
    fn test_charged_nitrogen() {
        let mol = parse_smiles("C[N+](C)(C)C").unwrap();
        assert_eq!(mol.atoms[1].h_count, 0);
        let ammonium = parse_smiles("[NH4+]").unwrap();
        assert_eq!(ammonium.atoms[0].h_count, 4);
    }
}
