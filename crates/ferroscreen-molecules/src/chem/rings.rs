//! Ring perception: ring-bond flags and the smallest set of smallest rings.

use std::collections::{HashSet, VecDeque};

use super::graph::MolGraph;

/// A ring as an ordered atom cycle plus its bond indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ring {
    pub atoms: Vec<usize>,
    pub bonds: Vec<usize>,
}

impl Ring {
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn contains_atom(&self, atom: usize) -> bool {
        self.atoms.contains(&atom)
    }
}

/// `true` for every bond that lies on a cycle (i.e. is not a bridge).
pub fn ring_bond_flags(graph: &MolGraph) -> Vec<bool> {
    let n = graph.atom_count();
    let mut in_ring = vec![true; graph.bonds.len()];
    let mut disc = vec![usize::MAX; n];
    let mut low = vec![0usize; n];
    let mut timer = 0;

    for root in 0..n {
        if disc[root] != usize::MAX {
            continue;
        }
        // iterative DFS: (atom, parent bond, next neighbour index)
        let mut stack: Vec<(usize, Option<usize>, usize)> = vec![(root, None, 0)];
        disc[root] = timer;
        low[root] = timer;
        timer += 1;
        while let Some(top) = stack.last_mut() {
            let (atom, parent_bond, next) = *top;
            if let Some(&(nbr, bond)) = graph.neighbors(atom).get(next) {
                top.2 += 1;
                if Some(bond) == parent_bond {
                    continue;
                }
                if disc[nbr] == usize::MAX {
                    disc[nbr] = timer;
                    low[nbr] = timer;
                    timer += 1;
                    stack.push((nbr, Some(bond), 0));
                } else {
                    low[atom] = low[atom].min(disc[nbr]);
                }
            } else {
                stack.pop();
                if let (Some(bond), Some(&(parent, _, _))) = (parent_bond, stack.last()) {
                    low[parent] = low[parent].min(low[atom]);
                    if low[atom] > disc[parent] {
                        in_ring[bond] = false;
                    }
                }
            }
        }
    }
    in_ring
}

/// Cyclomatic number: the size of any minimum cycle basis.
pub fn cyclomatic_number(graph: &MolGraph) -> usize {
    (graph.bonds.len() + graph.component_count()).saturating_sub(graph.atom_count())
}

/// Smallest set of smallest rings.
///
/// Horton candidates (for every ring atom `v` and ring bond `x-y`, the cycle
/// `v..x-y..v` built from BFS shortest paths) are taken shortest first and kept
/// when linearly independent over GF(2) of the rings already chosen.
pub fn sssr(graph: &MolGraph) -> Vec<Ring> {
    let wanted = cyclomatic_number(graph);
    if wanted == 0 {
        return Vec::new();
    }
    let ring_bonds = ring_bond_flags(graph);

    let mut candidates: Vec<Ring> = Vec::new();
    let mut seen: HashSet<Vec<usize>> = HashSet::new();
    let ring_atoms: Vec<usize> = (0..graph.atom_count())
        .filter(|&a| graph.neighbors(a).iter().any(|&(_, b)| ring_bonds[b]))
        .collect();
    for &root in &ring_atoms {
        let tree = bfs_tree(graph, &ring_bonds, root);
        for (idx, bond) in graph.bonds.iter().enumerate() {
            if !ring_bonds[idx] {
                continue;
            }
            if let Some(ring) = horton_cycle(&tree, root, idx, bond.a, bond.b) {
                let mut key = ring.bonds.clone();
                key.sort_unstable();
                if seen.insert(key) {
                    candidates.push(ring);
                }
            }
        }
    }
    candidates.sort_by_key(Ring::len);

    let words = graph.bonds.len().div_ceil(64);
    // rows kept sorted by pivot, highest first
    let mut basis: Vec<(usize, Vec<u64>)> = Vec::new();
    let mut chosen = Vec::new();
    for ring in candidates {
        let mut vector = vec![0u64; words];
        for &b in &ring.bonds {
            vector[b / 64] |= 1 << (b % 64);
        }
        for (pivot, row) in &basis {
            if vector[pivot / 64] & (1 << (pivot % 64)) != 0 {
                for (v, r) in vector.iter_mut().zip(row) {
                    *v ^= r;
                }
            }
        }
        let Some(pivot) = leading_bit(&vector) else {
            continue;
        };
        let at = basis.partition_point(|(p, _)| *p > pivot);
        basis.insert(at, (pivot, vector));
        chosen.push(ring);
        if chosen.len() == wanted {
            break;
        }
    }
    chosen
}

fn leading_bit(v: &[u64]) -> Option<usize> {
    v.iter()
        .enumerate()
        .rev()
        .find(|(_, w)| **w != 0)
        .map(|(i, w)| i * 64 + 63 - w.leading_zeros() as usize)
}

/// BFS parents `(parent atom, bond)` over ring bonds from `root`.
fn bfs_tree(graph: &MolGraph, ring_bonds: &[bool], root: usize) -> Vec<Option<(usize, usize)>> {
    let n = graph.atom_count();
    let mut prev: Vec<Option<(usize, usize)>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut queue = VecDeque::from([root]);
    visited[root] = true;
    while let Some(atom) = queue.pop_front() {
        for &(nbr, bond) in graph.neighbors(atom) {
            if !ring_bonds[bond] || visited[nbr] {
                continue;
            }
            visited[nbr] = true;
            prev[nbr] = Some((atom, bond));
            queue.push_back(nbr);
        }
    }
    prev
}

/// Path from `atom` up to `root` as (atoms, bonds), `atom` first.
fn path_to_root(tree: &[Option<(usize, usize)>], root: usize, atom: usize) -> Option<(Vec<usize>, Vec<usize>)> {
    let mut atoms = vec![atom];
    let mut bonds = Vec::new();
    let mut cur = atom;
    while cur != root {
        let (p, b) = tree[cur]?;
        atoms.push(p);
        bonds.push(b);
        cur = p;
    }
    Some((atoms, bonds))
}

fn horton_cycle(
    tree: &[Option<(usize, usize)>],
    root: usize,
    bond: usize,
    x: usize,
    y: usize,
) -> Option<Ring> {
    let (px_atoms, px_bonds) = path_to_root(tree, root, x)?;
    let (py_atoms, py_bonds) = path_to_root(tree, root, y)?;
    if px_bonds.contains(&bond) || py_bonds.contains(&bond) {
        return None;
    }
    // the two paths may only meet at the root
    let shared = px_atoms.iter().filter(|a| py_atoms.contains(a)).count();
    if shared != 1 {
        return None;
    }
    let mut atoms: Vec<usize> = px_atoms.into_iter().rev().collect();
    atoms.extend(py_atoms.into_iter().take_while(|&a| a != root));
    let mut bonds = px_bonds;
    bonds.push(bond);
    bonds.extend(py_bonds);
    Some(Ring { atoms, bonds })
}
