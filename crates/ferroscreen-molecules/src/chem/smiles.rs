//! SMILES reading and writing.

use std::collections::HashMap;

use super::element;
use super::graph::{Atom, BondOrder, Chirality, MolGraph};
use super::ChemError;

/// Parses a SMILES string into a sanitized heavy-atom graph with hydrogen
/// counts assigned and aromaticity perceived.
pub fn parse_smiles(input: &str) -> Result<MolGraph, ChemError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ChemError::Empty);
    }
    let mut parser = Parser::new(input);
    parser.parse()?;
    let mut graph = parser.graph;
    graph.fold_explicit_hydrogens();
    if graph.atom_count() == 0 {
        return Err(ChemError::Empty);
    }
    graph.assign_implicit_hydrogens();
    graph.sanitize()?;
    graph.perceive_aromaticity();
    Ok(graph)
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
    graph: MolGraph,
    prev: Option<usize>,
    branches: Vec<Option<usize>>,
    pending: Option<BondOrder>,
    open_rings: HashMap<u16, (usize, Option<BondOrder>)>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            source,
            graph: MolGraph::new(),
            prev: None,
            branches: Vec::new(),
            pending: None,
            open_rings: HashMap::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn error(&self, reason: &str) -> ChemError {
        ChemError::Syntax {
            position: self.pos,
            reason: format!("{reason} in {:?}", self.source),
        }
    }

    fn parse(&mut self) -> Result<(), ChemError> {
        while let Some(c) = self.peek() {
            match c {
                '(' => {
                    if self.prev.is_none() {
                        return Err(self.error("branch without preceding atom"));
                    }
                    self.branches.push(self.prev);
                    self.pos += 1;
                }
                ')' => {
                    let Some(top) = self.branches.pop() else {
                        return Err(self.error("unbalanced ')'"));
                    };
                    if self.pending.is_some() {
                        return Err(self.error("dangling bond"));
                    }
                    self.prev = top;
                    self.pos += 1;
                }
                '-' | '/' | '\\' => self.set_bond(BondOrder::Single)?,
                '=' => self.set_bond(BondOrder::Double)?,
                '#' => self.set_bond(BondOrder::Triple)?,
                ':' => self.set_bond(BondOrder::Aromatic)?,
                '.' => {
                    if self.pending.is_some() {
                        return Err(self.error("dangling bond"));
                    }
                    self.prev = None;
                    self.pos += 1;
                }
                '0'..='9' => {
                    self.pos += 1;
                    let num = c.to_digit(10).unwrap_or(0) as u16;
                    self.ring_closure(num)?;
                }
                '%' => {
                    let digits: String = self.chars.iter().skip(self.pos + 1).take(2).collect();
                    let num = digits
                        .parse::<u16>()
                        .ok()
                        .filter(|_| digits.len() == 2)
                        .ok_or_else(|| self.error("bad %nn ring closure"))?;
                    self.pos += 3;
                    self.ring_closure(num)?;
                }
                '[' => {
                    let atom = self.bracket_atom()?;
                    self.attach(atom)?;
                }
                _ => {
                    let atom = self.organic_atom()?;
                    self.attach(atom)?;
                }
            }
        }
        if !self.branches.is_empty() {
            return Err(self.error("unclosed branch"));
        }
        if !self.open_rings.is_empty() {
            return Err(self.error("unclosed ring"));
        }
        if self.pending.is_some() {
            return Err(self.error("dangling bond"));
        }
        Ok(())
    }

    fn set_bond(&mut self, order: BondOrder) -> Result<(), ChemError> {
        if self.pending.is_some() || self.prev.is_none() {
            return Err(self.error("unexpected bond symbol"));
        }
        self.pending = Some(order);
        self.pos += 1;
        Ok(())
    }

    fn default_order(&self, a: usize, b: usize) -> BondOrder {
        if self.graph.atoms[a].aromatic && self.graph.atoms[b].aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn attach(&mut self, atom: Atom) -> Result<(), ChemError> {
        let idx = self.graph.add_atom(atom);
        if let Some(prev) = self.prev {
            let order = self
                .pending
                .take()
                .unwrap_or_else(|| self.default_order(prev, idx));
            self.graph
                .add_bond(prev, idx, order)
                .map_err(|_| self.error("invalid bond"))?;
        }
        self.prev = Some(idx);
        Ok(())
    }

    fn ring_closure(&mut self, num: u16) -> Result<(), ChemError> {
        let Some(current) = self.prev else {
            return Err(self.error("ring closure without atom"));
        };
        let here = self.pending.take();
        match self.open_rings.remove(&num) {
            Some((start, there)) => {
                let order = match (here, there) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(self.error("conflicting ring-closure bonds"))
                    }
                    (Some(o), _) | (None, Some(o)) => o,
                    (None, None) => self.default_order(start, current),
                };
                self.graph
                    .add_bond(start, current, order)
                    .map_err(|_| self.error("invalid ring closure"))?;
            }
            None => {
                self.open_rings.insert(num, (current, here));
            }
        }
        Ok(())
    }

    fn organic_atom(&mut self) -> Result<Atom, ChemError> {
        let c = self.peek().ok_or_else(|| self.error("unexpected end"))?;
        let next = self.chars.get(self.pos + 1).copied();
        let (number, aromatic, width) = match (c, next) {
            ('C', Some('l')) => (element::CL, false, 2),
            ('B', Some('r')) => (element::BR, false, 2),
            ('B', _) => (element::B, false, 1),
            ('C', _) => (element::C, false, 1),
            ('N', _) => (element::N, false, 1),
            ('O', _) => (element::O, false, 1),
            ('P', _) => (element::P, false, 1),
            ('S', _) => (element::S, false, 1),
            ('F', _) => (element::F, false, 1),
            ('I', _) => (element::I, false, 1),
            ('b', _) => (element::B, true, 1),
            ('c', _) => (element::C, true, 1),
            ('n', _) => (element::N, true, 1),
            ('o', _) => (element::O, true, 1),
            ('p', _) => (element::P, true, 1),
            ('s', _) => (element::S, true, 1),
            ('*', _) => (0, false, 1),
            _ => return Err(self.error(&format!("unexpected character {c:?}"))),
        };
        self.pos += width;
        let mut atom = Atom::new(number);
        atom.aromatic = aromatic;
        Ok(atom)
    }

    fn read_digits(&mut self) -> Option<String> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        (self.pos > start).then(|| self.chars[start..self.pos].iter().collect())
    }

    /// Reads an unsigned field and rejects values that do not fit `T`.
    fn read_bounded<T: TryFrom<u64>>(&mut self, what: &str) -> Result<Option<T>, ChemError> {
        let Some(digits) = self.read_digits() else {
            return Ok(None);
        };
        digits
            .parse::<u64>()
            .ok()
            .and_then(|n| T::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| self.error(&format!("{what} {digits} out of range")))
    }

    fn bracket_atom(&mut self) -> Result<Atom, ChemError> {
        self.pos += 1; // '['
        let isotope = self.read_bounded::<u16>("isotope")?;

        let c = self.peek().ok_or_else(|| self.error("unterminated bracket atom"))?;
        let (number, aromatic) = if c == '*' {
            self.pos += 1;
            (0, false)
        } else if c.is_ascii_lowercase() {
            let two: String = self.chars.iter().skip(self.pos).take(2).collect();
            let (symbol, width) = match two.as_str() {
                "se" | "as" | "te" => (two.clone(), 2),
                _ => (c.to_string(), 1),
            };
            let capitalised = format!("{}{}", symbol[..1].to_ascii_uppercase(), &symbol[1..]);
            let info = element::by_symbol(&capitalised)
                .filter(|e| matches!(e.number, 5 | 6 | 7 | 8 | 15 | 16 | 33 | 34 | 52))
                .ok_or_else(|| self.error("unknown aromatic symbol"))?;
            self.pos += width;
            (info.number, true)
        } else if c.is_ascii_uppercase() {
            let next = self.chars.get(self.pos + 1).copied();
            let two = next
                .filter(char::is_ascii_lowercase)
                .map(|n| format!("{c}{n}"))
                .and_then(|s| element::by_symbol(&s));
            match two {
                Some(info) => {
                    self.pos += 2;
                    (info.number, false)
                }
                None => {
                    let info = element::by_symbol(&c.to_string())
                        .ok_or_else(|| self.error("unknown element"))?;
                    self.pos += 1;
                    (info.number, false)
                }
            }
        } else {
            return Err(self.error("expected element symbol"));
        };

        let mut atom = Atom::new(number);
        atom.aromatic = aromatic;
        atom.isotope = isotope;
        atom.fixed_h = true;

        if self.peek() == Some('@') {
            self.pos += 1;
            atom.chirality = if self.peek() == Some('@') {
                self.pos += 1;
                Chirality::Clockwise
            } else {
                Chirality::CounterClockwise
            };
            // extended classes (@TH1, @SP2, ...) carry no extra information here
            while self.peek().is_some_and(|c| c.is_ascii_uppercase() && c != 'H') {
                self.pos += 1;
                self.read_digits();
            }
        }

        if self.peek() == Some('H') {
            self.pos += 1;
            atom.h_count = self.read_bounded::<u8>("hydrogen count")?.unwrap_or(1);
        }

        match self.peek() {
            Some(sign @ ('+' | '-')) => {
                self.pos += 1;
                let unit: i8 = if sign == '+' { 1 } else { -1 };
                let magnitude: i8 = match self.read_bounded::<i8>("charge")? {
                    Some(n) => n,
                    None => {
                        let mut n: i8 = 1;
                        while self.peek() == Some(sign) {
                            self.pos += 1;
                            n = n.checked_add(1).ok_or_else(|| self.error("charge out of range"))?;
                        }
                        n
                    }
                };
                atom.charge = unit * magnitude;
            }
            _ => {}
        }

        if self.peek() == Some(':') {
            self.pos += 1;
            self.read_digits();
        }

        if self.peek() != Some(']') {
            return Err(self.error("unterminated bracket atom"));
        }
        self.pos += 1;
        Ok(atom)
    }
}

// ── Writer ──────────────────────────────────────────────────────────────────

/// Writes a (non-canonical) SMILES string by depth-first traversal.
///
/// Stereo is not written; aromatic atoms are emitted in lowercase.
pub fn write_smiles(graph: &MolGraph) -> String {
    let n = graph.atom_count();
    let mut visited = vec![false; n];
    let mut children: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
    let mut closures: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut tree_bond = vec![false; graph.bonds.len()];
    let mut roots = Vec::new();

    for root in 0..n {
        if visited[root] {
            continue;
        }
        roots.push(root);
        classify(graph, root, &mut visited, &mut children, &mut closures, &mut tree_bond);
    }

    let mut out = String::new();
    let mut open: HashMap<usize, u16> = HashMap::new();
    let mut free_digits: Vec<u16> = Vec::new();
    let mut next_digit = 1u16;
    for (i, &root) in roots.iter().enumerate() {
        if i > 0 {
            out.push('.');
        }
        let mut writer = Emitter {
            graph,
            children: &children,
            closures: &closures,
            open: &mut open,
            free_digits: &mut free_digits,
            next_digit: &mut next_digit,
            out: &mut out,
        };
        writer.emit(root);
    }
    out
}

fn classify(
    graph: &MolGraph,
    root: usize,
    visited: &mut [bool],
    children: &mut [Vec<(usize, usize)>],
    closures: &mut [Vec<usize>],
    tree_bond: &mut [bool],
) {
    // iterative DFS mirroring the recursive emit order
    let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
    visited[root] = true;
    let mut seen_closure = vec![false; graph.bonds.len()];
    while let Some(top) = stack.last_mut() {
        let (atom, next) = *top;
        let Some(&(nbr, bond)) = graph.neighbors(atom).get(next) else {
            stack.pop();
            continue;
        };
        top.1 += 1;
        if tree_bond[bond] || seen_closure[bond] {
            continue;
        }
        if visited[nbr] {
            seen_closure[bond] = true;
            closures[atom].push(bond);
            closures[nbr].push(bond);
        } else {
            visited[nbr] = true;
            tree_bond[bond] = true;
            children[atom].push((nbr, bond));
            stack.push((nbr, 0));
        }
    }
}

struct Emitter<'g, 'o> {
    graph: &'g MolGraph,
    children: &'g [Vec<(usize, usize)>],
    closures: &'g [Vec<usize>],
    open: &'o mut HashMap<usize, u16>,
    free_digits: &'o mut Vec<u16>,
    next_digit: &'o mut u16,
    out: &'o mut String,
}

impl Emitter<'_, '_> {
    fn emit(&mut self, atom: usize) {
        let (graph, closures, children) = (self.graph, self.closures, self.children);
        self.out.push_str(&atom_token(graph, atom));
        for &bond in &closures[atom] {
            match self.open.remove(&bond) {
                Some(digit) => {
                    push_ring_digit(self.out, digit);
                    self.free_digits.push(digit);
                    self.free_digits.sort_unstable_by(|a, b| b.cmp(a));
                }
                None => {
                    let digit = self.free_digits.pop().unwrap_or_else(|| {
                        let d = *self.next_digit;
                        *self.next_digit += 1;
                        d
                    });
                    self.out.push_str(bond_token(graph, bond));
                    push_ring_digit(self.out, digit);
                    self.open.insert(bond, digit);
                }
            }
        }
        let kids = &children[atom];
        for (i, &(child, bond)) in kids.iter().enumerate() {
            let branch = i + 1 < kids.len();
            if branch {
                self.out.push('(');
            }
            self.out.push_str(bond_token(graph, bond));
            self.emit(child);
            if branch {
                self.out.push(')');
            }
        }
    }
}

fn push_ring_digit(out: &mut String, digit: u16) {
    if digit < 10 {
        out.push_str(&digit.to_string());
    } else {
        out.push_str(&format!("%{digit:02}"));
    }
}

fn bond_token(graph: &MolGraph, bond: usize) -> &'static str {
    let b = &graph.bonds[bond];
    let both_aromatic = graph.atoms[b.a].aromatic && graph.atoms[b.b].aromatic;
    match b.order {
        BondOrder::Single if both_aromatic => "-",
        BondOrder::Single => "",
        BondOrder::Double => "=",
        BondOrder::Triple => "#",
        BondOrder::Aromatic if both_aromatic => "",
        BondOrder::Aromatic => ":",
    }
}

fn atom_token(graph: &MolGraph, idx: usize) -> String {
    let atom = &graph.atoms[idx];
    let symbol = if atom.aromatic {
        atom.symbol().to_ascii_lowercase()
    } else {
        atom.symbol().to_string()
    };
    let needs_bracket = atom.charge != 0
        || atom.isotope.is_some()
        || !element::is_organic_subset(atom.atomic_num)
        || atom.h_count != graph.default_hydrogens(idx);
    if !needs_bracket {
        return symbol;
    }
    let mut token = String::from("[");
    if let Some(iso) = atom.isotope {
        token.push_str(&iso.to_string());
    }
    token.push_str(&symbol);
    match atom.h_count {
        0 => {}
        1 => token.push('H'),
        h => token.push_str(&format!("H{h}")),
    }
    match atom.charge {
        0 => {}
        1 => token.push('+'),
        -1 => token.push('-'),
        c if c > 0 => token.push_str(&format!("+{c}")),
        c => token.push_str(&format!("-{}", -c)),
    }
    token.push(']');
    token
}
