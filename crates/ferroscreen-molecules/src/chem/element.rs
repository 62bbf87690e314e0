//! Static element table.

/// Per-element data used for hydrogen assignment and weights.
#[derive(Debug)]
pub struct ElementInfo {
    pub symbol: &'static str,
    pub number: u8,
    /// Standard atomic weight (Da)
    pub weight: f64,
    /// Allowed neutral valences, lowest first. Empty for elements with no
    /// implicit-hydrogen rule (metals etc.).
    pub valences: &'static [u8],
}

const fn el(symbol: &'static str, number: u8, weight: f64, valences: &'static [u8]) -> ElementInfo {
    ElementInfo { symbol, number, weight, valences }
}

pub static ELEMENTS: &[ElementInfo] = &[
    el("*", 0, 0.0, &[]),
    el("H", 1, 1.008, &[1]),
    el("He", 2, 4.003, &[]),
    el("Li", 3, 6.94, &[]),
    el("Be", 4, 9.012, &[]),
    el("B", 5, 10.81, &[3]),
    el("C", 6, 12.011, &[4]),
    el("N", 7, 14.007, &[3, 5]),
    el("O", 8, 15.999, &[2]),
    el("F", 9, 18.998, &[1]),
    el("Ne", 10, 20.180, &[]),
    el("Na", 11, 22.990, &[]),
    el("Mg", 12, 24.305, &[]),
    el("Al", 13, 26.982, &[]),
    el("Si", 14, 28.085, &[4]),
    el("P", 15, 30.974, &[3, 5]),
    el("S", 16, 32.06, &[2, 4, 6]),
    el("Cl", 17, 35.45, &[1]),
    el("Ar", 18, 39.948, &[]),
    el("K", 19, 39.098, &[]),
    el("Ca", 20, 40.078, &[]),
    el("Fe", 26, 55.845, &[]),
    el("Co", 27, 58.933, &[]),
    el("Ni", 28, 58.693, &[]),
    el("Cu", 29, 63.546, &[]),
    el("Zn", 30, 65.38, &[]),
    el("Ga", 31, 69.723, &[]),
    el("Ge", 32, 72.630, &[4]),
    el("As", 33, 74.922, &[3, 5]),
    el("Se", 34, 78.971, &[2, 4, 6]),
    el("Br", 35, 79.904, &[1]),
    el("Kr", 36, 83.798, &[]),
    el("Sn", 50, 118.71, &[]),
    el("Te", 52, 127.60, &[2, 4, 6]),
    el("I", 53, 126.904, &[1, 3, 5]),
    el("Xe", 54, 131.293, &[]),
    el("Pt", 78, 195.084, &[]),
    el("Au", 79, 196.967, &[]),
    el("Hg", 80, 200.592, &[]),
];

/// Looks up an element by case-sensitive symbol.
pub fn by_symbol(symbol: &str) -> Option<&'static ElementInfo> {
    ELEMENTS.iter().find(|e| e.symbol == symbol)
}

/// Looks up an element by atomic number.
pub fn by_number(number: u8) -> Option<&'static ElementInfo> {
    ELEMENTS.iter().find(|e| e.number == number)
}

/// Hydrogen atomic weight.
pub const H_WEIGHT: f64 = 1.008;

pub const B: u8 = 5;
pub const C: u8 = 6;
pub const N: u8 = 7;
pub const O: u8 = 8;
pub const F: u8 = 9;
pub const P: u8 = 15;
pub const S: u8 = 16;
pub const CL: u8 = 17;
pub const BR: u8 = 35;
pub const I: u8 = 53;

/// SMILES organic subset (may be written without brackets).
pub fn is_organic_subset(number: u8) -> bool {
    matches!(number, B | C | N | O | P | S | F | CL | BR | I)
}
