//! 2D chemistry for the ADMET heuristics and ligand library handling.
//!
//! Covers what screening needs from a cheminformatics toolkit: reading SMILES
//! and V2000 mol blocks into a heavy-atom graph, writing SMILES back out, ring
//! and aromaticity perception, and the descriptors behind ESOL solubility and
//! synthetic accessibility. Contribution tables are coarse approximations of
//! the published atom-typing schemes.

pub mod descriptors;
pub mod element;
pub mod graph;
pub mod molfile;
pub mod rings;
pub mod smiles;

use thiserror::Error;

pub use descriptors::Descriptors;
pub use graph::{Atom, Bond, BondOrder, Chirality, MolGraph};
pub use molfile::{parse_molblock, MolBlock};
pub use smiles::{parse_smiles, write_smiles};

#[derive(Debug, Error, PartialEq)]
pub enum ChemError {
    #[error("empty structure")]
    Empty,

    #[error("SMILES syntax error at {position}: {reason}")]
    Syntax { position: usize, reason: String },

    #[error("mol block: {0}")]
    MolBlock(String),

    #[error("invalid bond {0}-{1}")]
    InvalidBond(usize, usize),

    #[error("duplicate bond {0}-{1}")]
    DuplicateBond(usize, usize),

    #[error("valence exceeded on atom {atom} ({symbol})")]
    Valence { atom: usize, symbol: String },

    #[error("aromatic atom {0} is not in a ring")]
    NonRingAromatic(usize),
}
