//! ADMET heuristics from 2D structure.
//!
//! These are coarse screening heuristics, not validated predictive models:
//! ESOL solubility (Delaney 2004), an Ertl–Schuffenhauer style synthetic
//! accessibility score, and rule-of-thumb hERG / CYP flags.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chem::{parse_smiles, Descriptors};
use crate::round2;

const ESOL_INTERCEPT: f64 = 0.16;
const ESOL_LOGP: f64 = -0.63;
const ESOL_MW: f64 = -0.0062;
const ESOL_RB: f64 = 0.066;
const ESOL_TPSA: f64 = 0.0034;
const ESOL_AP: f64 = -1.5;

/// hERG IC50 placeholders (nM) for flagged / unflagged compounds.
pub const HERG_IC50_FLAGGED: f64 = 5.0;
pub const HERG_IC50_CLEAR: f64 = 30.0;

/// ESOL log solubility (log10 mol/L), unrounded.
pub fn esol_log_s(log_p: f64, mol_weight: f64, rotatable_bonds: usize, tpsa: f64, aromatic_proportion: f64) -> f64 {
    ESOL_INTERCEPT
        + ESOL_LOGP * log_p
        + ESOL_MW * mol_weight
        + ESOL_RB * rotatable_bonds as f64
        + ESOL_TPSA * tpsa
        + ESOL_AP * aromatic_proportion
}

/// Synthetic accessibility on a 1 (easy) to 10 (hard) scale, unrounded.
pub fn sa_score(d: &Descriptors) -> f64 {
    let n = d.heavy_atoms.max(1) as f64;
    let size_penalty = (n - 50.0).max(0.0).powf(1.005) - n + 50.0;
    let stereo_penalty = d.stereocenters as f64;
    let ring_penalty = d.ring_count as f64;
    let complexity_penalty = n.log10() * (d.bridgeheads + d.spiro_atoms + 1) as f64;
    let raw = d.morgan_environments as f64 + size_penalty + stereo_penalty + ring_penalty + complexity_penalty;
    (11.0 - raw / 10.0).clamp(1.0, 10.0)
}

/// `logP > 4` and `MW > 500`.
pub fn herg_flag(d: &Descriptors) -> bool {
    d.log_p > 4.0 && d.mol_weight > 500.0
}

/// More than three aromatic rings and more than five N/O/S atoms.
pub fn cyp_flag(d: &Descriptors) -> bool {
    d.aromatic_rings > 3 && d.heteroatoms > 5
}

/// ADMET estimates for one structure; all fields are `None` when the
/// structure could not be parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdmetProfile {
    pub log_s: Option<f64>,
    pub sa_score: Option<f64>,
    pub herg_risk: Option<bool>,
    pub herg_ic50: Option<f64>,
    pub cyp_inhibition: Option<bool>,
}

impl AdmetProfile {
    /// Profile for an unparsable structure: every field `None`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Applies the ESOL, SA, hERG and CYP heuristics to precomputed descriptors.
    pub fn from_descriptors(d: &Descriptors) -> Self {
        let herg = herg_flag(d);
        Self {
            log_s: Some(round2(esol_log_s(
                d.log_p,
                d.mol_weight,
                d.rotatable_bonds,
                d.tpsa,
                d.aromatic_proportion,
            ))),
            sa_score: Some(round2(sa_score(d))),
            herg_risk: Some(herg),
            herg_ic50: Some(if herg { HERG_IC50_FLAGGED } else { HERG_IC50_CLEAR }),
            cyp_inhibition: Some(cyp_flag(d)),
        }
    }
}

/// Scores SMILES strings into [`AdmetProfile`]s.
#[derive(Debug, Default, Clone)]
pub struct AdmetScorer {}

impl AdmetScorer {
    pub fn new() -> Self {
        Self {}
    }

    /// Descriptors for one SMILES, or `None` if it does not parse.
    pub fn descriptors(&self, smiles: &str) -> Option<Descriptors> {
        match parse_smiles(smiles) {
            Ok(mol) => Some(Descriptors::compute(&mol)),
            Err(e) => {
                debug!("ADMET: cannot parse {:?}: {}", smiles, e);
                None
            }
        }
    }

    /// Profile for one SMILES; empty when it does not parse.
    pub fn score(&self, smiles: &str) -> AdmetProfile {
        self.descriptors(smiles)
            .map(|d| AdmetProfile::from_descriptors(&d))
            .unwrap_or_default()
    }

    /// Scores each row independently; output order matches input order.
    pub fn score_batch<'a, I>(&self, smiles: I) -> Vec<AdmetProfile>
    where
        I: IntoIterator<Item = &'a str>,
    {
        smiles.into_iter().map(|s| self.score(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_esol_reference_value() {
        // 0.16 - 1.26 - 1.86 + 0.33 + 0.136 - 0.45
        let log_s = esol_log_s(2.0, 300.0, 5, 40.0, 0.3);
        assert!((log_s - -2.944).abs() < 1e-9);
    }

    #[test]
    fn test_sa_score_in_range() {
        let scorer = AdmetScorer::new();
        for smiles in [
            "C",
            "CCO",
            "CC(=O)Oc1ccccc1C(=O)O",
            "CN1C=NC2=C1C(=O)N(C(=O)N2C)C",
            "C12C3C4C1C5C2C3C45",
            "CC(C)Cc1ccc(cc1)[C@@H](C)C(=O)O",
            "CCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC",
        ] {
            let sa = scorer.score(smiles).sa_score.unwrap();
            assert!((1.0..=10.0).contains(&sa), "{smiles}: {sa}");
        }
    }

    #[test]
    fn test_invalid_smiles_gives_empty_profile() {
        let profile = AdmetScorer::new().score("not a smiles");
        assert_eq!(profile, AdmetProfile::empty());
    }

    #[test]
    fn test_herg_and_cyp_flags() {
        let mut d = AdmetScorer::new().descriptors("CCO").unwrap();
        let profile = AdmetProfile::from_descriptors(&d);
        assert_eq!(profile.herg_risk, Some(false));
        assert_eq!(profile.herg_ic50, Some(HERG_IC50_CLEAR));
        assert_eq!(profile.cyp_inhibition, Some(false));

        d.log_p = 4.5;
        d.mol_weight = 520.0;
        d.aromatic_rings = 4;
        d.heteroatoms = 6;
        let flagged = AdmetProfile::from_descriptors(&d);
        assert_eq!(flagged.herg_risk, Some(true));
        assert_eq!(flagged.herg_ic50, Some(HERG_IC50_FLAGGED));
        assert_eq!(flagged.cyp_inhibition, Some(true));

        // boundaries are strict
        d.log_p = 4.0;
        d.heteroatoms = 5;
        let edge = AdmetProfile::from_descriptors(&d);
        assert_eq!(edge.herg_risk, Some(false));
        assert_eq!(edge.cyp_inhibition, Some(false));
    }

    #[test]
    fn test_batch_preserves_order() {
        let scorer = AdmetScorer::new();
        let out = scorer.score_batch(["CCO", "bad(", "c1ccccc1"]);
        assert_eq!(out.len(), 3);
        assert!(out[0].log_s.is_some());
        assert!(out[1].log_s.is_none());
        assert!(out[2].log_s.is_some());
        assert_ne!(out[0].log_s, out[2].log_s);
    }
}
