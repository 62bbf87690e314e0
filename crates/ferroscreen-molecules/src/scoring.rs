//! Joins per-ligand docking, ADMET and binding-energy results into the rows
//! the evaluator consumes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use ferroscreen_ranker::EvaluationRecord;

use crate::admet::AdmetProfile;
use crate::docking::{DockingResult, DockingSource};
use crate::energy::{BindingEnergyResult, EnergyInput};
use crate::ligand::LigandLibrary;

/// Everything known about one docked ligand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenedCompound {
    pub ligand_id: String,
    pub smiles: String,
    pub docking: DockingResult,
    pub admet: AdmetProfile,
    pub energy: Option<BindingEnergyResult>,
}

impl ScreenedCompound {
    /// Docking score for ranking; failed invocations carry no score.
    pub fn docking_score(&self) -> Option<f64> {
        (self.docking.source != DockingSource::Failed).then_some(self.docking.affinity)
    }

    /// Binding free energy, when one was attached.
    pub fn delta_g(&self) -> Option<f64> {
        self.energy.as_ref().map(|e| e.delta_g)
    }

    /// Candidate row for the evaluator.
    pub fn to_record(&self) -> EvaluationRecord {
        EvaluationRecord::candidate(&self.ligand_id, self.docking_score(), self.delta_g(), self.admet.sa_score)
    }
}

/// Left-joins ADMET profiles onto docking results by ligand id, keeping
/// docking order. Ligands without a profile get an empty one.
pub fn merge(
    docked: Vec<DockingResult>,
    library: &LigandLibrary,
    admet: &HashMap<String, AdmetProfile>,
) -> Vec<ScreenedCompound> {
    docked
        .into_iter()
        .map(|docking| {
            let smiles = library.get(&docking.ligand_id).map(|l| l.smiles.clone()).unwrap_or_default();
            let admet = admet.get(&docking.ligand_id).cloned().unwrap_or_else(AdmetProfile::empty);
            ScreenedCompound {
                ligand_id: docking.ligand_id.clone(),
                smiles,
                docking,
                admet,
                energy: None,
            }
        })
        .collect()
}

/// Energy-estimation inputs, one per compound, in the same order.
pub fn energy_inputs(compounds: &[ScreenedCompound]) -> Vec<EnergyInput> {
    compounds
        .iter()
        .map(|c| EnergyInput {
            ligand_id: c.ligand_id.clone(),
            smiles: c.smiles.clone(),
            pose: c.docking.pose.clone(),
        })
        .collect()
}

/// Attaches energies by ligand id.
pub fn attach_energies(compounds: &mut [ScreenedCompound], energies: Vec<BindingEnergyResult>) {
    let mut by_id: HashMap<String, BindingEnergyResult> =
        energies.into_iter().map(|e| (e.ligand_id.clone(), e)).collect();
    for compound in compounds.iter_mut() {
        compound.energy = by_id.remove(&compound.ligand_id);
        if compound.energy.is_none() {
            debug!("No binding energy for {}", compound.ligand_id);
        }
    }
}

/// Evaluator rows for every compound, in input order.
pub fn to_evaluation_records(compounds: &[ScreenedCompound]) -> Vec<EvaluationRecord> {
    compounds.iter().map(ScreenedCompound::to_record).collect()
}
