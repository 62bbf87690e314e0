//! Ligand libraries (SDF, SMILES lists, knowledge graph) and docking-ready
//! preparation of ligands and receptors.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use ferroscreen_common::{EngineCommand, GraphQuery, ProcessSandbox, Result, ScreenError};

use crate::chem::{parse_molblock, parse_smiles, write_smiles};
use crate::file_safe;
use crate::pdb::ReceptorTarget;

/// Compounds with a SMILES that target a gene (name prefix match).
pub const COMPOUND_QUERY: &str = "MATCH (c:Compound)-[:TARGETS]->(g:Gene) \
WHERE g.name STARTS WITH $gene_name AND c.name IS NOT NULL AND c.smiles IS NOT NULL \
RETURN c.name AS ligand_id, c.smiles AS smiles";

/// A candidate small molecule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LigandRecord {
    pub id: String,
    pub smiles: String,
    /// V2000 mol block with 3D coordinates, when the source provided one.
    pub conformer: Option<String>,
}

impl LigandRecord {
    pub fn new(id: &str, smiles: &str) -> Self {
        Self {
            id: id.to_string(),
            smiles: smiles.to_string(),
            conformer: None,
        }
    }
}

/// An ordered ligand library with unique ids.
#[derive(Debug, Clone, Default)]
pub struct LigandLibrary {
    ligands: Vec<LigandRecord>,
}

impl LigandLibrary {
    /// Builds a library, suffixing repeated ids with `_<n>`.
    pub fn from_records(records: Vec<LigandRecord>) -> Self {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut ligands = Vec::with_capacity(records.len());
        for mut record in records {
            if seen.contains_key(&record.id) {
                let base = record.id.clone();
                let mut n = seen[&base];
                let mut candidate = format!("{base}_{n}");
                while seen.contains_key(&candidate) {
                    n += 1;
                    candidate = format!("{base}_{n}");
                }
                seen.insert(base, n + 1);
                debug!("Duplicate ligand id {} renamed to {}", record.id, candidate);
                record.id = candidate;
            }
            seen.insert(record.id.clone(), 1);
            ligands.push(record);
        }
        Self { ligands }
    }

    pub fn len(&self) -> usize {
        self.ligands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ligands.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LigandRecord> {
        self.ligands.iter()
    }

    pub fn ligands(&self) -> &[LigandRecord] {
        &self.ligands
    }

    pub fn get(&self, id: &str) -> Option<&LigandRecord> {
        self.ligands.iter().find(|l| l.id == id)
    }

    /// Parses an SDF. Records that fail to parse are logged and skipped.
    pub fn from_sdf_str(text: &str) -> Self {
        let mut records = Vec::new();
        for (index, chunk) in split_sdf(text).into_iter().enumerate() {
            match parse_sdf_record(chunk, index) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping SDF record {}: {}", index, e),
            }
        }
        Self::from_records(records)
    }

    /// Reads a V2000 SDF library; unparsable records are skipped.
    pub fn from_sdf(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let library = Self::from_sdf_str(&text);
        info!("Loaded {} ligands from {:?}", library.len(), path);
        Ok(library)
    }

    /// Parses `id,smiles` or bare `smiles` lines. Blank lines, `#` comments
    /// and an `id,smiles` header are ignored; invalid SMILES are skipped.
    pub fn from_smiles_str(text: &str) -> Self {
        let mut records = Vec::new();
        let rows = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'));
        for (index, line) in rows.enumerate() {
            let (id, smiles) = match line.split_once(',') {
                Some((id, smiles)) => (id.trim().to_string(), smiles.trim()),
                None => (String::new(), line),
            };
            if smiles.eq_ignore_ascii_case("smiles") {
                continue;
            }
            let id = if id.is_empty() { format!("LIG_{index}") } else { id };
            if let Err(e) = parse_smiles(smiles) {
                warn!("Skipping ligand {}: {}", id, ScreenError::parse(&id, e.to_string()));
                continue;
            }
            records.push(LigandRecord::new(&id, smiles));
        }
        Self::from_records(records)
    }

    /// Reads an `id,smiles` list (or bare SMILES per line).
    pub fn from_smiles_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let library = Self::from_smiles_str(&text);
        info!("Loaded {} ligands from {:?}", library.len(), path);
        Ok(library)
    }

    /// Compounds targeting `gene` from the knowledge graph.
    pub async fn from_graph(graph: &dyn GraphQuery, gene: &str) -> Result<Self> {
        let mut params = Map::new();
        params.insert("gene_name".to_string(), Value::String(gene.to_string()));
        let rows = graph.run(COMPOUND_QUERY, &params).await?;
        let mut records = Vec::new();
        for row in rows {
            let (Some(id), Some(smiles)) = (
                row.get("ligand_id").and_then(Value::as_str),
                row.get("smiles").and_then(Value::as_str),
            ) else {
                debug!("Skipping graph row without ligand_id/smiles");
                continue;
            };
            if let Err(e) = parse_smiles(smiles) {
                warn!("Skipping ligand {}: {}", id, e);
                continue;
            }
            records.push(LigandRecord::new(id, smiles));
        }
        let library = Self::from_records(records);
        info!("Loaded {} ligands for {} from the knowledge graph", library.len(), gene);
        Ok(library)
    }
}

impl<'a> IntoIterator for &'a LigandLibrary {
    type Item = &'a LigandRecord;
    type IntoIter = std::slice::Iter<'a, LigandRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.ligands.iter()
    }
}

/// Splits SDF text on `$$$$` lines, dropping empty chunks.
fn split_sdf(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_end() == "$$$$" {
            chunks.push(&text[start..offset]);
            start = offset + line.len();
        }
        offset += line.len();
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks.into_iter().filter(|c| !c.trim().is_empty()).collect()
}

fn parse_sdf_record(chunk: &str, index: usize) -> Result<LigandRecord> {
    let fallback_id = format!("LIG_{index}");
    let end = chunk
        .find("M  END")
        .ok_or_else(|| ScreenError::parse(&fallback_id, "missing M  END"))?;
    let block_end = chunk[end..].find('\n').map_or(chunk.len(), |i| end + i + 1);
    let molblock = &chunk[..block_end];

    let parsed = parse_molblock(molblock).map_err(|e| ScreenError::parse(&fallback_id, e.to_string()))?;
    let id = if parsed.title.is_empty() { fallback_id } else { parsed.title.clone() };

    let props = parse_data_items(&chunk[block_end..]);
    let smiles = ["SMILES", "smiles", "canonical_smiles"]
        .iter()
        .find_map(|k| props.get(*k))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| write_smiles(&parsed.graph));

    Ok(LigandRecord {
        id,
        smiles,
        conformer: Some(molblock.to_string()),
    })
}

/// `> <NAME>` data items following the mol block.
fn parse_data_items(text: &str) -> HashMap<String, String> {
    let mut items = HashMap::new();
    let mut lines = text.lines().peekable();
    while let Some(line) = lines.next() {
        let Some(rest) = line.strip_prefix('>') else {
            continue;
        };
        let (Some(open), Some(close)) = (rest.find('<'), rest.find('>')) else {
            continue;
        };
        if close <= open {
            continue;
        }
        let name = rest[open + 1..close].to_string();
        let mut value = Vec::new();
        while let Some(next) = lines.peek() {
            if next.trim().is_empty() {
                lines.next();
                break;
            }
            value.push(next.to_string());
            lines.next();
        }
        items.insert(name, value.join("\n"));
    }
    items
}

/// Converts ligands and receptors to charged PDBQT, via Meeko or Open Babel.
pub struct LigandPreparer {
    meeko: EngineCommand,
    obabel: EngineCommand,
    meeko_available: bool,
    obabel_available: bool,
    sandbox: ProcessSandbox,
}

impl LigandPreparer {
    /// Probes both tools once.
    pub fn new(meeko: EngineCommand, obabel: EngineCommand, sandbox: ProcessSandbox) -> Self {
        let meeko_available = ProcessSandbox::is_available(&meeko);
        let obabel_available = ProcessSandbox::is_available(&obabel);
        if !meeko_available && !obabel_available {
            warn!("Neither Meeko nor Open Babel found; ligand preparation will fail");
        }
        Self {
            meeko,
            obabel,
            meeko_available,
            obabel_available,
            sandbox,
        }
    }

    /// True when Meeko or Open Babel was found.
    pub fn can_prepare(&self) -> bool {
        self.meeko_available || self.obabel_available
    }

    /// Writes `<work_dir>/<id>.pdbqt`. Meeko is tried first when the ligand
    /// has a conformer; Open Babel is the fallback.
    pub async fn prepare(&self, ligand: &LigandRecord, work_dir: &Path) -> Result<PathBuf> {
        let stem = file_safe(&ligand.id);
        let out = work_dir.join(format!("{stem}.pdbqt"));

        if self.meeko_available {
            if let Some(block) = &ligand.conformer {
                let sdf = work_dir.join(format!("{stem}.sdf"));
                std::fs::write(&sdf, format!("{}$$$$\n", ensure_newline(block)))?;
                let args = [
                    OsStr::new("-i"),
                    sdf.as_os_str(),
                    OsStr::new("-o"),
                    out.as_os_str(),
                ];
                match self.sandbox.run("meeko", &self.meeko, args, work_dir).await {
                    Ok(_) if out.is_file() => return Ok(out),
                    Ok(_) => warn!("Meeko wrote no PDBQT for {}", ligand.id),
                    Err(e) => warn!("Meeko failed for {}: {}", ligand.id, e),
                }
            }
        }

        if !self.obabel_available {
            return Err(ScreenError::invocation(
                "ligand-prep",
                format!("no usable preparation tool for {}", ligand.id),
            ));
        }

        let input = match &ligand.conformer {
            Some(block) => {
                let path = work_dir.join(format!("{stem}.mol"));
                std::fs::write(&path, ensure_newline(block))?;
                path
            }
            None => {
                let path = work_dir.join(format!("{stem}.smi"));
                std::fs::write(&path, format!("{} {}\n", ligand.smiles, stem))?;
                path
            }
        };
        let mut args = vec![
            input.into_os_string(),
            "-O".into(),
            out.clone().into_os_string(),
            "--partialcharge".into(),
            "gasteiger".into(),
        ];
        if ligand.conformer.is_none() {
            args.push("--gen3d".into());
        }
        self.sandbox.run("obabel", &self.obabel, args, work_dir).await?;
        if !out.is_file() {
            return Err(ScreenError::invocation("obabel", format!("no PDBQT written for {}", ligand.id)));
        }
        Ok(out)
    }

    /// Returns the receptor's sibling `.pdbqt`, generating it with Open Babel
    /// when absent.
    pub async fn prepare_receptor(&self, receptor: &ReceptorTarget) -> Result<PathBuf> {
        let pdbqt = receptor.pdbqt_path();
        if pdbqt.is_file() {
            debug!("Receptor PDBQT already present: {:?}", pdbqt);
            return Ok(pdbqt);
        }
        if !self.obabel_available {
            return Err(ScreenError::invocation(
                "obabel",
                format!("Open Babel unavailable; cannot prepare {:?}", pdbqt),
            ));
        }
        let cwd = receptor
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let args = [
            OsStr::new("-ipdb"),
            receptor.path.as_os_str(),
            OsStr::new("-opdbqt"),
            OsStr::new("-O"),
            pdbqt.as_os_str(),
            OsStr::new("--partialcharge"),
            OsStr::new("gasteiger"),
            OsStr::new("-xr"),
        ];
        info!("Preparing receptor PDBQT for {}", receptor.id);
        self.sandbox.run("obabel", &self.obabel, args, cwd).await?;
        if !pdbqt.is_file() {
            return Err(ScreenError::invocation("obabel", "receptor PDBQT was not written"));
        }
        Ok(pdbqt)
    }
}

fn ensure_newline(block: &str) -> String {
    if block.ends_with('\n') {
        block.to_string()
    } else {
        format!("{block}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferroscreen_common::StaticGraph;
    use ferroscreen_test_utils as fixtures;

    #[test]
    fn test_sdf_library() {
        let library = LigandLibrary::from_sdf_str(&fixtures::sample_sdf());
        let ids: Vec<&str> = library.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["ethanol", "LIG_1"]);
        // SMILES data item wins over the written form
        assert_eq!(library.ligands()[0].smiles, "CCO");
        // no data item: written from the mol block
        assert_eq!(library.ligands()[1].smiles, "CC(=O)O");
        assert!(library.ligands()[1].conformer.as_deref().unwrap().contains("M  END"));
    }

    #[test]
    fn test_sdf_bad_record_is_skipped() {
        let text = format!("broken\n\n\n  x  y\n$$$$\n{}", fixtures::sample_sdf());
        let library = LigandLibrary::from_sdf_str(&text);
        assert_eq!(library.len(), 2);
    }

    #[test]
    fn test_smiles_list() {
        let text = "id,smiles\n# comment\nasp,CC(=O)Oc1ccccc1C(=O)O\nc1ccccc1\nbad,C1CC\nasp,CCO\n";
        let library = LigandLibrary::from_smiles_str(text);
        let ids: Vec<&str> = library.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["asp", "LIG_2", "asp_1"]);
    }

    #[test]
    fn test_duplicate_ids_stay_unique() {
        let library = LigandLibrary::from_records(vec![
            LigandRecord::new("a", "C"),
            LigandRecord::new("a_1", "C"),
            LigandRecord::new("a", "C"),
            LigandRecord::new("a", "C"),
        ]);
        let ids: Vec<&str> = library.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "a_1", "a_2", "a_3"]);
    }

    #[tokio::test]
    async fn test_graph_library() {
        let graph = StaticGraph::new()
            .with_compound("KRAS", "sotorasib", "CC(=O)N")
            .with_compound("KRAS", "broken", "C1C")
            .with_compound("EGFR", "gefitinib", "CCO");
        let library = LigandLibrary::from_graph(&graph, "KRAS").await.unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(library.ligands()[0].id, "sotorasib");
    }

    #[tokio::test]
    async fn test_prepare_without_tools_fails() {
        let dir = tempfile::tempdir().unwrap();
        let preparer = LigandPreparer::new(
            EngineCommand::new("no-such-meeko"),
            EngineCommand::new("no-such-obabel"),
            ProcessSandbox::default(),
        );
        assert!(!preparer.can_prepare());
        let err = preparer.prepare(&LigandRecord::new("x", "CCO"), dir.path()).await.unwrap_err();
        assert!(err.is_per_ligand());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_prepare_with_fake_obabel() {
        let dir = tempfile::tempdir().unwrap();
        let obabel = fixtures::fake_obabel(dir.path()).unwrap();
        let preparer = LigandPreparer::new(EngineCommand::new("no-such-meeko"), obabel, ProcessSandbox::default());
        let out = preparer.prepare(&LigandRecord::new("lig/1", "CCO"), dir.path()).await.unwrap();
        assert_eq!(out.file_name(), Some(OsStr::new("lig_1.pdbqt")));
        assert!(out.is_file());

        let receptor_path = fixtures::write_receptor(dir.path(), "G12C.pdb").unwrap();
        let receptor = ReceptorTarget::load(&receptor_path).unwrap();
        let pdbqt = preparer.prepare_receptor(&receptor).await.unwrap();
        assert_eq!(pdbqt, dir.path().join("G12C.pdbqt"));
        assert!(pdbqt.is_file());
    }
}
