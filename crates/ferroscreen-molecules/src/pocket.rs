//! Search-grid derivation: receptor bounding box, fpocket pocket detection,
//! pocket-atom files and explicit configuration.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ferroscreen_common::{EngineCommand, PocketMode, ProcessSandbox, Result, ScreenError};

use crate::pdb::{self, ReceptorTarget};

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?[0-9]*\.?[0-9]+").expect("number pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridOrigin {
    BoundingBox,
    PocketDetector,
    PocketAtoms,
    Explicit,
}

/// Docking search box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchGrid {
    pub center: [f64; 3],
    pub size: [f64; 3],
    pub origin: GridOrigin,
}

impl SearchGrid {
    /// Builds a grid, rejecting non-finite values and non-positive sizes.
    pub fn new(center: [f64; 3], size: [f64; 3], origin: GridOrigin) -> Result<Self> {
        if center.iter().chain(size.iter()).any(|v| !v.is_finite()) {
            return Err(ScreenError::InvalidGeometry("non-finite grid value".to_string()));
        }
        if size.iter().any(|s| *s <= 0.0) {
            return Err(ScreenError::InvalidGeometry(format!(
                "grid size must be positive on every axis, got {size:?}"
            )));
        }
        Ok(Self { center, size, origin })
    }

    /// A user-supplied grid; every size component must be positive.
    pub fn explicit(center: [f64; 3], size: [f64; 3]) -> Result<Self> {
        Self::new(center, size, GridOrigin::Explicit)
    }

    /// Whether every point lies inside the box.
    pub fn encloses(&self, coords: &[[f64; 3]]) -> bool {
        coords.iter().all(|p| {
            (0..3).all(|k| (p[k] - self.center[k]).abs() <= self.size[k] / 2.0 + 1e-9)
        })
    }
}

/// Box centred on the per-axis midpoint of the coordinates, sized to the
/// extent plus `margin` on each axis.
pub fn resolve_bounding_box(coords: &[[f64; 3]], margin: f64) -> Result<SearchGrid> {
    let Some(first) = coords.first() else {
        return Err(ScreenError::InvalidGeometry("no atoms to derive a grid from".to_string()));
    };
    let mut min = *first;
    let mut max = *first;
    for p in coords {
        for k in 0..3 {
            min[k] = min[k].min(p[k]);
            max[k] = max[k].max(p[k]);
        }
    }
    let center = [0, 1, 2].map(|k| (min[k] + max[k]) / 2.0);
    let size = [0, 1, 2].map(|k| (max[k] - min[k]) + margin);
    SearchGrid::new(center, size, GridOrigin::BoundingBox)
}

/// Box from a pocket-atom PDB (`*_atm.pdb`), using only those atoms.
pub fn resolve_pocket_atoms(path: &Path, margin: f64) -> Result<SearchGrid> {
    let text = std::fs::read_to_string(path)?;
    let coords: Vec<[f64; 3]> = pdb::parse_pdb(&text).iter().map(pdb::PdbAtom::coords).collect();
    let mut grid = resolve_bounding_box(&coords, margin)?;
    grid.origin = GridOrigin::PocketAtoms;
    Ok(grid)
}

/// Finds the first `*_atm.pdb` under `<pocket_dir>/pockets`, in name order.
pub fn find_pocket_atoms_file(pocket_dir: &Path) -> Option<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(pocket_dir.join("pockets"))
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with("_atm.pdb"))
        })
        .collect();
    files.sort();
    files.into_iter().next()
}

/// Centre and radius read from an fpocket info file.
#[derive(Debug, Clone, PartialEq)]
pub struct PocketInfo {
    pub center: [f64; 3],
    pub radius: f64,
}

impl PocketInfo {
    /// Cube of edge `2 * radius + padding`.
    pub fn to_grid(&self, padding: f64) -> Result<SearchGrid> {
        let edge = 2.0 * self.radius + padding;
        SearchGrid::new(self.center, [edge; 3], GridOrigin::PocketDetector)
    }
}

/// Reads the centre from the first line mentioning `center` (first three
/// numbers) and the radius from the first line mentioning `radius`.
pub fn parse_pocket_info(text: &str) -> Option<PocketInfo> {
    let mut center = None;
    let mut radius = None;
    for line in text.lines() {
        let lower = line.to_lowercase();
        if center.is_none() && lower.contains("center") {
            let values: Vec<f64> = NUMBER
                .find_iter(line)
                .filter_map(|m| m.as_str().parse().ok())
                .take(3)
                .collect();
            if let [x, y, z] = values[..] {
                center = Some([x, y, z]);
            }
        }
        if radius.is_none() && lower.contains("radius") {
            radius = NUMBER.find(line).and_then(|m| m.as_str().parse::<f64>().ok());
        }
    }
    Some(PocketInfo {
        center: center?,
        radius: radius.filter(|r| *r > 0.0)?,
    })
}

/// Wrapper for fpocket execution.
pub struct FPocketRunner {
    command: EngineCommand,
    sandbox: ProcessSandbox,
}

impl FPocketRunner {
    pub fn new(command: EngineCommand, sandbox: ProcessSandbox) -> Self {
        Self { command, sandbox }
    }

    /// Runs `fpocket -f` on a copy of the receptor inside a scratch directory
    /// and reads the top-ranked pocket.
    pub async fn run(&self, pdb_path: &Path) -> Result<PocketInfo> {
        info!("Running fpocket on {:?}", pdb_path);
        let scratch = self.sandbox.scoped_dir("fpocket")?;
        let file_name = pdb_path
            .file_name()
            .ok_or_else(|| ScreenError::invocation("fpocket", "receptor path has no file name"))?;
        let local = scratch.path().join(file_name);
        std::fs::copy(pdb_path, &local)?;

        self.sandbox
            .run("fpocket", &self.command, [std::ffi::OsStr::new("-f"), file_name], scratch.path())
            .await?;

        let stem = local
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let out_dir = scratch.path().join(format!("{stem}_out"));
        let candidates = [
            out_dir.join("pockets").join("pocket0").join("pocket0_info.txt"),
            out_dir.join("pockets").join("info.txt"),
        ];
        let info_path = candidates
            .iter()
            .find(|p| p.is_file())
            .ok_or_else(|| ScreenError::invocation("fpocket", "no pocket info file written"))?;
        let text = std::fs::read_to_string(info_path)?;
        let pocket = parse_pocket_info(&text)
            .ok_or_else(|| ScreenError::invocation("fpocket", "pocket info has no usable center/radius"))?;
        debug!("fpocket pocket center {:?} radius {}", pocket.center, pocket.radius);
        Ok(pocket)
    }
}

/// How grids are derived when none is configured; fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedPocketMode {
    BoundingBox,
    FPocket,
}

pub struct PocketGridResolver {
    mode: ResolvedPocketMode,
    runner: FPocketRunner,
    bbox_margin: f64,
    pocket_margin: f64,
}

impl PocketGridResolver {
    /// Resolves `Auto`/`FPocket` against the availability of the fpocket binary.
    pub fn new(
        requested: PocketMode,
        fpocket: EngineCommand,
        sandbox: ProcessSandbox,
        bbox_margin: f64,
        pocket_margin: f64,
    ) -> Self {
        let available = ProcessSandbox::is_available(&fpocket);
        let mode = match (requested, available) {
            (PocketMode::BoundingBox, _) => ResolvedPocketMode::BoundingBox,
            (PocketMode::Auto, true) | (PocketMode::FPocket, true) => ResolvedPocketMode::FPocket,
            (PocketMode::Auto, false) => ResolvedPocketMode::BoundingBox,
            (PocketMode::FPocket, false) => {
                warn!(
                    "pocket mode 'fpocket' requested but {} was not found; using bounding box",
                    fpocket.program
                );
                ResolvedPocketMode::BoundingBox
            }
        };
        info!("Pocket grid mode: {:?}", mode);
        Self {
            mode,
            runner: FPocketRunner::new(fpocket, sandbox),
            bbox_margin,
            pocket_margin,
        }
    }

    pub fn mode(&self) -> ResolvedPocketMode {
        self.mode
    }

    /// Grid for the whole receptor, via fpocket when available. Every
    /// detector failure falls back to the bounding box.
    pub async fn resolve(&self, receptor: &ReceptorTarget) -> Result<SearchGrid> {
        let coords = receptor.coords();
        if coords.is_empty() {
            return Err(ScreenError::InvalidGeometry(format!("receptor {} has no atoms", receptor.id)));
        }
        if self.mode == ResolvedPocketMode::FPocket {
            match self.runner.run(&receptor.path).await.and_then(|p| p.to_grid(self.pocket_margin)) {
                Ok(grid) => return Ok(grid),
                Err(e) => warn!("fpocket failed for {} ({}); using bounding box", receptor.id, e),
            }
        }
        resolve_bounding_box(&coords, self.bbox_margin)
    }

    /// Grid precedence for a run: explicit, then a pocket-atoms file next to
    /// the receptor, then [`Self::resolve`].
    pub async fn resolve_for_run(
        &self,
        receptor: &ReceptorTarget,
        explicit: Option<([f64; 3], [f64; 3])>,
    ) -> Result<SearchGrid> {
        if let Some((center, size)) = explicit {
            return SearchGrid::explicit(center, size);
        }
        if let Some(atm) = find_pocket_atoms_file(&receptor.pocket_dir()) {
            info!("Using pocket atoms from {:?}", atm);
            return resolve_pocket_atoms(&atm, self.bbox_margin);
        }
        self.resolve(receptor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cube() -> Vec<[f64; 3]> {
        vec![[0.0, 0.0, 0.0], [10.0, 10.0, 10.0], [5.0, 2.0, 7.0]]
    }

    #[test]
    fn test_bounding_box_encloses_extent_plus_margin() {
        let grid = resolve_bounding_box(&cube(), 8.0).unwrap();
        assert_eq!(grid.center, [5.0, 5.0, 5.0]);
        assert_eq!(grid.size, [18.0, 18.0, 18.0]);
        assert_eq!(grid.origin, GridOrigin::BoundingBox);
        assert!(grid.encloses(&cube()));
    }

    #[test]
    fn test_empty_coordinates_are_invalid() {
        assert!(matches!(resolve_bounding_box(&[], 8.0), Err(ScreenError::InvalidGeometry(_))));
    }

    #[test]
    fn test_degenerate_box_needs_margin() {
        let point = [[1.0, 1.0, 1.0]];
        assert!(resolve_bounding_box(&point, 0.0).is_err());
        let grid = resolve_bounding_box(&point, 8.0).unwrap();
        assert_eq!(grid.size, [8.0, 8.0, 8.0]);
    }

    #[test]
    fn test_parse_pocket_info() {
        let text = "Pocket 1 :\n\tScore : 0.35\n\tCenter: 12.5, -3.25, 7\n\tRadius : 5.5\n";
        let info = parse_pocket_info(text).unwrap();
        assert_eq!(info.center, [12.5, -3.25, 7.0]);
        assert_eq!(info.radius, 5.5);
        let grid = info.to_grid(4.0).unwrap();
        assert_eq!(grid.size, [15.0, 15.0, 15.0]);
        assert_eq!(grid.origin, GridOrigin::PocketDetector);
    }

    #[test]
    fn test_parse_pocket_info_rejects_missing_or_zero_radius() {
        assert!(parse_pocket_info("center 1 2 3\n").is_none());
        assert!(parse_pocket_info("center 1 2 3\nradius 0\n").is_none());
        assert!(parse_pocket_info("radius 3\n").is_none());
    }

    #[test]
    fn test_missing_fpocket_downgrades_to_bounding_box() {
        let resolver = PocketGridResolver::new(
            PocketMode::FPocket,
            EngineCommand::new("no-such-fpocket-binary"),
            ProcessSandbox::default(),
            8.0,
            4.0,
        );
        assert_eq!(resolver.mode(), ResolvedPocketMode::BoundingBox);
    }

    fn receptor_in(dir: &Path) -> ReceptorTarget {
        let path = dir.join("G12C.pdb");
        let text = "\
ATOM      1  CA  ALA A   1       0.000   0.000   0.000  1.00  0.00           C
ATOM      2  CA  GLY A   2      10.000  10.000  10.000  1.00  0.00           C
";
        std::fs::write(&path, text).unwrap();
        ReceptorTarget::load(&path).unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fake_fpocket_grid() {
        let dir = tempfile::tempdir().unwrap();
        let receptor = receptor_in(dir.path());
        let script = dir.path().join("fpocket.sh");
        std::fs::write(
            &script,
            "stem=$(basename \"$2\" .pdb)\n\
             mkdir -p \"${stem}_out/pockets/pocket0\"\n\
             printf 'center: 1.0 2.0 3.0\\nradius: 3.0\\n' > \"${stem}_out/pockets/pocket0/pocket0_info.txt\"\n",
        )
        .unwrap();
        let cmd = EngineCommand::with_args("sh", &[script.to_str().unwrap()]);
        let runner = FPocketRunner::new(cmd.clone(), ProcessSandbox::new(Duration::from_secs(10), 0, None));
        let info = runner.run(&receptor.path).await.unwrap();
        assert_eq!(info.center, [1.0, 2.0, 3.0]);

        let resolver = PocketGridResolver::new(PocketMode::FPocket, cmd, ProcessSandbox::default(), 8.0, 4.0);
        assert_eq!(resolver.mode(), ResolvedPocketMode::FPocket);
        let grid = resolver.resolve(&receptor).await.unwrap();
        assert_eq!(grid.size, [10.0, 10.0, 10.0]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_fpocket_falls_back_to_bounding_box() {
        let dir = tempfile::tempdir().unwrap();
        let receptor = receptor_in(dir.path());
        let script = dir.path().join("fpocket.sh");
        std::fs::write(&script, "exit 1\n").unwrap();
        let cmd = EngineCommand::with_args("sh", &[script.to_str().unwrap()]);
        let resolver = PocketGridResolver::new(PocketMode::Auto, cmd, ProcessSandbox::default(), 8.0, 4.0);
        let grid = resolver.resolve(&receptor).await.unwrap();
        assert_eq!(grid.origin, GridOrigin::BoundingBox);
        assert_eq!(grid.size, [18.0, 18.0, 18.0]);
    }

    #[tokio::test]
    async fn test_run_grid_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let receptor = receptor_in(dir.path());
        let resolver = PocketGridResolver::new(
            PocketMode::BoundingBox,
            EngineCommand::new("no-such-fpocket-binary"),
            ProcessSandbox::default(),
            8.0,
            4.0,
        );

        let explicit = resolver
            .resolve_for_run(&receptor, Some(([1.0, 1.0, 1.0], [20.0, 20.0, 20.0])))
            .await
            .unwrap();
        assert_eq!(explicit.origin, GridOrigin::Explicit);

        let pockets = dir.path().join("G12C_out").join("pockets");
        std::fs::create_dir_all(&pockets).unwrap();
        std::fs::write(
            pockets.join("pocket1_atm.pdb"),
            "ATOM      1  CA  ALA A   1       2.000   2.000   2.000  1.00  0.00           C\n\
             ATOM      2  CA  ALA A   1       4.000   4.000   4.000  1.00  0.00           C\n",
        )
        .unwrap();
        let grid = resolver.resolve_for_run(&receptor, None).await.unwrap();
        assert_eq!(grid.origin, GridOrigin::PocketAtoms);
        assert_eq!(grid.center, [3.0, 3.0, 3.0]);
        assert_eq!(grid.size, [10.0, 10.0, 10.0]);
    }
}
