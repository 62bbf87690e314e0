//! Shared fixtures for ferroscreen tests: receptor structures, ligand
//! libraries and fake engine scripts.
//!
//! Fake engines are POSIX `sh` scripts launched as `sh <script>`, so they only
//! run on unix hosts.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ferroscreen_common::EngineCommand;

/// A docked-pose atom line, parseable as PDB and PDBQT.
pub const POSE_ATOM: &str =
    "ATOM      1  C   UNL     1       5.000   5.000   5.000  0.00  0.00    +0.000 C ";

// ── Structures ────────────────────────────────────────────────────────────────

/// Three standard-residue atoms spanning a 10 Å cube from the origin.
pub fn cube_receptor_pdb() -> String {
    [
        "ATOM      1  CA  ALA A   1       0.000   0.000   0.000  1.00  0.00           C",
        "ATOM      2  CA  GLY A   2      10.000  10.000  10.000  1.00  0.00           C",
        "ATOM      3  CA  SER A   3       5.000   2.000   7.000  1.00  0.00           C",
        "END",
        "",
    ]
    .join("\n")
}

/// Writes [`cube_receptor_pdb`] to `dir/name`.
pub fn write_receptor(dir: &Path, name: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, cube_receptor_pdb()).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// Two-record SDF: ethanol with a SMILES data item, then an untitled acetic
/// acid without one.
pub fn sample_sdf() -> String {
    "ethanol
  ferroscreen

  3  2  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.5000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    2.0000    1.4000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
  2  3  1  0
M  END
> <SMILES>
CCO

$$$$

  ferroscreen

  4  3  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.5000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    2.2000    1.2000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
    2.2000   -1.2000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
  2  3  2  0
  2  4  1  0
M  END
$$$$
"
    .to_string()
}

/// Writes a `id,smiles` list.
pub fn write_smiles_list(dir: &Path, name: &str, rows: &[(&str, &str)]) -> Result<PathBuf> {
    let mut text = String::from("id,smiles\n");
    for (id, smiles) in rows {
        text.push_str(&format!("{id},{smiles}\n"));
    }
    let path = dir.join(name);
    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

// ── Fake engines ──────────────────────────────────────────────────────────────

/// Writes `body` to `dir/name` and returns the command that runs it.
pub fn write_script(dir: &Path, name: &str, body: &str) -> Result<EngineCommand> {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).with_context(|| format!("writing {}", path.display()))?;
    let script = path.to_str().context("script path is not UTF-8")?;
    Ok(EngineCommand::with_args("sh", &[script]))
}

/// Vina stand-in. Scores are looked up by ligand file stem; `None` makes that
/// ligand's invocation exit non-zero. Unlisted ligands score `default`.
pub fn fake_vina(dir: &Path, scores: &[(&str, Option<f64>)], default: f64) -> Result<EngineCommand> {
    let mut cases = String::new();
    for (id, score) in scores {
        match score {
            Some(s) => cases.push_str(&format!("  {id}) score={s} ;;\n")),
            None => cases.push_str(&format!("  {id}) echo 'vina: docking failed' >&2; exit 1 ;;\n")),
        }
    }
    let body = format!(
        r#"lig=""
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --ligand) lig="$2"; shift 2 ;;
    --out) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
id=$(basename "$lig" .pdbqt)
score={default}
case "$id" in
{cases}esac
cat > "$out" <<POSE
MODEL 1
REMARK VINA RESULT: $score 0.000 0.000
{POSE_ATOM}
ENDMDL
POSE
echo "mode |   affinity | dist from best mode"
echo "-----+------------+----------+----------"
echo "   1       $score      0.000      0.000"
"#
    );
    write_script(dir, "vina.sh", &body)
}

/// Open Babel stand-in: writes a stub PDBQT to the `-O` target.
pub fn fake_obabel(dir: &Path) -> Result<EngineCommand> {
    fake_obabel_failing(dir, &[])
}

/// Like [`fake_obabel`], but exits non-zero when the `-O` target is
/// `<id>.pdbqt` for one of `fail_ids`.
pub fn fake_obabel_failing(dir: &Path, fail_ids: &[&str]) -> Result<EngineCommand> {
    let mut cases = String::new();
    for id in fail_ids {
        cases.push_str(&format!("  {id}.pdbqt) echo 'obabel: bad input' >&2; exit 1 ;;\n"));
    }
    let body = format!(
        r#"out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-O" ]; then out="$2"; fi
  shift
done
[ -n "$out" ] || exit 2
case "$(basename "$out")" in
{cases}esac
echo "REMARK prepared" > "$out"
"#
    );
    write_script(dir, "obabel.sh", &body)
}

/// Energy-engine stand-in. `energy` reports a fixed value per structure file
/// name (`complex.pdb`, `receptor.pdb`, `ligand.pdb`); `parameterize` appends
/// the SMILES to `dir/parameterize.log`.
pub fn fake_gbsa(dir: &Path, complex: f64, receptor: f64, ligand: f64) -> Result<EngineCommand> {
    let log = dir.join("parameterize.log");
    let log = log.to_str().context("log path is not UTF-8")?;
    let body = format!(
        r#"cmd="$1"; shift
pdb=""; out=""; smiles=""
while [ $# -gt 0 ]; do
  case "$1" in
    --pdb) pdb="$2"; shift 2 ;;
    --out) out="$2"; shift 2 ;;
    --smiles) smiles="$2"; shift 2 ;;
    *) shift ;;
  esac
done
case "$cmd" in
  parameterize)
    echo "$smiles" >> "{log}"
    echo "<ForceField/>" > "$out" ;;
  energy)
    case "$(basename "$pdb")" in
      complex.pdb) echo "ENERGY {complex} kcal/mol" ;;
      receptor.pdb) echo "ENERGY {receptor} kcal/mol" ;;
      ligand.pdb) echo "ENERGY {ligand} kcal/mol" ;;
      *) exit 3 ;;
    esac ;;
  *) exit 2 ;;
esac
"#
    );
    write_script(dir, "gbsa.sh", &body)
}

/// fpocket stand-in reporting one pocket at `center` with `radius`.
pub fn fake_fpocket(dir: &Path, center: [f64; 3], radius: f64) -> Result<EngineCommand> {
    let body = format!(
        r#"stem=$(basename "$2" .pdb)
mkdir -p "${{stem}}_out/pockets/pocket0"
cat > "${{stem}}_out/pockets/pocket0/pocket0_info.txt" <<INFO
Pocket 1 :
	Center: {} {} {}
	Radius : {}
INFO
"#,
        center[0], center[1], center[2], radius
    );
    write_script(dir, "fpocket.sh", &body)
}

/// Parameterized SMILES recorded by [`fake_gbsa`], in call order.
pub fn parameterize_calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("parameterize.log"))
        .map(|text| text.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
