//! Read-manifest parsing and pairing validation.
//!
//! The manifest is a comma-separated table with a header row naming
//! `sample-id`, a file path column (`absolute-filepath` or `filename`,
//! normalized against the manifest's directory), and `direction`. The
//! secondary track requires the forward and reverse sample-ID sets to match
//! exactly, and checks that before any external denoising starts.
use anyhow::{anyhow, bail, Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "forward" => Ok(Direction::Forward),
            "reverse" => Ok(Direction::Reverse),
            other => Err(anyhow!(
                "direction must be \"forward\" or \"reverse\" (got {other:?})"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRow {
    pub sample_id: String,
    pub path: PathBuf,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub rows: Vec<ManifestRow>,
}

impl Manifest {
    /// Sample IDs with rows in the given direction, sorted and deduplicated.
    pub fn sample_ids(&self, direction: Direction) -> Vec<String> {
        let ids: BTreeSet<&str> = self
            .rows
            .iter()
            .filter(|row| row.direction == direction)
            .map(|row| row.sample_id.as_str())
            .collect();
        ids.into_iter().map(str::to_string).collect()
    }

    /// Sorted sample IDs, requiring the forward and reverse sets to be equal.
    pub fn paired_sample_ids(&self) -> Result<Vec<String>> {
        let forward = self.sample_ids(Direction::Forward);
        let reverse = self.sample_ids(Direction::Reverse);
        if forward != reverse {
            let forward_only: Vec<&String> =
                forward.iter().filter(|id| !reverse.contains(id)).collect();
            let reverse_only: Vec<&String> =
                reverse.iter().filter(|id| !forward.contains(id)).collect();
            bail!(
                "manifest forward/reverse sample sets differ (forward-only: {forward_only:?}, \
                 reverse-only: {reverse_only:?})"
            );
        }
        if forward.is_empty() {
            bail!("manifest contains no paired samples");
        }
        Ok(forward)
    }
}

/// Parse the manifest at `path`. Lines starting with `#` are ignored.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("read manifest {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with('#'));

    let (_, header) = lines.next().ok_or_else(|| anyhow!("manifest is empty"))?;
    let columns = Columns::from_header(header)?;

    let mut rows = Vec::new();
    let mut seen = BTreeSet::new();
    for (index, line) in lines {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != columns.width {
            bail!(
                "manifest line {}: expected {} fields, found {}",
                index + 1,
                columns.width,
                fields.len()
            );
        }
        let sample_id = fields[columns.sample_id].to_string();
        validate_sample_id(&sample_id, index + 1)?;
        let direction = Direction::parse(fields[columns.direction])
            .with_context(|| format!("manifest line {}", index + 1))?;
        if !seen.insert((sample_id.clone(), direction == Direction::Forward)) {
            bail!(
                "manifest line {}: duplicate row for sample {sample_id:?} {:?}",
                index + 1,
                fields[columns.direction]
            );
        }
        let raw_path = Path::new(fields[columns.path]);
        let path = if raw_path.is_absolute() {
            raw_path.to_path_buf()
        } else {
            base.join(raw_path)
        };
        rows.push(ManifestRow {
            sample_id,
            path,
            direction,
        });
    }

    if rows.is_empty() {
        bail!("manifest has a header but no data rows");
    }
    Ok(Manifest { rows })
}

struct Columns {
    sample_id: usize,
    path: usize,
    direction: usize,
    width: usize,
}

impl Columns {
    fn from_header(header: &str) -> Result<Self> {
        let names: Vec<&str> = header.split(',').map(str::trim).collect();
        let find = |candidates: &[&str]| {
            names
                .iter()
                .position(|name| candidates.contains(name))
                .ok_or_else(|| anyhow!("manifest header is missing column {:?}", candidates[0]))
        };
        Ok(Columns {
            sample_id: find(&["sample-id"])?,
            path: find(&["absolute-filepath", "filename"])?,
            direction: find(&["direction"])?,
            width: names.len(),
        })
    }
}

fn validate_sample_id(id: &str, line: usize) -> Result<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(anyhow!("manifest line {line}: invalid sample id {id:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_manifest(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("manifest.csv");
        fs::write(&path, content).expect("write manifest");
        path
    }

    #[test]
    fn parses_paired_manifest_with_comments() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = write_manifest(
            &dir,
            "# raw reads\n\
             sample-id,absolute-filepath,direction\n\
             s2,/data/s2_R1.fastq.gz,forward\n\
             s2,/data/s2_R2.fastq.gz,reverse\n\
             s1,/data/s1_R1.fastq.gz,forward\n\
             s1,/data/s1_R2.fastq.gz,reverse\n",
        );

        let manifest = load_manifest(&path).expect("load manifest");
        assert_eq!(manifest.rows.len(), 4);
        assert_eq!(
            manifest.paired_sample_ids().expect("paired ids"),
            vec!["s1".to_string(), "s2".to_string()]
        );
    }

    #[test]
    fn filename_column_resolves_against_manifest_dir() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = write_manifest(
            &dir,
            "sample-id,filename,direction\n\
             s1,reads/s1_R1.fastq.gz,forward\n\
             s1,reads/s1_R2.fastq.gz,reverse\n",
        );

        let manifest = load_manifest(&path).expect("load manifest");
        assert_eq!(manifest.rows[0].path, dir.path().join("reads/s1_R1.fastq.gz"));
    }

    #[test]
    fn unpaired_sample_sets_fail_validation() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = write_manifest(
            &dir,
            "sample-id,absolute-filepath,direction\n\
             s1,/data/s1_R1.fastq.gz,forward\n\
             s1,/data/s1_R2.fastq.gz,reverse\n\
             s2,/data/s2_R1.fastq.gz,forward\n",
        );

        let manifest = load_manifest(&path).expect("load manifest");
        let err = manifest.paired_sample_ids().unwrap_err();
        assert!(err.to_string().contains("forward-only"));
        assert!(err.to_string().contains("s2"));
    }

    #[test]
    fn duplicate_direction_row_is_rejected() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = write_manifest(
            &dir,
            "sample-id,absolute-filepath,direction\n\
             s1,/data/a.fastq.gz,forward\n\
             s1,/data/b.fastq.gz,forward\n",
        );

        let err = load_manifest(&path).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn invalid_sample_id_is_rejected() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = write_manifest(
            &dir,
            "sample-id,absolute-filepath,direction\n\
             bad id,/data/a.fastq.gz,forward\n",
        );

        let err = load_manifest(&path).unwrap_err();
        assert!(err.to_string().contains("invalid sample id"));
    }

    #[test]
    fn missing_direction_column_is_rejected() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = write_manifest(&dir, "sample-id,absolute-filepath\ns1,/data/a,\n");
        assert!(load_manifest(&path).is_err());
    }

    #[test]
    fn unknown_direction_value_is_rejected() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = write_manifest(
            &dir,
            "sample-id,absolute-filepath,direction\n\
             s1,/data/a.fastq.gz,sideways\n",
        );
        assert!(load_manifest(&path).is_err());
    }
}
