//! `censuskv transform`: convert one census CSV extract into a JSON array file.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use censuskv_core::config::TransformConfig;
use censuskv_core::transform::{CsvTransformer, TransformSummary};

use crate::exit::CliError;

/// `<out_dir>/<csv file name>.json`
pub fn output_path(csv: &Path, out_dir: &Path) -> Result<PathBuf> {
    let name = csv
        .file_name()
        .ok_or_else(|| CliError::MissingInput(format!("{} has no file name", csv.display())))?;
    let mut name = name.to_os_string();
    name.push(".json");
    Ok(out_dir.join(name))
}

/// Transform `csv` into `out_dir`, returning the written path.
///
/// Output goes to a `.partial` file first and is only renamed into place once
/// the array is closed; a failed run leaves no output behind.
pub fn run(
    csv: &Path,
    out_dir: &Path,
    config: TransformConfig,
) -> Result<(PathBuf, TransformSummary)> {
    if !csv.is_file() {
        return Err(
            CliError::MissingInput(format!("CSV file {} does not exist", csv.display())).into(),
        );
    }
    let transformer = CsvTransformer::new(config)?;

    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;
    let out = output_path(csv, out_dir)?;
    let mut partial = out.clone().into_os_string();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let file = File::create(&partial)
        .with_context(|| format!("creating {}", partial.display()))?;

    match transformer.transform_file(csv, BufWriter::new(file)) {
        Ok(summary) => {
            fs::rename(&partial, &out)
                .with_context(|| format!("renaming {} to {}", partial.display(), out.display()))?;
            info!(output = %out.display(), rows = summary.rows, "output written");
            Ok((out, summary))
        }
        Err(e) => {
            error!(file = %csv.display(), "transform aborted: {e}");
            let _ = fs::remove_file(&partial);
            Err(e).with_context(|| format!("transforming {}", csv.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use censuskv_core::record::load_records;

    fn write_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn output_name_appends_json() {
        let out =
            output_path(Path::new("in/2016Census_G02_AUS_STE.csv"), Path::new("out")).unwrap();
        assert_eq!(out, Path::new("out/2016Census_G02_AUS_STE.csv.json"));
    }

    #[test]
    fn writes_records_and_creates_out_dir() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(
            dir.path(),
            "2016Census_G02_AUS_STE.csv",
            "STE_CODE_2016,Median_age,Tot_P\n1,38,..\n2,37,7\n",
        );
        let out_dir = dir.path().join("out_json");

        let (out, summary) = run(&csv, &out_dir, TransformConfig::default()).unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.partition_id, "G02");

        let records = load_records(&out).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].geo_level.as_deref(), Some("STE"));
        assert_eq!(records[0].kv_pairs["Tot_P"], -1.0);
    }

    #[test]
    fn failure_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(
            dir.path(),
            "2016Census_G02_AUS_STE.csv",
            "STE_CODE_2016,Tot_P\n1,5\n2,n/a\n",
        );
        let out_dir = dir.path().join("out");

        assert!(run(&csv, &out_dir, TransformConfig::default()).is_err());
        let leftovers: Vec<_> = fs::read_dir(&out_dir).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn missing_csv_is_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(&dir.path().join("nope.csv"), dir.path(), TransformConfig::default())
            .unwrap_err();
        assert_eq!(crate::exit::code_for(&err), crate::exit::MISSING_INPUT);
    }
}
