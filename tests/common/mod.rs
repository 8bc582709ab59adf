//! Shared helpers for integration tests driving the built binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub fn ampliflow_bin() -> &'static str {
    env!("CARGO_BIN_EXE_ampliflow")
}

/// Write a minimal valid config (with existing manifest/metadata) into `root`
/// and return the config path.
#[allow(dead_code)]
pub fn write_valid_config(root: &Path) -> PathBuf {
    let read = root.join("s1_R1.fastq.gz");
    fs::write(&read, b"@read\nACGT\n+\nIIII\n").expect("write read");
    let read_rev = root.join("s1_R2.fastq.gz");
    fs::write(&read_rev, b"@read\nACGT\n+\nIIII\n").expect("write read");
    fs::write(
        root.join("manifest.csv"),
        format!(
            "sample-id,absolute-filepath,direction\n\
             s1,{},forward\n\
             s1,{},reverse\n",
            read.display(),
            read_rev.display()
        ),
    )
    .expect("write manifest");
    fs::write(root.join("metadata.tsv"), "sample-id\tsite\ns1\tbaja\n").expect("write metadata");

    let config = serde_json::json!({
        "manifest": "manifest.csv",
        "metadata": "metadata.tsv",
        "primer_f": "GTGYCAGCMGCCGCGGTAA",
        "primer_r": "GGACTACNVGGGTWTCTAAT",
        "trim_left_f": 0,
        "trim_left_r": 0,
        "trunc_len_f": 220,
        "trunc_len_r": 180,
        "sampling_depth": 100,
        "threads": 1,
        "classifier_qza": "classifier.qza",
        "dada2": {
            "max_ee_f": 2.0,
            "max_ee_r": 4.0,
            "trunc_q": 2,
            "min_len": 50,
            "pool": "independent"
        }
    });
    let path = root.join("config.json");
    fs::write(&path, serde_json::to_string_pretty(&config).expect("serialize config"))
        .expect("write config");
    path
}

pub fn run_ampliflow(args: &[&str]) -> std::process::Output {
    Command::new(ampliflow_bin())
        .args(args)
        .output()
        .expect("run ampliflow")
}
