//! Secondary track: the DADA2 R library, driven through an embedded per-stage
//! R script so both tracks share the stage/log/report machinery.
use super::arg;
use crate::config::RunConfig;
use crate::layout::{OutputLayout, DADA2_TRACK};
use crate::manifest::Manifest;
use crate::stage::{StageGate, StageSpec};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const DRIVER_FILE: &str = "dada2_pipeline.R";

/// Materialize the embedded R driver into the track directory, returning its
/// path. Overwritten deterministically on every run.
pub fn install_driver(layout: &OutputLayout) -> Result<PathBuf> {
    let path = layout.track_dir(DADA2_TRACK).join(DRIVER_FILE);
    fs::write(&path, crate::templates::DADA2_PIPELINE_R)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

/// Build the track's fixed stage sequence. The taxonomy and combined-object
/// stages are gated, not required: their absence is a documented degraded
/// mode, never a failure.
pub fn build_stages(
    config: &RunConfig,
    manifest: &Manifest,
    layout: &OutputLayout,
    driver: &Path,
) -> Vec<StageSpec> {
    let dir = layout.track_dir(DADA2_TRACK);
    let threads = config.threads.to_string();

    let trimmed_manifest = dir.join("trimmed_manifest.csv");
    let filtered_manifest = dir.join("filtered_manifest.csv");
    let err_f = dir.join("err_f.rds");
    let err_r = dir.join("err_r.rds");
    let dada_f = dir.join("dada_f.rds");
    let dada_r = dir.join("dada_r.rds");
    let merged = dir.join("merged.rds");
    let seqtab = dir.join("seqtab.rds");
    let seqtab_nochim = dir.join("seqtab_nochim.rds");
    let feature_table = dir.join("feature_table.tsv");
    let rep_seqs = dir.join("rep_seqs.fasta");
    let taxonomy = dir.join("taxonomy.tsv");

    let mut trim = StageSpec::new(
        "trim-primers",
        "Rscript",
        driver_args(
            driver,
            "trim",
            &[
                ("--manifest", arg(&config.manifest)),
                ("--primer-f", config.primer_f.clone()),
                ("--primer-r", config.primer_r.clone()),
                ("--threads", threads.clone()),
                ("--out-dir", arg(&dir.join("trimmed"))),
                ("--out-manifest", arg(&trimmed_manifest)),
            ],
        ),
    )
    .input(&config.manifest)
    .output(&trimmed_manifest);
    // The raw read files named by the manifest are this stage's real inputs;
    // declaring them surfaces a bad path before cutadapt ever starts.
    for row in &manifest.rows {
        trim = trim.input(&row.path);
    }

    let mut stages = vec![
        trim,
        StageSpec::new(
            "quality-filter",
            "Rscript",
            driver_args(
                driver,
                "filter",
                &[
                    ("--manifest", arg(&trimmed_manifest)),
                    ("--max-ee-f", config.dada2.max_ee_f.to_string()),
                    ("--max-ee-r", config.dada2.max_ee_r.to_string()),
                    ("--trunc-q", config.dada2.trunc_q.to_string()),
                    ("--min-len", config.dada2.min_len.to_string()),
                    ("--trunc-len-f", config.trunc_len_f.to_string()),
                    ("--trunc-len-r", config.trunc_len_r.to_string()),
                    ("--threads", threads.clone()),
                    ("--out-dir", arg(&dir.join("filtered"))),
                    ("--out-manifest", arg(&filtered_manifest)),
                ],
            ),
        )
        .input(&trimmed_manifest)
        .output(&filtered_manifest),
        StageSpec::new(
            "learn-errors",
            "Rscript",
            driver_args(
                driver,
                "learn-errors",
                &[
                    ("--manifest", arg(&filtered_manifest)),
                    ("--threads", threads.clone()),
                    ("--out-f", arg(&err_f)),
                    ("--out-r", arg(&err_r)),
                ],
            ),
        )
        .input(&filtered_manifest)
        .output(&err_f)
        .output(&err_r),
        StageSpec::new(
            "denoise",
            "Rscript",
            driver_args(
                driver,
                "denoise",
                &[
                    ("--manifest", arg(&filtered_manifest)),
                    ("--err-f", arg(&err_f)),
                    ("--err-r", arg(&err_r)),
                    ("--pool", config.dada2.pool.as_driver_arg().to_string()),
                    ("--threads", threads.clone()),
                    ("--out-f", arg(&dada_f)),
                    ("--out-r", arg(&dada_r)),
                ],
            ),
        )
        .input(&err_f)
        .input(&err_r)
        .output(&dada_f)
        .output(&dada_r),
        StageSpec::new(
            "merge-pairs",
            "Rscript",
            driver_args(
                driver,
                "merge",
                &[
                    ("--manifest", arg(&filtered_manifest)),
                    ("--dada-f", arg(&dada_f)),
                    ("--dada-r", arg(&dada_r)),
                    ("--out", arg(&merged)),
                ],
            ),
        )
        .input(&dada_f)
        .input(&dada_r)
        .output(&merged),
        StageSpec::new(
            "sequence-table",
            "Rscript",
            driver_args(driver, "seqtab", &[("--merged", arg(&merged)), ("--out", arg(&seqtab))]),
        )
        .input(&merged)
        .output(&seqtab),
        StageSpec::new(
            "remove-chimeras",
            "Rscript",
            driver_args(
                driver,
                "chimera",
                &[
                    ("--seqtab", arg(&seqtab)),
                    ("--threads", threads.clone()),
                    ("--out", arg(&seqtab_nochim)),
                ],
            ),
        )
        .input(&seqtab)
        .output(&seqtab_nochim),
        StageSpec::new(
            "export",
            "Rscript",
            driver_args(
                driver,
                "export",
                &[
                    ("--seqtab", arg(&seqtab_nochim)),
                    ("--out-table", arg(&feature_table)),
                    ("--out-seqs", arg(&rep_seqs)),
                ],
            ),
        )
        .input(&seqtab_nochim)
        .output(&feature_table)
        .output(&rep_seqs),
    ];

    stages.push(taxonomy_stage(config, driver, &seqtab_nochim, &taxonomy, &threads));

    let mut combine_flags = vec![
        ("--seqtab", arg(&seqtab_nochim)),
        ("--metadata", arg(&config.metadata)),
        ("--out", arg(&dir.join("phyloseq.rds"))),
    ];
    // Taxonomy joins the combined object only when the track produces one.
    if config.dada2.tax_train_set.is_some() {
        combine_flags.insert(2, ("--taxonomy", arg(&taxonomy)));
    }
    stages.push(
        StageSpec::new("combine", "Rscript", driver_args(driver, "combine", &combine_flags))
            .gate(StageGate::IfPresent(vec![config.metadata.clone()]))
            .input(&seqtab_nochim)
            .output(&dir.join("phyloseq.rds")),
    );

    stages.push(
        StageSpec::new("session-info", "Rscript", driver_args(driver, "session-info", &[]))
            .stdout_to(&dir.join("session_info.txt")),
    );

    stages
}

fn taxonomy_stage(
    config: &RunConfig,
    driver: &Path,
    seqtab_nochim: &Path,
    taxonomy: &Path,
    threads: &str,
) -> StageSpec {
    let Some(train_set) = &config.dada2.tax_train_set else {
        return StageSpec::new("taxonomy", "Rscript", Vec::new())
            .gate(StageGate::Off("no reference taxonomy configured".to_string()));
    };

    let mut flags = vec![
        ("--seqtab", arg(seqtab_nochim)),
        ("--train-set", arg(train_set)),
        ("--threads", threads.to_string()),
        ("--out", arg(taxonomy)),
    ];
    // Species assignment is additive; a configured-but-missing species file
    // degrades to genus-level output instead of failing the stage.
    if let Some(species) = config.dada2.tax_species.as_ref().filter(|path| path.is_file()) {
        flags.insert(2, ("--species", arg(species)));
    }

    StageSpec::new("taxonomy", "Rscript", driver_args(driver, "taxonomy", &flags))
        .gate(StageGate::IfPresent(vec![train_set.clone()]))
        .input(seqtab_nochim)
        .input(train_set)
        .output(taxonomy)
}

fn driver_args(driver: &Path, command: &str, flags: &[(&str, String)]) -> Vec<String> {
    let mut args = vec![arg(driver), command.to_string()];
    for (flag, value) in flags {
        args.push((*flag).to_string());
        args.push(value.clone());
    }
    args
}
