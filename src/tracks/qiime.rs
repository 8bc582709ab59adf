//! Primary track: the QIIME 2 toolkit, driven one plugin action per stage.
use super::arg;
use crate::config::RunConfig;
use crate::layout::{OutputLayout, QIIME_TRACK};
use crate::stage::StageSpec;
use std::path::Path;

/// Build the track's fixed stage sequence. Every stage that accepts a thread
/// count receives the configured one.
pub fn build_stages(config: &RunConfig, layout: &OutputLayout) -> Vec<StageSpec> {
    let dir = layout.track_dir(QIIME_TRACK);
    let threads = config.threads.to_string();

    let demux = dir.join("demux.qza");
    let trimmed = dir.join("trimmed.qza");
    let table = dir.join("table.qza");
    let rep_seqs = dir.join("rep-seqs.qza");
    let denoising_stats = dir.join("denoising-stats.qza");
    let rooted_tree = dir.join("rooted-tree.qza");
    let taxonomy = dir.join("taxonomy.qza");
    let core_metrics = dir.join("core-metrics");

    vec![
        StageSpec::new(
            "import",
            "qiime",
            vec![
                "tools".into(),
                "import".into(),
                "--type".into(),
                "SampleData[PairedEndSequencesWithQuality]".into(),
                "--input-format".into(),
                "PairedEndFastqManifestPhred33".into(),
                "--input-path".into(),
                arg(&config.manifest),
                "--output-path".into(),
                arg(&demux),
            ],
        )
        .input(&config.manifest)
        .output(&demux),
        StageSpec::new(
            "summarize-demux",
            "qiime",
            vec![
                "demux".into(),
                "summarize".into(),
                "--i-data".into(),
                arg(&demux),
                "--o-visualization".into(),
                arg(&dir.join("demux.qzv")),
            ],
        )
        .input(&demux)
        .output(&dir.join("demux.qzv")),
        StageSpec::new(
            "trim-primers",
            "qiime",
            vec![
                "cutadapt".into(),
                "trim-paired".into(),
                "--i-demultiplexed-sequences".into(),
                arg(&demux),
                "--p-front-f".into(),
                config.primer_f.clone(),
                "--p-front-r".into(),
                config.primer_r.clone(),
                "--p-cores".into(),
                threads.clone(),
                "--o-trimmed-sequences".into(),
                arg(&trimmed),
            ],
        )
        .input(&demux)
        .output(&trimmed),
        StageSpec::new(
            "denoise",
            "qiime",
            vec![
                "dada2".into(),
                "denoise-paired".into(),
                "--i-demultiplexed-seqs".into(),
                arg(&trimmed),
                "--p-trim-left-f".into(),
                config.trim_left_f.to_string(),
                "--p-trim-left-r".into(),
                config.trim_left_r.to_string(),
                "--p-trunc-len-f".into(),
                config.trunc_len_f.to_string(),
                "--p-trunc-len-r".into(),
                config.trunc_len_r.to_string(),
                "--p-n-threads".into(),
                threads.clone(),
                "--o-table".into(),
                arg(&table),
                "--o-representative-sequences".into(),
                arg(&rep_seqs),
                "--o-denoising-stats".into(),
                arg(&denoising_stats),
            ],
        )
        .input(&trimmed)
        .output(&table)
        .output(&rep_seqs)
        .output(&denoising_stats),
        StageSpec::new(
            "summarize-table",
            "qiime",
            vec![
                "feature-table".into(),
                "summarize".into(),
                "--i-table".into(),
                arg(&table),
                "--m-sample-metadata-file".into(),
                arg(&config.metadata),
                "--o-visualization".into(),
                arg(&dir.join("table.qzv")),
            ],
        )
        .input(&table)
        .input(&config.metadata)
        .output(&dir.join("table.qzv")),
        StageSpec::new(
            "tabulate-rep-seqs",
            "qiime",
            vec![
                "feature-table".into(),
                "tabulate-seqs".into(),
                "--i-data".into(),
                arg(&rep_seqs),
                "--o-visualization".into(),
                arg(&dir.join("rep-seqs.qzv")),
            ],
        )
        .input(&rep_seqs)
        .output(&dir.join("rep-seqs.qzv")),
        StageSpec::new(
            "phylogeny",
            "qiime",
            vec![
                "phylogeny".into(),
                "align-to-tree-mafft-fasttree".into(),
                "--i-sequences".into(),
                arg(&rep_seqs),
                "--p-n-threads".into(),
                threads.clone(),
                "--o-alignment".into(),
                arg(&dir.join("aligned-rep-seqs.qza")),
                "--o-masked-alignment".into(),
                arg(&dir.join("masked-aligned-rep-seqs.qza")),
                "--o-tree".into(),
                arg(&dir.join("unrooted-tree.qza")),
                "--o-rooted-tree".into(),
                arg(&rooted_tree),
            ],
        )
        .input(&rep_seqs)
        .output(&rooted_tree),
        StageSpec::new(
            "classify-taxonomy",
            "qiime",
            vec![
                "feature-classifier".into(),
                "classify-sklearn".into(),
                "--i-classifier".into(),
                arg(&config.classifier_qza),
                "--i-reads".into(),
                arg(&rep_seqs),
                "--p-n-jobs".into(),
                threads.clone(),
                "--o-classification".into(),
                arg(&taxonomy),
            ],
        )
        .input(&config.classifier_qza)
        .input(&rep_seqs)
        .output(&taxonomy),
        StageSpec::new(
            "tabulate-taxonomy",
            "qiime",
            vec![
                "metadata".into(),
                "tabulate".into(),
                "--m-input-file".into(),
                arg(&taxonomy),
                "--o-visualization".into(),
                arg(&dir.join("taxonomy.qzv")),
            ],
        )
        .input(&taxonomy)
        .output(&dir.join("taxonomy.qzv")),
        StageSpec::new(
            "taxa-barplot",
            "qiime",
            vec![
                "taxa".into(),
                "barplot".into(),
                "--i-table".into(),
                arg(&table),
                "--i-taxonomy".into(),
                arg(&taxonomy),
                "--m-metadata-file".into(),
                arg(&config.metadata),
                "--o-visualization".into(),
                arg(&dir.join("taxa-bar-plots.qzv")),
            ],
        )
        .input(&table)
        .input(&taxonomy)
        .output(&dir.join("taxa-bar-plots.qzv")),
        StageSpec::new(
            "core-diversity",
            "qiime",
            vec![
                "diversity".into(),
                "core-metrics-phylogenetic".into(),
                "--i-phylogeny".into(),
                arg(&rooted_tree),
                "--i-table".into(),
                arg(&table),
                "--p-sampling-depth".into(),
                config.sampling_depth.to_string(),
                "--p-n-jobs-or-threads".into(),
                threads,
                "--m-metadata-file".into(),
                arg(&config.metadata),
                "--output-dir".into(),
                arg(&core_metrics),
            ],
        )
        .input(&rooted_tree)
        .input(&table)
        .output(&core_metrics),
        export_stage("export-table", &table, &dir.join("export/table")),
        export_stage("export-rep-seqs", &rep_seqs, &dir.join("export/rep-seqs")),
        export_stage("export-taxonomy", &taxonomy, &dir.join("export/taxonomy")),
        StageSpec::new("versions", "qiime", vec!["info".into()])
            .stdout_to(&dir.join("versions.txt")),
    ]
}

fn export_stage(id: &str, artifact: &Path, out_dir: &Path) -> StageSpec {
    StageSpec::new(
        id,
        "qiime",
        vec![
            "tools".into(),
            "export".into(),
            "--input-path".into(),
            arg(artifact),
            "--output-path".into(),
            arg(out_dir),
        ],
    )
    .input(artifact)
    .output(out_dir)
}
