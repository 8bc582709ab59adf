/// Per-stage R driver for the DADA2 track, materialized into the track
/// directory at run time and invoked one subcommand per stage.
pub const DADA2_PIPELINE_R: &str = include_str!("../scripts/dada2_pipeline.R");
