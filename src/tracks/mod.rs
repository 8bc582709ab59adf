//! Fixed stage sequences for the two analysis tracks.
//!
//! Both tracks consume the same resolved config and produce a feature table
//! plus taxonomic classification; the stage lists here are the only place
//! that knows each toolkit's argument conventions.
pub mod dada2;
pub mod qiime;

use std::path::Path;

/// Render a path as a process argument.
fn arg(path: &Path) -> String {
    path.display().to_string()
}
