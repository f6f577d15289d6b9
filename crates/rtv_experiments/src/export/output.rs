use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use crate::metrics::SimulationResult;

/// Refuse to write a file for a sweep that produced no runs.
pub(crate) fn require_results(results: &[SimulationResult]) -> Result<(), Box<dyn std::error::Error>> {
    if results.is_empty() {
        return Err("sweep produced no simulation results to export".into());
    }
    Ok(())
}

/// Buffered writer for an export target, creating missing parent directories.
pub(crate) fn open_export(path: impl AsRef<Path>) -> Result<BufWriter<File>, Box<dyn std::error::Error>> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}
