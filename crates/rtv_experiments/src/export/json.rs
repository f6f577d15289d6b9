use std::io::Write;

use crate::metrics::SimulationResult;

/// One pretty-printed array entry per run, in sweep order.
pub(crate) fn write_results_json(
    results: &[SimulationResult],
    mut writer: impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    serde_json::to_writer_pretty(&mut writer, results)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
