//! Report output port trait.

use crate::domain::error::ArimaTraderError;
use crate::domain::pipeline::PipelineResult;
use std::path::{Path, PathBuf};

/// Port for persisting a finished run.
pub trait ReportPort {
    /// Writes the run's artifacts under `output_dir` and returns the files written.
    fn write(
        &self,
        result: &PipelineResult,
        symbol: &str,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, ArimaTraderError>;
}
