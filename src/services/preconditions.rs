use std::path::PathBuf;
use tracing::{error, info};

use crate::errors::GateError;

/// Checks that the environment-definition files are in place.
pub struct PreconditionValidator {
    required: Vec<PathBuf>,
}

impl PreconditionValidator {
    pub fn new(required: Vec<PathBuf>) -> Self {
        Self { required }
    }

    /// Fails with every missing path, not just the first one.
    pub fn validate(&self) -> Result<(), GateError> {
        info!("Checking environment files...");

        let missing: Vec<PathBuf> = self
            .required
            .iter()
            .filter(|path| !path.exists())
            .cloned()
            .collect();

        if !missing.is_empty() {
            let err = GateError::ConfigMissing(missing);
            error!("[ERROR] {err}");
            error!("Create them from the examples or ask the project administrator");
            return Err(err);
        }

        info!("[OK] Environment files found");
        Ok(())
    }
}
