//! Process exit codes and the errors that select them.

use censuskv_core::error::{InputError, StoreError};
use thiserror::Error;

pub const SUCCESS: u8 = 0;
/// Malformed input or any other fatal error.
pub const FATAL: u8 = 1;
/// A table was purged.
pub const PURGED: u8 = 2;
/// Creating or deleting a table failed.
pub const PROVISIONING_FAILED: u8 = 3;
/// A required input was not supplied or does not exist.
pub const MISSING_INPUT: u8 = 99;

/// Errors with a dedicated exit code.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("missing required input: {0}")]
    MissingInput(String),

    #[error("table operation on '{table}' failed: {source}")]
    Provisioning {
        table: String,
        #[source]
        source: StoreError,
    },
}

/// Map a command error onto its exit code.
pub fn code_for(err: &anyhow::Error) -> u8 {
    if let Some(cli) = err.downcast_ref::<CliError>() {
        return match cli {
            CliError::MissingInput(_) => MISSING_INPUT,
            CliError::Provisioning { .. } => PROVISIONING_FAILED,
        };
    }
    if let Some(InputError::Io(io)) = err.downcast_ref::<InputError>() {
        if io.kind() == std::io::ErrorKind::NotFound {
            return MISSING_INPUT;
        }
    }
    FATAL
}
