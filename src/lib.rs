pub mod commands;
pub mod config;
pub mod crypto;
pub mod error;
pub mod protocol;

pub use config::DkgConfig;
pub use error::{DkgError, VerificationFailure};
pub use protocol::{Dkg, SchemeKind};

/// Result from a command, separating the human-readable report from the JSON result
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Report with explanations
    pub output: String,
    /// Clean JSON result
    pub result: String,
}
