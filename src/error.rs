use std::path::PathBuf;

use thiserror::Error;

use crate::plugin::runtime::ExecutionResult;

/// Failures produced by the plugin core.
///
/// `Display` carries the full diagnostic detail and is meant for the log.
/// [`PluginError::user_message`] is the short line shown to the user.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("cannot list plugin directory {}: {source}", path.display())]
    DirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read {}: {source}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog request failed: {0}")]
    RemoteError(String),

    #[error("catalog response is not JSON (content-type: {0})")]
    FormatError(String),

    #[error("catalog body could not be parsed: {0}")]
    ParseError(String),

    #[error("download of {name} failed: {detail}")]
    DownloadError { name: String, detail: String },

    #[error("cannot write {}: {detail}", path.display())]
    WriteError { path: PathBuf, detail: String },

    #[error("unsupported plugin type: {}", path.display())]
    UnsupportedKind { path: PathBuf },

    #[error("plugin {plugin} failed: {detail}")]
    ExecutionFailed {
        plugin: String,
        detail: String,
        result: ExecutionResult,
    },
}

impl PluginError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::DirectoryUnavailable { .. } => "Error: Could not read the plugins folder.",
            Self::ReadError { .. } => "Error: Unable to read the plugin file.",
            Self::RemoteError(_) => {
                "Error: Could not retrieve plugin list. Check your internet connection or server URL."
            }
            Self::FormatError(_) => {
                "Error: Server response was not JSON. Please check the plugin list URL."
            }
            Self::ParseError(_) => {
                "Error: Failed to parse plugin list. Server might be returning an unexpected format."
            }
            Self::DownloadError { .. } => "Error: Could not download the plugin.",
            Self::WriteError { .. } => "Error: Could not save the downloaded plugin.",
            Self::UnsupportedKind { .. } => "Error: Unsupported plugin type.",
            Self::ExecutionFailed { .. } => "Error: Failed to execute the plugin.",
        }
    }

    /// Output captured from a failed run, if any.
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            Self::ExecutionFailed { result, .. } if !result.output.is_empty() => {
                Some(result.output.as_str())
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PluginError>;
