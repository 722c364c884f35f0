use std::fs::File;
use std::io::{BufRead, BufReader};

use smallvec::SmallVec;

use crate::error::{PluginError, Result};
use crate::plugin::manifest::PluginFile;

pub const MAX_METADATA_LINES: usize = 3;
pub const NO_METADATA: &str = "No plugin information found.";

/// Human-readable description taken from a plugin's comment lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMetadata {
    pub lines: SmallVec<[String; MAX_METADATA_LINES]>,
}

impl PluginMetadata {
    pub fn is_placeholder(&self) -> bool {
        self.lines.len() == 1 && self.lines[0] == NO_METADATA
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

/// Scan the whole file and keep the last three comment lines, in file order.
///
/// Lines are returned as written; only the marker test trims whitespace.
pub fn extract_metadata(plugin: &PluginFile) -> Result<PluginMetadata> {
    let read_error = |source| PluginError::ReadError {
        path: plugin.path.clone(),
        source,
    };

    let file = File::open(&plugin.path).map_err(read_error)?;
    let reader = BufReader::new(file);
    let marker = plugin.kind.comment_marker();

    let mut comments = Vec::new();
    for raw in reader.split(b'\n') {
        let raw = raw.map_err(read_error)?;
        let mut line = String::from_utf8_lossy(&raw).into_owned();
        if line.ends_with('\r') {
            line.pop();
        }

        if marker.is_some_and(|marker| line.trim().starts_with(marker)) {
            comments.push(line);
        }
    }

    tracing::debug!(
        plugin = %plugin.name(),
        comments = comments.len(),
        "scanned plugin comments"
    );

    let keep_from = comments.len().saturating_sub(MAX_METADATA_LINES);
    let lines: SmallVec<[String; MAX_METADATA_LINES]> = if comments.is_empty() {
        SmallVec::from_iter([NO_METADATA.to_string()])
    } else {
        comments.drain(keep_from..).collect()
    };

    Ok(PluginMetadata { lines })
}
