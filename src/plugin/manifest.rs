use serde::Deserialize;
use std::path::{Path, PathBuf};

/// How a plugin file is executed. Derived from the file name suffix only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    /// `.js`, run inside the embedded JavaScript engine.
    Embedded,
    /// `.py`, run by an external interpreter process.
    ExternalInterpreter,
    /// `.ps1`, run by the shell host process.
    Shell,
    Unsupported,
}

impl PluginKind {
    pub const SUPPORTED_SUFFIXES: [&'static str; 3] = [".js", ".py", ".ps1"];

    pub fn from_path(path: &Path) -> Self {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return Self::Unsupported;
        };

        if name.ends_with(".js") {
            Self::Embedded
        } else if name.ends_with(".py") {
            Self::ExternalInterpreter
        } else if name.ends_with(".ps1") {
            Self::Shell
        } else {
            Self::Unsupported
        }
    }

    pub fn is_supported(self) -> bool {
        !matches!(self, Self::Unsupported)
    }

    /// Prefix that marks a comment line for this kind.
    pub fn comment_marker(self) -> Option<&'static str> {
        match self {
            Self::Embedded => Some("//"),
            Self::ExternalInterpreter | Self::Shell => Some("#"),
            Self::Unsupported => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Embedded => "javascript",
            Self::ExternalInterpreter => "python",
            Self::Shell => "powershell",
            Self::Unsupported => "unsupported",
        }
    }
}

/// A plugin file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginFile {
    pub path: PathBuf,
    pub kind: PluginKind,
}

impl PluginFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = PluginKind::from_path(&path);
        Self { path, kind }
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn stem(&self) -> Option<&str> {
        self.path.file_stem().and_then(|stem| stem.to_str())
    }
}

/// One entry of the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    #[serde(rename = "url", default)]
    pub source_url: Option<String>,
}
