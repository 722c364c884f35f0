use serde::Deserialize;

/// How a shell plugin's standard streams are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellMode {
    /// Capture stdout and stderr and return them once the script exits.
    #[default]
    Captured,
    /// Hand the host's own stdin/stdout/stderr to the script.
    Interactive,
}

impl ShellMode {
    pub fn label(&self) -> &'static str {
        match self {
            ShellMode::Captured => "captured",
            ShellMode::Interactive => "interactive",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        mode: ShellMode,
    }

    #[test]
    fn parses_snake_case() {
        let parsed: Wrapper = toml::from_str("mode = \"interactive\"").unwrap();
        assert_eq!(parsed.mode, ShellMode::Interactive);
        assert_eq!(parsed.mode.label(), "interactive");
        assert!(toml::from_str::<Wrapper>("mode = \"loud\"").is_err());
    }
}
