use std::fs;
use std::path::PathBuf;

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::error::{PluginError, Result};
use crate::plugin::manifest::PluginFile;

/// Outcome of looking a plugin up by user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Exact(PluginFile),
    /// No exact hit; this is the closest fuzzy match.
    Closest(PluginFile),
}

/// Enumerates the plugin directory. Nothing is cached: every call re-reads disk.
#[derive(Debug, Clone)]
pub struct PluginManager {
    plugin_dir: PathBuf,
}

impl PluginManager {
    pub fn new(plugin_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
        }
    }

    /// Supported plugin files, sorted by file name.
    pub fn list_plugins(&self) -> Result<Vec<PluginFile>> {
        let unavailable = |source| PluginError::DirectoryUnavailable {
            path: self.plugin_dir.clone(),
            source,
        };

        let entries = fs::read_dir(&self.plugin_dir).map_err(unavailable)?;

        let mut plugins: Vec<PluginFile> = entries
            .filter_map(|entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        tracing::warn!(error = %err, "skipping unreadable plugin directory entry");
                        return None;
                    }
                };

                // Follows symlinks, so a link to a script counts as a plugin.
                let path = entry.path();
                if !path.is_file() {
                    return None;
                }

                let plugin = PluginFile::new(path);
                plugin.kind.is_supported().then_some(plugin)
            })
            .collect();

        plugins.sort_by_key(PluginFile::name);
        Ok(plugins)
    }

    /// Like [`list_plugins`](Self::list_plugins) but degrades to an empty list.
    ///
    /// The error is logged and handed back so the caller can still tell the user.
    pub fn list_or_empty(&self) -> (Vec<PluginFile>, Option<PluginError>) {
        match self.list_plugins() {
            Ok(plugins) => (plugins, None),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read plugins directory");
                (Vec::new(), Some(err))
            }
        }
    }

    /// Look a plugin up by user input against a fresh listing.
    ///
    /// Tries the 1-based index, the exact file name, a unique file stem, then
    /// the best fuzzy match. `Ok(None)` means nothing matched.
    pub fn resolve(&self, query: &str) -> Result<Option<Resolved>> {
        let plugins = self.list_plugins()?;
        Ok(resolve_in(&plugins, query))
    }
}

fn resolve_in(plugins: &[PluginFile], query: &str) -> Option<Resolved> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }

    if let Ok(index) = query.parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|idx| plugins.get(idx))
            .cloned()
            .map(Resolved::Exact);
    }

    if let Some(plugin) = plugins.iter().find(|plugin| plugin.name() == query) {
        return Some(Resolved::Exact(plugin.clone()));
    }

    let mut by_stem = plugins.iter().filter(|plugin| plugin.stem() == Some(query));
    if let (Some(plugin), None) = (by_stem.next(), by_stem.next()) {
        return Some(Resolved::Exact(plugin.clone()));
    }

    let matcher = SkimMatcherV2::default();
    plugins
        .iter()
        .filter_map(|plugin| {
            matcher
                .fuzzy_match(&plugin.name(), query)
                .map(|score| (score, plugin))
        })
        .max_by_key(|(score, _)| *score)
        .map(|(_, plugin)| Resolved::Closest(plugin.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::manifest::PluginKind;
    use std::path::Path;

    fn resolve(dir: &Path, query: &str) -> Option<Resolved> {
        PluginManager::new(dir).resolve(query).unwrap()
    }

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "").unwrap();
    }

    fn names(plugins: &[PluginFile]) -> Vec<String> {
        plugins.iter().map(PluginFile::name).collect()
    }

    #[test]
    fn lists_only_supported_kinds_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["zeta.py", "alpha.ps1", "readme.md", "mid.js", "data.json"] {
            touch(dir.path(), name);
        }
        fs::create_dir(dir.path().join("nested.js")).unwrap();

        let manager = PluginManager::new(dir.path());
        let plugins = manager.list_plugins().unwrap();

        assert_eq!(names(&plugins), ["alpha.ps1", "mid.js", "zeta.py"]);
        assert!(plugins.iter().all(|p| p.kind != PluginKind::Unsupported));
    }

    #[test]
    fn missing_directory_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PluginManager::new(dir.path().join("absent"));

        assert!(matches!(
            manager.list_plugins(),
            Err(PluginError::DirectoryUnavailable { .. })
        ));

        let (plugins, err) = manager.list_or_empty();
        assert!(plugins.is_empty());
        assert!(matches!(err, Some(PluginError::DirectoryUnavailable { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_scripts_are_listed() {
        let scripts = tempfile::tempdir().unwrap();
        let plugins = tempfile::tempdir().unwrap();
        touch(scripts.path(), "shared.py");
        std::os::unix::fs::symlink(
            scripts.path().join("shared.py"),
            plugins.path().join("shared.py"),
        )
        .unwrap();
        std::os::unix::fs::symlink(
            scripts.path().join("missing.js"),
            plugins.path().join("dangling.js"),
        )
        .unwrap();

        let manager = PluginManager::new(plugins.path());
        assert_eq!(names(&manager.list_plugins().unwrap()), ["shared.py"]);
        assert!(matches!(
            manager.resolve("shared"),
            Ok(Some(Resolved::Exact(ref f))) if f.name() == "shared.py"
        ));
    }

    #[test]
    fn resolve_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PluginManager::new(dir.path().join("absent"));

        assert!(matches!(
            manager.resolve("1"),
            Err(PluginError::DirectoryUnavailable { .. })
        ));
    }

    #[test]
    fn listing_reflects_disk_changes() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PluginManager::new(dir.path());
        assert!(manager.list_plugins().unwrap().is_empty());

        touch(dir.path(), "late.py");
        assert_eq!(names(&manager.list_plugins().unwrap()), ["late.py"]);
    }

    #[test]
    fn resolve_by_index_name_and_stem() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["hello.js", "ping.ps1", "stats.py"] {
            touch(dir.path(), name);
        }
        let dir = dir.path();

        let by_index = resolve(dir, "2").unwrap();
        assert!(matches!(by_index, Resolved::Exact(ref f) if f.name() == "ping.ps1"));

        let by_name = resolve(dir, "stats.py").unwrap();
        assert!(matches!(by_name, Resolved::Exact(ref f) if f.name() == "stats.py"));

        let by_stem = resolve(dir, "hello").unwrap();
        assert!(matches!(by_stem, Resolved::Exact(ref f) if f.name() == "hello.js"));

        assert_eq!(resolve(dir, "0"), None);
        assert_eq!(resolve(dir, "4"), None);
        assert_eq!(resolve(dir, "   "), None);
    }

    #[test]
    fn resolve_falls_back_to_fuzzy() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["network_ping.ps1", "disk_usage.py"] {
            touch(dir.path(), name);
        }

        let resolved = resolve(dir.path(), "netping").unwrap();
        assert!(matches!(resolved, Resolved::Closest(ref f) if f.name() == "network_ping.ps1"));
        assert_eq!(resolve(dir.path(), "qqqq"), None);
    }

    #[test]
    fn ambiguous_stem_is_not_exact() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["tool.js", "tool.py"] {
            touch(dir.path(), name);
        }

        let resolved = resolve(dir.path(), "tool").unwrap();
        assert!(matches!(resolved, Resolved::Closest(_)));
    }
}
