use std::io::{self, BufRead, Write};

use anyhow::Result;

use crate::error::PluginError;
use crate::model::config::{AppConfig, AppPaths};
use crate::msg::Msg;
use crate::plugin::PluginManager;
use crate::plugin::installer::PluginInstaller;
use crate::plugin::manager::Resolved;
use crate::plugin::manifest::{PluginDescriptor, PluginFile, PluginKind};
use crate::plugin::metadata::extract_metadata;
use crate::plugin::runtime::Dispatcher;

/// The host: owns the plugin core and talks to the user over `input`/`out`.
///
/// Every action reports its own failure and returns; nothing here ends the
/// loop except `Msg::Quit` or end of input.
pub struct App<R, W> {
    pub config: AppConfig,
    pub paths: AppPaths,
    manager: PluginManager,
    dispatcher: Dispatcher,
    installer: PluginInstaller,
    input: R,
    out: W,
    pub should_quit: bool,
}

impl<R: BufRead, W: Write> App<R, W> {
    pub fn new(config: AppConfig, paths: AppPaths, input: R, out: W) -> Result<Self> {
        let installer = PluginInstaller::new(&config.catalog, &paths.plugin_dir)?;
        Ok(Self::with_parts(config, paths, installer, input, out))
    }

    pub fn with_parts(
        config: AppConfig,
        paths: AppPaths,
        installer: PluginInstaller,
        input: R,
        out: W,
    ) -> Self {
        Self {
            manager: PluginManager::new(&paths.plugin_dir),
            dispatcher: Dispatcher::new(&config.runtime),
            installer,
            config,
            paths,
            input,
            out,
            should_quit: false,
        }
    }

    pub fn set_dispatcher(&mut self, dispatcher: Dispatcher) {
        self.dispatcher = dispatcher;
    }

    // ── Menu loop ────────────────────────────────────────────────

    pub fn run_menu(&mut self) -> io::Result<()> {
        self.welcome()?;

        while !self.should_quit {
            self.show_menu()?;
            let Some(line) = self.read_line()? else {
                writeln!(self.out)?;
                break;
            };
            self.update(Msg::parse(&line))?;
        }

        Ok(())
    }

    pub fn update(&mut self, msg: Msg) -> io::Result<()> {
        match msg {
            Msg::Help => self.help()?,
            Msg::ListPlugins => {
                self.list()?;
            }
            Msg::RunPlugin => self.prompt_run()?,
            Msg::InstallPlugin => self.prompt_install()?,
            Msg::PluginInfo => self.prompt_info()?,
            Msg::Quit => {
                writeln!(self.out, "Exiting the application. Goodbye!")?;
                self.should_quit = true;
            }
            Msg::Invalid(choice) => {
                tracing::debug!(choice = %choice, "invalid menu choice");
                writeln!(self.out, "Invalid choice. Please select again.")?;
            }
        }
        Ok(())
    }

    fn welcome(&mut self) -> io::Result<()> {
        writeln!(self.out, "=======================================================")?;
        writeln!(self.out, "                Welcome to plughost                    ")?;
        writeln!(self.out, "=======================================================")
    }

    fn show_menu(&mut self) -> io::Result<()> {
        writeln!(self.out, "\nPlease select an option:")?;
        for (key, label) in Msg::MENU {
            writeln!(self.out, "{key}. {label}")?;
        }
        self.prompt("Enter your choice: ")
    }

    fn prompt_run(&mut self) -> io::Result<()> {
        if self.list()? == 0 {
            return Ok(());
        }
        self.prompt("Enter the plugin number or name to load: ")?;
        let Some(query) = self.read_line()? else {
            return Ok(());
        };

        let Some(plugin) = self.resolve_plugin(&query)? else {
            return Ok(());
        };

        let mut args = Vec::new();
        if plugin.kind == PluginKind::Shell {
            self.prompt("Arguments (optional): ")?;
            if let Some(line) = self.read_line()? {
                args = line.split_whitespace().map(str::to_string).collect();
            }
        }

        self.run(&plugin.name(), &args)?;
        Ok(())
    }

    fn prompt_install(&mut self) -> io::Result<()> {
        let Some(catalog) = self.catalog()? else {
            return Ok(());
        };
        if catalog.is_empty() {
            return Ok(());
        }

        self.prompt("Enter the plugin number to download: ")?;
        let Some(choice) = self.read_line()? else {
            return Ok(());
        };

        match select_descriptor(&catalog, &choice) {
            Some(descriptor) => {
                self.install(descriptor)?;
            }
            None => writeln!(
                self.out,
                "Invalid plugin number. Please enter a valid option."
            )?,
        }
        Ok(())
    }

    fn prompt_info(&mut self) -> io::Result<()> {
        if self.list()? == 0 {
            return Ok(());
        }
        self.prompt("Enter the plugin number to view its information: ")?;
        let Some(choice) = self.read_line()? else {
            return Ok(());
        };

        let plugins = self.manager.list_or_empty().0;
        let selected = choice
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|index| index.checked_sub(1))
            .and_then(|index| plugins.get(index));

        match selected {
            Some(plugin) => {
                let name = plugin.name();
                self.info(&name)?;
            }
            None => writeln!(
                self.out,
                "Invalid plugin number. Please enter a valid option."
            )?,
        }
        Ok(())
    }

    // ── Actions (shared with the one-shot CLI) ───────────────────

    pub fn help(&mut self) -> io::Result<()> {
        let plugin_dir = self.paths.plugin_dir.display().to_string();
        let log_dir = self.paths.log_dir.display().to_string();
        let suffixes = PluginKind::SUPPORTED_SUFFIXES.join(", ");

        writeln!(self.out, "\n---- Help/Info ----")?;
        writeln!(self.out, "plughost loads and runs small plugin scripts.")?;
        writeln!(
            self.out,
            "Plugins can be written in JavaScript (run in-process), Python or PowerShell."
        )?;
        writeln!(self.out, "\n---- Plugin Information ----")?;
        writeln!(self.out, "Plugins Folder Location: {plugin_dir}")?;
        writeln!(
            self.out,
            "Place your plugins in the above folder. Supported extensions: {suffixes}."
        )?;
        writeln!(self.out, "\n---- Error Reporting ----")?;
        writeln!(self.out, "Error logs are stored in: {log_dir}")?;
        writeln!(self.out, "If you encounter issues:")?;
        writeln!(
            self.out,
            "1. Locate the latest log file in the logs folder (errorlog.YYYY-MM-DD)."
        )?;
        writeln!(
            self.out,
            "2. Copy its contents to a paste service such as Pastebin."
        )?;
        writeln!(
            self.out,
            "3. Open an issue and include the link and what you were doing."
        )
    }

    /// Print the numbered plugin list. Returns how many were shown.
    pub fn list(&mut self) -> io::Result<usize> {
        let (plugins, err) = self.manager.list_or_empty();
        if let Some(err) = err {
            self.report(&err)?;
            return Ok(0);
        }

        writeln!(self.out, "\n---- Available Plugins ----")?;
        if plugins.is_empty() {
            writeln!(self.out, "No plugins found.")?;
        }
        for (idx, plugin) in plugins.iter().enumerate() {
            writeln!(self.out, "{}. {}", idx + 1, plugin.name())?;
        }
        writeln!(self.out)?;
        Ok(plugins.len())
    }

    pub fn info(&mut self, query: &str) -> io::Result<bool> {
        let Some(plugin) = self.resolve_plugin(query)? else {
            return Ok(false);
        };

        match extract_metadata(&plugin) {
            Ok(metadata) => {
                if metadata.is_placeholder() {
                    tracing::debug!(plugin = %plugin.name(), "plugin has no description comments");
                }
                writeln!(self.out, "\n---- Information for {} ----", plugin.name())?;
                writeln!(self.out, "{}", metadata.render())?;
                Ok(true)
            }
            Err(err) => {
                self.report(&err)?;
                Ok(false)
            }
        }
    }

    pub fn run(&mut self, query: &str, args: &[String]) -> io::Result<bool> {
        let Some(plugin) = self.resolve_plugin(query)? else {
            return Ok(false);
        };

        match self.dispatcher.run(&plugin, args) {
            Ok(result) => {
                if !result.output.is_empty() {
                    writeln!(self.out, "{} output:\n{}", plugin.name(), result.output)?;
                }
                Ok(true)
            }
            Err(err) => {
                self.report(&err)?;
                Ok(false)
            }
        }
    }

    /// Fetch and print the remote catalog.
    pub fn catalog(&mut self) -> io::Result<Option<Vec<PluginDescriptor>>> {
        let url = self.config.catalog.url.clone();
        match self.installer.fetch_catalog(&url) {
            Ok(catalog) => {
                writeln!(self.out, "\n---- Available Plugins for Download ----")?;
                if catalog.is_empty() {
                    writeln!(self.out, "The plugin library is empty.")?;
                }
                for (idx, descriptor) in catalog.iter().enumerate() {
                    writeln!(self.out, "{}. {}", idx + 1, descriptor.name)?;
                }
                Ok(Some(catalog))
            }
            Err(err) => {
                self.report(&err)?;
                Ok(None)
            }
        }
    }

    /// Install by 1-based catalog index or exact catalog name.
    pub fn install_selection(&mut self, selection: &str) -> io::Result<bool> {
        let Some(catalog) = self.catalog()? else {
            return Ok(false);
        };

        match select_descriptor(&catalog, selection) {
            Some(descriptor) => self.install(descriptor),
            None => {
                writeln!(self.out, "No catalog entry matches {selection:?}.")?;
                Ok(false)
            }
        }
    }

    fn install(&mut self, descriptor: &PluginDescriptor) -> io::Result<bool> {
        writeln!(self.out, "Downloading plugin: {}", descriptor.name)?;
        match self.installer.install_plugin(descriptor) {
            Ok(receipt) => {
                writeln!(self.out, "Plugin installed successfully: {}", receipt.name)?;
                writeln!(
                    self.out,
                    "Saved to {} ({} bytes)",
                    receipt.path.display(),
                    receipt.bytes
                )?;
                Ok(true)
            }
            Err(err) => {
                self.report(&err)?;
                Ok(false)
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn resolve_plugin(&mut self, query: &str) -> io::Result<Option<PluginFile>> {
        let resolved = match self.manager.resolve(query) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.report(&err)?;
                return Ok(None);
            }
        };

        match resolved {
            Some(Resolved::Exact(plugin)) => Ok(Some(plugin)),
            Some(Resolved::Closest(plugin)) => {
                writeln!(
                    self.out,
                    "No plugin named {:?}; using closest match {}.",
                    query.trim(),
                    plugin.name()
                )?;
                Ok(Some(plugin))
            }
            None => {
                writeln!(self.out, "Plugin not found: {}", query.trim())?;
                Ok(None)
            }
        }
    }

    fn report(&mut self, err: &PluginError) -> io::Result<()> {
        tracing::error!(error = %err, "operation failed");
        writeln!(self.out, "{}", err.user_message())?;
        if let Some(output) = err.captured_output() {
            writeln!(self.out, "Plugin output:\n{output}")?;
        }
        Ok(())
    }

    fn prompt(&mut self, text: &str) -> io::Result<()> {
        write!(self.out, "{text}")?;
        self.out.flush()
    }

    /// Next line without its terminator, or `None` at end of input.
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

fn select_descriptor<'a>(
    catalog: &'a [PluginDescriptor],
    selection: &str,
) -> Option<&'a PluginDescriptor> {
    let selection = selection.trim();
    match selection.parse::<usize>() {
        Ok(index) => index.checked_sub(1).and_then(|idx| catalog.get(idx)),
        Err(_) => catalog
            .iter()
            .find(|descriptor| descriptor.name == selection),
    }
}
