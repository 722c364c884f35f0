mod app;
mod cli;
mod error;
mod model;
mod msg;
mod plugin;

use std::fs;
use std::io;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::execute;
use crossterm::terminal::SetTitle;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use cli::{Cli, Commands};
use model::config::{AppConfig, AppPaths};
use model::mode::ShellMode;
use plugin::runtime::Dispatcher;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    let paths = config.paths()?;
    prepare_dirs(&paths)?;

    // Logging goes to a file; stdout belongs to the menu.
    let _guard = init_logging(&paths.log_dir);
    tracing::info!(plugin_dir = %paths.plugin_dir.display(), "plughost starting");

    let window_title = config.general.window_title.clone();
    let runtime = config.runtime.clone();
    let mut app = App::new(config, paths, io::stdin().lock(), io::stdout())?;

    let ok = match cli.command {
        None => {
            let mut stdout = io::stdout();
            if let Err(err) = execute!(stdout, SetTitle(&window_title)) {
                tracing::warn!("failed to set window title: {err}");
            }
            app.run_menu()?;
            true
        }
        Some(Commands::List) => {
            app.list()?;
            true
        }
        Some(Commands::Info { plugin }) => app.info(&plugin)?,
        Some(Commands::Run {
            plugin,
            args,
            interactive,
        }) => {
            if interactive {
                let mode = ShellMode::Interactive;
                tracing::debug!(mode = mode.label(), "shell mode overridden");
                app.set_dispatcher(Dispatcher::new(&runtime).with_shell_mode(mode));
            }
            app.run(&plugin, &args)?
        }
        Some(Commands::Catalog) => app.catalog()?.is_some(),
        Some(Commands::Install { selection }) => app.install_selection(&selection)?,
        Some(Commands::Help) => {
            app.help()?;
            true
        }
    };

    tracing::info!("plughost exiting");
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Create every directory the host uses. Failing here is the one fatal error.
fn prepare_dirs(paths: &AppPaths) -> Result<()> {
    for dir in paths.all() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }
    Ok(())
}

fn init_logging(log_dir: &Path) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, "errorlog");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("plughost=info"));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();

    guard
}
