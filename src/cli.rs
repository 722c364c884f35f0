use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "plughost")]
#[command(about = "Discover, install and run plugin scripts", long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Config file layered over the built-in defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Without a subcommand the interactive menu starts
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List installed plugins
    #[command(visible_alias = "ls")]
    List,
    /// Show the description comments of a plugin
    Info {
        /// Number, file name or stem
        plugin: String,
    },
    /// Run a plugin
    Run {
        /// Number, file name or stem
        plugin: String,
        /// Extra arguments, passed to shell plugins only
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        /// Connect shell plugins to this terminal instead of capturing output
        #[arg(short, long, default_value_t = false)]
        interactive: bool,
    },
    /// Show the remote plugin library
    Catalog,
    /// Download a plugin from the library
    Install {
        /// 1-based library number or exact plugin name
        selection: String,
    },
    /// Show folders and supported plugin types
    Help,
}
