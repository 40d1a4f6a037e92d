use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "unipkg",
    about = "One front end for many package managers",
    long_about = "Search, list, install, update and uninstall packages through npm, pip, cargo, \
                  Chocolatey, Scoop, .NET tools and PowerShell 7 with the same commands",
    version,
    next_line_help = false,
    term_width = 80
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct GlobalFlags {
    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Quiet mode
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print the task logs of every manager that was used
    #[arg(long, global = true)]
    pub task_logs: bool,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Skip confirmation prompts
    #[arg(short = 'y', long = "yes", global = true)]
    pub yes: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show every manager with its state, version and executable
    Managers,

    /// Search packages across managers
    Search {
        /// Text to search for
        query: String,

        #[command(flatten)]
        filter: ManagerFilter,
    },

    /// List installed packages
    Installed {
        #[command(flatten)]
        filter: ManagerFilter,
    },

    /// List packages with a newer version available
    Updates {
        #[command(flatten)]
        filter: ManagerFilter,
    },

    /// Install a package
    Install {
        /// Manager name or alias (npm, pip, choco, ...)
        manager: String,
        /// Package identifier
        id: String,

        #[command(flatten)]
        options: OperationArgs,
    },

    /// Update an installed package
    Update {
        /// Manager name or alias
        manager: String,
        /// Package identifier
        id: String,

        #[command(flatten)]
        options: OperationArgs,
    },

    /// Uninstall a package
    Uninstall {
        /// Manager name or alias
        manager: String,
        /// Package identifier
        id: String,

        #[command(flatten)]
        options: OperationArgs,

        /// Also remove the package's data (where supported)
        #[arg(long, help_heading = "Operation")]
        remove_data: bool,
    },

    /// Queue and run every available update
    #[command(name = "update-all")]
    UpdateAll {
        #[command(flatten)]
        filter: ManagerFilter,

        #[command(flatten)]
        options: OperationArgs,
    },

    /// List, add or remove a manager's sources
    Sources {
        /// Manager name or alias
        manager: String,

        #[command(subcommand)]
        command: Option<SourcesCommand>,
    },

    /// Read and write settings
    Settings {
        #[command(subcommand)]
        command: Option<SettingsCommand>,
    },

    /// Print the non-default values of a saved install options document
    #[command(name = "options-diff")]
    OptionsDiff {
        /// JSON install options document
        file: PathBuf,
    },

    /// Print shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ManagerFilter {
    /// Only use this manager
    #[arg(short = 'm', long)]
    pub manager: Option<String>,
}

/// Options shared by install, update and uninstall
#[derive(Args, Debug, Clone, Default)]
pub struct OperationArgs {
    /// Start from a saved install options document
    #[arg(long = "options", value_name = "FILE", help_heading = "Operation")]
    pub options_file: Option<PathBuf>,

    /// Exact version to install
    #[arg(long, help_heading = "Operation")]
    pub version: Option<String>,

    /// Installation scope (local, global, user, machine)
    #[arg(long, help_heading = "Operation")]
    pub scope: Option<String>,

    /// Target architecture (x64, x86, arm64, ...)
    #[arg(long, help_heading = "Operation")]
    pub arch: Option<String>,

    /// Custom install location
    #[arg(long, help_heading = "Operation")]
    pub location: Option<String>,

    /// Run the manager elevated
    #[arg(long, help_heading = "Operation")]
    pub admin: bool,

    /// Let the manager prompt interactively
    #[arg(long, help_heading = "Operation")]
    pub interactive: bool,

    /// Skip the manager's integrity (hash) checks
    #[arg(long, help_heading = "Operation")]
    pub skip_hash_check: bool,

    /// Allow pre-release versions
    #[arg(long, help_heading = "Operation")]
    pub pre_release: bool,

    /// Extra parameters passed to the manager, split like a shell would
    #[arg(long, value_name = "PARAMS", allow_hyphen_values = true, help_heading = "Operation")]
    pub params: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum SourcesCommand {
    /// List the manager's sources
    List,
    /// Add a source
    Add {
        name: String,
        url: String,
    },
    /// Remove a source
    Remove {
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Print a setting
    Get {
        key: String,
        /// Entry of a dictionary setting (usually a manager name)
        #[arg(long)]
        item: Option<String>,
    },
    /// Store a setting; an empty value removes it
    Set {
        key: String,
        value: String,
        /// Entry of a dictionary setting (usually a manager name)
        #[arg(long)]
        item: Option<String>,
    },
    /// Show every stored setting
    List,
}

#[cfg(test)]
mod tests;
