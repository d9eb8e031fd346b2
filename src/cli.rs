use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "azdo")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative management of Azure DevOps projects", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/azdo/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Organization URL, e.g. https://dev.azure.com/acme
    #[arg(long, global = true, env = "AZDO_ORG_SERVICE_URL", value_name = "URL")]
    pub org_url: Option<String>,

    /// Personal access token
    #[arg(
        long,
        global = true,
        env = "AZDO_PERSONAL_ACCESS_TOKEN",
        hide_env_values = true,
        value_name = "TOKEN"
    )]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change
    Plan(ManifestArgs),

    /// Create or update the projects in the manifest
    Apply(ApplyArgs),

    /// Delete the manifest projects recorded in state
    Destroy(DestroyArgs),

    /// Inspect or delete a single project
    #[command(subcommand)]
    Project(ProjectCommand),

    /// List all projects in the organization
    Projects,

    /// List the process templates available in the organization
    Processes,

    /// Show configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Manifest Commands
// ============================================================================

#[derive(Args)]
pub struct ManifestArgs {
    /// Manifest file
    #[arg(short, long, default_value = "azdo.toml", value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Dry run - show what would be done
    #[arg(short, long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of projects reconciled in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Args)]
pub struct DestroyArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Wait for each delete to finish
    #[arg(short, long)]
    pub wait: bool,
}

// ============================================================================
// Project Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ProjectCommand {
    /// Show a project by name or id
    Show {
        /// Project name or id
        #[arg(value_name = "NAME_OR_ID")]
        target: String,
    },

    /// Delete a project by id
    Delete {
        /// Project id (GUID)
        id: String,

        /// Wait for the delete to finish
        #[arg(short, long)]
        wait: bool,
    },
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Print the config file location
    Path,
}
