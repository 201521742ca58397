use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "pgconverge")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Converge PostgreSQL databases, roles and grants through an RDS Data API endpoint", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Manifest path (default: ./pgconverge.toml, then the config directory)
    #[arg(short, long, global = true)]
    pub manifest: Option<String>,

    /// State file path (default: pgconverge.state.toml next to the manifest)
    #[arg(long, global = true)]
    pub state: Option<String>,

    /// Data API endpoint, overriding the manifest
    #[arg(long, env = "PGCONVERGE_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Preview what apply would change
    #[command(alias = "diff")]
    Plan(TargetArgs),

    /// Make the remote catalogs match the manifest
    Apply(ApplyArgs),

    /// Remove every object recorded in the state file
    Destroy(DestroyArgs),

    /// Show each managed object and whether it matches the manifest
    Status(TargetArgs),

    /// Adopt an existing object into the state file
    Import {
        /// Manifest address of the object (e.g. role.app)
        address: String,
    },

    /// Compare two JSON documents for semantic equivalence
    Equivalent(EquivalentArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct TargetArgs {
    /// Limit to a kind or one object (e.g. roles, role.app)
    pub target: Option<String>,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Limit to a kind or one object (e.g. roles, role.app)
    pub target: Option<String>,

    /// Show what would be done without doing it
    #[arg(short, long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Objects applied concurrently within a stage
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Keep applying later stages after a failure
    #[arg(long)]
    pub keep_going: bool,
}

#[derive(Args)]
pub struct DestroyArgs {
    /// Limit to a kind or one object (e.g. grants, grant.app_tables)
    pub target: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Show what would be removed without removing it
    #[arg(short, long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct EquivalentArgs {
    /// Desired document (file path, or - for stdin)
    pub desired: String,

    /// Remote document (file path)
    pub remote: String,

    /// Properties whose arrays compare as multisets
    #[arg(short, long, default_value = "environment")]
    pub unordered: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_diff_is_plan_alias() {
        let cli = Cli::try_parse_from(["pgconverge", "diff", "roles"]).unwrap();
        match cli.command {
            Command::Plan(args) => assert_eq!(args.target.as_deref(), Some("roles")),
            _ => panic!("expected plan"),
        }
    }

    #[test]
    fn test_apply_flags() {
        let cli = Cli::try_parse_from([
            "pgconverge",
            "--manifest",
            "db.toml",
            "apply",
            "-y",
            "-j",
            "2",
            "--keep-going",
            "role.app",
        ])
        .unwrap();
        assert_eq!(cli.manifest.as_deref(), Some("db.toml"));
        match cli.command {
            Command::Apply(args) => {
                assert!(args.yes);
                assert!(args.keep_going);
                assert!(!args.dry_run);
                assert_eq!(args.jobs, 2);
                assert_eq!(args.target.as_deref(), Some("role.app"));
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_equivalent_default_unordered() {
        let cli = Cli::try_parse_from(["pgconverge", "equivalent", "a.json", "b.json"]).unwrap();
        match cli.command {
            Command::Equivalent(args) => assert_eq!(args.unordered, ["environment"]),
            _ => panic!("expected equivalent"),
        }
    }
}
