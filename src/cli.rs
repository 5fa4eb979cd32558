//! CLI command definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hsc_core::ObjectKey;

/// HTTP source controller
#[derive(Parser, Debug)]
#[command(name = "hsc")]
#[command(version)]
#[command(about = "Mirror declared HTTP sources into servable, content-addressed artifacts")]
#[command(
    long_about = "Fetches the URL of every declared Http source, archives the payload under its SHA-256 revision, records an Artifact for it, and serves the archives over HTTP."
)]
pub struct Cli {
    /// Configuration file (TOML). HSC_* environment variables override it.
    #[arg(short, long, global = true, env = "HSC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or update sources from a YAML manifest
    Apply {
        /// Manifest file, one or more `---` separated documents
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Reconcile one source now and print the outcome
    Reconcile {
        /// Source key, `<namespace>/<name>` or `<name>`
        key: ObjectKey,
    },

    /// Run the resync loop and the artifact server until Ctrl+C
    Run,

    /// Print a source and its artifact record as JSON
    Status {
        /// Source key, `<namespace>/<name>` or `<name>`
        key: ObjectKey,
    },

    /// Mark a source as deleted
    Delete {
        /// Source key, `<namespace>/<name>` or `<name>`
        key: ObjectKey,
    },
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;

    #[test]
    fn test_parse_reconcile_key() {
        let cli = Cli::try_parse_from(["hsc", "reconcile", "team/site"]).unwrap();
        match cli.command {
            Commands::Reconcile { key } => assert_eq!(key, ObjectKey::new("team", "site")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_bare_name_uses_default_namespace() {
        let cli = Cli::try_parse_from(["hsc", "status", "site", "--config", "hsc.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("hsc.toml")));
        assert!(matches!(cli.command, Commands::Status { key } if key == ObjectKey::new("default", "site")));
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        assert!(Cli::try_parse_from(["hsc", "delete", "a/b/c"]).is_err());
    }

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
