//! Command-line interface for netlify-dev
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `dev`: Framework dev server behind the local proxy
//! - `serve`: Production build served locally
//!
//! `--telemetry-enable` / `--telemetry-disable` are top-level only: they
//! update the user settings and exit without running a command.

mod dev;
mod serve;

use std::time::Instant;

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use tracing::debug;

use crate::telemetry::{config_dir, install_traits, Telemetry, UserSettings};

pub use dev::DevCommand;
pub use serve::ServeCommand;

/// netlify-dev - Local development environment for Netlify sites
#[derive(Parser, Debug)]
#[command(name = "netlify-dev")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to netlify.toml config file
    #[arg(short, long, global = true, default_value = "netlify.toml")]
    pub config: String,

    /// Opt in to anonymous usage telemetry
    #[arg(long, conflicts_with = "telemetry_disable")]
    pub telemetry_enable: bool,

    /// Opt out of anonymous usage telemetry
    #[arg(long)]
    pub telemetry_disable: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the local development server
    Dev(DevCommand),

    /// Build the project and serve the output locally
    Serve(ServeCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Dev(_) => "dev",
            Commands::Serve(_) => "serve",
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        if let (Some(command), Some(flag)) = (&self.command, self.telemetry_flag()) {
            bail!(
                "{} cannot be combined with the {} command; run it on its own",
                flag,
                command.name()
            );
        }

        if self.telemetry_disable {
            return self.set_telemetry(false).await;
        }
        if self.telemetry_enable {
            return self.set_telemetry(true).await;
        }

        let Some(command) = &self.command else {
            Cli::command().print_help()?;
            return Ok(());
        };

        print_banner();

        let telemetry = match load_user_settings().await {
            Ok(settings) => {
                let mut telemetry = Telemetry::new(&settings);
                if settings.is_new() {
                    telemetry.identify(install_traits());
                }
                Some(telemetry)
            }
            Err(e) => {
                debug!("Telemetry unavailable: {:#}", e);
                None
            }
        };

        let start = Instant::now();
        let result = match command {
            Commands::Dev(cmd) => cmd.execute(&self.config).await,
            Commands::Serve(cmd) => cmd.execute(&self.config).await,
        };

        if let Some(mut telemetry) = telemetry {
            telemetry.track(
                "command",
                json!({
                    "command": command.name(),
                    "duration": start.elapsed().as_millis() as u64,
                    "status": if result.is_ok() { "success" } else { "error" },
                }),
            );
            telemetry.flush().await;
        }

        result
    }

    fn telemetry_flag(&self) -> Option<&'static str> {
        if self.telemetry_enable {
            Some("--telemetry-enable")
        } else if self.telemetry_disable {
            Some("--telemetry-disable")
        } else {
            None
        }
    }

    /// Persist the telemetry opt-in and report it
    async fn set_telemetry(&self, enabled: bool) -> Result<()> {
        let mut settings = load_user_settings().await?;
        settings.telemetry_disabled = !enabled;
        settings.save().await?;

        if enabled {
            eprintln!("{}", "Netlify CLI telemetry has been enabled".green());
            eprintln!("You can disable it anytime with the --telemetry-disable flag");

            let mut telemetry = Telemetry::new(&settings);
            telemetry.track("user_telemetryEnabled", json!({}));
            telemetry.flush().await;
        } else {
            eprintln!("{}", "Netlify CLI telemetry has been disabled".yellow());
            eprintln!("You can renable it anytime with the --telemetry-enable flag");
        }

        debug!("Updated {}", settings.path().display());
        Ok(())
    }
}

async fn load_user_settings() -> Result<UserSettings> {
    UserSettings::load_or_init(&config_dir()?).await
}

/// Print the netlify-dev banner
fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "◈".cyan(),
        "Netlify Dev".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_telemetry_flags_conflict() {
        let result = Cli::try_parse_from([
            "netlify-dev",
            "--telemetry-enable",
            "--telemetry-disable",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_telemetry_flag_without_command() {
        let cli = Cli::try_parse_from(["netlify-dev", "--telemetry-disable"]).unwrap();
        assert!(cli.telemetry_disable);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_telemetry_flags_are_not_subcommand_flags() {
        for flag in ["--telemetry-disable", "--telemetry-enable"] {
            let result = Cli::try_parse_from(["netlify-dev", "dev", flag]);
            assert!(result.is_err(), "{} accepted after a subcommand", flag);
        }
    }

    #[tokio::test]
    async fn test_telemetry_flag_with_command_is_rejected() {
        let cli = Cli::try_parse_from(["netlify-dev", "--telemetry-disable", "dev"]).unwrap();

        let err = cli.execute().await.unwrap_err();
        assert!(err
            .to_string()
            .contains("--telemetry-disable cannot be combined with the dev command"));
    }

    #[test]
    fn test_parses_dev_flags() {
        let cli = Cli::try_parse_from([
            "netlify-dev",
            "dev",
            "--port",
            "9000",
            "--target-port",
            "5173",
            "--framework",
            "#static",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Dev(dev)) => {
                assert_eq!(dev.port, Some(9000));
                assert_eq!(dev.target_port, Some(5173));
                assert_eq!(dev.framework.as_deref(), Some("#static"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
