//! CLI argument parsing module
//!
//! Handles command-line interface using clap, including:
//! - One-shot commands (status, add, remove, password management, reset)
//! - The long-lived `run` session
//! - Global configuration and state file overrides
//! - Password input from the environment or a masked prompt

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use focusguard::constants::{NEW_PASSWORD_ENV_VAR, PASSWORD_ENV_VAR, RUN_SUBCOMMAND};
use std::path::PathBuf;
use zeroize::Zeroizing;

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Status { json: bool },
    Add { path: PathBuf },
    Remove { identifier: String },
    SetPassword,
    ResetPassword,
    FactoryReset,
    Run,
}

impl CliCommand {
    /// Commands that write the state file
    pub fn is_mutating(&self) -> bool {
        !matches!(self, CliCommand::Status { .. } | CliCommand::Run)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub config: Option<PathBuf>,
    pub state: Option<PathBuf>,
    pub command: CliCommand,
}

/// Version string shown by `--version`
const VERSION: &str = concat!(env!("FOCUSGUARD_VERSION"), " (", env!("GIT_HASH"), ")");

pub fn build_command() -> Command {
    Command::new("focusguard")
        .version(VERSION)
        .about("Keep distracting applications closed")
        .long_about(
            "Password-protected application blocker. Blocked applications are asked to quit \
             while enforcement is active and forcibly terminated if they keep running.",
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Configuration file (TOML)")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("state")
                .long("state")
                .value_name("FILE")
                .help("Settings file, overriding the configured location")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .subcommand(
            Command::new("status")
                .about("Show blocklist, password and session status")
                .arg(
                    Arg::new("json")
                        .short('j')
                        .long("json")
                        .help("Output in JSON format")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("add")
                .about("Add an application bundle to the blocklist")
                .arg(
                    Arg::new("path")
                        .value_name("PATH")
                        .help("Path to the .app bundle")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove an application from the blocklist")
                .arg(
                    Arg::new("identifier")
                        .value_name("IDENTIFIER")
                        .help("Identifier shown by `status` (the bundle path)")
                        .required(true),
                ),
        )
        .subcommand(Command::new("set-password").about("Set the password for the first time"))
        .subcommand(Command::new("reset-password").about("Change the password"))
        .subcommand(
            Command::new("factory-reset")
                .about("Erase the password, blocklist and every other setting"),
        )
        .subcommand(
            Command::new(RUN_SUBCOMMAND)
                .about("Start an enforcement session with an interactive shell"),
        )
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    from_matches(&build_command().get_matches())
}

fn from_matches(matches: &ArgMatches) -> Result<CliArgs> {
    let Some((name, sub)) = matches.subcommand() else {
        anyhow::bail!("No command given; see --help");
    };

    let command = match name {
        "status" => CliCommand::Status {
            json: sub.get_flag("json"),
        },
        "add" => CliCommand::Add {
            path: sub
                .get_one::<PathBuf>("path")
                .cloned()
                .context("Missing application path")?,
        },
        "remove" => CliCommand::Remove {
            identifier: sub
                .get_one::<String>("identifier")
                .cloned()
                .context("Missing identifier")?,
        },
        "set-password" => CliCommand::SetPassword,
        "reset-password" => CliCommand::ResetPassword,
        "factory-reset" => CliCommand::FactoryReset,
        RUN_SUBCOMMAND => CliCommand::Run,
        other => anyhow::bail!("Unknown command: {}", other),
    };

    // Global flags are propagated down to the chosen subcommand
    let global_path = |id: &str| {
        sub.get_one::<PathBuf>(id)
            .or_else(|| matches.get_one::<PathBuf>(id))
            .cloned()
    };

    Ok(CliArgs {
        config: global_path("config"),
        state: global_path("state"),
        command,
    })
}

/// Read a password from `FOCUSGUARD_PASSWORD`, else prompt without echo
pub fn read_password(prompt: &str) -> Result<Zeroizing<String>> {
    read_secret(PASSWORD_ENV_VAR, prompt)
}

/// New password plus confirmation. `FOCUSGUARD_NEW_PASSWORD` (or
/// `FOCUSGUARD_PASSWORD` during first-time setup) skips both prompts.
pub fn read_new_password(fallback_env: Option<&str>) -> Result<(Zeroizing<String>, Zeroizing<String>)> {
    for var in std::iter::once(NEW_PASSWORD_ENV_VAR).chain(fallback_env) {
        if let Ok(value) = std::env::var(var) {
            return Ok((Zeroizing::new(value.clone()), Zeroizing::new(value)));
        }
    }

    let password = Zeroizing::new(
        rpassword::prompt_password("New password: ").context("Failed to read password")?,
    );
    let confirmation = Zeroizing::new(
        rpassword::prompt_password("Confirm password: ").context("Failed to read password")?,
    );
    Ok((password, confirmation))
}

/// True when a password is supplied through the environment
pub fn password_from_env() -> bool {
    std::env::var_os(PASSWORD_ENV_VAR).is_some()
}

fn read_secret(env_var: &str, prompt: &str) -> Result<Zeroizing<String>> {
    if let Ok(value) = std::env::var(env_var) {
        return Ok(Zeroizing::new(value));
    }
    rpassword::prompt_password(prompt)
        .map(Zeroizing::new)
        .context("Failed to read password")
}
