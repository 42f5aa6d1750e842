#![forbid(unsafe_code)]

mod cli;
mod output;
mod session;

use anyhow::{Context, Result};
use cli::{CliArgs, CliCommand};
use focusguard::config::EnforcementConfiguration;
use focusguard::constants::APP_SUBSYSTEM;
use focusguard::logging::{self, EventLogger};
use focusguard::platform::system::find_session_pids;
use focusguard::platform::{SystemPermissionGate, SystemProcessDirectory};
use focusguard::store::PersistentStore;
use focusguard::EnforcementController;
use output::StatusOutput;
use std::sync::Arc;

fn main() -> Result<()> {
    let args = cli::parse_args()?;

    let config = EnforcementConfiguration::load_or_default(args.config.as_deref())?;

    if let Err(e) = logging::init_backend(APP_SUBSYSTEM) {
        // No log backend is installed, so structured events are dropped.
        // Command output and errors still reach stdout/stderr.
        if args.command == CliCommand::Run {
            eprintln!("Warning: {:#}", e);
        }
    }

    if args.command.is_mutating() {
        let sessions = find_session_pids();
        if !sessions.is_empty() {
            anyhow::bail!(
                "An enforcement session is running (PID {}); use its shell instead.",
                session::join_pids(&sessions)
            );
        }
    }

    let controller = build_controller(&args, &config)?;
    dispatch(args.command, controller)
}

fn build_controller(args: &CliArgs, config: &EnforcementConfiguration) -> Result<EnforcementController> {
    let state_path = config
        .state_path(args.state.as_deref())
        .context("Failed to resolve the settings file location")?;

    Ok(EnforcementController::new(
        PersistentStore::new(state_path),
        Arc::new(SystemProcessDirectory::new()),
        Arc::new(SystemPermissionGate::new()),
        config.monitor_settings(),
        EventLogger::new(config.logging.level),
    ))
}

fn dispatch(command: CliCommand, mut controller: EnforcementController) -> Result<()> {
    match command {
        CliCommand::Status { json } => {
            let status = StatusOutput {
                report: controller.status(),
                last_state: controller.last_known_state(),
                sessions: find_session_pids(),
                state_path: controller.state_path().display().to_string(),
            };
            if json {
                println!("{}", output::format_status_json(&status)?);
            } else {
                println!("{}", output::format_status_human(&status));
            }
        }
        CliCommand::Add { path } => {
            let application = controller
                .add_blocked_application(&path)
                .with_context(|| format!("Failed to add {}", path.display()))?;
            println!("Blocked {} ({})", application.display_name, application.identifier);
        }
        CliCommand::Remove { identifier } => {
            controller
                .remove_blocked_application(&identifier)
                .with_context(|| format!("Failed to remove {}", identifier))?;
            println!("Removed {}", identifier);
        }
        CliCommand::SetPassword => {
            let (password, confirmation) =
                cli::read_new_password(Some(focusguard::constants::PASSWORD_ENV_VAR))?;
            controller.set_password(&password, &confirmation)?;
            println!("Password set.");
        }
        CliCommand::ResetPassword => {
            let current = cli::read_password("Current password: ")?;
            let (password, confirmation) = cli::read_new_password(None)?;
            controller.reset_password(&current, &password, &confirmation)?;
            println!("Password has been reset.");
        }
        CliCommand::FactoryReset => {
            let password = cli::read_password("Password: ")?;
            controller.factory_reset(&password)?;
            println!("All settings have been erased.");
        }
        CliCommand::Run => session::run_session(controller)?,
    }
    Ok(())
}
