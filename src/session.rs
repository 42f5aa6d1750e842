//! Long-lived enforcement session
//!
//! Hosts the controller for as long as the process lives and exposes it
//! through a line-oriented shell on stdin. SIGINT/SIGTERM end the session;
//! closing stdin does not, so the session can run unattended. Passwords for
//! toggles are read from the same input as commands.

use crate::cli::{password_from_env, read_new_password, read_password};
use crate::output::{format_blocklist, format_status_human, StatusOutput};
use anyhow::{Context, Result};
use focusguard::constants::PASSWORD_ENV_VAR;
use focusguard::platform::system::find_session_pids;
use focusguard::{EnforcementController, EnforcementError};
use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

/// How often the shell loop checks for signals while waiting on input
const INPUT_POLL: Duration = Duration::from_millis(200);

/// Attempts allowed at the unlock prompt
const UNLOCK_ATTEMPTS: usize = 3;

const HELP: &str = "\
Commands:
  status              Show enforcement status
  list                List blocked applications
  add <PATH>          Block an application bundle
  remove <IDENTIFIER> Unblock an application
  enable | disable    Toggle blocking (password required)
  downtime on|off     Toggle downtime mode (password required)
  help                Show this help
  quit                End the session";

/// One parsed shell line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Status,
    List,
    Add(String),
    Remove(String),
    Blocking(bool),
    Downtime(bool),
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_shell_line(line: &str) -> ShellCommand {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match (word, rest) {
        ("", _) => ShellCommand::Empty,
        ("status", "") => ShellCommand::Status,
        ("list", "") => ShellCommand::List,
        ("add", path) if !path.is_empty() => ShellCommand::Add(path.to_string()),
        ("remove", id) if !id.is_empty() => ShellCommand::Remove(id.to_string()),
        ("enable", "") => ShellCommand::Blocking(true),
        ("disable", "") => ShellCommand::Blocking(false),
        ("downtime", "on") => ShellCommand::Downtime(true),
        ("downtime", "off") => ShellCommand::Downtime(false),
        ("help", _) | ("?", _) => ShellCommand::Help,
        ("quit", "") | ("exit", "") => ShellCommand::Quit,
        _ => ShellCommand::Unknown(line.to_string()),
    }
}

/// Run the session until the user quits or a termination signal arrives
pub fn run_session(mut controller: EnforcementController) -> Result<()> {
    let others = find_session_pids();
    if !others.is_empty() {
        anyhow::bail!(
            "An enforcement session is already running (PID {}), please stop it first.",
            join_pids(&others)
        );
    }

    let password = authenticate(&mut controller)?;

    if !controller.tutorial_shown() {
        println!("Blocked applications are closed while blocking or downtime mode is on.");
        println!("Type `help` for the list of commands.\n");
        if let Err(e) = controller.set_tutorial_shown(true) {
            eprintln!("Warning: {}", e);
        }
    }

    resume_last_state(&mut controller, &password);
    drop(password);

    let interrupted = Arc::new(AtomicBool::new(false));
    let _ = signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&interrupted));
    let _ = signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&interrupted));

    let input = InputReader::spawn(|| std::io::stdin().lock(), std::io::stdin().is_terminal())?;
    let mut shell = Shell {
        controller: &mut controller,
        input: &input,
        interrupted: &interrupted,
    };
    shell.run();

    println!("Ending enforcement session...");
    controller
        .shutdown()
        .context("Failed to record session state")?;
    Ok(())
}

/// Unlock an existing password or set one up on first run
fn authenticate(controller: &mut EnforcementController) -> Result<Zeroizing<String>> {
    if !controller.has_password() {
        println!("No password is set. Choose one to protect the enforcement settings.");
        let (password, confirmation) = read_new_password(Some(PASSWORD_ENV_VAR))?;
        controller.set_password(&password, &confirmation)?;
        println!("Password set.");
        return Ok(password);
    }

    let attempts = if password_from_env() { 1 } else { UNLOCK_ATTEMPTS };
    for _ in 0..attempts {
        let password = read_password("Password: ")?;
        match controller.unlock(&password) {
            Ok(()) => return Ok(password),
            Err(EnforcementError::IncorrectPassword) => eprintln!("Incorrect password."),
            Err(e) => return Err(e.into()),
        }
    }
    anyhow::bail!("Too many incorrect password attempts")
}

/// Re-enable whatever the previous session left on
fn resume_last_state(controller: &mut EnforcementController, password: &str) {
    let last = controller.last_known_state();
    if last.blocking_enabled {
        report("Blocking resumed", controller.set_blocking_enabled(true, password));
    }
    if last.downtime_enabled {
        report("Downtime mode resumed", controller.set_downtime_mode(true, password));
    }
}

/// The interactive half of a session
struct Shell<'a> {
    controller: &'a mut EnforcementController,
    input: &'a InputReader,
    interrupted: &'a AtomicBool,
}

impl Shell<'_> {
    fn run(&mut self) {
        let mut stdin_open = true;

        while !self.interrupted.load(Ordering::Relaxed) {
            if !stdin_open {
                std::thread::sleep(INPUT_POLL);
                continue;
            }

            prompt();
            match self.input.read(InputRequest::Line, self.interrupted) {
                Some(Input::Line(line)) => {
                    if !self.execute(parse_shell_line(&line)) {
                        break;
                    }
                }
                Some(Input::Closed) => {
                    // Keep enforcing without a shell until signalled
                    stdin_open = false;
                    println!();
                }
                Some(Input::Failed(e)) => {
                    eprintln!("Error: {}", e);
                    stdin_open = false;
                }
                Some(Input::Secret(_)) => {}
                None => break,
            }
        }
    }

    /// Returns false when the session should end
    fn execute(&mut self, command: ShellCommand) -> bool {
        match command {
            ShellCommand::Status => {
                let status = StatusOutput {
                    report: self.controller.status(),
                    last_state: self.controller.last_known_state(),
                    sessions: vec![std::process::id()],
                    state_path: self.controller.state_path().display().to_string(),
                };
                println!("{}", format_status_human(&status));
            }
            ShellCommand::List => println!("{}", format_blocklist(&self.controller.status())),
            ShellCommand::Add(path) => match self.controller.add_blocked_application(Path::new(&path)) {
                Ok(application) => println!(
                    "Blocked {} ({})",
                    application.display_name, application.identifier
                ),
                Err(e) => eprintln!("Error: {}", e),
            },
            ShellCommand::Remove(identifier) => report(
                "Removed",
                self.controller.remove_blocked_application(&identifier),
            ),
            ShellCommand::Blocking(enabled) => {
                if let Some(password) = self.password() {
                    let message = if enabled { "Blocking enabled" } else { "Blocking disabled" };
                    report(message, self.controller.set_blocking_enabled(enabled, &password));
                }
            }
            ShellCommand::Downtime(enabled) => {
                if let Some(password) = self.password() {
                    let message = if enabled { "Downtime mode on" } else { "Downtime mode off" };
                    report(message, self.controller.set_downtime_mode(enabled, &password));
                }
            }
            ShellCommand::Help => println!("{}", HELP),
            ShellCommand::Quit => return false,
            ShellCommand::Empty => {}
            ShellCommand::Unknown(line) => eprintln!("Unknown command: {} (try `help`)", line),
        }
        true
    }

    /// Password from the environment, else read through the shell's own input
    fn password(&self) -> Option<Zeroizing<String>> {
        if password_from_env() {
            return read_password("Password: ").ok();
        }
        match self
            .input
            .read(InputRequest::Secret("Password: ".to_string()), self.interrupted)
        {
            Some(Input::Secret(password)) => Some(password),
            Some(Input::Closed) => {
                eprintln!("Error: input closed before a password was entered");
                None
            }
            Some(Input::Failed(e)) => {
                eprintln!("Error: {}", e);
                None
            }
            Some(Input::Line(_)) | None => None,
        }
    }
}

fn report(success: &str, result: focusguard::Result<()>) {
    match result {
        Ok(()) => println!("{}", success),
        Err(EnforcementError::PermissionRequired) => eprintln!(
            "Error: permission required. Grant access in System Settings, then try again."
        ),
        Err(e) => eprintln!("Error: {}", e),
    }
}

fn prompt() {
    print!("focusguard> ");
    let _ = std::io::stdout().flush();
}

/// What the shell asks the input thread to read next
enum InputRequest {
    Line,
    Secret(String),
}

#[derive(Debug)]
enum Input {
    Line(String),
    Secret(Zeroizing<String>),
    Closed,
    Failed(String),
}

/// Reads stdin on a worker thread, one request at a time, so the shell can
/// watch for signals while blocked. Commands and passwords come from the same
/// reader and never race for a line.
struct InputReader {
    requests: mpsc::Sender<InputRequest>,
    responses: mpsc::Receiver<Input>,
}

impl InputReader {
    /// `open` runs on the worker thread; `interactive` selects terminal
    /// password entry over reading the secret from `open`'s source
    fn spawn<F, R>(open: F, interactive: bool) -> Result<Self>
    where
        F: FnOnce() -> R + Send + 'static,
        R: BufRead,
    {
        let (requests, request_rx) = mpsc::channel();
        let (response_tx, responses) = mpsc::channel();

        std::thread::Builder::new()
            .name("focusguard-stdin".to_string())
            .spawn(move || {
                let mut source = open();
                for request in request_rx {
                    let input = match request {
                        InputRequest::Line => read_line(&mut source),
                        InputRequest::Secret(prompt) => {
                            read_secret(&mut source, &prompt, interactive)
                        }
                    };
                    let closed = matches!(input, Input::Closed | Input::Failed(_));
                    if response_tx.send(input).is_err() || closed {
                        break;
                    }
                }
            })
            .context("Failed to start input thread")?;

        Ok(Self { requests, responses })
    }

    /// `None` once `interrupted` is set
    fn read(&self, request: InputRequest, interrupted: &AtomicBool) -> Option<Input> {
        if self.requests.send(request).is_err() {
            return Some(Input::Closed);
        }
        while !interrupted.load(Ordering::Relaxed) {
            match self.responses.recv_timeout(INPUT_POLL) {
                Ok(input) => return Some(input),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Some(Input::Closed),
            }
        }
        None
    }
}

fn read_line(source: &mut impl BufRead) -> Input {
    let mut line = String::new();
    match source.read_line(&mut line) {
        Ok(0) => Input::Closed,
        Ok(_) => {
            let trimmed = line.trim_end_matches(['\n', '\r']).len();
            line.truncate(trimmed);
            Input::Line(line)
        }
        Err(e) => Input::Failed(format!("Failed to read input: {}", e)),
    }
}

fn read_secret(source: &mut impl BufRead, prompt: &str, interactive: bool) -> Input {
    let secret = if interactive {
        rpassword::prompt_password(prompt)
    } else {
        print!("{}", prompt);
        let _ = std::io::stdout().flush();
        rpassword::read_password_from_bufread(source)
    };
    match secret {
        Ok(secret) => Input::Secret(Zeroizing::new(secret)),
        Err(e) => Input::Failed(format!("Failed to read password: {}", e)),
    }
}

pub fn join_pids(pids: &[u32]) -> String {
    pids.iter().map(u32::to_string).collect::<Vec<_>>().join(", ")
}
