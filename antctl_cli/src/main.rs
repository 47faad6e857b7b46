use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use antctl_config::Config;
use antctl_core::Scheduler;
use antctl_traits::MonotonicClock;
use clap::Parser;
use crossbeam_channel as xch;
use eyre::{Result, WrapErr};

mod backend;
mod cli;
mod console;
mod error_fmt;
mod inspect;
mod logging;

use cli::{Cli, Commands, JSON_MODE};
use console::{Console, Input};
use logging::LogControl;

fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
    let cfg: Config = toml::from_str(&text).wrap_err("invalid configuration")?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

/// Forward stdin lines to the console. The thread is left detached: a
/// blocking read cannot be interrupted, and it ends with the process.
fn spawn_stdin_reader(tx: xch::Sender<Input>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(Input::Line(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(Input::Closed);
    });
}

fn run_console(cfg: &Config, log: &LogControl, no_scheduler: bool) -> Result<()> {
    let board = Arc::new(backend::build_board(cfg)?);
    board.startup()?;

    let (tx, rx) = xch::unbounded();
    let ctrl_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrl_tx.send(Input::Interrupt);
    })
    .wrap_err("failed to install Ctrl-C handler")?;
    spawn_stdin_reader(tx);

    let scheduler = (!no_scheduler).then(|| {
        Scheduler::spawn(
            board.clone(),
            board.config().control,
            MonotonicClock::new(),
        )
    });

    let stdout = std::io::stdout();
    let result = Console::new(&board, &rx, log, stdout.lock()).run();
    if let Some(s) = scheduler {
        s.stop();
    }
    result
}

fn run(cli: Cli) -> Result<()> {
    color_eyre::install()?;
    let cfg = load_config(cli.config.as_deref())?;
    let log = logging::init(cli.log_level.as_deref(), cli.json, &cfg.logging)?;
    tracing::debug!(config = ?cli.config, "configuration loaded");

    match cli.cmd {
        Commands::Console { no_scheduler } => run_console(&cfg, &log, no_scheduler),
        Commands::Wiring { swaps } => inspect::wiring(&cfg, swaps, cli.json),
        Commands::SelfCheck => inspect::self_check(&cfg, cli.json),
    }
}

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "antctl failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", error_fmt::format_error_json(&e));
        } else {
            eprintln!("{}", error_fmt::humanize(&e));
        }
        std::process::exit(error_fmt::exit_code_for_error(&e));
    }
}
