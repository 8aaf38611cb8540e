mod clock;
mod console;
mod cpu;
mod debugger;
mod error;
mod program;
mod util;
mod view;

use clap::Parser;
use clock::{Governor, RunStatus};
use console::Terminal;
use debugger::{Config, Debugger, Interrupt};
use std::{
    io::IsTerminal,
    path::PathBuf,
    sync::{Arc, OnceLock},
};
use view::DisplayMode;

#[derive(Parser)]
#[command(about = "An interactive debugger for the KRIS 8-bit computer.")]
struct Args {
    /// Program loaded at address 0, a binary image unless `--assembly` is given
    program: Option<PathBuf>,

    /// Treat the program as assembly source
    #[arg(short, long)]
    assembly: bool,

    /// Where the session log is written when quitting, `.log` is appended if missing
    #[arg(short, long, default_value = Config::DEFAULT_LOG_FILE)]
    logfile: String,

    /// Start with the display in ASCII view
    #[arg(short, long)]
    display: bool,

    /// Clock speed in Hz
    #[arg(long, default_value_t = Config::DEFAULT_CLOCK_HZ, value_parser = clock_speed)]
    clock: f64,

    // https://docs.rs/tracing-subscriber/0.3.16/tracing_subscriber/filter/struct.EnvFilter.html#example-syntax
    // Session log entries are emitted at 'info', '--log-level debug' also traces every instruction
    #[arg(long)]
    log_level: Option<String>,
}

fn clock_speed(text: &str) -> Result<f64, error::Error> {
    debugger::parse_clock_speed(text).ok_or_else(|| error::Error::InvalidClockSpeed(text.to_string()))
}

static SIGINT: OnceLock<Interrupt> = OnceLock::new();

extern "C" fn handle_sigint(_: libc::c_int) {
    if let Some(interrupt) = SIGINT.get() {
        interrupt.trigger();
    }
}

/// Route Ctrl+C to `interrupt`, and keep Ctrl+Z and Ctrl+\ from stopping the debugger.
fn install_signal_handlers(interrupt: Interrupt) -> bool {
    let _ = SIGINT.set(interrupt);
    let handler = handle_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t;

    // SAFETY: the handler only performs an atomic store
    unsafe {
        libc::signal(libc::SIGINT, handler) != libc::SIG_ERR
            && libc::signal(libc::SIGTSTP, libc::SIG_IGN) != libc::SIG_ERR
            && libc::signal(libc::SIGQUIT, libc::SIG_IGN) != libc::SIG_ERR
    }
}

fn main() {
    let args = Args::parse();

    // Set up the logger
    let log_level = args.log_level.unwrap_or_else(|| "info".to_string());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .with_target(false) // Dont display 'kris_emu' for every span
        .without_time()
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to set default subscriber: {}", err);
        std::process::exit(1);
    }

    let interrupt = Interrupt::new();
    if !install_signal_handlers(interrupt.clone()) {
        tracing::error!("failed to install signal handlers");
        std::process::exit(1);
    }

    let status = Arc::new(RunStatus::default());
    // Run time and uptime go to the title bar
    let show_clock = std::io::stdout().is_terminal();
    let mut governor = Governor::spawn(Arc::clone(&status), Governor::DEFAULT_PERIOD, move |tick| {
        tracing::trace!(
            elapsed = ?tick.elapsed,
            running = tick.running,
            run_time = ?tick.run_time,
            "tick"
        );
        if show_clock {
            if let Err(err) = console::write_title(&mut std::io::stdout().lock(), &tick) {
                tracing::debug!("failed to update the clock: {}", err);
            }
        }
    });

    let config = Config {
        log_path: Config::log_file(&args.logfile),
        clock_hz: args.clock,
        display: if args.display {
            DisplayMode::Ascii
        } else {
            DisplayMode::Disabled
        },
    };
    let mut debugger = Debugger::new(Terminal::new(), config, interrupt, status);

    match args.program.as_deref() {
        Some(program) if !args.assembly => {
            debugger.load_binary(program);
            debugger.reset();
        }
        Some(program) => {
            debugger.reset();
            debugger.load_source(program);
        }
        None => debugger.reset(),
    }

    debugger.run_loop();
    tracing::debug!(
        "session ended with {} log entries",
        debugger.session().log.entries().len()
    );

    governor.stop();
}
