//! Entrypoint for CLI
use std::{error::Error, time::Instant};

use log::{error, info, LevelFilter};
use quirk8::{constants::DELAY_FREQUENCY, prelude::*, Clock, Hz, IMPL_VERSION};

use self::{
    config::AppConfig,
    error::AppError,
    terminal::{Keyboard, Poll, Terminal},
};

mod config;
mod error;
mod terminal;

static USAGE: &str = r#"
usage: quirk8 run ROM [CONFIG]
       quirk8 headless ROM [STEPS] [CONFIG]

commands:
    run         Run the ROM in the terminal
    headless    Execute a number of steps without a terminal, and print the display

CONFIG is an optional YAML file with machine quirks and key bindings.

keys:
    0-9 a-f     Keypad, unless remapped in the config
    Esc         Quit

examples:
    quirk8 run breakout.ch8
    quirk8 run breakout.ch8 quirks.yaml
    quirk8 headless maze.ch8 5000
    quirk8 headless maze.ch8 5000 quirks.yaml
"#;

/// Steps executed by `headless` when none are given.
const DEFAULT_HEADLESS_STEPS: usize = 1000;

fn load_config(config_path: Option<&str>) -> Result<AppConfig, AppError> {
    match config_path {
        Some(path) => AppConfig::from_file(path),
        None => Ok(AppConfig::default()),
    }
}

fn run_terminal(filepath: &str, config_path: Option<&str>) -> Result<(), AppError> {
    let config = load_config(config_path)?;

    let mut vm = Chip8Vm::new(config.vm);
    vm.load_program_file(filepath)?;

    let runner = Runner::spawn(vm)?;
    let mut keyboard = Keyboard::new(config.keys, config.key_hold_frames);
    let mut clock = Clock::new(Hz(DELAY_FREQUENCY));

    {
        let mut terminal = Terminal::open()?;

        while runner.is_running() {
            match keyboard.poll()? {
                Poll::Quit => break,
                Poll::Key(key) => runner.set_key(key),
                Poll::Idle => {}
            }

            runner.frame(|vm| terminal.draw(vm))?;
            clock.wait();
        }
    }

    // The fault, if any, is reported after the terminal is restored.
    runner.stop()?;
    info!("done");

    Ok(())
}

fn run_headless(
    filepath: &str,
    step_count: usize,
    config_path: Option<&str>,
) -> Result<(), AppError> {
    let config = load_config(config_path)?;

    let mut vm = Chip8Vm::new(config.vm);
    vm.load_program_file(filepath)?;

    let start = Instant::now();
    let result = vm.run_steps(step_count);
    let end = Instant::now();

    println!(
        "time taken: {}ms",
        end.duration_since(start).as_nanos() as f64 / 1000000.0
    ); // to millis
    println!("{}", vm.dump_display()?);

    if let Ok(Flow::KeyWait) = result {
        println!("stopped waiting for key input at {:04X}", vm.pc());
    }

    result?;

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    if let Err(err) = simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Warn)
        .env()
        .init()
    {
        eprintln!("failed to initialise logger: {err}");
    }

    let result = match parse_args(std::env::args().skip(1)) {
        Some(Cmd::Run { filepath, config }) => run_terminal(&filepath, config.as_deref()),
        Some(Cmd::Headless {
            filepath,
            step_count,
            config,
        }) => run_headless(&filepath, step_count, config.as_deref()),
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    };

    if let Err(err) = result {
        error!("{err}");
        return Err(err.into());
    }

    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Option<Cmd> {
    let cmd = args.next()?;
    let filepath = args.next()?;

    match cmd.as_str() {
        "run" => Some(Cmd::Run {
            filepath,
            config: args.next(),
        }),
        "headless" => Some(Cmd::Headless {
            filepath,
            step_count: match args.next() {
                Some(arg) => arg.parse().ok()?,
                None => DEFAULT_HEADLESS_STEPS,
            },
            config: args.next(),
        }),
        _ => None,
    }
}

fn print_usage() {
    println!("Quirk8 v{IMPL_VERSION}");
    println!("{USAGE}");
}

#[derive(Debug, PartialEq, Eq)]
enum Cmd {
    /// Run file in the terminal
    Run {
        filepath: String,
        config: Option<String>,
    },
    /// Run file without a terminal
    Headless {
        filepath: String,
        step_count: usize,
        config: Option<String>,
    },
}
