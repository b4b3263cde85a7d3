// (c) 2023 John A. Breaux
// This code is licensed under MIT license (see LICENSE for details)

//! Trill: A Chip-8 virtual machine in your terminal
//!
//! Type `0`-`9` and `a`-`f` to press keys. Esc or Ctrl-C quits.
//!
//! Logs would scribble over the screen, so they're off unless `--log` names a file
//! or `RUST_LOG` is set (then redirect stderr somewhere else).

use gumdrop::*;
use owo_colors::OwoColorize;
use std::{
    fs::File,
    io::{stdout, Stdout},
    path::PathBuf,
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing_subscriber::EnvFilter;
use trill::{
    error::{Error, Result},
    prelude::*,
};

pub fn main() -> Result<()> {
    let options = Arguments::parse_args_default_or_exit();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&options)));
    match &options.log {
        Some(path) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(File::create(path)?))
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
    let mut state = State::new(options)?;
    let mut result = Ok(());
    for frame in &mut state {
        if let Err(e) = frame {
            result = Err(e);
            break;
        }
    }
    let exit = state.finish()?;
    eprintln!("{}", exit.chip8.cpu.dump());
    if let Err(e) = result.and(exit.error.map_or(Ok(()), Err)) {
        eprintln!("{}", e.bold().red());
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Options)]
struct Arguments {
    #[options(help = "Load a ROM to run on Trill.", required, free)]
    pub file: PathBuf,
    #[options(help = "Print this help message.")]
    help: bool,
    #[options(help = "Trace every instruction (with RUST_LOG=trace).")]
    pub debug: bool,

    #[options(help = "Set the instructions-per-frame rate.", default = "8", meta = "IPF")]
    pub speed: usize,
    #[options(help = "Set the target framerate.", default = "60", meta = "FR")]
    pub frame_rate: u64,
    #[options(help = "Stop after executing N instructions.", meta = "N")]
    pub cycles: Option<usize>,
    #[options(help = "Seed the random number generator.", meta = "S")]
    pub seed: Option<u64>,

    #[options(help = "Make sound with (mute, bell, beep).", default = "bell")]
    pub audio: AudioKind,
    #[options(help = "Draw the screen in braille.")]
    pub braille: bool,
    #[options(help = "Write logs to a file.", meta = "FILE")]
    pub log: Option<PathBuf>,
}

/// Log filter used when `RUST_LOG` isn't set
fn default_directive(options: &Arguments) -> &'static str {
    match (&options.log, options.debug) {
        (None, _) => "off",
        (Some(_), false) => "info",
        (Some(_), true) => "trace",
    }
}

/// The terminal side of a running [Machine]
struct State {
    machine: Option<Machine>,
    keys: TerminalKeys,
    presenter: TerminalPresenter<Stdout>,
    rate: Duration,
    ft: Instant,
}

impl State {
    fn new(options: Arguments) -> Result<Self> {
        let mut chip8 = Chip8 {
            cpu: match options.seed {
                Some(seed) => CPU::with_seed(seed),
                None => CPU::default(),
            },
            screen: Screen::default(),
        };
        chip8.cpu.flags.debug = options.debug;
        chip8.cpu.load_program(&options.file)?;
        let pacing = Pacing {
            ipf: options.speed,
            frame_rate: options.frame_rate,
            cycle_limit: options.cycles,
        };
        let keys = TerminalKeys::new(Keypad::default())?;
        let presenter = TerminalPresenter::new(stdout())?.with_braille(options.braille);
        Ok(State {
            machine: Some(Machine::spawn(chip8, options.audio.build(), pacing)?),
            keys,
            presenter,
            rate: pacing.frame(),
            ft: Instant::now(),
        })
    }

    /// Stops the machine, and restores the terminal
    fn finish(mut self) -> Result<Exit> {
        let machine = self.machine.take().ok_or(Error::ThreadPanicked { thread: "cpu" })?;
        machine.shutdown();
        let exit = machine.join();
        self.presenter.into_inner()?;
        exit
    }

    fn wait_for_next_frame(&mut self) {
        std::thread::sleep(self.rate.saturating_sub(self.ft.elapsed()));
        self.ft = Instant::now();
    }

    fn frame(&mut self) -> Result<bool> {
        let Some(machine) = &self.machine else {
            return Ok(false);
        };
        let Some(keys) = self.keys.poll()? else {
            return Ok(false);
        };
        machine.set_keys(keys);
        self.presenter.present(&machine.frame())?;
        Ok(machine.is_running())
    }
}

impl Iterator for State {
    type Item = Result<()>;

    fn next(&mut self) -> Option<Self::Item> {
        self.wait_for_next_frame();
        match self.frame() {
            Ok(false) => None,
            Ok(true) => Some(Ok(())),
            Err(e) => Some(Err(e)),
        }
    }
}
