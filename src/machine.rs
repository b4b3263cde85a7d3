// (c) 2023 John A. Breaux
// This code is licensed under MIT license (see LICENSE for details)

//! Runs a [Chip8] on its own thread, alongside the [TimerService]
//!
//! The host never touches the [CPU](crate::cpu::CPU) directly while it runs.
//! Instead, it pulls whole [Screen] snapshots with [Machine::frame], and pushes
//! whole keypad states with [Machine::set_keys].

use crate::{
    cpu::timers::TimerService,
    error::{Error, Result},
    io::Audio,
    screen::Screen,
    Chip8,
};
use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use tracing::{debug, error};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A one-way stop signal, shared by every thread of a [Machine]
///
/// Waiting threads are woken as soon as it's signaled.
#[derive(Clone, Debug, Default)]
pub struct Shutdown(Arc<(Mutex<bool>, Condvar)>);

impl Shutdown {
    /// Creates a new, unsignaled, shutdown handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals every clone of this handle
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let shutdown = Shutdown::new();
    /// let other = shutdown.clone();
    /// other.signal();
    /// assert!(shutdown.is_signaled());
    /// ```
    pub fn signal(&self) {
        let (flag, cvar) = &*self.0;
        *lock(flag) = true;
        cvar.notify_all();
    }

    /// Reports whether the signal has been sent
    pub fn is_signaled(&self) -> bool {
        *lock(&self.0 .0)
    }

    /// Sleeps until `deadline`, or until signaled.
    ///
    /// Returns true if signaled
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let (flag, cvar) = &*self.0;
        let mut signaled = lock(flag);
        while !*signaled {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            signaled = cvar
                .wait_timeout(signaled, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *signaled
    }

    /// Sleeps for up to `timeout`, or until signaled.
    ///
    /// Returns true if signaled
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }
}

/// How fast a [Machine] runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pacing {
    /// Instructions executed per frame
    pub ipf: usize,
    /// Frames per second
    pub frame_rate: u64,
    /// Stop after executing this many instructions
    pub cycle_limit: Option<usize>,
}

impl Pacing {
    /// Gets the time between the start of two frames
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// # use std::time::Duration;
    /// let pacing = Pacing { frame_rate: 50, ..Default::default() };
    /// assert_eq!(Duration::from_millis(20), pacing.frame());
    /// ```
    pub fn frame(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.frame_rate.max(1))
    }

    /// Gets the number of instructions to run next frame, given the current cycle count
    fn batch(&self, cycle: usize) -> usize {
        match self.cycle_limit {
            Some(limit) => self.ipf.min(limit.saturating_sub(cycle)),
            None => self.ipf,
        }
    }
}

impl Default for Pacing {
    /// 8 instructions per frame at 60fps, or 480 instructions per second
    fn default() -> Self {
        Pacing {
            ipf: 8,
            frame_rate: 60,
            cycle_limit: None,
        }
    }
}

/// The state the host and the execution thread pass back and forth
#[derive(Debug, Default)]
struct Mailbox {
    frame: Mutex<Screen>,
    keys: Mutex<[bool; 16]>,
}

/// What's left of a [Machine] after it stops
#[derive(Debug)]
pub struct Exit {
    /// The final state of the machine
    pub chip8: Chip8,
    /// The fatal error which stopped execution, if there was one
    pub error: Option<Error>,
}

impl Exit {
    /// Converts into a [Result], discarding the final state if there was an error
    pub fn into_result(self) -> Result<Chip8> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.chip8),
        }
    }
}

/// A running [Chip8], with its execution thread and [TimerService]
#[derive(Debug)]
pub struct Machine {
    mailbox: Arc<Mailbox>,
    shutdown: Shutdown,
    cpu: Option<JoinHandle<Exit>>,
    timers: Option<TimerService>,
}

impl Machine {
    /// Starts running `chip8`, sending sound timer tones to `audio`
    pub fn spawn(chip8: Chip8, audio: Box<dyn Audio>, pacing: Pacing) -> Result<Self> {
        let shutdown = Shutdown::new();
        let mailbox = Arc::new(Mailbox {
            frame: Mutex::new(chip8.screen),
            keys: Mutex::default(),
        });
        let timers = TimerService::spawn(chip8.cpu.timers().clone(), audio, shutdown.clone())?;
        let cpu = {
            let (mailbox, shutdown) = (mailbox.clone(), shutdown.clone());
            thread::Builder::new()
                .name("cpu".into())
                .spawn(move || run(chip8, &mailbox, pacing, &shutdown))
        };
        let cpu = match cpu {
            Ok(cpu) => cpu,
            Err(e) => {
                shutdown.signal();
                timers.join()?;
                return Err(e.into());
            }
        };
        Ok(Machine {
            mailbox,
            shutdown,
            cpu: Some(cpu),
            timers: Some(timers),
        })
    }

    /// Gets a copy of the most recently completed frame
    pub fn frame(&self) -> Screen {
        *lock(&self.mailbox.frame)
    }

    /// Replaces the state of the whole keypad. The CPU sees it at the start of the next frame.
    pub fn set_keys(&self, keys: [bool; 16]) {
        *lock(&self.mailbox.keys) = keys;
    }

    /// Asks every thread to stop. Use [Machine::join] to wait for them.
    pub fn shutdown(&self) {
        self.shutdown.signal()
    }

    /// Reports whether the machine is still executing instructions
    pub fn is_running(&self) -> bool {
        self.cpu.as_ref().map_or(false, |cpu| !cpu.is_finished())
    }

    /// Waits for the machine to stop, and gets back its final state.
    ///
    /// This doesn't signal a shutdown, so it waits forever on a machine
    /// with no cycle limit, unless execution fails.
    pub fn join(mut self) -> Result<Exit> {
        let exit = match self.cpu.take() {
            Some(cpu) => cpu.join(),
            None => return Err(Error::ThreadPanicked { thread: "cpu" }),
        };
        // the execution thread always signals on the way out, but a panic can't
        self.shutdown.signal();
        if let Some(timers) = self.timers.take() {
            timers.join()?;
        }
        exit.map_err(|_| Error::ThreadPanicked { thread: "cpu" })
    }
}

impl Drop for Machine {
    fn drop(&mut self) {
        self.shutdown.signal();
    }
}

fn run(mut chip8: Chip8, mailbox: &Mailbox, pacing: Pacing, shutdown: &Shutdown) -> Exit {
    debug!(ipf = pacing.ipf, frame_rate = pacing.frame_rate, "machine started");
    let frame = pacing.frame();
    let mut deadline = Instant::now();
    let error = loop {
        let keys = *lock(&mailbox.keys);
        chip8.cpu.set_keys(keys);
        let result = chip8
            .cpu
            .multistep(&mut chip8.screen, pacing.batch(chip8.cpu.cycle()))
            .map(|_| ());
        *lock(&mailbox.frame) = chip8.screen;
        if let Err(e) = result {
            error!("{e}");
            break Some(e);
        }
        if pacing.cycle_limit.map_or(false, |limit| chip8.cpu.cycle() >= limit) {
            debug!("reached cycle limit");
            break None;
        }
        deadline += frame;
        // Don't try to catch up after a long stall
        deadline = deadline.max(Instant::now() - frame);
        if shutdown.wait_until(deadline) {
            break None;
        }
    };
    shutdown.signal();
    debug!(cycle = chip8.cpu.cycle(), "machine stopped");
    Exit { chip8, error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cpu::timers::Timers, io::Mute};

    fn machine(program: &[u8], pacing: Pacing) -> Machine {
        let mut chip8 = Chip8::default();
        chip8
            .cpu
            .load_program_bytes(program)
            .expect("program should fit in memory");
        Machine::spawn(chip8, Box::new(Mute), pacing).expect("threads should spawn")
    }

    #[test]
    fn shutdown_wakes_waiters() {
        let shutdown = Shutdown::new();
        let waiter = {
            let shutdown = shutdown.clone();
            thread::spawn(move || shutdown.wait_timeout(Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(10));
        let time = Instant::now();
        shutdown.signal();
        assert!(waiter.join().unwrap());
        assert!(time.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn wait_until_times_out() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.wait_timeout(Duration::from_millis(5)));
        assert!(!shutdown.is_signaled());
    }

    #[test]
    fn batch_respects_cycle_limit() {
        let pacing = Pacing {
            ipf: 8,
            cycle_limit: Some(20),
            ..Default::default()
        };
        assert_eq!(8, pacing.batch(0));
        assert_eq!(4, pacing.batch(16));
        assert_eq!(0, pacing.batch(20));
        assert_eq!(8, Pacing::default().batch(usize::MAX));
    }

    #[test]
    fn spin_stops_promptly() {
        // 200: jmp 200
        let machine = machine(&[0x12, 0x00], Pacing::default());
        thread::sleep(Duration::from_millis(50));
        assert!(machine.is_running());
        let time = Instant::now();
        machine.shutdown();
        let exit = machine.join().unwrap();
        assert!(time.elapsed() < Duration::from_millis(100));
        assert!(exit.error.is_none());
        assert!(exit.chip8.cpu.cycle() > 0);
        assert_eq!(0x200, exit.chip8.cpu.pc());
    }

    #[test]
    fn fatal_error_stops_machine() {
        // 200: ret
        let machine = machine(&[0x00, 0xee], Pacing::default());
        let exit = machine.join().unwrap();
        assert!(matches!(
            exit.error,
            Some(Error::StackUnderflow { pc: 0x200 })
        ));
        assert!(exit.into_result().is_err());
    }

    #[test]
    fn cycle_limit_stops_machine() {
        let pacing = Pacing {
            ipf: 8,
            frame_rate: 1000,
            cycle_limit: Some(20),
        };
        let exit = machine(&[0x12, 0x00], pacing).join().unwrap();
        assert!(exit.error.is_none());
        assert_eq!(20, exit.chip8.cpu.cycle());
    }

    #[test]
    fn frames_are_published() {
        // 200: mov $000, I ; draw #5, v0, v0 ; jmp 204
        let machine = machine(&[0xa0, 0x00, 0xd0, 0x05, 0x12, 0x04], Pacing::default());
        thread::sleep(Duration::from_millis(100));
        let frame = machine.frame();
        machine.shutdown();
        machine.join().unwrap();
        // top row of the "0" glyph
        assert!((0..4).all(|x| frame.get(x, 0)));
        assert!(!frame.get(4, 0));
    }

    #[test]
    fn keys_reach_cpu() {
        // 200: waitk v0 ; jmp 202
        let machine = machine(&[0xf0, 0x0a, 0x12, 0x02], Pacing::default());
        thread::sleep(Duration::from_millis(50));
        let mut keys = [false; 16];
        keys[5] = true;
        machine.set_keys(keys);
        thread::sleep(Duration::from_millis(100));
        machine.shutdown();
        let chip8 = machine.join().unwrap().into_result().unwrap();
        assert_eq!(5, chip8.cpu.v()[0]);
        assert_eq!(0x202, chip8.cpu.pc());
    }

    #[test]
    fn timers_run_alongside() {
        // 200: mov #ff, v0 ; mov v0, DT ; jmp 204
        let machine = machine(&[0x60, 0xff, 0xf0, 0x15, 0x12, 0x04], Pacing::default());
        thread::sleep(Duration::from_millis(200));
        machine.shutdown();
        let chip8 = machine.join().unwrap().into_result().unwrap();
        let timers: &Timers = chip8.cpu.timers();
        assert!(timers.delay() < 0xff);
        assert!(timers.delay() > 0xff - 30);
    }
}
