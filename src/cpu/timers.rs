// (c) 2023 John A. Breaux
// This code is licensed under MIT license (see LICENSE for details)

//! The delay and sound timers, and the 60Hz service that counts them down
//!
//! [Timers] is a cheap, cloneable handle. The [CPU](super::CPU) and the
//! [TimerService] each hold one, and every access is a single atomic operation,
//! so a tick can never interleave with an instruction's read or write.

use crate::{
    error::{Error, Result},
    io::Audio,
    machine::Shutdown,
};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering::SeqCst},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use tracing::{debug, warn};

/// How often the timers count down
pub const TIMER_HZ: u64 = 60;

/// A change in whether the sound timer should be making noise
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tone {
    /// The sound timer became nonzero
    Start,
    /// The sound timer ran out
    Stop,
}

#[derive(Debug, Default)]
struct Registers {
    delay: AtomicU8,
    sound: AtomicU8,
    sounding: AtomicBool,
}

/// Shared handle to the delay timer (DT) and sound timer (ST)
#[derive(Clone, Debug, Default)]
pub struct Timers(Arc<Registers>);

impl Timers {
    /// Creates a new pair of timers, both zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the value in the delay timer
    pub fn delay(&self) -> u8 {
        self.0.delay.load(SeqCst)
    }

    /// Gets the value in the sound timer
    pub fn sound(&self) -> u8 {
        self.0.sound.load(SeqCst)
    }

    /// Sets the delay timer
    pub fn set_delay(&self, value: u8) {
        self.0.delay.store(value, SeqCst)
    }

    /// Sets the sound timer
    pub fn set_sound(&self, value: u8) {
        self.0.sound.store(value, SeqCst)
    }

    /// Reports whether the last [Tone] emitted was [Tone::Start]
    pub fn is_sounding(&self) -> bool {
        self.0.sounding.load(SeqCst)
    }

    /// Zeroes both timers. A playing tone is stopped on the next tick.
    pub fn reset(&self) {
        self.set_delay(0);
        self.set_sound(0);
    }

    /// Counts both timers down by one, stopping at zero.
    ///
    /// The tone plays on every tick that finds the sound timer nonzero, so a sound
    /// timer of `n` sounds for `n` ticks. Reports a [Tone] when that changes.
    /// # Examples
    /// ```rust
    /// # use trill::cpu::timers::{Timers, Tone};
    /// let timers = Timers::new();
    /// timers.set_delay(1);
    /// timers.set_sound(1);
    /// assert_eq!(Some(Tone::Start), timers.tick());
    /// assert_eq!((0, 0), (timers.delay(), timers.sound()));
    /// assert_eq!(Some(Tone::Stop), timers.tick());
    /// assert_eq!(None, timers.tick());
    /// ```
    pub fn tick(&self) -> Option<Tone> {
        let regs = &self.0;
        regs.delay
            .fetch_update(SeqCst, SeqCst, |dt| dt.checked_sub(1))
            .ok();
        let sounding = regs
            .sound
            .fetch_update(SeqCst, SeqCst, |st| st.checked_sub(1))
            .is_ok();
        match (regs.sounding.swap(sounding, SeqCst), sounding) {
            (false, true) => Some(Tone::Start),
            (true, false) => Some(Tone::Stop),
            _ => None,
        }
    }
}

/// Runs [Timers::tick] at [TIMER_HZ] on its own thread, forwarding [Tone]s to an [Audio] sink
#[derive(Debug)]
pub struct TimerService {
    handle: JoinHandle<()>,
}

impl TimerService {
    /// The time between two ticks
    pub const PERIOD: Duration = Duration::from_nanos(1_000_000_000 / TIMER_HZ);

    /// Starts the timer thread. It runs until `shutdown` is signaled.
    pub fn spawn(timers: Timers, audio: Box<dyn Audio>, shutdown: Shutdown) -> Result<Self> {
        let handle = thread::Builder::new()
            .name("timers".into())
            .spawn(move || run(timers, audio, shutdown))?;
        Ok(TimerService { handle })
    }

    /// Waits for the timer thread to finish. Signal the shutdown first!
    pub fn join(self) -> Result<()> {
        self.handle
            .join()
            .map_err(|_| Error::ThreadPanicked { thread: "timers" })
    }
}

fn run(timers: Timers, mut audio: Box<dyn Audio>, shutdown: Shutdown) {
    debug!("timer service started");
    let mut deadline = Instant::now();
    loop {
        deadline += TimerService::PERIOD;
        if shutdown.wait_until(deadline) {
            break;
        }
        let result = match timers.tick() {
            Some(Tone::Start) => audio.start(),
            Some(Tone::Stop) => audio.stop(),
            None => Ok(()),
        };
        if let Err(e) = result {
            warn!("{e}");
        }
    }
    // Don't leave the speaker on
    if timers.0.sounding.swap(false, SeqCst) {
        if let Err(e) = audio.stop() {
            warn!("{e}");
        }
    }
    debug!("timer service stopped");
}
