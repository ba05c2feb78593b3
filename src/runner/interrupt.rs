use std::io::Write;
use std::process;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Result, SweepError};

/// Default grace period after an interrupt before the sweep moves on.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(10);

/// Exit status after a Ctrl+C that ends the sweep.
pub const EXIT_INTERRUPTED: i32 = 130;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

static PROCESS_INTERRUPTS: OnceLock<Interrupts> = OnceLock::new();

/// What to do after the grace countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptOutcome {
    /// Countdown elapsed quietly, continue with the next config.
    Resume,
    /// A second interrupt arrived during the countdown.
    Fatal,
}

/// How a Ctrl+C press should be handled in the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Counted; the executor deals with it once the run returns.
    Record,
    /// Nothing can absorb it: terminate with status 130.
    Exit,
}

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const GRACE: u8 = 2;

/// Counter of Ctrl+C presses, plus the phase the sweep is in.
///
/// Cloning shares the state. Run functions that want to stop early can keep a
/// clone and poll `since`.
#[derive(Debug, Clone, Default)]
pub struct Interrupts {
    count: Arc<AtomicUsize>,
    phase: Arc<AtomicU8>,
    run_mark: Arc<AtomicUsize>,
}

impl Interrupts {
    /// A counter not wired to any signal. Raise it by hand.
    pub fn detached() -> Self {
        Self::default()
    }

    /// The process-wide counter fed by the Ctrl+C handler.
    ///
    /// The handler is installed on first call; later calls share it. Outside a
    /// run or a grace countdown Ctrl+C exits with status 130, as it would
    /// without a handler.
    pub fn install() -> Result<Self> {
        if let Some(existing) = PROCESS_INTERRUPTS.get() {
            return Ok(existing.clone());
        }

        let interrupts = Self::default();
        let handle = interrupts.clone();
        ctrlc::set_handler(move || {
            if handle.signal() == SignalAction::Exit {
                eprintln!();
                eprintln!("Shutdown by user!");
                process::exit(EXIT_INTERRUPTED);
            }
        })
        .map_err(|e| SweepError::SignalHandler(e.to_string()))?;

        Ok(PROCESS_INTERRUPTS.get_or_init(|| interrupts).clone())
    }

    /// Count one Ctrl+C and decide what the handler must do with it.
    ///
    /// A press while idle, or a second press during the same run, cannot be
    /// absorbed since an in-process run function cannot be cut short.
    pub fn signal(&self) -> SignalAction {
        let previous = self.count.fetch_add(1, Ordering::SeqCst);
        match self.phase.load(Ordering::SeqCst) {
            RUNNING if previous > self.run_mark.load(Ordering::SeqCst) => SignalAction::Exit,
            RUNNING | GRACE => SignalAction::Record,
            _ => SignalAction::Exit,
        }
    }

    /// Count one interrupt by hand, whatever the phase.
    pub fn raise(&self) {
        let _ = self.signal();
    }

    /// Current count, used as a mark for `since`.
    pub fn mark(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Whether any interrupt arrived after `mark` was taken.
    pub fn since(&self, mark: usize) -> bool {
        self.mark() > mark
    }

    /// Number of interrupts that arrived after `mark` was taken.
    pub fn count_since(&self, mark: usize) -> usize {
        self.mark().saturating_sub(mark)
    }

    /// Enter the running phase. Returns the mark the run started at.
    pub fn begin_run(&self) -> usize {
        let mark = self.mark();
        self.run_mark.store(mark, Ordering::SeqCst);
        self.phase.store(RUNNING, Ordering::SeqCst);
        mark
    }

    /// Back to idle, where Ctrl+C terminates the process.
    pub fn end_run(&self) {
        self.phase.store(IDLE, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.phase.load(Ordering::SeqCst) == RUNNING
    }

    /// Count down `grace`, escalating if another interrupt arrives meanwhile.
    pub fn grace_countdown(&self, grace: Duration) -> InterruptOutcome {
        self.phase.store(GRACE, Ordering::SeqCst);
        let outcome = self.countdown(grace);
        self.phase.store(IDLE, Ordering::SeqCst);
        outcome
    }

    fn countdown(&self, grace: Duration) -> InterruptOutcome {
        let mark = self.mark();
        let deadline = Instant::now() + grace;
        let mut shown = None;

        loop {
            if self.since(mark) {
                println!();
                return InterruptOutcome::Fatal;
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }

            let left = deadline - now;
            let seconds = left.as_secs() + u64::from(left.subsec_nanos() > 0);
            if shown != Some(seconds) {
                print!(
                    "\rContinuing in {:>2} s, press Ctrl+C again to shut down",
                    seconds
                );
                let _ = std::io::stdout().flush();
                shown = Some(seconds);
            }

            thread::sleep(left.min(POLL_INTERVAL));
        }

        if shown.is_some() {
            println!();
        }
        InterruptOutcome::Resume
    }
}
