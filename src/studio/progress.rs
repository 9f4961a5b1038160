use crate::config::ProgressConfig;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::{sync::watch, task::JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    Idle,
    InFlight { ticks: u32 },
    Settling,
}

/// Synthetic progress. Only a UX hint: it says nothing about how many
/// requests actually finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub phase: ProgressPhase,
    pub percent: u8,
}

impl Progress {
    pub const IDLE: Progress = Progress {
        phase: ProgressPhase::Idle,
        percent: 0,
    };
}

/// Batches currently holding the signal, plus the tasks driving it. One
/// ticker serves every overlapping batch.
#[derive(Default)]
struct RunState {
    active: usize,
    ticker: Option<JoinHandle<()>>,
    pending_reset: Option<JoinHandle<()>>,
}

struct Shared {
    config: ProgressConfig,
    tx: watch::Sender<Progress>,
    state: Mutex<RunState>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Releases one batch. Only the last one out settles or resets the
    /// signal; earlier ones leave it ticking for the rest.
    fn release(self: &Arc<Self>, settled: bool) {
        let mut state = self.state();
        state.active = state.active.saturating_sub(1);
        if state.active > 0 {
            return;
        }
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }

        if !settled {
            self.tx.send_replace(Progress::IDLE);
            return;
        }
        self.tx.send_replace(Progress {
            phase: ProgressPhase::Settling,
            percent: 100,
        });
        let shared = Arc::clone(self);
        let delay = self.config.reset_delay;
        let reset = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.tx.send_replace(Progress::IDLE);
        });
        if let Some(previous) = state.pending_reset.replace(reset) {
            previous.abort();
        }
    }
}

#[derive(Clone)]
pub struct ProgressTracker {
    shared: Arc<Shared>,
}

impl ProgressTracker {
    pub fn new(config: ProgressConfig) -> Self {
        let (tx, _) = watch::channel(Progress::IDLE);
        Self {
            shared: Arc::new(Shared {
                config,
                tx,
                state: Mutex::new(RunState::default()),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.shared.tx.subscribe()
    }

    pub fn current(&self) -> Progress {
        *self.shared.tx.borrow()
    }

    /// Number of batches currently in flight.
    pub fn active_runs(&self) -> usize {
        self.shared.state().active
    }

    /// Registers a batch. The first one in moves the signal to `InFlight`
    /// and starts the ticker; later ones join the running signal. Must be
    /// called from inside a tokio runtime.
    pub fn start(&self) -> ProgressRun {
        let shared = Arc::clone(&self.shared);
        {
            let mut state = shared.state();
            state.active += 1;
            if state.active == 1 {
                if let Some(reset) = state.pending_reset.take() {
                    reset.abort();
                }
                shared.tx.send_replace(Progress {
                    phase: ProgressPhase::InFlight { ticks: 0 },
                    percent: shared.config.start_percent,
                });
                state.ticker = Some(tokio::spawn(tick(Arc::clone(&shared))));
            }
        }
        ProgressRun {
            shared,
            released: false,
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(ProgressConfig::default())
    }
}

async fn tick(shared: Arc<Shared>) {
    let mut interval = tokio::time::interval(shared.config.tick_interval);
    // The first tick of a tokio interval completes immediately.
    interval.tick().await;
    loop {
        interval.tick().await;
        shared.tx.send_modify(|progress| {
            if let ProgressPhase::InFlight { ticks } = &mut progress.phase {
                *ticks += 1;
                progress.percent = advance(progress.percent, &shared.config);
            }
        });
    }
}

/// Eases towards the ceiling; never passes it.
pub fn advance(percent: u8, config: &ProgressConfig) -> u8 {
    if percent >= config.ceiling_percent {
        return percent;
    }
    let remaining = f32::from(config.ceiling_percent - percent);
    let step = (remaining / f32::from(config.step_divisor.max(1))).round() as u8;
    percent + step.max(1)
}

/// One in-flight batch. It is released on [`ProgressRun::settle`] or, if
/// the batch is abandoned, when the run is dropped.
pub struct ProgressRun {
    shared: Arc<Shared>,
    released: bool,
}

impl ProgressRun {
    /// Marks the batch finished. When no other batch is in flight the signal
    /// jumps to 100% and the reset back to idle is scheduled.
    pub fn settle(mut self) {
        self.released = true;
        self.shared.release(true);
    }
}

impl Drop for ProgressRun {
    fn drop(&mut self) {
        // Never settled: the batch was cancelled.
        if !self.released {
            self.shared.release(false);
        }
    }
}
