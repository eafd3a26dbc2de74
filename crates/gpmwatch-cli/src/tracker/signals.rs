//! Click notifications over the real-time signal bank.
//!
//! Reserving the bank replaces the default (terminate) disposition of all
//! 17 signals for the rest of the process lifetime. That has to happen
//! before the producer is spawned, which is why [`Supervisor::spawn`]
//! takes a `&SignalBank`.
//!
//! [`Supervisor::spawn`]: crate::tracker::supervisor::Supervisor::spawn

use std::sync::{Arc, Mutex, PoisonError};

use gpmwatch_core::click::{
    bank_signals, decode_signal, ClickReport, SIGNAL_BANK_SIZE, SIGNAL_BASE,
};
use gpmwatch_core::error::BankError;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::task::JoinSet;
use tracing::debug;

use crate::tracker::shm::PositionSource;

/// Single-slot, last-write-wins mailbox between the signal listeners and
/// the event loop.
///
/// Reports are stored and taken whole, so the loop never sees a partially
/// built report.
#[derive(Debug, Clone, Default)]
pub struct ClickSlot {
    inner: Arc<Mutex<Option<ClickReport>>>,
}

impl ClickSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a report, replacing any that was not consumed yet.
    pub fn store(&self, report: ClickReport) {
        let mut slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(dropped) = slot.replace(report) {
            debug!("Unconsumed click overwritten: {:?}", dropped);
        }
    }

    /// Take the pending report, leaving the slot empty.
    pub fn take(&self) -> Option<ClickReport> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Registered streams for every signal in the bank.
pub struct SignalBank {
    streams: Vec<(i32, Signal)>,
}

impl SignalBank {
    /// Take over all bank signals.
    ///
    /// Must be called from within a tokio runtime. Signals that arrive
    /// before [`activate`](Self::activate) are held by their stream and
    /// handled once listeners start.
    pub fn reserve() -> Result<Self, BankError> {
        let first = SIGNAL_BASE;
        let last = SIGNAL_BASE + SIGNAL_BANK_SIZE - 1;
        let (rt_min, rt_max) = (libc::SIGRTMIN(), libc::SIGRTMAX());
        if first < rt_min || last > rt_max {
            return Err(BankError::OutOfRange {
                rt_min,
                rt_max,
                first,
                last,
            });
        }

        let streams = bank_signals()
            .map(|signo| {
                signal(SignalKind::from_raw(signo))
                    .map(|stream| (signo, stream))
                    .map_err(|source| BankError::Register { signo, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Reserved signals {}..={}", first, last);
        Ok(Self { streams })
    }

    /// Spawn one listener per signal.
    ///
    /// Each receipt decodes the click from the signal number, reads the
    /// position right away and stores the finished report in `slot`. If the
    /// position slot is mid-write, the producer's click record supplies the
    /// coordinates when it describes the same click.
    pub fn activate<S>(self, source: Arc<S>, slot: ClickSlot) -> ClickListeners
    where
        S: PositionSource + 'static,
    {
        let mut tasks = JoinSet::new();

        for (signo, mut stream) in self.streams {
            let Some((multiplicity, button)) = decode_signal(signo) else {
                continue;
            };
            let source = source.clone();
            let slot = slot.clone();

            tasks.spawn(async move {
                while stream.recv().await.is_some() {
                    let position = source.read_position().or_else(|| {
                        source
                            .read_click_record()
                            .filter(|r| r.button == button && r.multiplicity == multiplicity)
                            .map(|r| r.position)
                    });
                    slot.store(ClickReport {
                        multiplicity,
                        button,
                        position,
                    });
                }
                debug!("Signal {} stream closed", signo);
            });
        }

        ClickListeners { tasks }
    }
}

/// Running listener tasks. Dropping this stops them.
pub struct ClickListeners {
    tasks: JoinSet<()>,
}

impl ClickListeners {
    /// Number of running listeners.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }
}

impl Drop for ClickListeners {
    fn drop(&mut self) {
        debug!("Stopping {} click listener(s)", self.tasks.len());
        self.tasks.abort_all();
    }
}
