//! Steady-state loop merging both channels into one output stream.
//!
//! Every interval: drain the click slot, or failing that poll the position,
//! write at most one line, then go back to sleep. The loop has no exit of
//! its own; it ends when its future is dropped or output fails.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gpmwatch_core::dispatch::Dispatcher;
use gpmwatch_core::event::{Event, OutputFormat};
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::tracker::shm::PositionSource;
use crate::tracker::signals::ClickSlot;

pub struct EventLoop<S, W> {
    source: Arc<S>,
    slot: ClickSlot,
    dispatcher: Dispatcher,
    out: W,
    format: OutputFormat,
}

impl<S, W> EventLoop<S, W>
where
    S: PositionSource,
    W: Write,
{
    pub fn new(source: Arc<S>, slot: ClickSlot, out: W, format: OutputFormat) -> Self {
        Self {
            source,
            slot,
            dispatcher: Dispatcher::new(),
            out,
            format,
        }
    }

    /// Run one tick, writing the event if there is one.
    pub fn tick(&mut self) -> std::io::Result<Option<Event>> {
        let pending = self.slot.take();
        let source = &self.source;
        let event = self.dispatcher.tick(pending, || source.read_position());

        if let Some(event) = &event {
            self.emit(event)?;
        }
        Ok(event)
    }

    /// Tick every `interval` until output fails.
    pub async fn run(&mut self, interval: Duration) -> std::io::Result<()> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.tick()?;
        }
    }

    fn emit(&mut self, event: &Event) -> std::io::Result<()> {
        let line = event
            .render(self.format, Utc::now())
            .map_err(std::io::Error::other)?;
        debug!("Emitting {:?}", event);
        writeln!(self.out, "{}", line)?;
        self.out.flush()
    }
}
