//! Attaching to the gpm-track producer and streaming its events.

pub mod event_loop;
pub mod paths;
pub mod shm;
pub mod signals;
pub mod supervisor;

// Public API - used by main.rs
pub use event_loop::EventLoop;
pub use shm::SharedChannel;
pub use signals::{ClickSlot, SignalBank};
pub use supervisor::{ProducerConfig, Supervisor};
