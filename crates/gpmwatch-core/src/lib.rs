//! Core types and logic for gpmwatch.
//!
//! Everything here is pure and independent of the running producer, so it
//! can be tested without gpm, shared memory or signals.
//!
//! # Modules
//!
//! - [`backoff`]: retry delay planning for the startup handshake
//! - [`click`]: signal bank layout and click decoding
//! - [`position`]: shared-memory slot layout and decoding
//! - [`dispatch`]: per-tick choice between click and position events
//! - [`event`]: output events in text and JSON form
//! - [`error`]: error types with actionable suggestions
//!
//! # Channels
//!
//! | Channel | Transport | Carries |
//! |---------|-----------|---------|
//! | Position | shared page, polled | latest `x y` |
//! | Click | one of 17 real-time signals | button and click count |

pub mod backoff;
pub mod click;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod position;
