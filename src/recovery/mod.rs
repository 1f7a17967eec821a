//! Recognition stream recovery
//!
//! The recognition stream is treated as unreliable: it can end at any time
//! or report an error class, and indices reset across instances. This module
//! provides the state machine that decides when to preserve pending interim
//! results and when (and how fast) to restart the stream.

mod controller;

pub use controller::{
    classify, ErrorDisposition, RecoveryAction, RecoveryController, RecoveryPhase, RecoveryStats,
};
