//! Daemon Core - single-flight state, crash recovery and the interval trigger

pub mod recovery;
pub mod state;
pub mod tick;

pub use recovery::{RecoveryAction, recover_interrupted};
pub use state::LoopStateManager;
pub use tick::{TickStats, spawn_interval};
