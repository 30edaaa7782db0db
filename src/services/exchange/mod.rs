//! Idle-response scheduler for reactive turns.

mod reducer;
mod runner;

pub use reducer::{
    Effect, ExchangeEvent, ExchangeOutcome, ExchangePhase, ExchangeScope, ExchangeSettings, ExchangeState,
    ExchangeView, TimerSlot,
};
pub use runner::ExchangeHandle;
