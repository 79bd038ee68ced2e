//! Scheduler module
//!
//! Handles the periodic price refresh:
//! - Injectable clock (system or manual)
//! - Market-hours gate (trading weekdays, holidays, session window in IST)
//! - Cadence-aligned refresh trigger with start/stop

mod clock;
mod market_hours;
mod refresh_scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use market_hours::{GateDecision, MarketHoursGate};
pub use refresh_scheduler::{duration_until_next_slot, RefreshScheduler, SchedulerStatus, TriggerOutcome};
