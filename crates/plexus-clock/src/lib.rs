//! Logical time for Plexus dispatchers.
//!
//! A [`ClockPump`] owns the schedule and a shared [`LogicalClock`]. Every
//! tick moves the clock forward by one fixed step and sends a
//! time-advanced message into a [`plexus_dispatch::Dispatcher`], which
//! releases the deferred messages that have come due.
//!
//! Rates run from 1 to 128 Hz. A rate of 0 is event-driven:
//! [`ClockPump::wait_for_tick`] pends forever and the owner moves time with
//! [`ClockPump::advance_manually`].

mod config;
mod logical;
mod pump;

pub use config::{ClockConfig, ClockPolicy};
pub use logical::LogicalClock;
pub use pump::{ClockMetrics, ClockPump, TickInfo};
