//! Tick observers.

use fleet_core::{Tick, TimedEvent};

use crate::FleetSnapshot;

/// Callbacks invoked by [`FleetSim::step_with`][crate::FleetSim::step_with].
///
/// All methods default to no-ops.  Observers are called after the engine
/// has finished its own work for the tick, so a slow or absent observer
/// never holds up coordination.
///
/// # Example: event recorder
///
/// ```rust,ignore
/// struct Recorder(Vec<TimedEvent>);
///
/// impl FleetObserver for Recorder {
///     fn on_event(&mut self, event: &TimedEvent) {
///         self.0.push(event.clone());
///     }
/// }
/// ```
pub trait FleetObserver {
    fn on_tick_start(&mut self, _tick: Tick) {}

    /// Every event recorded since the previous tick ended, oldest first.
    /// Includes events from commands issued between ticks.
    fn on_event(&mut self, _event: &TimedEvent) {}

    fn on_tick_end(&mut self, _snapshot: &FleetSnapshot) {}
}

/// A [`FleetObserver`] that does nothing.
pub struct NoopObserver;

impl FleetObserver for NoopObserver {}
