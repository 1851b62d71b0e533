//! Wall-clock sources for the cinematic sequence.
//!
//! The sequence never counts frames: every decision is made against elapsed
//! milliseconds read from a [`Clock`]. Simulations, browser hosts that pass
//! their own frame timestamps, and tests all drive a [`ManualClock`].

use std::cell::Cell;
use std::rc::Rc;

/// Milliseconds, as a float so sub-millisecond frame timestamps survive.
pub type Millis = f64;

/// A monotonic time source.
pub trait Clock {
    /// Current time in milliseconds. Only differences are meaningful.
    fn now_ms(&self) -> Millis;
}

/// Clock that only moves when told to.
///
/// Clones share the same underlying time, so a simulated soundtrack and the
/// sequence controller can observe one timeline.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<Millis>>,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, now: Millis) {
        self.now.set(now);
    }

    pub fn advance(&self, delta: Millis) {
        self.now.set(self.now.get() + delta);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.get()
    }
}
