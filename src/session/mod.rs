mod controller;
mod events;

pub use controller::{SessionController, StartOutcome};
pub use events::{SessionEvent, SessionObserver, SessionSnapshot, StatusTone, TracingObserver};

use std::cell::{Cell, RefCell};

use crate::capture::CapturedStill;
use crate::strip::PhotoStrip;

/// Where the capture sequence currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingCamera,
    CountdownForShot { shot: u32, remaining: u32 },
    Capturing { shot: u32 },
    InterShotPause { shot: u32 },
    Assembling,
    /// The strip is being presented. `start` returns to `Idle` afterwards.
    Delivered,
}

/// Transient data of the current run. Nothing outlives the process.
#[derive(Debug, Default)]
pub struct Session {
    busy: Cell<bool>,
    shots: RefCell<Vec<CapturedStill>>,
    strip: RefCell<Option<PhotoStrip>>,
}

impl Session {
    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    pub fn shots_taken(&self) -> usize {
        self.shots.borrow().len()
    }

    pub fn strip(&self) -> Option<PhotoStrip> {
        self.strip.borrow().clone()
    }

    fn clear(&self) {
        self.shots.borrow_mut().clear();
        self.strip.borrow_mut().take();
    }
}

/// Clears the busy flag when the session ends, however it ends.
struct BusyGuard<'a>(&'a Cell<bool>);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
