//! Photo booth core: camera acquisition, timed capture with overlay
//! compositing, photo strip assembly and delivery.
//!
//! Everything runs on a single-threaded async runtime. A
//! [`session::SessionController`] owns all session state and drives one
//! capture sequence at a time.

pub mod camera;
pub mod capture;
pub mod config;
pub mod delivery;
pub mod error;
pub mod imaging;
pub mod overlay;
pub mod session;
pub mod strip;

#[cfg(test)]
mod test_support;

pub use config::BoothConfig;
pub use error::{BoothError, Result};
pub use session::{SessionController, StartOutcome};
