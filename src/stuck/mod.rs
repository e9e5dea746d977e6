//! Stuck detection
//!
//! After every iteration the repository is fingerprinted; a window of
//! identical fingerprints means the agents are active but nothing changes.

mod detector;
mod fingerprint;

pub use detector::classify;
pub use fingerprint::{Fingerprinter, GitFingerprinter};
