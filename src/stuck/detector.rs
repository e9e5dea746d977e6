//! Non-progress classification over the fingerprint window.

use crate::domain::IterationFingerprint;

/// True when the last `window` fingerprints are all identical.
///
/// A window of 0 disables detection; fewer than `window` fingerprints is
/// never stuck.
pub fn classify(fingerprints: &[IterationFingerprint], window: usize) -> bool {
    if window == 0 || fingerprints.len() < window {
        return false;
    }

    let recent = &fingerprints[fingerprints.len() - window..];
    recent.windows(2).all(|pair| pair[0].digest == pair[1].digest)
}
