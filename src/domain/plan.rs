//! Step plan generation.
//!
//! A plan is a handful of short warmup steps followed by one step of the
//! requested target duration. Warmup count and lengths are drawn from the
//! supplied RNG, so a seeded RNG always yields the same plan.

use rand::Rng;

use super::session::Step;
use crate::error::HoundError;

/// Lower bound for the longest warmup step, in seconds.
pub const MIN_WARMUP_SECS: u64 = 5;

/// Upper bound for the longest warmup step, in seconds.
pub const MAX_WARMUP_SECS: u64 = 40;

/// Fraction of the target used to size warmup steps.
const WARMUP_RATIO: f64 = 0.15;

/// Longest warmup step allowed for a target duration.
///
/// 15% of the target, rounded, clamped to `[5, 40]`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn max_warmup_duration(target_sec: u64) -> u64 {
    let scaled = (target_sec as f64 * WARMUP_RATIO).round() as u64;
    scaled.clamp(MIN_WARMUP_SECS, MAX_WARMUP_SECS)
}

/// Number of warmup steps for a target duration.
///
/// Shorter targets get more warmups; each bucket adds one step of jitter.
pub fn warmup_step_count<R: Rng + ?Sized>(target_sec: u64, rng: &mut R) -> usize {
    let base = match target_sec {
        0..=239 => 5,
        240..=599 => 4,
        600..=899 => 3,
        _ => 2,
    };
    base + rng.gen_range(0..=1)
}

/// Generate the ordered step plan for a target duration.
///
/// # Errors
///
/// Returns [`HoundError::InvalidDuration`] if `target_sec` is not positive.
pub fn generate<R: Rng + ?Sized>(target_sec: i64, rng: &mut R) -> Result<Vec<Step>, HoundError> {
    let target = u64::try_from(target_sec)
        .ok()
        .filter(|t| *t > 0)
        .ok_or(HoundError::InvalidDuration(target_sec))?;

    let warmups = warmup_step_count(target, rng);
    let max_warmup = max_warmup_duration(target);

    let mut steps: Vec<Step> = (0..warmups)
        .map(|index| Step::new(index, rng.gen_range(1..=max_warmup)))
        .collect();
    steps.push(Step::new(warmups, target));

    Ok(steps)
}
