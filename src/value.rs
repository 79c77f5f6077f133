//! Per-event value synthesis.
//!
//! Binary types (`EV_KEY`, `EV_SW`) only ever see `0` or `1`: a press/release or
//! on/off state a real consumer can't reject outright. Every other type gets a
//! modest bounded integer, enough to exercise clamping and threshold logic without
//! per-axis calibration.

use crate::codes::EventType;
use rand::Rng;

/// Exclusive upper bound for values of non-binary types.
pub const DEFAULT_VALUE_BOUND: i32 = 50;

/// Pick a value for an event of `event_type`, using [`DEFAULT_VALUE_BOUND`].
pub fn synthesize_value<R: Rng + ?Sized>(event_type: EventType, rng: &mut R) -> i32 {
    synthesize_bounded(event_type, DEFAULT_VALUE_BOUND, rng)
}

/// Pick a value: `{0, 1}` for binary types, `[0, bound)` otherwise.
///
/// `bound` must be positive; non-positive bounds collapse to `0`.
pub fn synthesize_bounded<R: Rng + ?Sized>(event_type: EventType, bound: i32, rng: &mut R) -> i32 {
    if event_type.is_binary() {
        rng.gen_range(0..=1)
    } else if bound > 0 {
        rng.gen_range(0..bound)
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn binary_types_stay_binary() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            assert!(matches!(synthesize_value(EventType::KEY, &mut rng), 0 | 1));
            assert!(matches!(synthesize_value(EventType::SWITCH, &mut rng), 0 | 1));
        }
    }

    #[test]
    fn other_types_stay_below_bound() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen_nonbinary = false;
        for _ in 0..500 {
            let v = synthesize_value(EventType::ABSOLUTE, &mut rng);
            assert!((0..DEFAULT_VALUE_BOUND).contains(&v));
            seen_nonbinary |= v > 1;
        }
        assert!(seen_nonbinary);
    }

    #[test]
    fn custom_bound_is_respected() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            assert!((0..5).contains(&synthesize_bounded(EventType::RELATIVE, 5, &mut rng)));
        }
        assert_eq!(synthesize_bounded(EventType::MISC, 0, &mut rng), 0);
    }
}
