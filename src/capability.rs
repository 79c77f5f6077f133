//! Randomized device capability sets.
//!
//! A [`CapabilitySet`] is everything a synthetic device declares: its name, the
//! `(type, code)` pairs it can emit, and an absolute range for every `EV_ABS` code.
//! [`CapabilitySet::generate`] draws a fresh one per fuzzing iteration.
//!
//! # Invariants
//! - Every pair is legal: `code <= max_code(type)`.
//! - `EV_SYN` is never a capability; the stream adds the frame terminator itself.
//! - Pairs are kept in ascending `(type, code)` order, so iteration is deterministic.
//! - A generated set is never empty.
//!
//! The set is immutable once generated; the harness drops it (and the device built
//! from it) at the end of the iteration.

use crate::codes::EventType;
use crate::event::Capability;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Default upper bound of capabilities requested per device.
pub const DEFAULT_MAX_CAPABILITIES: u32 = 64;

/// Range attached to every absolute-axis capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsRange {
    pub minimum: i32,
    pub maximum: i32,
}

impl Default for AbsRange {
    fn default() -> Self {
        Self {
            minimum: 0,
            maximum: 100,
        }
    }
}

/// Knobs for [`CapabilitySet::generate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapabilityLimits {
    /// The requested capability count is drawn from `[1, max_capabilities]`.
    pub max_capabilities: u32,
    /// Range given to every `EV_ABS` code.
    pub abs_range: AbsRange,
}

impl Default for CapabilityLimits {
    fn default() -> Self {
        Self {
            max_capabilities: DEFAULT_MAX_CAPABILITIES,
            abs_range: AbsRange::default(),
        }
    }
}

/// Declared abilities of a synthetic device.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    name: String,
    capabilities: BTreeSet<Capability>,
    ranged: BTreeMap<u16, AbsRange>,
}

impl CapabilitySet {
    /// Empty set with the given display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Draw a random, non-empty capability set.
    ///
    /// Picks a target count in `[1, limits.max_capabilities]`, then keeps drawing
    /// `(type, code)` pairs until that many have been registered. Types without a code
    /// range (and `EV_REP`, which has nothing to fuzz) are redrawn without using up a
    /// slot. Duplicate draws are idempotent, so the final count may be lower than the
    /// target but never zero.
    ///
    /// There is no error path: the loop only ends by registering pairs. The legal
    /// type space is small and dense, so in practice it ends quickly.
    pub fn generate<R: Rng + ?Sized>(
        name: impl Into<String>,
        limits: &CapabilityLimits,
        rng: &mut R,
    ) -> Self {
        let mut set = Self::new(name);
        debug_assert!(!set.name.is_empty(), "device name must not be empty");

        let mut nbits = rng.gen_range(1..=limits.max_capabilities.max(1));
        while nbits > 0 {
            // 1..=EV_MAX: EV_SYN is never a capability.
            let event_type = EventType(rng.gen_range(1..=EventType::MAX.0));
            if event_type == EventType::REPEAT {
                continue;
            }
            let Some(max) = event_type.max_code() else {
                continue;
            };
            let code = rng.gen_range(0..=max);

            let range = event_type.is_ranged().then_some(limits.abs_range);
            set.enable(event_type, code, range);
            nbits -= 1;
        }
        set
    }

    /// Register `(event_type, code)`; re-registering is harmless.
    ///
    /// `range` is recorded for `EV_ABS` codes and ignored for every other type. An
    /// `EV_ABS` code registered without a range gets [`AbsRange::default`].
    ///
    /// Returns `false` (and changes nothing) if the pair is illegal or `EV_SYN`.
    pub fn enable(&mut self, event_type: EventType, code: u16, range: Option<AbsRange>) -> bool {
        if event_type == EventType::SYNCHRONIZATION || !event_type.is_legal_code(code) {
            return false;
        }
        self.capabilities.insert(Capability::new(event_type, code));
        if event_type.is_ranged() {
            self.ranged.insert(code, range.unwrap_or_default());
        }
        true
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    pub fn has(&self, event_type: EventType, code: u16) -> bool {
        self.capabilities.contains(&Capability::new(event_type, code))
    }

    pub fn has_type(&self, event_type: EventType) -> bool {
        self.codes(event_type).next().is_some()
    }

    /// All capabilities in ascending `(type, code)` order.
    pub fn iter(&self) -> impl Iterator<Item = &Capability> + '_ {
        self.capabilities.iter()
    }

    /// Declared codes of one type, ascending.
    pub fn codes(&self, event_type: EventType) -> impl Iterator<Item = u16> + '_ {
        self.capabilities
            .range(Capability::new(event_type, 0)..=Capability::new(event_type, u16::MAX))
            .map(|cap| cap.code)
    }

    /// Distinct declared types, ascending.
    pub fn types(&self) -> Vec<EventType> {
        let mut types: Vec<EventType> = self.capabilities.iter().map(|c| c.event_type).collect();
        types.dedup();
        types
    }

    /// Range of an `EV_ABS` code, if declared.
    pub fn abs_range(&self, code: u16) -> Option<AbsRange> {
        self.ranged.get(&code).copied()
    }

    /// Declared absolute axes and their ranges, ascending by code.
    pub fn ranged_codes(&self) -> impl Iterator<Item = (u16, AbsRange)> + '_ {
        self.ranged.iter().map(|(&code, &range)| (code, range))
    }

    /// Flattened pair list, ascending.
    pub fn to_vec(&self) -> Vec<Capability> {
        self.capabilities.iter().copied().collect()
    }

    /// Copy of the set keeping only the types `keep` accepts. Absolute ranges go
    /// with their `EV_ABS` codes.
    pub fn retain_types(&self, keep: impl Fn(EventType) -> bool) -> Self {
        let capabilities: BTreeSet<Capability> = self
            .capabilities
            .iter()
            .filter(|cap| keep(cap.event_type))
            .copied()
            .collect();
        let ranged = if keep(EventType::ABSOLUTE) {
            self.ranged.clone()
        } else {
            BTreeMap::new()
        };
        Self {
            name: self.name.clone(),
            capabilities,
            ranged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn retain_types_drops_codes_and_ranges() {
        let mut set = CapabilitySet::new("dev");
        set.enable(EventType::KEY, 1, None);
        set.enable(EventType::LED, 0, None);
        set.enable(EventType::ABSOLUTE, 2, Some(AbsRange { minimum: -5, maximum: 5 }));

        let keys = set.retain_types(|ty| ty == EventType::KEY);
        assert_eq!(keys.name(), "dev");
        assert_eq!(keys.to_vec(), vec![Capability::new(EventType::KEY, 1)]);
        assert_eq!(keys.ranged_codes().count(), 0);

        let no_leds = set.retain_types(|ty| ty != EventType::LED);
        assert_eq!(no_leds.len(), 2);
        assert_eq!(no_leds.abs_range(2), Some(AbsRange { minimum: -5, maximum: 5 }));
        assert!(!no_leds.has_type(EventType::LED));
    }

    #[test]
    fn enable_rejects_sync_and_out_of_range_codes() {
        let mut set = CapabilitySet::new("dev");
        assert!(!set.enable(EventType::SYNCHRONIZATION, 0, None));
        assert!(!set.enable(EventType::KEY, 0x300, None));
        assert!(!set.enable(EventType::POWER, 0, None));
        assert!(set.is_empty());

        assert!(set.enable(EventType::KEY, 0x2ff, None));
        assert!(set.enable(EventType::KEY, 0x2ff, None));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn abs_codes_carry_a_range() {
        let mut set = CapabilitySet::new("dev");
        set.enable(EventType::ABSOLUTE, 0, Some(AbsRange { minimum: -5, maximum: 5 }));
        set.enable(EventType::ABSOLUTE, 1, None);
        set.enable(EventType::RELATIVE, 0, Some(AbsRange { minimum: -5, maximum: 5 }));

        assert_eq!(set.abs_range(0), Some(AbsRange { minimum: -5, maximum: 5 }));
        assert_eq!(set.abs_range(1), Some(AbsRange::default()));
        assert_eq!(set.ranged_codes().count(), 2);
    }

    #[test]
    fn iteration_is_ascending_by_type_then_code() {
        let mut set = CapabilitySet::new("dev");
        set.enable(EventType::SWITCH, 3, None);
        set.enable(EventType::KEY, 40, None);
        set.enable(EventType::KEY, 2, None);
        set.enable(EventType::ABSOLUTE, 7, None);

        let flat = set.to_vec();
        let mut sorted = flat.clone();
        sorted.sort();
        assert_eq!(flat, sorted);
        assert_eq!(
            set.types(),
            vec![EventType::KEY, EventType::ABSOLUTE, EventType::SWITCH]
        );
        assert_eq!(set.codes(EventType::KEY).collect::<Vec<_>>(), vec![2, 40]);
        assert!(set.has_type(EventType::SWITCH));
        assert!(!set.has_type(EventType::LED));
    }

    #[test]
    fn generated_sets_are_legal_and_bounded() {
        let limits = CapabilityLimits::default();
        let mut rng = StdRng::seed_from_u64(0xfeed);
        for i in 0..200 {
            let set = CapabilitySet::generate(format!("fuzzy device {i}"), &limits, &mut rng);
            assert!((1..=64).contains(&set.len()), "count {}", set.len());
            for cap in set.iter() {
                assert_ne!(cap.event_type, EventType::SYNCHRONIZATION);
                assert_ne!(cap.event_type, EventType::REPEAT);
                assert!(cap.event_type.is_legal_code(cap.code));
            }
            for (code, range) in set.ranged_codes() {
                assert!(set.has(EventType::ABSOLUTE, code));
                assert_eq!(range, AbsRange { minimum: 0, maximum: 100 });
            }
        }
    }

    #[test]
    fn constant_rng_still_yields_a_capability() {
        // Every draw lands on the low end: one EV_KEY code 0 registration.
        let mut rng = StepRng::new(0, 0);
        let set = CapabilitySet::generate("fuzzy device 0", &CapabilityLimits::default(), &mut rng);
        assert_eq!(set.len(), 1);
        assert!(set.has(EventType::KEY, 0));
    }

    #[test]
    fn same_seed_same_set() {
        let limits = CapabilityLimits::default();
        let a = CapabilitySet::generate("d", &limits, &mut StdRng::seed_from_u64(99));
        let b = CapabilitySet::generate("d", &limits, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }
}
