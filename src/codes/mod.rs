//! Linux input event taxonomy.
//!
//! Event types and codes follow `linux/input-event-codes.h`. The fuzzer only needs
//! three facts about each type:
//! - the highest legal code ([`EventType::max_code`]), or `None` when the kernel
//!   defines no code range for the type,
//! - the value domain ([`EventType::is_binary`] / [`EventType::is_ranged`]),
//! - symbolic names for traces ([`EventType::name`] / [`code_name`]).
//!
//! ## Conventions
//! - `EV_SYN` is the frame terminator. It is never offered as a capability.
//! - `EV_PWR` has no code range, so the capability generator never picks it.
//! - Unknown types or codes have no name; traces render them as `?`.

mod names;

use serde::{Deserialize, Serialize};
use std::fmt;

/// An evdev event type (`EV_*`).
///
/// Thin wrapper over the raw kernel value so undefined types can still be
/// represented (the generator draws them and skips them).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(pub u16);

impl EventType {
    pub const SYNCHRONIZATION: EventType = EventType(0x00);
    pub const KEY: EventType = EventType(0x01);
    pub const RELATIVE: EventType = EventType(0x02);
    pub const ABSOLUTE: EventType = EventType(0x03);
    pub const MISC: EventType = EventType(0x04);
    pub const SWITCH: EventType = EventType(0x05);
    pub const LED: EventType = EventType(0x11);
    pub const SOUND: EventType = EventType(0x12);
    pub const REPEAT: EventType = EventType(0x14);
    pub const FORCEFEEDBACK: EventType = EventType(0x15);
    pub const POWER: EventType = EventType(0x16);
    pub const FORCEFEEDBACKSTATUS: EventType = EventType(0x17);

    /// `EV_MAX`: the highest event type value the kernel reserves.
    pub const MAX: EventType = EventType(0x1f);

    /// Highest legal code for this type (`KEY_MAX`, `ABS_MAX`, ...).
    ///
    /// Returns `None` for `EV_PWR` and for every type the kernel leaves undefined.
    pub fn max_code(self) -> Option<u16> {
        match self {
            Self::SYNCHRONIZATION => Some(0x0f),
            Self::KEY => Some(0x2ff),
            Self::RELATIVE => Some(0x0f),
            Self::ABSOLUTE => Some(0x3f),
            Self::MISC => Some(0x07),
            Self::SWITCH => Some(0x10),
            Self::LED => Some(0x0f),
            Self::SOUND => Some(0x07),
            Self::REPEAT => Some(0x01),
            Self::FORCEFEEDBACK => Some(0x7f),
            Self::FORCEFEEDBACKSTATUS => Some(0x01),
            _ => None,
        }
    }

    /// `true` when `code` lies within this type's code range.
    pub fn is_legal_code(self, code: u16) -> bool {
        self.max_code().is_some_and(|max| code <= max)
    }

    /// Press/release and on/off types: values are `0` or `1`.
    pub fn is_binary(self) -> bool {
        matches!(self, Self::KEY | Self::SWITCH)
    }

    /// Types whose codes carry an absolute range (`struct input_absinfo`).
    pub fn is_ranged(self) -> bool {
        self == Self::ABSOLUTE
    }

    /// Kernel name of the type (`"EV_KEY"`), if defined.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::SYNCHRONIZATION => "EV_SYN",
            Self::KEY => "EV_KEY",
            Self::RELATIVE => "EV_REL",
            Self::ABSOLUTE => "EV_ABS",
            Self::MISC => "EV_MSC",
            Self::SWITCH => "EV_SW",
            Self::LED => "EV_LED",
            Self::SOUND => "EV_SND",
            Self::REPEAT => "EV_REP",
            Self::FORCEFEEDBACK => "EV_FF",
            Self::POWER => "EV_PWR",
            Self::FORCEFEEDBACKSTATUS => "EV_FF_STATUS",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "EV_{:#04x}", self.0),
        }
    }
}

/// `SYN_REPORT`: closes a frame.
pub const SYN_REPORT: u16 = 0;

/// Symbolic name of `code` within `event_type` (`"KEY_A"`, `"ABS_MT_SLOT"`).
pub fn code_name(event_type: EventType, code: u16) -> Option<&'static str> {
    let table = match event_type {
        EventType::SYNCHRONIZATION => names::SYN,
        EventType::KEY => names::KEY,
        EventType::RELATIVE => names::REL,
        EventType::ABSOLUTE => names::ABS,
        EventType::MISC => names::MSC,
        EventType::SWITCH => names::SW,
        EventType::LED => names::LED,
        EventType::SOUND => names::SND,
        EventType::REPEAT => names::REP,
        EventType::FORCEFEEDBACK => names::FF,
        EventType::FORCEFEEDBACKSTATUS => names::FF_STATUS,
        _ => return None,
    };
    table
        .binary_search_by_key(&code, |&(c, _)| c)
        .ok()
        .and_then(|idx| table.get(idx))
        .map(|&(_, name)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_codes_match_kernel_headers() {
        assert_eq!(EventType::KEY.max_code(), Some(0x2ff));
        assert_eq!(EventType::ABSOLUTE.max_code(), Some(0x3f));
        assert_eq!(EventType::SWITCH.max_code(), Some(0x10));
        assert_eq!(EventType::POWER.max_code(), None);
        assert_eq!(EventType(0x06).max_code(), None);
        assert_eq!(EventType::MAX.max_code(), None);
    }

    #[test]
    fn names_resolve() {
        assert_eq!(code_name(EventType::KEY, 1), Some("KEY_ESC"));
        assert_eq!(code_name(EventType::KEY, 0x130), Some("BTN_SOUTH"));
        assert_eq!(code_name(EventType::KEY, 0x2e7), Some("BTN_TRIGGER_HAPPY40"));
        assert_eq!(code_name(EventType::ABSOLUTE, 0x2f), Some("ABS_MT_SLOT"));
        assert_eq!(code_name(EventType::SYNCHRONIZATION, SYN_REPORT), Some("SYN_REPORT"));
        assert_eq!(code_name(EventType::FORCEFEEDBACK, 0x61), Some("FF_AUTOCENTER"));
        assert_eq!(code_name(EventType::KEY, 0x2ff), None);
        assert_eq!(code_name(EventType::POWER, 0), None);
    }

    #[test]
    fn name_tables_are_sorted_and_legal() {
        let tables = [
            (EventType::SYNCHRONIZATION, names::SYN),
            (EventType::KEY, names::KEY),
            (EventType::RELATIVE, names::REL),
            (EventType::ABSOLUTE, names::ABS),
            (EventType::MISC, names::MSC),
            (EventType::SWITCH, names::SW),
            (EventType::LED, names::LED),
            (EventType::SOUND, names::SND),
            (EventType::REPEAT, names::REP),
            (EventType::FORCEFEEDBACK, names::FF),
            (EventType::FORCEFEEDBACKSTATUS, names::FF_STATUS),
        ];
        for (ty, table) in tables {
            assert!(table.windows(2).all(|w| w[0].0 < w[1].0), "{ty} table unsorted");
            assert!(table.iter().all(|&(code, _)| ty.is_legal_code(code)), "{ty} code out of range");
        }
    }

    #[test]
    fn value_domains() {
        assert!(EventType::KEY.is_binary());
        assert!(EventType::SWITCH.is_binary());
        assert!(!EventType::ABSOLUTE.is_binary());
        assert!(EventType::ABSOLUTE.is_ranged());
        assert!(!EventType::RELATIVE.is_ranged());
    }

    #[test]
    fn display_falls_back_to_hex() {
        assert_eq!(EventType::KEY.to_string(), "EV_KEY");
        assert_eq!(EventType(0x06).to_string(), "EV_0x06");
    }
}
