//! Events and frames.
//!
//! The fuzzer speaks raw evdev: every event is a `(type, code, value)` triple, exactly
//! what a `struct input_event` carries. Events are grouped into [`EventFrame`]s, each
//! closed by an `EV_SYN`/`SYN_REPORT` marker.
//!
//! ## Value conventions
//! - **`EV_KEY` / `EV_SW`:** `0` (release/off) or `1` (press/on).
//! - **Everything else:** a small non-negative integer, `[0, 50)` by default.
//!
//! ### Timestamps
//! Timestamps are monotonic [`Duration`]s measured by a [`Clock`](crate::clock::Clock).
//! All events of a frame share the frame's timestamp, mirroring how a device reports
//! one atomic input report.

use crate::codes::{self, EventType, SYN_REPORT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single `(type, code)` pair a device may declare and emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Capability {
    pub event_type: EventType,
    pub code: u16,
}

impl Capability {
    pub fn new(event_type: EventType, code: u16) -> Self {
        Self { event_type, code }
    }

    /// Symbolic code name, if the kernel headers define one.
    pub fn code_name(&self) -> Option<&'static str> {
        codes::code_name(self.event_type, self.code)
    }
}

/// Timestamped evdev event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputEvent {
    /// Monotonic emission time.
    pub timestamp: Duration,
    pub event_type: EventType,
    pub code: u16,
    pub value: i32,
}

impl InputEvent {
    pub fn new(timestamp: Duration, event_type: EventType, code: u16, value: i32) -> Self {
        Self {
            timestamp,
            event_type,
            code,
            value,
        }
    }

    /// The frame terminator (`EV_SYN` / `SYN_REPORT` / `0`).
    pub fn sync(timestamp: Duration) -> Self {
        Self::new(timestamp, EventType::SYNCHRONIZATION, SYN_REPORT, 0)
    }

    pub fn is_sync(&self) -> bool {
        self.event_type == EventType::SYNCHRONIZATION && self.code == SYN_REPORT
    }
}

/// One atomic burst of events.
///
/// The `SYN_REPORT` terminator is implicit: every frame is closed by exactly one
/// synchronization event when it is emitted, so it is not stored in `events`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventFrame {
    /// Monotonic time at which the frame was emitted.
    pub timestamp: Duration,
    /// Microseconds elapsed since the previous frame (`0` for the first frame).
    pub dt_us: i64,
    /// Events in emission order.
    pub events: Vec<InputEvent>,
}

impl EventFrame {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_event_is_recognized() {
        let ev = InputEvent::sync(Duration::from_millis(5));
        assert!(ev.is_sync());
        assert_eq!(ev.value, 0);

        let key = InputEvent::new(Duration::ZERO, EventType::KEY, SYN_REPORT, 1);
        assert!(!key.is_sync());
    }

    #[test]
    fn capabilities_order_by_type_then_code() {
        let mut caps = vec![
            Capability::new(EventType::ABSOLUTE, 0),
            Capability::new(EventType::KEY, 30),
            Capability::new(EventType::KEY, 2),
        ];
        caps.sort();
        assert_eq!(
            caps,
            vec![
                Capability::new(EventType::KEY, 2),
                Capability::new(EventType::KEY, 30),
                Capability::new(EventType::ABSOLUTE, 0),
            ]
        );
        assert_eq!(caps[1].code_name(), Some("KEY_A"));
    }
}
