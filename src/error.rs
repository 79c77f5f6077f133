//! Error types.
//!
//! Generation itself never fails. Everything here originates at an external
//! boundary (device creation, device writes, consumer draining, trace output) and is
//! fatal for the run: the harness stops at the first error and hands it to the caller.

use crate::codes::EventType;
use crate::config::ConfigError;
use std::io;

/// Errors raised while running a fuzzing session.
#[derive(Debug, thiserror::Error)]
pub enum FuzzError {
    /// A virtual device or consumer context could not be created or assigned.
    #[error("failed to create {what}: {source}")]
    ResourceCreation {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    /// Writing an event to the virtual device failed.
    #[error("failed to write {event_type} code {code:#06x}: {source}")]
    Write {
        event_type: EventType,
        code: u16,
        #[source]
        source: io::Error,
    },

    /// A backend that hands frames to the device as one batch failed to deliver
    /// the batch. All `events` of the frame, plus its `SYN_REPORT`, are lost.
    #[error("failed to write frame of {events} event(s) plus SYN_REPORT: {source}")]
    FrameWrite {
        events: usize,
        #[source]
        source: io::Error,
    },

    /// The consumer could not be drained after a frame.
    #[error("failed to drain consumer: {0}")]
    Drain(#[source] io::Error),

    /// Trace, banner or descriptor output failed.
    #[error("failed to write trace output: {0}")]
    Trace(#[source] io::Error),

    /// The capability descriptor could not be serialized.
    #[error("failed to encode descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl FuzzError {
    pub fn resource(what: &'static str, source: io::Error) -> Self {
        Self::ResourceCreation { what, source }
    }

    pub fn write(event_type: EventType, code: u16, source: io::Error) -> Self {
        Self::Write {
            event_type,
            code,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_event() {
        let err = FuzzError::write(
            EventType::KEY,
            0x1e,
            io::Error::new(io::ErrorKind::BrokenPipe, "device gone"),
        );
        assert_eq!(
            err.to_string(),
            "failed to write EV_KEY code 0x001e: device gone"
        );

        let err = FuzzError::resource(
            "uinput device",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "failed to create uinput device: denied");

        let err = FuzzError::FrameWrite {
            events: 3,
            source: io::Error::new(io::ErrorKind::InvalidInput, "bad code"),
        };
        assert_eq!(
            err.to_string(),
            "failed to write frame of 3 event(s) plus SYN_REPORT: bad code"
        );
    }
}
