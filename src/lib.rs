//! Randomized virtual input-device fuzzing.
//!
//! Every iteration synthesizes a device with a random capability set, pushes a
//! random stream of event frames through it into the input stack under test, and
//! records the device descriptor plus an evemu-style trace of everything sent.
//!
//! - [`capability`]: random capability sets
//! - [`value`] / [`stream`]: event values and framed event streams
//! - [`trace`] / [`descriptor`]: what gets recorded
//! - [`backends`]: where events go (in-process loopback, or Linux uinput)
//! - [`harness`]: the iteration loop

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backends;
pub mod capability;
pub mod clock;
pub mod codes;
pub mod config;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod event;
pub mod harness;
pub mod logger;
pub mod stream;
pub mod trace;
pub mod value;

pub use capability::{AbsRange, CapabilityLimits, CapabilitySet};
pub use codes::EventType;
pub use config::{ConfigError, FuzzConfig};
pub use device::*;
pub use error::FuzzError;
pub use event::*;
pub use harness::{CancellationToken, Harness, RunSummary};
pub use stream::{EventSink, StreamLimits, StreamReport, StreamSynthesizer};
pub use trace::TraceSink;
