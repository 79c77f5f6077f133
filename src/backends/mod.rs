//! Device and consumer backends.
//!
//! A backend creates the two external collaborators of a fuzzing iteration:
//! - a [`VirtualDevice`] that accepts synthesized events as if from hardware,
//! - a [`Consumer`], the input stack under test, assigned to that device and drained
//!   after every frame.
//!
//! # Feature flags
//! - *(always)* **loopback** ([`virtual_input`]): in-process device and consumer.
//!   No privileges needed; used by tests and dry runs.
//! - **`uinput`** ([`linux`]): real `/dev/uinput` devices via `evdev`, consumed by
//!   reading the kernel device node. Linux only; usually needs root or `uinput`
//!   group membership.

use crate::capability::CapabilitySet;
use crate::descriptor::DeviceIdentity;
use crate::device::VirtualDevice;
use crate::error::FuzzError;
use crate::event::InputEvent;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[cfg(all(feature = "uinput", target_os = "linux"))]
#[cfg_attr(docsrs, doc(cfg(all(feature = "uinput", target_os = "linux"))))]
pub mod linux;
pub mod virtual_input;

/// Consumer log verbosity, lowest first.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogPriority {
    #[default]
    Debug,
    Info,
    Error,
}

/// Receives a consumer's log messages.
pub type LogHandler = Box<dyn FnMut(LogPriority, &str)>;

/// Handler plus threshold, shared by consumer implementations.
pub struct ConsumerLog {
    handler: Option<LogHandler>,
    priority: LogPriority,
}

impl ConsumerLog {
    pub fn new() -> Self {
        Self {
            handler: None,
            priority: LogPriority::Error,
        }
    }

    pub fn set_handler(&mut self, handler: LogHandler) {
        self.handler = Some(handler);
    }

    pub fn set_priority(&mut self, priority: LogPriority) {
        self.priority = priority;
    }

    /// Forward a message if it passes the threshold. The message is only built
    /// when it will be delivered.
    pub fn log(&mut self, priority: LogPriority, message: impl FnOnce() -> String) {
        if priority < self.priority {
            return;
        }
        if let Some(handler) = self.handler.as_mut() {
            handler(priority, &message());
        }
    }
}

impl Default for ConsumerLog {
    fn default() -> Self {
        Self::new()
    }
}

/// The input stack under test.
pub trait Consumer {
    /// Attach to a device.
    fn assign(&mut self, device: &dyn VirtualDevice) -> Result<(), FuzzError>;

    /// Read whatever the device has produced into the consumer's queue.
    fn dispatch(&mut self) -> Result<(), FuzzError>;

    /// Pop the next processed event, if any.
    fn next_event(&mut self) -> Option<InputEvent>;

    fn set_log_handler(&mut self, handler: LogHandler);

    fn set_log_priority(&mut self, priority: LogPriority);

    /// Dispatch and pop until the consumer is empty; returns what was popped.
    fn drain(&mut self) -> Result<Vec<InputEvent>, FuzzError> {
        let mut drained = Vec::new();
        self.dispatch()?;
        while let Some(event) = self.next_event() {
            drained.push(event);
            self.dispatch()?;
        }
        Ok(drained)
    }
}

/// Factory for devices and consumers.
pub trait Backend {
    fn kind(&self) -> BackendKind;

    fn create_device(
        &mut self,
        capabilities: &CapabilitySet,
        identity: DeviceIdentity,
    ) -> Result<Box<dyn VirtualDevice>, FuzzError>;

    fn create_consumer(&mut self) -> Result<Box<dyn Consumer>, FuzzError>;
}

/// Selectable backends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Loopback,
    Uinput,
}

/// Instantiate a backend by kind.
///
/// Fails with [`FuzzError::ResourceCreation`] when the backend isn't compiled in.
pub fn create(kind: BackendKind) -> Result<Box<dyn Backend>, FuzzError> {
    match kind {
        BackendKind::Loopback => Ok(Box::new(virtual_input::LoopbackBackend::new())),
        #[cfg(all(feature = "uinput", target_os = "linux"))]
        BackendKind::Uinput => Ok(Box::new(linux::UinputBackend::new())),
        #[cfg(not(all(feature = "uinput", target_os = "linux")))]
        BackendKind::Uinput => Err(FuzzError::resource(
            "uinput backend",
            std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "built without the `uinput` feature (Linux only)",
            ),
        )),
    }
}
