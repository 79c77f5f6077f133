#![cfg(all(feature = "uinput", target_os = "linux"))]

//! Linux uinput backend.
//!
//! - [`uinput_device`]: creates a kernel input device through `/dev/uinput` with the
//!   `evdev` crate and forwards synthesized events to it.
//! - [`devnode_consumer`]: opens the resulting `/dev/input/eventN` node non-blocking
//!   and reads back raw `struct input_event` records, the way an input stack does.
//!
//! Requires write access to `/dev/uinput` and read access to the new device node.

pub mod devnode_consumer;
pub mod uinput_device;

use crate::backends::{Backend, BackendKind, Consumer};
use crate::capability::CapabilitySet;
use crate::descriptor::DeviceIdentity;
use crate::device::VirtualDevice;
use crate::error::FuzzError;

pub use devnode_consumer::DevnodeConsumer;
pub use uinput_device::UinputDevice;

/// Creates [`UinputDevice`]s and [`DevnodeConsumer`]s.
#[derive(Debug, Default)]
pub struct UinputBackend;

impl UinputBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for UinputBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Uinput
    }

    fn create_device(
        &mut self,
        capabilities: &CapabilitySet,
        identity: DeviceIdentity,
    ) -> Result<Box<dyn VirtualDevice>, FuzzError> {
        Ok(Box::new(UinputDevice::create(capabilities, identity)?))
    }

    fn create_consumer(&mut self) -> Result<Box<dyn Consumer>, FuzzError> {
        Ok(Box::new(DevnodeConsumer::new()))
    }
}
