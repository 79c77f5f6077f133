use crate::backends::virtual_input::LoopbackQueue;
use crate::capability::CapabilitySet;
use crate::codes::EventType;
use crate::error::FuzzError;
use std::path::{Path, PathBuf};

/// A synthetic input device created from a capability set.
///
/// Dropping the device tears it down (for uinput: destroys the kernel device).
pub trait VirtualDevice {
    fn name(&self) -> &str;

    /// What the device actually declared. A backend that cannot declare some
    /// types reports the set without them.
    fn declared(&self) -> &CapabilitySet;

    /// Device node (`/dev/input/eventN`), when the backend exposes one.
    fn devnode(&self) -> Option<&Path>;

    /// How a consumer attaches to this device.
    fn handle(&self) -> DeviceHandle;

    /// Write one event. Events become visible to consumers once their frame's
    /// `SYN_REPORT` is written.
    fn write_event(&mut self, event_type: EventType, code: u16, value: i32)
        -> Result<(), FuzzError>;
}

/// What a [`Consumer`](crate::backends::Consumer) is assigned to.
#[derive(Clone, Debug)]
pub enum DeviceHandle {
    /// In-process event queue of a loopback device.
    Loopback(LoopbackQueue),
    /// Kernel device node.
    Devnode(PathBuf),
}
