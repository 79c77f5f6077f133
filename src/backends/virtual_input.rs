//! In-process loopback backend.
//!
//! [`LoopbackDevice`] behaves like a uinput device seen through the kernel's evdev
//! core, without touching the kernel:
//! - events for undeclared `(type, code)` pairs are dropped, as evdev drops them,
//! - events are buffered per frame and only become visible on `SYN_REPORT`,
//! - every visible event is timestamped with the device's monotonic clock.
//!
//! [`LoopbackConsumer`] reads that queue the way a real input stack reads a device
//! node, reassembles frames and logs one message per frame at debug priority.
//!
//! Everything is single-threaded (`Rc<RefCell<_>>`), matching the harness.

use crate::backends::{Backend, BackendKind, Consumer, ConsumerLog, LogHandler, LogPriority};
use crate::capability::CapabilitySet;
use crate::clock::{Clock, MonotonicClock};
use crate::codes::EventType;
use crate::descriptor::DeviceIdentity;
use crate::device::{DeviceHandle, VirtualDevice};
use crate::error::FuzzError;
use crate::event::InputEvent;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::path::Path;
use std::rc::Rc;

/// Shared queue between a loopback device and its consumer.
#[derive(Clone, Default)]
pub struct LoopbackQueue(Rc<RefCell<VecDeque<InputEvent>>>);

impl LoopbackQueue {
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    fn extend(&self, events: impl IntoIterator<Item = InputEvent>) {
        self.0.borrow_mut().extend(events);
    }

    fn take_all(&self) -> Vec<InputEvent> {
        self.0.borrow_mut().drain(..).collect()
    }
}

impl fmt::Debug for LoopbackQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackQueue")
            .field("len", &self.len())
            .finish()
    }
}

/// In-memory virtual device.
pub struct LoopbackDevice {
    name: String,
    capabilities: CapabilitySet,
    queue: LoopbackQueue,
    frame: Vec<InputEvent>,
    clock: MonotonicClock,
    dropped: usize,
    written: usize,
    fail_after: Option<usize>,
}

impl LoopbackDevice {
    pub fn new(capabilities: &CapabilitySet) -> Self {
        Self {
            name: capabilities.name().to_string(),
            capabilities: capabilities.clone(),
            queue: LoopbackQueue::default(),
            frame: Vec::new(),
            clock: MonotonicClock::new(),
            dropped: 0,
            written: 0,
            fail_after: None,
        }
    }

    /// Fail every write after the first `writes` successful ones.
    pub fn fail_after(mut self, writes: usize) -> Self {
        self.fail_after = Some(writes);
        self
    }

    /// Events discarded because the device never declared them.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Successful writes so far, sync markers included.
    pub fn written(&self) -> usize {
        self.written
    }
}

impl VirtualDevice for LoopbackDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn declared(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn devnode(&self) -> Option<&Path> {
        None
    }

    fn handle(&self) -> DeviceHandle {
        DeviceHandle::Loopback(self.queue.clone())
    }

    fn write_event(
        &mut self,
        event_type: EventType,
        code: u16,
        value: i32,
    ) -> Result<(), FuzzError> {
        if self.fail_after.is_some_and(|limit| self.written >= limit) {
            return Err(FuzzError::write(
                event_type,
                code,
                io::Error::new(io::ErrorKind::BrokenPipe, "loopback device closed"),
            ));
        }
        self.written += 1;

        let now = self.clock.now();
        let event = InputEvent::new(now, event_type, code, value);
        if event.is_sync() {
            self.frame.push(event);
            self.queue.extend(self.frame.drain(..));
        } else if self.capabilities.has(event_type, code) {
            self.frame.push(event);
        } else {
            self.dropped += 1;
            tracing::trace!(device = %self.name, %event_type, code, "dropping undeclared event");
        }
        Ok(())
    }
}

/// Consumer reading a loopback device's queue.
pub struct LoopbackConsumer {
    queue: Option<LoopbackQueue>,
    pending: VecDeque<InputEvent>,
    frame_len: usize,
    frames: u64,
    log: ConsumerLog,
}

impl LoopbackConsumer {
    pub fn new() -> Self {
        Self {
            queue: None,
            pending: VecDeque::new(),
            frame_len: 0,
            frames: 0,
            log: ConsumerLog::new(),
        }
    }

    /// Complete frames seen so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for LoopbackConsumer {
    fn default() -> Self {
        Self::new()
    }
}

impl Consumer for LoopbackConsumer {
    fn assign(&mut self, device: &dyn VirtualDevice) -> Result<(), FuzzError> {
        match device.handle() {
            DeviceHandle::Loopback(queue) => {
                let name = device.name().to_string();
                self.log
                    .log(LogPriority::Info, || format!("{name}: added loopback device"));
                self.queue = Some(queue);
                Ok(())
            }
            DeviceHandle::Devnode(path) => Err(FuzzError::resource(
                "loopback consumer",
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("cannot attach to device node {}", path.display()),
                ),
            )),
        }
    }

    fn dispatch(&mut self) -> Result<(), FuzzError> {
        let Some(queue) = self.queue.as_ref() else {
            return Ok(());
        };
        for event in queue.take_all() {
            if event.is_sync() {
                self.frames += 1;
                let (frames, len) = (self.frames, self.frame_len);
                self.log.log(LogPriority::Debug, || {
                    format!("frame {frames}: {len} event(s)")
                });
                self.frame_len = 0;
            } else {
                self.frame_len += 1;
            }
            self.pending.push_back(event);
        }
        Ok(())
    }

    fn next_event(&mut self) -> Option<InputEvent> {
        self.pending.pop_front()
    }

    fn set_log_handler(&mut self, handler: LogHandler) {
        self.log.set_handler(handler);
    }

    fn set_log_priority(&mut self, priority: LogPriority) {
        self.log.set_priority(priority);
    }
}

/// Creates [`LoopbackDevice`]s and [`LoopbackConsumer`]s.
#[derive(Debug, Default)]
pub struct LoopbackBackend {
    fail_after: Option<usize>,
}

impl LoopbackBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Devices created by this backend fail every write after the first `writes`.
    pub fn failing_after(writes: usize) -> Self {
        Self {
            fail_after: Some(writes),
        }
    }
}

impl Backend for LoopbackBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Loopback
    }

    fn create_device(
        &mut self,
        capabilities: &CapabilitySet,
        _identity: DeviceIdentity,
    ) -> Result<Box<dyn VirtualDevice>, FuzzError> {
        let device = LoopbackDevice::new(capabilities);
        let device = match self.fail_after {
            Some(writes) => device.fail_after(writes),
            None => device,
        };
        tracing::debug!(device = %capabilities.name(), "created loopback device");
        Ok(Box::new(device))
    }

    fn create_consumer(&mut self) -> Result<Box<dyn Consumer>, FuzzError> {
        Ok(Box::new(LoopbackConsumer::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::SYN_REPORT;

    fn device() -> LoopbackDevice {
        let mut caps = CapabilitySet::new("loop");
        caps.enable(EventType::KEY, 30, None);
        caps.enable(EventType::RELATIVE, 0, None);
        LoopbackDevice::new(&caps)
    }

    #[test]
    fn events_become_visible_on_sync() {
        let mut dev = device();
        let mut consumer = LoopbackConsumer::new();
        consumer.assign(&dev).unwrap();

        dev.write_event(EventType::KEY, 30, 1).unwrap();
        dev.write_event(EventType::RELATIVE, 0, 7).unwrap();
        assert!(consumer.drain().unwrap().is_empty());

        dev.write_event(EventType::SYNCHRONIZATION, SYN_REPORT, 0).unwrap();
        let drained = consumer.drain().unwrap();
        assert_eq!(drained.len(), 3);
        assert!(drained[2].is_sync());
        assert_eq!(consumer.frames(), 1);
        assert!(consumer.drain().unwrap().is_empty());
    }

    #[test]
    fn undeclared_codes_are_dropped() {
        let mut dev = device();
        dev.write_event(EventType::KEY, 31, 1).unwrap();
        dev.write_event(EventType::ABSOLUTE, 0, 1).unwrap();
        dev.write_event(EventType::SYNCHRONIZATION, SYN_REPORT, 0).unwrap();
        assert_eq!(dev.dropped(), 2);
        assert_eq!(dev.queue.len(), 1);
    }

    #[test]
    fn failing_device_stops_accepting_writes() {
        let mut dev = device().fail_after(2);
        dev.write_event(EventType::KEY, 30, 1).unwrap();
        dev.write_event(EventType::KEY, 30, 0).unwrap();
        let err = dev.write_event(EventType::KEY, 30, 1).unwrap_err();
        assert!(matches!(err, FuzzError::Write { code: 30, .. }));
        assert_eq!(dev.written(), 2);
    }

    #[test]
    fn consumer_logs_frames_at_debug() {
        let messages = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&messages);

        let mut dev = device();
        let mut consumer = LoopbackConsumer::new();
        consumer.set_log_handler(Box::new(move |_, msg| sink.borrow_mut().push(msg.to_string())));
        consumer.set_log_priority(LogPriority::Debug);
        consumer.assign(&dev).unwrap();

        dev.write_event(EventType::KEY, 30, 1).unwrap();
        dev.write_event(EventType::SYNCHRONIZATION, SYN_REPORT, 0).unwrap();
        consumer.drain().unwrap();

        let messages = messages.borrow();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], "loop: added loopback device");
        assert_eq!(messages[1], "frame 1: 1 event(s)");
    }

    #[test]
    fn consumer_rejects_device_nodes() {
        struct NodeDevice(CapabilitySet);
        impl VirtualDevice for NodeDevice {
            fn name(&self) -> &str {
                "node"
            }
            fn declared(&self) -> &CapabilitySet {
                &self.0
            }
            fn devnode(&self) -> Option<&Path> {
                Some(Path::new("/dev/input/event99"))
            }
            fn handle(&self) -> DeviceHandle {
                DeviceHandle::Devnode("/dev/input/event99".into())
            }
            fn write_event(&mut self, _: EventType, _: u16, _: i32) -> Result<(), FuzzError> {
                Ok(())
            }
        }

        let mut consumer = LoopbackConsumer::new();
        assert!(matches!(
            consumer.assign(&NodeDevice(CapabilitySet::new("node"))),
            Err(FuzzError::ResourceCreation { .. })
        ));
    }
}
