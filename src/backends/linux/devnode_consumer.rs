#![cfg(all(feature = "uinput", target_os = "linux"))]

//! Consumer reading a kernel device node.
//!
//! Opens `/dev/input/eventN` with `O_NONBLOCK` and decodes raw `struct input_event`
//! records. A read that would block means the consumer has caught up. Partial
//! records are carried over to the next read.

use crate::backends::{Consumer, ConsumerLog, LogHandler, LogPriority};
use crate::codes::EventType;
use crate::device::{DeviceHandle, VirtualDevice};
use crate::error::FuzzError;
use crate::event::InputEvent;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::time::Duration;

/// Size of `struct input_event` on this platform.
const RECORD_LEN: usize = std::mem::size_of::<libc::input_event>();
/// Size of the leading `struct timeval`.
const TIME_LEN: usize = RECORD_LEN - 8;

/// Input stack stand-in that reads a device node.
pub struct DevnodeConsumer {
    file: Option<File>,
    carry: Vec<u8>,
    pending: VecDeque<InputEvent>,
    log: ConsumerLog,
}

impl DevnodeConsumer {
    pub fn new() -> Self {
        Self {
            file: None,
            carry: Vec::new(),
            pending: VecDeque::new(),
            log: ConsumerLog::new(),
        }
    }
}

impl Default for DevnodeConsumer {
    fn default() -> Self {
        Self::new()
    }
}

impl Consumer for DevnodeConsumer {
    fn assign(&mut self, device: &dyn VirtualDevice) -> Result<(), FuzzError> {
        let path = match device.handle() {
            DeviceHandle::Devnode(path) => path,
            DeviceHandle::Loopback(_) => {
                return Err(FuzzError::resource(
                    "device node consumer",
                    io::Error::new(io::ErrorKind::InvalidInput, "device has no device node"),
                ))
            }
        };
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&path)
            .map_err(|e| FuzzError::resource("device node consumer", e))?;

        let shown = path.display().to_string();
        self.log
            .log(LogPriority::Info, || format!("{shown}: added device"));
        self.file = Some(file);
        Ok(())
    }

    fn dispatch(&mut self) -> Result<(), FuzzError> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        let mut buf = [0u8; RECORD_LEN * 64];
        loop {
            match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => self.carry.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(FuzzError::Drain(e)),
            }
        }

        let whole = self.carry.len() / RECORD_LEN * RECORD_LEN;
        for record in self.carry[..whole].chunks_exact(RECORD_LEN) {
            if let Some(event) = decode(record) {
                if event.event_type == EventType::SYNCHRONIZATION && event.code != 0 {
                    let code = event.code;
                    self.log
                        .log(LogPriority::Error, || format!("unexpected EV_SYN code {code}"));
                }
                self.pending.push_back(event);
            }
        }
        self.carry.drain(..whole);
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

/// Decode one native-endian `struct input_event`.
fn decode(record: &[u8]) -> Option<InputEvent> {
    let half = TIME_LEN / 2;
    let sec = read_signed(record.get(..half)?)?;
    let usec = read_signed(record.get(half..TIME_LEN)?)?;
    let ty = u16::from_ne_bytes(record.get(TIME_LEN..TIME_LEN + 2)?.try_into().ok()?);
    let code = u16::from_ne_bytes(record.get(TIME_LEN + 2..TIME_LEN + 4)?.try_into().ok()?);
    let value = i32::from_ne_bytes(record.get(TIME_LEN + 4..TIME_LEN + 8)?.try_into().ok()?);

    let timestamp = Duration::new(
        u64::try_from(sec).unwrap_or(0),
        u32::try_from(usec.clamp(0, 999_999) * 1000).unwrap_or(0),
    );
    Some(InputEvent::new(timestamp, EventType(ty), code, value))
}

fn read_signed(bytes: &[u8]) -> Option<i64> {
    match bytes.len() {
        8 => Some(i64::from_ne_bytes(bytes.try_into().ok()?)),
        4 => Some(i64::from(i32::from_ne_bytes(bytes.try_into().ok()?))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sec: i64, usec: i64, ty: u16, code: u16, value: i32) -> Vec<u8> {
        let mut out = Vec::with_capacity(RECORD_LEN);
        match TIME_LEN {
            16 => {
                out.extend_from_slice(&sec.to_ne_bytes());
                out.extend_from_slice(&usec.to_ne_bytes());
            }
            _ => {
                out.extend_from_slice(&(sec as i32).to_ne_bytes());
                out.extend_from_slice(&(usec as i32).to_ne_bytes());
            }
        }
        out.extend_from_slice(&ty.to_ne_bytes());
        out.extend_from_slice(&code.to_ne_bytes());
        out.extend_from_slice(&value.to_ne_bytes());
        out
    }

    #[test]
    fn decodes_native_records() {
        let raw = record(42, 1_500, 0x01, 0x1e, 1);
        assert_eq!(raw.len(), RECORD_LEN);
        let event = decode(&raw).unwrap();
        assert_eq!(event.timestamp, Duration::new(42, 1_500_000));
        assert_eq!(event.event_type, EventType::KEY);
        assert_eq!(event.code, 0x1e);
        assert_eq!(event.value, 1);
    }

    #[test]
    fn short_records_are_rejected() {
        let raw = record(0, 0, 0, 0, 0);
        assert!(decode(&raw[..RECORD_LEN - 1]).is_none());
    }
}
