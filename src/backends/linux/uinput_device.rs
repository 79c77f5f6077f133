#![cfg(all(feature = "uinput", target_os = "linux"))]

//! uinput-backed virtual device.
//!
//! [`UinputDevice`] declares the capability set to the kernel and writes events to
//! it. `evdev`'s `VirtualDevice::emit` appends a `SYN_REPORT` to every batch, so
//! events are buffered and handed over as one batch when the frame's own
//! `SYN_REPORT` arrives. Consumers see exactly one terminator per frame.
//!
//! # Declared types
//! `evdev`'s builder covers keys, relative axes, absolute axes (with their
//! `input_absinfo` range), misc codes, switches and force-feedback effects.
//! `EV_LED`, `EV_SND` and `EV_FF_STATUS` capabilities are left undeclared and
//! logged; the kernel then discards their events, as it would for any undeclared
//! code. [`VirtualDevice::declared`] reports the set without them.

use crate::capability::CapabilitySet;
use crate::codes::EventType;
use crate::descriptor::DeviceIdentity;
use crate::device::{DeviceHandle, VirtualDevice};
use crate::error::FuzzError;
use evdev::uinput::{VirtualDevice as EvdevDevice, VirtualDeviceBuilder};
use evdev::{
    AbsInfo, AbsoluteAxisType, AttributeSet, BusType, FFEffectType, InputId, Key, MiscType,
    RelativeAxisType, SwitchType, UinputAbsSetup,
};
use std::io;
use std::path::{Path, PathBuf};

const DECLARABLE: [EventType; 6] = [
    EventType::KEY,
    EventType::RELATIVE,
    EventType::ABSOLUTE,
    EventType::MISC,
    EventType::SWITCH,
    EventType::FORCEFEEDBACK,
];

/// Simultaneous force-feedback effects offered when `EV_FF` is declared.
const FF_EFFECTS_MAX: u32 = 16;

/// The part of `capabilities` a uinput device can declare.
fn declarable(capabilities: &CapabilitySet) -> CapabilitySet {
    capabilities.retain_types(|ty| DECLARABLE.contains(&ty))
}

/// Kernel virtual device created through `/dev/uinput`.
pub struct UinputDevice {
    declared: CapabilitySet,
    raw: EvdevDevice,
    devnode: PathBuf,
    frame: Vec<evdev::InputEvent>,
}

impl UinputDevice {
    /// Declare `capabilities` to the kernel and create the device.
    ///
    /// Fails if the kernel does not publish a device node for it.
    pub fn create(capabilities: &CapabilitySet, identity: DeviceIdentity) -> Result<Self, FuzzError> {
        let fail = |e: io::Error| FuzzError::resource("uinput device", e);

        for ty in capabilities.types() {
            if !DECLARABLE.contains(&ty) {
                tracing::warn!(
                    device = %capabilities.name(),
                    event_type = %ty,
                    codes = capabilities.codes(ty).count(),
                    "uinput backend cannot declare this type; its events will be discarded"
                );
            }
        }
        let declared = declarable(capabilities);

        let mut builder = VirtualDeviceBuilder::new()
            .map_err(fail)?
            .name(declared.name())
            .input_id(InputId::new(
                BusType(identity.bustype),
                identity.vendor,
                identity.product,
                identity.version,
            ));

        if declared.has_type(EventType::KEY) {
            let mut keys = AttributeSet::<Key>::new();
            for code in declared.codes(EventType::KEY) {
                keys.insert(Key::new(code));
            }
            builder = builder.with_keys(&keys).map_err(fail)?;
        }
        if declared.has_type(EventType::RELATIVE) {
            let mut axes = AttributeSet::<RelativeAxisType>::new();
            for code in declared.codes(EventType::RELATIVE) {
                axes.insert(RelativeAxisType(code));
            }
            builder = builder.with_relative_axes(&axes).map_err(fail)?;
        }
        for (code, range) in declared.ranged_codes() {
            let setup = UinputAbsSetup::new(
                AbsoluteAxisType(code),
                AbsInfo::new(range.minimum, range.minimum, range.maximum, 0, 0, 0),
            );
            builder = builder.with_absolute_axis(&setup).map_err(fail)?;
        }
        if declared.has_type(EventType::MISC) {
            let mut misc = AttributeSet::<MiscType>::new();
            for code in declared.codes(EventType::MISC) {
                misc.insert(MiscType(code));
            }
            builder = builder.with_msc(&misc).map_err(fail)?;
        }
        if declared.has_type(EventType::SWITCH) {
            let mut switches = AttributeSet::<SwitchType>::new();
            for code in declared.codes(EventType::SWITCH) {
                switches.insert(SwitchType(code));
            }
            builder = builder.with_switches(&switches).map_err(fail)?;
        }
        if declared.has_type(EventType::FORCEFEEDBACK) {
            let mut effects = AttributeSet::<FFEffectType>::new();
            for code in declared.codes(EventType::FORCEFEEDBACK) {
                effects.insert(FFEffectType(code));
            }
            builder = builder
                .with_ff(&effects)
                .map_err(fail)?
                .with_ff_effects_max(FF_EFFECTS_MAX);
        }

        let mut raw = builder.build().map_err(fail)?;
        let devnode = raw
            .enumerate_dev_nodes_blocking()
            .map_err(fail)?
            .next()
            .transpose()
            .map_err(fail)?
            .ok_or_else(|| {
                fail(io::Error::new(
                    io::ErrorKind::NotFound,
                    "kernel published no device node",
                ))
            })?;

        tracing::debug!(
            device = %declared.name(),
            devnode = %devnode.display(),
            "created uinput device"
        );

        Ok(Self {
            declared,
            raw,
            devnode,
            frame: Vec::new(),
        })
    }
}

impl VirtualDevice for UinputDevice {
    fn name(&self) -> &str {
        self.declared.name()
    }

    fn declared(&self) -> &CapabilitySet {
        &self.declared
    }

    fn devnode(&self) -> Option<&Path> {
        Some(&self.devnode)
    }

    fn handle(&self) -> DeviceHandle {
        DeviceHandle::Devnode(self.devnode.clone())
    }

    /// Buffers the event until `SYN_REPORT`, then emits the whole frame at once.
    ///
    /// A failed emit loses the whole frame and is reported as
    /// [`FuzzError::FrameWrite`] with the number of buffered events.
    fn write_event(
        &mut self,
        event_type: EventType,
        code: u16,
        value: i32,
    ) -> Result<(), FuzzError> {
        if event_type == EventType::SYNCHRONIZATION {
            // `emit` writes the batch followed by SYN_REPORT.
            let events = self.frame.len();
            let result = self.raw.emit(&self.frame);
            self.frame.clear();
            return result.map_err(|source| FuzzError::FrameWrite { events, source });
        }
        self.frame
            .push(evdev::InputEvent::new(evdev::EventType(event_type.0), code, value));
        Ok(())
    }
}

impl Drop for UinputDevice {
    fn drop(&mut self) {
        tracing::debug!(device = %self.declared.name(), "destroying uinput device");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Descriptor;

    fn mixed() -> CapabilitySet {
        let mut caps = CapabilitySet::new("fuzzy device 1");
        caps.enable(EventType::KEY, 1, None);
        caps.enable(EventType::MISC, 4, None);
        caps.enable(EventType::FORCEFEEDBACK, 0x50, None);
        caps.enable(EventType::LED, 0, None);
        caps.enable(EventType::SOUND, 1, None);
        caps.enable(EventType::FORCEFEEDBACKSTATUS, 0, None);
        caps
    }

    #[test]
    fn misc_and_force_feedback_are_declared() {
        let declared = declarable(&mixed());
        assert_eq!(
            declared.types(),
            vec![EventType::KEY, EventType::MISC, EventType::FORCEFEEDBACK]
        );
        assert!(declared.has(EventType::MISC, 4));
        assert!(declared.has(EventType::FORCEFEEDBACK, 0x50));
    }

    #[test]
    fn descriptor_omits_undeclarable_types() {
        let text = Descriptor::capture(&declarable(&mixed())).to_evemu();
        assert!(!text.contains("B: 11"), "{text}");
        assert!(!text.contains("B: 12"), "{text}");
        assert!(!text.contains("B: 17"), "{text}");
        assert!(text.contains("B: 04 10"), "{text}");
        // EV_SYN | EV_KEY | EV_MSC, and EV_FF in the third byte.
        assert!(text.contains("B: 00 13 00 20 00 00 00 00 00\n"), "{text}");
    }
}
