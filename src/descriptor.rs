//! Device descriptors.
//!
//! Before any events are sent, each iteration records the device it just created so
//! the trace can be paired with a device for replay. [`Descriptor`] is that record:
//! name, bus/vendor/product ids, declared event bits and absolute axis ranges.
//!
//! Two renderings are supported ([`DescriptorFormat`]):
//! - **`evemu`** (default): the `evemu-record` text format (`N:`, `I:`, `P:`, `B:`,
//!   `A:` lines, preceded by a commented summary). Together with the `E:` lines of the
//!   trace it forms a complete recording `evemu-device`/`evemu-play` can replay.
//! - **`json`**: the same data as a single JSON document.
//!
//! # Conventions
//! - `B: 00` lines hold the event *type* mask; `B: <type>` lines hold each type's
//!   code mask. Masks are written 8 bytes per line, least significant byte first.
//! - `A:` lines are `code min max fuzz flat resolution`; fuzz, flat and resolution
//!   are always `0` for fuzzed devices.

use crate::capability::CapabilitySet;
use crate::codes::{self, EventType};
use crate::error::FuzzError;
use crate::event::Capability;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `BUS_VIRTUAL` from `linux/input.h`.
pub const BUS_VIRTUAL: u16 = 0x06;

/// Bus and USB-style identity of a device (`struct input_id`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub bustype: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            bustype: BUS_VIRTUAL,
            vendor: 0,
            product: 0,
            version: 0,
        }
    }
}

/// One absolute axis and its `input_absinfo` range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsAxis {
    pub code: u16,
    pub minimum: i32,
    pub maximum: i32,
    pub fuzz: i32,
    pub flat: i32,
    pub resolution: i32,
}

/// How descriptors are rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorFormat {
    #[default]
    Evemu,
    Json,
}

/// Serializable snapshot of a synthetic device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub name: String,
    pub identity: DeviceIdentity,
    /// Input properties (`INPUT_PROP_*`); fuzzed devices declare none.
    pub properties: Vec<u16>,
    /// Declared `(type, code)` pairs, ascending.
    pub capabilities: Vec<Capability>,
    /// Absolute axes, ascending by code.
    pub abs_axes: Vec<AbsAxis>,
}

impl Descriptor {
    /// Record the device declared by `caps`.
    pub fn capture(caps: &CapabilitySet) -> Self {
        Self {
            name: caps.name().to_string(),
            identity: DeviceIdentity::default(),
            properties: Vec::new(),
            capabilities: caps.to_vec(),
            abs_axes: caps
                .ranged_codes()
                .map(|(code, range)| AbsAxis {
                    code,
                    minimum: range.minimum,
                    maximum: range.maximum,
                    fuzz: 0,
                    flat: 0,
                    resolution: 0,
                })
                .collect(),
        }
    }

    pub fn with_identity(mut self, identity: DeviceIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn render(&self, format: DescriptorFormat) -> Result<String, FuzzError> {
        match format {
            DescriptorFormat::Evemu => Ok(self.to_evemu()),
            DescriptorFormat::Json => self.to_json(),
        }
    }

    pub fn to_json(&self) -> Result<String, FuzzError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Declared types, always including `EV_SYN`.
    fn event_types(&self) -> Vec<EventType> {
        let mut types = vec![EventType::SYNCHRONIZATION];
        types.extend(self.capabilities.iter().map(|c| c.event_type));
        types.sort();
        types.dedup();
        types
    }

    fn codes_of(&self, event_type: EventType) -> impl Iterator<Item = u16> + '_ {
        self.capabilities
            .iter()
            .filter(move |c| c.event_type == event_type)
            .map(|c| c.code)
    }

    pub fn to_evemu(&self) -> String {
        let mut out = String::new();
        // Writing into a `String` only fails if a `Display` impl does.
        if self.write_evemu(&mut out).is_err() {
            tracing::warn!(device = %self.name, "evemu descriptor rendering was cut short");
        }
        out
    }

    /// Write the evemu-record rendering: commented summary, then `N:`, `I:`,
    /// `P:`, `B:` and `A:` lines.
    pub fn write_evemu(&self, out: &mut impl fmt::Write) -> fmt::Result {
        let id = &self.identity;
        let types = self.event_types();

        writeln!(out, "# EVEMU 1.3")?;
        writeln!(out, "# Input device name: \"{}\"", self.name)?;
        writeln!(
            out,
            "# Input device ID: bus {:#04x} vendor {:#06x} product {:#06x} version {:#06x}",
            id.bustype, id.vendor, id.product, id.version
        )?;
        writeln!(out, "# Supported events:")?;
        for &ty in &types {
            writeln!(
                out,
                "#   Event type {} ({})",
                ty.0,
                ty.name().unwrap_or(crate::trace::UNKNOWN_NAME)
            )?;
            if ty == EventType::SYNCHRONIZATION {
                writeln!(out, "#     Event code 0 (SYN_REPORT)")?;
                continue;
            }
            for code in self.codes_of(ty) {
                writeln!(
                    out,
                    "#     Event code {} ({})",
                    code,
                    codes::code_name(ty, code).unwrap_or(crate::trace::UNKNOWN_NAME)
                )?;
                if ty == EventType::ABSOLUTE {
                    if let Some(axis) = self.abs_axes.iter().find(|a| a.code == code) {
                        writeln!(out, "#       Value   {:>6}", 0)?;
                        writeln!(out, "#       Min     {:>6}", axis.minimum)?;
                        writeln!(out, "#       Max     {:>6}", axis.maximum)?;
                        writeln!(out, "#       Fuzz    {:>6}", axis.fuzz)?;
                        writeln!(out, "#       Flat    {:>6}", axis.flat)?;
                        writeln!(out, "#       Resolution {:>3}", axis.resolution)?;
                    }
                }
            }
        }
        writeln!(out, "# Properties:")?;
        for prop in &self.properties {
            writeln!(out, "#   Property  type {prop}")?;
        }

        writeln!(out, "N: {}", self.name)?;
        writeln!(
            out,
            "I: {:04x} {:04x} {:04x} {:04x}",
            id.bustype, id.vendor, id.product, id.version
        )?;
        write_mask(out, "P:", None, self.properties.iter().copied(), 0x1f)?;
        write_mask(out, "B:", Some(0), types.iter().map(|t| t.0), EventType::MAX.0)?;
        for &ty in types.iter().filter(|&&t| t != EventType::SYNCHRONIZATION) {
            if let Some(max) = ty.max_code() {
                write_mask(out, "B:", Some(ty.0), self.codes_of(ty), max)?;
            }
        }
        for axis in &self.abs_axes {
            writeln!(
                out,
                "A: {:02x} {} {} {} {} {}",
                axis.code, axis.minimum, axis.maximum, axis.fuzz, axis.flat, axis.resolution
            )?;
        }
        Ok(())
    }
}

/// Write a bitmask covering bits `0..=max_bit`, eight bytes per line.
fn write_mask(
    out: &mut impl fmt::Write,
    tag: &str,
    type_prefix: Option<u16>,
    bits: impl Iterator<Item = u16>,
    max_bit: u16,
) -> fmt::Result {
    let nbytes = (usize::from(max_bit) + 1 + 7) / 8;
    let padded = (nbytes + 7) / 8 * 8;
    let mut bytes = vec![0u8; padded];
    for bit in bits.filter(|&b| b <= max_bit) {
        let bit = usize::from(bit);
        bytes[bit / 8] |= 1 << (bit % 8);
    }
    for chunk in bytes.chunks(8) {
        out.write_str(tag)?;
        if let Some(ty) = type_prefix {
            write!(out, " {ty:02x}")?;
        }
        for b in chunk {
            write!(out, " {b:02x}")?;
        }
        out.write_char('\n')?;
    }
    Ok(())
}
