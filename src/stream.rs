//! Randomized event streams.
//!
//! [`StreamSynthesizer`] drives one fuzzing session against a device built from a
//! [`CapabilitySet`]:
//!
//! 1. flatten the capability set into an ascending `(type, code)` list,
//! 2. draw a frame count in `[0, max_frames)`,
//! 3. per frame, draw an event count in `[0, max_events_per_frame)`, pick that many
//!    pairs uniformly *with replacement*, synthesize a value for each, write and trace
//!    them, then close the frame with `SYN_REPORT` and drain the consumer.
//!
//! Sampling with replacement means one code can be driven to contradictory values
//! within a single frame. That is part of the fuzzing distribution and is kept.
//!
//! # Failure
//! The first failed write (device, consumer drain or trace) ends the session. No
//! retry, no rollback: nothing is written after the failing call.

use crate::capability::CapabilitySet;
use crate::clock::Clock;
use crate::codes::{EventType, SYN_REPORT};
use crate::error::FuzzError;
use crate::event::{Capability, EventFrame, InputEvent};
use crate::trace::{self, TraceSink};
use crate::value::{synthesize_bounded, DEFAULT_VALUE_BOUND};
use rand::Rng;
use std::time::Duration;

/// Default exclusive upper bound of frames per session.
pub const DEFAULT_MAX_FRAMES: u32 = 200;
/// Default exclusive upper bound of events per frame.
pub const DEFAULT_MAX_EVENTS_PER_FRAME: u32 = 12;

/// Receives synthesized events as if they came from hardware.
pub trait EventSink {
    /// Deliver one event, in emission order.
    fn write_event(&mut self, event_type: EventType, code: u16, value: i32)
        -> Result<(), FuzzError>;

    /// Make the consumer process everything buffered so far and discard it.
    ///
    /// Synchronous: returns once the consumer has nothing left. Returns the number
    /// of consumer events discarded.
    fn drain(&mut self) -> Result<usize, FuzzError>;
}

/// Size limits of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamLimits {
    /// Frames are drawn from `[0, max_frames)`.
    pub max_frames: u32,
    /// Events per frame are drawn from `[0, max_events_per_frame)`.
    pub max_events_per_frame: u32,
    /// Non-binary values are drawn from `[0, value_bound)`.
    pub value_bound: i32,
}

impl Default for StreamLimits {
    fn default() -> Self {
        Self {
            max_frames: DEFAULT_MAX_FRAMES,
            max_events_per_frame: DEFAULT_MAX_EVENTS_PER_FRAME,
            value_bound: DEFAULT_VALUE_BOUND,
        }
    }
}

/// Where a session's side effects go.
pub struct StreamTargets<'a> {
    pub sink: &'a mut dyn EventSink,
    pub trace: &'a mut dyn TraceSink,
    pub clock: &'a mut dyn Clock,
}

/// What a completed session emitted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamReport {
    /// Frames in emission order (terminators implicit).
    pub frames: Vec<EventFrame>,
    /// Consumer events discarded by drains.
    pub drained: usize,
}

impl StreamReport {
    /// Non-sync events written across all frames.
    pub fn events(&self) -> usize {
        self.frames.iter().map(EventFrame::len).sum()
    }
}

/// Event-stream generator for one capability set.
#[derive(Clone, Debug)]
pub struct StreamSynthesizer {
    pairs: Vec<Capability>,
    limits: StreamLimits,
    last_frame: Option<Duration>,
    drained: usize,
}

impl StreamSynthesizer {
    pub fn new(capabilities: &CapabilitySet, limits: StreamLimits) -> Self {
        Self {
            pairs: capabilities.to_vec(),
            limits,
            last_frame: None,
            drained: 0,
        }
    }

    /// Flattened `(type, code)` list, ascending.
    pub fn pairs(&self) -> &[Capability] {
        &self.pairs
    }

    /// Run a full session: random frame count, random events per frame.
    pub fn run<R: Rng + ?Sized>(
        &mut self,
        targets: &mut StreamTargets<'_>,
        rng: &mut R,
    ) -> Result<StreamReport, FuzzError> {
        let nframes = rng.gen_range(0..self.limits.max_frames.max(1));
        let drained_before = self.drained;
        let mut frames = Vec::with_capacity(nframes as usize);

        for _ in 0..nframes {
            let nevents = rng.gen_range(0..self.limits.max_events_per_frame.max(1));
            frames.push(self.emit_frame(nevents, targets, rng)?);
        }

        let report = StreamReport {
            frames,
            drained: self.drained - drained_before,
        };
        tracing::debug!(
            frames = report.frames.len(),
            events = report.events(),
            drained = report.drained,
            "event stream complete"
        );
        Ok(report)
    }

    /// Emit one frame of `nevents` random events followed by `SYN_REPORT`, then
    /// drain the consumer.
    ///
    /// With no capabilities to sample from, the frame is just its terminator.
    pub fn emit_frame<R: Rng + ?Sized>(
        &mut self,
        nevents: u32,
        targets: &mut StreamTargets<'_>,
        rng: &mut R,
    ) -> Result<EventFrame, FuzzError> {
        let timestamp = targets.clock.now();
        let dt_us = self
            .last_frame
            .map_or(0, |prev| elapsed_micros(prev, timestamp));
        self.last_frame = Some(timestamp);

        let mut frame = EventFrame {
            timestamp,
            dt_us,
            events: Vec::with_capacity(nevents as usize),
        };

        if !self.pairs.is_empty() {
            for _ in 0..nevents {
                let pick = self.pairs[rng.gen_range(0..self.pairs.len())];
                let value = synthesize_bounded(pick.event_type, self.limits.value_bound, rng);
                let event = InputEvent::new(timestamp, pick.event_type, pick.code, value);

                targets.sink.write_event(pick.event_type, pick.code, value)?;
                targets
                    .trace
                    .line(&trace::format_input_event(&event))
                    .map_err(FuzzError::Trace)?;
                frame.events.push(event);
            }
        }

        targets
            .sink
            .write_event(EventType::SYNCHRONIZATION, SYN_REPORT, 0)?;
        targets
            .trace
            .line(&trace::format_sync(timestamp, dt_us))
            .map_err(FuzzError::Trace)?;
        self.drained += targets.sink.drain()?;

        Ok(frame)
    }
}

/// Signed microseconds from `prev` to `now`, each truncated to whole microseconds.
fn elapsed_micros(prev: Duration, now: Duration) -> i64 {
    let delta = now.as_micros() as i128 - prev.as_micros() as i128;
    delta.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SteppedClock;
    use crate::trace::MemoryTrace;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io;

    /// Records every write; can be told to fail on the n-th one.
    #[derive(Default)]
    struct RecordingSink {
        written: Vec<(EventType, u16, i32)>,
        drains: usize,
        fail_on: Option<usize>,
    }

    impl EventSink for RecordingSink {
        fn write_event(
            &mut self,
            event_type: EventType,
            code: u16,
            value: i32,
        ) -> Result<(), FuzzError> {
            if self.fail_on == Some(self.written.len() + 1) {
                return Err(FuzzError::write(
                    event_type,
                    code,
                    io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"),
                ));
            }
            self.written.push((event_type, code, value));
            Ok(())
        }

        fn drain(&mut self) -> Result<usize, FuzzError> {
            self.drains += 1;
            Ok(0)
        }
    }

    fn key_device() -> CapabilitySet {
        let mut caps = CapabilitySet::new("fuzzy device 0");
        caps.enable(EventType::KEY, 1, None);
        caps
    }

    #[test]
    fn elapsed_is_signed() {
        let a = Duration::from_micros(1_000);
        let b = Duration::from_micros(3_500);
        assert_eq!(elapsed_micros(a, b), 2_500);
        assert_eq!(elapsed_micros(b, a), -2_500);
    }

    #[test]
    fn single_key_frame() {
        let caps = key_device();
        let mut synth = StreamSynthesizer::new(&caps, StreamLimits::default());
        let mut sink = RecordingSink::default();
        let mut trace = MemoryTrace::new();
        let mut clock = SteppedClock::new(Duration::from_secs(5), Duration::from_millis(8));
        let mut rng = StdRng::seed_from_u64(1);

        let frame = {
            let mut targets = StreamTargets {
                sink: &mut sink,
                trace: &mut trace,
                clock: &mut clock,
            };
            synth.emit_frame(1, &mut targets, &mut rng).unwrap()
        };

        let lines: Vec<&str> = trace.event_lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("E: 5.000000 0001 0001 000"), "{}", lines[0]);
        assert!(lines[0].contains("# EV_KEY / KEY_ESC"));
        assert!(matches!(frame.events[0].value, 0 | 1));
        assert!(lines[1].ends_with("---------- +0ms"), "{}", lines[1]);

        assert_eq!(sink.written.len(), 2);
        assert_eq!(sink.written[1], (EventType::SYNCHRONIZATION, SYN_REPORT, 0));
        assert_eq!(sink.drains, 1);
    }

    #[test]
    fn second_frame_reports_elapsed_time() {
        let caps = key_device();
        let mut synth = StreamSynthesizer::new(&caps, StreamLimits::default());
        let mut sink = RecordingSink::default();
        let mut trace = MemoryTrace::new();
        let mut clock = SteppedClock::new(Duration::ZERO, Duration::from_millis(8));
        let mut rng = StdRng::seed_from_u64(2);
        let mut targets = StreamTargets {
            sink: &mut sink,
            trace: &mut trace,
            clock: &mut clock,
        };

        let first = synth.emit_frame(0, &mut targets, &mut rng).unwrap();
        let second = synth.emit_frame(0, &mut targets, &mut rng).unwrap();
        assert_eq!(first.dt_us, 0);
        assert_eq!(second.dt_us, 8_000);
        assert!(trace.output[1].ends_with(" +8ms"));
    }

    #[test]
    fn empty_capability_set_only_syncs() {
        let caps = CapabilitySet::new("empty");
        let mut synth = StreamSynthesizer::new(&caps, StreamLimits::default());
        let mut sink = RecordingSink::default();
        let mut trace = MemoryTrace::new();
        let mut clock = SteppedClock::new(Duration::ZERO, Duration::from_millis(1));
        let mut rng = StdRng::seed_from_u64(3);
        let mut targets = StreamTargets {
            sink: &mut sink,
            trace: &mut trace,
            clock: &mut clock,
        };

        let frame = synth.emit_frame(5, &mut targets, &mut rng).unwrap();
        assert!(frame.is_empty());
        assert_eq!(sink.written, vec![(EventType::SYNCHRONIZATION, SYN_REPORT, 0)]);
    }

    #[test]
    fn failed_write_stops_the_session() {
        let mut caps = CapabilitySet::new("dev");
        caps.enable(EventType::KEY, 30, None);
        caps.enable(EventType::RELATIVE, 0, None);
        let mut synth = StreamSynthesizer::new(&caps, StreamLimits::default());
        let mut sink = RecordingSink {
            fail_on: Some(3),
            ..RecordingSink::default()
        };
        let mut trace = MemoryTrace::new();
        let mut clock = SteppedClock::new(Duration::ZERO, Duration::from_millis(1));
        let mut rng = StdRng::seed_from_u64(4);
        let mut targets = StreamTargets {
            sink: &mut sink,
            trace: &mut trace,
            clock: &mut clock,
        };

        let err = synth.emit_frame(10, &mut targets, &mut rng).unwrap_err();
        assert!(matches!(err, FuzzError::Write { .. }));
        assert_eq!(sink.written.len(), 2);
        assert_eq!(trace.output.len(), 2);
        assert_eq!(sink.drains, 0);
    }

    #[test]
    fn run_respects_limits() {
        let mut caps = CapabilitySet::new("dev");
        caps.enable(EventType::ABSOLUTE, 0, None);
        caps.enable(EventType::SWITCH, 0, None);
        let limits = StreamLimits {
            max_frames: 4,
            max_events_per_frame: 3,
            value_bound: 10,
        };
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let mut synth = StreamSynthesizer::new(&caps, limits);
            let mut sink = RecordingSink::default();
            let mut trace = MemoryTrace::new();
            let mut clock = SteppedClock::new(Duration::ZERO, Duration::from_millis(1));
            let mut targets = StreamTargets {
                sink: &mut sink,
                trace: &mut trace,
                clock: &mut clock,
            };
            let report = synth.run(&mut targets, &mut rng).unwrap();

            assert!(report.frames.len() < 4);
            assert!(report.frames.iter().all(|f| f.len() < 3));
            assert_eq!(sink.drains, report.frames.len());
            let syncs = sink
                .written
                .iter()
                .filter(|(t, _, _)| *t == EventType::SYNCHRONIZATION)
                .count();
            assert_eq!(syncs, report.frames.len());
            assert!(report
                .frames
                .iter()
                .flat_map(|f| &f.events)
                .all(|e| (0..10).contains(&e.value)));
        }
    }
}
