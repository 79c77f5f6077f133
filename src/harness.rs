//! Iteration harness.
//!
//! One iteration:
//! 1. generate a capability set named `"<prefix> <iteration>"`,
//! 2. create the virtual device through the backend,
//! 3. write the banner and the device descriptor to the trace,
//! 4. create the consumer, route its log to `tracing`, assign it and drain it,
//! 5. run an event stream through the device,
//! 6. tear down the device, then the consumer.
//!
//! [`Harness::run`] repeats iterations until the configured limit or until the
//! [`CancellationToken`] fires. Cancellation is only observed between iterations,
//! so a device is never abandoned mid-stream.

use crate::backends::{Backend, Consumer};
use crate::capability::CapabilitySet;
use crate::clock::Clock;
use crate::codes::EventType;
use crate::config::FuzzConfig;
use crate::descriptor::{Descriptor, DeviceIdentity};
use crate::device::VirtualDevice;
use crate::error::FuzzError;
use crate::logger;
use crate::stream::{EventSink, StreamReport, StreamSynthesizer, StreamTargets};
use crate::trace::{self, TraceSink};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Cooperative stop flag, safe to set from a signal handler thread.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A live device with its consumer attached.
///
/// Field order is teardown order: the device goes first.
pub struct DeviceSession {
    device: Box<dyn VirtualDevice>,
    consumer: Box<dyn Consumer>,
}

impl DeviceSession {
    pub fn new(device: Box<dyn VirtualDevice>, consumer: Box<dyn Consumer>) -> Self {
        Self { device, consumer }
    }
}

impl EventSink for DeviceSession {
    fn write_event(
        &mut self,
        event_type: EventType,
        code: u16,
        value: i32,
    ) -> Result<(), FuzzError> {
        self.device.write_event(event_type, code, value)
    }

    fn drain(&mut self) -> Result<usize, FuzzError> {
        Ok(self.consumer.drain()?.len())
    }
}

/// Outcome of one iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IterationReport {
    pub iteration: u64,
    pub capabilities: CapabilitySet,
    pub stream: StreamReport,
}

/// Totals over a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u64,
    pub frames: u64,
    pub events: u64,
    pub cancelled: bool,
}

impl RunSummary {
    fn record(&mut self, report: &IterationReport) {
        self.iterations += 1;
        self.frames += report.stream.frames.len() as u64;
        self.events += report.stream.events() as u64;
    }
}

/// Drives fuzzing iterations against a backend.
pub struct Harness {
    config: FuzzConfig,
    backend: Box<dyn Backend>,
    identity: DeviceIdentity,
}

impl Harness {
    /// Fails if `config` does not validate.
    pub fn new(config: FuzzConfig, backend: Box<dyn Backend>) -> Result<Self, FuzzError> {
        config.validate()?;
        Ok(Self {
            config,
            backend,
            identity: DeviceIdentity::default(),
        })
    }

    /// Bus and ids given to every created device.
    pub fn with_identity(mut self, identity: DeviceIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Run one full iteration. The device and consumer are gone when this returns.
    pub fn run_iteration<R: Rng + ?Sized>(
        &mut self,
        iteration: u64,
        trace: &mut dyn TraceSink,
        clock: &mut dyn Clock,
        rng: &mut R,
    ) -> Result<IterationReport, FuzzError> {
        let name = self.config.device_name(iteration);
        let capabilities =
            CapabilitySet::generate(name.clone(), &self.config.capability_limits(), rng);

        let device = self.backend.create_device(&capabilities, self.identity)?;

        trace
            .banner(&trace::format_banner(&name))
            .map_err(FuzzError::Trace)?;
        let descriptor = Descriptor::capture(device.declared())
            .with_identity(self.identity)
            .render(self.config.descriptor_format)?;
        trace.descriptor(&descriptor).map_err(FuzzError::Trace)?;

        let mut consumer = self.backend.create_consumer()?;
        consumer.set_log_handler(logger::tracing_log_handler());
        consumer.set_log_priority(self.config.log_priority);
        consumer.assign(device.as_ref())?;
        let startup = consumer.drain()?.len();

        let mut session = DeviceSession::new(device, consumer);
        let mut synthesizer = StreamSynthesizer::new(&capabilities, self.config.stream_limits());
        let stream = {
            let mut targets = StreamTargets {
                sink: &mut session,
                trace,
                clock,
            };
            synthesizer.run(&mut targets, rng)?
        };
        drop(session);

        tracing::info!(
            iteration,
            device = %name,
            backend = ?self.backend.kind(),
            capabilities = capabilities.len(),
            frames = stream.frames.len(),
            events = stream.events(),
            drained = startup + stream.drained,
            "iteration complete"
        );

        Ok(IterationReport {
            iteration,
            capabilities,
            stream,
        })
    }

    /// Run iterations from 0 until the iteration limit or cancellation.
    ///
    /// The first error ends the run.
    pub fn run<R: Rng + ?Sized>(
        &mut self,
        trace: &mut dyn TraceSink,
        clock: &mut dyn Clock,
        rng: &mut R,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, FuzzError> {
        let mut summary = RunSummary::default();
        let delay = self.config.iteration_delay();
        let mut iteration = 0u64;

        loop {
            if self.config.iterations.is_some_and(|limit| iteration >= limit) {
                break;
            }
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let report = self.run_iteration(iteration, trace, clock, rng)?;
            summary.record(&report);
            iteration += 1;

            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }

        tracing::info!(
            iterations = summary.iterations,
            frames = summary.frames,
            events = summary.events,
            cancelled = summary.cancelled,
            "run finished"
        );
        Ok(summary)
    }
}
