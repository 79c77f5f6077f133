use fuzzydev::backends::virtual_input::LoopbackBackend;
use fuzzydev::backends::{Backend, Consumer};
use fuzzydev::capability::CapabilitySet;
use fuzzydev::clock::SteppedClock;
use fuzzydev::codes::{EventType, SYN_REPORT};
use fuzzydev::descriptor::{DescriptorFormat, DeviceIdentity};
use fuzzydev::harness::{CancellationToken, DeviceSession, Harness};
use fuzzydev::stream::{StreamLimits, StreamSynthesizer, StreamTargets};
use fuzzydev::trace::MemoryTrace;
use fuzzydev::FuzzConfig;
use rand::rngs::mock::StepRng;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Write;
use std::time::Duration;

fn quick_config(iterations: u64) -> FuzzConfig {
    FuzzConfig {
        iterations: Some(iterations),
        iteration_delay_us: 0,
        max_frames: 20,
        ..FuzzConfig::default()
    }
}

fn run_once(seed: u64, config: FuzzConfig) -> MemoryTrace {
    let mut harness = Harness::new(config, Box::new(LoopbackBackend::new())).unwrap();
    let mut trace = MemoryTrace::new();
    let mut clock = SteppedClock::new(Duration::from_secs(10), Duration::from_micros(1_250));
    harness
        .run(
            &mut trace,
            &mut clock,
            &mut StdRng::seed_from_u64(seed),
            &CancellationToken::new(),
        )
        .unwrap();
    trace
}

#[test]
fn same_seed_same_trace() {
    let a = run_once(99, quick_config(4));
    let b = run_once(99, quick_config(4));
    assert_eq!(a.render(), b.render());
    assert_eq!(a.diagnostics.len(), 4);

    let c = run_once(100, quick_config(4));
    assert_ne!(a.render(), c.render());
}

#[test]
fn single_key_device_through_loopback() {
    let mut caps = CapabilitySet::new("fuzzy device 0");
    caps.enable(EventType::KEY, 30, None);

    let mut backend = LoopbackBackend::new();
    let device = backend.create_device(&caps, DeviceIdentity::default()).unwrap();
    let mut consumer = backend.create_consumer().unwrap();
    consumer.assign(device.as_ref()).unwrap();
    let mut session = DeviceSession::new(device, consumer);

    let mut synth = StreamSynthesizer::new(&caps, StreamLimits::default());
    let mut trace = MemoryTrace::new();
    let mut clock = SteppedClock::new(Duration::ZERO, Duration::from_millis(4));
    let mut rng = StdRng::seed_from_u64(5);
    let mut targets = StreamTargets {
        sink: &mut session,
        trace: &mut trace,
        clock: &mut clock,
    };
    for nevents in [3, 0, 5] {
        synth.emit_frame(nevents, &mut targets, &mut rng).unwrap();
    }

    let lines: Vec<&str> = trace.event_lines().collect();
    assert_eq!(lines.len(), 3 + 1 + 0 + 1 + 5 + 1);
    for line in lines.iter().filter(|l| !l.contains("SYN_REPORT")) {
        assert!(line.contains(" 0001 001e 000"), "{line}");
        assert!(line.contains("# EV_KEY / KEY_A "), "{line}");
        assert!(line.ends_with(" 0") || line.ends_with(" 1"), "{line}");
    }
    assert!(lines[3].ends_with(" +0ms"));
    assert!(lines[4].ends_with(" +4ms"));
    assert!(lines[10].ends_with(" +4ms"));
}

#[test]
fn zero_rng_stream_is_empty() {
    let mut caps = CapabilitySet::new("fuzzy device 0");
    caps.enable(EventType::KEY, 0, None);
    let mut backend = LoopbackBackend::new();
    let device = backend.create_device(&caps, DeviceIdentity::default()).unwrap();
    let consumer = backend.create_consumer().unwrap();
    let mut session = DeviceSession::new(device, consumer);

    let mut synth = StreamSynthesizer::new(&caps, StreamLimits::default());
    let mut trace = MemoryTrace::new();
    let mut clock = SteppedClock::new(Duration::ZERO, Duration::from_millis(1));
    let report = synth
        .run(
            &mut StreamTargets {
                sink: &mut session,
                trace: &mut trace,
                clock: &mut clock,
            },
            &mut StepRng::new(0, 0),
        )
        .unwrap();

    assert!(report.frames.is_empty());
    assert!(trace.output.is_empty());
}

#[test]
fn json_descriptors_parse() {
    let config = FuzzConfig {
        descriptor_format: DescriptorFormat::Json,
        ..quick_config(1)
    };
    let trace = run_once(7, config);
    let descriptor: serde_json::Value = serde_json::from_str(&trace.output[1]).unwrap();
    assert_eq!(descriptor["name"], "fuzzy device 0");
    assert!(descriptor["capabilities"].as_array().is_some_and(|c| !c.is_empty()));
}

#[test]
fn every_frame_ends_with_a_sync_line() {
    let trace = run_once(3, quick_config(3));
    let is_event = |entry: &str| entry.starts_with("E: ");

    // Wherever a run of event lines ends, the last one closes a frame.
    for pair in trace.output.windows(2) {
        if is_event(&pair[0]) && !is_event(&pair[1]) {
            assert!(pair[0].contains("SYN_REPORT"), "{}", pair[0]);
        }
    }
    if let Some(last) = trace.output.last().filter(|l| is_event(l)) {
        assert!(last.contains(&format!("SYN_REPORT ({SYN_REPORT})")), "{last}");
    }
}

#[test]
fn config_file_drives_the_harness() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "device_name_prefix = \"soak\"\niterations = 2\niteration_delay_us = 0\nmax_frames = 3"
    )
    .unwrap();
    let config = FuzzConfig::load(file.path()).unwrap();

    let trace = run_once(11, config);
    assert_eq!(trace.diagnostics.len(), 2);
    assert!(trace.diagnostics[1].contains("soak 1"));
}
