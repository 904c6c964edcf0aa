//! End-to-end scenarios driving real multi-threaded graphs, and one
//! deterministic single-block check via the test fixture.

mod common;

use std::f64::consts::PI;
use std::time::Duration;

use flowrunner::prelude::*;
use flowrunner::testing::{assert_allclose, Fixture};

use common::{
    AddBlock, BenchmarkSink, CaptureSink, DownsamplerBlock, FlakyBlock, GainFilter, MultiplyBlock,
    RateSource, SlowSource, ValueSource, ZeroSource,
};

#[test]
fn zero_source_chain_joins_cleanly() {
    let mut graph = Graph::new(GraphOptions::default());
    let source = graph.add(ZeroSource::new(100));
    let (sink, count) = BenchmarkSink::new();
    let sink = graph.add(sink);
    graph.connect(source, sink).unwrap();

    assert!(graph.run());
    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 100);
}

#[test]
fn downsampler_matches_reference_vector() {
    let input: Vec<f32> = (0..64)
        .map(|i| (2.0 * PI * 50.0 * i as f64 / 1000.0).cos() as f32)
        .collect();
    let expected: Vec<f32> = (0..13)
        .map(|i| (2.0 * PI * 50.0 * (5 * i) as f64 / 1000.0).cos() as f32)
        .collect();

    let mut fixture = Fixture::new(DownsamplerBlock::new(5));
    fixture.set_rate(1000.0);
    fixture.push_input(0, &input);
    fixture.end_input(0);

    let outcome = fixture.run();
    assert!(outcome.result.is_ok());
    let actual: Vec<f32> = outcome.output(0);
    assert_allclose(&actual, &expected, 1e-5);
}

#[test]
fn fan_out_add_doubles_input() {
    let mut graph = Graph::new(GraphOptions::default());
    let source = graph.add(ValueSource::new(vec![1.0, 2.0, 3.0]));
    let add = graph.add(AddBlock::new());
    let (sink, out) = CaptureSink::new();
    let sink = graph.add(sink);

    graph.connect_port(source, "out1", add, "in1");
    graph.connect_port(source, "out1", add, "in2");
    graph.connect(add, sink).unwrap();

    assert!(graph.run());
    assert_eq!(&*out.lock().unwrap(), &[2.0, 4.0, 6.0]);
}

#[test]
fn rate_mismatch_is_rejected_before_any_worker_runs() {
    let mut graph = Graph::new(GraphOptions::default());
    let a = graph.add(RateSource::new(1000.0));
    let b = graph.add(RateSource::new(2000.0));
    let mul = graph.add(MultiplyBlock::new());
    let (sink, _out) = CaptureSink::new();
    let sink = graph.add(sink);

    graph.connect_port(a, "out1", mul, "in1");
    graph.connect_port(b, "out1", mul, "in2");
    graph.connect(mul, sink).unwrap();

    let err = graph.start().expect_err("rate mismatch must be rejected at start");
    assert!(matches!(err, FlowError::Topology(_)));
}

#[test]
fn control_call_changes_gain_mid_run() {
    let mut graph = Graph::new(GraphOptions::default());
    let values = vec![1.0f32; 40];
    let source = graph.add(SlowSource::new(values, Duration::from_millis(5)));
    let filter = graph.add(GainFilter::new(1.0));
    let (sink, out) = CaptureSink::new();
    let sink = graph.add(sink);

    graph.connect(source, filter).unwrap();
    graph.connect(filter, sink).unwrap();

    graph.start().unwrap();
    std::thread::sleep(Duration::from_millis(20));
    graph.call::<f32, ()>(filter, "set_gain", 2.0).unwrap();
    assert!(graph.wait());

    let captured = out.lock().unwrap();
    assert_eq!(captured.len(), 40);
    assert_eq!(captured[0], 1.0);
    assert_eq!(*captured.last().unwrap(), 2.0);
}

#[test]
fn process_error_collapses_the_graph() {
    let mut graph = Graph::new(GraphOptions::default());
    let values: Vec<f32> = (0..30).map(|i| i as f32).collect();
    let source = graph.add(ValueSource::new(values));
    let flaky = graph.add(FlakyBlock::new());
    let (sink, out) = CaptureSink::new();
    let sink = graph.add(sink);

    graph.connect(source, flaky).unwrap();
    graph.connect(flaky, sink).unwrap();

    assert!(!graph.run());
    assert_eq!(out.lock().unwrap().len(), 9);
}
