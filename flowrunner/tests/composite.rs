//! Exercises the composite facade: boundary ports aliased to child
//! ports, expanded at `Graph::start` into the real block set.

mod common;

use flowrunner::prelude::*;

use common::{CaptureSink, DoubleGain, ValueSource};

#[test]
fn composite_boundary_ports_reach_its_children() {
    let mut graph = Graph::new(GraphOptions::default());
    let source = graph.add(ValueSource::new(vec![1.0, 2.0, 3.0]));
    let composite = graph.add_composite(DoubleGain::new(2.0, 3.0));
    let (sink, out) = CaptureSink::new();
    let sink = graph.add(sink);

    graph.connect_port(source, "out1", composite, "in1");
    graph.connect_port(composite, "out1", sink, "in1");

    assert!(graph.run());
    assert_eq!(&*out.lock().unwrap(), &[6.0, 12.0, 18.0]);
}

#[test]
fn nested_composites_expand_to_a_fixed_point() {
    let mut graph = Graph::new(GraphOptions::default());
    let source = graph.add(ValueSource::new(vec![1.0]));
    let inner = graph.add_composite(DoubleGain::new(2.0, 2.0));
    let outer = graph.add_composite(DoubleGain::new(5.0, 1.0));
    let (sink, out) = CaptureSink::new();
    let sink = graph.add(sink);

    // `outer`'s own expansion wires `inner` in as one of its two stages,
    // so expansion must re-run until no composite remains registered.
    graph.connect_port(source, "out1", inner, "in1");
    graph.connect_port(inner, "out1", outer, "in1");
    graph.connect_port(outer, "out1", sink, "in1");

    assert!(graph.run());
    // 1 * 2 * 2 * 5 * 1 = 20
    assert_eq!(&*out.lock().unwrap(), &[20.0]);
}
