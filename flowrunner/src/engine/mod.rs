//! Execution engine: allocates rings, binds multiplexers,
//! and spawns one worker thread per block.

pub(crate) mod control;
pub(crate) mod worker;

use std::collections::HashMap;
use std::sync::Arc;

use crate::block::NodeId;
use crate::error::{FlowError, Result};
use crate::graph::{Graph, Registered};
use crate::mux::{InputPort, OutputPort, SampleMux};
use crate::ring::{RingBuffer, MIN_CAPACITY};
use crate::topology::CompiledGraph;

use self::control::ControlMsg;
use self::worker::WorkerOutcome;

/// Allocates one ring per edge, binds a [`SampleMux`] to each block, and
/// spawns its worker. Returns join handles (so `Graph::wait` can collect
/// per-block results) and the control-call senders `Graph::call` uses.
pub(crate) fn start(
    graph: &mut Graph,
    compiled: &CompiledGraph,
) -> Result<(
    Vec<std::thread::JoinHandle<WorkerOutcome>>,
    HashMap<NodeId, crossbeam_channel::Sender<ControlMsg>>,
)> {
    // One ring per edge. An output port that fans out to N edges gets N
    // independent rings sharing one producer-side scratch buffer (mux.rs).
    let mut rings: Vec<(NodeId, &'static str, NodeId, &'static str, Arc<RingBuffer>)> =
        Vec::with_capacity(compiled.edges.len());
    for edge in &compiled.edges {
        rings.push((
            edge.src,
            edge.src_port,
            edge.dst,
            edge.dst_port,
            Arc::new(RingBuffer::new(MIN_CAPACITY)),
        ));
    }

    let mut handles = Vec::with_capacity(compiled.order.len());
    let mut controls = HashMap::with_capacity(compiled.order.len());

    for id in &compiled.order {
        let block = match graph.nodes.remove(id) {
            Some(Registered::Block(b)) => b,
            _ => {
                return Err(FlowError::Topology(
                    "internal error: compiled order referenced a non-block node".into(),
                ))
            }
        };
        let shape = block.shape();

        let mut input_ports = Vec::with_capacity(shape.inputs.len());
        for port in shape.inputs {
            let (_, _, _, _, ring) = rings
                .iter()
                .find(|(_, _, dst, dst_port, _)| *dst == *id && *dst_port == port.name)
                .expect("validate_ports guaranteed exactly one edge per input");
            input_ports.push(InputPort::new(ring.clone(), port.element.size_bytes));
        }

        let mut output_ports = Vec::with_capacity(shape.outputs.len());
        for port in shape.outputs {
            let fanout: Vec<Arc<RingBuffer>> = rings
                .iter()
                .filter(|(src, src_port, _, _, _)| *src == *id && *src_port == port.name)
                .map(|(_, _, _, _, ring)| ring.clone())
                .collect();
            output_ports.push(OutputPort::new(fanout, port.element.size_bytes));
        }

        let mux = SampleMux::new(input_ports, output_ports);

        let (control_tx, control_rx) = crossbeam_channel::unbounded();
        controls.insert(*id, control_tx);

        let handle = std::thread::Builder::new()
            .name(format!("flowrunner-{}", shape.type_name))
            .spawn(move || worker::run(block, mux, control_rx))
            .map_err(FlowError::Io)?;
        handles.push(handle);
    }

    Ok((handles, controls))
}
