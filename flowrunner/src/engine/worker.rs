//! Per-block worker thread: the `initialize` -> process-loop ->
//! `deinitialize` lifecycle.

use crate::block::{Allocator, BlockObject, NodeId, ProcessOutcome, RawSlice, RawSliceMut};
use crate::mux::{PortWait, SampleMux};

use super::control::{self, ControlMsg};

pub(crate) struct WorkerOutcome {
    pub node_id: NodeId,
    pub block: Box<dyn BlockObject>,
    pub result: anyhow::Result<()>,
}

/// Runs entirely on its own OS thread; `block` and `mux` are moved in at
/// spawn and returned (via `WorkerOutcome`) once the block collapses.
pub(crate) fn run(
    mut block: Box<dyn BlockObject>,
    mut mux: SampleMux,
    control_rx: crossbeam_channel::Receiver<ControlMsg>,
) -> WorkerOutcome {
    let node_id = block.node_id();
    let shape = block.shape();
    let allocator = Allocator::new();

    if let Some(init) = shape.initialize {
        let ptr = block.self_ptr();
        if let Err(source) = init(ptr, &allocator) {
            mux.set_broken();
            mux.set_eos();
            return WorkerOutcome {
                node_id,
                block,
                result: Err(crate::error::FlowError::Initialize {
                    block: shape.type_name,
                    source,
                }
                .into()),
            };
        }
    }

    let input_sizes: Vec<usize> = (0..mux.input_count())
        .map(|i| mux.input_element_size(i))
        .collect();
    let output_sizes: Vec<usize> = (0..mux.output_count())
        .map(|j| mux.output_element_size(j))
        .collect();

    let mut failure: Option<anyhow::Error> = None;

    'work: loop {
        if mux.input_count() > 0 {
            let mut all_eos = true;
            for i in 0..mux.input_count() {
                match mux.wait_input_available(i, 1, None) {
                    PortWait::Ready => all_eos = false,
                    PortWait::EndOfStream => {}
                    // This block is the reader; it never observes
                    // broken-stream on its own input (only a ring's
                    // consumer sets that flag, on itself).
                    PortWait::BrokenStream | PortWait::Timeout => {}
                }
            }
            if all_eos {
                break 'work;
            }
        }

        let mut downstream_broken = false;
        for j in 0..mux.output_count() {
            if let PortWait::BrokenStream = mux.wait_output_available(j, 1, None) {
                downstream_broken = true;
            }
        }
        if downstream_broken {
            // A consumer refused further data: normal upstream
            // termination, not a failure.
            mux.set_broken();
            break 'work;
        }

        control::drain(block.self_ptr(), shape, &control_rx);

        let mut input_slices = Vec::with_capacity(mux.input_count());
        for i in 0..mux.input_count() {
            let buf = mux.input_buffer(i);
            input_slices.push(RawSlice::new(buf.as_ptr(), buf.len()));
        }
        let mut output_slices = Vec::with_capacity(mux.output_count());
        for j in 0..mux.output_count() {
            let buf = mux.output_buffer(j);
            output_slices.push(RawSliceMut::new(buf.as_mut_ptr(), buf.len()));
        }

        let ptr = block.self_ptr();
        match (shape.process)(ptr, &input_slices, &mut output_slices) {
            Ok(ProcessOutcome::Produced(counts)) => {
                for (i, &n) in counts.consumed.iter().enumerate() {
                    mux.update_input(i, n * input_sizes[i]);
                }
                for (j, &n) in counts.produced.iter().enumerate() {
                    mux.update_output(j, n * output_sizes[j]);
                }
            }
            Ok(ProcessOutcome::EndOfStream) => break 'work,
            Err(source) => {
                failure = Some(
                    crate::error::FlowError::Process {
                        block: shape.type_name,
                        source,
                    }
                    .into(),
                );
                break 'work;
            }
        }
    }

    mux.set_eos();
    if failure.is_some() {
        mux.set_broken();
    }

    if let Some(deinit) = shape.deinitialize {
        let ptr = block.self_ptr();
        if let Err(e) = deinit(ptr, &allocator) {
            tracing::warn!(block = shape.type_name, error = %e, "deinitialize failed");
        }
    }

    WorkerOutcome {
        node_id,
        block,
        result: failure.map_or(Ok(()), Err),
    }
}
