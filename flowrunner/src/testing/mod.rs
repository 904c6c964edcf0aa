//! In-process test harness: exercises a single
//! block deterministically, without spawning real worker threads, and
//! compares its output against reference vectors.
//!
//! [`Fixture`] reuses the exact same `initialize -> process loop ->
//! deinitialize` driver the engine uses ([`crate::engine::worker::run`])
//! so a block behaving correctly under test behaves identically when
//! wired into a real [`crate::graph::Graph`].

use std::sync::Arc;

use crate::block::{Block, BlockObject, StaticShape};
use crate::mux::{InputPort, OutputPort, SampleMux};
use crate::ring::RingBuffer;

/// One block under test, with a dedicated ring per port and no fan-out.
pub struct Fixture<T: Block> {
    block: Option<Box<T>>,
    shape: &'static StaticShape,
    input_rings: Vec<Arc<RingBuffer>>,
    output_rings: Vec<Arc<RingBuffer>>,
}

/// Capacity generous enough that typical unit-test vectors (hundreds to
/// low thousands of samples) never need to wrap while being loaded.
const FIXTURE_CAPACITY: usize = 1 << 20;

impl<T: Block> Fixture<T> {
    pub fn new(block: T) -> Self {
        let shape = <T as crate::block::BlockOps>::shape();
        let input_rings = shape
            .inputs
            .iter()
            .map(|_| Arc::new(RingBuffer::new(FIXTURE_CAPACITY)))
            .collect::<Vec<_>>();
        let output_rings = shape
            .outputs
            .iter()
            .map(|_| Arc::new(RingBuffer::new(FIXTURE_CAPACITY)))
            .collect::<Vec<_>>();
        Self {
            block: Some(Box::new(block)),
            shape,
            input_rings,
            output_rings,
        }
    }

    /// Resolve the block's rate before running, mirroring what the
    /// topology resolver would do for a real graph.
    /// Sourceless blocks default to `setRate(0)`; blocks with inputs use
    /// the rate a single upstream producer would supply.
    pub fn set_rate(&mut self, upstream_rate: f64) {
        if let Some(set_rate) = self.shape.set_rate {
            let ptr = self.self_ptr();
            let resolved = set_rate(ptr, upstream_rate);
            self.block_handle().set_rate(resolved);
        } else {
            self.block_handle().set_rate(upstream_rate);
        }
    }

    fn self_ptr(&mut self) -> *mut () {
        self.block.as_mut().expect("block not yet run").self_ptr()
    }

    fn block_handle(&self) -> &crate::block::BlockHandle {
        use crate::block::HasBlockHandle;
        self.block.as_ref().expect("block not yet run").block_handle()
    }

    /// Load typed samples into input port `i` and leave the ring open
    /// for further writes (call [`Fixture::end_input`] once the source
    /// is exhausted).
    pub fn push_input<E: Copy>(&self, i: usize, samples: &[E]) {
        let bytes: &[u8] = unsafe {
            std::slice::from_raw_parts(samples.as_ptr() as *const u8, std::mem::size_of_val(samples))
        };
        let ring = &self.input_rings[i];
        let mut written = 0;
        while written < bytes.len() {
            let buf = ring.write_buffer();
            let n = buf.len().min(bytes.len() - written);
            buf[..n].copy_from_slice(&bytes[written..written + n]);
            ring.commit_write(n);
            written += n;
        }
    }

    /// Signal that input port `i` has no further data (the
    /// producer-side EOS).
    pub fn end_input(&self, i: usize) {
        self.input_rings[i].set_eos();
    }

    /// Run the block to completion: drives the same loop the engine's
    /// worker thread does, synchronously, because every input is
    /// already buffered and EOS has been set.
    pub fn run(mut self) -> FixtureOutcome<T> {
        let input_ports = self
            .input_rings
            .iter()
            .zip(self.shape.inputs)
            .map(|(ring, port)| InputPort::new(ring.clone(), port.element.size_bytes))
            .collect();
        let output_ports = self
            .output_rings
            .iter()
            .zip(self.shape.outputs)
            .map(|(ring, port)| OutputPort::new(vec![ring.clone()], port.element.size_bytes))
            .collect();
        let mux = SampleMux::new(input_ports, output_ports);

        let block: Box<dyn BlockObject> = self.block.take().expect("constructed with a block");
        let (_tx, rx) = crossbeam_channel::unbounded();
        let outcome = crate::engine::worker::run(block, mux, rx);

        FixtureOutcome {
            result: outcome.result,
            output_rings: self.output_rings,
            _marker: std::marker::PhantomData,
        }
    }
}

pub struct FixtureOutcome<T> {
    pub result: anyhow::Result<()>,
    output_rings: Vec<Arc<RingBuffer>>,
    _marker: std::marker::PhantomData<T>,
}

impl<T> FixtureOutcome<T> {
    /// Drain every byte currently buffered on output port `j` and
    /// reinterpret it as `&[E]`.
    ///
    /// # Safety note
    ///
    /// Callers must pass the same element type the block's output port
    /// was declared with; this mirrors the trust boundary the engine
    /// itself relies on (the macro-derived trampoline, not a runtime
    /// check, guarantees the match in production).
    pub fn output<E: Copy>(&self, j: usize) -> Vec<E> {
        let ring = &self.output_rings[j];
        let mut bytes = Vec::new();
        loop {
            let buf = ring.read_buffer();
            if buf.is_empty() {
                break;
            }
            bytes.extend_from_slice(buf);
            ring.commit_read(buf.len());
        }
        let count = bytes.len() / std::mem::size_of::<E>();
        let mut out = Vec::with_capacity(count);
        unsafe {
            let ptr = bytes.as_ptr() as *const E;
            out.extend_from_slice(std::slice::from_raw_parts(ptr, count));
        }
        out
    }
}

/// Compares two sample vectors element-wise within `tolerance`, for
/// asserting a block's output matches a reference signal to within
/// floating-point tolerance.
pub fn assert_allclose(actual: &[f32], expected: &[f32], tolerance: f32) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "sample count mismatch: got {}, expected {}",
        actual.len(),
        expected.len()
    );
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tolerance,
            "sample {i} differs: got {a}, expected {e} (tolerance {tolerance})"
        );
    }
}
