//! Sample multiplexer — presents the byte-granular rings bound to one
//! block as typed input/output slices.
//!
//! The multiplexer never advances a ring's cursors on the block's behalf;
//! only the explicit `update_input`/`update_output` calls do that. Output
//! ports with more than one downstream consumer (fan-out) are backed by
//! several parallel rings; the multiplexer hands the block a single
//! scratch buffer and replicates it to every ring on commit.

use std::sync::Arc;
use std::time::Duration;

use crate::ring::{ReadAvailable, RingBuffer, WaitOutcome};

pub struct InputPort {
    pub(crate) ring: Arc<RingBuffer>,
    pub(crate) element_size: usize,
}

impl InputPort {
    /// # Panics
    ///
    /// `element_size` must be a power of two. The ring masks byte offsets
    /// with `capacity - 1` (`capacity` itself a power of two); a
    /// non-power-of-two element size would stop being a multiple of the
    /// cursor's alignment after the ring wraps, which would hand
    /// `RawSlice::typed`/`RawSliceMut::typed_mut` a misaligned pointer.
    pub(crate) fn new(ring: Arc<RingBuffer>, element_size: usize) -> Self {
        assert!(
            element_size.is_power_of_two(),
            "port element size {element_size} must be a power of two"
        );
        Self { ring, element_size }
    }
}

pub struct OutputPort {
    pub(crate) rings: Vec<Arc<RingBuffer>>,
    pub(crate) element_size: usize,
    scratch: Vec<u8>,
}

impl OutputPort {
    /// # Panics
    ///
    /// Same power-of-two requirement as [`InputPort::new`].
    pub(crate) fn new(rings: Vec<Arc<RingBuffer>>, element_size: usize) -> Self {
        assert!(
            element_size.is_power_of_two(),
            "port element size {element_size} must be a power of two"
        );
        Self {
            rings,
            element_size,
            scratch: Vec::new(),
        }
    }
}

/// Outcome of waiting on one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortWait {
    Ready,
    EndOfStream,
    BrokenStream,
    Timeout,
}

impl From<WaitOutcome> for PortWait {
    fn from(value: WaitOutcome) -> Self {
        match value {
            WaitOutcome::Ready => PortWait::Ready,
            WaitOutcome::EndOfStream => PortWait::EndOfStream,
            WaitOutcome::BrokenStream => PortWait::BrokenStream,
            WaitOutcome::Timeout => PortWait::Timeout,
        }
    }
}

pub struct SampleMux {
    inputs: Vec<InputPort>,
    outputs: Vec<OutputPort>,
}

impl SampleMux {
    pub fn new(inputs: Vec<InputPort>, outputs: Vec<OutputPort>) -> Self {
        Self { inputs, outputs }
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn input_element_size(&self, i: usize) -> usize {
        self.inputs[i].element_size
    }

    pub fn output_element_size(&self, j: usize) -> usize {
        self.outputs[j].element_size
    }

    pub fn wait_input_available(
        &self,
        i: usize,
        min_elements: usize,
        timeout: Option<Duration>,
    ) -> PortWait {
        let port = &self.inputs[i];
        port.ring
            .wait_read_available(min_elements * port.element_size, timeout)
            .into()
    }

    /// Elements ready on input `i`, aligned down to whole elements.
    pub fn input_available(&self, i: usize) -> ReadAvailable {
        match self.inputs[i].ring.read_available() {
            ReadAvailable::Bytes(n) => ReadAvailable::Bytes(n / self.inputs[i].element_size),
            other => other,
        }
    }

    /// Raw read-only byte slice at the head of input `i`, aligned down to
    /// whole elements.
    pub fn input_buffer(&self, i: usize) -> &[u8] {
        let port = &self.inputs[i];
        let buf = port.ring.read_buffer();
        let aligned = buf.len() - (buf.len() % port.element_size);
        &buf[..aligned]
    }

    /// Advance input `i`'s read cursor by `n` bytes.
    pub fn update_input(&self, i: usize, n_bytes: usize) {
        self.inputs[i].ring.commit_read(n_bytes);
    }

    pub fn wait_output_available(
        &self,
        j: usize,
        min_elements: usize,
        timeout: Option<Duration>,
    ) -> PortWait {
        let port = &self.outputs[j];
        let min_bytes = min_elements * port.element_size;
        let deadline = timeout.map(|d| std::time::Instant::now() + d);
        loop {
            let mut all_broken = true;
            let mut min_avail = usize::MAX;
            for ring in &port.rings {
                if ring.is_broken() {
                    continue;
                }
                all_broken = false;
                min_avail = min_avail.min(ring.write_available());
            }
            if all_broken && !port.rings.is_empty() {
                return PortWait::BrokenStream;
            }
            if port.rings.is_empty() || min_avail >= min_bytes {
                return PortWait::Ready;
            }
            let remaining = match deadline {
                None => None,
                Some(d) => {
                    let now = std::time::Instant::now();
                    if now >= d {
                        return PortWait::Timeout;
                    }
                    Some(d - now)
                }
            };
            // Wait on the ring with the least headroom; it gates the port.
            let gating = port
                .rings
                .iter()
                .filter(|r| !r.is_broken())
                .min_by_key(|r| r.write_available());
            match gating {
                Some(ring) => match ring.wait_write_available(min_bytes, remaining) {
                    WaitOutcome::Timeout => return PortWait::Timeout,
                    _ => continue,
                },
                None => return PortWait::BrokenStream,
            }
        }
    }

    pub fn output_available(&self, j: usize) -> usize {
        let port = &self.outputs[j];
        port.rings
            .iter()
            .filter(|r| !r.is_broken())
            .map(|r| r.write_available())
            .min()
            .unwrap_or(0)
            / port.element_size
    }

    /// Scratch write buffer for output `j`, sized to the smallest
    /// available headroom across all fan-out consumers, aligned down to
    /// whole elements.
    pub fn output_buffer(&mut self, j: usize) -> &mut [u8] {
        let available_elems = self.output_available(j);
        let port = &mut self.outputs[j];
        let bytes = available_elems * port.element_size;
        if port.scratch.len() < bytes {
            port.scratch.resize(bytes, 0);
        }
        &mut port.scratch[..bytes]
    }

    /// Replicate the first `n_bytes` of output `j`'s scratch buffer to
    /// every fan-out ring and advance each ring's write cursor.
    pub fn update_output(&mut self, j: usize, n_bytes: usize) {
        let port = &mut self.outputs[j];
        if n_bytes == 0 {
            return;
        }
        let payload = &port.scratch[..n_bytes];
        for ring in &port.rings {
            // The contiguous write slice may be shorter than `payload` if
            // the ring is about to wrap; copy in as many chunks as needed.
            let mut offset = 0;
            while offset < payload.len() {
                let dst = ring.write_buffer();
                let chunk = dst.len().min(payload.len() - offset);
                dst[..chunk].copy_from_slice(&payload[offset..offset + chunk]);
                ring.commit_write(chunk);
                offset += chunk;
            }
        }
    }

    /// Signal end-of-stream on every output ring.
    pub fn set_eos(&self) {
        for port in &self.outputs {
            for ring in &port.rings {
                ring.set_eos();
            }
        }
    }

    /// Signal broken-stream on every input ring.
    pub fn set_broken(&self) {
        for port in &self.inputs {
            port.ring.set_broken();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::RingBuffer;

    #[test]
    fn fan_out_replicates_to_every_consumer() {
        let a = Arc::new(RingBuffer::new(crate::ring::MIN_CAPACITY));
        let b = Arc::new(RingBuffer::new(crate::ring::MIN_CAPACITY));
        let mut mux = SampleMux::new(vec![], vec![OutputPort::new(vec![a.clone(), b.clone()], 4)]);

        let buf = mux.output_buffer(0);
        buf[..16].copy_from_slice(&[1u8; 16]);
        mux.update_output(0, 16);

        assert_eq!(a.read_buffer().len(), 16);
        assert_eq!(b.read_buffer().len(), 16);
        assert_eq!(a.read_buffer(), b.read_buffer());
    }

    #[test]
    fn output_available_is_gated_by_the_slowest_consumer() {
        let a = Arc::new(RingBuffer::new(crate::ring::MIN_CAPACITY));
        let b = Arc::new(RingBuffer::new(crate::ring::MIN_CAPACITY));
        let mux = SampleMux::new(vec![], vec![OutputPort::new(vec![a.clone(), b], 4)]);
        // One ring already partially full leaves less headroom than a
        // fresh one; the port must report the smaller of the two.
        let first = a.write_buffer().len();
        a.commit_write(first - 4);
        assert!(mux.output_available(0) * 4 < first);
    }
}
