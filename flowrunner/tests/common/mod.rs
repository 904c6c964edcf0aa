//! Small blocks shared by the end-to-end scenario tests. Each is
//! deliberately minimal: one responsibility, no hidden state beyond
//! what its scenario needs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use flowrunner::prelude::*;

/// Emits `count` zero-valued samples, then ends the stream.
pub struct ZeroSource {
    block: BlockHandle,
    remaining: usize,
}

impl ZeroSource {
    pub fn new(count: usize) -> Self {
        Self {
            block: BlockHandle::init_from::<Self>(),
            remaining: count,
        }
    }
}

#[flowrunner_macros::block]
impl ZeroSource {
    fn process(&mut self, out1: &mut [f32]) -> ProcessResult {
        if self.remaining == 0 {
            return Ok(ProcessOutcome::EndOfStream);
        }
        let n = out1.len().min(self.remaining);
        for v in &mut out1[..n] {
            *v = 0.0;
        }
        self.remaining -= n;
        Ok(ProcessOutcome::produced([], [n]))
    }

    fn set_rate(&mut self, _upstream: f64) -> f64 {
        1.0
    }
}

/// Emits one fixed value per invocation (never batches), so downstream
/// blocks see exactly one sample per `process` call.
pub struct ValueSource {
    block: BlockHandle,
    values: Vec<f32>,
    pos: usize,
}

impl ValueSource {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            block: BlockHandle::init_from::<Self>(),
            values,
            pos: 0,
        }
    }
}

#[flowrunner_macros::block]
impl ValueSource {
    fn process(&mut self, out1: &mut [f32]) -> ProcessResult {
        if self.pos >= self.values.len() {
            return Ok(ProcessOutcome::EndOfStream);
        }
        out1[0] = self.values[self.pos];
        self.pos += 1;
        Ok(ProcessOutcome::produced([], [1]))
    }

    fn set_rate(&mut self, _upstream: f64) -> f64 {
        1.0
    }
}

/// A source whose rate is fixed regardless of what `process` ever does;
/// used to construct a rate mismatch at the topology level.
pub struct RateSource {
    block: BlockHandle,
    rate: f64,
}

impl RateSource {
    pub fn new(rate: f64) -> Self {
        Self {
            block: BlockHandle::init_from::<Self>(),
            rate,
        }
    }
}

#[flowrunner_macros::block]
impl RateSource {
    fn process(&mut self, _out1: &mut [f32]) -> ProcessResult {
        Ok(ProcessOutcome::EndOfStream)
    }

    fn set_rate(&mut self, _upstream: f64) -> f64 {
        self.rate
    }
}

/// Keeps every `factor`th sample, starting with the first.
pub struct DownsamplerBlock {
    block: BlockHandle,
    factor: usize,
    phase: usize,
}

impl DownsamplerBlock {
    pub fn new(factor: usize) -> Self {
        Self {
            block: BlockHandle::init_from::<Self>(),
            factor,
            phase: 0,
        }
    }
}

#[flowrunner_macros::block]
impl DownsamplerBlock {
    fn process(&mut self, input: &[f32], output: &mut [f32]) -> ProcessResult {
        let mut consumed = 0;
        let mut produced = 0;
        while consumed < input.len() {
            if self.phase == 0 {
                if produced >= output.len() {
                    break;
                }
                output[produced] = input[consumed];
                produced += 1;
            }
            self.phase = (self.phase + 1) % self.factor;
            consumed += 1;
        }
        Ok(ProcessOutcome::produced([consumed], [produced]))
    }

    fn set_rate(&mut self, upstream: f64) -> f64 {
        upstream / self.factor as f64
    }
}

/// Sums two inputs of matching rate into one output.
pub struct AddBlock {
    block: BlockHandle,
}

impl AddBlock {
    pub fn new() -> Self {
        Self {
            block: BlockHandle::init_from::<Self>(),
        }
    }
}

#[flowrunner_macros::block]
impl AddBlock {
    fn process(&mut self, in1: &[f32], in2: &[f32], out1: &mut [f32]) -> ProcessResult {
        let n = in1.len().min(in2.len()).min(out1.len());
        for i in 0..n {
            out1[i] = in1[i] + in2[i];
        }
        Ok(ProcessOutcome::produced([n, n], [n]))
    }
}

/// Multiplies two inputs; never actually run in the rate-mismatch test,
/// since topology validation is expected to reject the graph first.
pub struct MultiplyBlock {
    block: BlockHandle,
}

impl MultiplyBlock {
    pub fn new() -> Self {
        Self {
            block: BlockHandle::init_from::<Self>(),
        }
    }
}

#[flowrunner_macros::block]
impl MultiplyBlock {
    fn process(&mut self, in1: &[f32], in2: &[f32], out1: &mut [f32]) -> ProcessResult {
        let n = in1.len().min(in2.len()).min(out1.len());
        for i in 0..n {
            out1[i] = in1[i] * in2[i];
        }
        Ok(ProcessOutcome::produced([n, n], [n]))
    }
}

/// Scales its input by a gain that can be changed mid-run through the
/// control surface.
pub struct GainFilter {
    block: BlockHandle,
    gain: f32,
}

impl GainFilter {
    pub fn new(gain: f32) -> Self {
        Self {
            block: BlockHandle::init_from::<Self>(),
            gain,
        }
    }
}

#[flowrunner_macros::block]
impl GainFilter {
    fn process(&mut self, input: &[f32], output: &mut [f32]) -> ProcessResult {
        let n = input.len().min(output.len());
        for i in 0..n {
            output[i] = input[i] * self.gain;
        }
        Ok(ProcessOutcome::produced([n], [n]))
    }

    fn set_gain(&mut self, gain: f32) -> anyhow::Result<()> {
        self.gain = gain;
        Ok(())
    }
}

/// One fixed sample per invocation, with an artificial delay so a test
/// has time to issue a control call while the graph is still running.
pub struct SlowSource {
    block: BlockHandle,
    values: Vec<f32>,
    pos: usize,
    delay: std::time::Duration,
}

impl SlowSource {
    pub fn new(values: Vec<f32>, delay: std::time::Duration) -> Self {
        Self {
            block: BlockHandle::init_from::<Self>(),
            values,
            pos: 0,
            delay,
        }
    }
}

#[flowrunner_macros::block]
impl SlowSource {
    fn process(&mut self, out1: &mut [f32]) -> ProcessResult {
        std::thread::sleep(self.delay);
        if self.pos >= self.values.len() {
            return Ok(ProcessOutcome::EndOfStream);
        }
        out1[0] = self.values[self.pos];
        self.pos += 1;
        Ok(ProcessOutcome::produced([], [1]))
    }

    fn set_rate(&mut self, _upstream: f64) -> f64 {
        1.0
    }
}

/// Errors on its tenth invocation, regardless of how much input is
/// available by then.
pub struct FlakyBlock {
    block: BlockHandle,
    calls: usize,
}

impl FlakyBlock {
    pub fn new() -> Self {
        Self {
            block: BlockHandle::init_from::<Self>(),
            calls: 0,
        }
    }
}

#[flowrunner_macros::block]
impl FlakyBlock {
    fn process(&mut self, input: &[f32], output: &mut [f32]) -> ProcessResult {
        self.calls += 1;
        if self.calls == 10 {
            anyhow::bail!("synthetic failure on invocation 10");
        }
        if input.is_empty() || output.is_empty() {
            return Ok(ProcessOutcome::produced([0], [0]));
        }
        output[0] = input[0];
        Ok(ProcessOutcome::produced([1], [1]))
    }
}

/// Collects everything it sees into a shared vector the test can
/// inspect after the graph stops.
pub struct CaptureSink {
    block: BlockHandle,
    out: Arc<Mutex<Vec<f32>>>,
}

impl CaptureSink {
    pub fn new() -> (Self, Arc<Mutex<Vec<f32>>>) {
        let out = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                block: BlockHandle::init_from::<Self>(),
                out: out.clone(),
            },
            out,
        )
    }
}

#[flowrunner_macros::block]
impl CaptureSink {
    fn process(&mut self, in1: &[f32]) -> ProcessResult {
        self.out.lock().unwrap().extend_from_slice(in1);
        Ok(ProcessOutcome::produced([in1.len()], []))
    }
}

/// Two chained gain stages wired up as one composite block, exposing a
/// single boundary input and output aliased to its children's ports.
pub struct DoubleGain {
    gain_a: f32,
    gain_b: f32,
}

impl DoubleGain {
    pub fn new(gain_a: f32, gain_b: f32) -> Self {
        Self { gain_a, gain_b }
    }
}

impl Composite for DoubleGain {
    fn boundary_inputs() -> &'static [&'static str] {
        &["in1"]
    }

    fn boundary_outputs() -> &'static [&'static str] {
        &["out1"]
    }

    fn connect(self: Box<Self>, builder: &mut CompositeBuilder<'_>) -> anyhow::Result<()> {
        let first = builder.add(GainFilter::new(self.gain_a));
        let second = builder.add(GainFilter::new(self.gain_b));
        builder.connect(first, second)?;
        builder.alias("in1", first, "in1");
        builder.alias("out1", second, "out1");
        Ok(())
    }
}

/// Counts every sample it receives without storing them.
pub struct BenchmarkSink {
    block: BlockHandle,
    count: Arc<AtomicUsize>,
}

impl BenchmarkSink {
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        (
            Self {
                block: BlockHandle::init_from::<Self>(),
                count: count.clone(),
            },
            count,
        )
    }
}

#[flowrunner_macros::block]
impl BenchmarkSink {
    fn process(&mut self, in1: &[f32]) -> ProcessResult {
        self.count.fetch_add(in1.len(), Ordering::SeqCst);
        Ok(ProcessOutcome::produced([in1.len()], []))
    }
}
