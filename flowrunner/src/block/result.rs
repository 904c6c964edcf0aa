//! `ProcessResult` — the value a block's `process` trampoline returns.

/// Per-port counts a `process` invocation consumed/produced, measured in
/// elements (not bytes).
#[derive(Debug, Clone, Default)]
pub struct ProcessCounts {
    pub consumed: Vec<usize>,
    pub produced: Vec<usize>,
}

impl ProcessCounts {
    pub fn new(consumed: impl Into<Vec<usize>>, produced: impl Into<Vec<usize>>) -> Self {
        Self {
            consumed: consumed.into(),
            produced: produced.into(),
        }
    }
}

/// The outcome of one `process` invocation: either normal progress, or
/// the distinguished end-of-stream signal.
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    Produced(ProcessCounts),
    EndOfStream,
}

impl ProcessOutcome {
    pub fn produced(consumed: impl Into<Vec<usize>>, produced: impl Into<Vec<usize>>) -> Self {
        ProcessOutcome::Produced(ProcessCounts::new(consumed, produced))
    }
}

/// Blocks return this from `process`. Errors surface through the
/// ordinary `anyhow` escape hatch; the engine wraps them into
/// [`crate::error::FlowError::Process`] before aggregating block state.
pub type ProcessResult = anyhow::Result<ProcessOutcome>;
