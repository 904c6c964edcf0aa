//! Control-call plumbing: each worker owns an MPSC queue of pending
//! calls, drained between `process` invocations so a call handler never
//! runs concurrently with `process` on the same block.

use std::any::Any;

pub(crate) struct ControlMsg {
    pub method: &'static str,
    pub args: Box<dyn Any + Send>,
    pub reply: crossbeam_channel::Sender<anyhow::Result<Box<dyn Any + Send>>>,
}

/// Drains every call currently queued, dispatching through the block's
/// control trampoline table. Called once per worker iteration; no lock
/// is held across `process` since `crossbeam_channel` needs none at all.
pub(crate) fn drain(
    self_ptr: *mut (),
    shape: &'static crate::block::StaticShape,
    rx: &crossbeam_channel::Receiver<ControlMsg>,
) {
    while let Ok(msg) = rx.try_recv() {
        let result = match shape.find_control(msg.method) {
            Some(trampoline) => trampoline(self_ptr, msg.args),
            None => Err(anyhow::anyhow!("unknown control method '{}'", msg.method)),
        };
        // The submitter may have given up waiting; a dropped receiver is
        // not this worker's problem.
        let _ = msg.reply.send(result);
    }
}
