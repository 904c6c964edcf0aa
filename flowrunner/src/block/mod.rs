//! The block abstraction: typed ports, optional lifecycle hooks, and the
//! type-erased vtable the engine dispatches through.

mod allocator;
mod composite;
mod descriptor;
mod handle;
mod raw;
mod refcounted;
mod result;

pub use allocator::Allocator;
pub use composite::{Composite, CompositeBuilder};
pub(crate) use composite::CompositeObject;
pub use descriptor::{
    ControlEntry, ControlTrampoline, DeinitTrampoline, ElementType, InitTrampoline,
    PortSpec, ProcessTrampoline, SetRateTrampoline, StaticShape, StopTrampoline,
};
pub use handle::{BlockHandle, BlockOps, HasBlockHandle, NodeId};
pub(crate) use handle::BlockObject;
pub use raw::{RawSlice, RawSliceMut};
pub use refcounted::RcValue;
pub use result::{ProcessCounts, ProcessOutcome, ProcessResult};

/// Convenience supertrait satisfied by any type the
/// `#[flowrunner_macros::block]` macro has been applied to.
pub trait Block: BlockOps + HasBlockHandle + Send + 'static {}

impl<T: BlockOps + HasBlockHandle + Send + 'static> Block for T {}
