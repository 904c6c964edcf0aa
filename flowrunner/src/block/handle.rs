//! `BlockHandle` — the canonical field every block struct embeds.
//!
//! Its address is the stable identity used throughout the graph API
//! (the address of a canonical embedded `block` field is the
//! handle used by all graph APIs"). It also carries the one piece of
//! per-instance mutable state the facade owns directly: the resolved
//! sample rate.

use std::cell::Cell;

use super::descriptor::StaticShape;

/// Opaque node identity, derived from a block's embedded `BlockHandle`
/// address once it has been boxed onto the heap by [`crate::graph::Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub(crate) fn of(handle: &BlockHandle) -> Self {
        NodeId(handle as *const BlockHandle as usize)
    }
}

pub struct BlockHandle {
    shape: &'static StaticShape,
    rate: Cell<f64>,
}

impl BlockHandle {
    /// Initialize the canonical field from the block-derivation macro's
    /// generated `BlockOps` implementation for `T`.
    pub fn init_from<T: BlockOps>() -> Self {
        Self {
            shape: T::shape(),
            rate: Cell::new(0.0),
        }
    }

    /// Initialize from an explicitly supplied shape, for block authors
    /// who build a `StaticShape` by hand instead of via the attribute
    /// macro (`init_from(self_type)` or `init_raw(self_type,
    /// input_types, output_types)`").
    pub fn init_raw(shape: &'static StaticShape) -> Self {
        Self {
            shape,
            rate: Cell::new(0.0),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate.get()
    }

    pub(crate) fn set_rate(&self, rate: f64) {
        self.rate.set(rate);
    }

    pub(crate) fn shape(&self) -> &'static StaticShape {
        self.shape
    }

    pub fn node_id(&self) -> NodeId {
        NodeId::of(self)
    }
}

/// Implemented by `#[flowrunner_macros::block]` for the annotated type,
/// exposing the compile-time-derived shape.
pub trait BlockOps: Sized + 'static {
    fn shape() -> &'static StaticShape;
}

/// Implemented by the macro so generic graph code can reach a block's
/// canonical field without knowing its field name.
pub trait HasBlockHandle {
    fn block_handle(&self) -> &BlockHandle;
}

/// Object-safe façade the graph stores behind `Box<dyn BlockObject>`.
/// Implemented generically for any `T: BlockOps + HasBlockHandle`.
pub trait BlockObject: Send {
    fn node_id(&self) -> NodeId;
    fn shape(&self) -> &'static StaticShape;
    fn set_rate(&self, rate: f64);
    fn rate(&self) -> f64;
    /// Pointer to the concrete block, for trampoline dispatch.
    ///
    /// # Safety
    ///
    /// Valid only while the `Box<dyn BlockObject>` that produced it is
    /// alive and not moved (heap boxes never move their contents, so this
    /// holds for the graph's entire lifetime).
    fn self_ptr(&mut self) -> *mut ();
}

impl<T> BlockObject for T
where
    T: BlockOps + HasBlockHandle + Send + 'static,
{
    fn node_id(&self) -> NodeId {
        self.block_handle().node_id()
    }

    fn shape(&self) -> &'static StaticShape {
        self.block_handle().shape()
    }

    fn set_rate(&self, rate: f64) {
        self.block_handle().set_rate(rate)
    }

    fn rate(&self) -> f64 {
        self.block_handle().rate()
    }

    fn self_ptr(&mut self) -> *mut () {
        self as *mut T as *mut ()
    }
}
