//! Compile-time block shape: port lists, hook presence, and the
//! type-erased trampolines the engine dispatches through.
//!
//! A `StaticShape` is produced once per block *type* by
//! `#[flowrunner_macros::block]` and is fully `const`-constructible —
//! nothing about it depends on a particular instance. The per-instance
//! mutable state (sample rate) lives in [`super::handle::BlockHandle`].

use std::any::{Any, TypeId};
use std::boxed::Box;

use super::allocator::Allocator;
use super::raw::{RawSlice, RawSliceMut};
use super::result::ProcessResult;

/// Identity of a port's element type: used for the exact-match check
/// between an edge's source and destination port.
#[derive(Clone, Copy)]
pub struct ElementType {
    pub size_bytes: usize,
    pub type_name: &'static str,
    type_id: fn() -> TypeId,
}

impl ElementType {
    pub const fn of<T: 'static>() -> Self {
        Self {
            size_bytes: std::mem::size_of::<T>(),
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>,
        }
    }

    pub fn matches(&self, other: &ElementType) -> bool {
        (self.type_id)() == (other.type_id)()
    }
}

impl std::fmt::Debug for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementType")
            .field("type_name", &self.type_name)
            .field("size_bytes", &self.size_bytes)
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PortSpec {
    pub name: &'static str,
    pub element: ElementType,
}

/// Raw byte pointers in, `ProcessResult` out — the type-erased face of a
/// block's `process` method.
pub type ProcessTrampoline = fn(*mut (), &[RawSlice], &mut [RawSliceMut]) -> ProcessResult;

pub type InitTrampoline = fn(*mut (), &Allocator) -> anyhow::Result<()>;
pub type DeinitTrampoline = fn(*mut (), &Allocator) -> anyhow::Result<()>;
pub type SetRateTrampoline = fn(*mut (), f64) -> f64;
pub type StopTrampoline = fn(*mut ());

/// A control call takes boxed arguments and returns a boxed result,
/// downcast on both ends by [`crate::graph::Graph::call`].
pub type ControlTrampoline =
    fn(*mut (), Box<dyn Any + Send>) -> anyhow::Result<Box<dyn Any + Send>>;

#[derive(Clone, Copy)]
pub struct ControlEntry {
    pub name: &'static str,
    pub call: ControlTrampoline,
}

pub struct StaticShape {
    pub type_name: &'static str,
    pub inputs: &'static [PortSpec],
    pub outputs: &'static [PortSpec],
    pub process: ProcessTrampoline,
    pub initialize: Option<InitTrampoline>,
    pub deinitialize: Option<DeinitTrampoline>,
    pub set_rate: Option<SetRateTrampoline>,
    pub stop: Option<StopTrampoline>,
    pub controls: &'static [ControlEntry],
}

impl StaticShape {
    pub fn find_control(&self, method: &str) -> Option<ControlTrampoline> {
        self.controls
            .iter()
            .find(|entry| entry.name == method)
            .map(|entry| entry.call)
    }
}

impl std::fmt::Debug for StaticShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticShape")
            .field("type_name", &self.type_name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("has_initialize", &self.initialize.is_some())
            .field("has_deinitialize", &self.deinitialize.is_some())
            .field("has_set_rate", &self.set_rate.is_some())
            .finish()
    }
}
