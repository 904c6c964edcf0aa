//! Composite facade — a block whose body is a subgraph plus boundary
//! port aliases, expanded once at graph-validation time.
//!
//! Composites are a compile-time structural convenience, not a runtime
//! entity: Design Notes §9(a) resolves the ambiguity in the source
//! material explicitly in favor of "expands at validation", so after
//! `Graph::start` a composite's children appear in the graph directly
//! and the composite node itself is gone.

use super::handle::NodeId;
use crate::graph::Graph;

/// User-authored composite: declares boundary ports and wires internal
/// children and aliases inside `connect`.
pub trait Composite: Send + 'static {
    fn boundary_inputs() -> &'static [&'static str]
    where
        Self: Sized;

    fn boundary_outputs() -> &'static [&'static str]
    where
        Self: Sized;

    fn connect(self: Box<Self>, builder: &mut CompositeBuilder<'_>) -> anyhow::Result<()>;
}

/// Object-safe wrapper the graph stores before expansion.
pub(crate) trait CompositeObject: Send {
    fn boundary_inputs(&self) -> &'static [&'static str];
    fn boundary_outputs(&self) -> &'static [&'static str];
    fn expand(self: Box<Self>, builder: &mut CompositeBuilder<'_>) -> anyhow::Result<()>;
}

impl<C: Composite> CompositeObject for C {
    fn boundary_inputs(&self) -> &'static [&'static str] {
        C::boundary_inputs()
    }

    fn boundary_outputs(&self) -> &'static [&'static str] {
        C::boundary_outputs()
    }

    fn expand(self: Box<Self>, builder: &mut CompositeBuilder<'_>) -> anyhow::Result<()> {
        Composite::connect(self, builder)
    }
}

/// Handed to a composite's `connect` callback: a narrow view onto the
/// graph scoped to registering children, internal edges, and aliases for
/// one composite's boundary ports.
pub struct CompositeBuilder<'g> {
    pub(crate) graph: &'g mut Graph,
    pub(crate) composite_id: NodeId,
}

impl<'g> CompositeBuilder<'g> {
    pub fn add<T>(&mut self, block: T) -> NodeId
    where
        T: super::handle::BlockOps + super::handle::HasBlockHandle + Send + 'static,
    {
        self.graph.add(block)
    }

    pub fn connect(&mut self, src: NodeId, dst: NodeId) -> anyhow::Result<()> {
        Ok(self.graph.connect(src, dst)?)
    }

    pub fn connect_port(
        &mut self,
        src: NodeId,
        src_port: &'static str,
        dst: NodeId,
        dst_port: &'static str,
    ) {
        self.graph.connect_port(src, src_port, dst, dst_port);
    }

    /// Alias a boundary port of the composite currently being expanded
    /// onto exactly one child port. Aliasing is a renaming, not a wire:
    /// any external edge referencing the composite's boundary port is
    /// rewritten at expansion time to reference `child`/`child_port`
    /// directly.
    pub fn alias(
        &mut self,
        boundary_port: &'static str,
        child: NodeId,
        child_port: &'static str,
    ) {
        self.graph
            .register_alias(self.composite_id, boundary_port, child, child_port);
    }
}
