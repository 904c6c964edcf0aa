//! Convenience re-exports for block authors.
//!
//! ```ignore
//! use flowrunner::prelude::*;
//! ```

pub use crate::block::{
    Allocator, Block, BlockHandle, Composite, CompositeBuilder, ProcessOutcome, ProcessResult,
    RcValue,
};
pub use crate::error::{FlowError, Result};
pub use crate::graph::{Graph, GraphOptions};
pub use crate::block::NodeId;

pub use flowrunner_macros::block;
