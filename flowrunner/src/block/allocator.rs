//! Zero-sized handle to the ambient global allocator, passed to
//! `initialize`/`deinitialize` hooks so the authoring contract matches
//! the `initialize(self, allocator)` authoring contract without the engine actually
//! owning a custom allocator.

#[derive(Debug, Clone, Copy, Default)]
pub struct Allocator(());

impl Allocator {
    pub(crate) fn new() -> Self {
        Allocator(())
    }
}
