//! Reference-counted value wrapper for edge types that own heap
//! resources.
//!
//! `Arc` already gives us an atomic reference count and a deterministic
//! deallocator run at zero; `RcValue` makes the production/fan-out/
//! consumption protocol explicit rather than leaving callers to
//! reinvent it with raw `Arc::clone`.

use std::sync::Arc;

#[derive(Debug)]
pub struct RcValue<T>(Arc<T>);

impl<T> RcValue<T> {
    /// Construct with count = 1, as a fresh producer holds it.
    pub fn new(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Called once per production that fans out to `n` consumers: returns
    /// `n` handles, each sharing ownership of the same value. The
    /// underlying deallocator runs only once every returned handle (and
    /// the original) has been dropped.
    pub fn fan_out(&self, n: usize) -> Vec<Self> {
        (0..n).map(|_| Self(self.0.clone())).collect()
    }

    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl<T> Clone for RcValue<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> std::ops::Deref for RcValue<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct DropCounter<'a>(&'a AtomicUsize);
    impl<'a> Drop for DropCounter<'a> {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn deallocator_runs_once_after_all_consumers_drop() {
        let drops = AtomicUsize::new(0);
        let value = RcValue::new(DropCounter(&drops));
        let branches = value.fan_out(3);
        assert_eq!(value.strong_count(), 4);

        drop(value);
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        let mut branches = branches;
        branches.pop();
        branches.pop();
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        branches.pop();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
