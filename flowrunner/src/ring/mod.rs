//! Single-producer/single-consumer byte-granular ring buffer with
//! end-of-stream and broken-stream signalling.
//!
//! This is the buffer substrate edges are built on. Capacity
//! is rounded up to the next power of two so free/ready regions can be
//! masked into contiguous slices without a double-mapped virtual memory
//! trick — the Design Notes (§9) call out that either mechanism satisfies
//! the contract.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Minimum ring capacity: one page's worth ("commonly one
/// page's worth of samples, with >= 8 KiB minimum").
pub const MIN_CAPACITY: usize = 8 * 1024;

/// Result of a read-availability query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadAvailable {
    Bytes(usize),
    EndOfStream,
    BrokenStream,
}

/// Result of a blocking wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    EndOfStream,
    BrokenStream,
    Timeout,
}

struct Storage {
    buf: Vec<UnsafeCell<u8>>,
    mask: usize,
}

// SAFETY: access to `buf` is only ever through the disjoint [read, write)
// region computed from the atomically-published cursors below; the
// producer only ever touches bytes at or after `write`, the consumer only
// bytes before `write` and at or after `read`.
unsafe impl Sync for Storage {}

impl Storage {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two();
        let buf = (0..capacity).map(|_| UnsafeCell::new(0u8)).collect();
        Self {
            buf,
            mask: capacity - 1,
        }
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.mask + 1
    }

    #[inline]
    fn slice_at(&self, start: usize, len: usize) -> &[u8] {
        // SAFETY: caller guarantees `[start, start+len)` (mod capacity) does
        // not wrap and is owned exclusively by the calling side.
        unsafe {
            let ptr = self.buf[start..start + len].as_ptr() as *const u8;
            std::slice::from_raw_parts(ptr, len)
        }
    }

    #[inline]
    #[allow(clippy::mut_from_ref)]
    fn slice_at_mut(&self, start: usize, len: usize) -> &mut [u8] {
        // SAFETY: same contract as `slice_at`, with the caller holding the
        // exclusive write or read side of the ring.
        unsafe {
            let ptr = self.buf[start..start + len].as_ptr() as *mut u8;
            std::slice::from_raw_parts_mut(ptr, len)
        }
    }
}

/// A fixed-capacity, byte-granular SPSC FIFO.
///
/// Cursors are monotonic 64-bit counters; offsets into `storage` are
/// `cursor & mask`. Release-store on cursor advance and acquire-load on
/// observation give a consumer that observes `write >= X` visibility of
/// every byte written below `X`.
pub struct RingBuffer {
    storage: Storage,
    write_cursor: AtomicU64,
    read_cursor: AtomicU64,
    eos: AtomicBool,
    broken: AtomicBool,
    not_empty: Condvar,
    not_empty_lock: Mutex<()>,
    not_full: Condvar,
    not_full_lock: Mutex<()>,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        Self {
            storage: Storage::new(capacity),
            write_cursor: AtomicU64::new(0),
            read_cursor: AtomicU64::new(0),
            eos: AtomicBool::new(false),
            broken: AtomicBool::new(false),
            not_empty: Condvar::new(),
            not_empty_lock: Mutex::new(()),
            not_full: Condvar::new(),
            not_full_lock: Mutex::new(()),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    #[inline]
    fn write(&self) -> u64 {
        self.write_cursor.load(Ordering::Acquire)
    }

    #[inline]
    fn read(&self) -> u64 {
        self.read_cursor.load(Ordering::Acquire)
    }

    /// Bytes free for the producer to write.
    pub fn write_available(&self) -> usize {
        let in_flight = (self.write() - self.read()) as usize;
        self.capacity() - in_flight
    }

    /// Bytes ready for the consumer to read, or a terminal condition.
    pub fn read_available(&self) -> ReadAvailable {
        let ready = (self.write() - self.read()) as usize;
        if ready > 0 {
            return ReadAvailable::Bytes(ready);
        }
        if self.broken.load(Ordering::Acquire) {
            return ReadAvailable::BrokenStream;
        }
        if self.eos.load(Ordering::Acquire) {
            return ReadAvailable::EndOfStream;
        }
        ReadAvailable::Bytes(0)
    }

    /// Contiguous slice at the tail, up to `write_available()` long or
    /// until the physical buffer wraps (whichever is smaller).
    pub fn write_buffer(&self) -> &mut [u8] {
        let write = self.write();
        let avail = self.write_available();
        let start = (write as usize) & self.storage.mask;
        let contiguous = (self.storage.capacity() - start).min(avail);
        self.storage.slice_at_mut(start, contiguous)
    }

    /// Contiguous slice at the head, up to the ready byte count or until
    /// the physical buffer wraps (whichever is smaller).
    pub fn read_buffer(&self) -> &[u8] {
        let read = self.read();
        let ready = (self.write() - read) as usize;
        let start = (read as usize) & self.storage.mask;
        let contiguous = (self.storage.capacity() - start).min(ready);
        self.storage.slice_at(start, contiguous)
    }

    /// Advance the write cursor by `n` bytes and wake the reader.
    pub fn commit_write(&self, n: usize) {
        if n == 0 {
            return;
        }
        self.write_cursor
            .fetch_add(n as u64, Ordering::Release);
        let _guard = self.not_empty_lock.lock();
        self.not_empty.notify_one();
    }

    /// Advance the read cursor by `n` bytes and wake the writer.
    pub fn commit_read(&self, n: usize) {
        if n == 0 {
            return;
        }
        self.read_cursor.fetch_add(n as u64, Ordering::Release);
        let _guard = self.not_full_lock.lock();
        self.not_full.notify_one();
    }

    pub fn set_eos(&self) {
        self.eos.store(true, Ordering::Release);
        let _guard = self.not_empty_lock.lock();
        self.not_empty.notify_one();
    }

    pub fn is_eos(&self) -> bool {
        self.eos.load(Ordering::Acquire)
    }

    pub fn set_broken(&self) {
        self.broken.store(true, Ordering::Release);
        let _guard = self.not_full_lock.lock();
        self.not_full.notify_one();
    }

    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    /// Block until at least `min` bytes are ready, EOS, broken, or timeout.
    pub fn wait_read_available(&self, min: usize, timeout: Option<Duration>) -> WaitOutcome {
        let deadline = timeout.map(|d| Instant::now() + d);
        loop {
            match self.read_available() {
                ReadAvailable::Bytes(n) if n >= min => return WaitOutcome::Ready,
                ReadAvailable::EndOfStream => return WaitOutcome::EndOfStream,
                ReadAvailable::BrokenStream => return WaitOutcome::BrokenStream,
                _ => {}
            }
            let mut guard = self.not_empty_lock.lock();
            // Re-check under the lock to avoid missing a wakeup that
            // happened between the check above and acquiring the lock.
            match self.read_available() {
                ReadAvailable::Bytes(n) if n >= min => return WaitOutcome::Ready,
                ReadAvailable::EndOfStream => return WaitOutcome::EndOfStream,
                ReadAvailable::BrokenStream => return WaitOutcome::BrokenStream,
                _ => {}
            }
            match deadline {
                None => {
                    self.not_empty.wait(&mut guard);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return WaitOutcome::Timeout;
                    }
                    let result = self.not_empty.wait_for(&mut guard, deadline - now);
                    if result.timed_out() {
                        // Fall through and re-check once more before
                        // reporting a timeout.
                        if let ReadAvailable::Bytes(n) = self.read_available() {
                            if n >= min {
                                return WaitOutcome::Ready;
                            }
                        }
                        return WaitOutcome::Timeout;
                    }
                }
            }
        }
    }

    /// Block until at least `min` bytes are free, broken, or timeout.
    pub fn wait_write_available(&self, min: usize, timeout: Option<Duration>) -> WaitOutcome {
        let deadline = timeout.map(|d| Instant::now() + d);
        loop {
            if self.is_broken() {
                return WaitOutcome::BrokenStream;
            }
            if self.write_available() >= min {
                return WaitOutcome::Ready;
            }
            let mut guard = self.not_full_lock.lock();
            if self.is_broken() {
                return WaitOutcome::BrokenStream;
            }
            if self.write_available() >= min {
                return WaitOutcome::Ready;
            }
            match deadline {
                None => {
                    self.not_full.wait(&mut guard);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return WaitOutcome::Timeout;
                    }
                    let result = self.not_full.wait_for(&mut guard, deadline - now);
                    if result.timed_out() {
                        if self.write_available() >= min {
                            return WaitOutcome::Ready;
                        }
                        return WaitOutcome::Timeout;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_is_preserved() {
        let ring = RingBuffer::new(MIN_CAPACITY);
        let buf = ring.write_buffer();
        buf[..5].copy_from_slice(b"hello");
        ring.commit_write(5);

        assert_eq!(ring.read_available(), ReadAvailable::Bytes(5));
        let read = ring.read_buffer();
        assert_eq!(&read[..5], b"hello");
        ring.commit_read(5);
        assert_eq!(ring.read_available(), ReadAvailable::Bytes(0));
    }

    #[test]
    fn eos_observed_exactly_once_when_drained() {
        let ring = RingBuffer::new(MIN_CAPACITY);
        let buf = ring.write_buffer();
        buf[0] = 1;
        ring.commit_write(1);
        ring.set_eos();

        assert_eq!(ring.read_available(), ReadAvailable::Bytes(1));
        ring.commit_read(1);
        assert_eq!(ring.read_available(), ReadAvailable::EndOfStream);
        assert_eq!(ring.read_available(), ReadAvailable::EndOfStream);
    }

    #[test]
    fn broken_is_terminal_for_writer() {
        let ring = RingBuffer::new(MIN_CAPACITY);
        ring.set_broken();
        assert_eq!(
            ring.wait_write_available(1, None),
            WaitOutcome::BrokenStream
        );
    }

    #[test]
    fn wrap_around_preserves_bytes() {
        let ring = RingBuffer::new(MIN_CAPACITY);
        let cap = ring.capacity();

        // Fill to near the end, drain, then write across the wrap boundary.
        let near_end = cap - 3;
        {
            let buf = ring.write_buffer();
            for b in buf[..near_end].iter_mut() {
                *b = 0xAA;
            }
        }
        ring.commit_write(near_end);
        ring.commit_read(near_end);

        let payload = [1u8, 2, 3, 4, 5, 6];
        let mut written = 0;
        while written < payload.len() {
            let buf = ring.write_buffer();
            let n = buf.len().min(payload.len() - written);
            buf[..n].copy_from_slice(&payload[written..written + n]);
            ring.commit_write(n);
            written += n;
        }

        let mut out = Vec::new();
        while out.len() < payload.len() {
            let buf = ring.read_buffer();
            let n = buf.len().min(payload.len() - out.len());
            out.extend_from_slice(&buf[..n]);
            ring.commit_read(n);
        }
        assert_eq!(out, payload);
    }

    #[test]
    fn blocking_reader_wakes_on_write() {
        use std::sync::Arc;
        use std::thread;

        let ring = Arc::new(RingBuffer::new(MIN_CAPACITY));
        let reader_ring = ring.clone();
        let handle = thread::spawn(move || {
            let outcome = reader_ring.wait_read_available(4, Some(Duration::from_secs(5)));
            assert_eq!(outcome, WaitOutcome::Ready);
        });

        thread::sleep(Duration::from_millis(20));
        let buf = ring.write_buffer();
        buf[..4].copy_from_slice(&[1, 2, 3, 4]);
        ring.commit_write(4);

        handle.join().unwrap();
    }
}
