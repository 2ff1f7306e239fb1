//! Background deleter.
//!
//! Values handed to [`LazyFree`] are already unreachable; a dedicated thread
//! drops them and releases their bytes from the shared counter.

use crate::memory::MemoryCounter;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

struct Job {
    value: Box<[u8]>,
    bytes: u64,
}

/// Handle to the background deleter thread.
///
/// Dropping the handle drains the queue and joins the thread.
#[derive(Debug)]
pub struct LazyFree {
    sender: Option<Sender<Job>>,
    pending: Arc<AtomicUsize>,
    memory: MemoryCounter,
    handle: Option<JoinHandle<()>>,
}

impl LazyFree {
    /// Start the deleter. `delay` is slept before each job, to model a slow
    /// allocator.
    pub fn spawn(memory: MemoryCounter, delay: Option<Duration>) -> std::io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let pending = Arc::new(AtomicUsize::new(0));

        let handle = {
            let pending = pending.clone();
            let memory = memory.clone();
            std::thread::Builder::new()
                .name("lazyfree".to_string())
                .spawn(move || run(receiver, pending, memory, delay))?
        };

        Ok(Self {
            sender: Some(sender),
            pending,
            memory,
            handle: Some(handle),
        })
    }

    /// Queue a value for freeing. Its `bytes` stay charged until the worker
    /// has dropped it.
    pub fn free(&self, value: Box<[u8]>, bytes: u64) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        let job = Job { value, bytes };
        let sent = match &self.sender {
            Some(sender) => sender.send(job).map_err(|e| e.into_inner()),
            None => Err(job),
        };
        // Worker is gone; free inline.
        if let Err(job) = sent {
            drop(job.value);
            self.memory.sub(job.bytes);
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Jobs queued or in progress.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Block until every queued job has been freed.
    pub fn wait_idle(&self) {
        while self.pending() > 0 {
            std::thread::sleep(Duration::from_micros(100));
        }
    }
}

impl Drop for LazyFree {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(
    receiver: Receiver<Job>,
    pending: Arc<AtomicUsize>,
    memory: MemoryCounter,
    delay: Option<Duration>,
) {
    let mut freed: u64 = 0;
    for job in receiver {
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        drop(job.value);
        memory.sub(job.bytes);
        pending.fetch_sub(1, Ordering::AcqRel);
        freed += 1;
    }
    debug!(freed, "lazyfree worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frees_in_background() {
        let memory = MemoryCounter::new();
        memory.add(1000);
        let lazy = LazyFree::spawn(memory.clone(), None).unwrap();

        for _ in 0..10 {
            lazy.free(vec![0u8; 64].into_boxed_slice(), 100);
        }
        lazy.wait_idle();

        assert_eq!(lazy.pending(), 0);
        assert_eq!(memory.get(), 0);
    }

    #[test]
    fn test_slow_worker_reports_pending() {
        let memory = MemoryCounter::new();
        memory.add(200);
        let lazy = LazyFree::spawn(memory.clone(), Some(Duration::from_millis(50))).unwrap();

        lazy.free(Box::new([1u8, 2, 3]), 100);
        lazy.free(Box::new([4u8, 5, 6]), 100);
        assert!(lazy.pending() > 0);

        lazy.wait_idle();
        assert_eq!(memory.get(), 0);
    }

    #[test]
    fn test_drop_drains_queue() {
        let memory = MemoryCounter::new();
        memory.add(500);
        {
            let lazy = LazyFree::spawn(memory.clone(), None).unwrap();
            for _ in 0..5 {
                lazy.free(Box::new([0u8; 8]), 100);
            }
        }
        assert_eq!(memory.get(), 0);
    }
}
