//! Delayed event queue drained by a single worker thread.
//!
//! Producers on any thread call [`EventSender::send`]. One worker thread
//! pops messages in due order and hands them to the handler one at a time,
//! so the handler never runs concurrently with itself.
//!
//! Ordering: messages are keyed by `(due time, enqueue sequence)`. Messages
//! with equal delay keep FIFO order. A delayed message is never handled before
//! an earlier-enqueued message that is already due, but may be overtaken by
//! later messages that become due sooner.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Queue errors.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The worker thread is already running.
    #[error("Event worker already running")]
    AlreadyRunning,

    /// The worker thread could not be spawned.
    #[error("Failed to spawn event worker: {0}")]
    Spawn(#[from] std::io::Error),
}

struct Entry<T> {
    due: Instant,
    seq: u64,
    event: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // BinaryHeap is a max-heap; invert so the earliest (due, seq) pops first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueueState<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<QueueState<T>>,
    ready: Condvar,
}

/// Producer handle. Cheap to clone and safe to use from any thread.
pub struct EventSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for EventSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> EventSender<T> {
    /// Enqueue `event` to be handled after `delay`.
    ///
    /// Returns false if the queue has been shut down; the event is dropped.
    pub fn send(&self, event: T, delay: Duration) -> bool {
        let mut state = self.shared.state.lock();
        if state.closed {
            debug!("[EventQueue] Queue closed, dropping event");
            return false;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Entry {
            due: Instant::now() + delay,
            seq,
            event,
        });
        self.shared.ready.notify_one();
        true
    }

    /// Enqueue `event` with no delay.
    pub fn send_now(&self, event: T) -> bool {
        self.send(event, Duration::ZERO)
    }

    /// Drop every pending message matching `predicate`.
    ///
    /// Messages already handed to the worker are not affected.
    pub fn remove_pending<F>(&self, predicate: F) -> usize
    where
        F: Fn(&T) -> bool,
    {
        let mut state = self.shared.state.lock();
        let before = state.heap.len();
        let kept: Vec<Entry<T>> = state
            .heap
            .drain()
            .filter(|entry| !predicate(&entry.event))
            .collect();
        state.heap = kept.into_iter().collect();
        before - state.heap.len()
    }

    /// Number of messages waiting (due or not).
    pub fn len(&self) -> usize {
        self.shared.state.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Worker {
    handle: JoinHandle<()>,
    thread_id: ThreadId,
}

/// Event queue owning the worker thread.
pub struct EventQueue<T> {
    sender: EventSender<T>,
    worker: Mutex<Option<Worker>>,
}

impl<T: Send + 'static> EventQueue<T> {
    pub fn new() -> Self {
        Self {
            sender: EventSender {
                shared: Arc::new(Shared {
                    state: Mutex::new(QueueState {
                        heap: BinaryHeap::new(),
                        next_seq: 0,
                        closed: false,
                    }),
                    ready: Condvar::new(),
                }),
            },
            worker: Mutex::new(None),
        }
    }

    /// Producer handle for this queue.
    pub fn sender(&self) -> EventSender<T> {
        self.sender.clone()
    }

    /// Spawn the worker thread. Messages sent before `start` are kept and
    /// handled once the worker runs.
    pub fn start<F>(&self, name: &str, handler: F) -> Result<(), QueueError>
    where
        F: FnMut(T) + Send + 'static,
    {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(QueueError::AlreadyRunning);
        }

        self.sender.shared.state.lock().closed = false;

        let shared = Arc::clone(&self.sender.shared);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_worker(&shared, handler))?;
        let thread_id = handle.thread().id();
        info!("[EventQueue] Worker '{}' started", name);

        *worker = Some(Worker { handle, thread_id });
        Ok(())
    }

    /// Stop the worker and drop pending messages.
    ///
    /// Blocks until the message currently being handled finishes. Safe to call
    /// from the worker thread itself, in which case the thread is detached
    /// instead of joined.
    pub fn shutdown(&self) {
        {
            let mut state = self.sender.shared.state.lock();
            state.closed = true;
            let dropped = state.heap.len();
            state.heap.clear();
            if dropped > 0 {
                debug!("[EventQueue] Dropped {} pending event(s) on shutdown", dropped);
            }
            self.sender.shared.ready.notify_all();
        }

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.thread_id == thread::current().id() {
                debug!("[EventQueue] Shutdown requested from worker thread, detaching");
                return;
            }
            if worker.handle.join().is_err() {
                warn!("[EventQueue] Worker thread panicked");
            }
            info!("[EventQueue] Worker stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    pub fn len(&self) -> usize {
        self.sender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }
}

impl<T: Send + 'static> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for EventQueue<T> {
    fn drop(&mut self) {
        {
            let mut state = self.sender.shared.state.lock();
            state.closed = true;
            state.heap.clear();
            self.sender.shared.ready.notify_all();
        }
        if let Some(worker) = self.worker.get_mut().take() {
            if worker.thread_id != thread::current().id() {
                let _ = worker.handle.join();
            }
        }
    }
}

fn run_worker<T, F>(shared: &Shared<T>, mut handler: F)
where
    F: FnMut(T),
{
    loop {
        let event = {
            let mut state = shared.state.lock();
            loop {
                if state.closed {
                    return;
                }
                let now = Instant::now();
                let next_due = state.heap.peek().map(|entry| entry.due);
                match next_due {
                    Some(due) if due <= now => {
                        break state.heap.pop().map(|entry| entry.event);
                    }
                    Some(due) => {
                        shared.ready.wait_until(&mut state, due);
                    }
                    None => {
                        shared.ready.wait(&mut state);
                    }
                }
            }
        };

        if let Some(event) = event {
            handler(event);
        }
    }
}
