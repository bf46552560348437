//! Register-then-wait primitives shared by every blocking script call.
//!
//! A waiter is inserted into a [`WaitTable`] before the caller checks for or
//! blocks on a result, and publication delivers under the table lock. An item
//! published after registration therefore always reaches the waiter.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::scripting::AbortSignal;

/// Result of a bounded wait
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome<T> {
    Received(T),
    /// The timeout elapsed with nothing matching
    TimedOut,
    /// The waiting script was aborted
    Cancelled,
}

impl<T> WaitOutcome<T> {
    pub fn received(self) -> Option<T> {
        match self {
            WaitOutcome::Received(item) => Some(item),
            _ => None,
        }
    }

    pub fn is_received(&self) -> bool {
        matches!(self, WaitOutcome::Received(_))
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, WaitOutcome::TimedOut)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaitOutcome::Cancelled)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> WaitOutcome<U> {
        match self {
            WaitOutcome::Received(item) => WaitOutcome::Received(f(item)),
            WaitOutcome::TimedOut => WaitOutcome::TimedOut,
            WaitOutcome::Cancelled => WaitOutcome::Cancelled,
        }
    }
}

/// Something blocked that can be woken early
pub trait Interrupt: Send + Sync {
    fn interrupt(&self);
}

struct SlotState<T> {
    delivered: Option<T>,
    cancelled: bool,
}

/// Single-shot rendezvous between one waiter and any number of publishers
pub(crate) struct WaitSlot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

impl<T> WaitSlot<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                delivered: None,
                cancelled: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Keep the first delivery; later ones are ignored
    fn deliver(&self, item: T) {
        let mut state = self.state.lock();
        if state.delivered.is_none() && !state.cancelled {
            state.delivered = Some(item);
            self.ready.notify_all();
        }
    }

    fn wait(&self, timeout: Duration) -> WaitOutcome<T> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();

        loop {
            if let Some(item) = state.delivered.take() {
                return WaitOutcome::Received(item);
            }
            if state.cancelled {
                return WaitOutcome::Cancelled;
            }

            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return WaitOutcome::TimedOut;
                    }
                    // Spurious and timed-out wakeups both loop back to re-check
                    let _ = self.ready.wait_until(&mut state, deadline);
                }
                None => self.ready.wait(&mut state),
            }
        }
    }
}

impl<T: Send> Interrupt for WaitSlot<T> {
    fn interrupt(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;
        self.ready.notify_all();
    }
}

type Accept<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

struct Waiter<T> {
    token: u64,
    slot: Arc<WaitSlot<T>>,
    accept: Accept<T>,
}

struct TableInner<K, T> {
    next_token: u64,
    waiters: HashMap<K, Vec<Waiter<T>>>,
}

/// Waiters keyed by what they wait on (entity, activity invocation, ...)
pub(crate) struct WaitTable<K, T> {
    inner: Mutex<TableInner<K, T>>,
}

impl<K, T> WaitTable<K, T>
where
    K: Eq + Hash + Copy,
    T: Clone + Send + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(TableInner {
                next_token: 0,
                waiters: HashMap::new(),
            }),
        }
    }

    /// Register interest; the waiter stays registered until the guard drops
    pub(crate) fn register(
        &self,
        key: K,
        accept: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Registration<'_, K, T> {
        let slot = Arc::new(WaitSlot::new());
        let mut inner = self.inner.lock();
        let token = inner.next_token;
        inner.next_token += 1;
        inner.waiters.entry(key).or_default().push(Waiter {
            token,
            slot: slot.clone(),
            accept: Box::new(accept),
        });

        Registration {
            table: self,
            key,
            token,
            slot,
        }
    }

    /// Build an item under the table lock and hand it to every accepting waiter
    ///
    /// Building under the lock serializes publications, so timestamps taken
    /// in `make` are observed in order by every waiter on `key`.
    pub(crate) fn publish_with(&self, key: K, make: impl FnOnce() -> T) -> (T, usize) {
        let inner = self.inner.lock();
        let item = make();
        let mut woken = 0;
        if let Some(waiters) = inner.waiters.get(&key) {
            for waiter in waiters.iter().filter(|w| (w.accept)(&item)) {
                waiter.slot.deliver(item.clone());
                woken += 1;
            }
        }
        (item, woken)
    }

    pub(crate) fn publish(&self, key: K, item: T) -> usize {
        self.publish_with(key, || item).1
    }

    pub(crate) fn waiter_count(&self, key: K) -> usize {
        self.inner
            .lock()
            .waiters
            .get(&key)
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn unregister(&self, key: K, token: u64) {
        let mut inner = self.inner.lock();
        if let Some(waiters) = inner.waiters.get_mut(&key) {
            waiters.retain(|w| w.token != token);
            if waiters.is_empty() {
                inner.waiters.remove(&key);
            }
        }
    }
}

/// Live registration in a [`WaitTable`]; deregisters on drop
pub(crate) struct Registration<'a, K, T>
where
    K: Eq + Hash + Copy,
    T: Clone + Send + 'static,
{
    table: &'a WaitTable<K, T>,
    key: K,
    token: u64,
    slot: Arc<WaitSlot<T>>,
}

impl<K, T> Registration<'_, K, T>
where
    K: Eq + Hash + Copy,
    T: Clone + Send + 'static,
{
    /// Block until delivery, timeout, or abort of `abort`'s script
    pub(crate) fn wait(&self, timeout: Duration, abort: Option<&AbortSignal>) -> WaitOutcome<T> {
        if let Some(signal) = abort {
            if !signal.park(self.slot.clone()) {
                return WaitOutcome::Cancelled;
            }
        }

        let outcome = self.slot.wait(timeout);

        if let Some(signal) = abort {
            signal.unpark();
        }
        outcome
    }
}

impl<K, T> Drop for Registration<'_, K, T>
where
    K: Eq + Hash + Copy,
    T: Clone + Send + 'static,
{
    fn drop(&mut self) {
        self.table.unregister(self.key, self.token);
    }
}
