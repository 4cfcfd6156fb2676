//! Mock position source for testing and track replay

use crate::core::Position;
use crate::source::{
    PositionCallback, PositionSource, PositionUpdate, SourceError, SourceResult, Subscription,
    SubscriptionId, WatchOptions,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct MockState {
    next_id: u64,
    subscribers: BTreeMap<SubscriptionId, Arc<Registration>>,
    last_options: Option<WatchOptions>,
    permission_denied: bool,
    emitted: u64,
    deliveries: u64,
}

struct Delivery {
    active: bool,
    /// Threads currently running the callback
    in_flight: Vec<ThreadId>,
}

/// One subscriber's callback plus the bookkeeping that lets release wait out
/// deliveries already running on other threads
struct Registration {
    callback: PositionCallback,
    delivery: Mutex<Delivery>,
    finished: Condvar,
}

/// Marks the current thread as delivering until dropped, even if the callback panics
struct InFlight<'a> {
    registration: &'a Registration,
    thread: ThreadId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut delivery = lock(&self.registration.delivery);
        if let Some(index) = delivery.in_flight.iter().position(|t| *t == self.thread) {
            delivery.in_flight.swap_remove(index);
        }
        drop(delivery);
        self.registration.finished.notify_all();
    }
}

impl Registration {
    fn new(callback: PositionCallback) -> Self {
        Self {
            callback,
            delivery: Mutex::new(Delivery {
                active: true,
                in_flight: Vec::new(),
            }),
            finished: Condvar::new(),
        }
    }

    fn deliver(&self, update: PositionUpdate) -> bool {
        let thread = thread::current().id();
        {
            let mut delivery = lock(&self.delivery);
            if !delivery.active {
                return false;
            }
            delivery.in_flight.push(thread);
        }

        let _in_flight = InFlight {
            registration: self,
            thread,
        };
        (self.callback)(update);
        true
    }

    /// Stop deliveries and wait for those running on other threads. A callback
    /// releasing its own subscription does not wait on itself.
    fn deactivate(&self) {
        let current = thread::current().id();
        let mut delivery = lock(&self.delivery);
        delivery.active = false;
        while delivery.in_flight.iter().any(|t| *t != current) {
            delivery = self
                .finished
                .wait(delivery)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// In-process position source driven by the caller
///
/// Cloning yields another handle onto the same source, so a test can keep one
/// handle for emitting while a session owns the subscription.
#[derive(Clone, Default)]
pub struct MockPositionSource {
    state: Arc<Mutex<MockState>>,
}

impl MockPositionSource {
    /// Create a new mock source with permission granted
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        lock(&self.state)
    }

    /// Make future `subscribe` calls fail with `PermissionDenied`
    pub fn deny_permission(&self) {
        self.lock().permission_denied = true;
    }

    pub fn grant_permission(&self) {
        self.lock().permission_denied = false;
    }

    /// Deliver a sample to every live subscriber, returning how many received it
    pub fn emit_position(&self, position: Position) -> usize {
        self.emit(Ok(position))
    }

    /// Deliver an error to every live subscriber
    pub fn emit_error(&self, error: SourceError) -> usize {
        self.emit(Err(error))
    }

    /// Deliver a whole track in order
    pub fn emit_track(&self, track: &[Position]) -> usize {
        track.iter().map(|p| self.emit_position(*p)).sum()
    }

    fn emit(&self, update: PositionUpdate) -> usize {
        // Callbacks run outside the lock so they may unsubscribe themselves
        let registrations: Vec<Arc<Registration>> = {
            let mut state = self.lock();
            state.emitted += 1;
            state.subscribers.values().cloned().collect()
        };

        let delivered = registrations
            .iter()
            .filter(|registration| registration.deliver(update.clone()))
            .count();
        self.lock().deliveries += delivered as u64;
        delivered
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Total updates emitted, delivered to anyone or not
    pub fn emitted_count(&self) -> u64 {
        self.lock().emitted
    }

    /// Total callback invocations
    pub fn delivery_count(&self) -> u64 {
        self.lock().deliveries
    }

    /// Options passed by the most recent subscriber
    pub fn last_watch_options(&self) -> Option<WatchOptions> {
        self.lock().last_options.clone()
    }
}

impl PositionSource for MockPositionSource {
    fn subscribe(
        &self,
        options: &WatchOptions,
        callback: PositionCallback,
    ) -> SourceResult<Subscription> {
        let registration = Arc::new(Registration::new(callback));
        let id = {
            let mut state = self.lock();
            if state.permission_denied {
                return Err(SourceError::PermissionDenied);
            }
            state.next_id += 1;
            let id = SubscriptionId::new(state.next_id);
            state.subscribers.insert(id, Arc::clone(&registration));
            state.last_options = Some(options.clone());
            id
        };
        debug!(subscription = id.id(), "mock source subscribed");

        let state = Arc::downgrade(&self.state);
        Ok(Subscription::new(id, move || {
            if let Some(state) = state.upgrade() {
                lock(&state).subscribers.remove(&id);
            }
            registration.deactivate();
            debug!(subscription = id.id(), "mock source unsubscribed");
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    fn counting_callback() -> (PositionCallback, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let callback: PositionCallback = Arc::new(move |_update: PositionUpdate| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (callback, count)
    }

    #[test]
    fn test_mock_source_creation() {
        let source = MockPositionSource::new();
        assert_eq!(source.subscriber_count(), 0);
        assert_eq!(source.emitted_count(), 0);
        assert_eq!(source.emit_position(Position::new(1.0, 2.0)), 0);
    }

    #[test]
    fn test_delivers_to_subscribers() {
        let source = MockPositionSource::new();
        let (callback, count) = counting_callback();
        let _subscription = source.subscribe(&WatchOptions::default(), callback).unwrap();

        assert_eq!(source.subscriber_count(), 1);
        source.emit_position(Position::new(1.0, 2.0));
        source.emit_error(SourceError::SignalLost);

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(source.delivery_count(), 2);
        assert_eq!(source.last_watch_options(), Some(WatchOptions::default()));
    }

    #[test]
    fn test_no_delivery_after_unsubscribe() {
        let source = MockPositionSource::new();
        let (callback, count) = counting_callback();
        let mut subscription = source.subscribe(&WatchOptions::default(), callback).unwrap();

        source.emit_position(Position::new(1.0, 2.0));
        subscription.unsubscribe();
        source.emit_position(Position::new(1.0, 2.0));
        source.emit_position(Position::new(1.0, 2.0));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(source.subscriber_count(), 0);
        assert_eq!(source.emitted_count(), 3);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let source = MockPositionSource::new();
        let (callback, count) = counting_callback();
        {
            let _subscription = source.subscribe(&WatchOptions::default(), callback).unwrap();
            assert_eq!(source.subscriber_count(), 1);
        }
        source.emit_position(Position::new(1.0, 2.0));

        assert_eq!(source.subscriber_count(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_permission_denied() {
        let source = MockPositionSource::new();
        source.deny_permission();
        let (callback, _count) = counting_callback();

        let result = source.subscribe(&WatchOptions::default(), callback.clone());
        assert!(matches!(result, Err(SourceError::PermissionDenied)));

        source.grant_permission();
        assert!(source.subscribe(&WatchOptions::default(), callback).is_ok());
    }

    #[test]
    fn test_subscription_outliving_source() {
        let source = MockPositionSource::new();
        let (callback, _count) = counting_callback();
        let subscription = source.subscribe(&WatchOptions::default(), callback).unwrap();
        drop(source);
        // Release must not panic once the source is gone
        drop(subscription);
    }

    #[test]
    fn test_unsubscribe_during_emit_blocks_later_delivery() {
        let source = MockPositionSource::new();
        let entered = Arc::new(Barrier::new(2));
        let resume = Arc::new(Barrier::new(2));

        let (entered_cb, resume_cb) = (entered.clone(), resume.clone());
        let blocking: PositionCallback = Arc::new(move |_update: PositionUpdate| {
            entered_cb.wait();
            resume_cb.wait();
        });
        let _first = source.subscribe(&WatchOptions::default(), blocking).unwrap();
        let (callback, count) = counting_callback();
        let mut second = source.subscribe(&WatchOptions::default(), callback).unwrap();

        let emitter = {
            let source = source.clone();
            thread::spawn(move || source.emit_position(Position::new(1.0, 2.0)))
        };

        entered.wait();
        second.unsubscribe();
        assert_eq!(source.subscriber_count(), 1);
        resume.wait();

        assert_eq!(emitter.join().unwrap(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(source.delivery_count(), 1);
    }

    #[test]
    fn test_unsubscribe_waits_for_running_callback() {
        let source = MockPositionSource::new();
        let entered = Arc::new(Barrier::new(2));
        let finished = Arc::new(AtomicBool::new(false));

        let (entered_cb, finished_cb) = (entered.clone(), finished.clone());
        let callback: PositionCallback = Arc::new(move |_update: PositionUpdate| {
            entered_cb.wait();
            thread::sleep(Duration::from_millis(50));
            finished_cb.store(true, Ordering::SeqCst);
        });
        let mut subscription = source.subscribe(&WatchOptions::default(), callback).unwrap();

        let emitter = {
            let source = source.clone();
            thread::spawn(move || source.emit_position(Position::new(1.0, 2.0)))
        };

        entered.wait();
        subscription.unsubscribe();
        assert!(finished.load(Ordering::SeqCst));
        emitter.join().unwrap();
    }

    #[test]
    fn test_callback_can_release_own_subscription() {
        let source = MockPositionSource::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let (counted, count) = counting_callback();

        let holder = slot.clone();
        let callback: PositionCallback = Arc::new(move |update: PositionUpdate| {
            counted(update);
            let subscription = holder.lock().unwrap().take();
            drop(subscription);
        });
        let subscription = source.subscribe(&WatchOptions::default(), callback).unwrap();
        *slot.lock().unwrap() = Some(subscription);

        source.emit_position(Position::new(1.0, 2.0));
        source.emit_position(Position::new(1.0, 2.0));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(source.subscriber_count(), 0);
    }
}
