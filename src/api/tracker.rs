//! Location tracker and tracking sessions
//!
//! A [`TrackingSession`] is created per challenge visit. It owns the proximity
//! state, the arrival gate, and the position subscription. Updates from the source
//! are handled one at a time under the session lock: the `Tracking -> Arrived`
//! transition is decided inside the critical section, and the gate is opened after
//! the lock is released, so a second sample always sees the latch already set.

use crate::algorithms::initial_bearing;
use crate::api::types::{
    CallbackHandle, EventCallback, SessionSnapshot, TrackerError, TrackerEvent, TrackerResult,
};
use crate::core::{ChallengeContext, Position};
use crate::reporting::{HttpProgressReporter, ProgressReport, ProgressReporter, ReportError};
use crate::session::{ArrivalGate, Phase, ProximitySession, ReportNotifier, SampleOutcome};
use crate::source::{
    PositionCallback, PositionSource, PositionUpdate, SourceError, Subscription, WatchOptions,
};
use crate::utils::TrackerConfig;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Event callbacks registered on one session
#[derive(Default)]
struct CallbackRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    counter: u32,
    callbacks: BTreeMap<CallbackHandle, EventCallback>,
}

impl CallbackRegistry {
    fn register(&self, callback: EventCallback) -> CallbackHandle {
        let mut inner = lock(&self.inner);
        inner.counter += 1;
        let handle = CallbackHandle::new(inner.counter);
        inner.callbacks.insert(handle, callback);
        handle
    }

    fn unregister(&self, handle: CallbackHandle) -> bool {
        lock(&self.inner).callbacks.remove(&handle).is_some()
    }

    fn len(&self) -> usize {
        lock(&self.inner).callbacks.len()
    }

    fn trigger(&self, event: TrackerEvent) {
        let callbacks: Vec<EventCallback> = lock(&self.inner).callbacks.values().cloned().collect();
        for callback in callbacks {
            callback(event.clone());
        }
    }
}

struct SessionState {
    proximity: ProximitySession,
    location_unavailable: bool,
    failure: Option<SourceError>,
}

struct SessionShared {
    context: ChallengeContext,
    state: Mutex<SessionState>,
    gate: ArrivalGate,
    callbacks: Arc<CallbackRegistry>,
    subscription: Mutex<Option<Subscription>>,
}

impl SessionShared {
    fn handle_update(&self, update: PositionUpdate) {
        let mut events = Vec::with_capacity(2);
        let mut arrived = false;
        let mut release = None;

        {
            let mut state = lock(&self.state);
            if state.failure.is_some() {
                return;
            }

            match update {
                Ok(position) => match state.proximity.observe(&position) {
                    SampleOutcome::Skipped(error) => {
                        debug!("skipping sample: {}", error);
                        state.location_unavailable = true;
                        events.push(TrackerEvent::LocationUnavailable { error });
                    }
                    outcome => {
                        state.location_unavailable = false;
                        let distance_m = outcome.distance_m().unwrap_or_default();
                        events.push(TrackerEvent::DistanceUpdated {
                            distance_m,
                            phase: state.proximity.phase(),
                        });
                        if outcome.is_arrival() {
                            info!(
                                challenge = %self.context.challenge_id,
                                distance_m,
                                "arrived at destination"
                            );
                            events.push(TrackerEvent::Arrived { distance_m, position });
                            arrived = true;
                        }
                    }
                },
                Err(error) if error.is_terminal() => {
                    warn!(challenge = %self.context.challenge_id, "tracking stopped: {}", error);
                    state.failure = Some(error.clone());
                    release = lock(&self.subscription).take();
                    events.push(TrackerEvent::SessionFailed { error });
                }
                Err(error) => {
                    debug!("position unavailable: {}", error);
                    state.proximity.record_skipped();
                    state.location_unavailable = true;
                    events.push(TrackerEvent::LocationUnavailable { error });
                }
            }
        }

        drop(release);
        for event in events {
            self.callbacks.trigger(event);
        }
        if arrived {
            self.gate.open(ProgressReport::from(&self.context));
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        let state = lock(&self.state);
        let proximity = &state.proximity;
        let subscribed = lock(&self.subscription)
            .as_ref()
            .map(Subscription::is_active)
            .unwrap_or(false);

        SessionSnapshot {
            challenge_id: self.context.challenge_id.clone(),
            destination: proximity.destination(),
            threshold_m: proximity.threshold_m(),
            phase: proximity.phase(),
            distance_m: proximity.distance_m(),
            bearing_deg: proximity
                .last_position()
                .map(|from| initial_bearing(&from, &proximity.destination())),
            last_position: proximity.last_position(),
            samples_seen: proximity.samples_seen(),
            samples_skipped: proximity.samples_skipped(),
            location_unavailable: state.location_unavailable,
            failure: state.failure.clone(),
            arrival: proximity.arrival().copied(),
            report: self.gate.outcome(),
            active: subscribed && state.failure.is_none(),
        }
    }
}

/// One tracking session for a single challenge destination
pub struct TrackingSession {
    shared: Arc<SessionShared>,
    watch: WatchOptions,
    started: bool,
}

impl TrackingSession {
    /// Create an unstarted session; register callbacks, then call [`start`](Self::start)
    pub fn new(
        config: &TrackerConfig,
        context: ChallengeContext,
        reporter: Arc<dyn ProgressReporter>,
    ) -> TrackerResult<Self> {
        config.validate().into_result()?;

        if !context.destination.is_valid() {
            return Err(TrackerError::InvalidDestination {
                latitude: context.destination.latitude,
                longitude: context.destination.longitude,
            });
        }

        let callbacks = Arc::new(CallbackRegistry::default());
        let registry = Arc::clone(&callbacks);
        let notifier: ReportNotifier = Arc::new(move |result: &Result<(), ReportError>| {
            let event = match result {
                Ok(()) => TrackerEvent::ProgressRecorded,
                Err(error) => TrackerEvent::ProgressFailed {
                    error: error.clone(),
                },
            };
            registry.trigger(event);
        });
        let gate = ArrivalGate::new(reporter, config.report_dispatch).with_notifier(notifier);

        let state = SessionState {
            proximity: ProximitySession::new(context.destination, config.arrival_threshold_m),
            location_unavailable: false,
            failure: None,
        };

        Ok(Self {
            shared: Arc::new(SessionShared {
                context,
                state: Mutex::new(state),
                gate,
                callbacks,
                subscription: Mutex::new(None),
            }),
            watch: config.watch.clone(),
            started: false,
        })
    }

    /// Subscribe to `source`. Sessions are single-use.
    pub fn start<S: PositionSource + ?Sized>(&mut self, source: &S) -> TrackerResult<()> {
        if self.started {
            return Err(TrackerError::AlreadyStarted);
        }
        self.started = true;

        let weak = Arc::downgrade(&self.shared);
        let callback: PositionCallback = Arc::new(move |update: PositionUpdate| {
            if let Some(shared) = weak.upgrade() {
                shared.handle_update(update);
            }
        });

        match source.subscribe(&self.watch, callback) {
            Ok(subscription) => {
                info!(
                    challenge = %self.shared.context.challenge_id,
                    subscription = subscription.id().id(),
                    "tracking session started"
                );
                *lock(&self.shared.subscription) = Some(subscription);
                // A terminal error may have been delivered before the handle was stored
                if lock(&self.shared.state).failure.is_some() {
                    self.release_subscription();
                }
                Ok(())
            }
            Err(error) => {
                warn!(challenge = %self.shared.context.challenge_id, "cannot start tracking: {}", error);
                lock(&self.shared.state).failure = Some(error.clone());
                self.shared
                    .callbacks
                    .trigger(TrackerEvent::SessionFailed { error: error.clone() });
                Err(error.into())
            }
        }
    }

    pub fn register_event_callback(&self, callback: EventCallback) -> CallbackHandle {
        self.shared.callbacks.register(callback)
    }

    pub fn unregister_callback(&self, handle: CallbackHandle) -> TrackerResult<()> {
        if self.shared.callbacks.unregister(handle) {
            Ok(())
        } else {
            Err(TrackerError::InvalidCallback(handle.id()))
        }
    }

    pub fn callback_count(&self) -> usize {
        self.shared.callbacks.len()
    }

    pub fn context(&self) -> &ChallengeContext {
        &self.shared.context
    }

    pub fn phase(&self) -> Phase {
        lock(&self.shared.state).proximity.phase()
    }

    pub fn has_arrived(&self) -> bool {
        self.phase() == Phase::Arrived
    }

    pub fn distance_m(&self) -> Option<f64> {
        lock(&self.shared.state).proximity.distance_m()
    }

    pub fn is_active(&self) -> bool {
        self.snapshot().active
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.snapshot()
    }

    /// Feed a position directly, bypassing any source
    pub fn process_position(&self, position: Position) {
        self.shared.handle_update(Ok(position));
    }

    /// Feed a source error directly, bypassing any source
    pub fn process_error(&self, error: SourceError) {
        self.shared.handle_update(Err(error));
    }

    /// End the session: unsubscribe, wait for an in-flight report, return the final view
    pub fn stop(mut self) -> SessionSnapshot {
        self.release_subscription();
        self.shared.gate.wait();
        info!(challenge = %self.shared.context.challenge_id, "tracking session stopped");
        self.snapshot()
    }

    fn release_subscription(&mut self) {
        let subscription = lock(&self.shared.subscription).take();
        drop(subscription);
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.release_subscription();
    }
}

/// Entry point creating tracking sessions from one configuration
#[derive(Debug, Clone, Default)]
pub struct LocationTracker {
    config: TrackerConfig,
}

impl LocationTracker {
    pub fn new(config: TrackerConfig) -> TrackerResult<Self> {
        config.validate().into_result()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// HTTP reporter for the configured endpoint, if one is set
    pub fn http_reporter(&self) -> TrackerResult<Option<HttpProgressReporter>> {
        match &self.config.progress_endpoint {
            Some(endpoint) => {
                let timeout = Duration::from_millis(self.config.report_timeout_ms);
                Ok(Some(HttpProgressReporter::new(endpoint.clone(), timeout)?))
            }
            None => Ok(None),
        }
    }

    /// Create an unstarted session
    pub fn session(
        &self,
        context: ChallengeContext,
        reporter: Arc<dyn ProgressReporter>,
    ) -> TrackerResult<TrackingSession> {
        TrackingSession::new(&self.config, context, reporter)
    }

    /// Create a session and subscribe it to `source`
    pub fn start<S: PositionSource + ?Sized>(
        &self,
        source: &S,
        context: ChallengeContext,
        reporter: Arc<dyn ProgressReporter>,
    ) -> TrackerResult<TrackingSession> {
        let mut session = self.session(context, reporter)?;
        session.start(source)?;
        Ok(session)
    }
}
