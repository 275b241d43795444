//! The pool coordination engine.
//!
//! `Pool<F>` binds together the request queue, the resource registry, the
//! factory driver, the reaper and the drain controller. All state lives in
//! a single `Core` behind one mutex — the serialized context every
//! maintenance pass and every factory completion re-enters. User callbacks
//! (factory create/destroy, request completions) never run under the lock:
//! each locked section collects an [`Actions`] batch and dispatches it
//! after unlocking.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;

use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::events::{EventBus, PoolEvent};
use crate::factory::ResourceFactory;
use crate::record::ResourceRecord;
use crate::registry::Registry;
use crate::request::{AcquireOptions, Origin, Request, RequestQueue};
use crate::stats::{Counters, PoolStats};

// ---------------------------------------------------------------------------
// Core
// ---------------------------------------------------------------------------

/// Mutable pool state, guarded by the core mutex.
struct Core<T> {
    registry: Registry<T>,
    queue: RequestQueue<T>,
    last_idle_check_at: Instant,
    last_expire_check_at: Instant,
    draining: bool,
    /// Non-reentrant guard for the maintenance pass.
    maintaining: bool,
    /// Debounces on-demand maintenance: at most one timer outstanding.
    maintenance_scheduled: bool,
    maintenance_interval: Duration,
    counters: Counters,
}

/// Deferred work collected under the core lock.
///
/// Completions, destroys and creates all involve user code, so they are
/// dispatched only after the lock is released.
struct Actions<T> {
    events: Vec<PoolEvent<T>>,
    completions: Vec<(oneshot::Sender<Result<T>>, Result<T>)>,
    destroys: Vec<T>,
    creates: usize,
    schedule_maintenance: bool,
}

impl<T> Actions<T> {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            completions: Vec::new(),
            destroys: Vec::new(),
            creates: 0,
            schedule_maintenance: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Pool<F>
// ---------------------------------------------------------------------------

/// Shared pool internals.
struct Shared<F: ResourceFactory> {
    factory: F,
    config: PoolConfig,
    core: Mutex<Core<F::Resource>>,
    events: EventBus<F::Resource>,
    handle: Handle,
}

/// A bounded, self-maintaining resource pool.
///
/// The pool amortizes the cost of expensive resources by keeping a bounded
/// population of them, matching acquire requests (with per-request
/// deadlines) to free instances, topping the population up through the
/// factory, reaping idle and expired instances, and draining cleanly on
/// shutdown.
///
/// `Pool` is a cheap clonable handle; clones share one pool.
pub struct Pool<F: ResourceFactory> {
    shared: Arc<Shared<F>>,
}

impl<F: ResourceFactory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: ResourceFactory> std::fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool").field("stats", &self.stats()).finish()
    }
}

impl<F: ResourceFactory> Pool<F> {
    /// Create a new pool over the given factory.
    ///
    /// The pool starts its periodic maintainer immediately and warms up to
    /// `config.min` resources within one maintenance cycle.
    ///
    /// # Errors
    /// Returns an error if `config` is invalid (e.g. `max == 0`).
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime; the pool spawns its
    /// maintenance timers and factory tasks on the ambient runtime.
    pub fn new(factory: F, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let now = Instant::now();
        let maintenance_interval = config.initial_maintenance_interval();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            min = config.min,
            max = config.max,
            "created resource pool"
        );

        let shared = Arc::new(Shared {
            factory,
            config,
            core: Mutex::new(Core {
                registry: Registry::new(),
                queue: RequestQueue::new(),
                last_idle_check_at: now,
                last_expire_check_at: now,
                draining: false,
                maintaining: false,
                maintenance_scheduled: false,
                maintenance_interval,
                counters: Counters::default(),
            }),
            events: EventBus::default(),
            handle: Handle::current(),
        });
        Shared::spawn_periodic(&shared);
        // Meet the `min` floor without waiting for the first periodic tick.
        shared.schedule_maintenance();
        Ok(Self { shared })
    }

    /// Acquire a resource using the pool-wide default timeout.
    ///
    /// Resolves once a free resource is matched to this request, or fails
    /// with a timeout, a drain abort, or an immediate rejection. Dropping
    /// the returned future abandons the request; an already-assigned
    /// resource is returned to the pool.
    #[track_caller]
    pub fn acquire(&self) -> impl Future<Output = Result<F::Resource>> + Send + 'static {
        let origin = Origin::capture();
        self.request(AcquireOptions::default(), origin)
    }

    /// Acquire with per-request overrides.
    #[track_caller]
    pub fn acquire_with(
        &self,
        options: AcquireOptions,
    ) -> impl Future<Output = Result<F::Resource>> + Send + 'static {
        let origin = Origin::capture();
        self.request(options, origin)
    }

    fn request(
        &self,
        options: AcquireOptions,
        origin: Origin,
    ) -> impl Future<Output = Result<F::Resource>> + Send + 'static {
        let receiver = self.shared.enqueue(options, origin);
        async move {
            match receiver.await {
                Ok(result) => result,
                // Every internal sender was dropped: the pool itself is gone.
                Err(_) => Err(Error::AbortedByDrain { origin }),
            }
        }
    }

    /// Non-blocking fast path: pop one immediately usable free resource.
    ///
    /// A synthetic request is served through the normal path, so events and
    /// accounting are identical to [`acquire`](Self::acquire). Returns
    /// `None` when no valid free resource exists or the pool is draining.
    #[track_caller]
    pub fn acquire_sync(&self) -> Option<F::Resource> {
        let origin = Origin::capture();
        let now = Instant::now();
        let (completion, mut receiver) = oneshot::channel();
        let mut actions = Actions::new();
        {
            let mut core = self.shared.core.lock();
            if core.draining {
                let error = Error::AcquireDuringDraining { origin };
                actions.events.push(PoolEvent::ServeError {
                    error: error.clone(),
                });
                actions.completions.push((completion, Err(error)));
            } else if let Some(record) = self.shared.next_free(&mut core, &mut actions) {
                actions.events.push(PoolEvent::RequestEnqueued { origin });
                let request = Request {
                    origin,
                    created_at: now,
                    deadline: None,
                    completion,
                };
                self.shared.serve(&mut core, request, record, now, &mut actions);
            }
        }
        self.shared.dispatch(actions);
        match receiver.try_recv() {
            Ok(Ok(value)) => Some(value),
            _ => None,
        }
    }

    /// Return a lent resource to the pool.
    ///
    /// The value is located in the lent set via the factory's `compare`
    /// (newest lend first). If found it is re-admitted to the free list
    /// when it validates, or destroyed otherwise. Unknown values are
    /// ignored.
    pub fn release(&self, value: &F::Resource) {
        self.shared.release_value(value);
    }

    /// Remove a resource from the pool and destroy it.
    ///
    /// Searches the lent set first, then the free list. Destroying a value
    /// the pool does not know is a no-op, so `destroy` is idempotent.
    pub fn destroy(&self, value: &F::Resource) {
        let mut actions = Actions::new();
        {
            let mut core = self.shared.core.lock();
            let found = core
                .registry
                .remove_lent_by(|candidate| self.shared.factory.compare(candidate, value))
                .or_else(|| {
                    core.registry
                        .remove_free_by(|candidate| self.shared.factory.compare(candidate, value))
                });
            if let Some(record) = found {
                self.shared.start_destroy(&mut core, record, &mut actions);
            }
        }
        self.shared.dispatch(actions);
    }

    /// Drain the pool: a two-phase, idempotent-by-effect shutdown.
    ///
    /// The first call rejects future requests, cancels every queued request
    /// with [`Error::AbortedByDrain`], and destroys all free resources.
    /// Every call (first or not) then waits until lent, creating and
    /// destroying populations have fully unwound, and emits
    /// [`PoolEvent::Drained`].
    pub async fn drain(&self) {
        let shared = &self.shared;
        let mut actions = Actions::new();
        {
            let mut core = shared.core.lock();
            if !core.draining {
                core.draining = true;

                #[cfg(feature = "tracing")]
                tracing::debug!("draining pool");

                for request in core.queue.drain_all() {
                    let error = Error::AbortedByDrain {
                        origin: request.origin,
                    };
                    shared.fail(request, error, &mut actions);
                }
                while let Some(record) = core.registry.free.pop_front() {
                    shared.start_destroy(&mut core, record, &mut actions);
                }
            }
        }
        shared.dispatch(actions);

        // Lent resources unwind through release/destroy; creating and
        // destroying populations through their factory completions. Poll on
        // the maintenance latency so the wait never hogs the scheduler.
        loop {
            if shared.core.lock().registry.total() == 0 {
                break;
            }
            tokio::time::sleep(shared.config.maintenance_latency).await;
        }
        shared.events.emit(PoolEvent::Drained);
    }

    /// Replace the periodic maintenance cadence.
    ///
    /// Takes effect at the periodic maintainer's next wake-up. Cadences
    /// below one millisecond are raised to it.
    pub fn set_maintenance_interval(&self, interval: Duration) {
        let interval = interval.max(Duration::from_millis(1));
        self.shared.core.lock().maintenance_interval = interval;
    }

    /// Get a point-in-time statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let core = self.shared.core.lock();
        PoolStats {
            free: core.registry.free.len(),
            lent: core.registry.lent.len(),
            creating: core.registry.creating,
            destroying: core.registry.destroying,
            pending_requests: core.queue.len(),
            total_created: core.counters.created,
            total_destroyed: core.counters.destroyed,
            total_acquisitions: core.counters.acquisitions,
            total_releases: core.counters.releases,
            total_timeouts: core.counters.timeouts,
        }
    }

    /// Subscribe to pool lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent<F::Resource>> {
        self.shared.events.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Enqueue / release / storage
// ---------------------------------------------------------------------------

impl<F: ResourceFactory> Shared<F> {
    fn enqueue(
        self: &Arc<Self>,
        options: AcquireOptions,
        origin: Origin,
    ) -> oneshot::Receiver<Result<F::Resource>> {
        let (completion, receiver) = oneshot::channel();
        let now = Instant::now();
        let mut actions = Actions::new();
        {
            let mut core = self.core.lock();
            if core.draining {
                let error = Error::AcquireDuringDraining { origin };
                actions.events.push(PoolEvent::ServeError {
                    error: error.clone(),
                });
                actions.completions.push((completion, Err(error)));
            } else if let Some(limit) = self
                .config
                .max_requests
                .filter(|limit| core.queue.len() >= *limit)
            {
                let error = Error::MaxRequestsLimit { origin, limit };
                actions.events.push(PoolEvent::ServeError {
                    error: error.clone(),
                });
                actions.completions.push((completion, Err(error)));
            } else {
                let timeout = options.timeout.resolve(self.config.acquire_timeout);
                let deadline = timeout.and_then(|timeout| now.checked_add(timeout));
                core.queue.push(Request {
                    origin,
                    created_at: now,
                    deadline,
                    completion,
                });
                actions.events.push(PoolEvent::RequestEnqueued { origin });
                actions.schedule_maintenance = true;
            }
        }
        self.dispatch(actions);
        receiver
    }

    fn release_value(self: &Arc<Self>, value: &F::Resource) {
        let mut actions = Actions::new();
        {
            let mut core = self.core.lock();
            let found = core
                .registry
                .remove_lent_by(|candidate| self.factory.compare(candidate, value));
            if let Some(record) = found {
                core.counters.releases += 1;
                actions.events.push(PoolEvent::Released {
                    value: record.value().clone(),
                });
                self.store(&mut core, record, &mut actions);
            }
        }
        self.dispatch(actions);
    }

    /// Storage check: re-admit a record to the free list, or destroy it.
    fn store(
        &self,
        core: &mut Core<F::Resource>,
        mut record: ResourceRecord<F::Resource>,
        actions: &mut Actions<F::Resource>,
    ) {
        if !core.draining && self.factory.validate(&record) {
            record.mark_idle(Instant::now());
            core.registry.free.push_back(record);
            actions.schedule_maintenance = true;
        } else {
            self.start_destroy(core, record, actions);
        }
    }

    /// Transition a record into *destroying*; the factory call itself is
    /// dispatched after the lock is released.
    fn start_destroy(
        &self,
        core: &mut Core<F::Resource>,
        record: ResourceRecord<F::Resource>,
        actions: &mut Actions<F::Resource>,
    ) {
        core.registry.destroying += 1;
        core.counters.destroyed += 1;
        actions.events.push(PoolEvent::Destroyed {
            value: record.value().clone(),
        });
        actions.destroys.push(record.into_value());
        actions.schedule_maintenance = true;
    }

    // -----------------------------------------------------------------------
    // Maintenance pass
    // -----------------------------------------------------------------------

    /// One maintenance pass: reap expired, reap idle, serve aging, serve
    /// ageless, top up creations. Non-reentrant; a no-op while draining.
    fn maintain(self: &Arc<Self>) {
        let now = Instant::now();
        let mut actions = Actions::new();
        {
            let mut core = self.core.lock();
            if core.maintaining || core.draining {
                return;
            }
            core.maintaining = true;
            self.sweep_expired(&mut core, now, &mut actions);
            self.sweep_idle(&mut core, now, &mut actions);
            self.serve_aging(&mut core, now, &mut actions);
            self.serve_ageless(&mut core, now, &mut actions);
            self.top_up(&mut core, &mut actions);
            core.maintaining = false;
        }
        self.dispatch(actions);
    }

    fn sweep_expired(
        &self,
        core: &mut Core<F::Resource>,
        now: Instant,
        actions: &mut Actions<F::Resource>,
    ) {
        if self.config.expire_timeout.is_none() {
            return;
        }
        if now.duration_since(core.last_expire_check_at) <= self.config.expire_check_interval {
            return;
        }
        core.last_expire_check_at = now;

        // Collect-then-destroy: destruction callbacks must never observe the
        // free list mid-iteration.
        let mut kept = VecDeque::with_capacity(core.registry.free.len());
        while let Some(record) = core.registry.free.pop_front() {
            if record.expired(now) {
                #[cfg(feature = "tracing")]
                tracing::debug!("reaping expired resource");
                self.start_destroy(core, record, actions);
            } else {
                kept.push_back(record);
            }
        }
        core.registry.free = kept;
    }

    fn sweep_idle(
        &self,
        core: &mut Core<F::Resource>,
        now: Instant,
        actions: &mut Actions<F::Resource>,
    ) {
        let Some(idle_timeout) = self.config.idle_timeout else {
            return;
        };
        if now.duration_since(core.last_idle_check_at) <= self.config.idle_check_interval {
            return;
        }
        core.last_idle_check_at = now;

        let mut kept = VecDeque::with_capacity(core.registry.free.len());
        while let Some(record) = core.registry.free.pop_front() {
            if record.idle_longer_than(idle_timeout, now) {
                #[cfg(feature = "tracing")]
                tracing::debug!("reaping idle resource");
                self.start_destroy(core, record, actions);
            } else {
                kept.push_back(record);
            }
        }
        core.registry.free = kept;
    }

    fn serve_aging(
        &self,
        core: &mut Core<F::Resource>,
        now: Instant,
        actions: &mut Actions<F::Resource>,
    ) {
        loop {
            // Deadline enforcement is O(1): the queue is deadline-sorted.
            while let Some(request) = core.queue.pop_timed_out(now) {
                core.counters.timeouts += 1;
                let error = Error::AcquireTimeout {
                    origin: request.origin,
                    timeout: request.timeout(),
                };
                self.fail(request, error, actions);
            }
            let Some(request) = core.queue.pop_aging() else {
                break;
            };
            match self.next_free(core, actions) {
                Some(record) => self.serve(core, request, record, now, actions),
                None => {
                    core.queue.unpop_aging(request);
                    break;
                }
            }
        }
    }

    fn serve_ageless(
        &self,
        core: &mut Core<F::Resource>,
        now: Instant,
        actions: &mut Actions<F::Resource>,
    ) {
        loop {
            let Some(request) = core.queue.pop_ageless() else {
                break;
            };
            match self.next_free(core, actions) {
                Some(record) => self.serve(core, request, record, now, actions),
                None => {
                    core.queue.unpop_ageless(request);
                    break;
                }
            }
        }
    }

    /// Pop free records until one validates; invalid records are destroyed.
    fn next_free(
        &self,
        core: &mut Core<F::Resource>,
        actions: &mut Actions<F::Resource>,
    ) -> Option<ResourceRecord<F::Resource>> {
        while let Some(record) = core.registry.free.pop_front() {
            if self.factory.validate(&record) {
                return Some(record);
            }
            self.start_destroy(core, record, actions);
        }
        None
    }

    fn serve(
        &self,
        core: &mut Core<F::Resource>,
        request: Request<F::Resource>,
        mut record: ResourceRecord<F::Resource>,
        now: Instant,
        actions: &mut Actions<F::Resource>,
    ) {
        record.mark_lent(request.origin);
        let value = record.value().clone();
        core.registry.lent.push(record);
        core.counters.acquisitions += 1;
        actions.events.push(PoolEvent::ServeSuccess {
            origin: request.origin,
            value: value.clone(),
            waited: now.saturating_duration_since(request.created_at),
        });
        actions.completions.push((request.completion, Ok(value)));
    }

    fn fail(
        &self,
        request: Request<F::Resource>,
        error: Error,
        actions: &mut Actions<F::Resource>,
    ) {
        actions.events.push(PoolEvent::ServeError {
            error: error.clone(),
        });
        actions.completions.push((request.completion, Err(error)));
    }

    /// Commission enough creations to cover waiting requests and the `min`
    /// floor, bounded by `max`, in-flight creations, and `max_creating`.
    fn top_up(&self, core: &mut Core<F::Resource>, actions: &mut Actions<F::Resource>) {
        let config = &self.config;
        let count = core.registry.total();
        let mut extra = core.queue.len();
        if count < config.min && extra < config.min {
            extra = config.min;
        }
        if count + extra > config.max {
            extra = config.max.saturating_sub(count);
        }
        extra = extra.saturating_sub(core.registry.creating);
        if let Some(max_creating) = config.max_creating {
            extra = extra.min(max_creating.saturating_sub(core.registry.creating));
        }
        if extra > 0 {
            core.registry.creating += extra;
            actions.creates += extra;
        }
    }

    // -----------------------------------------------------------------------
    // Dispatch and factory tasks
    // -----------------------------------------------------------------------

    /// Fire a collected batch. Runs with the core lock released.
    fn dispatch(self: &Arc<Self>, actions: Actions<F::Resource>) {
        let Actions {
            events,
            completions,
            destroys,
            creates,
            schedule_maintenance,
        } = actions;
        for event in events {
            self.events.emit(event);
        }
        for (completion, result) in completions {
            if let Err(Ok(value)) = completion.send(result) {
                // The requester dropped its future before delivery. The
                // record is already lent; take it back through the normal
                // release path so it is not stranded.
                self.release_value(&value);
            }
        }
        for value in destroys {
            self.spawn_destroy(value);
        }
        for _ in 0..creates {
            self.spawn_create();
        }
        if schedule_maintenance {
            self.schedule_maintenance();
        }
    }

    /// Run one factory creation. The creating slot was reserved under the
    /// lock by `top_up`.
    fn spawn_create(self: &Arc<Self>) {
        let shared = Arc::clone(self);
        self.handle.spawn(async move {
            match shared.factory.create().await {
                Ok(value) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("resource created");
                    let mut actions = Actions::new();
                    {
                        let mut core = shared.core.lock();
                        core.registry.creating -= 1;
                        core.counters.created += 1;
                        actions.events.push(PoolEvent::CreateSuccess {
                            value: value.clone(),
                        });
                        let record = ResourceRecord::new(value, shared.config.expire_timeout);
                        shared.store(&mut core, record, &mut actions);
                    }
                    shared.dispatch(actions);
                }
                Err(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(error = %error, "resource creation failed");
                    shared.events.emit(PoolEvent::CreateError {
                        error: error.to_string(),
                    });
                    // Backoff is a slot hold: the creating count stays up for
                    // the cool-down, which rate-limits retries under
                    // `max_creating`.
                    if let Some(delay) = shared.factory.backoff() {
                        tokio::time::sleep(delay).await;
                    }
                    let mut actions = Actions::new();
                    shared.core.lock().registry.creating -= 1;
                    actions.schedule_maintenance = true;
                    shared.dispatch(actions);
                }
            }
        });
    }

    fn spawn_destroy(self: &Arc<Self>, value: F::Resource) {
        let shared = Arc::clone(self);
        self.handle.spawn(async move {
            // Destroy errors are the factory's concern; completion is all
            // the pool tracks.
            let _ = shared.factory.destroy(value).await;
            shared.core.lock().registry.destroying -= 1;
        });
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Request a one-shot maintenance pass within `maintenance_latency`.
    /// Debounced: while one is pending, further requests coalesce into it.
    fn schedule_maintenance(self: &Arc<Self>) {
        {
            let mut core = self.core.lock();
            if core.draining || core.maintenance_scheduled {
                return;
            }
            core.maintenance_scheduled = true;
        }
        let shared = Arc::clone(self);
        self.handle.spawn(async move {
            tokio::time::sleep(shared.config.maintenance_latency).await;
            shared.core.lock().maintenance_scheduled = false;
            shared.maintain();
        });
    }

    /// Periodic maintenance driver. Holds only a weak handle so dropping
    /// every `Pool` clone stops it; exits once the pool drains.
    fn spawn_periodic(shared: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(shared);
        shared.handle.spawn(async move {
            loop {
                let interval = match weak.upgrade() {
                    Some(shared) => {
                        let core = shared.core.lock();
                        if core.draining {
                            break;
                        }
                        core.maintenance_interval
                    }
                    None => break,
                };
                tokio::time::sleep(interval).await;
                match weak.upgrade() {
                    Some(shared) => shared.maintain(),
                    None => break,
                }
            }
        });
    }
}
