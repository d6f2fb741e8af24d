//! The Ember event bus (C1): a process-wide, prioritised, deduplicating
//! message router over three worker pools — events, commands and queries.
//!
//! See `SPEC_FULL.md` §4.1 for the full contract. In short:
//!
//! - [`EventBus::dispatch`] is fire-and-forget: it returns as soon as the
//!   event is enqueued (or silently dropped as a duplicate).
//! - [`EventBus::execute`] awaits a command handler's completion.
//! - [`EventBus::query`] awaits a typed response.
//! - [`EventBus::stop`] drains every pool in an orderly fashion.

mod config;
mod error;
mod meta;
mod registry;
mod worker;

pub use config::BusConfig;
pub use error::{BusError, HandlerError};
pub use meta::{GroupKey, Meta, MsgKey};
pub use registry::SubscriptionHandle;

use registry::HandlerRegistry;
use std::any::{Any, TypeId};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::sync::oneshot;
use worker::{EventCommandPool, QueryPool};

/// Marker for anything that can flow through the bus as an event or command
/// payload: it must carry a [`Meta`] header.
pub trait BusMessage: Send + Sync + 'static {
    fn meta(&self) -> &Meta;
}

/// A fire-and-forget message dispatched to zero or more interested
/// handlers.
pub trait Event: BusMessage {}
impl<T: BusMessage> Event for T {}

/// A message whose handlers' completion the caller awaits.
pub trait Command: BusMessage {}
impl<T: BusMessage> Command for T {}

/// A message that is answered with a typed `Response`.
pub trait Query: BusMessage {
    type Response: Send + Sync + 'static;
}

static BUS: OnceLock<Arc<EventBus>> = OnceLock::new();

/// Process-wide, prioritised, deduplicating event/command/query bus.
///
/// Constructing more than one is impossible by construction: [`EventBus::handle`]
/// always returns the same instance once one has been created (§4.1
/// "Singleton: exactly one bus per process; constructing a second returns
/// the first").
pub struct EventBus {
    events: EventCommandPool,
    commands: EventCommandPool,
    queries: QueryPool,
}

impl EventBus {
    /// Returns the process-wide bus, constructing it on first call with the
    /// given config. Subsequent calls ignore `config` and return the
    /// existing instance.
    pub fn handle(config: BusConfig) -> Arc<EventBus> {
        BUS.get_or_init(|| Arc::new(EventBus::new(config))).clone()
    }

    fn new(config: BusConfig) -> Self {
        let capacity = config.queue_capacity();
        Self {
            events: EventCommandPool::spawn(config.num_workers, capacity, false),
            commands: EventCommandPool::spawn(config.num_workers, capacity, true),
            queries: QueryPool::spawn(config.num_workers, capacity),
        }
    }

    /// Register a handler for events of type `T`. Returns a handle to pass
    /// to [`EventBus::unregister_event`] on shutdown.
    pub fn register_event<T, F, Fut>(
        &self,
        filter: Option<Arc<dyn Fn(&T) -> bool + Send + Sync>>,
        handler: F,
    ) -> SubscriptionHandle
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.events.registry().write().register(filter, handler)
    }

    pub fn unregister_event<T: 'static>(&self, handle: SubscriptionHandle) {
        self.unregister_event_by_type(TypeId::of::<T>(), handle);
    }

    /// Type-erased counterpart to [`EventBus::unregister_event`], for
    /// callers (e.g. a generic actor base) that recorded a subscription's
    /// `TypeId` at registration time and no longer have the concrete type
    /// in scope.
    pub fn unregister_event_by_type(&self, type_id: TypeId, handle: SubscriptionHandle) {
        self.events.registry().write().unregister(type_id, handle);
    }

    /// Register a handler for commands of type `T`.
    pub fn register_command<T, F, Fut>(
        &self,
        filter: Option<Arc<dyn Fn(&T) -> bool + Send + Sync>>,
        handler: F,
    ) -> SubscriptionHandle
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.commands.registry().write().register(filter, handler)
    }

    pub fn unregister_command<T: 'static>(&self, handle: SubscriptionHandle) {
        self.unregister_command_by_type(TypeId::of::<T>(), handle);
    }

    /// Type-erased counterpart to [`EventBus::unregister_command`].
    pub fn unregister_command_by_type(&self, type_id: TypeId, handle: SubscriptionHandle) {
        self.commands.registry().write().unregister(type_id, handle);
    }

    /// Register the sole handler for queries of type `Q`.
    pub fn register_query<Q, F, Fut>(&self, handler: F)
    where
        Q: Query,
        F: Fn(Arc<Q>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Q::Response, HandlerError>> + Send + 'static,
    {
        self.queries.registry().write().register(handler);
    }

    pub fn unregister_query<Q: 'static>(&self) {
        self.queries.registry().write().unregister(TypeId::of::<Q>());
    }

    /// Fire-and-forget dispatch. Returns once the event is enqueued (or
    /// dropped as a duplicate).
    pub async fn dispatch<T: Event>(&self, event: T) {
        let meta = event.meta().clone();
        let type_id = TypeId::of::<T>();
        let payload: Arc<dyn Any + Send + Sync> = Arc::new(event);
        self.events.dispatch_event(meta, type_id, payload).await;
    }

    /// Dispatch a command and await every matching handler's completion.
    pub async fn execute<T: Command>(&self, command: T) -> Result<(), BusError> {
        let meta = command.meta().clone();
        let type_id = TypeId::of::<T>();
        let payload: Arc<dyn Any + Send + Sync> = Arc::new(command);
        let (tx, rx) = oneshot::channel();
        self.commands
            .dispatch_command(meta, type_id, payload, tx)
            .await;
        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(handler_err)) => Err(BusError::Handler(handler_err)),
            Err(_) => Err(BusError::ShuttingDown),
        }
    }

    /// Dispatch a query and await its typed response.
    pub async fn query<Q: Query>(&self, query: Q) -> Result<Q::Response, BusError> {
        let meta = query.meta().clone();
        let type_id = TypeId::of::<Q>();
        let payload: Arc<dyn Any + Send + Sync> = Arc::new(query);
        let (tx, rx) = oneshot::channel();
        self.queries.dispatch_query(meta, type_id, payload, tx).await;
        match rx.await {
            Ok(Ok(response)) => {
                let boxed = response
                    .downcast::<Q::Response>()
                    .map_err(|_| BusError::ResponseTypeMismatch)?;
                Arc::try_unwrap(boxed).map_err(|_| BusError::ResponseTypeMismatch)
            }
            Ok(Err(handler_err)) => Err(BusError::Handler(handler_err)),
            Err(_) => Err(BusError::ShuttingDown),
        }
    }

    /// Block until every pool has drained its queues. Commands and queries
    /// already synchronise via their own completion channel; this is
    /// primarily useful for waiting out in-flight fire-and-forget events
    /// (e.g. in tests, or before a clean shutdown).
    pub async fn wait(&self) {
        self.events.wait().await;
        self.queries.wait().await;
        self.commands.wait().await;
    }

    /// Enqueue a poison message into every worker of every pool. Workers
    /// drain whatever is already queued ahead of the poison, then exit.
    pub fn stop(&self) {
        self.events.stop();
        self.queries.stop();
        self.commands.stop();
    }

    /// Await every worker task across every pool exiting. Call after
    /// [`EventBus::stop`].
    pub async fn join(&self) {
        self.events.join().await;
        self.commands.join().await;
        self.queries.join().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct PingEvent {
        meta: Meta,
    }
    impl BusMessage for PingEvent {
        fn meta(&self) -> &Meta {
            &self.meta
        }
    }

    fn meta(priority: i32, key: MsgKey) -> Meta {
        Meta::new(priority, GroupKey::new("test-group"), key)
    }

    #[tokio::test]
    async fn duplicate_keys_are_delivered_at_most_once() {
        let bus = EventBus::handle(BusConfig::default());
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        bus.register_event::<PingEvent, _, _>(None, move |_event| {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let shared_key = MsgKey::shared("dedup-test-key");
        bus.dispatch(PingEvent {
            meta: meta(5, shared_key.clone()),
        })
        .await;
        // Second dispatch while the first is (almost certainly) still
        // in flight should be suppressed by the dedup set.
        bus.dispatch(PingEvent {
            meta: meta(5, shared_key),
        })
        .await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(count.load(Ordering::SeqCst) <= 2);
    }

    #[derive(Debug)]
    struct PingCommand {
        meta: Meta,
    }
    impl BusMessage for PingCommand {
        fn meta(&self) -> &Meta {
            &self.meta
        }
    }

    #[tokio::test]
    async fn execute_awaits_handler_completion() {
        let bus = EventBus::handle(BusConfig::default());
        bus.register_command::<PingCommand, _, _>(None, |_cmd| async { Ok(()) });

        let result = bus
            .execute(PingCommand {
                meta: meta(1, MsgKey::unique()),
            })
            .await;
        assert!(result.is_ok());
    }

    #[derive(Debug)]
    struct PingQuery {
        meta: Meta,
    }
    impl BusMessage for PingQuery {
        fn meta(&self) -> &Meta {
            &self.meta
        }
    }
    impl Query for PingQuery {
        type Response = u32;
    }

    #[tokio::test]
    async fn query_returns_typed_response() {
        let bus = EventBus::handle(BusConfig::default());
        bus.register_query::<PingQuery, _, _>(|_q| async { Ok(42u32) });

        let response = bus
            .query(PingQuery {
                meta: meta(1, MsgKey::unique()),
            })
            .await
            .unwrap();
        assert_eq!(response, 42);
    }

    #[derive(Debug)]
    struct FailingCommand {
        meta: Meta,
    }
    impl BusMessage for FailingCommand {
        fn meta(&self) -> &Meta {
            &self.meta
        }
    }

    #[tokio::test]
    async fn command_handler_error_surfaces_to_execute() {
        let bus = EventBus::handle(BusConfig::default());
        bus.register_command::<FailingCommand, _, _>(None, |_cmd| async {
            Err(HandlerError::new("nope"))
        });

        let result = bus
            .execute(FailingCommand {
                meta: meta(1, MsgKey::unique()),
            })
            .await;
        assert!(matches!(result, Err(BusError::Handler(_))));
    }
}
