//! Actor base (C2): per-entity message inbox, lifecycle and filter-before-receive,
//! layered on top of [`ember_bus`]'s type-erased registries.
//!
//! A bus handler is keyed by concrete Rust type; an [`Actor`] in this crate
//! is keyed by a single `Msg` enum instead, matching the Python source's
//! `on_receive(event)` taking a small union of event types. [`ActorCell`]
//! bridges the two: each call to [`ActorCell::subscribe_event`] /
//! [`ActorCell::subscribe_command`] registers one bus handler per wire
//! type, converts the payload into `Actor::Msg`, and serializes delivery
//! to the wrapped actor through an async mutex so "exactly one
//! `on_receive` runs at a time per actor" (§4.2) holds even when the
//! actor's message types are spread across multiple bus workers.

use async_trait::async_trait;
use ember_bus::{BusMessage, Event, EventBus, HandlerError, SubscriptionHandle};
use std::any::TypeId;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Lifecycle and message-handling contract every squad member implements
/// (signal, position, risk, executor actors).
#[async_trait]
pub trait Actor: Send + Sync + 'static {
    /// The union of message variants this actor reacts to, after
    /// conversion from whatever concrete bus type arrived.
    type Msg: Send + Sync + 'static;

    /// Called once, after every `subscribe_*` call on its [`ActorCell`]
    /// has registered. Actors that need to do setup work (e.g. seed
    /// initial state) override this; the default does nothing.
    async fn start(&mut self) {}

    /// Called once, before the cell unsubscribes every handler. The
    /// default does nothing.
    async fn stop(&mut self) {}

    /// Filters irrelevant traffic (wrong symbol/timeframe, unrelated
    /// signal) before `on_receive` runs.
    fn pre_receive(&self, msg: &Self::Msg) -> bool;

    /// Handles one message. The bus guarantees this never runs
    /// concurrently with itself for the same actor.
    async fn on_receive(&mut self, msg: Self::Msg);
}

/// Wraps an [`Actor`] with the bookkeeping needed to subscribe it to the
/// bus and tear it down again: the actor itself behind an async mutex (so
/// `on_receive` calls never overlap), plus every subscription handle
/// registered so far so `stop()` can unwind them.
pub struct ActorCell<A: Actor> {
    actor: Arc<AsyncMutex<A>>,
    subscriptions: parking_lot::Mutex<Vec<(SubscriptionKind, TypeId, SubscriptionHandle)>>,
}

#[derive(Clone, Copy)]
enum SubscriptionKind {
    Event,
    Command,
}

impl<A: Actor> ActorCell<A> {
    pub fn new(actor: A) -> Self {
        Self {
            actor: Arc::new(AsyncMutex::new(actor)),
            subscriptions: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Runs `start()` on the wrapped actor. Call after every
    /// `subscribe_*` registration.
    pub async fn start(&self) {
        self.actor.lock().await.start().await;
    }

    /// Runs `stop()` on the wrapped actor, then unregisters every
    /// subscription made through this cell.
    pub async fn stop(&self, bus: &EventBus) {
        self.actor.lock().await.stop().await;
        for (kind, type_id, handle) in self.subscriptions.lock().drain(..) {
            match kind {
                SubscriptionKind::Event => bus.unregister_event_by_type(type_id, handle),
                SubscriptionKind::Command => bus.unregister_command_by_type(type_id, handle),
            }
        }
    }

    /// Directly deliver a message to the actor, bypassing the bus. Useful
    /// for tests and for the squad factory to prime initial state.
    pub async fn tell(&self, msg: A::Msg) {
        let mut guard = self.actor.lock().await;
        if guard.pre_receive(&msg) {
            guard.on_receive(msg).await;
        }
    }

    /// Subscribe this actor to bus events of wire type `T`, converting each
    /// delivered payload into `A::Msg` via `into` before running
    /// `pre_receive`/`on_receive`.
    pub fn subscribe_event<T, F>(&self, bus: &EventBus, into: F)
    where
        T: Event + BusMessage,
        F: Fn(Arc<T>) -> A::Msg + Send + Sync + 'static,
    {
        let actor = self.actor.clone();
        let handle = bus.register_event::<T, _, _>(None, move |payload: Arc<T>| {
            let actor = actor.clone();
            let msg = into(payload);
            async move { deliver(&actor, msg).await }
        });
        self.subscriptions
            .lock()
            .push((SubscriptionKind::Event, TypeId::of::<T>(), handle));
    }

    /// Subscribe this actor to bus commands of wire type `T`. The
    /// command's completion signal fires once `on_receive` returns.
    pub fn subscribe_command<T, F>(&self, bus: &EventBus, into: F)
    where
        T: ember_bus::Command + BusMessage,
        F: Fn(Arc<T>) -> A::Msg + Send + Sync + 'static,
    {
        let actor = self.actor.clone();
        let handle = bus.register_command::<T, _, _>(None, move |payload: Arc<T>| {
            let actor = actor.clone();
            let msg = into(payload);
            async move { deliver(&actor, msg).await }
        });
        self.subscriptions
            .lock()
            .push((SubscriptionKind::Command, TypeId::of::<T>(), handle));
    }
}

async fn deliver<A: Actor>(actor: &Arc<AsyncMutex<A>>, msg: A::Msg) -> Result<(), HandlerError> {
    let mut guard = actor.lock().await;
    if guard.pre_receive(&msg) {
        guard.on_receive(msg).await;
    }
    Ok(())
}

/// Runs a future to completion, discarding the result. Small helper for
/// actors that dispatch two side-specific handlers concurrently (§4.3's
/// shared-event gather) without pulling `futures::join!` into every
/// caller.
pub async fn join2<F1, F2>(a: F1, b: F2)
where
    F1: Future<Output = ()> + Send,
    F2: Future<Output = ()> + Send,
{
    tokio::join!(a, b);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_bus::{BusConfig, GroupKey, Meta, MsgKey};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Ping {
        meta: Meta,
    }
    impl BusMessage for Ping {
        fn meta(&self) -> &Meta {
            &self.meta
        }
    }

    enum CounterMsg {
        Bump,
    }

    struct CounterActor {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Actor for CounterActor {
        type Msg = CounterMsg;

        fn pre_receive(&self, _msg: &Self::Msg) -> bool {
            true
        }

        async fn on_receive(&mut self, msg: Self::Msg) {
            match msg {
                CounterMsg::Bump => {
                    self.count.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    #[tokio::test]
    async fn subscribed_actor_receives_converted_messages() {
        let bus = EventBus::handle(BusConfig::default());
        let count = Arc::new(AtomicUsize::new(0));
        let cell = ActorCell::new(CounterActor {
            count: count.clone(),
        });
        cell.subscribe_event::<Ping, _>(&bus, |_payload| CounterMsg::Bump);
        cell.start().await;

        bus.dispatch(Ping {
            meta: Meta::new(1, GroupKey::new("g"), MsgKey::unique()),
        })
        .await;
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);

        cell.stop(&bus).await;
        // After stop, further dispatches are not delivered.
        bus.dispatch(Ping {
            meta: Meta::new(1, GroupKey::new("g"), MsgKey::unique()),
        })
        .await;
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pre_receive_filters_out_irrelevant_messages() {
        struct StrictActor {
            allowed: Arc<AtomicUsize>,
            seen: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl Actor for StrictActor {
            type Msg = CounterMsg;

            fn pre_receive(&self, _msg: &Self::Msg) -> bool {
                self.allowed.load(Ordering::SeqCst) > 0
            }

            async fn on_receive(&mut self, _msg: Self::Msg) {
                self.seen.fetch_add(1, Ordering::SeqCst);
            }
        }

        let allowed = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(AtomicUsize::new(0));
        let cell = ActorCell::new(StrictActor {
            allowed: allowed.clone(),
            seen: seen.clone(),
        });

        cell.tell(CounterMsg::Bump).await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        allowed.store(1, Ordering::SeqCst);
        cell.tell(CounterMsg::Bump).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
