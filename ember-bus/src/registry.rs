use crate::error::HandlerError;
use futures::future::BoxFuture;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

type AnyPayload = Arc<dyn Any + Send + Sync>;

/// Type-erased event/command handler, stored in [`HandlerRegistry`].
///
/// Generic handler closures are wrapped into this trait object by
/// [`HandlerRegistry::register`] so the bus can hold handlers for many
/// different concrete message types in one table.
pub(crate) trait ErasedHandler: Send + Sync {
    fn matches(&self, payload: &AnyPayload) -> bool;
    fn call<'a>(&'a self, payload: AnyPayload) -> BoxFuture<'a, Result<(), HandlerError>>;
}

struct TypedHandler<T> {
    handler: Arc<dyn Fn(Arc<T>) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync>,
    filter: Option<Arc<dyn Fn(&T) -> bool + Send + Sync>>,
}

impl<T> ErasedHandler for TypedHandler<T>
where
    T: Send + Sync + 'static,
{
    fn matches(&self, payload: &AnyPayload) -> bool {
        match payload.clone().downcast::<T>() {
            Ok(typed) => match &self.filter {
                Some(f) => f(&typed),
                None => true,
            },
            Err(_) => false,
        }
    }

    fn call<'a>(&'a self, payload: AnyPayload) -> BoxFuture<'a, Result<(), HandlerError>> {
        let handler = self.handler.clone();
        Box::pin(async move {
            let typed = payload
                .downcast::<T>()
                .map_err(|_| HandlerError::new("payload type mismatch"))?;
            handler(typed).await
        })
    }
}

/// Opaque token returned by [`HandlerRegistry::register`], passed back to
/// [`HandlerRegistry::unregister`]. Rust closures have no stable identity to
/// compare by reference the way the Python source compares bound methods, so
/// a handle stands in for "this particular subscription".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

/// Per-pool table of registered handlers, keyed by the concrete message
/// type. Lives on the bus (not the message type), per §9 "handler tables
/// live on the component, not on the message type."
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    handlers: HashMap<TypeId, Vec<(SubscriptionHandle, Arc<dyn ErasedHandler>)>>,
    next_handle: u64,
}

impl HandlerRegistry {
    pub(crate) fn register<T, F, Fut>(
        &mut self,
        filter: Option<Arc<dyn Fn(&T) -> bool + Send + Sync>>,
        handler: F,
    ) -> SubscriptionHandle
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let handle = SubscriptionHandle(self.next_handle);
        self.next_handle += 1;

        let erased = Arc::new(TypedHandler {
            handler: Arc::new(move |payload: Arc<T>| {
                Box::pin(handler(payload)) as BoxFuture<'static, Result<(), HandlerError>>
            }),
            filter,
        });

        self.handlers
            .entry(TypeId::of::<T>())
            .or_default()
            .push((handle, erased));

        handle
    }

    pub(crate) fn unregister(&mut self, type_id: TypeId, handle: SubscriptionHandle) {
        if let Some(entries) = self.handlers.get_mut(&type_id) {
            entries.retain(|(h, _)| *h != handle);
        }
    }

    pub(crate) fn matching(
        &self,
        type_id: TypeId,
        payload: &AnyPayload,
    ) -> Vec<Arc<dyn ErasedHandler>> {
        self.handlers
            .get(&type_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, h)| h.matches(payload))
                    .map(|(_, h)| h.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Type-erased query handler, stored in [`QueryRegistry`]. Unlike events and
/// commands, exactly one handler answers a given query type (there is one
/// authoritative source of truth per query — e.g. the smart router for
/// `GetSymbols`), so registration replaces any previous handler for that
/// type rather than accumulating a list.
pub(crate) trait ErasedQueryHandler: Send + Sync {
    fn call<'a>(&'a self, payload: AnyPayload) -> BoxFuture<'a, Result<AnyPayload, HandlerError>>;
}

struct TypedQueryHandler<T, R> {
    handler: Arc<
        dyn Fn(Arc<T>) -> BoxFuture<'static, Result<R, HandlerError>> + Send + Sync,
    >,
}

impl<T, R> ErasedQueryHandler for TypedQueryHandler<T, R>
where
    T: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    fn call<'a>(&'a self, payload: AnyPayload) -> BoxFuture<'a, Result<AnyPayload, HandlerError>> {
        let handler = self.handler.clone();
        Box::pin(async move {
            let typed = payload
                .downcast::<T>()
                .map_err(|_| HandlerError::new("payload type mismatch"))?;
            let response = handler(typed).await?;
            Ok(Arc::new(response) as AnyPayload)
        })
    }
}

#[derive(Default)]
pub(crate) struct QueryRegistry {
    handlers: HashMap<TypeId, Arc<dyn ErasedQueryHandler>>,
}

impl QueryRegistry {
    pub(crate) fn register<T, R, F, Fut>(&mut self, handler: F)
    where
        T: Send + Sync + 'static,
        R: Send + Sync + 'static,
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        let erased = Arc::new(TypedQueryHandler {
            handler: Arc::new(move |payload: Arc<T>| {
                Box::pin(handler(payload)) as BoxFuture<'static, Result<R, HandlerError>>
            }),
        });
        self.handlers.insert(TypeId::of::<T>(), erased);
    }

    pub(crate) fn unregister(&mut self, type_id: TypeId) {
        self.handlers.remove(&type_id);
    }

    pub(crate) fn get(&self, type_id: TypeId) -> Option<Arc<dyn ErasedQueryHandler>> {
        self.handlers.get(&type_id).cloned()
    }
}
