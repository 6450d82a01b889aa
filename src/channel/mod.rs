//! Synchronous, typed publish/subscribe channel.
//!
//! `emit` runs every live handler in registration order before returning.
//! Subscriptions are scoped: dropping the returned [`Subscription`] removes
//! the handler, so a consumer's handlers go away with the consumer.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel `{0}` emitted from inside one of its own handlers")]
    Reentrant(&'static str),
    #[error("channel `{0}` poisoned")]
    Poisoned(&'static str),
}

type Handler<E> = Box<dyn FnMut(&E) + Send>;

struct ChannelInner<E> {
    next_id: u64,
    handlers: Vec<(u64, Handler<E>)>,
    dispatching: bool,
    /// Ids dropped while their handlers were checked out for a dispatch.
    detached: Vec<u64>,
}

impl<E> ChannelInner<E> {
    fn new() -> Self {
        Self {
            next_id: 0,
            handlers: Vec::new(),
            dispatching: false,
            detached: Vec::new(),
        }
    }
}

trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

impl<E: 'static> Detach for Mutex<ChannelInner<E>> {
    fn detach(&self, id: u64) {
        if let Ok(mut guard) = self.lock() {
            guard.handlers.retain(|(existing, _)| *existing != id);
            if guard.dispatching {
                guard.detached.push(id);
            }
        }
    }
}

/// Handle tying a handler's lifetime to its owner.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    id: u64,
    channel: Weak<dyn Detach>,
}

impl Subscription {
    /// Keep the handler registered for as long as the channel lives.
    pub fn forget(self) {
        std::mem::forget(self);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.detach(self.id);
        }
    }
}

pub struct EventChannel<E> {
    name: &'static str,
    inner: Arc<Mutex<ChannelInner<E>>>,
}

impl<E: 'static> EventChannel<E> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(ChannelInner::new())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscribe<F>(&self, handler: F) -> Result<Subscription, ChannelError>
    where
        F: FnMut(&E) + Send + 'static,
    {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| ChannelError::Poisoned(self.name))?;
        let id = guard.next_id;
        guard.next_id += 1;
        guard.handlers.push((id, Box::new(handler)));
        drop(guard);

        let strong: Arc<dyn Detach> = self.inner.clone();
        Ok(Subscription {
            id,
            channel: Arc::downgrade(&strong),
        })
    }

    /// Deliver `payload` to every live handler, returning how many ran.
    pub fn emit(&self, payload: &E) -> Result<usize, ChannelError> {
        let mut running = {
            let mut guard = self
                .inner
                .lock()
                .map_err(|_| ChannelError::Poisoned(self.name))?;
            if guard.dispatching {
                return Err(ChannelError::Reentrant(self.name));
            }
            guard.dispatching = true;
            std::mem::take(&mut guard.handlers)
        };

        let mut delivered = 0;
        for (id, handler) in running.iter_mut() {
            if self.was_detached(*id) {
                continue;
            }
            handler(payload);
            delivered += 1;
        }

        let mut guard = self
            .inner
            .lock()
            .map_err(|_| ChannelError::Poisoned(self.name))?;
        guard.dispatching = false;
        let detached = std::mem::take(&mut guard.detached);
        running.retain(|(id, _)| !detached.contains(id));
        // Handlers subscribed mid-dispatch queue up behind the existing ones.
        running.append(&mut guard.handlers);
        guard.handlers = running;
        Ok(delivered)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .map(|guard| guard.handlers.len())
            .unwrap_or(0)
    }

    fn was_detached(&self, id: u64) -> bool {
        self.inner
            .lock()
            .map(|guard| guard.detached.contains(&id))
            .unwrap_or(false)
    }
}

impl<E> Clone for EventChannel<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> fmt::Debug for EventChannel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
