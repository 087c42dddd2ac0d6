//! What closing a wrapped handle actually does.
//!
//! A [`CloseHandler`] receives every `close` issued on a wrapped handle along
//! with the original resource. The proxy calls it once per `close` and keeps no
//! record of it, so a handler that must not act twice has to track that itself
//! (see [`DeferredClose`]).
use crate::resource::Close;
use crossbeam_queue::ArrayQueue;
use parking_lot::Mutex;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

pub trait CloseHandler<R: ?Sized> {
    type Error;

    fn close(&self, resource: &Arc<R>) -> Result<(), Self::Error>;
}

impl<R, F, E> CloseHandler<R> for F
where
    R: ?Sized,
    F: Fn(&Arc<R>) -> Result<(), E>,
{
    type Error = E;

    fn close(&self, resource: &Arc<R>) -> Result<(), Self::Error> {
        self(resource)
    }
}

/// Swallows `close`, leaving the resource open.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCloseHandler;

impl<R: ?Sized> CloseHandler<R> for NoOpCloseHandler {
    type Error = Infallible;

    fn close(&self, _resource: &Arc<R>) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Closes the resource for real.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloseResource;

impl<R: Close + ?Sized> CloseHandler<R> for CloseResource {
    type Error = R::Error;

    fn close(&self, resource: &Arc<R>) -> Result<(), Self::Error> {
        Close::close(&**resource)
    }
}

/// Hands the resource back to a shared idle queue.
///
/// When the queue is already full the resource is closed instead.
pub struct ReturnToQueue<R: ?Sized> {
    idle: Arc<ArrayQueue<Arc<R>>>,
}

impl<R: ?Sized> Clone for ReturnToQueue<R> {
    fn clone(&self) -> Self {
        Self {
            idle: self.idle.clone(),
        }
    }
}

impl<R: ?Sized> fmt::Debug for ReturnToQueue<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReturnToQueue")
            .field("idle", &self.idle.len())
            .field("capacity", &self.idle.capacity())
            .finish()
    }
}

impl<R: ?Sized> ReturnToQueue<R> {
    pub fn new(idle: Arc<ArrayQueue<Arc<R>>>) -> Self {
        Self { idle }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(Arc::new(ArrayQueue::new(capacity)))
    }

    pub fn queue(&self) -> &Arc<ArrayQueue<Arc<R>>> {
        &self.idle
    }
}

impl<R: Close + ?Sized> CloseHandler<R> for ReturnToQueue<R> {
    type Error = R::Error;

    fn close(&self, resource: &Arc<R>) -> Result<(), Self::Error> {
        match self.idle.push(resource.clone()) {
            Ok(()) => Ok(()),
            Err(overflow) => {
                tracing::warn!(
                    capacity = self.idle.capacity(),
                    "idle queue is full, closing resource"
                );
                Close::close(&*overflow)
            }
        }
    }
}

/// Postpones the real close until [`release_all`](Self::release_all).
///
/// A resource closed several times before release is closed only once.
pub struct DeferredClose<R: ?Sized> {
    pending: Mutex<Vec<Arc<R>>>,
}

impl<R: ?Sized> Default for DeferredClose<R> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
        }
    }
}

impl<R: ?Sized> fmt::Debug for DeferredClose<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredClose")
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

impl<R: ?Sized> DeferredClose<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

impl<R: Close + ?Sized> DeferredClose<R> {
    /// Closes every postponed resource and returns how many were closed.
    ///
    /// All of them are attempted; the first failure is reported afterwards.
    pub fn release_all(&self) -> Result<usize, R::Error> {
        let pending = std::mem::take(&mut *self.pending.lock());
        let mut closed = 0;
        let mut first_error = None;
        for resource in pending {
            match Close::close(&*resource) {
                Ok(()) => closed += 1,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(closed),
        }
    }
}

impl<R: ?Sized> CloseHandler<R> for DeferredClose<R> {
    type Error = Infallible;

    fn close(&self, resource: &Arc<R>) -> Result<(), Self::Error> {
        let mut pending = self.pending.lock();
        if !pending.iter().any(|p| Arc::ptr_eq(p, resource)) {
            pending.push(resource.clone());
        }
        Ok(())
    }
}
