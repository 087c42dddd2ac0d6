//! The wrapped handle and its constructors.
//!
//! A call made on a [`Wrapped`] handle lands in exactly one place, in this
//! order:
//!
//! 1. `==` compares handle identity ([`PartialEq`], [`Wrapped::equals`]).
//! 2. Hashing hashes the original resource ([`Hash`]).
//! 3. Methods of the capability declared with [`capability!`](crate::capability!)
//!    run on the capability handler.
//! 4. `close` runs the close handler with the original resource.
//! 5. Anything else reaches the original resource through [`Deref`].
//!
//! Steps 1 to 4 are methods of `Wrapped` itself, so method resolution picks
//! them before it ever dereferences to the resource, even when the resource
//! has a method with the same name. Accessors are associated functions
//! (`Wrapped::resource(&handle)`) for the same reason: they must not shadow
//! anything the resource exposes.
//!
//! A capability may declare its own `fn close(&self)`. Step 3 wins: the
//! inherent [`Wrapped::close`] and the [`Close`] impl both hand the call to
//! the capability handler through [`CloseRoute`], and the close handler is not
//! called.
use crate::capability::{Capability, CloseRoute};
use crate::close::{CloseHandler, NoOpCloseHandler};
use crate::error::ConfigurationError;
use crate::resource::Close;
use std::any::{Any, TypeId};
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// A resource handle whose `close` is redirected to a [`CloseHandler`].
///
/// # Identity
///
/// Equality and hashing deliberately disagree about what a handle is:
///
/// - two handles are equal only if they are the same handle (clones of one
///   handle share its identity); two wraps of the same resource are *not*
///   equal, and a handle is never equal to the resource it wraps;
/// - the hash of a handle is the hash of the wrapped resource.
///
/// A wrapped handle is therefore not a value-equal stand-in for the resource.
/// It can share a hash bucket with the bare resource but never matches it.
///
/// # Lifecycle
///
/// The handle keeps no open/closed state. Every `close` reaches the close
/// handler, and after a close other calls keep going to the resource, which
/// decides for itself how to respond to being used after that.
pub struct Wrapped<R: ?Sized, H: ?Sized = (), C: ?Sized = NoOpCloseHandler> {
    inner: Arc<Inner<R, H, C>>,
}

struct Inner<R: ?Sized, H: ?Sized, C: ?Sized> {
    resource: Arc<R>,
    handler: Arc<H>,
    close_handler: Arc<C>,
}

/// Wraps `resource` so that closing the handle calls `close_handler` instead.
pub fn wrap<R, C>(resource: Arc<R>, close_handler: Arc<C>) -> Wrapped<R, (), C>
where
    R: ?Sized,
    C: CloseHandler<R> + ?Sized,
{
    tracing::trace!(resource = std::any::type_name::<R>(), "wrapping resource");
    Wrapped::from_parts(resource, Arc::new(()), close_handler)
}

/// Wraps `resource` and additionally exposes capability `H`, served by
/// `handler`.
///
/// `H` is the trait object type of a trait declared with
/// [`capability!`](crate::capability!), e.g. `dyn Ping + Send + Sync`. Wrapping
/// a resource whose type is that same trait object is rejected, since every
/// call would be claimed by both the capability and the resource.
pub fn wrap_with<R, H, C>(
    resource: Arc<R>,
    handler: Arc<H>,
    close_handler: Arc<C>,
) -> Result<Wrapped<R, H, C>, ConfigurationError>
where
    R: ?Sized + 'static,
    H: Capability + ?Sized,
    C: CloseHandler<R> + ?Sized,
{
    if TypeId::of::<H>() == TypeId::of::<R>() {
        return Err(ConfigurationError::AmbiguousCapability {
            capability: H::NAME,
        });
    }
    tracing::trace!(
        resource = std::any::type_name::<R>(),
        capability = H::NAME,
        "wrapping resource"
    );
    Ok(Wrapped::from_parts(resource, handler, close_handler))
}

impl<R: ?Sized, H: ?Sized, C: ?Sized> Wrapped<R, H, C> {
    fn from_parts(resource: Arc<R>, handler: Arc<H>, close_handler: Arc<C>) -> Self {
        Self {
            inner: Arc::new(Inner {
                resource,
                handler,
                close_handler,
            }),
        }
    }

    /// Redirects to the close handler, passing it the original resource, or
    /// to the capability handler when the capability declares `close`.
    ///
    /// The resource's own close is not called unless a handler calls it.
    pub fn close(&self) -> <H as CloseRoute<R, C>>::Output
    where
        H: CloseRoute<R, C>,
    {
        tracing::debug!(resource = std::any::type_name::<R>(), "redirecting close");
        CloseRoute::route_close(
            &*self.inner.handler,
            &self.inner.resource,
            &*self.inner.close_handler,
        )
    }

    pub fn resource(wrapped: &Self) -> &Arc<R> {
        &wrapped.inner.resource
    }

    pub fn handler(wrapped: &Self) -> &H {
        &wrapped.inner.handler
    }

    pub fn close_handler(wrapped: &Self) -> &Arc<C> {
        &wrapped.inner.close_handler
    }

    /// Whether `a` and `b` are the same handle.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl<R, H, C> Wrapped<R, H, C>
where
    R: ?Sized + 'static,
    H: ?Sized + 'static,
    C: ?Sized + 'static,
{
    /// Equality against a value of any type: true only for this very handle.
    pub fn equals(wrapped: &Self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<Self>()
            .is_some_and(|other| Self::ptr_eq(wrapped, other))
    }
}

impl<R: ?Sized, H: ?Sized, C: ?Sized> Clone for Wrapped<R, H, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: ?Sized, H: ?Sized, C: ?Sized> Deref for Wrapped<R, H, C> {
    type Target = R;

    fn deref(&self) -> &Self::Target {
        &self.inner.resource
    }
}

impl<R: ?Sized, H: ?Sized, C: ?Sized> PartialEq for Wrapped<R, H, C> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<R: ?Sized, H: ?Sized, C: ?Sized> Eq for Wrapped<R, H, C> {}

impl<R: Hash + ?Sized, H: ?Sized, C: ?Sized> Hash for Wrapped<R, H, C> {
    fn hash<S: Hasher>(&self, state: &mut S) {
        self.inner.resource.hash(state);
    }
}

impl<R, H, C, E> Close for Wrapped<R, H, C>
where
    R: ?Sized,
    H: CloseRoute<R, C, Output = Result<(), E>> + ?Sized,
    C: ?Sized,
{
    type Error = E;

    fn close(&self) -> Result<(), Self::Error> {
        Wrapped::close(self)
    }
}

impl<R: Debug + ?Sized, H: ?Sized, C: ?Sized> Debug for Wrapped<R, H, C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapped")
            .field("resource", &self.inner.resource)
            .finish_non_exhaustive()
    }
}
