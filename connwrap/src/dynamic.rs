//! Runtime dispatch for resources whose operations are looked up by name.
//!
//! An [`Object`] exposes its operations through [`Object::invoke`]; an
//! operation is identified by its name together with the number of arguments
//! it is called with. [`Proxy`] routes each invocation by that pair, so an
//! overload such as `close(timeout)` is never mistaken for `close()`.
use crate::close::CloseHandler;
use crate::error::{BoxDynError, ConfigurationError};
use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

pub type Value = Box<dyn Any + Send>;

pub const EQUALS: &str = "equals";
pub const HASH_CODE: &str = "hash_code";
pub const CLOSE: &str = "close";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    pub name: &'static str,
    pub arity: usize,
}

impl Signature {
    pub const fn new(name: &'static str, arity: usize) -> Self {
        Self { name, arity }
    }
}

/// A named set of operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    name: &'static str,
    operations: Vec<Signature>,
}

impl Interface {
    pub fn new(name: &'static str, operations: impl IntoIterator<Item = Signature>) -> Self {
        let mut operations: Vec<_> = operations.into_iter().collect();
        operations.sort_by_key(|s| (s.name, s.arity));
        operations.dedup();
        Self { name, operations }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn operations(&self) -> &[Signature] {
        &self.operations
    }

    pub fn declares(&self, name: &str, arity: usize) -> bool {
        self.operations
            .iter()
            .any(|s| s.name == name && s.arity == arity)
    }
}

pub trait Object: Send + Sync {
    /// The interface this object was created as.
    fn interface(&self) -> &Interface;

    fn implements(&self, interface: &Interface) -> bool {
        self.interface() == interface
    }

    fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Value, BoxDynError>;
}

type DynCloseHandler = dyn Fn(&Arc<dyn Object>) -> Result<(), BoxDynError> + Send + Sync;

/// Dynamic counterpart of [`Wrapped`](crate::Wrapped).
///
/// Identity and lifecycle rules are the same: a proxy equals only itself (and
/// its clones), hashes as its resource, and passes every `close()` to the
/// close handler without tracking whether it was closed before.
pub struct Proxy {
    inner: Arc<ProxyInner>,
}

struct ProxyInner {
    resource: Arc<dyn Object>,
    capability: Option<(Interface, Arc<dyn Object>)>,
    close_handler: Box<DynCloseHandler>,
}

enum Route<'a> {
    Equals,
    HashCode,
    Capability(&'a Arc<dyn Object>),
    Close,
    Forward,
}

impl Proxy {
    pub fn new<C>(resource: Arc<dyn Object>, close_handler: Arc<C>) -> Self
    where
        C: CloseHandler<dyn Object> + Send + Sync + ?Sized + 'static,
        C::Error: Into<BoxDynError>,
    {
        tracing::trace!(
            interface = resource.interface().name(),
            "creating proxy"
        );
        Self::from_parts(resource, None, close_handler)
    }

    /// Creates a proxy that also serves `interface` through `handler`.
    pub fn with_capability<C>(
        resource: Arc<dyn Object>,
        interface: Interface,
        handler: Arc<dyn Object>,
        close_handler: Arc<C>,
    ) -> Result<Self, ConfigurationError>
    where
        C: CloseHandler<dyn Object> + Send + Sync + ?Sized + 'static,
        C::Error: Into<BoxDynError>,
    {
        if !handler.implements(&interface) {
            return Err(ConfigurationError::HandlerMismatch {
                capability: interface.name(),
            });
        }
        if *resource.interface() == interface {
            return Err(ConfigurationError::AmbiguousCapability {
                capability: interface.name(),
            });
        }
        tracing::trace!(
            interface = resource.interface().name(),
            capability = interface.name(),
            "creating proxy"
        );
        Ok(Self::from_parts(
            resource,
            Some((interface, handler)),
            close_handler,
        ))
    }

    fn from_parts<C>(
        resource: Arc<dyn Object>,
        capability: Option<(Interface, Arc<dyn Object>)>,
        close_handler: Arc<C>,
    ) -> Self
    where
        C: CloseHandler<dyn Object> + Send + Sync + ?Sized + 'static,
        C::Error: Into<BoxDynError>,
    {
        let close_handler: Box<DynCloseHandler> =
            Box::new(move |resource: &Arc<dyn Object>| -> Result<(), BoxDynError> {
                CloseHandler::close(&*close_handler, resource).map_err(Into::into)
            });
        Self {
            inner: Arc::new(ProxyInner {
                resource,
                capability,
                close_handler,
            }),
        }
    }

    pub fn resource(proxy: &Self) -> &Arc<dyn Object> {
        &proxy.inner.resource
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Whether an `equals` argument is this proxy, passed by value, as
    /// `Arc<Proxy>` or as the `Arc<dyn Object>` it is usually shared as.
    fn is_same(&self, other: &(dyn Any + Send)) -> bool {
        if let Some(other) = other.downcast_ref::<Proxy>() {
            return Self::ptr_eq(self, other);
        }
        if let Some(other) = other.downcast_ref::<Arc<Proxy>>() {
            return Self::ptr_eq(self, other);
        }
        other.downcast_ref::<Arc<dyn Object>>().is_some_and(|other| {
            Arc::as_ptr(other) as *const () == self as *const Self as *const ()
        })
    }

    fn route(&self, name: &str, arity: usize) -> Route<'_> {
        match (name, arity) {
            (EQUALS, 1) => Route::Equals,
            (HASH_CODE, 0) => Route::HashCode,
            _ => match &self.inner.capability {
                Some((interface, handler)) if interface.declares(name, arity) => {
                    Route::Capability(handler)
                }
                _ if (name, arity) == (CLOSE, 0) => Route::Close,
                _ => Route::Forward,
            },
        }
    }
}

impl Object for Proxy {
    fn interface(&self) -> &Interface {
        self.inner.resource.interface()
    }

    fn implements(&self, interface: &Interface) -> bool {
        self.inner.resource.implements(interface)
            || self
                .inner
                .capability
                .as_ref()
                .is_some_and(|(capability, _)| capability == interface)
    }

    fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Value, BoxDynError> {
        match self.route(name, args.len()) {
            Route::Equals => Ok(Box::new(self.is_same(&*args[0]))),
            Route::HashCode => self.inner.resource.invoke(HASH_CODE, args),
            Route::Capability(handler) => handler.invoke(name, args),
            Route::Close => {
                tracing::debug!(
                    interface = self.inner.resource.interface().name(),
                    "redirecting close to close handler"
                );
                (self.inner.close_handler)(&self.inner.resource)?;
                Ok(Box::new(()))
            }
            Route::Forward => self.inner.resource.invoke(name, args),
        }
    }
}

impl Clone for Proxy {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl Eq for Proxy {}

impl Debug for Proxy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("interface", self.inner.resource.interface())
            .field(
                "capability",
                &self.inner.capability.as_ref().map(|(i, _)| i.name()),
            )
            .finish_non_exhaustive()
    }
}
