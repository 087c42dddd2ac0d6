//! Extra interfaces a wrapped handle can expose.
use crate::close::CloseHandler;
use crate::error::BoxDynError;
use crate::resource::Close;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Descriptor of an auxiliary interface.
///
/// Implemented by `dyn Trait + Send + Sync` for every trait declared with
/// [`capability!`](crate::capability!).
pub trait Capability: 'static {
    const NAME: &'static str;
}

/// Where `close` on a `Wrapped<R, Self, C>` goes.
///
/// `()` (no capability) and capabilities that do not declare `close` send it
/// to the close handler. A capability that declares `fn close(&self)` takes it
/// over, so the close handler is not called. [`capability!`](crate::capability!)
/// generates the impl.
pub trait CloseRoute<R: ?Sized, C: ?Sized> {
    type Output;

    fn route_close(&self, resource: &Arc<R>, close_handler: &C) -> Self::Output;
}

impl<R, C> CloseRoute<R, C> for ()
where
    R: ?Sized,
    C: CloseHandler<R> + ?Sized,
{
    type Output = Result<(), C::Error>;

    fn route_close(&self, resource: &Arc<R>, close_handler: &C) -> Self::Output {
        CloseHandler::close(close_handler, resource)
    }
}

/// Declares a capability trait and makes wrapped handles expose it.
///
/// Besides the trait itself this generates:
///
/// - a [`Capability`] impl for `dyn Trait + Send + Sync`, the descriptor passed
///   to [`wrap_with`](crate::wrap_with);
/// - an impl of the trait for `Wrapped<R, dyn Trait + Send + Sync, C>` that
///   hands every call, arguments unchanged, to the handler given at wrap time;
/// - a [`CloseRoute`] impl. If the trait declares `fn close(&self)`, calling
///   `close` on the handle runs the handler's `close` and the close handler is
///   never called. Otherwise `close` goes to the close handler as usual.
///
/// Methods must take `&self` and have no generic parameters.
///
/// ```
/// use connwrap::{capability, wrap_with, NoOpCloseHandler};
/// use std::sync::Arc;
///
/// capability! {
///     pub trait Ping {
///         fn ping(&self) -> String;
///     }
/// }
///
/// struct Pong;
///
/// impl Ping for Pong {
///     fn ping(&self) -> String {
///         "pong".to_owned()
///     }
/// }
///
/// let handler: Arc<dyn Ping + Send + Sync> = Arc::new(Pong);
/// let conn = wrap_with(Arc::new(7), handler, Arc::new(NoOpCloseHandler)).unwrap();
/// assert_eq!(conn.ping(), "pong");
/// assert_eq!(*conn + 1, 8);
/// ```
#[macro_export]
macro_rules! capability {
    (@close_route $name:ident;) => {
        impl<R, C> $crate::capability::CloseRoute<R, C> for dyn $name + Send + Sync
        where
            R: ?Sized,
            C: $crate::CloseHandler<R> + ?Sized,
        {
            type Output = ::std::result::Result<(), C::Error>;

            fn route_close(&self, resource: &::std::sync::Arc<R>, close_handler: &C) -> Self::Output {
                $crate::CloseHandler::close(close_handler, resource)
            }
        }
    };
    (@close_route $name:ident; close () -> $ret:ty; $($rest:tt)*) => {
        impl<R, C> $crate::capability::CloseRoute<R, C> for dyn $name + Send + Sync
        where
            R: ?Sized,
            C: ?Sized,
        {
            type Output = $ret;

            fn route_close(&self, _: &::std::sync::Arc<R>, _: &C) -> $ret {
                $name::close(self)
            }
        }
    };
    (@close_route $name:ident; close (); $($rest:tt)*) => {
        impl<R, C> $crate::capability::CloseRoute<R, C> for dyn $name + Send + Sync
        where
            R: ?Sized,
            C: ?Sized,
        {
            type Output = ();

            fn route_close(&self, _: &::std::sync::Arc<R>, _: &C) {
                $name::close(self)
            }
        }
    };
    (@close_route $name:ident; $method:ident ($($arg_ty:ty),*) $(-> $ret:ty)?; $($rest:tt)*) => {
        $crate::capability!(@close_route $name; $($rest)*);
    };
    (
        $(#[$attr:meta])*
        $vis:vis trait $name:ident {
            $(
                $(#[$method_attr:meta])*
                fn $method:ident(&self $(, $arg:ident: $arg_ty:ty)*) $(-> $ret:ty)?;
            )*
        }
    ) => {
        $(#[$attr])*
        $vis trait $name {
            $(
                $(#[$method_attr])*
                fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)?;
            )*
        }

        impl $crate::Capability for dyn $name + Send + Sync {
            const NAME: &'static str = stringify!($name);
        }

        impl<R, C> $name for $crate::Wrapped<R, dyn $name + Send + Sync, C>
        where
            R: ?Sized,
            C: ?Sized,
        {
            $(
                fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)? {
                    $name::$method($crate::Wrapped::handler(self) $(, $arg)*)
                }
            )*
        }

        $crate::capability!(@close_route $name; $($method ($($arg_ty),*) $(-> $ret)?;)*);
    };
}

capability! {
    /// Closes the underlying resource for real, whatever the close handler
    /// does with `close`.
    pub trait ForceClose {
        fn force_close(&self) -> Result<(), BoxDynError>;
    }
}

/// Serves [`ForceClose`] by calling the resource's own [`Close`].
pub struct ForceCloseHandler<R: ?Sized> {
    resource: Arc<R>,
}

impl<R: ?Sized> ForceCloseHandler<R> {
    pub fn new(resource: Arc<R>) -> Self {
        Self { resource }
    }
}

impl<R> ForceCloseHandler<R>
where
    R: Close + Send + Sync + ?Sized + 'static,
    R::Error: Into<BoxDynError>,
{
    pub fn shared(resource: Arc<R>) -> Arc<dyn ForceClose + Send + Sync> {
        Arc::new(Self::new(resource))
    }
}

impl<R> ForceClose for ForceCloseHandler<R>
where
    R: Close + ?Sized,
    R::Error: Into<BoxDynError>,
{
    fn force_close(&self) -> Result<(), BoxDynError> {
        tracing::debug!(
            resource = std::any::type_name::<R>(),
            "forcing close of resource"
        );
        Close::close(&*self.resource).map_err(Into::into)
    }
}

impl<R: Debug + ?Sized> Debug for ForceCloseHandler<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForceCloseHandler")
            .field("resource", &self.resource)
            .finish()
    }
}
