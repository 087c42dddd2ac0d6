//! Connection Wrapper: close-intercepting proxy handles for shared resources
pub mod capability;
pub mod close;
pub mod dynamic;
mod error;
pub mod resource;
mod wrapper;

pub use capability::{Capability, CloseRoute, ForceClose, ForceCloseHandler};
pub use close::{CloseHandler, CloseResource, DeferredClose, NoOpCloseHandler, ReturnToQueue};
pub use error::{BoxDynError, ConfigurationError};
pub use resource::Close;
pub use wrapper::{wrap, wrap_with, Wrapped};
