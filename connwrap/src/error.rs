use std::error::Error as StdError;

pub type BoxDynError = Box<dyn StdError + Send + Sync + 'static>;

/// Rejected combination of collaborators passed to a wrap constructor.
///
/// This is the only error the proxy ever produces itself. Failures raised by
/// the resource, the capability handler or the close handler are handed back
/// to the caller untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    #[error("capability `{capability}` is the wrapped resource type itself")]
    AmbiguousCapability { capability: &'static str },

    #[error("handler does not implement capability `{capability}`")]
    HandlerMismatch { capability: &'static str },
}
