/// The termination operation of a resource.
///
/// Wrapped handles implement this too, so code that closes resources does not
/// need to know whether it was given the resource or a proxy for it.
pub trait Close {
    type Error;

    fn close(&self) -> Result<(), Self::Error>;
}
