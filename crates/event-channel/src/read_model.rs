//! Read model trait for subscriber-maintained views.

/// A read model providing query access to denormalized data.
///
/// Read models are kept up to date by subscribers and optimized for
/// fast reads.
pub trait ReadModel: Send + Sync {
    /// Returns the name of this read model.
    fn name(&self) -> &'static str;

    /// Returns the number of entries in this read model.
    fn count(&self) -> usize;
}
