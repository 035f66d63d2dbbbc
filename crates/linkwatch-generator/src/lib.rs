mod clock;
pub mod error;
pub mod hash;

use linkwatch_core::ShortCode;

pub use clock::{Clock, SystemClock};
pub use error::{GeneratorError, Result};
pub use hash::{HashGenerator, CODE_LENGTH};

/// Trait for generating short codes.
///
/// Implementations are pure generators that don't interact with storage,
/// so a generated code may already be taken. Callers resolve collisions by
/// retrying with a fresh code.
pub trait Generator: Send + Sync + 'static {
    /// Derives a short code for `long_url`.
    ///
    /// Fails with [`GeneratorError::InvalidUrl`] when `long_url` is not an
    /// absolute URL.
    fn generate(&self, long_url: &str) -> Result<ShortCode>;
}
