use crate::clock::{Clock, SystemClock};
use crate::error::{GeneratorError, Result};
use crate::Generator;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use linkwatch_core::ShortCode;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use url::Url;

/// Number of digest bytes kept in a code.
const CODE_BYTES: usize = 8;

/// Length of every generated code: 8 bytes in unpadded base64.
pub const CODE_LENGTH: usize = 11;

/// Derives short codes by hashing the long URL together with a
/// nanosecond timestamp.
///
/// The timestamp makes repeated submissions of the same URL yield different
/// codes. Stamps handed out by one generator are strictly increasing, so two
/// calls inside a single clock tick (or across a backward clock step) still
/// hash different inputs.
pub struct HashGenerator<C: Clock = SystemClock> {
    clock: C,
    last_stamp: Mutex<Option<i128>>,
}

impl HashGenerator<SystemClock> {
    /// Creates a generator backed by the real system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for HashGenerator<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> HashGenerator<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            last_stamp: Mutex::new(None),
        }
    }

    fn next_stamp(&self) -> i128 {
        let mut last = self.last_stamp.lock();
        let now = self.clock.now().as_nanosecond();

        let stamp = match *last {
            Some(previous) if now <= previous => previous + 1,
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }
}

impl<C: Clock + 'static> Generator for HashGenerator<C> {
    fn generate(&self, long_url: &str) -> Result<ShortCode> {
        Url::parse(long_url).map_err(|e| GeneratorError::InvalidUrl {
            url: long_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(derive_code(long_url, self.next_stamp()))
    }
}

/// Hashes `long_url` followed by the decimal `stamp` and encodes the first
/// [`CODE_BYTES`] of the SHA-256 digest as URL-safe base64 without padding.
pub fn derive_code(long_url: &str, stamp: i128) -> ShortCode {
    let mut hasher = Sha256::new();
    hasher.update(long_url.as_bytes());
    hasher.update(stamp.to_string().as_bytes());
    let digest = hasher.finalize();

    ShortCode::new_unchecked(URL_SAFE_NO_PAD.encode(&digest[..CODE_BYTES]))
}
