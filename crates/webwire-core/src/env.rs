//! Environment abstraction for deterministic testing.
//!
//! Decouples session timestamps and id generation from system resources
//! (time, randomness), so tests can swap in a fake clock/RNG while
//! production uses real system time and a cryptographic RNG.

use std::time::Duration;

/// Abstract environment providing time, randomness, and async primitives.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion, incorrect simulation setup)
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`; test environments
    /// may use a virtual clock.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    ///
    /// # Invariants
    ///
    /// This method MUST return values that never decrease within a single
    /// execution context.
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG in production
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a random 8-byte array, the shape a `MessageIdentifier` or a
    /// session key draw needs.
    fn random_bytes_8(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        bytes
    }
}

/// Production environment using system time and cryptographic RNG.
///
/// # Panics
///
/// `random_bytes` panics if the OS RNG fails. This is intentional: a server
/// without functioning cryptographic randomness cannot generate session
/// keys or request ids safely, and continuing would be worse than aborting.
#[derive(Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - server cannot operate securely");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::disallowed_methods)]
    fn system_env_time_advances() {
        let env = SystemEnv::new();
        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(5));
        let t2 = env.now();
        assert!(t2 > t1);
    }

    #[test]
    fn system_env_random_bytes_differ() {
        let env = SystemEnv::new();
        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        env.random_bytes(&mut a);
        env.random_bytes(&mut b);
        assert_ne!(a, b);
    }
}
