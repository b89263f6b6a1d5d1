//! Fallible wrapper around caller-supplied random sources.
//!
//! `rsa` draws through the infallible `RngCore::fill_bytes`, so a source
//! whose `try_fill_bytes` fails would panic inside key generation or signing.
//! [`CheckedRng`] routes every draw through `try_fill_bytes` and records the
//! first failure instead. Once a failure is recorded, the remaining draws are
//! served from a fixed-seed filler stream so that the operation runs to
//! completion. Its output must be discarded: callers check
//! [`CheckedRng::failure`] before using anything produced with it.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_core::{impls, CryptoRng, CryptoRngCore, RngCore};

/// A random source that records failures instead of panicking.
pub struct CheckedRng<'a, R: CryptoRngCore + ?Sized> {
    inner: &'a mut R,
    failure: Option<String>,
    filler: Option<StdRng>,
}

impl<'a, R: CryptoRngCore + ?Sized> CheckedRng<'a, R> {
    /// Wrap `inner` for the duration of one operation.
    pub fn new(inner: &'a mut R) -> Self {
        Self {
            inner,
            failure: None,
            filler: None,
        }
    }

    /// The first error reported by the wrapped source, if any.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    fn record(&mut self, error: &rand_core::Error) {
        if self.failure.is_none() {
            self.failure = Some(error.to_string());
            self.filler = Some(StdRng::seed_from_u64(0));
        }
    }
}

impl<R: CryptoRngCore + ?Sized> RngCore for CheckedRng<'_, R> {
    fn next_u32(&mut self) -> u32 {
        impls::next_u32_via_fill(self)
    }

    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_fill(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if self.filler.is_none() {
            match self.inner.try_fill_bytes(dest) {
                Ok(()) => return,
                Err(e) => self.record(&e),
            }
        }
        if let Some(filler) = self.filler.as_mut() {
            filler.fill_bytes(dest);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        match self.inner.try_fill_bytes(dest) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.record(&e);
                Err(e)
            }
        }
    }
}

impl<R: CryptoRngCore + ?Sized> CryptoRng for CheckedRng<'_, R> {}

/// A source whose every draw fails.
#[cfg(test)]
pub(crate) struct ExhaustedRng;

#[cfg(test)]
impl RngCore for ExhaustedRng {
    fn next_u32(&mut self) -> u32 {
        panic!("infallible draw from an exhausted source")
    }

    fn next_u64(&mut self) -> u64 {
        panic!("infallible draw from an exhausted source")
    }

    fn fill_bytes(&mut self, _dest: &mut [u8]) {
        panic!("infallible draw from an exhausted source")
    }

    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand_core::Error> {
        Err(rand_core::Error::from(
            std::num::NonZeroU32::new(rand_core::Error::CUSTOM_START).unwrap(),
        ))
    }
}

#[cfg(test)]
impl CryptoRng for ExhaustedRng {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_through_healthy_source() {
        let mut source = StdRng::seed_from_u64(5);
        let mut expected = [0u8; 16];
        StdRng::seed_from_u64(5).fill_bytes(&mut expected);

        let mut checked = CheckedRng::new(&mut source);
        let mut bytes = [0u8; 16];
        checked.fill_bytes(&mut bytes);

        assert_eq!(bytes, expected);
        assert!(checked.failure().is_none());
    }

    #[test]
    fn test_records_failure_without_panicking() {
        let mut source = ExhaustedRng;
        let mut checked = CheckedRng::new(&mut source);

        let mut bytes = [0u8; 32];
        checked.fill_bytes(&mut bytes);
        checked.next_u64();

        assert!(checked.failure().is_some());
        assert!(checked.try_fill_bytes(&mut bytes).is_err());
    }

    #[test]
    fn test_filler_keeps_varying_after_failure() {
        let mut source = ExhaustedRng;
        let mut checked = CheckedRng::new(&mut source);

        assert_ne!(checked.next_u64(), checked.next_u64());
    }
}
