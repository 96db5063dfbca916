//! Mixed-radix addressing shared by compositions and bucket-compositions.
//!
//! Digit `0` is the slowest-moving position and the last digit ticks on
//! every increment, like the rightmost wheel of an odometer.

use crate::error::{PromptfanError, Result};

/// Bijection between an integer ID in `[0, total)` and a digit vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Odometer {
    radices: Vec<usize>,
    total: u64,
}

impl Odometer {
    /// Build an odometer over the given radices.
    ///
    /// An empty radix list has exactly one address (the empty digit vector).
    /// A zero radix or a product that does not fit in `u64` is a
    /// configuration error.
    pub fn new(radices: Vec<usize>) -> Result<Self> {
        let mut total: u64 = 1;
        for (position, &radix) in radices.iter().enumerate() {
            if radix == 0 {
                return Err(PromptfanError::Configuration(format!(
                    "odometer position {} has zero values",
                    position
                )));
            }
            total = total.checked_mul(radix as u64).ok_or_else(|| {
                PromptfanError::Configuration(format!(
                    "combination space overflows u64 at position {} (radices: {:?})",
                    position, radices
                ))
            })?;
        }
        Ok(Self { radices, total })
    }

    pub fn radices(&self) -> &[usize] {
        &self.radices
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Split `id` into one digit per radix, last digit fastest.
    pub fn decode(&self, id: u64) -> Result<Vec<usize>> {
        self.check_id(id)?;
        let mut digits = vec![0usize; self.radices.len()];
        let mut rest = id;
        for (slot, &radix) in digits.iter_mut().zip(self.radices.iter()).rev() {
            let radix = radix as u64;
            *slot = (rest % radix) as usize;
            rest /= radix;
        }
        Ok(digits)
    }

    /// Inverse of [`Odometer::decode`].
    pub fn encode(&self, digits: &[usize]) -> Result<u64> {
        if digits.len() != self.radices.len() {
            return Err(PromptfanError::Range(format!(
                "expected {} digits, got {}",
                self.radices.len(),
                digits.len()
            )));
        }
        let mut id: u64 = 0;
        for (position, (&digit, &radix)) in digits.iter().zip(self.radices.iter()).enumerate() {
            if digit >= radix {
                return Err(PromptfanError::Range(format!(
                    "digit {} at position {} is outside [0, {}]",
                    digit,
                    position,
                    radix - 1
                )));
            }
            // Cannot overflow: the result is bounded by total - 1.
            id = id * radix as u64 + digit as u64;
        }
        Ok(id)
    }

    fn check_id(&self, id: u64) -> Result<()> {
        if id >= self.total {
            return Err(PromptfanError::Range(format!(
                "id {} is outside [0, {}]",
                id,
                self.total - 1
            )));
        }
        Ok(())
    }
}
