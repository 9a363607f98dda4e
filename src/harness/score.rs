use super::HarnessError;
use crate::word::{get_bit, Word};

use serde::{Deserialize, Serialize};

/// Largest accepted bit error rate, in percent. The accelerator's arithmetic
/// is thresholded, so a few flipped bits are expected.
pub const ERROR_TOLERANCE: f64 = 1.0;

/// Bitwise difference between an output buffer and its reference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BitErrors {
    pub mismatches: usize,
    pub total: usize,
}

impl BitErrors {
    /// Compare the first `bits` bits of the two buffers.
    /// Panics if either buffer holds fewer bits.
    pub fn count<W: Word>(output: &[W], reference: &[W], bits: usize) -> Self {
        assert!(
            output.len() * W::SIZE >= bits && reference.len() * W::SIZE >= bits,
            "Can't compare {} bits, output holds {} and reference {}",
            bits,
            output.len() * W::SIZE,
            reference.len() * W::SIZE
        );

        let full = bits / W::SIZE;
        let mut mismatches = output[..full]
            .iter()
            .zip(&reference[..full])
            .map(|(o, r)| o.mismatches(r))
            .sum::<usize>();
        mismatches += (full * W::SIZE..bits)
            .filter(|&i| get_bit(output, i) != get_bit(reference, i))
            .count();

        Self {
            mismatches,
            total: bits,
        }
    }

    /// Percentage of mismatched bits, 0 for an empty comparison.
    pub fn error_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.;
        }
        (100 * self.mismatches) as f64 / self.total as f64
    }
}

/// Outcome of a layer test.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub mismatches: usize,
    pub total_bits: usize,
    /// Percentage of mismatched output bits
    pub error_rate: f64,
    pub passed: bool,
}

impl Verdict {
    pub fn new(errors: BitErrors) -> Self {
        let error_rate = errors.error_rate();
        Self {
            mismatches: errors.mismatches,
            total_bits: errors.total,
            error_rate,
            passed: error_rate < ERROR_TOLERANCE,
        }
    }

    /// Turn a failed verdict into an error.
    pub fn into_result(self) -> Result<Self, HarnessError> {
        if self.passed {
            Ok(self)
        } else {
            Err(HarnessError::Accuracy {
                error_rate: self.error_rate,
                mismatches: self.mismatches,
                total_bits: self.total_bits,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::set_bit;

    fn flipped(bits: &[usize]) -> (Vec<u8>, Vec<u8>) {
        let reference = vec![0b1010_0110u8; 50];
        let mut output = reference.clone();
        for &i in bits {
            set_bit(&mut output, i, !get_bit(&reference, i));
        }
        (output, reference)
    }

    #[test]
    fn three_of_four_hundred() {
        let (out, reference) = flipped(&[0, 77, 399]);
        let verdict = Verdict::new(BitErrors::count(&out, &reference, 400));
        assert_eq!(verdict.mismatches, 3);
        assert_eq!(verdict.error_rate, 0.75);
        assert!(verdict.passed);
        assert!(verdict.into_result().is_ok());
    }

    #[test]
    fn five_of_four_hundred() {
        let (out, reference) = flipped(&[1, 2, 3, 200, 398]);
        let verdict = Verdict::new(BitErrors::count(&out, &reference, 400));
        assert_eq!(verdict.error_rate, 1.25);
        assert!(!verdict.passed);
        match verdict.into_result() {
            Err(HarnessError::Accuracy { error_rate, .. }) => assert_eq!(error_rate, 1.25),
            other => panic!("expected an accuracy failure, got {:?}", other),
        }
    }

    #[test]
    fn exactly_one_percent_fails() {
        let errors = BitErrors {
            mismatches: 4,
            total: 400,
        };
        assert_eq!(errors.error_rate(), 1.);
        assert!(!Verdict::new(errors).passed);
    }

    #[test]
    fn ignores_bits_past_the_end() {
        let (out, reference) = flipped(&[12, 13]);
        assert_eq!(BitErrors::count(&out, &reference, 12).mismatches, 0);
        assert_eq!(BitErrors::count(&out, &reference, 13).mismatches, 1);
    }

    #[test]
    #[should_panic(expected = "Can't compare")]
    fn short_reference() {
        BitErrors::count(&[0u8; 4], &[0u8; 2], 32);
    }

    #[test]
    fn empty() {
        assert_eq!(BitErrors::count::<u8>(&[], &[], 0).error_rate(), 0.);
    }
}
