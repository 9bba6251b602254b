//! Random passwords with minimum character-class counts.

use crate::constants::{DIGIT_CHARS, LOWER_CHARS, SPECIAL_CHARS, UPPER_CHARS};
use crate::error::{Error, Result};
use crate::models::settings::PasswordPolicy;
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;
use zeroize::Zeroizing;

impl PasswordPolicy {
    /// Fails when the class minimums cannot fit in `length`.
    pub fn validate(&self) -> Result<()> {
        let required = self
            .min_special
            .checked_add(self.min_digits)
            .and_then(|n| n.checked_add(self.min_upper))
            .ok_or_else(|| Error::invalid("password class minimums overflow"))?;
        if required > self.length {
            return Err(Error::invalid(format!(
                "password length {} is shorter than the required {} special + {} digit + {} uppercase characters",
                self.length, self.min_special, self.min_digits, self.min_upper
            )));
        }
        Ok(())
    }
}

/// Password generator over an injectable random source.
///
/// `PasswordGenerator::new()` draws from the OS CSPRNG; tests pass a seeded
/// generator through [`PasswordGenerator::with_rng`].
pub struct PasswordGenerator<R = OsRng> {
    rng: R,
}

impl PasswordGenerator<OsRng> {
    pub fn new() -> Self {
        Self { rng: OsRng }
    }
}

impl Default for PasswordGenerator<OsRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> PasswordGenerator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    pub fn generate(&mut self, policy: &PasswordPolicy) -> Result<Zeroizing<String>> {
        policy.validate()?;

        let all: Vec<u8> = [LOWER_CHARS, UPPER_CHARS, DIGIT_CHARS, SPECIAL_CHARS].concat();
        let remaining = policy.length - policy.min_special - policy.min_digits - policy.min_upper;

        let mut chars: Zeroizing<Vec<u8>> = Zeroizing::new(Vec::with_capacity(policy.length));
        self.draw(&mut chars, SPECIAL_CHARS, policy.min_special);
        self.draw(&mut chars, DIGIT_CHARS, policy.min_digits);
        self.draw(&mut chars, UPPER_CHARS, policy.min_upper);
        self.draw(&mut chars, &all, remaining);
        chars.shuffle(&mut self.rng);

        // Every alphabet is ASCII.
        Ok(Zeroizing::new(chars.iter().map(|&b| char::from(b)).collect()))
    }

    fn draw(&mut self, out: &mut Vec<u8>, alphabet: &[u8], count: usize) {
        for _ in 0..count {
            out.push(alphabet[self.rng.gen_range(0..alphabet.len())]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn policy(length: usize, special: usize, digits: usize, upper: usize) -> PasswordPolicy {
        PasswordPolicy {
            length,
            min_special: special,
            min_digits: digits,
            min_upper: upper,
        }
    }

    fn count(s: &str, alphabet: &[u8]) -> usize {
        s.bytes().filter(|b| alphabet.contains(b)).count()
    }

    #[test]
    fn test_generate_meets_minimums() {
        let mut generator = PasswordGenerator::with_rng(StdRng::seed_from_u64(7));
        for (len, s, d, u) in [(24, 3, 3, 3), (9, 3, 3, 3), (12, 0, 0, 12), (40, 10, 0, 5)] {
            let p = policy(len, s, d, u);
            let pw = generator.generate(&p).unwrap();
            assert_eq!(pw.len(), len);
            assert!(count(&pw, SPECIAL_CHARS) >= s);
            assert!(count(&pw, DIGIT_CHARS) >= d);
            assert!(count(&pw, UPPER_CHARS) >= u);
        }
    }

    #[test]
    fn test_generate_only_known_characters() {
        let mut generator = PasswordGenerator::with_rng(StdRng::seed_from_u64(1));
        let pw = generator.generate(&policy(200, 5, 5, 5)).unwrap();
        let all = [LOWER_CHARS, UPPER_CHARS, DIGIT_CHARS, SPECIAL_CHARS].concat();
        assert!(pw.bytes().all(|b| all.contains(&b)));
    }

    #[test]
    fn test_generate_rejects_impossible_policy() {
        let mut generator = PasswordGenerator::with_rng(StdRng::seed_from_u64(1));
        let err = generator.generate(&policy(8, 3, 3, 3)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_generate_rejects_overflowing_counts() {
        let mut generator = PasswordGenerator::with_rng(StdRng::seed_from_u64(1));
        let err = generator.generate(&policy(8, usize::MAX, 1, 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_generate_zero_length() {
        let mut generator = PasswordGenerator::with_rng(StdRng::seed_from_u64(1));
        assert_eq!(generator.generate(&policy(0, 0, 0, 0)).unwrap().len(), 0);
    }

    #[test]
    fn test_same_seed_same_output() {
        let p = PasswordPolicy::default();
        let a = PasswordGenerator::with_rng(StdRng::seed_from_u64(42))
            .generate(&p)
            .unwrap();
        let b = PasswordGenerator::with_rng(StdRng::seed_from_u64(42))
            .generate(&p)
            .unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn test_independent_sources_differ() {
        let p = policy(16, 2, 2, 2);
        let a = PasswordGenerator::new().generate(&p).unwrap();
        let b = PasswordGenerator::new().generate(&p).unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn test_required_classes_not_always_leading() {
        // With only required characters, order must still vary across seeds.
        let p = policy(9, 3, 3, 3);
        let outputs: std::collections::HashSet<String> = (0..20)
            .map(|seed| {
                let pw = PasswordGenerator::with_rng(StdRng::seed_from_u64(seed))
                    .generate(&p)
                    .unwrap();
                pw.bytes()
                    .map(|b| if SPECIAL_CHARS.contains(&b) { 's' } else if DIGIT_CHARS.contains(&b) { 'd' } else { 'u' })
                    .collect()
            })
            .collect();
        assert!(outputs.len() > 1);
    }
}
