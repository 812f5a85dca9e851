//! Deterministic Park–Miller linear congruential generator and seed search.
//!
//! Each [`Lcg`] carries its own state; there is no shared global seed.

use crate::errors::GraderError;
use std::collections::BTreeMap;

pub const LCG_MODULUS: u64 = 2_147_483_647;
pub const LCG_MULTIPLIER: u64 = 16_807;
pub const FALLBACK_SEED: u64 = 92_572;

/// Login-name environment variables, checked in order.
const USER_ENV_KEYS: [&str; 4] = ["LOGNAME", "USER", "LNAME", "USERNAME"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lcg {
    seed: u64,
}

impl Lcg {
    /// A zero state would make the sequence constant, so it is replaced by
    /// [`FALLBACK_SEED`].
    pub fn new(seed: u64) -> Self {
        let seed = seed % LCG_MODULUS;
        Self {
            seed: if seed == 0 { FALLBACK_SEED } else { seed },
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn next_raw(&mut self) -> u64 {
        self.seed = (LCG_MULTIPLIER * self.seed) % LCG_MODULUS;
        self.seed
    }

    /// Uniform integer in `min..=max`. The bounds are swapped if reversed.
    pub fn next_in(&mut self, min: i64, max: i64) -> i64 {
        let (low, high) = if min <= max { (min, max) } else { (max, min) };
        // Widened so that the full i64 range does not overflow.
        let span = (i128::from(high) - i128::from(low) + 1) as u128;
        // next_raw() is in 1..MODULUS
        let offset = u128::from(self.next_raw() - 1) * span / u128::from(LCG_MODULUS - 1);
        (i128::from(low) + offset as i128) as i64
    }

    pub fn choice<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.next_in(0, items.len() as i64 - 1) as usize;
        items.get(idx)
    }

    /// `len` characters drawn with replacement from `alphabet`.
    pub fn string_from(&mut self, alphabet: &str, len: usize) -> String {
        let chars: Vec<char> = alphabet.chars().collect();
        (0..len)
            .filter_map(|_| self.choice(&chars).copied())
            .collect()
    }

    /// Fisher–Yates shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_in(0, i as i64) as usize;
            items.swap(i, j);
        }
    }
}

/// Seed derived from the last five characters of the login name, when they are digits.
pub fn default_seed_for_user(user: Option<&str>) -> u64 {
    user.and_then(|name| {
        let chars: Vec<char> = name.chars().collect();
        let tail: String = chars[chars.len().saturating_sub(5)..].iter().collect();
        tail.parse::<u64>().ok()
    })
    .unwrap_or(FALLBACK_SEED)
}

pub fn default_seed_from_env() -> u64 {
    let user = USER_ENV_KEYS
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|value| !value.is_empty()));
    default_seed_for_user(user.as_deref())
}

/// Draw from `rng` until `num_results` distinct values have been seen, and
/// return each value with the generator seed that produced it. Seeding a fresh
/// [`Lcg`] with the returned seed and calling `draw` once reproduces the value.
pub fn seed_value_pairs<T, F>(
    rng: &mut Lcg,
    num_results: usize,
    max_draws: usize,
    mut draw: F,
) -> Result<BTreeMap<T, u64>, GraderError>
where
    T: Ord,
    F: FnMut(&mut Lcg) -> T,
{
    let mut results = BTreeMap::new();
    let mut draws = 0usize;
    while results.len() < num_results {
        if draws >= max_draws {
            return Err(GraderError::SeedSearchExhausted {
                attempts: draws,
                found: results.len(),
                wanted: num_results,
            });
        }
        let seed = rng.seed();
        let value = draw(rng);
        results.entry(value).or_insert(seed);
        draws += 1;
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_deterministic_per_seed() {
        let mut a = Lcg::new(42);
        let mut b = Lcg::new(42);
        let first: Vec<u64> = (0..5).map(|_| a.next_raw()).collect();
        let second: Vec<u64> = (0..5).map(|_| b.next_raw()).collect();
        assert_eq!(first, second);
        assert_eq!(Lcg::new(1).next_raw(), 16_807);
        assert_eq!(Lcg::new(0), Lcg::new(FALLBACK_SEED));
    }

    #[test]
    fn next_in_stays_within_bounds() {
        let mut rng = Lcg::new(7);
        for _ in 0..2_000 {
            let value = rng.next_in(1, 20);
            assert!((1..=20).contains(&value));
        }
        assert_eq!(rng.next_in(5, 5), 5);
        let reversed = rng.next_in(3, -3);
        assert!((-3..=3).contains(&reversed));
    }

    #[test]
    fn next_in_handles_the_full_i64_range() {
        let mut rng = Lcg::new(5);
        let draws: Vec<i64> = (0..100).map(|_| rng.next_in(i64::MIN, i64::MAX)).collect();
        assert!(draws.iter().any(|v| *v < 0));
        assert!(draws.iter().any(|v| *v > 0));
        assert_eq!(Lcg::new(9).next_in(i64::MAX, i64::MAX), i64::MAX);
        let near_top = Lcg::new(9).next_in(i64::MAX - 1, i64::MAX);
        assert!(near_top >= i64::MAX - 1);
    }

    #[test]
    fn shuffle_keeps_elements() {
        let mut rng = Lcg::new(99);
        let mut letters: Vec<char> = "abcdef".chars().collect();
        rng.shuffle(&mut letters);
        let mut sorted = letters.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, "abcdef".chars().collect::<Vec<_>>());
    }

    #[test]
    fn user_seed_uses_trailing_digits_only() {
        assert_eq!(default_seed_for_user(Some("student12345")), 12_345);
        assert_eq!(default_seed_for_user(Some("42")), 42);
        assert_eq!(default_seed_for_user(Some("alice")), FALLBACK_SEED);
        assert_eq!(default_seed_for_user(None), FALLBACK_SEED);
    }

    #[test]
    fn seed_pairs_reproduce_their_values() {
        let mut rng = Lcg::new(7_930_248);
        let pairs = seed_value_pairs(&mut rng, 4, 1_000, |rng| rng.next_in(1, 4))
            .expect("four values in range 1..=4");
        assert_eq!(pairs.len(), 4);
        for (value, seed) in pairs {
            assert_eq!(Lcg::new(seed).next_in(1, 4), value);
        }
    }

    #[test]
    fn seed_search_gives_up_when_range_is_too_small() {
        let mut rng = Lcg::new(3);
        let err = seed_value_pairs(&mut rng, 3, 50, |rng| rng.next_in(1, 2))
            .expect_err("only two values exist");
        assert!(matches!(
            err,
            GraderError::SeedSearchExhausted { attempts: 50, found: 2, wanted: 3 }
        ));
    }
}
