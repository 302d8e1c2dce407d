//! The typewriting monkey: a deterministic, skippable source of lowercase
//! letters.
//!
//! The `n`-th letter is a pure function of `(seed, n)`, so a process that
//! restarts at stream position `p` resumes with exactly the letters a fresh
//! run would have produced there — no seam, and fast-forwarding costs O(1)
//! instead of replaying `p` draws.
//!
//! This is the splitmix64 construction: the internal state walks the Weyl
//! sequence `seed + n·γ` and each output is the finalizer of the state, so
//! "skip to position n" is a single multiply-add.

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// splitmix64 finalizer.
#[inline]
fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// A deterministic letter source positioned somewhere in the infinite stream.
///
/// Two monkeys with the same seed and position produce identical letters,
/// always. There is exactly one live monkey per stream (it is the single
/// logical writer); clones are only useful for read-only replay.
#[derive(Clone, Debug)]
pub struct Monkey {
    state: u64,
    position: u64,
}

impl Monkey {
    /// A monkey at the very beginning of the stream.
    pub fn new(seed: u64) -> Self {
        Self::at(seed, 0)
    }

    /// A monkey whose next letter is the one at absolute index `position`.
    ///
    /// Equivalent to `Monkey::new(seed)` followed by `position` draws, in
    /// constant time.
    pub fn at(seed: u64, position: u64) -> Self {
        Self {
            state: seed.wrapping_add(GOLDEN_GAMMA.wrapping_mul(position)),
            position,
        }
    }

    /// Absolute index of the next letter this monkey will type.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Type the next letter.
    pub fn next_letter(&mut self) -> char {
        self.state = self.state.wrapping_add(GOLDEN_GAMMA);
        self.position = self.position.wrapping_add(1);
        let draw = mix(self.state) % 26;
        (b'a' + draw as u8) as char
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: u64 = 0xDEAD_BEEF_CAFE_F00D;

    fn take(monkey: &mut Monkey, n: usize) -> String {
        (0..n).map(|_| monkey.next_letter()).collect()
    }

    #[test]
    fn only_lowercase_letters() {
        let mut monkey = Monkey::new(SEED);
        for _ in 0..10_000 {
            let ch = monkey.next_letter();
            assert!(ch.is_ascii_lowercase(), "unexpected character {ch:?}");
        }
    }

    #[test]
    fn same_seed_same_stream() {
        let a = take(&mut Monkey::new(SEED), 256);
        let b = take(&mut Monkey::new(SEED), 256);
        assert_eq!(a, b);
    }

    #[test]
    fn restart_has_no_seam() {
        // A run of 10, vs. a run of 5 followed by a "restart" at position 5.
        let uninterrupted = take(&mut Monkey::new(SEED), 10);

        let mut first_half = Monkey::new(SEED);
        let mut prefix = take(&mut first_half, 5);
        assert_eq!(first_half.position(), 5);

        let mut resumed = Monkey::at(SEED, 5);
        prefix.push_str(&take(&mut resumed, 5));

        assert_eq!(prefix, uninterrupted);
    }

    #[test]
    fn fast_forward_matches_replay() {
        for skip in [0_u64, 1, 7, 26, 1_000, 8_192, 1_000_003] {
            let mut replayed = Monkey::new(SEED);
            for _ in 0..skip {
                replayed.next_letter();
            }
            let mut skipped = Monkey::at(SEED, skip);
            assert_eq!(skipped.position(), replayed.position());
            assert_eq!(take(&mut skipped, 32), take(&mut replayed, 32), "skip={skip}");
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let a = take(&mut Monkey::new(SEED), 64);
        let b = take(&mut Monkey::new(SEED ^ 1), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn letters_are_roughly_uniform() {
        let mut counts = [0_u32; 26];
        let mut monkey = Monkey::new(SEED);
        let n = 26 * 4_000;
        for _ in 0..n {
            counts[(monkey.next_letter() as u8 - b'a') as usize] += 1;
        }
        // Loose sanity bound: every letter within ±25% of the expected count.
        let expected = (n / 26) as u32;
        for (i, &count) in counts.iter().enumerate() {
            assert!(
                count > expected * 3 / 4 && count < expected * 5 / 4,
                "letter {} count {count} far from expected {expected}",
                (b'a' + i as u8) as char,
            );
        }
    }
}
