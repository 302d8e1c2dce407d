use std::time::Duration;

/// Fractional-rate pacing across fixed ticks.
///
/// Each tick contributes `cps × dt` characters to an accumulator; the whole
/// part is emitted and the fraction carries over, so a rate like 20.8 chars
/// per second comes out exact over time instead of drifting or rounding away.
#[derive(Default)]
pub struct Pacer {
    carry: f64,
}

impl Pacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many whole characters are due for a tick of length `dt` at
    /// `cps` characters per second.
    pub fn tick(&mut self, cps: f64, dt: Duration) -> u64 {
        self.carry += cps * dt.as_secs_f64();
        let due = self.carry.floor();
        self.carry -= due;
        due as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: Duration = Duration::from_micros(1_000_000 / 60);

    /// Emitted characters over `seconds` of simulated ticking at `cps`.
    fn run(cps: f64, seconds: u64) -> u64 {
        let mut pacer = Pacer::new();
        (0..seconds * 60).map(|_| pacer.tick(cps, STEP)).sum()
    }

    #[test]
    fn integer_rates_come_out_exact() {
        // 12 users × 5 cpm = 60 cpm = 1 cps.
        let emitted = run(1.0, 60);
        assert!((59..=60).contains(&emitted), "emitted {emitted}");

        // 360 users × 5 cpm = 30 cps.
        let emitted = run(30.0, 60);
        assert!((1799..=1800).contains(&emitted), "emitted {emitted}");
    }

    #[test]
    fn fractional_rates_do_not_drift() {
        // 250 users × 5 cpm ≈ 20.83 cps; over a minute that is 1250 chars.
        let emitted = run(250.0 * 5.0 / 60.0, 60);
        assert!((1249..=1250).contains(&emitted), "emitted {emitted}");
    }

    #[test]
    fn sub_one_per_tick_rates_accumulate() {
        let mut pacer = Pacer::new();
        // 0.4 chars per tick: emission pattern must average 2 per 5 ticks.
        let total: u64 = (0..1000).map(|_| pacer.tick(24.0, STEP)).sum();
        assert!((399..=400).contains(&total), "emitted {total}");
    }

    #[test]
    fn zero_rate_emits_nothing() {
        let mut pacer = Pacer::new();
        for _ in 0..100 {
            assert_eq!(pacer.tick(0.0, STEP), 0);
        }
    }
}
