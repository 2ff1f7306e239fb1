//! Logarithmic access-frequency counter with time decay.
//!
//! Each value carries an 8-bit counter and the 16-bit minute at which it was
//! last decremented. The counter grows with probability `1 / (base * factor + 1)`
//! where `base` is the distance above [`LFU_INIT_VAL`], so a handful of hits
//! lift a new key quickly while hot keys plateau well before 255.
//!
//! Decay is computed when the counter is read: one point is lost per
//! `decay_time` minutes elapsed since the last decrement.

use rand::Rng;

/// Counter value assigned to new keys, so they are not evicted before they
/// have a chance to accumulate hits.
pub const LFU_INIT_VAL: u8 = 5;

/// Saturation point of the counter.
pub const LFU_COUNTER_MAX: u8 = 255;

/// Default growth factor.
pub const LFU_DEFAULT_LOG_FACTOR: u32 = 10;

/// Default decay period in minutes.
pub const LFU_DEFAULT_DECAY_TIME: u32 = 1;

/// Largest value of the 16-bit minute clock.
const MINUTES_MAX: u32 = 65535;

/// Minute clock value for a unix time.
#[inline]
pub fn minutes(unix_secs: u64) -> u16 {
    ((unix_secs / 60) & MINUTES_MAX as u64) as u16
}

/// Minutes elapsed since `ldt`, treating the minute clock as cyclic.
#[inline]
pub fn time_elapsed(ldt: u16, now: u16) -> u32 {
    let (ldt, now) = (ldt as u32, now as u32);
    if now >= ldt {
        now - ldt
    } else {
        MINUTES_MAX - ldt + now
    }
}

/// Probabilistically increment a counter.
pub fn log_incr<R: Rng + ?Sized>(counter: u8, log_factor: u32, rng: &mut R) -> u8 {
    if counter == LFU_COUNTER_MAX {
        return LFU_COUNTER_MAX;
    }
    let r: f64 = rng.random();
    let base = counter.saturating_sub(LFU_INIT_VAL) as f64;
    let p = 1.0 / (base * log_factor as f64 + 1.0);
    if r < p { counter + 1 } else { counter }
}

/// Counter value after applying the decay owed since `ldt`.
///
/// Pure: callers decide whether to store the result.
#[inline]
pub fn decay(ldt: u16, counter: u8, now: u16, decay_time: u32) -> u8 {
    let periods = if decay_time > 0 {
        time_elapsed(ldt, now) / decay_time
    } else {
        0
    };
    if periods > counter as u32 {
        0
    } else {
        counter - periods as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_saturation() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        for factor in [0, 1, 10, 100] {
            for _ in 0..1000 {
                assert_eq!(log_incr(LFU_COUNTER_MAX, factor, &mut rng), LFU_COUNTER_MAX);
            }
        }
    }

    #[test]
    fn test_increment_certain_below_init() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
        // base is zero at or below the initial value, so p == 1
        for c in 0..=LFU_INIT_VAL {
            assert_eq!(log_incr(c, 10, &mut rng), c + 1);
        }
    }

    #[test]
    fn test_zero_factor_is_linear() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let mut c = 0;
        for _ in 0..300 {
            c = log_incr(c, 0, &mut rng);
        }
        assert_eq!(c, LFU_COUNTER_MAX);
    }

    #[test]
    fn test_growth_is_logarithmic() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);
        let mut c = LFU_INIT_VAL;
        for _ in 0..1000 {
            c = log_incr(c, LFU_DEFAULT_LOG_FACTOR, &mut rng);
        }
        // With factor 10 a thousand hits land far below saturation.
        assert!(c > LFU_INIT_VAL + 5, "counter {c} grew too slowly");
        assert!(c < 60, "counter {c} grew too fast");
    }

    #[test]
    fn test_decay_monotonic() {
        for decay_time in [1, 2, 7] {
            let mut prev = u8::MAX;
            for elapsed in 0..600u16 {
                let c = decay(0, 200, elapsed, decay_time);
                assert!(c <= prev);
                prev = c;
            }
            assert_eq!(decay(0, 200, 599, decay_time), 200u32.saturating_sub(599 / decay_time) as u8);
        }
    }

    #[test]
    fn test_decay_clamps_to_zero() {
        assert_eq!(decay(0, 3, 1000, 1), 0);
        assert_eq!(decay(0, 0, 1, 1), 0);
    }

    #[test]
    fn test_decay_disabled() {
        assert_eq!(decay(0, 42, 60000, 0), 42);
    }

    #[test]
    fn test_elapsed_wraps() {
        assert_eq!(time_elapsed(10, 15), 5);
        assert_eq!(time_elapsed(65530, 4), 9);
        assert_eq!(decay(65530, 20, 4, 1), 11);
    }

    #[test]
    fn test_minutes() {
        assert_eq!(minutes(0), 0);
        assert_eq!(minutes(59), 0);
        assert_eq!(minutes(60), 1);
        assert_eq!(minutes(65536 * 60), 0);
    }
}
