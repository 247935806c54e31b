// Deterministic synthetic trend for previews of sources without any data
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a hash of a source id, the seed of its synthetic trend
pub fn seed_for(source_id: &str) -> u64 {
    source_id
        .bytes()
        .fold(FNV_OFFSET, |hash, byte| (hash ^ byte as u64).wrapping_mul(FNV_PRIME))
}

/// Plausible-looking random walk around `base`, reproducible for a given source id
pub fn synthetic_trend(source_id: &str, count: usize, base: f64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed_for(source_id));
    let amplitude = if base == 0.0 { 1.0 } else { base.abs() * 0.1 };

    let mut level = base;
    (0..count)
        .map(|_| {
            let step = rng.gen_range(-0.5..0.5) * amplitude * 0.5;
            // drift back towards the base so long windows stay in range
            level += step + (base - level) * 0.1;
            (level * 100.0).round() / 100.0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_is_reproducible() {
        let a = synthetic_trend("sensor.kitchen", 24, 20.0);
        let b = synthetic_trend("sensor.kitchen", 24, 20.0);
        assert_eq!(a, b);
        assert_eq!(a.len(), 24);
        assert_ne!(a, synthetic_trend("sensor.bedroom", 24, 20.0));
    }

    #[test]
    fn test_trend_stays_near_base() {
        let values = synthetic_trend("sensor.power", 200, 100.0);
        assert!(values.iter().all(|v| (*v - 100.0).abs() < 25.1));
    }
}
