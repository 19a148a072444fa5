use rand::Rng;
use std::time::Duration;

/// A duration within ±10% of `base_ms`. Loops sleep with jitter so a fleet
/// of accounts or workers does not synchronize against upstream services.
pub fn jittered_ms(base_ms: u64) -> Duration {
    let factor = rand::thread_rng().gen_range(0.9..1.1);
    Duration::from_millis((base_ms as f64 * factor) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_in_band() {
        for _ in 0..100 {
            let d = jittered_ms(10_000).as_millis() as u64;
            assert!((9_000..11_000).contains(&d), "out of band: {d}");
        }
    }
}
