use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rand_distr::Beta;

/// Global seed for the current simulation run.
/// Set by main before each iteration so that every RNG stream in the run
/// derives from it and the whole run replays identically for the same value.
pub static RAND_SEED: AtomicU64 = AtomicU64::new(0);

/// Count of simulation runs executed in this process (across scenarios and variants)
pub static TOTAL_SIMULATION_RUNS: AtomicU64 = AtomicU64::new(0);

/// When set, every auction round emits a CSV line on the Auction log event
pub static VERBOSE_AUCTION: AtomicBool = AtomicBool::new(false);

/// Derive a stream-specific seed from the global run seed.
/// Callers pass a distinct constant per purpose (user pick, clicks, ties, ...)
/// so the streams stay independent while remaining reproducible.
pub fn get_seed(stream: u64) -> u64 {
    RAND_SEED
        .load(Ordering::Relaxed)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(stream)
}

/// Create a Beta distribution for click-probability populations.
/// Beta(2, 6) or similar gives the low-CTR skew typical of display inventory.
pub fn beta_dist(alpha: f64, beta: f64) -> Beta<f64> {
    Beta::new(alpha, beta).expect("Beta parameters must be positive")
}
