//! Deterministic randomness and cooperative cancellation for a generation run.
//!
//! A run seed is expanded into per-stream sub-seeds with BLAKE3, keyed by
//! `(stream, key, index)`. Derivation is hash-based rather than
//! order-dependent, so parallel simulation produces the same numbers
//! regardless of how rayon schedules the work.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Process-wide counter mixed into derived seeds so repeated unseeded runs
/// of the same slip differ.
static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

// ---------------------------------------------------------------------------
// Seed hierarchy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RngHierarchy {
    run_seed: u64,
}

impl RngHierarchy {
    pub fn new(run_seed: u64) -> Self {
        Self { run_seed }
    }

    pub fn run_seed(&self) -> u64 {
        self.run_seed
    }

    /// Derive the sub-seed for one stream. Calls are independent of each
    /// other and of call order.
    pub fn sub_seed(&self, stream: &str, key: &str, index: u64) -> u64 {
        let hash = self.hash(stream, key, index);
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(buf)
    }

    /// Seeded `StdRng` for one stream.
    pub fn rng_for(&self, stream: &str, key: &str, index: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(stream, key, index))
    }

    /// Stable slip identifier for the `index`-th generated slip of a run.
    pub fn slip_id(&self, master_slip_id: &str, index: u64) -> Uuid {
        let hash = self.hash("slip-id", master_slip_id, index);
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash.as_bytes()[..16]);
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }

    fn hash(&self, stream: &str, key: &str, index: u64) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.run_seed.to_le_bytes());
        // Length prefixes keep ("ab", "c") and ("a", "bc") apart.
        hasher.update(&(stream.len() as u64).to_le_bytes());
        hasher.update(stream.as_bytes());
        hasher.update(&(key.len() as u64).to_le_bytes());
        hasher.update(key.as_bytes());
        hasher.update(&index.to_le_bytes());
        hasher.finalize()
    }
}

/// Derive a run seed from the master slip id and a per-process run counter.
pub fn derive_run_seed(master_slip_id: &str) -> u64 {
    let run = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
    seed_from_parts(master_slip_id, run)
}

/// Seed for a given (slip id, run number) pair.
pub fn seed_from_parts(master_slip_id: &str, run: u64) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(master_slip_id.as_bytes());
    hasher.update(&run.to_le_bytes());
    let hash = hasher.finalize();
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(buf)
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cooperative cancellation flag shared between a run and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
