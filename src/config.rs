//! Solver configuration and thread-pool bootstrap.

/// Chunk sizes for the solver's data-parallel loops. The scan and
/// propagation chunks are fixed by profiling; the child-load chunk follows
/// the database's preferred streaming granularity and is host-tunable.
#[derive(Clone, Copy, Debug)]
pub struct SolverConfig {
    /// Positions per work unit when streaming child tiers from the database.
    pub db_chunk_size: i64,
    /// Positions per work unit in the tier scan and draw-marking passes.
    pub scan_chunk_size: i64,
    /// Frontier records per work unit during propagation.
    pub propagate_chunk_size: i64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            db_chunk_size: 4096,
            scan_chunk_size: 1024,
            propagate_chunk_size: 16,
        }
    }
}

impl SolverConfig {
    /// Reads `TIERSOLVE_DB_CHUNK_SIZE` on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(chunk) = std::env::var("TIERSOLVE_DB_CHUNK_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            if chunk > 0 {
                config.db_chunk_size = chunk;
            }
        }
        config
    }
}

/// Read `RAYON_NUM_THREADS` (fallback `OMP_NUM_THREADS`, default: all
/// cores). Builds the rayon global thread pool; tolerates an
/// already-initialized pool. Returns the thread count in effect.
pub fn init_rayon_threads() -> usize {
    let num_threads = std::env::var("RAYON_NUM_THREADS")
        .or_else(|_| std::env::var("OMP_NUM_THREADS"))
        .ok()
        .and_then(|s| s.parse().ok());
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = num_threads {
        builder = builder.num_threads(n);
    }
    builder.build_global().ok(); // May fail if already initialized
    rayon::current_num_threads()
}
