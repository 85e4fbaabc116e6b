//! Parallel execution layer for the extraction stages
//!
//! Every stage is a map over an index space whose items read shared,
//! read-only inputs and write only to their own slice of the output. This
//! module owns the thread pool those maps run on and the helpers that carve
//! output buffers into disjoint per-item slices.
//!
//! ```rust
//! use isocrate_extraction::parallel::{init_thread_pool, ThreadPoolConfig};
//!
//! // Configure thread pool with 4 threads and larger stack
//! let config = ThreadPoolConfig::default()
//!     .with_threads(4)
//!     .with_stack_size(16 * 1024 * 1024)
//!     .with_min_parallel_len(4096);
//!
//! init_thread_pool(config).expect("Failed to initialize thread pool");
//! ```

use isocrate_core::{Error, Result};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::ops::Range;
use std::sync::{Arc, Mutex, OnceLock};

/// Global thread pool shared by all extraction calls
static GLOBAL_THREAD_POOL: OnceLock<Arc<ThreadPool>> = OnceLock::new();
static THREAD_POOL_CONFIG: Mutex<ThreadPoolConfig> = Mutex::new(ThreadPoolConfig::new());

const DEFAULT_STACK_SIZE: usize = 8 * 1024 * 1024;

/// Where a stage's work items run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Backend {
    /// On the calling thread, in index order
    Serial,
    /// On the global rayon pool
    #[default]
    Parallel,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Serial => "Serial",
            Backend::Parallel => "Parallel",
        }
    }
}

/// Thread pool configuration for parallel processing
#[derive(Debug, Clone)]
pub struct ThreadPoolConfig {
    /// Number of threads to use (None = one per logical CPU)
    pub num_threads: Option<usize>,
    /// Thread stack size in bytes
    pub stack_size: Option<usize>,
    /// Thread name prefix
    pub thread_name_prefix: String,
    /// Enable parallel processing (can be disabled for debugging)
    pub enabled: bool,
    /// Index spaces shorter than this run on the calling thread
    pub min_parallel_len: usize,
}

impl ThreadPoolConfig {
    const fn new() -> Self {
        Self {
            num_threads: None,
            stack_size: None,
            thread_name_prefix: String::new(),
            enabled: true,
            min_parallel_len: 1024,
        }
    }

    /// Set number of threads
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Set stack size
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    /// Enable or disable parallel processing
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the shortest index space worth dispatching to the pool
    pub fn with_min_parallel_len(mut self, len: usize) -> Self {
        self.min_parallel_len = len;
        self
    }

    /// Whether an index space of `len` items on `backend` is dispatched to
    /// the pool under this configuration
    pub fn runs_in_parallel(&self, backend: Backend, len: usize) -> bool {
        backend == Backend::Parallel && self.enabled && len >= self.min_parallel_len
    }

    fn build_pool(&self) -> Result<ThreadPool> {
        let prefix = if self.thread_name_prefix.is_empty() {
            "isocrate-mc".to_string()
        } else {
            self.thread_name_prefix.clone()
        };

        ThreadPoolBuilder::new()
            .num_threads(self.num_threads.unwrap_or_else(num_cpus::get))
            .stack_size(self.stack_size.unwrap_or(DEFAULT_STACK_SIZE))
            .thread_name(move |index| format!("{}-{}", prefix, index))
            .build()
            .map_err(|e| Error::Algorithm(format!("Failed to create thread pool: {}", e)))
    }
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            stack_size: Some(DEFAULT_STACK_SIZE),
            thread_name_prefix: "isocrate-mc".to_string(),
            ..Self::new()
        }
    }
}

/// Initialize the global thread pool with custom configuration.
///
/// Only the first call builds a pool; later calls update the dispatch
/// settings (`enabled`, `min_parallel_len`) but keep the existing threads.
pub fn init_thread_pool(config: ThreadPoolConfig) -> Result<()> {
    if GLOBAL_THREAD_POOL.get().is_none() {
        let pool = config.build_pool()?;
        // A concurrent initializer may have won; its pool is equally valid.
        let _ = GLOBAL_THREAD_POOL.set(Arc::new(pool));
    }

    if let Ok(mut global_config) = THREAD_POOL_CONFIG.lock() {
        *global_config = config;
    }

    Ok(())
}

/// Get the global thread pool, initializing with defaults if needed
pub fn get_thread_pool() -> Result<Arc<ThreadPool>> {
    if let Some(pool) = GLOBAL_THREAD_POOL.get() {
        return Ok(pool.clone());
    }
    let pool = Arc::new(ThreadPoolConfig::default().build_pool()?);
    Ok(GLOBAL_THREAD_POOL.get_or_init(|| pool).clone())
}

/// Get current thread pool configuration
pub fn get_config() -> ThreadPoolConfig {
    THREAD_POOL_CONFIG
        .lock()
        .map(|config| config.clone())
        .unwrap_or_else(|_| ThreadPoolConfig::default())
}

/// Check if parallel processing is enabled
pub fn is_parallel_enabled() -> bool {
    get_config().enabled
}

/// Whether the helpers below dispatch `len` items on `backend` to the pool.
///
/// Serial backends, a disabled configuration and short index spaces all run
/// on the calling thread.
pub fn runs_in_parallel(backend: Backend, len: usize) -> bool {
    get_config().runs_in_parallel(backend, len)
}

/// Execute an operation with the global thread pool.
///
/// With parallel processing disabled `op` runs on the calling thread without
/// entering the pool. Rayon iterators inside `op` then fall back to rayon's
/// own global pool, so code that must stay sequential checks
/// [`runs_in_parallel`] first.
pub fn execute_parallel<F, R>(op: F) -> Result<R>
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    if is_parallel_enabled() {
        install(op)
    } else {
        Ok(op())
    }
}

/// Run `op` inside the global pool, whatever the configuration says
fn install<F, R>(op: F) -> Result<R>
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    Ok(get_thread_pool()?.install(op))
}

/// Map every index of `range` through `f`, collecting results in order
pub fn parallel_map_range<U, F>(backend: Backend, range: Range<usize>, f: F) -> Result<Vec<U>>
where
    U: Send,
    F: Fn(usize) -> U + Sync + Send,
{
    if !runs_in_parallel(backend, range.len()) {
        return Ok(range.map(f).collect());
    }

    install(|| range.into_par_iter().map(f).collect())
}

/// Map every index of `range` through a fallible `f`, stopping at an error
pub fn try_parallel_map_range<U, F>(backend: Backend, range: Range<usize>, f: F) -> Result<Vec<U>>
where
    U: Send,
    F: Fn(usize) -> Result<U> + Sync + Send,
{
    if !runs_in_parallel(backend, range.len()) {
        return range.map(f).collect();
    }

    install(|| range.into_par_iter().map(f).collect())?
}

/// Indices `i` for which `predicate(i)` holds, in ascending order
pub fn parallel_filter_indices<F>(backend: Backend, len: usize, predicate: F) -> Result<Vec<usize>>
where
    F: Fn(usize) -> bool + Sync + Send,
{
    if !runs_in_parallel(backend, len) {
        return Ok((0..len).filter(|&i| predicate(i)).collect());
    }

    install(|| (0..len).into_par_iter().filter(|&i| predicate(i)).collect())
}

/// Allocate `len` copies of `value`, reporting allocation failure as an error
pub fn try_filled_vec<T: Clone>(len: usize, value: T) -> Result<Vec<T>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).map_err(|e| {
        Error::Allocation(format!(
            "{} elements of {} bytes: {}",
            len,
            std::mem::size_of::<T>(),
            e
        ))
    })?;
    buffer.resize(len, value);
    Ok(buffer)
}

/// Carve `buffer` into disjoint slices covering `ranges`.
///
/// Ranges must be ascending and non-overlapping; gaps between them are
/// skipped. Any violation is reported instead of aliasing memory.
pub fn split_disjoint<'a, T, I>(mut buffer: &'a mut [T], ranges: I) -> Result<Vec<&'a mut [T]>>
where
    I: IntoIterator<Item = Range<usize>>,
{
    let ranges = ranges.into_iter();
    let mut slices = Vec::with_capacity(ranges.size_hint().0);
    let mut cursor = 0usize;

    for range in ranges {
        if range.start < cursor || range.end < range.start || range.end - cursor > buffer.len() {
            return Err(Error::Algorithm(format!(
                "Output range {:?} overlaps or exceeds the buffer (cursor {}, remaining {})",
                range,
                cursor,
                buffer.len()
            )));
        }
        let tail = std::mem::take(&mut buffer);
        let (_, tail) = tail.split_at_mut(range.start - cursor);
        let (head, tail) = tail.split_at_mut(range.len());
        slices.push(head);
        buffer = tail;
        cursor = range.end;
    }

    Ok(slices)
}

/// Run `f(item, slice)` for every carved slice, items in parallel.
///
/// `items[k]` names the work item that owns `slices[k]`; a slice may be a
/// tuple of slices carved from several buffers.
pub fn for_each_disjoint<S, F>(backend: Backend, items: &[usize], slices: Vec<S>, f: F) -> Result<()>
where
    S: Send,
    F: Fn(usize, S) + Sync + Send,
{
    if items.len() != slices.len() {
        return Err(Error::Algorithm(format!(
            "Mismatched work partition: {} items, {} slices",
            items.len(),
            slices.len()
        )));
    }

    if !runs_in_parallel(backend, items.len()) {
        for (&item, slice) in items.iter().zip(slices) {
            f(item, slice);
        }
        return Ok(());
    }

    install(|| {
        items
            .par_iter()
            .zip(slices.into_par_iter())
            .for_each(|(&item, slice)| f(item, slice));
    })
}

/// Run `f(k, a_chunk, b_chunk)` over fixed-size chunks of two buffers
pub fn for_each_chunk<A, B, F>(
    backend: Backend,
    a: &mut [A],
    b: &mut [B],
    chunk: usize,
    f: F,
) -> Result<()>
where
    A: Send,
    B: Send,
    F: Fn(usize, &mut [A], &mut [B]) + Sync + Send,
{
    if a.len() != b.len() {
        return Err(Error::Algorithm(format!(
            "Chunked buffers differ in length: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    if !runs_in_parallel(backend, a.len() / chunk.max(1)) {
        for (k, (a, b)) in a.chunks_mut(chunk).zip(b.chunks_mut(chunk)).enumerate() {
            f(k, a, b);
        }
        return Ok(());
    }

    install(|| {
        a.par_chunks_mut(chunk)
            .zip(b.par_chunks_mut(chunk))
            .enumerate()
            .for_each(|(k, (a, b))| f(k, a, b));
    })
}
