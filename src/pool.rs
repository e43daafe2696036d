//! Size-classed buffer pool
//!
//! Backs every hot-path allocation in post-processing: probability-map
//! copies, binary masks, label fields, and morphology scratch space all
//! come from here instead of a fresh `Vec` per call.

use std::sync::Mutex;

const BUCKET: usize = 1024;

#[inline]
fn size_class(n: usize) -> usize {
    if n == 0 {
        return BUCKET;
    }
    n.div_ceil(BUCKET) * BUCKET
}

struct FreeLists<T> {
    buckets: std::collections::HashMap<usize, Vec<Vec<T>>>,
}

impl<T> FreeLists<T> {
    fn new() -> Self {
        Self {
            buckets: std::collections::HashMap::new(),
        }
    }
}

/// A free list of same-sized `Vec<T>` buffers, bucketed by size class.
///
/// `f32` buffers handed out are **not** zeroed (hot path; callers must
/// overwrite before reading). `bool` buffers are zeroed over `[0, n)`
/// before being handed out, since callers rely on a clean mask.
pub struct BufferPool<T> {
    lists: Mutex<FreeLists<T>>,
    zero_fill: bool,
}

impl<T: Default + Clone> BufferPool<T> {
    fn new(zero_fill: bool) -> Self {
        Self {
            lists: Mutex::new(FreeLists::new()),
            zero_fill,
        }
    }

    /// Acquire a buffer with visible length `n` and capacity >= `size_class(n)`.
    pub fn get(&self, n: usize) -> Vec<T> {
        let class = size_class(n);
        let mut buf = {
            let mut lists = self.lists.lock().unwrap();
            lists
                .buckets
                .get_mut(&class)
                .and_then(|bucket| bucket.pop())
                .unwrap_or_else(|| Vec::with_capacity(class))
        };

        if self.zero_fill {
            buf.clear();
            buf.resize(n, T::default());
        } else {
            buf.resize(n, T::default());
            buf.truncate(n);
        }
        buf
    }

    /// Return a buffer to its size-class bucket. Safe on an empty buffer.
    pub fn put(&self, mut buf: Vec<T>) {
        if buf.capacity() == 0 {
            return;
        }
        let class = size_class(buf.capacity());
        buf.clear();
        let mut lists = self.lists.lock().unwrap();
        lists.buckets.entry(class).or_default().push(buf);
    }

    /// Acquire several buffers of the given sizes at once.
    pub fn get_many(&self, sizes: &[usize]) -> Vec<Vec<T>> {
        sizes.iter().map(|&n| self.get(n)).collect()
    }

    /// Return several buffers at once.
    pub fn put_many(&self, bufs: Vec<Vec<T>>) {
        for buf in bufs {
            self.put(buf);
        }
    }
}

static F32_POOL: std::sync::OnceLock<BufferPool<f32>> = std::sync::OnceLock::new();
static BOOL_POOL: std::sync::OnceLock<BufferPool<bool>> = std::sync::OnceLock::new();
static I32_POOL: std::sync::OnceLock<BufferPool<i32>> = std::sync::OnceLock::new();

/// Process-wide `f32` buffer pool.
pub fn f32_pool() -> &'static BufferPool<f32> {
    F32_POOL.get_or_init(|| BufferPool::new(false))
}

/// Process-wide `bool` buffer pool. Buffers are zeroed before return.
pub fn bool_pool() -> &'static BufferPool<bool> {
    BOOL_POOL.get_or_init(|| BufferPool::new(true))
}

/// Process-wide `i32` buffer pool, backing label fields. Buffers are
/// zeroed before return so unwritten cells read as background (label 0).
pub fn i32_pool() -> &'static BufferPool<i32> {
    I32_POOL.get_or_init(|| BufferPool::new(true))
}

/// An owned, pool-backed buffer that returns its storage on drop.
///
/// Derefs to `[T]` with the requested visible length; the pool-returned
/// capacity may be larger (rounded up to a size class).
pub struct Pooled<T: Default + Clone + 'static> {
    buf: Option<Vec<T>>,
    pool: &'static BufferPool<T>,
}

impl<T: Default + Clone + 'static> Pooled<T> {
    fn new(buf: Vec<T>, pool: &'static BufferPool<T>) -> Self {
        Self {
            buf: Some(buf),
            pool,
        }
    }

    pub fn into_vec(mut self) -> Vec<T> {
        self.buf.take().expect("buffer already taken")
    }
}

impl<T: Default + Clone + 'static> std::ops::Deref for Pooled<T> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        self.buf.as_deref().expect("buffer already taken")
    }
}

impl<T: Default + Clone + 'static> std::ops::DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.buf.as_deref_mut().expect("buffer already taken")
    }
}

impl<T: Default + Clone + 'static> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.put(buf);
        }
    }
}

/// Acquire a pooled, non-zeroed `f32` buffer of length `n`.
pub fn get_f32(n: usize) -> Pooled<f32> {
    Pooled::new(f32_pool().get(n), f32_pool())
}

/// Acquire a pooled, zero-filled `bool` buffer of length `n`.
pub fn get_bool(n: usize) -> Pooled<bool> {
    Pooled::new(bool_pool().get(n), bool_pool())
}

/// Acquire a pooled, zero-filled `i32` buffer of length `n`.
pub fn get_i32(n: usize) -> Pooled<i32> {
    Pooled::new(i32_pool().get(n), i32_pool())
}
