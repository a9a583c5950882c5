use crate::render::image::{Bitmap, byte_len};
use std::collections::HashMap;

/// Pool configuration for scratch bitmaps.
#[derive(Debug, Clone, Copy)]
pub struct BitmapPoolOpts {
    /// Maximum bytes retained across all buckets.
    pub max_pool_bytes: usize,
    /// Maximum number of retained bitmaps per `(width, height)` bucket.
    pub max_bitmaps_per_bucket: usize,
}

impl Default for BitmapPoolOpts {
    fn default() -> Self {
        Self {
            max_pool_bytes: 64 * 1024 * 1024,
            max_bitmaps_per_bucket: 8,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BitmapPoolStats {
    pub retained_bitmaps: usize,
    pub retained_bytes: usize,
    pub alloc_bitmaps: u64,
    pub alloc_bytes: u64,
    pub reused: u64,
    pub dropped_on_release: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BitmapKey {
    w: u32,
    h: u32,
}

impl BitmapKey {
    fn byte_len(self) -> usize {
        byte_len(self.w, self.h)
    }
}

/// Bounded pooled allocator for intermediate bitmaps of one render call.
///
/// Acquire and release happen per expression node, never per pixel.
#[derive(Debug)]
pub struct BitmapPool {
    opts: BitmapPoolOpts,
    stats: BitmapPoolStats,
    buckets: HashMap<BitmapKey, Vec<Vec<u8>>>,
}

impl Default for BitmapPool {
    fn default() -> Self {
        Self::new(BitmapPoolOpts::default())
    }
}

impl BitmapPool {
    pub fn new(opts: BitmapPoolOpts) -> Self {
        Self {
            opts,
            stats: BitmapPoolStats::default(),
            buckets: HashMap::new(),
        }
    }

    pub fn stats(&self) -> BitmapPoolStats {
        self.stats.clone()
    }

    /// A transparent bitmap of the given size.
    pub fn acquire(&mut self, width: u32, height: u32) -> Bitmap {
        let key = BitmapKey {
            w: width,
            h: height,
        };
        if let Some(mut data) = self.buckets.get_mut(&key).and_then(Vec::pop) {
            self.stats.retained_bitmaps = self.stats.retained_bitmaps.saturating_sub(1);
            self.stats.retained_bytes = self.stats.retained_bytes.saturating_sub(key.byte_len());
            self.stats.reused = self.stats.reused.saturating_add(1);
            data.fill(0);
            return Bitmap::from_vec_unchecked(width, height, data);
        }

        self.stats.alloc_bitmaps = self.stats.alloc_bitmaps.saturating_add(1);
        self.stats.alloc_bytes = self.stats.alloc_bytes.saturating_add(key.byte_len() as u64);
        Bitmap::new(width, height)
    }

    pub fn release(&mut self, bitmap: Bitmap) {
        if self.opts.max_pool_bytes == 0 || self.opts.max_bitmaps_per_bucket == 0 {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        let key = BitmapKey {
            w: bitmap.width(),
            h: bitmap.height(),
        };
        let bytes = key.byte_len();
        if bytes == 0 || self.stats.retained_bytes.saturating_add(bytes) > self.opts.max_pool_bytes
        {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        let bucket = self.buckets.entry(key).or_default();
        if bucket.len() >= self.opts.max_bitmaps_per_bucket {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        bucket.push(bitmap.into_data());
        self.stats.retained_bitmaps = self.stats.retained_bitmaps.saturating_add(1);
        self.stats.retained_bytes = self.stats.retained_bytes.saturating_add(bytes);
    }
}
