//! Collection open options.

/// Default entries per hash bucket for new indexes.
pub const DEFAULT_BUCKET_CAPACITY: u64 = 200;

/// Default number of hash bits (head buckets = 2^bits) for new indexes.
pub const DEFAULT_HASH_BITS: u32 = 14;

/// Configuration for opening a collection.
///
/// The bucket geometry only applies to indexes added through this handle;
/// existing indexes keep the geometry recorded in their [`crate::IndexConf`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the collection directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Entries per bucket for newly added indexes.
    pub bucket_capacity: u64,

    /// Hash bits for newly added indexes.
    pub hash_bits: u32,

    /// Whether `flush` also fsyncs every file.
    pub sync_on_flush: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            bucket_capacity: DEFAULT_BUCKET_CAPACITY,
            hash_bits: DEFAULT_HASH_BITS,
            sync_on_flush: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the collection directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets entries per bucket for new indexes.
    #[must_use]
    pub const fn bucket_capacity(mut self, capacity: u64) -> Self {
        self.bucket_capacity = capacity;
        self
    }

    /// Sets hash bits for new indexes.
    #[must_use]
    pub const fn hash_bits(mut self, bits: u32) -> Self {
        self.hash_bits = bits;
        self
    }

    /// Sets whether `flush` also fsyncs.
    #[must_use]
    pub const fn sync_on_flush(mut self, value: bool) -> Self {
        self.sync_on_flush = value;
        self
    }
}
