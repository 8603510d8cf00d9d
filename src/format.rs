//! Wire-format constants: record and value markers, terminators, magic
//! prefixes, and tuning defaults.
//!
//! A stream is a sequence of records, each terminated by `E` `\n`. Records
//! open with one of `H`/`C`/`A`/`V`; values open with one of the markers in
//! [`marker`]. All multi-byte integers on the wire are little-endian.

// ---------------------------------------------------------------------------
// Size multipliers
// ---------------------------------------------------------------------------

pub const KB: usize = 1 << 10;
pub const MB: usize = 1 << 20;

// ---------------------------------------------------------------------------
// Marker bytes
// ---------------------------------------------------------------------------

/// Single-byte markers that open a record or a value.
pub mod marker {
    // Record kinds.
    pub const HEADER: u8 = b'H';
    pub const DICT_CLEAR: u8 = b'C';
    pub const DICT_ADD: u8 = b'A';
    pub const VALUE: u8 = b'V';
    /// First byte of the two-byte record terminator.
    pub const RECORD_END: u8 = b'E';

    // Scalar values.
    pub const TRUE: u8 = b'T';
    pub const FALSE: u8 = b'F';
    pub const NULL: u8 = b'N';
    /// Non-negative integer, varint payload.
    pub const VARINT: u8 = b'I';
    /// Negated integer; the varint payload is the absolute value.
    pub const NEG_VARINT: u8 = b'J';
    /// Non-negative integer, packed 8-byte little-endian payload.
    pub const POS_INT64: u8 = b'i';
    /// Negated integer, packed 8-byte little-endian magnitude.
    pub const NEG_INT64: u8 = b'j';
    /// IEEE-754 double, 8 raw little-endian bytes.
    pub const DOUBLE: u8 = b'D';
    /// Wall-clock nanoseconds since the Unix epoch, little-endian i64.
    pub const TIMESTAMP: u8 = b't';
    /// Inline byte string: varint length then raw bytes.
    pub const STRING: u8 = b'S';
    /// Reference into the active dictionary: varint index.
    pub const DICT_REF: u8 = b'X';

    // Containers.
    pub const ARRAY_START: u8 = b'[';
    pub const ARRAY_END: u8 = b']';
    pub const OBJECT_START: u8 = b'{';
    pub const OBJECT_END: u8 = b'}';
}

/// Every record ends with these two bytes.
pub const RECORD_TERM: &[u8; 2] = b"E\n";

/// Needle used when resynchronizing: the tail of one record followed by the
/// start of a value record.
pub const SYNC_NEEDLE: &[u8; 3] = b"E\nV";

/// Current format version, written in the stream header.
pub const FORMAT_VERSION: u64 = 1;

/// A varint longer than this is a structural error.
pub const MAX_VARINT_LEN: usize = 10;

// ---------------------------------------------------------------------------
// Magic prefixes
// ---------------------------------------------------------------------------

/// Canonical stream prefix: `H`, `I`, varint(1), `E`. The trailing `\n`
/// completes the header record for metadata-free streams.
pub const AU_MAGIC: &[u8; 4] = b"HI\x01E";

/// Historical 4-byte signature still accepted on detection.
pub const AU_LEGACY_MAGIC: &[u8; 4] = b"HAU\x61";

/// Standard gzip member prefix.
pub const GZIP_MAGIC: &[u8; 2] = b"\x1f\x8b";

/// Default sidecar extension for gzip indexes.
pub const ZINDEX_EXTENSION: &str = ".auzx";

// ---------------------------------------------------------------------------
// Encoder tuning defaults
// ---------------------------------------------------------------------------

/// Strings at or below this length are always inlined, never interned.
pub const DEFAULT_TINY_STR: usize = 4;
/// Sightings required before a tracked string is promoted to the dictionary.
pub const DEFAULT_INTERN_THRESHOLD: u64 = 10;
/// Bound on the number of candidate strings tracked at once.
pub const DEFAULT_INTERN_CACHE_SIZE: usize = 1000;
/// Records between dictionary purges.
pub const DEFAULT_PURGE_INTERVAL: u64 = 250_000;
/// Minimum occurrence count that survives a purge.
pub const DEFAULT_PURGE_THRESHOLD: u64 = 50;
/// Dictionary size beyond which the encoder starts a fresh dictionary.
pub const DEFAULT_CLEAR_THRESHOLD: usize = 1400;
