//! Configuration for the string decryption engine.
//!
//! This module provides the configuration type controlling blob selection, the
//! decoding strategy list, validation limits and parallelism.

/// XOR keys tried against the call-site constant by the keyed XOR strategy.
pub const DEFAULT_XOR_KEYS: [i32; 8] = [0x2A, 0x7F, 0xFF, 0x2D, 0x5A, 0xA5, 0x100, 0x5555_5555];

/// Single-byte keys tried for the short-constant (single character) population.
pub const DEFAULT_SHORT_XOR_KEYS: [i32; 6] = [0x2A, 0x7F, 0xFF, 0x2D, 0x5A, 0xA5];

/// Configuration for the string decryption engine.
///
/// Every field has a conservative default; [`EngineConfig::aggressive`] enables the
/// strategies with a higher false-positive rate.
///
/// # Example
///
/// ```rust
/// use stringscope::deobfuscation::EngineConfig;
///
/// let config = EngineConfig {
///     blob_slot: Some("data".to_string()),
///     max_threads: Some(4),
///     ..EngineConfig::default()
/// };
/// assert_eq!(config.short_constant_threshold, 1000);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Force the encoded blob by slot name (bypasses blob location).
    pub blob_slot: Option<String>,

    /// Slots strictly larger than this are preferred as blobs (default: 1024).
    pub min_blob_size: usize,

    /// Number of leading bytes sampled by the content heuristic (default: 100).
    pub content_sample_size: usize,

    /// Printable-or-null ratio a sample must exceed to qualify (default: 0.30).
    pub min_printable_ratio: f64,

    /// Constants with an absolute value below this form the short population
    /// (default: 1000).
    pub short_constant_threshold: i32,

    /// Keys for single-character recovery of short constants.
    pub short_xor_keys: Vec<i32>,

    /// Keys for the keyed XOR fallback, tried in order.
    pub xor_keys: Vec<i32>,

    /// Length fields above this are considered implausible (default: 10000).
    pub max_string_length: usize,

    /// How far back the scanner looks for the constant load (default: 5).
    pub lookback_window: usize,

    /// Enable the null-terminated read over offsets probed by earlier strategies.
    pub null_terminated_fallback: bool,

    /// Enable brute-force single-byte XOR over all 256 keys.
    pub exhaustive_xor: bool,

    /// Retry length-prefixed payloads as UTF-16LE when UTF-8 fails.
    pub utf16_fallback: bool,

    /// Case-insensitive name fragments identifying a "get string" style call inside
    /// table-based decoders.
    pub decode_call_names: Vec<String>,

    /// Process routines in parallel on the rayon pool.
    pub parallel: bool,

    /// Cap on concurrently processed routines; `None` uses the global rayon pool.
    pub max_threads: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            blob_slot: None,
            min_blob_size: 1024,
            content_sample_size: 100,
            min_printable_ratio: 0.30,
            short_constant_threshold: 1000,
            short_xor_keys: DEFAULT_SHORT_XOR_KEYS.to_vec(),
            xor_keys: DEFAULT_XOR_KEYS.to_vec(),
            max_string_length: 10_000,
            lookback_window: 5,
            null_terminated_fallback: true,
            exhaustive_xor: false,
            utf16_fallback: false,
            decode_call_names: vec![
                "getstring".to_string(),
                "decode".to_string(),
                "decrypt".to_string(),
            ],
            parallel: true,
            max_threads: None,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with every optional strategy enabled.
    ///
    /// Recovers more strings on unusual obfuscator versions at the cost of more
    /// false positives.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            exhaustive_xor: true,
            utf16_fallback: true,
            ..Self::default()
        }
    }

    /// Creates a configuration that processes routines on the calling thread.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    /// Returns `true` if `constant` belongs to the short population.
    #[must_use]
    pub fn is_short_constant(&self, constant: i32) -> bool {
        constant.unsigned_abs() < self.short_constant_threshold.unsigned_abs()
    }

    /// Returns `true` if `name` looks like a string-producing decode call.
    #[must_use]
    pub fn is_decode_call_name(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.decode_call_names
            .iter()
            .any(|fragment| lower.contains(fragment.to_ascii_lowercase().as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.min_blob_size, 1024);
        assert_eq!(config.max_string_length, 10_000);
        assert_eq!(config.xor_keys.len(), 8);
        assert!(config.null_terminated_fallback);
        assert!(!config.exhaustive_xor);
        assert!(config.parallel);
    }

    #[test]
    fn test_presets() {
        let aggressive = EngineConfig::aggressive();
        assert!(aggressive.exhaustive_xor);
        assert!(aggressive.utf16_fallback);

        assert!(!EngineConfig::sequential().parallel);
    }

    #[test]
    fn test_short_constant() {
        let config = EngineConfig::default();
        assert!(config.is_short_constant(0));
        assert!(config.is_short_constant(999));
        assert!(config.is_short_constant(-999));
        assert!(!config.is_short_constant(1000));
        assert!(!config.is_short_constant(i32::MIN));
    }

    #[test]
    fn test_decode_call_name() {
        let config = EngineConfig::default();
        assert!(config.is_decode_call_name("System.Text.Encoding::GetString"));
        assert!(config.is_decode_call_name("DecryptBlock"));
        assert!(!config.is_decode_call_name("Concat"));
    }
}
