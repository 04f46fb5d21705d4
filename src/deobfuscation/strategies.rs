//! Decoding strategies for call-site constants.
//!
//! Given the constant `c` of a call site and the encoded blob `B`, the
//! [`StrategyEngine`] tries a fixed list of interpretations and returns the first one
//! that yields an accepted string.
//!
//! # Full population
//!
//! | # | Strategy | Offset(s) read |
//! |---|----------|----------------|
//! | 1 | [`StrategyKind::DirectOffset`] | `c`, when `0 <= c < len(B)` |
//! | 2 | [`StrategyKind::EndRelativeOffset`] | `len(B) + c`, when `c < 0` |
//! | 3 | [`StrategyKind::ScaledOffset`] | `c * 4`, or `len(B) + c * 4` when negative |
//! | 4 | [`StrategyKind::LinearTransform`] | 1-3 applied to the decoder's transform of `c` |
//! | 5 | [`StrategyKind::KeyedXor`] | 1-3 applied to `c ^ key` for each configured key |
//! | 6 | [`StrategyKind::NullTerminated`] | every offset 1-5 probed without a valid record |
//! | 7 | [`StrategyKind::ExhaustiveXor`] | 1-3 applied to `c ^ k`, `k` in `0..=255` (opt-in) |
//!
//! Strategies 1-5 and 7 read a length-prefixed record: a 32-bit little-endian length
//! `L` followed by `L` bytes of UTF-8. Strategy 6 reads up to the next zero byte.
//!
//! # Short population
//!
//! Constants below the short threshold that target a decoder without an exact
//! `(int32) -> string` signature are plain integers far more often than blob offsets.
//! They only get [`StrategyKind::ShortXorChar`]: `c ^ key` must be a printable ASCII
//! code point, and the result is a one-character string.
//!
//! All arithmetic on constants is 32-bit signed with wraparound.

use strum::Display;
use widestring::U16Str;

use crate::deobfuscation::{
    blob::EncodedBlob, config::EngineConfig, signatures::DecoderSignature,
    validator::CandidateValidator,
};

/// Identifies the strategy that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum StrategyKind {
    /// Constant is a byte offset from the start of the blob
    DirectOffset,
    /// Negative constant is an offset from the end of the blob
    EndRelativeOffset,
    /// Constant is a 4-byte word index
    ScaledOffset,
    /// Constant passes through the decoder's arithmetic first
    LinearTransform,
    /// Constant is XOR-masked with one of a few well-known keys
    KeyedXor,
    /// Record is zero-terminated instead of length-prefixed
    NullTerminated,
    /// Constant is XOR-masked with an arbitrary byte
    ExhaustiveXor,
    /// Small constant encodes a single character
    ShortXorChar,
}

/// Which strategy list applies to a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Population {
    /// Every blob strategy
    Full,
    /// Single-character recovery only
    Short,
}

/// A decoded string and the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeCandidate {
    /// The accepted literal
    pub value: String,
    /// The producing strategy
    pub strategy: StrategyKind,
    /// Blob offset the literal was read from (`None` for single-character recovery)
    pub offset: Option<usize>,
}

/// Input shared by every strategy function.
pub struct DecodeRequest<'a> {
    /// The call-site constant
    pub constant: i32,
    /// The encoded blob
    pub blob: &'a [u8],
    /// The resolved decoder, if any
    pub signature: Option<&'a DecoderSignature>,
    /// Limits and key sets
    pub config: &'a EngineConfig,
    /// Acceptance check for decoded text
    pub validator: CandidateValidator,
}

/// A text found by a strategy, before it is tagged with the strategy kind.
pub struct Decoded {
    /// The accepted literal
    pub value: String,
    /// Blob offset it was read from
    pub offset: Option<usize>,
}

/// A decoding strategy: pure function of the request.
pub type StrategyFn = fn(&DecodeRequest<'_>) -> Option<Decoded>;

/// Strategies for the full population, in priority order.
pub const FULL_STRATEGIES: &[(StrategyKind, StrategyFn)] = &[
    (StrategyKind::DirectOffset, direct_offset),
    (StrategyKind::EndRelativeOffset, end_relative_offset),
    (StrategyKind::ScaledOffset, scaled_offset),
    (StrategyKind::LinearTransform, linear_transform),
    (StrategyKind::KeyedXor, keyed_xor),
    (StrategyKind::NullTerminated, null_terminated),
    (StrategyKind::ExhaustiveXor, exhaustive_xor),
];

/// Strategies for the short population, in priority order.
pub const SHORT_STRATEGIES: &[(StrategyKind, StrategyFn)] =
    &[(StrategyKind::ShortXorChar, short_xor_char)];

/// Runs the strategy lists against one blob.
pub struct StrategyEngine<'a> {
    blob: &'a EncodedBlob,
    config: &'a EngineConfig,
}

impl<'a> StrategyEngine<'a> {
    /// Creates an engine over `blob`.
    #[must_use]
    pub fn new(blob: &'a EncodedBlob, config: &'a EngineConfig) -> Self {
        Self { blob, config }
    }

    /// Returns the first accepted candidate for `constant`, or `None` on a decode miss.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use stringscope::deobfuscation::{
    ///     EncodedBlob, EngineConfig, Population, StrategyEngine, StrategyKind,
    /// };
    ///
    /// let mut bytes = vec![0x05, 0x00, 0x00, 0x00];
    /// bytes.extend_from_slice(b"hello");
    /// let blob = EncodedBlob::from_bytes(bytes);
    /// let config = EngineConfig::default();
    ///
    /// let engine = StrategyEngine::new(&blob, &config);
    /// let candidate = engine.decode(0, None, Population::Full).unwrap();
    /// assert_eq!(candidate.value, "hello");
    /// assert_eq!(candidate.strategy, StrategyKind::DirectOffset);
    ///
    /// assert!(engine.decode(999_999, None, Population::Full).is_none());
    /// ```
    #[must_use]
    pub fn decode(
        &self,
        constant: i32,
        signature: Option<&DecoderSignature>,
        population: Population,
    ) -> Option<DecodeCandidate> {
        let (strategies, validator) = match population {
            Population::Full => (FULL_STRATEGIES, CandidateValidator::new()),
            Population::Short => (SHORT_STRATEGIES, CandidateValidator::single_char()),
        };

        let request = DecodeRequest {
            constant,
            blob: self.blob.bytes(),
            signature,
            config: self.config,
            validator,
        };

        for (kind, strategy) in strategies {
            if let Some(decoded) = strategy(&request) {
                return Some(DecodeCandidate {
                    value: decoded.value,
                    strategy: *kind,
                    offset: decoded.offset,
                });
            }
            log::trace!("{kind} missed for constant 0x{constant:08X}");
        }

        None
    }
}

/// `c` as a forward offset.
fn direct(constant: i32, len: usize) -> Option<usize> {
    let offset = usize::try_from(constant).ok()?;
    (offset < len).then_some(offset)
}

/// Negative `c` as an offset from the end.
fn end_relative(constant: i32, len: usize) -> Option<usize> {
    if constant >= 0 {
        return None;
    }
    let offset = i64::try_from(len).ok()? + i64::from(constant);
    usize::try_from(offset).ok().filter(|&offset| offset < len)
}

/// `c * 4` (wrapping), end-relative when negative.
fn scaled(constant: i32, len: usize) -> Option<usize> {
    let scaled = constant.wrapping_mul(4);
    if scaled >= 0 {
        direct(scaled, len)
    } else {
        end_relative(scaled, len)
    }
}

/// The offsets strategies 1-3 read for `constant`, in order.
fn base_offsets(constant: i32, len: usize) -> impl Iterator<Item = usize> {
    [
        direct(constant, len),
        end_relative(constant, len),
        scaled(constant, len),
    ]
    .into_iter()
    .flatten()
}

/// Reads a length-prefixed record at `offset`.
///
/// The record is accepted only if `0 < L <= max_len` and `offset + 4 + L <= len(B)`.
fn read_record(blob: &[u8], offset: usize, max_len: usize) -> Option<&[u8]> {
    let header_end = offset.checked_add(4)?;
    let header: [u8; 4] = blob.get(offset..header_end)?.try_into().ok()?;

    let length = i32::from_le_bytes(header);
    let length = usize::try_from(length).ok().filter(|&l| l > 0 && l <= max_len)?;

    blob.get(header_end..header_end.checked_add(length)?)
}

/// Reads bytes from `offset` up to (excluding) the next zero byte.
fn read_cstring(blob: &[u8], offset: usize, max_len: usize) -> Option<&[u8]> {
    let window = blob.get(offset..)?;
    let window = &window[..window.len().min(max_len.saturating_add(1))];
    let end = window.iter().position(|&b| b == 0)?;
    (end > 0).then(|| &window[..end])
}

fn decode_text(request: &DecodeRequest<'_>, payload: &[u8]) -> Option<String> {
    if let Some(text) = request.validator.accept_utf8(payload) {
        return Some(text);
    }

    if request.config.utf16_fallback && payload.len() % 2 == 0 {
        let units: Vec<u16> = payload
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let text = U16Str::from_slice(&units).to_string().ok()?;
        return request.validator.accept(&text);
    }

    None
}

fn record_at(request: &DecodeRequest<'_>, offset: usize) -> Option<Decoded> {
    let payload = read_record(request.blob, offset, request.config.max_string_length)?;
    decode_text(request, payload).map(|value| Decoded {
        value,
        offset: Some(offset),
    })
}

/// Retries strategies 1-3 with a derived constant.
fn retry_offsets(request: &DecodeRequest<'_>, constant: i32) -> Option<Decoded> {
    base_offsets(constant, request.blob.len()).find_map(|offset| record_at(request, offset))
}

fn direct_offset(request: &DecodeRequest<'_>) -> Option<Decoded> {
    record_at(request, direct(request.constant, request.blob.len())?)
}

fn end_relative_offset(request: &DecodeRequest<'_>) -> Option<Decoded> {
    record_at(request, end_relative(request.constant, request.blob.len())?)
}

fn scaled_offset(request: &DecodeRequest<'_>) -> Option<Decoded> {
    record_at(request, scaled(request.constant, request.blob.len())?)
}

fn linear_transform(request: &DecodeRequest<'_>) -> Option<Decoded> {
    let transform = request.signature?.transform()?;
    retry_offsets(request, transform.apply(request.constant))
}

fn keyed_xor(request: &DecodeRequest<'_>) -> Option<Decoded> {
    request
        .config
        .xor_keys
        .iter()
        .find_map(|&key| retry_offsets(request, request.constant ^ key))
}

fn null_terminated(request: &DecodeRequest<'_>) -> Option<Decoded> {
    if !request.config.null_terminated_fallback {
        return None;
    }

    let len = request.blob.len();
    let max_len = request.config.max_string_length;
    let constant = request.constant;

    let transformed = request
        .signature
        .and_then(DecoderSignature::transform)
        .map(|transform| transform.apply(constant));

    let mut probed: Vec<usize> = Vec::new();
    let derived = std::iter::once(constant)
        .chain(transformed)
        .chain(request.config.xor_keys.iter().map(|&key| constant ^ key));
    for offset in derived.flat_map(|c| base_offsets(c, len)) {
        if !probed.contains(&offset) {
            probed.push(offset);
        }
    }

    probed
        .into_iter()
        .filter(|&offset| read_record(request.blob, offset, max_len).is_none())
        .find_map(|offset| {
            let bytes = read_cstring(request.blob, offset, max_len)?;
            request.validator.accept_utf8(bytes).map(|value| Decoded {
                value,
                offset: Some(offset),
            })
        })
}

fn exhaustive_xor(request: &DecodeRequest<'_>) -> Option<Decoded> {
    if !request.config.exhaustive_xor {
        return None;
    }
    (0..=0xFF).find_map(|key| retry_offsets(request, request.constant ^ key))
}

fn short_xor_char(request: &DecodeRequest<'_>) -> Option<Decoded> {
    request.config.short_xor_keys.iter().find_map(|&key| {
        let code = u8::try_from(request.constant ^ key).ok()?;
        if !(0x20..=0x7E).contains(&code) {
            return None;
        }
        request
            .validator
            .accept(char::from(code).encode_utf8(&mut [0; 4]))
            .map(|value| Decoded {
                value,
                offset: None,
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::ArithOp,
        deobfuscation::signatures::{DecoderShape, LinearTransform},
        metadata::token::Token,
    };

    fn record(text: &str) -> Vec<u8> {
        let mut bytes = u32::try_from(text.len()).unwrap().to_le_bytes().to_vec();
        bytes.extend_from_slice(text.as_bytes());
        bytes
    }

    fn linear(transform: LinearTransform) -> DecoderSignature {
        DecoderSignature {
            routine: Token::new(0x0600_0001),
            name: "a".to_string(),
            exact: true,
            shape: DecoderShape::Linear(transform),
        }
    }

    fn decode(blob: &[u8], constant: i32) -> Option<DecodeCandidate> {
        let blob = EncodedBlob::from_bytes(blob.to_vec());
        let config = EngineConfig::default();
        StrategyEngine::new(&blob, &config).decode(constant, None, Population::Full)
    }

    #[test]
    fn test_offset_helpers() {
        assert_eq!(direct(0, 10), Some(0));
        assert_eq!(direct(9, 10), Some(9));
        assert_eq!(direct(10, 10), None);
        assert_eq!(direct(-1, 10), None);

        assert_eq!(end_relative(-10, 10), Some(0));
        assert_eq!(end_relative(-1, 10), Some(9));
        assert_eq!(end_relative(-11, 10), None);
        assert_eq!(end_relative(0, 10), None);

        assert_eq!(scaled(2, 10), Some(8));
        assert_eq!(scaled(3, 10), None);
        assert_eq!(scaled(-2, 10), Some(2));
        // 0x4000_0001 * 4 wraps to 4
        assert_eq!(scaled(0x4000_0001, 10), Some(4));
    }

    #[test]
    fn test_read_record_bounds() {
        let blob = record("hello");
        assert_eq!(blob.len(), 9);
        assert_eq!(read_record(&blob, 0, 10_000), Some(&b"hello"[..]));

        // length one past the end
        let mut short = blob.clone();
        short[0] = 6;
        assert_eq!(read_record(&short, 0, 10_000), None);

        // zero, negative and implausible lengths
        let mut zero = blob.clone();
        zero[0] = 0;
        assert_eq!(read_record(&zero, 0, 10_000), None);
        let negative = [0xFF, 0xFF, 0xFF, 0xFF, b'a'];
        assert_eq!(read_record(&negative, 0, 10_000), None);
        assert_eq!(read_record(&blob, 0, 4), None);

        // header past the end
        assert_eq!(read_record(&blob, 6, 10_000), None);
        assert_eq!(read_record(&blob, usize::MAX - 1, 10_000), None);
    }

    #[test]
    fn test_read_cstring() {
        let blob = b"\0abc\0def";
        assert_eq!(read_cstring(blob, 1, 100), Some(&b"abc"[..]));
        assert_eq!(read_cstring(blob, 0, 100), None);
        // no terminator before the end
        assert_eq!(read_cstring(blob, 5, 100), None);
        // terminator beyond the length cap
        assert_eq!(read_cstring(blob, 1, 2), None);
    }

    #[test]
    fn test_direct_offset() {
        let mut blob = record("first");
        blob.extend(record("second"));

        let candidate = decode(&blob, 9).unwrap();
        assert_eq!(candidate.value, "second");
        assert_eq!(candidate.strategy, StrategyKind::DirectOffset);
        assert_eq!(candidate.offset, Some(9));
    }

    #[test]
    fn test_end_relative() {
        let mut blob = vec![0xEE; 6];
        blob.extend(record("tail"));
        let len = i32::try_from(blob.len()).unwrap();

        let candidate = decode(&blob, 6 - len).unwrap();
        assert_eq!(candidate.value, "tail");
        assert_eq!(candidate.strategy, StrategyKind::EndRelativeOffset);
    }

    #[test]
    fn test_scaled_offset() {
        let mut blob = vec![0xEE; 12];
        blob.extend(record("word"));

        let candidate = decode(&blob, 3).unwrap();
        assert_eq!(candidate.value, "word");
        assert_eq!(candidate.strategy, StrategyKind::ScaledOffset);
        assert_eq!(candidate.offset, Some(12));
    }

    #[test]
    fn test_linear_transform() {
        let mut blob = vec![0xEE; 40];
        blob.extend(record("linear"));

        let signature = linear(LinearTransform::new(vec![
            (ArithOp::Add, 7),
            (ArithOp::Xor, 0x1000),
        ]));
        // (c + 7) ^ 0x1000 == 40  =>  c == 0x1021
        let constant = 0x1021;
        assert_eq!(signature.transform().unwrap().apply(constant), 40);

        let encoded = EncodedBlob::from_bytes(blob);
        let config = EngineConfig::default();
        let candidate = StrategyEngine::new(&encoded, &config)
            .decode(constant, Some(&signature), Population::Full)
            .unwrap();
        assert_eq!(candidate.value, "linear");
        assert_eq!(candidate.strategy, StrategyKind::LinearTransform);
    }

    #[test]
    fn test_keyed_xor() {
        let mut blob = vec![0xEE; 0x30];
        blob.extend(record("keyed"));

        // 0x30 ^ 0x55555555: far out of range for strategies 1-3
        let candidate = decode(&blob, 0x30 ^ 0x5555_5555).unwrap();
        assert_eq!(candidate.value, "keyed");
        assert_eq!(candidate.strategy, StrategyKind::KeyedXor);
    }

    #[test]
    fn test_null_terminated() {
        let mut blob = vec![0xEE; 8];
        blob.extend_from_slice(b"plain text\0");
        blob.extend(vec![0xEE; 8]);

        let candidate = decode(&blob, 8).unwrap();
        assert_eq!(candidate.value, "plain text");
        assert_eq!(candidate.strategy, StrategyKind::NullTerminated);

        let config = EngineConfig {
            null_terminated_fallback: false,
            ..EngineConfig::default()
        };
        let encoded = EncodedBlob::from_bytes(blob);
        assert!(StrategyEngine::new(&encoded, &config)
            .decode(8, None, Population::Full)
            .is_none());
    }

    #[test]
    fn test_exhaustive_xor_opt_in() {
        let mut blob = vec![0xEE; 0x40];
        blob.extend(record("brute"));
        // 0x40 ^ 0x13: no default key and no plain offset reaches the record
        let constant = 0x40 ^ 0x13;

        let encoded = EncodedBlob::from_bytes(blob);
        let config = EngineConfig::default();
        assert!(StrategyEngine::new(&encoded, &config)
            .decode(constant, None, Population::Full)
            .is_none());

        let config = EngineConfig {
            exhaustive_xor: true,
            ..EngineConfig::default()
        };
        let candidate = StrategyEngine::new(&encoded, &config)
            .decode(constant, None, Population::Full)
            .unwrap();
        assert_eq!(candidate.value, "brute");
        assert_eq!(candidate.strategy, StrategyKind::ExhaustiveXor);
        assert_eq!(candidate.offset, Some(0x40));
    }

    #[test]
    fn test_utf16_fallback() {
        let text: Vec<u8> = "wide"
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect();
        let mut blob = u32::try_from(text.len()).unwrap().to_le_bytes().to_vec();
        blob.extend(text);

        // "w\0i\0d\0e\0" is valid UTF-8 but holds NUL control characters
        assert!(decode(&blob, 0).is_none());

        let encoded = EncodedBlob::from_bytes(blob);
        let config = EngineConfig::aggressive();
        let candidate = StrategyEngine::new(&encoded, &config)
            .decode(0, None, Population::Full)
            .unwrap();
        assert_eq!(candidate.value, "wide");
        assert_eq!(candidate.strategy, StrategyKind::DirectOffset);
    }

    #[test]
    fn test_rejected_candidate_moves_on() {
        // direct offset 2 holds a control-character record, scaled offset 8 a valid one
        let mut blob = vec![0xEE, 0xEE];
        blob.extend(record("\u{1}\u{1}"));
        blob.extend(record("valid"));

        let candidate = decode(&blob, 2).unwrap();
        assert_eq!(candidate.value, "valid");
        assert_eq!(candidate.strategy, StrategyKind::ScaledOffset);
        assert_eq!(candidate.offset, Some(8));
    }

    #[test]
    fn test_short_population() {
        let blob = EncodedBlob::from_bytes(record("ignored"));
        let config = EngineConfig::default();
        let engine = StrategyEngine::new(&blob, &config);

        // 0x6B ^ 0x2A == 0x41 ('A')
        let candidate = engine.decode(0x6B, None, Population::Short).unwrap();
        assert_eq!(candidate.value, "A");
        assert_eq!(candidate.strategy, StrategyKind::ShortXorChar);
        assert_eq!(candidate.offset, None);

        // the blob record at offset 0 is never consulted for short constants
        assert_eq!(
            engine.decode(0, None, Population::Short).map(|c| c.value),
            Some("*".to_string())
        );

        // 0x0A ^ 0x2A == 0x20
        assert_eq!(
            engine.decode(0x0A, None, Population::Short).map(|c| c.value),
            Some(" ".to_string())
        );
    }

    #[test]
    fn test_determinism() {
        let mut blob = vec![0xEE; 20];
        blob.extend(record("same"));
        let encoded = EncodedBlob::from_bytes(blob);
        let config = EngineConfig::default();
        let engine = StrategyEngine::new(&encoded, &config);

        for constant in [20, 5, -4, 20 ^ 0x7F, 123_456] {
            assert_eq!(
                engine.decode(constant, None, Population::Full),
                engine.decode(constant, None, Population::Full)
            );
        }
    }
}
