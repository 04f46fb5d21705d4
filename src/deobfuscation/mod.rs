//! String decryption for obfuscated modules.
//!
//! This module recovers string literals that an obfuscator replaced by calls into a
//! decoder routine. Everything is static: decoders are never executed, their output
//! is reconstructed from the encoded blob with a fixed list of strategies.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      String Decryption Pipeline                         │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  Input: ModuleProvider                                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌────────────────────────┐     ┌────────────────────────┐              │
//! │  │     Blob Locator       │     │   Signature Matcher    │  once per run│
//! │  │  largest / textual     │     │  exact, superset pool  │              │
//! │  └───────────┬────────────┘     └───────────┬────────────┘              │
//! │              │  EncodedBlob (read-only)      │  DecoderSet (read-only)  │
//! │              ▼                               ▼                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Per routine (rayon, independent)                   │   │
//! │  │                                                                 │   │
//! │  │  Call-Site Scanner ──► Strategy Engine ──► Instruction Patcher  │   │
//! │  │   ldc.i4 / call         1..7 + validator     nop / ldstr        │   │
//! │  └────────────────────────────┬────────────────────────────────────┘   │
//! │                               │                                         │
//! │                               ▼                                         │
//! │  Output: RunReport (examined, recovered, failed, per-site logs)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Components
//!
//! - [`StringDecryptionEngine`] - Orchestrates a run and owns the decode cache
//! - [`BlobLocator`] / [`EncodedBlob`] - Selection of the encoded string buffer
//! - [`SignatureMatcher`] / [`DecoderSet`] - Decoder discovery and [`DecoderShape`] classification
//! - [`CallSiteScanner`] / [`CallSite`] - Load-constant / call pairs
//! - [`StrategyEngine`] / [`StrategyKind`] - The ordered decoding strategies
//! - [`CandidateValidator`] - Acceptance of decoded text
//! - [`InstructionPatcher`] - Stack-neutral in-place rewrite
//! - [`RunReport`] - Counters, recovered strings and failures
//!
//! # Usage
//!
//! ```rust
//! use stringscope::deobfuscation::{EngineConfig, StringDecryptionEngine};
//!
//! let config = EngineConfig {
//!     exhaustive_xor: true,
//!     max_threads: Some(4),
//!     ..Default::default()
//! };
//!
//! let engine = StringDecryptionEngine::new(config);
//! assert_eq!(engine.config().max_threads, Some(4));
//! ```

mod blob;
mod config;
mod engine;
mod patcher;
mod report;
mod scanner;
mod signatures;
mod strategies;
mod validator;

pub use blob::{BlobLocator, EncodedBlob};
pub use config::{EngineConfig, DEFAULT_SHORT_XOR_KEYS, DEFAULT_XOR_KEYS};
pub use engine::StringDecryptionEngine;
pub use patcher::InstructionPatcher;
pub use report::{FailedCallSite, FailureReason, RecoveredString, ReportSummary, RunReport};
pub use scanner::{CallSite, CallSiteScanner};
pub use signatures::{
    DecoderSet, DecoderShape, DecoderSignature, LinearTransform, SignatureMatcher,
};
pub use strategies::{
    DecodeCandidate, DecodeRequest, Decoded, Population, StrategyEngine, StrategyFn,
    StrategyKind, FULL_STRATEGIES, SHORT_STRATEGIES,
};
pub use validator::CandidateValidator;
