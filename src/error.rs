use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! stale_site_error {
    ($routine:expr, $index:expr, $msg:expr) => {
        crate::Error::StaleCallSite {
            routine: $routine,
            index: $index,
            message: $msg.to_string(),
        }
    };

    ($routine:expr, $index:expr, $fmt:expr, $($arg:tt)*) => {
        crate::Error::StaleCallSite {
            routine: $routine,
            index: $index,
            message: format!($fmt, $($arg)*),
        }
    };
}

/// The generic Error type, which covers every error this library can return.
///
/// Only whole-run conditions are errors. A call site that cannot be decoded is not an
/// error: it is recorded in the [`RunReport`](crate::deobfuscation::RunReport) and left
/// unmodified.
///
/// # Error Categories
///
/// ## Fatal for a run
/// - [`Error::BlobNotFound`] - No static data slot qualifies as the encoded blob
/// - [`Error::BlobSlotMissing`] - The configured blob slot does not exist or has no data
/// - [`Error::ThreadPool`] - The capped worker pool could not be created
///
/// ## Local to one call site
/// - [`Error::StaleCallSite`] - The patcher found different instructions than the scanner recorded
///
/// # Examples
///
/// ```rust
/// use stringscope::prelude::*;
///
/// let mut module = ModuleBuilder::new().build();
/// let engine = StringDecryptionEngine::new(EngineConfig::default());
///
/// match engine.run(&mut module) {
///     Err(Error::BlobNotFound) => println!("nothing to decode"),
///     Err(e) => eprintln!("run failed: {e}"),
///     Ok(report) => println!("{report}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// No static data slot qualified as the encoded string blob.
    ///
    /// Without a blob nothing is decodable, so the run aborts before any routine
    /// is scanned.
    #[error("No encoded string blob found in any static data slot")]
    BlobNotFound,

    /// The blob slot named in the configuration is missing or not statically initialized.
    #[error("Configured blob slot '{0}' does not exist or has no initial data")]
    BlobSlotMissing(String),

    /// A call site no longer matches the instruction stream it was recorded from.
    ///
    /// # Fields
    ///
    /// * `routine` - The routine holding the call site
    /// * `index` - The instruction index that did not match
    /// * `message` - What was expected at that index
    #[error("Stale call site in {routine} at {index}: {message}")]
    StaleCallSite {
        /// The routine holding the call site
        routine: Token,
        /// The instruction index that did not match
        index: usize,
        /// What was expected at that index
        message: String,
    },

    /// Failed to build the worker pool used for capped parallel scanning.
    #[error("Failed to build worker pool - {0}")]
    ThreadPool(String),
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(error: rayon::ThreadPoolBuildError) -> Self {
        Error::ThreadPool(error.to_string())
    }
}
