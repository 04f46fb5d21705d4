//! Main string decryption engine.
//!
//! The [`StringDecryptionEngine`] is the entry point for recovering encoded string
//! literals. It locates the blob, classifies decoders and then scans, decodes and
//! patches every routine.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use rayon::prelude::*;

use crate::{
    assembly::{Instruction, ModuleProvider, Routine},
    deobfuscation::{
        blob::{BlobLocator, EncodedBlob},
        config::EngineConfig,
        patcher::InstructionPatcher,
        report::{FailureReason, RecoveredString, RunReport},
        scanner::{CallSite, CallSiteScanner},
        signatures::{DecoderSet, SignatureMatcher},
        strategies::{DecodeCandidate, StrategyEngine},
    },
    metadata::token::Token,
    Error, Result,
};

/// Main string decryption engine.
///
/// A run goes through these steps:
///
/// 1. **Blob location**: pick the static slot holding the encoded strings
/// 2. **Decoder matching**: collect and classify decoder routines
/// 3. **Routine processing**: per routine (in parallel unless disabled), find call
///    sites, decode their constants and patch the recovered literals in place
///
/// The blob and the decoder set are read-only once built. Routines are processed
/// independently; a failure in one never touches another routine's body.
///
/// # Example
///
/// ```rust
/// use stringscope::prelude::*;
///
/// let decoder = Token::new(0x0600_0001);
/// let mut blob = vec![0x05, 0x00, 0x00, 0x00];
/// blob.extend_from_slice(b"hello");
///
/// let mut module = ModuleBuilder::new()
///     .data_slot(DataSlot::global(Token::new(0x0400_0001), "data", blob))
///     .routine(Routine::new(decoder, "a").with_signature(RoutineSignature::decoder()))
///     .routine(Routine::new(Token::new(0x0600_0002), "Main").with_body(vec![
///         Instruction::load_int(0),
///         Instruction::call(decoder),
///         Instruction::ret(),
///     ]))
///     .build();
///
/// let engine = StringDecryptionEngine::new(EngineConfig::sequential());
/// let report = engine.run(&mut module)?;
/// assert_eq!(report.summary().recovered, 1);
/// # Ok::<(), stringscope::Error>(())
/// ```
#[derive(Debug)]
pub struct StringDecryptionEngine {
    /// Configuration.
    config: EngineConfig,
    /// Decode results per `(decoder, constant)`, misses included. Cleared per run.
    cache: DashMap<(Token, i32), Option<DecodeCandidate>>,
    /// Cancellation flag, checked before each routine.
    abort: AtomicBool,
}

impl Default for StringDecryptionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Read-only state shared by all routine workers of one run.
struct RunState<'a> {
    scanner: CallSiteScanner<'a>,
    strategies: StrategyEngine<'a>,
    decoders: &'a DecoderSet,
    report: &'a RunReport,
}

impl StringDecryptionEngine {
    /// Creates a new engine with the given configuration.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            cache: DashMap::new(),
            abort: AtomicBool::new(false),
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Requests cancellation of the current run.
    ///
    /// Routines already being processed finish; no further routine is started. The
    /// returned report has [`RunReport::aborted`] set. Each call to
    /// [`run`](Self::run) clears the request.
    pub fn abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    /// Returns `true` if cancellation was requested.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// Recovers string literals in `module`, patching decoded call sites in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BlobNotFound`] or [`Error::BlobSlotMissing`] if no blob can be
    /// selected; the module is left untouched. Returns [`Error::ThreadPool`] if a
    /// capped worker pool cannot be built. Per-call-site failures are not errors,
    /// they are recorded in the returned [`RunReport`].
    pub fn run<M: ModuleProvider + ?Sized>(&self, module: &mut M) -> Result<RunReport> {
        self.abort.store(false, Ordering::Relaxed);
        self.cache.clear();

        let blob = match BlobLocator::new(&self.config).resolve(module.data_slots()) {
            Ok(blob) => blob,
            Err(error) => {
                log::warn!("{error}");
                return Err(error);
            }
        };

        let decoders = SignatureMatcher::new(&self.config).analyze(&*module);
        let report = RunReport::new();
        self.process_routines(module.routines_mut(), &blob, &decoders, &report)?;

        if self.is_aborted() {
            report.mark_aborted();
        }

        log::info!("{report}");
        Ok(report)
    }

    fn process_routines(
        &self,
        routines: &mut [Routine],
        blob: &EncodedBlob,
        decoders: &DecoderSet,
        report: &RunReport,
    ) -> Result<()> {
        let state = RunState {
            scanner: CallSiteScanner::new(&self.config, decoders),
            strategies: StrategyEngine::new(blob, &self.config),
            decoders,
            report,
        };

        if !self.config.parallel {
            for routine in routines.iter_mut() {
                self.process_routine(routine, &state);
            }
            return Ok(());
        }

        match self.config.max_threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(Error::from)?;
                pool.install(|| {
                    routines
                        .par_iter_mut()
                        .for_each(|routine| self.process_routine(routine, &state));
                });
            }
            None => {
                routines
                    .par_iter_mut()
                    .for_each(|routine| self.process_routine(routine, &state));
            }
        }

        Ok(())
    }

    /// Scans, decodes and patches one routine, then tallies the decoder calls left in it.
    fn process_routine(&self, routine: &mut Routine, state: &RunState<'_>) {
        if self.is_aborted() || !routine.has_body() {
            return;
        }

        let sites = state.scanner.scan(routine);
        if !sites.is_empty() {
            self.patch_sites(routine, sites, state);
        }

        for decoder in routine
            .instructions()
            .iter()
            .filter_map(Instruction::call_target)
            .filter(|target| state.decoders.contains(*target))
        {
            state.report.record_live_call(decoder);
        }
    }

    fn patch_sites(&self, routine: &mut Routine, sites: Vec<CallSite>, state: &RunState<'_>) {
        let report = state.report;
        let mut patcher = InstructionPatcher::new(routine);

        for site in sites {
            report.record_examined();

            let Some(decoder) = site.target else {
                log::debug!("{site}: {}", FailureReason::AmbiguousTarget);
                report.record_failure(site, FailureReason::AmbiguousTarget);
                continue;
            };

            let Some(candidate) = self.decode(state, decoder, &site) else {
                log::debug!("{site}: {}", FailureReason::DecodeMiss);
                report.record_failure(site, FailureReason::DecodeMiss);
                continue;
            };

            if let Err(error) = patcher.patch(&site, &candidate.value) {
                log::warn!("{error}");
                report.record_failure(site, FailureReason::DecodeMiss);
                continue;
            }

            log::debug!(
                "{site}: recovered {:?} via {}",
                candidate.value,
                candidate.strategy
            );
            report.record_success(RecoveredString {
                routine: site.routine,
                load_index: site.load_index,
                call_index: site.call_index,
                constant: site.constant,
                decoder,
                strategy: candidate.strategy,
                value: candidate.value,
            });
        }

        if patcher.finish() > 0 {
            report.record_routine_patched();
        }
    }

    /// Decodes one site through the run cache.
    fn decode(
        &self,
        state: &RunState<'_>,
        decoder: Token,
        site: &CallSite,
    ) -> Option<DecodeCandidate> {
        let key = (decoder, site.constant);
        if let Some(cached) = self.cache.get(&key) {
            return cached.value().clone();
        }

        let candidate = state.strategies.decode(
            site.constant,
            state.decoders.get(decoder),
            site.population,
        );
        self.cache.insert(key, candidate.clone());
        candidate
    }
}
