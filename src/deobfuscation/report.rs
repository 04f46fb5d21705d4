//! Outcome tracking for one engine run.
//!
//! The [`RunReport`] is written concurrently by every routine worker and read once the
//! run has finished. Counters are atomics; recovered strings and failures are kept in
//! append-only [`boxcar::Vec`] logs so workers never block each other. Decoder calls
//! that survive patching are tallied per decoder in a [`DashMap`].

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use dashmap::DashMap;

use crate::{
    deobfuscation::{scanner::CallSite, strategies::StrategyKind},
    metadata::token::Token,
};

/// Why a call site was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// No strategy produced an accepted string, or the patcher refused the site.
    DecodeMiss,
    /// The call target could not be resolved to a concrete routine.
    AmbiguousTarget,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DecodeMiss => write!(f, "no strategy produced a valid string"),
            Self::AmbiguousTarget => write!(f, "call target cannot be resolved"),
        }
    }
}

/// A call site that was rewritten to a literal.
#[derive(Debug, Clone)]
pub struct RecoveredString {
    /// Routine containing the call site
    pub routine: Token,
    /// Position of the former constant load
    pub load_index: usize,
    /// Position of the former call, now the string load
    pub call_index: usize,
    /// The decoded constant
    pub constant: i32,
    /// The decoder that was called
    pub decoder: Token,
    /// The strategy that produced the string
    pub strategy: StrategyKind,
    /// The recovered literal
    pub value: String,
}

/// A call site that was examined but left as is.
#[derive(Debug, Clone)]
pub struct FailedCallSite {
    /// The unmodified call site
    pub site: CallSite,
    /// Why it was not rewritten
    pub reason: FailureReason,
}

/// The three totals every consumer of a run needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportSummary {
    /// Call sites examined
    pub examined: usize,
    /// Call sites rewritten
    pub recovered: usize,
    /// Call sites left untouched
    pub failed: usize,
}

/// Counters and logs of one engine run.
///
/// `examined == recovered + failed` holds once the run has finished.
#[derive(Debug, Default)]
pub struct RunReport {
    examined: AtomicUsize,
    recovered: AtomicUsize,
    routines_patched: AtomicUsize,
    aborted: AtomicBool,
    recovered_log: boxcar::Vec<RecoveredString>,
    failed_log: boxcar::Vec<FailedCallSite>,
    live_calls: DashMap<Token, usize>,
}

impl RunReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a call site as examined.
    pub fn record_examined(&self) {
        self.examined.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a rewritten call site.
    pub fn record_success(&self, recovered: RecoveredString) {
        self.recovered.fetch_add(1, Ordering::Relaxed);
        self.recovered_log.push(recovered);
    }

    /// Records a call site that was left untouched.
    pub fn record_failure(&self, site: CallSite, reason: FailureReason) {
        self.failed_log.push(FailedCallSite { site, reason });
    }

    /// Counts a routine whose body was rewritten.
    pub fn record_routine_patched(&self) {
        self.routines_patched.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a call into `decoder` still present after its routine was patched.
    pub fn record_live_call(&self, decoder: Token) {
        *self.live_calls.entry(decoder).or_insert(0) += 1;
    }

    /// Calls into `decoder` left in the module after the run.
    #[must_use]
    pub fn live_calls(&self, decoder: Token) -> usize {
        self.live_calls.get(&decoder).map_or(0, |count| *count)
    }

    pub(crate) fn mark_aborted(&self) {
        self.aborted.store(true, Ordering::Relaxed);
    }

    /// Number of call sites examined.
    #[must_use]
    pub fn examined(&self) -> usize {
        self.examined.load(Ordering::Relaxed)
    }

    /// Number of call sites rewritten.
    #[must_use]
    pub fn recovered(&self) -> usize {
        self.recovered.load(Ordering::Relaxed)
    }

    /// Number of call sites left untouched.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed_log.count()
    }

    /// Number of routines with at least one rewritten call site.
    #[must_use]
    pub fn routines_patched(&self) -> usize {
        self.routines_patched.load(Ordering::Relaxed)
    }

    /// Returns `true` if the run was cancelled before every routine was processed.
    #[must_use]
    pub fn aborted(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }

    /// All recovered strings, in completion order.
    pub fn recovered_strings(&self) -> impl Iterator<Item = &RecoveredString> {
        self.recovered_log.iter().map(|(_, entry)| entry)
    }

    /// All failed call sites, in completion order.
    pub fn failures(&self) -> impl Iterator<Item = &FailedCallSite> {
        self.failed_log.iter().map(|(_, entry)| entry)
    }

    /// Failed call sites with the given reason.
    #[must_use]
    pub fn failures_by(&self, reason: FailureReason) -> Vec<&FailedCallSite> {
        self.failures()
            .filter(|failure| failure.reason == reason)
            .collect()
    }

    /// Number of recovered strings per strategy.
    #[must_use]
    pub fn strategy_counts(&self) -> HashMap<StrategyKind, usize> {
        let mut counts = HashMap::new();
        for recovered in self.recovered_strings() {
            *counts.entry(recovered.strategy).or_insert(0) += 1;
        }
        counts
    }

    /// Decoders with at least one recovered call site and no call left anywhere.
    ///
    /// Calls the scanner never paired with a constant (a computed argument, a load
    /// outside the window) stay live and keep their decoder off this list. Such a
    /// decoder is dead code and the owning container may remove it. Returned in token
    /// order; empty for an aborted run, whose unvisited routines were never counted.
    #[must_use]
    pub fn removable_decoders(&self) -> Vec<Token> {
        if self.aborted() {
            return Vec::new();
        }

        let failing: HashSet<Token> = self
            .failures()
            .filter_map(|failure| failure.site.target)
            .collect();

        let mut decoders: Vec<Token> = self
            .recovered_strings()
            .map(|recovered| recovered.decoder)
            .filter(|decoder| !failing.contains(decoder) && self.live_calls(*decoder) == 0)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        decoders.sort_unstable();
        decoders
    }

    /// Recovered literals keyed by routine, each list in instruction order.
    #[must_use]
    pub fn strings_by_routine(&self) -> BTreeMap<Token, Vec<(usize, &str)>> {
        let mut map: BTreeMap<Token, Vec<(usize, &str)>> = BTreeMap::new();
        for recovered in self.recovered_strings() {
            map.entry(recovered.routine)
                .or_default()
                .push((recovered.call_index, recovered.value.as_str()));
        }
        for entries in map.values_mut() {
            entries.sort_unstable_by_key(|(index, _)| *index);
        }
        map
    }

    /// The three headline totals.
    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            examined: self.examined(),
            recovered: self.recovered(),
            failed: self.failed(),
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} call sites examined, {} strings recovered, {} failed ({} routines patched)",
            self.examined(),
            self.recovered(),
            self.failed(),
            self.routines_patched()
        )?;
        if self.aborted() {
            write!(f, " [aborted]")?;
        }
        Ok(())
    }
}
