//! Location of the encoded string blob.
//!
//! String-encryption obfuscators concatenate every hidden literal into one static
//! byte buffer. The [`BlobLocator`] picks that buffer among all static data slots:
//!
//! 1. Slots larger than `min_blob_size` win, the largest first. Global slots are
//!    considered before per-type slots.
//! 2. Only if no slot of either group qualifies by size, the first slot whose leading
//!    sample is mostly printable or null wins, again global slots first.
//!
//! The selected [`EncodedBlob`] is immutable for the rest of the run.

use std::{ops::Deref, sync::Arc};

use crate::{
    assembly::DataSlot, deobfuscation::config::EngineConfig, metadata::token::Token, Error,
    Result,
};

/// The byte buffer holding the encoded strings.
///
/// Cheap to clone; all clones share the same bytes.
#[derive(Debug, Clone)]
pub struct EncodedBlob {
    slot: Token,
    name: String,
    bytes: Arc<[u8]>,
}

impl EncodedBlob {
    /// Wraps raw bytes that did not come from a module slot.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            slot: Token::new(0),
            name: String::new(),
            bytes: bytes.into(),
        }
    }

    fn from_slot(slot: &DataSlot, bytes: &Arc<[u8]>) -> Self {
        Self {
            slot: slot.token,
            name: slot.name.clone(),
            bytes: Arc::clone(bytes),
        }
    }

    /// Token of the slot the blob was taken from (null for [`EncodedBlob::from_bytes`]).
    #[must_use]
    pub fn slot(&self) -> Token {
        self.slot
    }

    /// Name of the slot the blob was taken from.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The encoded bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Deref for EncodedBlob {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Selects the encoded blob among a module's static data slots.
pub struct BlobLocator<'a> {
    config: &'a EngineConfig,
}

impl<'a> BlobLocator<'a> {
    /// Creates a locator using the thresholds of `config`.
    #[must_use]
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Returns the blob for a run, honoring a configured slot override.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BlobSlotMissing`] if the configured slot is absent or empty and
    /// [`Error::BlobNotFound`] if no slot qualifies.
    pub fn resolve(&self, slots: &[DataSlot]) -> Result<EncodedBlob> {
        if let Some(name) = &self.config.blob_slot {
            return slots
                .iter()
                .find(|slot| slot.name == *name && slot.size() > 0)
                .and_then(|slot| slot.data.as_ref().map(|d| EncodedBlob::from_slot(slot, d)))
                .ok_or_else(|| Error::BlobSlotMissing(name.clone()));
        }

        self.locate(slots).ok_or(Error::BlobNotFound)
    }

    /// Applies the selection policy and returns at most one blob.
    #[must_use]
    pub fn locate(&self, slots: &[DataSlot]) -> Option<EncodedBlob> {
        let (global, per_type): (Vec<&DataSlot>, Vec<&DataSlot>) = slots
            .iter()
            .filter(|slot| slot.size() > 0)
            .partition(|slot| slot.is_global());

        let slot = self
            .largest(&global)
            .or_else(|| self.largest(&per_type))
            .or_else(|| self.first_textual(&global))
            .or_else(|| self.first_textual(&per_type))?;
        let data = slot.data.as_ref()?;

        log::debug!(
            "selected '{}' ({}, {} bytes) as encoded string blob",
            slot.name,
            slot.token,
            data.len()
        );
        Some(EncodedBlob::from_slot(slot, data))
    }

    fn largest<'s>(&self, candidates: &[&'s DataSlot]) -> Option<&'s DataSlot> {
        let mut largest: Option<&DataSlot> = None;
        for slot in candidates
            .iter()
            .copied()
            .filter(|slot| slot.size() > self.config.min_blob_size)
        {
            // strict comparison keeps the first of equally sized slots
            if largest.is_none_or(|best| slot.size() > best.size()) {
                largest = Some(slot);
            }
        }

        largest
    }

    fn first_textual<'s>(&self, candidates: &[&'s DataSlot]) -> Option<&'s DataSlot> {
        candidates
            .iter()
            .copied()
            .find(|slot| slot.bytes().is_some_and(|bytes| self.looks_textual(bytes)))
    }

    fn looks_textual(&self, bytes: &[u8]) -> bool {
        let sample = &bytes[..bytes.len().min(self.config.content_sample_size)];
        if sample.is_empty() {
            return false;
        }

        let textual = sample
            .iter()
            .filter(|&&b| b == 0 || b.is_ascii_graphic() || b == b' ')
            .count();

        #[allow(clippy::cast_precision_loss)]
        let ratio = textual as f64 / sample.len() as f64;
        ratio > self.config.min_printable_ratio
    }
}
