//! Static data slots: named, statically-initialized byte buffers.

use std::sync::Arc;

use crate::metadata::token::Token;

/// Where a static data slot is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotOwner {
    /// The module's implicit global container (`<Module>` in CIL)
    Global,
    /// A regular type, identified by its token
    Type(Token),
}

/// A static field with optional initial data (a FieldRVA-backed field in CIL).
///
/// The data is reference-counted so the selected blob can be shared with every
/// worker without copying.
#[derive(Debug, Clone)]
pub struct DataSlot {
    /// Identity of the slot
    pub token: Token,
    /// Name of the field
    pub name: String,
    /// Declaring container
    pub owner: SlotOwner,
    /// Initial bytes, `None` when the slot is not statically initialized
    pub data: Option<Arc<[u8]>>,
}

impl DataSlot {
    /// Creates an initialized slot in the global container.
    #[must_use]
    pub fn global(token: Token, name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            token,
            name: name.into(),
            owner: SlotOwner::Global,
            data: Some(data.into()),
        }
    }

    /// Creates an initialized slot declared on a type.
    #[must_use]
    pub fn on_type(
        token: Token,
        owner: Token,
        name: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            token,
            name: name.into(),
            owner: SlotOwner::Type(owner),
            data: Some(data.into()),
        }
    }

    /// Creates a slot without initial data.
    #[must_use]
    pub fn uninitialized(token: Token, owner: SlotOwner, name: impl Into<String>) -> Self {
        Self {
            token,
            name: name.into(),
            owner,
            data: None,
        }
    }

    /// Size of the initial data in bytes, 0 when not initialized.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.as_ref().map_or(0, |data| data.len())
    }

    /// Returns the initial bytes.
    #[must_use]
    pub fn bytes(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Returns `true` if the slot is declared in the global container.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.owner == SlotOwner::Global
    }
}
