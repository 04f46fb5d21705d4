//! The module provider contract and an owned in-memory implementation.

use std::collections::HashMap;

use crate::{
    assembly::{routine::Routine, slot::DataSlot},
    metadata::token::Token,
};

/// Supplies routines and static data slots to the engine.
///
/// Implementors own the module representation; the engine borrows routines mutably
/// only to rewrite resolved call sites and never adds or removes instructions. How the
/// module was loaded and how edits are persisted is up to the implementor.
pub trait ModuleProvider {
    /// All routines of the module, with or without a body.
    fn routines(&self) -> &[Routine];

    /// Mutable access to all routines, used for in-place patching.
    fn routines_mut(&mut self) -> &mut [Routine];

    /// All static data slots of the module.
    fn data_slots(&self) -> &[DataSlot];

    /// Resolves the name of a member that is not a routine of this module
    /// (e.g. a reference into another assembly).
    fn member_name(&self, _token: Token) -> Option<&str> {
        None
    }
}

/// An owned, in-memory module.
///
/// Useful for tests and for embedders that translate their own representation into
/// the engine's view once and copy the patched bodies back afterwards.
#[derive(Debug, Clone, Default)]
pub struct CilModule {
    routines: Vec<Routine>,
    slots: Vec<DataSlot>,
    external: HashMap<Token, String>,
}

impl CilModule {
    /// Returns the routine with the given token.
    #[must_use]
    pub fn routine(&self, token: Token) -> Option<&Routine> {
        self.routines.iter().find(|routine| routine.token == token)
    }
}

impl ModuleProvider for CilModule {
    fn routines(&self) -> &[Routine] {
        &self.routines
    }

    fn routines_mut(&mut self) -> &mut [Routine] {
        &mut self.routines
    }

    fn data_slots(&self) -> &[DataSlot] {
        &self.slots
    }

    fn member_name(&self, token: Token) -> Option<&str> {
        self.external.get(&token).map(String::as_str)
    }
}

/// Builder for creating a [`CilModule`].
///
/// # Example
///
/// ```rust
/// use stringscope::assembly::{DataSlot, Instruction, ModuleBuilder, ModuleProvider, Routine};
/// use stringscope::metadata::token::Token;
///
/// let module = ModuleBuilder::new()
///     .data_slot(DataSlot::global(Token::new(0x0400_0001), "blob", vec![0u8; 16]))
///     .routine(Routine::new(Token::new(0x0600_0001), "Main").with_body(vec![Instruction::ret()]))
///     .external_member(Token::new(0x0A00_0001), "GetString")
///     .build();
///
/// assert_eq!(module.routines().len(), 1);
/// assert_eq!(module.member_name(Token::new(0x0A00_0001)), Some("GetString"));
/// ```
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    module: CilModule,
}

impl ModuleBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a routine.
    #[must_use]
    pub fn routine(mut self, routine: Routine) -> Self {
        self.module.routines.push(routine);
        self
    }

    /// Adds a static data slot.
    #[must_use]
    pub fn data_slot(mut self, slot: DataSlot) -> Self {
        self.module.slots.push(slot);
        self
    }

    /// Names a member that lives outside the module.
    #[must_use]
    pub fn external_member(mut self, token: Token, name: impl Into<String>) -> Self {
        self.module.external.insert(token, name.into());
        self
    }

    /// Finishes the module.
    #[must_use]
    pub fn build(self) -> CilModule {
        self.module
    }
}
