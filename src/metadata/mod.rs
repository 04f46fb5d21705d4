//! Metadata identifiers shared by the module view and the engine.
//!
//! The engine does not parse metadata tables; it only needs stable identities for
//! routines, data slots and external members, which are expressed as [`token::Token`]s.

/// Token type used as the identity of every routine, slot and member
pub mod token;
