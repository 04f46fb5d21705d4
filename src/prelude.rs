//! # stringscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types from the
//! stringscope library. Import it to build a module view and run the engine.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all stringscope operations
pub use crate::Error;

/// The result type used throughout stringscope
pub use crate::Result;

/// Metadata token type identifying routines, slots and members
pub use crate::metadata::token::Token;

// ================================================================================================
// Module View
// ================================================================================================

/// Instruction stream types
pub use crate::assembly::{ArithOp, Instruction, Opcode, Operand};

/// Routines and their signatures
pub use crate::assembly::{Routine, RoutineFlags, RoutineSignature, ValueKind};

/// Static data slots
pub use crate::assembly::{DataSlot, SlotOwner};

/// The provider contract and the owned in-memory module
pub use crate::assembly::{CilModule, ModuleBuilder, ModuleProvider};

// ================================================================================================
// Engine
// ================================================================================================

/// Engine entry point and configuration
pub use crate::deobfuscation::{EngineConfig, StringDecryptionEngine};

/// Run outcome
pub use crate::deobfuscation::{FailureReason, ReportSummary, RunReport, StrategyKind};
