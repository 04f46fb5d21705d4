//! Abstract view of a bytecode module.
//!
//! The engine does not parse containers. It consumes this view, which a loader fills
//! from whatever representation it has:
//!
//! - [`Routine`] - A method body: ordered [`Instruction`]s plus an optional [`RoutineSignature`]
//! - [`DataSlot`] - A named static byte buffer, declared globally or on a type
//! - [`ModuleProvider`] - The trait tying both together, with [`CilModule`] as an owned implementation
//!
//! # Examples
//!
//! ```rust
//! use stringscope::assembly::{Instruction, Routine, RoutineSignature};
//! use stringscope::metadata::token::Token;
//!
//! let decoder = Routine::new(Token::new(0x0600_0001), "a")
//!     .with_signature(RoutineSignature::decoder())
//!     .with_body(vec![Instruction::load_arg(0), Instruction::ret()]);
//!
//! assert!(decoder.signature.as_ref().is_some_and(RoutineSignature::is_exact_decoder));
//! ```

mod instruction;
mod module;
mod routine;
mod slot;

pub use instruction::{ArithOp, Instruction, Opcode, Operand, StackBehavior};
pub use module::{CilModule, ModuleBuilder, ModuleProvider};
pub use routine::{Routine, RoutineFlags, RoutineSignature, ValueKind};
pub use slot::{DataSlot, SlotOwner};
