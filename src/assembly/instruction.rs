//! Instruction representation for routine bodies.
//!
//! The engine works on an already-decoded, position-indexed instruction stream. Only
//! the handful of opcodes that matter for string recovery are distinguished; everything
//! else collapses into [`Opcode::Other`], which the engine never rewrites.
//!
//! # Key Components
//!
//! - [`Instruction`] - Opcode plus operand
//! - [`Opcode`] - The distinguished instruction kinds
//! - [`ArithOp`] - Arithmetic/bitwise operators found in decoder bodies
//! - [`Operand`] - Type-safe operand representation
//! - [`StackBehavior`] - Stack effect of a call, derived from the callee signature
//!
//! # Examples
//!
//! ```rust
//! use stringscope::assembly::{ArithOp, Instruction, Opcode};
//! use stringscope::metadata::token::Token;
//!
//! let load = Instruction::load_int(0x1234);
//! assert!(load.is_load_constant_int());
//! assert_eq!(load.as_i32(), Some(0x1234));
//!
//! let call = Instruction::call(Token::new(0x0600_0001));
//! assert_eq!(call.call_target(), Some(Token::new(0x0600_0001)));
//!
//! assert_eq!(ArithOp::Xor.apply(0x10, 0x01), 0x11);
//! assert_eq!(Instruction::arith(ArithOp::Add).opcode, Opcode::Arith(ArithOp::Add));
//! ```

use std::fmt;

use strum::{Display, IntoStaticStr};

use crate::metadata::token::Token;

/// Arithmetic and bitwise operators a linear decoder may apply to its argument.
///
/// All operators use 32-bit signed arithmetic with wraparound, matching the width
/// of the `ldc.i4` constants they operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ArithOp {
    /// Bitwise exclusive or
    Xor,
    /// Wrapping addition
    Add,
    /// Wrapping subtraction
    Sub,
    /// Wrapping multiplication
    Mul,
}

impl ArithOp {
    /// Applies the operator as `lhs op rhs` with 32-bit wraparound.
    #[must_use]
    pub fn apply(self, lhs: i32, rhs: i32) -> i32 {
        match self {
            ArithOp::Xor => lhs ^ rhs,
            ArithOp::Add => lhs.wrapping_add(rhs),
            ArithOp::Sub => lhs.wrapping_sub(rhs),
            ArithOp::Mul => lhs.wrapping_mul(rhs),
        }
    }
}

/// The instruction kinds the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Push a 32-bit integer constant (`ldc.i4` family)
    LoadConstantInt,
    /// Call a routine or external member
    Call,
    /// No operation
    Nop,
    /// Push a string literal (`ldstr`)
    LoadString,
    /// Push a routine argument (`ldarg` family)
    LoadArg,
    /// Binary arithmetic or bitwise operation
    Arith(ArithOp),
    /// Push the value of a static field (`ldsfld`)
    LoadStaticField,
    /// Return from the routine
    Return,
    /// Any other instruction; never inspected or rewritten
    Other,
}

impl Opcode {
    /// Returns the CIL mnemonic closest to this opcode.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::LoadConstantInt => "ldc.i4",
            Opcode::Call => "call",
            Opcode::Nop => "nop",
            Opcode::LoadString => "ldstr",
            Opcode::LoadArg => "ldarg",
            Opcode::Arith(op) => (*op).into(),
            Opcode::LoadStaticField => "ldsfld",
            Opcode::Return => "ret",
            Opcode::Other => "<other>",
        }
    }
}

/// Represents an operand in a structured way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// No operand present
    None,
    /// 32-bit integer immediate
    Int(i32),
    /// Reference to a routine, field or external member
    Member(Token),
    /// Argument index
    Arg(u16),
    /// String literal
    String(String),
}

/// Stack effect of calling a routine.
///
/// # Examples
///
/// ```rust
/// use stringscope::assembly::{RoutineSignature, StackBehavior};
///
/// let behavior = RoutineSignature::decoder().call_behavior();
/// assert_eq!(behavior, StackBehavior { pops: 1, pushes: 1, net_effect: 0 });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackBehavior {
    /// Number of items popped from stack
    pub pops: u8,
    /// Number of items pushed to stack
    pub pushes: u8,
    /// Net effect on stack depth (pushes - pops)
    pub net_effect: i8,
}

/// A single decoded instruction.
///
/// Instructions are owned by their routine's body. The engine only ever rewrites the
/// two positions of a resolved call site; everything else is read-only to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// The instruction kind
    pub opcode: Opcode,
    /// The operand, if any
    pub operand: Operand,
}

impl Instruction {
    /// Creates an instruction from its parts.
    #[must_use]
    pub fn new(opcode: Opcode, operand: Operand) -> Self {
        Self { opcode, operand }
    }

    /// `ldc.i4 value`
    #[must_use]
    pub fn load_int(value: i32) -> Self {
        Self::new(Opcode::LoadConstantInt, Operand::Int(value))
    }

    /// `call target`
    #[must_use]
    pub fn call(target: Token) -> Self {
        Self::new(Opcode::Call, Operand::Member(target))
    }

    /// A call whose target cannot be named statically (e.g. `calli`).
    #[must_use]
    pub fn call_indirect() -> Self {
        Self::new(Opcode::Call, Operand::None)
    }

    /// `nop`
    #[must_use]
    pub fn nop() -> Self {
        Self::new(Opcode::Nop, Operand::None)
    }

    /// `ldstr value`
    #[must_use]
    pub fn load_string(value: impl Into<String>) -> Self {
        Self::new(Opcode::LoadString, Operand::String(value.into()))
    }

    /// `ldarg index`
    #[must_use]
    pub fn load_arg(index: u16) -> Self {
        Self::new(Opcode::LoadArg, Operand::Arg(index))
    }

    /// A binary arithmetic instruction
    #[must_use]
    pub fn arith(op: ArithOp) -> Self {
        Self::new(Opcode::Arith(op), Operand::None)
    }

    /// `ldsfld field`
    #[must_use]
    pub fn load_static_field(field: Token) -> Self {
        Self::new(Opcode::LoadStaticField, Operand::Member(field))
    }

    /// `ret`
    #[must_use]
    pub fn ret() -> Self {
        Self::new(Opcode::Return, Operand::None)
    }

    /// An instruction the engine does not model, e.g. `dup` or `pop`.
    #[must_use]
    pub fn other() -> Self {
        Self::new(Opcode::Other, Operand::None)
    }

    /// Returns `true` for an integer constant load.
    #[must_use]
    pub fn is_load_constant_int(&self) -> bool {
        self.opcode == Opcode::LoadConstantInt
    }

    /// Returns `true` for any call.
    #[must_use]
    pub fn is_call(&self) -> bool {
        self.opcode == Opcode::Call
    }

    /// Returns the integer operand of a constant load.
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match (&self.opcode, &self.operand) {
            (Opcode::LoadConstantInt, Operand::Int(value)) => Some(*value),
            _ => None,
        }
    }

    /// Returns the member token a call targets, `None` for indirect calls and non-calls.
    #[must_use]
    pub fn call_target(&self) -> Option<Token> {
        match (&self.opcode, &self.operand) {
            (Opcode::Call, Operand::Member(token)) => Some(*token),
            _ => None,
        }
    }

    /// Returns the string literal of a `ldstr`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match (&self.opcode, &self.operand) {
            (Opcode::LoadString, Operand::String(value)) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = self.opcode.mnemonic();
        match &self.operand {
            Operand::None => write!(f, "{mnemonic}"),
            Operand::Int(value) => write!(f, "{mnemonic} 0x{value:08X}"),
            Operand::Member(token) => write!(f, "{mnemonic} {token}"),
            Operand::Arg(index) => write!(f, "{mnemonic} A_{index}"),
            Operand::String(value) => write!(f, "{mnemonic} {value:?}"),
        }
    }
}
