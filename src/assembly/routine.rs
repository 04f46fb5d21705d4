//! Routines: executable bodies with an optional signature.

use bitflags::bitflags;

use crate::{
    assembly::instruction::{Instruction, StackBehavior},
    metadata::token::Token,
};

/// Coarse classification of parameter and return types.
///
/// Decoder detection only needs to tell integers, strings and "nothing" apart; the
/// remaining kinds exist so a provider can describe other signatures faithfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// No value (`void` return)
    Void,
    /// 32-bit integer
    Int32,
    /// String reference
    String,
    /// UTF-16 code unit
    Char,
    /// Any other reference type
    Object,
    /// Any other value type
    Other,
}

/// Parameter and return kinds of a routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineSignature {
    /// Parameter kinds in declaration order
    pub params: Vec<ValueKind>,
    /// Return kind
    pub returns: ValueKind,
}

impl RoutineSignature {
    /// Creates a signature from its parts.
    #[must_use]
    pub fn new(params: Vec<ValueKind>, returns: ValueKind) -> Self {
        Self { params, returns }
    }

    /// The canonical decoder signature, `(int32) -> string`.
    #[must_use]
    pub fn decoder() -> Self {
        Self::new(vec![ValueKind::Int32], ValueKind::String)
    }

    /// Returns `true` for exactly `(int32) -> string`.
    #[must_use]
    pub fn is_exact_decoder(&self) -> bool {
        self.takes_single_int() && self.returns == ValueKind::String
    }

    /// Returns `true` when the only parameter is a 32-bit integer.
    #[must_use]
    pub fn takes_single_int(&self) -> bool {
        self.params.as_slice() == [ValueKind::Int32]
    }

    /// Returns `true` when the routine leaves a value on the stack.
    #[must_use]
    pub fn returns_value(&self) -> bool {
        self.returns != ValueKind::Void
    }

    /// Stack effect of calling a routine with this signature.
    #[must_use]
    pub fn call_behavior(&self) -> StackBehavior {
        let pops = u8::try_from(self.params.len()).unwrap_or(u8::MAX);
        let pushes = u8::from(self.returns_value());
        #[allow(clippy::cast_possible_wrap)]
        let net_effect = pushes as i8 - pops.min(127) as i8;
        StackBehavior {
            pops,
            pushes,
            net_effect,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// Routine attributes relevant to the engine
    pub struct RoutineFlags: u32 {
        /// The routine is static
        const STATIC = 0x0010;
        /// The body was rewritten and needs re-normalization by the container
        const DIRTY = 0x1000;
    }
}

/// A single executable body within a module.
#[derive(Debug, Clone)]
pub struct Routine {
    /// Identity of the routine
    pub token: Token,
    /// Name, used for diagnostics and decode-call detection
    pub name: String,
    /// Signature, if the provider could decode it
    pub signature: Option<RoutineSignature>,
    /// Instruction stream; `None` for abstract, extern or runtime-implemented routines
    pub body: Option<Vec<Instruction>>,
    /// Attribute flags
    pub flags: RoutineFlags,
}

impl Routine {
    /// Creates a static routine without signature or body.
    #[must_use]
    pub fn new(token: Token, name: impl Into<String>) -> Self {
        Self {
            token,
            name: name.into(),
            signature: None,
            body: None,
            flags: RoutineFlags::STATIC,
        }
    }

    /// Sets the signature.
    #[must_use]
    pub fn with_signature(mut self, signature: RoutineSignature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Sets the instruction stream.
    #[must_use]
    pub fn with_body(mut self, body: Vec<Instruction>) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns the instruction stream, or an empty slice for body-less routines.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        self.body.as_deref().unwrap_or(&[])
    }

    /// Returns `true` if the routine has an instruction stream.
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Flags the routine for re-normalization by the owning container.
    pub fn mark_dirty(&mut self) {
        self.flags.insert(RoutineFlags::DIRTY);
    }

    /// Returns `true` for routines called without an instance argument.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(RoutineFlags::STATIC)
    }

    /// Returns `true` if the engine rewrote this routine.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.flags.contains(RoutineFlags::DIRTY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_signatures() {
        assert!(RoutineSignature::decoder().is_exact_decoder());

        let char_getter = RoutineSignature::new(vec![ValueKind::Int32], ValueKind::Char);
        assert!(!char_getter.is_exact_decoder());
        assert!(char_getter.takes_single_int());
        assert!(char_getter.returns_value());

        let setter = RoutineSignature::new(vec![ValueKind::Int32], ValueKind::Void);
        assert!(!setter.returns_value());

        let two_args = RoutineSignature::new(vec![ValueKind::Int32; 2], ValueKind::String);
        assert!(!two_args.takes_single_int());
    }

    #[test]
    fn test_call_behavior() {
        let behavior = RoutineSignature::decoder().call_behavior();
        assert_eq!((behavior.pops, behavior.pushes, behavior.net_effect), (1, 1, 0));

        let setter = RoutineSignature::new(vec![ValueKind::Int32], ValueKind::Void);
        assert_eq!(setter.call_behavior().net_effect, -1);
    }

    #[test]
    fn test_dirty_flag() {
        let mut routine = Routine::new(Token::new(0x0600_0001), "M").with_body(vec![]);
        assert!(routine.has_body());
        assert!(!routine.is_dirty());

        routine.mark_dirty();
        assert!(routine.is_dirty());
        assert!(routine.is_static());
    }
}
