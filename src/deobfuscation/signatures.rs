//! Decoder routine identification and classification.
//!
//! A decoder turns an integer key into a string. Candidates are found by signature:
//!
//! - **Exact pool**: `(int32) -> string`
//! - **Superset pool**: `(int32) -> <any value>`; obfuscated decoders often hide their
//!   real return type behind `object` or `char`
//!
//! Each candidate's own body is then classified into a [`DecoderShape`]:
//!
//! ```text
//! Linear                      Table                           Unknown
//! ──────                      ─────                           ───────
//! ldarg.0                     ldsfld   uint8[] <blob>         anything else
//! ldc.i4   0x5F3A             ldarg.0
//! xor                         call     Encoding::GetString
//! (ldc.i4 k; op)*             ret
//! ...
//! ```
//!
//! When neither pool has a member the set switches to fallback mode, in which every
//! routine that could stand in for a decoder without disturbing stack depth is a target.

use std::collections::HashMap;

use crate::{
    assembly::{ArithOp, Instruction, ModuleProvider, Opcode, Operand, Routine},
    deobfuscation::config::EngineConfig,
    metadata::token::Token,
};

/// An ordered chain of `(operator, constant)` steps applied to the decoder argument.
///
/// # Example
///
/// ```rust
/// use stringscope::assembly::ArithOp;
/// use stringscope::deobfuscation::LinearTransform;
///
/// let transform = LinearTransform::new(vec![(ArithOp::Mul, 4), (ArithOp::Xor, 0x10)]);
/// assert_eq!(transform.apply(3), (3 * 4) ^ 0x10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearTransform {
    steps: Vec<(ArithOp, i32)>,
}

impl LinearTransform {
    /// Creates a transform from its steps.
    #[must_use]
    pub fn new(steps: Vec<(ArithOp, i32)>) -> Self {
        Self { steps }
    }

    /// Creates a single-step transform.
    #[must_use]
    pub fn single(op: ArithOp, constant: i32) -> Self {
        Self::new(vec![(op, constant)])
    }

    /// The steps in application order.
    #[must_use]
    pub fn steps(&self) -> &[(ArithOp, i32)] {
        &self.steps
    }

    /// Applies every step to `value` with 32-bit wraparound.
    #[must_use]
    pub fn apply(&self, value: i32) -> i32 {
        self.steps
            .iter()
            .fold(value, |acc, &(op, constant)| op.apply(acc, constant))
    }
}

/// How a decoder routine turns its argument into a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderShape {
    /// Scalar transform of the argument with embedded constants.
    Linear(LinearTransform),
    /// Lookup into a static byte buffer through a "get string" style call.
    Table {
        /// The data slot the body loads
        slot: Token,
    },
    /// Neither shape matched; only brute-force strategies apply.
    Unknown,
}

/// Identity and classification of a candidate decoder routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderSignature {
    /// The decoder routine
    pub routine: Token,
    /// The decoder's name, for diagnostics
    pub name: String,
    /// `true` for an exact `(int32) -> string` signature
    pub exact: bool,
    /// Classified body shape
    pub shape: DecoderShape,
}

impl DecoderSignature {
    /// Creates an unclassified signature.
    #[must_use]
    pub fn unknown(routine: Token, exact: bool) -> Self {
        Self {
            routine,
            name: String::new(),
            exact,
            shape: DecoderShape::Unknown,
        }
    }

    /// Returns the linear transform, if the decoder has one.
    #[must_use]
    pub fn transform(&self) -> Option<&LinearTransform> {
        match &self.shape {
            DecoderShape::Linear(transform) => Some(transform),
            _ => None,
        }
    }
}

/// The decoder pool of one module: a read-only map from routine to signature.
#[derive(Debug, Clone, Default)]
pub struct DecoderSet {
    decoders: HashMap<Token, DecoderSignature>,
    fallback: bool,
}

impl DecoderSet {
    /// Creates an empty, non-fallback set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a decoder.
    pub fn insert(&mut self, signature: DecoderSignature) {
        self.decoders.insert(signature.routine, signature);
    }

    /// Returns the signature for a call target.
    #[must_use]
    pub fn get(&self, token: Token) -> Option<&DecoderSignature> {
        self.decoders.get(&token)
    }

    /// Returns `true` if `token` is a decoder.
    #[must_use]
    pub fn contains(&self, token: Token) -> bool {
        self.decoders.contains_key(&token)
    }

    /// Returns `true` if no decoder matched by signature and targets were widened.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Number of decoders (or fallback targets).
    #[must_use]
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Returns `true` if the set has no targets at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Iterates over all signatures.
    pub fn iter(&self) -> impl Iterator<Item = &DecoderSignature> {
        self.decoders.values()
    }
}

/// Finds decoder routines and classifies their bodies.
pub struct SignatureMatcher<'a> {
    config: &'a EngineConfig,
}

impl<'a> SignatureMatcher<'a> {
    /// Creates a matcher using the decode-call names of `config`.
    #[must_use]
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Builds the decoder set of a module.
    pub fn analyze<M: ModuleProvider + ?Sized>(&self, module: &M) -> DecoderSet {
        let mut set = DecoderSet::new();

        for routine in module.routines() {
            // instance routines also pop `this`
            if !routine.is_static() {
                continue;
            }
            let Some(signature) = &routine.signature else {
                continue;
            };
            if !signature.takes_single_int() || !signature.returns_value() {
                continue;
            }

            let shape = self.classify(routine, module);
            log::debug!(
                "decoder candidate {} '{}' ({}): {:?}",
                routine.token,
                routine.name,
                if signature.is_exact_decoder() {
                    "exact"
                } else {
                    "superset"
                },
                shape
            );

            set.insert(DecoderSignature {
                routine: routine.token,
                name: routine.name.clone(),
                exact: signature.is_exact_decoder(),
                shape,
            });
        }

        if set.is_empty() {
            set.fallback = true;
            for routine in module.routines().iter().filter(|r| r.is_static()) {
                let stack_neutral = routine.signature.as_ref().is_none_or(|sig| {
                    let behavior = sig.call_behavior();
                    behavior.pops == 1 && behavior.pushes == 1
                });
                if stack_neutral {
                    set.insert(DecoderSignature {
                        routine: routine.token,
                        name: routine.name.clone(),
                        exact: false,
                        shape: DecoderShape::Unknown,
                    });
                }
            }
            log::debug!(
                "no decoder signature matched, falling back to {} call targets",
                set.len()
            );
        }

        set
    }

    /// Classifies one routine body.
    pub fn classify<M: ModuleProvider + ?Sized>(
        &self,
        routine: &Routine,
        module: &M,
    ) -> DecoderShape {
        let body = routine.instructions();

        if let Some(transform) = match_linear(body) {
            return DecoderShape::Linear(transform);
        }

        if let Some(slot) = self.match_table(body, module) {
            return DecoderShape::Table { slot };
        }

        DecoderShape::Unknown
    }

    fn match_table<M: ModuleProvider + ?Sized>(
        &self,
        body: &[Instruction],
        module: &M,
    ) -> Option<Token> {
        let slot = body.iter().find_map(|instr| {
            let field = match (&instr.opcode, &instr.operand) {
                (Opcode::LoadStaticField, Operand::Member(field)) => *field,
                _ => return None,
            };
            module
                .data_slots()
                .iter()
                .any(|slot| slot.token == field)
                .then_some(field)
        })?;

        let calls_decode = body.iter().filter_map(Instruction::call_target).any(|target| {
            member_name(module, target).is_some_and(|name| self.config.is_decode_call_name(name))
        });

        calls_decode.then_some(slot)
    }
}

fn member_name<M: ModuleProvider + ?Sized>(module: &M, token: Token) -> Option<&str> {
    module
        .routines()
        .iter()
        .find(|routine| routine.token == token)
        .map(|routine| routine.name.as_str())
        .or_else(|| module.member_name(token))
}

fn is_arg0(instr: &Instruction) -> bool {
    instr.opcode == Opcode::LoadArg && instr.operand == Operand::Arg(0)
}

fn arith_op(instr: &Instruction) -> Option<ArithOp> {
    match instr.opcode {
        Opcode::Arith(op) => Some(op),
        _ => None,
    }
}

/// Matches `ldarg.0 (ldc.i4 k; op)+` at the start of a body (nops ignored).
///
/// The first step also accepts `ldc.i4 k; ldarg.0; op` for commutative operators.
/// The rest of the body must not contain further constants or arithmetic, otherwise
/// the extracted chain would not describe the whole computation.
fn match_linear(body: &[Instruction]) -> Option<LinearTransform> {
    let code: Vec<&Instruction> = body
        .iter()
        .filter(|instr| instr.opcode != Opcode::Nop)
        .collect();

    let mut steps = Vec::new();
    let mut pos = match code.as_slice() {
        [a, b, c, ..] if is_arg0(a) && b.is_load_constant_int() => {
            steps.push((arith_op(c)?, b.as_i32()?));
            3
        }
        [a, b, c, ..] if a.is_load_constant_int() && is_arg0(b) => {
            let op = arith_op(c)?;
            if op == ArithOp::Sub {
                return None;
            }
            steps.push((op, a.as_i32()?));
            3
        }
        _ => return None,
    };

    while let [k, op, ..] = &code[pos..] {
        let (Some(constant), Some(op)) = (k.as_i32(), arith_op(op)) else {
            break;
        };
        steps.push((op, constant));
        pos += 2;
    }

    let rest_is_plain = code[pos..]
        .iter()
        .all(|instr| !instr.is_load_constant_int() && arith_op(instr).is_none());

    rest_is_plain.then(|| LinearTransform::new(steps))
}
