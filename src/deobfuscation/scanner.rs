//! Call-site discovery.
//!
//! A call site is a `Call` to a decoder preceded by the integer constant it decodes:
//!
//! ```text
//! IL_0010: ldc.i4  0x1F40          <- load_index
//! IL_0015: call    string a(int32) <- call_index
//! ```
//!
//! The constant is usually the immediate predecessor. Small amounts of stack
//! shuffling between the two are tolerated: the scanner looks back up to
//! `lookback_window` instructions for the nearest constant load, stopping early at
//! any other call or string load, which already own the values around them.

use std::fmt;

use crate::{
    assembly::{Instruction, Opcode, Routine},
    deobfuscation::{config::EngineConfig, signatures::DecoderSet, strategies::Population},
    metadata::token::Token,
};

/// A resolved load-constant / call pair inside one routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// The routine containing the pair
    pub routine: Token,
    /// Position of the `LoadConstantInt`
    pub load_index: usize,
    /// Position of the `Call`
    pub call_index: usize,
    /// The loaded constant
    pub constant: i32,
    /// The decoder called, `None` if the target cannot be named statically
    pub target: Option<Token>,
    /// Which strategy list decodes this site
    pub population: Population,
}

impl CallSite {
    /// Returns `true` if the call target could not be resolved.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        self.target.is_none()
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}..{} ldc 0x{:08X}",
            self.routine, self.load_index, self.call_index, self.constant
        )?;
        match self.target {
            Some(target) => write!(f, " -> {target}"),
            None => write!(f, " -> <indirect>"),
        }
    }
}

/// Finds decoder call sites in routine bodies.
pub struct CallSiteScanner<'a> {
    config: &'a EngineConfig,
    decoders: &'a DecoderSet,
}

impl<'a> CallSiteScanner<'a> {
    /// Creates a scanner over the given decoder set.
    #[must_use]
    pub fn new(config: &'a EngineConfig, decoders: &'a DecoderSet) -> Self {
        Self { config, decoders }
    }

    /// Returns all call sites of `routine`, in instruction order.
    ///
    /// Calls whose target is not a decoder, or with no constant load in the window,
    /// are skipped. Routines without a body yield nothing.
    #[must_use]
    pub fn scan(&self, routine: &Routine) -> Vec<CallSite> {
        let body = routine.instructions();
        let mut sites = Vec::new();

        for (call_index, instr) in body.iter().enumerate() {
            if !instr.is_call() {
                continue;
            }

            let target = instr.call_target();
            if target.is_some_and(|token| !self.decoders.contains(token)) {
                continue;
            }

            let Some((load_index, constant)) = self.find_constant(body, call_index) else {
                continue;
            };

            sites.push(CallSite {
                routine: routine.token,
                load_index,
                call_index,
                constant,
                target,
                population: self.population(target, constant),
            });
        }

        sites
    }

    /// Nearest `LoadConstantInt` within the window before `call_index`.
    fn find_constant(&self, body: &[Instruction], call_index: usize) -> Option<(usize, i32)> {
        let start = call_index.saturating_sub(self.config.lookback_window);

        for index in (start..call_index).rev() {
            let instr = &body[index];
            if let Some(constant) = instr.as_i32() {
                return Some((index, constant));
            }
            if matches!(instr.opcode, Opcode::Call | Opcode::LoadString) {
                return None;
            }
        }

        None
    }

    fn population(&self, target: Option<Token>, constant: i32) -> Population {
        let exact = target
            .and_then(|token| self.decoders.get(token))
            .is_some_and(|signature| signature.exact);

        if !exact && self.config.is_short_constant(constant) {
            Population::Short
        } else {
            Population::Full
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deobfuscation::signatures::DecoderSignature;

    const CALLER: Token = Token::new(0x0600_0010);
    const EXACT: Token = Token::new(0x0600_0001);
    const SUPERSET: Token = Token::new(0x0600_0002);
    const UNRELATED: Token = Token::new(0x0A00_0005);

    fn decoders() -> DecoderSet {
        let mut set = DecoderSet::new();
        set.insert(DecoderSignature::unknown(EXACT, true));
        set.insert(DecoderSignature::unknown(SUPERSET, false));
        set
    }

    fn scan(body: Vec<Instruction>) -> Vec<CallSite> {
        let config = EngineConfig::default();
        let set = decoders();
        let routine = Routine::new(CALLER, "Main").with_body(body);
        CallSiteScanner::new(&config, &set).scan(&routine)
    }

    #[test]
    fn test_adjacent_pair() {
        let sites = scan(vec![
            Instruction::load_int(5000),
            Instruction::call(EXACT),
            Instruction::other(),
            Instruction::ret(),
        ]);

        assert_eq!(sites.len(), 1);
        let site = &sites[0];
        assert_eq!(site.routine, CALLER);
        assert_eq!((site.load_index, site.call_index), (0, 1));
        assert_eq!(site.constant, 5000);
        assert_eq!(site.target, Some(EXACT));
        assert_eq!(site.population, Population::Full);
    }

    #[test]
    fn test_window() {
        // four instructions in between: still found
        let sites = scan(vec![
            Instruction::load_int(7000),
            Instruction::other(),
            Instruction::nop(),
            Instruction::other(),
            Instruction::nop(),
            Instruction::call(EXACT),
        ]);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].load_index, 0);

        // five in between: out of reach
        let sites = scan(vec![
            Instruction::load_int(7000),
            Instruction::other(),
            Instruction::nop(),
            Instruction::other(),
            Instruction::nop(),
            Instruction::other(),
            Instruction::call(EXACT),
        ]);
        assert!(sites.is_empty());
    }

    #[test]
    fn test_nearest_constant_wins() {
        let sites = scan(vec![
            Instruction::load_int(1111),
            Instruction::load_int(2222),
            Instruction::call(EXACT),
        ]);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].constant, 2222);
        assert_eq!(sites[0].load_index, 1);
    }

    #[test]
    fn test_window_stops_at_call_and_string() {
        let sites = scan(vec![
            Instruction::load_int(4000),
            Instruction::call(EXACT),
            Instruction::call(EXACT),
        ]);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].call_index, 1);

        let sites = scan(vec![
            Instruction::load_int(4000),
            Instruction::load_string("done"),
            Instruction::call(EXACT),
        ]);
        assert!(sites.is_empty());
    }

    #[test]
    fn test_skips_non_decoders() {
        let sites = scan(vec![
            Instruction::load_int(4000),
            Instruction::call(UNRELATED),
            Instruction::call(EXACT),
            Instruction::ret(),
        ]);
        assert!(sites.is_empty());
    }

    #[test]
    fn test_call_at_start() {
        assert!(scan(vec![Instruction::call(EXACT), Instruction::ret()]).is_empty());
        assert!(scan(Vec::new()).is_empty());
    }

    #[test]
    fn test_indirect_call_is_ambiguous() {
        let sites = scan(vec![Instruction::load_int(3000), Instruction::call_indirect()]);
        assert_eq!(sites.len(), 1);
        assert!(sites[0].is_ambiguous());
    }

    #[test]
    fn test_population() {
        let sites = scan(vec![
            Instruction::load_int(7),
            Instruction::call(EXACT),
            Instruction::load_int(7),
            Instruction::call(SUPERSET),
            Instruction::load_int(-999),
            Instruction::call(SUPERSET),
            Instruction::load_int(1000),
            Instruction::call(SUPERSET),
        ]);

        let populations: Vec<Population> = sites.iter().map(|s| s.population).collect();
        assert_eq!(
            populations,
            vec![
                Population::Full,
                Population::Short,
                Population::Short,
                Population::Full
            ]
        );
    }

    #[test]
    fn test_display() {
        let sites = scan(vec![Instruction::load_int(0x40), Instruction::call(EXACT)]);
        assert_eq!(
            sites[0].to_string(),
            "0x06000010@0..1 ldc 0x00000040 -> 0x06000001"
        );
    }
}
