//! In-place rewriting of decoded call sites.
//!
//! A decoded call site is replaced without changing the length of the instruction
//! stream, so no branch target or exception range needs to move:
//!
//! ```text
//! before                        after
//! ──────                        ─────
//! [load]  ldc.i4  0x1F40        nop
//! [call]  call    a(int32)      ldstr "decoded value"
//! ```
//!
//! The decoder pops one argument and pushes one value; `nop` + `ldstr` pushes one
//! value, so stack depth at every following instruction is unchanged.

use crate::{
    assembly::{Instruction, Routine},
    deobfuscation::scanner::CallSite,
    Result,
};

/// Applies decoded strings to the call sites of one routine.
///
/// The routine is flagged dirty by [`InstructionPatcher::finish`] once at least one
/// site was rewritten.
pub struct InstructionPatcher<'r> {
    routine: &'r mut Routine,
    patched: usize,
}

impl<'r> InstructionPatcher<'r> {
    /// Starts patching `routine`.
    pub fn new(routine: &'r mut Routine) -> Self {
        Self {
            routine,
            patched: 0,
        }
    }

    /// Replaces `site` with a load of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StaleCallSite`] and leaves the body untouched if the
    /// recorded positions no longer hold the constant load and the call.
    pub fn patch(&mut self, site: &CallSite, value: &str) -> Result<()> {
        let token = self.routine.token;
        if site.routine != token {
            return Err(stale_site_error!(
                token,
                site.call_index,
                "call site belongs to {}",
                site.routine
            ));
        }
        if site.load_index >= site.call_index {
            return Err(stale_site_error!(
                token,
                site.load_index,
                "constant load does not precede the call"
            ));
        }

        let Some(body) = self.routine.body.as_mut() else {
            return Err(stale_site_error!(token, site.call_index, "routine has no body"));
        };

        match body.get(site.load_index).and_then(Instruction::as_i32) {
            Some(constant) if constant == site.constant => {}
            _ => {
                return Err(stale_site_error!(
                    token,
                    site.load_index,
                    "expected ldc.i4 0x{:08X}",
                    site.constant
                ))
            }
        }
        if !body.get(site.call_index).is_some_and(Instruction::is_call) {
            return Err(stale_site_error!(token, site.call_index, "expected call"));
        }

        body[site.load_index] = Instruction::nop();
        body[site.call_index] = Instruction::load_string(value);
        self.patched += 1;

        Ok(())
    }

    /// Number of sites rewritten so far.
    #[must_use]
    pub fn patched(&self) -> usize {
        self.patched
    }

    /// Flags the routine dirty if anything changed and returns the patch count.
    pub fn finish(self) -> usize {
        if self.patched > 0 {
            self.routine.mark_dirty();
        }
        self.patched
    }
}
