//! Parameter-to-slot bindings for one compilation.

use super::expr::Parameter;
use crate::error::{Error, Result};

/// Variable slots bound so far, innermost last.
///
/// Slots are numbered from 1 and never reused within a scope's lifetime,
/// so nested lambdas get distinct `VAR` ids.
#[derive(Debug, Clone)]
pub struct Scope {
    bindings: Vec<(Parameter, u64)>,
    next_slot: u64,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
            next_slot: 1,
        }
    }

    /// Allocate one slot per parameter. A name already bound by an
    /// enclosing scope, or repeated in `params`, is rejected.
    pub fn bind(&mut self, params: &[Parameter]) -> Result<Vec<u64>> {
        for (i, param) in params.iter().enumerate() {
            let shadowed = self.bindings.iter().any(|(p, _)| p.name == param.name)
                || params[..i].iter().any(|p| p.name == param.name);
            if shadowed {
                return Err(Error::TranslationUnsupported(format!(
                    "parameter '{}' is already bound in an enclosing scope",
                    param.name
                )));
            }
        }

        let slots: Vec<u64> = params
            .iter()
            .map(|param| {
                let slot = self.next_slot;
                self.next_slot += 1;
                self.bindings.push((param.clone(), slot));
                slot
            })
            .collect();
        Ok(slots)
    }

    /// Drop the innermost `count` bindings. Their slots stay retired.
    pub fn unbind(&mut self, count: usize) {
        let keep = self.bindings.len().saturating_sub(count);
        self.bindings.truncate(keep);
    }

    /// Slot bound to `param`; the parameter's type must match its binding.
    pub fn slot_of(&self, param: &Parameter) -> Result<u64> {
        match self.bindings.iter().rev().find(|(p, _)| p.name == param.name) {
            Some((bound, slot)) if bound.ty == param.ty => Ok(*slot),
            Some((bound, _)) => Err(Error::TranslationUnsupported(format!(
                "parameter '{}' is bound as {} but referenced as {}",
                param.name, bound.ty, param.ty
            ))),
            None => Err(Error::TranslationUnsupported(format!(
                "parameter '{}' is not bound in this scope",
                param.name
            ))),
        }
    }

    pub fn depth(&self) -> usize {
        self.bindings.len()
    }
}
