use syn::{Expr, Lit, LitInt};

use super::Mutator;
use crate::mutant::{Mutation, MutationKind, MutationLevel};

/// Integer literal replacement: `0` -> `1`, anything else -> `0`
///
/// The literal suffix is preserved so the replacement keeps its type.
pub struct NumberLiteralMutator;

impl Mutator for NumberLiteralMutator {
    fn name(&self) -> &'static str {
        "number-literal"
    }

    fn kind(&self) -> MutationKind {
        MutationKind::Number
    }

    fn level(&self) -> MutationLevel {
        MutationLevel::Advanced
    }

    fn apply(&self, node: &Expr) -> Vec<Mutation> {
        let Expr::Lit(lit) = node else {
            return Vec::new();
        };
        let Lit::Int(int) = &lit.lit else {
            return Vec::new();
        };
        let Ok(value) = int.base10_parse::<u128>() else {
            return Vec::new();
        };
        let digits = if value == 0 { "1" } else { "0" };
        let mut mutated = lit.clone();
        mutated.lit = Lit::Int(LitInt::new(&format!("{}{}", digits, int.suffix()), int.span()));
        vec![Mutation::new(
            node,
            Expr::Lit(mutated),
            self.kind(),
            "Number mutation",
        )]
    }
}
