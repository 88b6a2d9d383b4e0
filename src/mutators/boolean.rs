use syn::{Expr, Lit};

use super::Mutator;
use crate::mutant::{Mutation, MutationKind, MutationLevel};

/// `true` <-> `false`
pub struct BooleanLiteralMutator;

impl Mutator for BooleanLiteralMutator {
    fn name(&self) -> &'static str {
        "boolean-literal"
    }

    fn kind(&self) -> MutationKind {
        MutationKind::Boolean
    }

    fn level(&self) -> MutationLevel {
        MutationLevel::Basic
    }

    fn apply(&self, node: &Expr) -> Vec<Mutation> {
        let Expr::Lit(lit) = node else {
            return Vec::new();
        };
        let Lit::Bool(value) = &lit.lit else {
            return Vec::new();
        };
        let mut flipped = lit.clone();
        flipped.lit = Lit::Bool(syn::LitBool::new(!value.value, value.span));
        vec![Mutation::new(
            node,
            Expr::Lit(flipped),
            self.kind(),
            "Boolean mutation",
        )]
    }
}
