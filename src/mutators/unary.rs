use syn::{Expr, UnOp};

use super::Mutator;
use crate::mutant::{Mutation, MutationKind, MutationLevel};

/// Drops a logical or arithmetic negation: `!x` -> `x`, `-x` -> `x`
pub struct UnaryOperatorMutator;

impl Mutator for UnaryOperatorMutator {
    fn name(&self) -> &'static str {
        "unary-operator"
    }

    fn kind(&self) -> MutationKind {
        MutationKind::Unary
    }

    fn level(&self) -> MutationLevel {
        MutationLevel::Standard
    }

    fn apply(&self, node: &Expr) -> Vec<Mutation> {
        let Expr::Unary(unary) = node else {
            return Vec::new();
        };
        let display_name = match unary.op {
            UnOp::Not(_) => "Negate removal",
            UnOp::Neg(_) => "Unary minus removal",
            // Removing a deref changes the type; never a useful mutant.
            _ => return Vec::new(),
        };
        vec![Mutation::new(
            node,
            (*unary.expr).clone(),
            self.kind(),
            display_name,
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote::ToTokens;

    #[test]
    fn test_removes_negation() {
        let expr: Expr = syn::parse_str("!ready").unwrap();
        let mutations = UnaryOperatorMutator.apply(&expr);
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].replacement.to_token_stream().to_string(), "ready");
    }

    #[test]
    fn test_removes_minus() {
        let expr: Expr = syn::parse_str("-offset").unwrap();
        let mutations = UnaryOperatorMutator.apply(&expr);
        assert_eq!(mutations[0].display_name, "Unary minus removal");
    }

    #[test]
    fn test_keeps_deref() {
        let expr: Expr = syn::parse_str("*ptr").unwrap();
        assert!(UnaryOperatorMutator.apply(&expr).is_empty());
    }
}
