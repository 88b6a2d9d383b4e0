use syn::Expr;

use super::Mutator;
use crate::mutant::{Mutation, MutationKind, MutationLevel};

/// Method pairs sharing a signature on the standard types that define them
const SWAPS: &[(&str, &str)] = &[
    ("is_some", "is_none"),
    ("is_ok", "is_err"),
    ("min", "max"),
    ("first", "last"),
    ("any", "all"),
    ("starts_with", "ends_with"),
    ("to_uppercase", "to_lowercase"),
    ("trim_start", "trim_end"),
    ("skip", "take"),
];

fn counterpart(method: &str) -> Option<&'static str> {
    SWAPS.iter().find_map(|&(a, b)| {
        if a == method {
            Some(b)
        } else if b == method {
            Some(a)
        } else {
            None
        }
    })
}

/// Swaps a method call for its mirror image (`first()` -> `last()`, ...)
pub struct MethodSwapMutator;

impl Mutator for MethodSwapMutator {
    fn name(&self) -> &'static str {
        "method-swap"
    }

    fn kind(&self) -> MutationKind {
        MutationKind::Method
    }

    fn level(&self) -> MutationLevel {
        MutationLevel::Complete
    }

    fn apply(&self, node: &Expr) -> Vec<Mutation> {
        let Expr::MethodCall(call) = node else {
            return Vec::new();
        };
        let Some(swapped) = counterpart(&call.method.to_string()) else {
            return Vec::new();
        };
        let mut mutated = call.clone();
        mutated.method = syn::Ident::new(swapped, call.method.span());
        vec![Mutation::new(
            node,
            Expr::MethodCall(mutated),
            self.kind(),
            format!("Method mutation ({}() to {}())", call.method, swapped),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote::ToTokens;

    #[test]
    fn test_swaps_in_both_directions() {
        let expr: Expr = syn::parse_str("items.first()").unwrap();
        let mutations = MethodSwapMutator.apply(&expr);
        assert_eq!(mutations[0].replacement.to_token_stream().to_string(), "items . last ()");

        let expr: Expr = syn::parse_str("result.is_err()").unwrap();
        let mutations = MethodSwapMutator.apply(&expr);
        assert_eq!(mutations[0].display_name, "Method mutation (is_err() to is_ok())");
    }

    #[test]
    fn test_keeps_arguments() {
        let expr: Expr = syn::parse_str("path.starts_with(prefix)").unwrap();
        let mutations = MethodSwapMutator.apply(&expr);
        assert_eq!(
            mutations[0].replacement.to_token_stream().to_string(),
            "path . ends_with (prefix)"
        );
    }

    #[test]
    fn test_ignores_unknown_methods() {
        let expr: Expr = syn::parse_str("items.len()").unwrap();
        assert!(MethodSwapMutator.apply(&expr).is_empty());
    }
}
