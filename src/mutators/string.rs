use syn::{Expr, Lit, LitStr};

use super::Mutator;
use crate::mutant::{Mutation, MutationKind, MutationLevel};

/// Replaced contents for a previously empty string literal
const FILLER: &str = "mutated!";

/// `"abc"` -> `""`, `""` -> `"mutated!"`
pub struct StringLiteralMutator;

impl Mutator for StringLiteralMutator {
    fn name(&self) -> &'static str {
        "string-literal"
    }

    fn kind(&self) -> MutationKind {
        MutationKind::String
    }

    fn level(&self) -> MutationLevel {
        MutationLevel::Standard
    }

    fn apply(&self, node: &Expr) -> Vec<Mutation> {
        let Expr::Lit(lit) = node else {
            return Vec::new();
        };
        let Lit::Str(value) = &lit.lit else {
            return Vec::new();
        };
        let contents = if value.value().is_empty() { FILLER } else { "" };
        let mut mutated = lit.clone();
        mutated.lit = Lit::Str(LitStr::new(contents, value.span()));
        vec![Mutation::new(
            node,
            Expr::Lit(mutated),
            self.kind(),
            "String mutation",
        )]
    }
}

/// Rewrites the emptiness check `str::is_empty(x)` into `x != ""`.
///
/// Only the primitive `str` spelling is recognised, as a single bare path
/// segment. `String::is_empty`, `std::primitive::str::is_empty`, method call
/// syntax, and user types with an associated `is_empty` are left alone:
/// the primitive name is the only spelling that cannot be shadowed by an
/// alias resolving to something else at the call site.
pub struct StringEmptyCheckMutator;

impl StringEmptyCheckMutator {
    fn checked_argument(node: &Expr) -> Option<&Expr> {
        let Expr::Call(call) = node else {
            return None;
        };
        let Expr::Path(func) = call.func.as_ref() else {
            return None;
        };
        if func.qself.is_some() || func.path.leading_colon.is_some() {
            return None;
        }
        let segments: Vec<_> = func.path.segments.iter().collect();
        let [ty, method] = segments.as_slice() else {
            return None;
        };
        let plain = ty.arguments.is_none() && method.arguments.is_none();
        if !plain || ty.ident != "str" || method.ident != "is_empty" {
            return None;
        }
        match call.args.len() {
            1 => call.args.first(),
            _ => None,
        }
    }
}

impl Mutator for StringEmptyCheckMutator {
    fn name(&self) -> &'static str {
        "string-empty-check"
    }

    fn kind(&self) -> MutationKind {
        MutationKind::String
    }

    fn level(&self) -> MutationLevel {
        MutationLevel::Standard
    }

    fn apply(&self, node: &Expr) -> Vec<Mutation> {
        let Some(argument) = Self::checked_argument(node) else {
            return Vec::new();
        };
        let empty: Expr = syn::parse_quote!("");
        let replacement = Expr::Binary(syn::ExprBinary {
            attrs: Vec::new(),
            left: Box::new(operand(argument)),
            op: syn::BinOp::Ne(Default::default()),
            right: Box::new(empty),
        });
        vec![Mutation::new(
            node,
            replacement,
            self.kind(),
            "String mutation",
        )]
    }
}

/// Parenthesize anything that could bind looser than `!=`.
fn operand(expr: &Expr) -> Expr {
    match expr {
        Expr::Path(_)
        | Expr::Field(_)
        | Expr::Call(_)
        | Expr::MethodCall(_)
        | Expr::Lit(_)
        | Expr::Index(_)
        | Expr::Paren(_)
        | Expr::Reference(_) => expr.clone(),
        _ => Expr::Paren(syn::ExprParen {
            attrs: Vec::new(),
            paren_token: Default::default(),
            expr: Box::new(expr.clone()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote::ToTokens;

    fn parse_expr(s: &str) -> Expr {
        syn::parse_str(s).unwrap()
    }

    #[test]
    fn test_empty_check_on_primitive_str() {
        let expr = parse_expr("str::is_empty(name)");
        let mutations = StringEmptyCheckMutator.apply(&expr);
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].original, expr);
        assert_eq!(
            mutations[0].replacement.to_token_stream().to_string(),
            "name != \"\""
        );
        assert_eq!(mutations[0].kind, MutationKind::String);
    }

    #[test]
    fn test_empty_check_ignores_owned_string_type() {
        assert!(StringEmptyCheckMutator
            .apply(&parse_expr("String::is_empty(name)"))
            .is_empty());
    }

    #[test]
    fn test_empty_check_ignores_user_type() {
        assert!(StringEmptyCheckMutator
            .apply(&parse_expr("Str::is_empty(name)"))
            .is_empty());
        assert!(StringEmptyCheckMutator
            .apply(&parse_expr("text::str::is_empty(name)"))
            .is_empty());
    }

    #[test]
    fn test_empty_check_ignores_method_syntax_and_other_calls() {
        assert!(StringEmptyCheckMutator
            .apply(&parse_expr("name.is_empty()"))
            .is_empty());
        assert!(StringEmptyCheckMutator
            .apply(&parse_expr("str::len(name)"))
            .is_empty());
    }

    #[test]
    fn test_empty_check_wraps_complex_argument() {
        let mutations = StringEmptyCheckMutator.apply(&parse_expr("str::is_empty(&*owned)"));
        assert_eq!(
            mutations[0].replacement.to_token_stream().to_string(),
            "& * owned != \"\""
        );
        let mutations = StringEmptyCheckMutator.apply(&parse_expr("str::is_empty(a.b().c)"));
        assert_eq!(
            mutations[0].replacement.to_token_stream().to_string(),
            "a . b () . c != \"\""
        );
    }

    #[test]
    fn test_string_literal_emptied() {
        let mutations = StringLiteralMutator.apply(&parse_expr("\"hello\""));
        assert_eq!(mutations[0].replacement.to_token_stream().to_string(), "\"\"");
    }

    #[test]
    fn test_empty_string_literal_filled() {
        let mutations = StringLiteralMutator.apply(&parse_expr("\"\""));
        assert_eq!(
            mutations[0].replacement.to_token_stream().to_string(),
            "\"mutated!\""
        );
    }

    #[test]
    fn test_string_literal_ignores_byte_strings() {
        assert!(StringLiteralMutator.apply(&parse_expr("b\"raw\"")).is_empty());
    }
}
