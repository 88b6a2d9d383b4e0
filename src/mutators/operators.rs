//! Binary operator swaps

use syn::{BinOp, Expr};

use super::Mutator;
use crate::mutant::{Mutation, MutationKind, MutationLevel};

/// Rebuild `node` with each operator in `replacements`.
fn swap_operator(
    node: &Expr,
    replacements: &[BinOp],
    kind: MutationKind,
    display_name: &str,
) -> Vec<Mutation> {
    let Expr::Binary(binary) = node else {
        return Vec::new();
    };
    replacements
        .iter()
        .map(|op| {
            let mut mutated = binary.clone();
            mutated.op = *op;
            Mutation::new(node, Expr::Binary(mutated), kind, display_name)
        })
        .collect()
}

fn binary_op(node: &Expr) -> Option<&BinOp> {
    match node {
        Expr::Binary(binary) => Some(&binary.op),
        _ => None,
    }
}

/// `+` <-> `-`, `*` <-> `/`, `%` -> `*`
pub struct ArithmeticOperatorMutator;

impl Mutator for ArithmeticOperatorMutator {
    fn name(&self) -> &'static str {
        "arithmetic-operator"
    }

    fn kind(&self) -> MutationKind {
        MutationKind::Arithmetic
    }

    fn level(&self) -> MutationLevel {
        MutationLevel::Basic
    }

    fn apply(&self, node: &Expr) -> Vec<Mutation> {
        let replacements = match binary_op(node) {
            Some(BinOp::Add(_)) => vec![BinOp::Sub(Default::default())],
            Some(BinOp::Sub(_)) => vec![BinOp::Add(Default::default())],
            Some(BinOp::Mul(_)) => vec![BinOp::Div(Default::default())],
            Some(BinOp::Div(_)) => vec![BinOp::Mul(Default::default())],
            Some(BinOp::Rem(_)) => vec![BinOp::Mul(Default::default())],
            _ => return Vec::new(),
        };
        swap_operator(node, &replacements, self.kind(), "Arithmetic mutation")
    }
}

/// Equality negation and relational boundary shifts
pub struct EqualityOperatorMutator;

impl Mutator for EqualityOperatorMutator {
    fn name(&self) -> &'static str {
        "equality-operator"
    }

    fn kind(&self) -> MutationKind {
        MutationKind::Equality
    }

    fn level(&self) -> MutationLevel {
        MutationLevel::Basic
    }

    fn apply(&self, node: &Expr) -> Vec<Mutation> {
        let replacements = match binary_op(node) {
            Some(BinOp::Eq(_)) => vec![BinOp::Ne(Default::default())],
            Some(BinOp::Ne(_)) => vec![BinOp::Eq(Default::default())],
            Some(BinOp::Lt(_)) => vec![BinOp::Le(Default::default()), BinOp::Ge(Default::default())],
            Some(BinOp::Le(_)) => vec![BinOp::Lt(Default::default()), BinOp::Gt(Default::default())],
            Some(BinOp::Gt(_)) => vec![BinOp::Ge(Default::default()), BinOp::Le(Default::default())],
            Some(BinOp::Ge(_)) => vec![BinOp::Gt(Default::default()), BinOp::Lt(Default::default())],
            _ => return Vec::new(),
        };
        swap_operator(node, &replacements, self.kind(), "Equality mutation")
    }
}

/// `&&` <-> `||`
pub struct LogicalOperatorMutator;

impl Mutator for LogicalOperatorMutator {
    fn name(&self) -> &'static str {
        "logical-operator"
    }

    fn kind(&self) -> MutationKind {
        MutationKind::Logical
    }

    fn level(&self) -> MutationLevel {
        MutationLevel::Basic
    }

    fn apply(&self, node: &Expr) -> Vec<Mutation> {
        let replacements = match binary_op(node) {
            Some(BinOp::And(_)) => vec![BinOp::Or(Default::default())],
            Some(BinOp::Or(_)) => vec![BinOp::And(Default::default())],
            _ => return Vec::new(),
        };
        swap_operator(node, &replacements, self.kind(), "Logical mutation")
    }
}

/// `&` <-> `|`, `^` -> `&`, `<<` <-> `>>`
pub struct BitwiseOperatorMutator;

impl Mutator for BitwiseOperatorMutator {
    fn name(&self) -> &'static str {
        "bitwise-operator"
    }

    fn kind(&self) -> MutationKind {
        MutationKind::Bitwise
    }

    fn level(&self) -> MutationLevel {
        MutationLevel::Standard
    }

    fn apply(&self, node: &Expr) -> Vec<Mutation> {
        let replacements = match binary_op(node) {
            Some(BinOp::BitAnd(_)) => vec![BinOp::BitOr(Default::default())],
            Some(BinOp::BitOr(_)) => vec![BinOp::BitAnd(Default::default())],
            Some(BinOp::BitXor(_)) => vec![BinOp::BitAnd(Default::default())],
            Some(BinOp::Shl(_)) => vec![BinOp::Shr(Default::default())],
            Some(BinOp::Shr(_)) => vec![BinOp::Shl(Default::default())],
            _ => return Vec::new(),
        };
        swap_operator(node, &replacements, self.kind(), "Bitwise mutation")
    }
}

/// Compound assignment swaps (`+=` <-> `-=`, ...)
pub struct CompoundAssignmentMutator;

impl Mutator for CompoundAssignmentMutator {
    fn name(&self) -> &'static str {
        "compound-assignment"
    }

    fn kind(&self) -> MutationKind {
        MutationKind::Assignment
    }

    fn level(&self) -> MutationLevel {
        MutationLevel::Advanced
    }

    fn apply(&self, node: &Expr) -> Vec<Mutation> {
        let replacements = match binary_op(node) {
            Some(BinOp::AddAssign(_)) => vec![BinOp::SubAssign(Default::default())],
            Some(BinOp::SubAssign(_)) => vec![BinOp::AddAssign(Default::default())],
            Some(BinOp::MulAssign(_)) => vec![BinOp::DivAssign(Default::default())],
            Some(BinOp::DivAssign(_)) => vec![BinOp::MulAssign(Default::default())],
            Some(BinOp::RemAssign(_)) => vec![BinOp::MulAssign(Default::default())],
            Some(BinOp::BitAndAssign(_)) => vec![BinOp::BitOrAssign(Default::default())],
            Some(BinOp::BitOrAssign(_)) => vec![BinOp::BitAndAssign(Default::default())],
            Some(BinOp::ShlAssign(_)) => vec![BinOp::ShrAssign(Default::default())],
            Some(BinOp::ShrAssign(_)) => vec![BinOp::ShlAssign(Default::default())],
            _ => return Vec::new(),
        };
        swap_operator(node, &replacements, self.kind(), "Assignment mutation")
    }
}
