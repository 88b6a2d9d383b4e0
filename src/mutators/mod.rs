//! Pattern mutators and the registry that holds them
//!
//! Each mutator inspects one expression node and proposes zero or more
//! replacements. Mutators are pure: the same node always yields the same
//! mutations, and they never coordinate with each other. Two mutators firing
//! on the same node produce two independent mutants.

mod boolean;
mod method;
mod number;
mod operators;
mod string;
mod unary;

pub use boolean::BooleanLiteralMutator;
pub use method::MethodSwapMutator;
pub use number::NumberLiteralMutator;
pub use operators::{
    ArithmeticOperatorMutator, BitwiseOperatorMutator, CompoundAssignmentMutator,
    EqualityOperatorMutator, LogicalOperatorMutator,
};
pub use string::{StringEmptyCheckMutator, StringLiteralMutator};
pub use unary::UnaryOperatorMutator;

use std::collections::BTreeSet;

use crate::mutant::{Mutation, MutationKind, MutationLevel};

/// A single mutation strategy.
///
/// `kind` and `level` are static metadata. `apply` must check applicability
/// itself and return an empty vector for nodes it does not handle; every
/// returned [`Mutation`] has `original == *node`.
pub trait Mutator: Send + Sync {
    fn name(&self) -> &'static str;
    fn kind(&self) -> MutationKind;
    fn level(&self) -> MutationLevel;
    fn apply(&self, node: &syn::Expr) -> Vec<Mutation>;
}

/// Catalog of available mutators
pub struct MutatorRegistry {
    mutators: Vec<Box<dyn Mutator>>,
}

impl MutatorRegistry {
    /// Every built-in mutator, in a fixed order. The order decides the id
    /// order of mutants sharing a node.
    pub fn standard() -> Self {
        Self::with_mutators(vec![
            Box::new(BooleanLiteralMutator),
            Box::new(ArithmeticOperatorMutator),
            Box::new(EqualityOperatorMutator),
            Box::new(LogicalOperatorMutator),
            Box::new(UnaryOperatorMutator),
            Box::new(BitwiseOperatorMutator),
            Box::new(StringLiteralMutator),
            Box::new(StringEmptyCheckMutator),
            Box::new(NumberLiteralMutator),
            Box::new(CompoundAssignmentMutator),
            Box::new(MethodSwapMutator),
        ])
    }

    pub fn with_mutators(mutators: Vec<Box<dyn Mutator>>) -> Self {
        Self { mutators }
    }

    pub fn all(&self) -> impl Iterator<Item = &dyn Mutator> {
        self.mutators.iter().map(|m| m.as_ref())
    }

    /// Mutators active at `level` whose kind is enabled
    pub fn enabled<'a>(
        &'a self,
        level: MutationLevel,
        kinds: &'a BTreeSet<MutationKind>,
    ) -> impl Iterator<Item = &'a dyn Mutator> + 'a {
        self.all()
            .filter(move |m| m.level() <= level && kinds.contains(&m.kind()))
    }
}

impl Default for MutatorRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
