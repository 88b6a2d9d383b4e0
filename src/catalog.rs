//! Mutant catalog construction
//!
//! Walks a compilation unit once, in pre-order, offering every runtime
//! expression to every enabled mutator. Identifiers are handed out in
//! traversal order, so two builds of the same tree with the same options
//! produce the same ids.

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use syn::visit::Visit;

use crate::error::MutationError;
use crate::mutant::{IdAllocator, Mutant, MutationKind, MutationLevel, SourceSpan};
use crate::mutators::{Mutator, MutatorRegistry};

/// Which mutants a catalog build accepts
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    pub level: MutationLevel,
    pub kinds: BTreeSet<MutationKind>,
    /// Regions of this compilation unit that must not be mutated
    pub excluded: Vec<SourceSpan>,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            level: MutationLevel::default(),
            kinds: MutationKind::ALL.into_iter().collect(),
            excluded: Vec::new(),
        }
    }
}

/// Builds mutants for compilation units using a registry of mutators
pub struct CatalogBuilder<'r> {
    registry: &'r MutatorRegistry,
}

impl<'r> CatalogBuilder<'r> {
    pub fn new(registry: &'r MutatorRegistry) -> Self {
        Self { registry }
    }

    /// Catalog one compilation unit, continuing the id sequence in `ids`.
    pub fn build(
        &self,
        file: &Path,
        tree: &syn::File,
        options: &CatalogOptions,
        ids: &mut IdAllocator,
    ) -> Vec<Mutant> {
        let mut walker = CatalogWalker {
            mutators: self.registry.enabled(options.level, &options.kinds).collect(),
            excluded: &options.excluded,
            file: file.to_path_buf(),
            ids,
            mutants: Vec::new(),
        };
        walker.visit_file(tree);
        tracing::debug!(
            "{}: {} mutant(s) cataloged",
            file.display(),
            walker.mutants.len()
        );
        walker.mutants
    }
}

struct CatalogWalker<'a> {
    mutators: Vec<&'a dyn Mutator>,
    excluded: &'a [SourceSpan],
    file: PathBuf,
    ids: &'a mut IdAllocator,
    mutants: Vec<Mutant>,
}

impl CatalogWalker<'_> {
    fn is_excluded(&self, span: &SourceSpan) -> bool {
        self.excluded.iter().any(|region| region.intersects(span))
    }

    fn mutate(&mut self, expr: &syn::Expr) {
        let span = SourceSpan::of(expr);
        if self.is_excluded(&span) {
            return;
        }
        for mutator in &self.mutators {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| mutator.apply(expr)));
            let mutations = match outcome {
                Ok(mutations) => mutations,
                Err(payload) => {
                    let err = MutationError::MutatorInternal {
                        mutator: mutator.name(),
                        file: self.file.clone(),
                        line: span.start.line,
                        reason: panic_message(payload.as_ref()),
                    };
                    tracing::warn!("{}", err);
                    continue;
                }
            };
            for mutation in mutations {
                if mutation.original != *expr {
                    let err = MutationError::MutatorInternal {
                        mutator: mutator.name(),
                        file: self.file.clone(),
                        line: span.start.line,
                        reason: "mutation does not originate from the visited node".to_string(),
                    };
                    tracing::warn!("{}", err);
                    continue;
                }
                let id = self.ids.next_id();
                self.mutants.push(Mutant::new(id, self.file.clone(), mutation));
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "mutator panicked".to_string()
    }
}

/// `#[test]`, `#[tokio::test]`, `#[cfg(test)]` and friends
fn is_test_code(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|attr| {
        let path = attr.path();
        if path.segments.last().is_some_and(|s| s.ident == "test") {
            return true;
        }
        if !path.is_ident("cfg") {
            return false;
        }
        match &attr.meta {
            syn::Meta::List(list) => list
                .tokens
                .to_string()
                .split(|c: char| !c.is_alphanumeric() && c != '_')
                .any(|word| word == "test"),
            _ => false,
        }
    })
}

// Selector calls are runtime calls: everything evaluated at compile time, and
// everything that is not an expression in value position, is left alone.
impl<'ast> Visit<'ast> for CatalogWalker<'_> {
    fn visit_expr(&mut self, expr: &'ast syn::Expr) {
        match expr {
            syn::Expr::Const(_) => return,
            syn::Expr::Repeat(repeat) => {
                self.mutate(expr);
                self.visit_expr(&repeat.expr);
                return;
            }
            _ => {}
        }
        self.mutate(expr);
        syn::visit::visit_expr(self, expr);
    }

    fn visit_item_fn(&mut self, func: &'ast syn::ItemFn) {
        if func.sig.constness.is_some() || is_test_code(&func.attrs) {
            return;
        }
        syn::visit::visit_item_fn(self, func);
    }

    fn visit_impl_item_fn(&mut self, func: &'ast syn::ImplItemFn) {
        if func.sig.constness.is_some() || is_test_code(&func.attrs) {
            return;
        }
        syn::visit::visit_impl_item_fn(self, func);
    }

    fn visit_trait_item_fn(&mut self, func: &'ast syn::TraitItemFn) {
        if func.sig.constness.is_some() {
            return;
        }
        syn::visit::visit_trait_item_fn(self, func);
    }

    fn visit_item_mod(&mut self, module: &'ast syn::ItemMod) {
        if is_test_code(&module.attrs) {
            return;
        }
        syn::visit::visit_item_mod(self, module);
    }

    fn visit_item_impl(&mut self, item: &'ast syn::ItemImpl) {
        if is_test_code(&item.attrs) {
            return;
        }
        syn::visit::visit_item_impl(self, item);
    }

    fn visit_item_const(&mut self, _: &'ast syn::ItemConst) {}

    fn visit_item_static(&mut self, _: &'ast syn::ItemStatic) {}

    fn visit_impl_item_const(&mut self, _: &'ast syn::ImplItemConst) {}

    fn visit_trait_item_const(&mut self, _: &'ast syn::TraitItemConst) {}

    fn visit_variant(&mut self, _: &'ast syn::Variant) {}

    fn visit_pat(&mut self, _: &'ast syn::Pat) {}

    fn visit_type(&mut self, _: &'ast syn::Type) {}

    fn visit_generics(&mut self, _: &'ast syn::Generics) {}

    fn visit_generic_argument(&mut self, _: &'ast syn::GenericArgument) {}

    fn visit_attribute(&mut self, _: &'ast syn::Attribute) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutant::{Mutation, MutantId};
    use pretty_assertions::assert_eq;

    const SOURCE: &str = r#"
fn is_adult(age: u32) -> bool {
    age >= 18 && true
}

fn total(a: i32, b: i32) -> i32 {
    a + b
}
"#;

    fn build(source: &str, options: &CatalogOptions) -> Vec<Mutant> {
        let registry = MutatorRegistry::standard();
        let tree = syn::parse_file(source).unwrap();
        let mut ids = IdAllocator::new();
        CatalogBuilder::new(&registry).build(Path::new("src/lib.rs"), &tree, options, &mut ids)
    }

    fn summary(mutants: &[Mutant]) -> Vec<(u64, String)> {
        mutants
            .iter()
            .map(|m| (m.id.0, m.mutation.display_name.clone()))
            .collect()
    }

    #[test]
    fn test_ids_follow_preorder_traversal() {
        let mutants = build(SOURCE, &CatalogOptions::default());
        assert_eq!(
            summary(&mutants),
            vec![
                (1, "Logical mutation".to_string()),
                (2, "Equality mutation".to_string()),
                (3, "Equality mutation".to_string()),
                (4, "Boolean mutation".to_string()),
                (5, "Arithmetic mutation".to_string()),
            ]
        );
        assert!(mutants.iter().all(|m| m.status == crate::mutant::MutantStatus::Pending));
    }

    #[test]
    fn test_ids_are_stable_across_builds() {
        let first = build(SOURCE, &CatalogOptions::default());
        let second = build(SOURCE, &CatalogOptions::default());
        assert_eq!(summary(&first), summary(&second));
        let spans: Vec<_> = first.iter().map(|m| m.mutation.span).collect();
        let again: Vec<_> = second.iter().map(|m| m.mutation.span).collect();
        assert_eq!(spans, again);
    }

    #[test]
    fn test_ids_continue_across_units() {
        let registry = MutatorRegistry::standard();
        let builder = CatalogBuilder::new(&registry);
        let tree = syn::parse_file(SOURCE).unwrap();
        let mut ids = IdAllocator::new();
        let options = CatalogOptions::default();
        let first = builder.build(Path::new("src/a.rs"), &tree, &options, &mut ids);
        let second = builder.build(Path::new("src/b.rs"), &tree, &options, &mut ids);
        assert_eq!(first.last().unwrap().id, MutantId(5));
        assert_eq!(second.first().unwrap().id, MutantId(6));
    }

    #[test]
    fn test_higher_level_is_superset() {
        let source = r#"
fn step(count: &mut u32, items: &[u32]) -> bool {
    *count += 1;
    !items.is_empty() && items.first().is_some()
}
"#;
        let mut previous: Vec<(String, String)> = Vec::new();
        for level in [
            MutationLevel::Basic,
            MutationLevel::Standard,
            MutationLevel::Advanced,
            MutationLevel::Complete,
        ] {
            let options = CatalogOptions {
                level,
                ..CatalogOptions::default()
            };
            let current: Vec<(String, String)> = build(source, &options)
                .iter()
                .map(|m| (m.mutation.span.to_string(), m.mutation.display_name.clone()))
                .collect();
            for entry in &previous {
                assert!(current.contains(entry), "{:?} lost at {:?}", entry, level);
            }
            previous = current;
        }
        assert!(previous.len() > 3);
    }

    #[test]
    fn test_excluded_region_is_skipped() {
        let options = CatalogOptions {
            excluded: vec![SourceSpan::lines(2, 4)],
            ..CatalogOptions::default()
        };
        let mutants = build(SOURCE, &options);
        assert_eq!(summary(&mutants), vec![(1, "Arithmetic mutation".to_string())]);
    }

    #[test]
    fn test_kind_filter() {
        let options = CatalogOptions {
            kinds: [MutationKind::Boolean].into_iter().collect(),
            ..CatalogOptions::default()
        };
        let mutants = build(SOURCE, &options);
        assert_eq!(summary(&mutants), vec![(1, "Boolean mutation".to_string())]);
    }

    #[test]
    fn test_compile_time_positions_are_skipped() {
        let source = r#"
const LIMIT: u32 = 1 + 2;
static NAME: &str = "name";

enum Flag {
    On = 1,
}

const fn doubled(x: u32) -> u32 {
    x * 2
}

fn run(values: [u8; 4 + 1]) -> [bool; 2] {
    match values[0] {
        0..=9 => {}
        _ => {}
    }
    [true; 2]
}

#[cfg(test)]
mod tests {
    fn helper() -> bool {
        1 == 1
    }
}

#[test]
fn check() {
    assert!(1 + 1 == 2);
}
"#;
        let options = CatalogOptions {
            level: MutationLevel::Complete,
            ..CatalogOptions::default()
        };
        let mutants = build(source, &options);
        let names: Vec<_> = mutants.iter().map(|m| m.mutation.display_name.as_str()).collect();
        // `values[0]` index literal and the `true` in the repeat expression
        assert_eq!(names, vec!["Number mutation", "Boolean mutation"]);
    }

    struct PanickingMutator;

    impl Mutator for PanickingMutator {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn kind(&self) -> MutationKind {
            MutationKind::Arithmetic
        }

        fn level(&self) -> MutationLevel {
            MutationLevel::Basic
        }

        fn apply(&self, _: &syn::Expr) -> Vec<Mutation> {
            panic!("broken pattern")
        }
    }

    struct MisattributingMutator;

    impl Mutator for MisattributingMutator {
        fn name(&self) -> &'static str {
            "misattributing"
        }

        fn kind(&self) -> MutationKind {
            MutationKind::Number
        }

        fn level(&self) -> MutationLevel {
            MutationLevel::Basic
        }

        fn apply(&self, node: &syn::Expr) -> Vec<Mutation> {
            let other: syn::Expr = syn::parse_quote!(unrelated);
            vec![Mutation::new(&other, node.clone(), self.kind(), "bogus")]
        }
    }

    #[test]
    fn test_failing_mutator_does_not_abort_catalog() {
        let registry = MutatorRegistry::with_mutators(vec![
            Box::new(PanickingMutator),
            Box::new(MisattributingMutator),
            Box::new(crate::mutators::BooleanLiteralMutator),
        ]);
        let tree = syn::parse_file(SOURCE).unwrap();
        let mut ids = IdAllocator::new();
        let mutants = CatalogBuilder::new(&registry).build(
            Path::new("src/lib.rs"),
            &tree,
            &CatalogOptions::default(),
            &mut ids,
        );
        assert_eq!(summary(&mutants), vec![(1, "Boolean mutation".to_string())]);
    }
}
