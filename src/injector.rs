//! Mutant schemata injection
//!
//! Every mutant of a compilation unit is compiled into the same tree behind a
//! runtime selector:
//!
//! ```text
//! (if crate::__mutants::is(3) { a - b } else if crate::__mutants::is(4) { a * b } else { a + b })
//! ```
//!
//! The selector reads the active mutant id once per process from
//! [`ACTIVE_MUTANT_ENV`], so one build serves every mutant and the baseline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use proc_macro2::Literal;
use syn::visit_mut::VisitMut;
use syn::Expr;

use crate::error::MutationError;
use crate::mutant::{Mutant, MutantId, SourceSpan};

/// Environment variable holding the active mutant id (unset or `0` = baseline)
pub const ACTIVE_MUTANT_ENV: &str = "MUTATION_ENGINE_ACTIVE";

/// Environment variable naming a file that receives every mutant id reached
pub const COVERAGE_FILE_ENV: &str = "MUTATION_ENGINE_COVERAGE";

/// A compilation unit rewritten with selectors
#[derive(Debug, Clone)]
pub struct InstrumentedUnit {
    pub path: PathBuf,
    pub tree: syn::File,
    /// Mutants actually wrapped into `tree`, ascending
    pub injected: Vec<MutantId>,
}

/// Outcome of injecting one compilation unit
#[derive(Debug)]
pub struct Injection {
    pub unit: InstrumentedUnit,
    /// Mutants that could not be located; always `InjectionConflict`
    pub conflicts: Vec<MutationError>,
}

impl Injection {
    pub fn conflicting_ids(&self) -> impl Iterator<Item = MutantId> + '_ {
        self.conflicts.iter().filter_map(|err| match err {
            MutationError::InjectionConflict { id, .. } => Some(*id),
            _ => None,
        })
    }
}

/// Wrap every mutant of `mutants` that belongs to `path` into `tree`.
///
/// Mutants sharing a node are chained in ascending id order. Mutants nested
/// inside another mutant's node are injected first; the outer replacement
/// keeps the uninstrumented inner fragment, which is equivalent because only
/// one id is active per process.
pub fn inject<'m>(
    path: &Path,
    tree: &syn::File,
    mutants: impl IntoIterator<Item = &'m Mutant>,
) -> Injection {
    let mut pending: HashMap<SourceSpan, Vec<&Mutant>> = HashMap::new();
    for mutant in mutants.into_iter().filter(|m| m.file == path) {
        pending.entry(mutant.mutation.span).or_default().push(mutant);
    }
    for group in pending.values_mut() {
        group.sort_by_key(|m| m.id);
    }

    let mut injector = SelectorInjector {
        pending,
        injected: Vec::new(),
    };
    let mut instrumented = tree.clone();
    injector.visit_file_mut(&mut instrumented);

    let mut conflicts: Vec<MutationError> = injector
        .pending
        .into_values()
        .flatten()
        .map(|mutant| MutationError::InjectionConflict {
            id: mutant.id,
            file: path.to_path_buf(),
            reason: format!(
                "no node matching '{}' at {}",
                crate::codegen::expr_to_source(&mutant.mutation.original),
                mutant.mutation.span
            ),
        })
        .collect();
    conflicts.sort_by_key(|err| match err {
        MutationError::InjectionConflict { id, .. } => *id,
        _ => MutantId::BASELINE,
    });
    for conflict in &conflicts {
        tracing::warn!("{}", conflict);
    }

    let mut injected = injector.injected;
    injected.sort();

    Injection {
        unit: InstrumentedUnit {
            path: path.to_path_buf(),
            tree: instrumented,
            injected,
        },
        conflicts,
    }
}

/// Add the selector runtime to the crate root.
pub fn add_runtime(root: &mut syn::File) {
    root.attrs
        .push(syn::parse_quote!(#![allow(unused_parens, unused_braces, unreachable_code)]));
    root.items.push(runtime_module());
}

fn runtime_module() -> syn::Item {
    let active_env = ACTIVE_MUTANT_ENV;
    let coverage_env = COVERAGE_FILE_ENV;
    syn::parse_quote! {
        #[doc(hidden)]
        #[allow(dead_code)]
        pub(crate) mod __mutants {
            use std::collections::HashSet;
            use std::io::Write;
            use std::sync::{Mutex, OnceLock};

            struct Selector {
                active: u64,
                coverage: Option<Mutex<(HashSet<u64>, std::fs::File)>>,
            }

            fn selector() -> &'static Selector {
                static SELECTOR: OnceLock<Selector> = OnceLock::new();
                SELECTOR.get_or_init(|| {
                    let active = std::env::var(#active_env)
                        .ok()
                        .and_then(|value| value.trim().parse().ok())
                        .unwrap_or(0);
                    let coverage = std::env::var_os(#coverage_env)
                        .and_then(|path| {
                            std::fs::OpenOptions::new()
                                .create(true)
                                .append(true)
                                .open(path)
                                .ok()
                        })
                        .map(|file| Mutex::new((HashSet::new(), file)));
                    Selector { active, coverage }
                })
            }

            #[inline]
            pub(crate) fn is(id: u64) -> bool {
                let selector = selector();
                if let Some(coverage) = &selector.coverage {
                    if let Ok(mut guard) = coverage.lock() {
                        let (seen, file) = &mut *guard;
                        if seen.insert(id) {
                            let _ = writeln!(file, "{}", id);
                        }
                    }
                }
                selector.active == id
            }
        }
    }
}

struct SelectorInjector<'m> {
    pending: HashMap<SourceSpan, Vec<&'m Mutant>>,
    injected: Vec<MutantId>,
}

impl<'m> SelectorInjector<'m> {
    /// Take the pending mutants located exactly at `expr`.
    fn take_matching(&mut self, expr: &Expr) -> Vec<&'m Mutant> {
        let span = SourceSpan::of(expr);
        let Some(group) = self.pending.get_mut(&span) else {
            return Vec::new();
        };
        let (matching, rest): (Vec<&'m Mutant>, Vec<&'m Mutant>) =
            group.drain(..).partition(|m| m.mutation.original == *expr);
        if rest.is_empty() {
            self.pending.remove(&span);
        } else {
            *group = rest;
        }
        matching
    }
}

impl VisitMut for SelectorInjector<'_> {
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        let matching = self.take_matching(expr);
        syn::visit_mut::visit_expr_mut(self, expr);
        if matching.is_empty() {
            return;
        }
        let original = std::mem::replace(expr, Expr::Verbatim(Default::default()));
        *expr = selector_chain(original, &matching);
        self.injected.extend(matching.iter().map(|m| m.id));
    }
}

fn selector_chain(original: Expr, mutants: &[&Mutant]) -> Expr {
    let mut chain = Expr::Block(syn::ExprBlock {
        attrs: Vec::new(),
        label: None,
        block: block_of(original),
    });
    for mutant in mutants.iter().rev() {
        let id = Literal::u64_unsuffixed(mutant.id.0);
        let condition: Expr = syn::parse_quote!(crate::__mutants::is(#id));
        chain = Expr::If(syn::ExprIf {
            attrs: Vec::new(),
            if_token: Default::default(),
            cond: Box::new(condition),
            then_branch: block_of(mutant.mutation.replacement.clone()),
            else_branch: Some((Default::default(), Box::new(chain))),
        });
    }
    Expr::Paren(syn::ExprParen {
        attrs: Vec::new(),
        paren_token: Default::default(),
        expr: Box::new(chain),
    })
}

fn block_of(expr: Expr) -> syn::Block {
    syn::Block {
        brace_token: Default::default(),
        stmts: vec![syn::Stmt::Expr(expr, None)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogBuilder, CatalogOptions};
    use crate::mutant::{IdAllocator, MutationLevel};
    use crate::mutators::MutatorRegistry;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = r#"
fn check(x: i32, flag: bool) -> bool {
    x > 0 && flag
}

fn label(name: &str) -> &str {
    if str::is_empty(name) { "anonymous" } else { name }
}
"#;

    fn catalog(source: &str) -> (syn::File, Vec<Mutant>) {
        let registry = MutatorRegistry::standard();
        let tree = syn::parse_file(source).unwrap();
        let options = CatalogOptions {
            level: MutationLevel::Complete,
            ..CatalogOptions::default()
        };
        let mut ids = IdAllocator::new();
        let mutants =
            CatalogBuilder::new(&registry).build(Path::new("src/lib.rs"), &tree, &options, &mut ids);
        (tree, mutants)
    }

    /// Evaluate every selector as if `active` were the running mutant.
    struct Resolve {
        active: u64,
    }

    impl VisitMut for Resolve {
        fn visit_expr_mut(&mut self, expr: &mut Expr) {
            if let Some(selected) = select(expr, self.active) {
                *expr = selected;
                self.visit_expr_mut(expr);
                return;
            }
            syn::visit_mut::visit_expr_mut(self, expr);
        }
    }

    fn select(expr: &Expr, active: u64) -> Option<Expr> {
        let Expr::Paren(paren) = expr else {
            return None;
        };
        let mut current = paren.expr.as_ref();
        loop {
            let Expr::If(branch) = current else {
                return None;
            };
            let Expr::Call(call) = branch.cond.as_ref() else {
                return None;
            };
            let Some(Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Int(id),
                ..
            })) = call.args.first()
            else {
                return None;
            };
            if id.base10_parse::<u64>().ok()? == active {
                return Some(tail(&branch.then_branch));
            }
            match branch.else_branch.as_ref()?.1.as_ref() {
                Expr::Block(block) => return Some(tail(&block.block)),
                next => current = next,
            }
        }
    }

    fn tail(block: &syn::Block) -> Expr {
        match &block.stmts[0] {
            syn::Stmt::Expr(expr, None) => expr.clone(),
            other => panic!("unexpected selector branch {:?}", other),
        }
    }

    fn resolve(tree: &syn::File, active: u64) -> syn::File {
        let mut resolved = tree.clone();
        Resolve { active }.visit_file_mut(&mut resolved);
        resolved
    }

    /// The tree a single-mutant build would compile.
    fn standalone(tree: &syn::File, mutant: &Mutant) -> syn::File {
        struct Replace<'a>(&'a Mutant, bool);
        impl VisitMut for Replace<'_> {
            fn visit_expr_mut(&mut self, expr: &mut Expr) {
                if !self.1
                    && SourceSpan::of(&*expr) == self.0.mutation.span
                    && *expr == self.0.mutation.original
                {
                    *expr = self.0.mutation.replacement.clone();
                    self.1 = true;
                    return;
                }
                syn::visit_mut::visit_expr_mut(self, expr);
            }
        }
        let mut mutated = tree.clone();
        let mut replace = Replace(mutant, false);
        replace.visit_file_mut(&mut mutated);
        assert!(replace.1);
        mutated
    }

    #[test]
    fn test_every_mutant_is_injected() {
        let (tree, mutants) = catalog(SOURCE);
        let injection = inject(Path::new("src/lib.rs"), &tree, &mutants);
        assert!(injection.conflicts.is_empty());
        let ids: Vec<_> = mutants.iter().map(|m| m.id).collect();
        assert_eq!(injection.unit.injected, ids);
    }

    #[test]
    fn test_no_active_mutant_is_baseline() {
        let (tree, mutants) = catalog(SOURCE);
        let injection = inject(Path::new("src/lib.rs"), &tree, &mutants);
        assert_eq!(resolve(&injection.unit.tree, 0), tree);
    }

    #[test]
    fn test_each_active_mutant_matches_standalone_build() {
        let (tree, mutants) = catalog(SOURCE);
        let injection = inject(Path::new("src/lib.rs"), &tree, &mutants);
        for mutant in &mutants {
            assert_eq!(
                resolve(&injection.unit.tree, mutant.id.0),
                standalone(&tree, mutant),
                "mutant {}",
                mutant.id
            );
        }
    }

    #[test]
    fn test_shared_node_chain_is_ordered() {
        let (tree, mutants) = catalog("fn f(a: u8) -> bool { a >= 1 }");
        let injection = inject(Path::new("src/lib.rs"), &tree, &mutants);
        let source = crate::codegen::generate_source(&injection.unit.tree);
        let first = source.find("is(1)").unwrap();
        let second = source.find("is(2)").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_other_files_are_untouched() {
        let (tree, mutants) = catalog(SOURCE);
        let injection = inject(Path::new("src/other.rs"), &tree, &mutants);
        assert!(injection.unit.injected.is_empty());
        assert_eq!(injection.unit.tree, tree);
    }

    #[test]
    fn test_unlocatable_mutant_is_a_conflict() {
        let (tree, mut mutants) = catalog(SOURCE);
        let target = mutants.len() - 1;
        mutants[target].mutation.original = syn::parse_quote!(somewhere_else);
        let injection = inject(Path::new("src/lib.rs"), &tree, &mutants);
        let conflicting: Vec<_> = injection.conflicting_ids().collect();
        assert_eq!(conflicting, vec![mutants[target].id]);
        assert!(!injection.unit.injected.contains(&mutants[target].id));
    }

    #[test]
    fn test_runtime_module_reads_environment() {
        let mut root = syn::parse_file("pub mod math;").unwrap();
        add_runtime(&mut root);
        let source = crate::codegen::generate_source(&root);
        assert!(source.contains("mod __mutants"));
        assert!(source.contains(ACTIVE_MUTANT_ENV));
        assert!(source.contains(COVERAGE_FILE_ENV));
        assert!(source.starts_with("#![allow(unused_parens"));
    }
}
