//! Conversion between source text and syntax trees
//!
//! This module loads compilation units and turns (instrumented) trees back
//! into source code.

use std::path::{Path, PathBuf};

use crate::error::{MutationError, Result};

/// A parsed compilation unit
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// Path relative to the project root
    pub path: PathBuf,
    pub tree: syn::File,
}

impl SourceUnit {
    /// Parse `source` as the contents of `path`
    pub fn parse(path: impl Into<PathBuf>, source: &str) -> Result<Self> {
        let path = path.into();
        let tree = syn::parse_file(source).map_err(|e| MutationError::ParseError {
            file: path.clone(),
            error: e.to_string(),
        })?;
        Ok(Self { path, tree })
    }

    /// Read and parse `project_dir/path`
    pub fn load(project_dir: &Path, path: &Path) -> Result<Self> {
        let full_path = project_dir.join(path);
        if !full_path.exists() {
            return Err(MutationError::FileReadError {
                file: full_path,
                error: "file does not exist".to_string(),
            });
        }
        let source =
            std::fs::read_to_string(&full_path).map_err(|e| MutationError::FileReadError {
                file: full_path.clone(),
                error: e.to_string(),
            })?;
        Self::parse(path, &source)
    }
}

/// Generate source code from AST
pub fn generate_source(ast: &syn::File) -> String {
    prettyplease::unparse(ast)
}

/// Render a single expression the way it would appear in formatted code
pub fn expr_to_source(expr: &syn::Expr) -> String {
    let wrapper: syn::File = syn::parse_quote! {
        fn __render() {
            #expr
        }
    };
    let rendered = prettyplease::unparse(&wrapper);
    let lines: Vec<&str> = rendered.lines().collect();
    match lines.as_slice() {
        [_, body @ .., _] if !body.is_empty() => body
            .iter()
            .map(|line| line.trim())
            .collect::<Vec<_>>()
            .join(" "),
        _ => rendered.trim().to_string(),
    }
}

/// Write a tree to `root/path`, creating parent directories
pub fn write_unit(root: &Path, path: &Path, tree: &syn::File) -> Result<()> {
    let target = root.join(path);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| MutationError::WriteError {
            file: target.clone(),
            error: e.to_string(),
        })?;
    }
    std::fs::write(&target, generate_source(tree)).map_err(|e| MutationError::WriteError {
        file: target.clone(),
        error: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_names_file() {
        let result = SourceUnit::parse("src/broken.rs", "fn (");
        assert!(matches!(result, Err(MutationError::ParseError { .. })));
    }

    #[test]
    fn test_expr_to_source() {
        let expr: syn::Expr = syn::parse_str("str::is_empty( name )").unwrap();
        assert_eq!(expr_to_source(&expr), "str::is_empty(name)");
        let expr: syn::Expr = syn::parse_str("a+b").unwrap();
        assert_eq!(expr_to_source(&expr), "a + b");
    }

    #[test]
    fn test_write_unit_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let unit = SourceUnit::parse("src/math.rs", "fn add(a: i32, b: i32) -> i32 { a + b }").unwrap();
        write_unit(dir.path(), &unit.path, &unit.tree).unwrap();
        let loaded = SourceUnit::load(dir.path(), Path::new("src/math.rs")).unwrap();
        assert_eq!(loaded.tree, unit.tree);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = SourceUnit::load(dir.path(), Path::new("src/missing.rs"));
        assert!(matches!(result, Err(MutationError::FileReadError { .. })));
    }
}
