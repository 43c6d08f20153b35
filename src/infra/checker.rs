//! Lexical reference checker
//!
//! Default `TypeChecker` for the reference language, a small ML-like syntax:
//!
//! ```text
//! type internal Point = { x: int }
//! let private helper a b = a + b
//! [<Obsolete>]
//! let area (p: Point) = helper p.x 1
//! ```
//!
//! A `let` or `type` at column 0 binds a module-level name; an indented `let`,
//! function parameters and `fun` parameters bind locals whose scope ends at the
//! next module-level declaration. Unqualified names resolve to the nearest
//! preceding binding in the file, then to module-level names of sibling files,
//! then to public names of referenced projects.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::hash_content;
use super::tokenizer::{self, Token, TokenKind};
use crate::error::CheckError;
use crate::models::symbol::{
    Accessibility, OccurrenceKind, Symbol, SymbolId, SymbolKind, SymbolUse,
};
use crate::models::text::{Range, SourceRange};
use crate::services::checker::{
    FileCheck, FileCheckResults, ParseDiagnostic, ParsedFile, ProjectCheckResults,
    ProjectOptions, TypeChecker,
};

#[derive(Debug, Clone)]
struct Binding {
    symbol: Arc<Symbol>,
    range: Range,
    offset: usize,
    /// Offset where a local binding goes out of scope
    scope_end: usize,
    top_level: bool,
}

#[derive(Debug, Clone)]
struct Reference {
    name: String,
    offset: usize,
    range: Range,
    kind: OccurrenceKind,
}

#[derive(Debug, Default)]
struct FileAnalysis {
    path: PathBuf,
    bindings: Vec<Binding>,
    references: Vec<Reference>,
    diagnostics: Vec<ParseDiagnostic>,
    /// Key of the module-level binding locals belong to
    container: String,
    /// Bindings seen so far per (container, name)
    ordinals: HashMap<(String, String), usize>,
}

impl FileAnalysis {
    fn new(path: &Path, text: &str, defines: &[String]) -> Self {
        let lexed = tokenizer::lex(text, defines);
        let tokens: Vec<Token> = lexed
            .tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::Comment)
            .collect();

        let mut analysis = Self {
            path: path.to_path_buf(),
            diagnostics: lexed
                .diagnostics
                .into_iter()
                .map(|d| ParseDiagnostic {
                    line: d.line,
                    message: d.message,
                })
                .collect(),
            ..Default::default()
        };

        let mut in_attribute = false;
        let mut i = 0;
        while i < tokens.len() {
            let token = tokens[i];
            match token.kind {
                TokenKind::Keyword if matches!(token.text(text), "let" | "type") => {
                    i = analysis.declaration(text, &tokens, i);
                    continue;
                }
                TokenKind::Keyword if token.text(text) == "fun" => {
                    i = analysis.lambda(text, &tokens, i);
                    continue;
                }
                TokenKind::Punct => {
                    if adjacent_pair(text, &tokens, i, "[", "<") {
                        in_attribute = true;
                    } else if adjacent_pair(text, &tokens, i, ">", "]") {
                        in_attribute = false;
                    }
                }
                TokenKind::Ident | TokenKind::QuotedIdent => {
                    analysis.reference(text, &tokens, i, in_attribute);
                }
                _ => {}
            }
            i += 1;
        }

        analysis.close_local_scopes(&tokens, text);
        analysis
    }

    /// `let`/`type` declaration starting at `tokens[i]`; returns where scanning resumes
    fn declaration(&mut self, text: &str, tokens: &[Token], i: usize) -> usize {
        let keyword = tokens[i];
        let is_type = keyword.text(text) == "type";
        let top_level = keyword.column == 0;
        let mut accessibility = Accessibility::Public;

        let mut j = i + 1;
        while let Some(t) = tokens.get(j).filter(|t| t.kind == TokenKind::Keyword) {
            match t.text(text) {
                "rec" | "mutable" => {}
                "private" => accessibility = Accessibility::Private,
                "internal" => accessibility = Accessibility::Internal,
                _ => break,
            }
            j += 1;
        }

        let Some(name) = tokens.get(j).filter(|t| t.is_identifier()).copied() else {
            return j;
        };

        if is_type {
            self.bind(text, name, SymbolKind::Type, accessibility, !top_level);
            return j + 1;
        }

        // Parameters up to `=` on the declaring line
        let mut params = Vec::new();
        let mut k = j + 1;
        while let Some(t) = tokens.get(k) {
            if t.line != name.line || t.is_punct(text, "=") {
                break;
            }
            if t.is_identifier() {
                if tokens[k - 1].is_punct(text, ":") {
                    self.reference(text, tokens, k, false);
                } else {
                    params.push(*t);
                }
            }
            k += 1;
        }

        let kind = if params.is_empty() {
            SymbolKind::Value
        } else {
            SymbolKind::Function
        };
        self.bind(text, name, kind, accessibility, !top_level);
        for param in params {
            self.bind(text, param, SymbolKind::Parameter, Accessibility::Public, true);
        }
        k
    }

    /// `fun a b -> ...`; binds parameters up to the arrow
    fn lambda(&mut self, text: &str, tokens: &[Token], i: usize) -> usize {
        let mut k = i + 1;
        while k < tokens.len() && !adjacent_pair(text, tokens, k, "-", ">") {
            if tokens[k].is_identifier() {
                if tokens[k - 1].is_punct(text, ":") {
                    self.reference(text, tokens, k, false);
                } else {
                    self.bind(text, tokens[k], SymbolKind::Parameter, Accessibility::Public, true);
                }
            }
            k += 1;
        }
        k
    }

    fn bind(
        &mut self,
        text: &str,
        token: Token,
        kind: SymbolKind,
        accessibility: Accessibility,
        is_local: bool,
    ) {
        let name = token.name(text);
        let range = Range::on_line(token.line, token.column, token.end_column());

        // Identity is the owning declaration plus a shadowing ordinal, never the offset
        let container = if is_local {
            self.container.clone()
        } else {
            String::new()
        };
        let seen = self
            .ordinals
            .entry((container.clone(), name.to_string()))
            .or_insert(0);
        let ordinal = *seen;
        *seen += 1;
        let id = SymbolId(hash_content(&format!(
            "{}:{}/{}#{}",
            self.path.display(),
            container,
            name,
            ordinal
        )));
        if !is_local {
            self.container = format!("{name}#{ordinal}");
        }

        let mut symbol = Symbol::new(id, name, kind)
            .with_accessibility(accessibility)
            .with_declaration(SourceRange::new(&self.path, range));
        if is_local {
            symbol = symbol.local();
        }

        self.bindings.push(Binding {
            symbol: Arc::new(symbol),
            range,
            offset: token.span.start,
            scope_end: usize::MAX,
            top_level: !is_local,
        });
    }

    fn reference(&mut self, text: &str, tokens: &[Token], i: usize, in_attribute: bool) {
        let token = tokens[i];

        // `Qualifier.` names a module, not a value
        if tokens
            .get(i + 1)
            .is_some_and(|next| next.kind == TokenKind::Dot && next.span.start == token.span.end())
        {
            return;
        }

        let previous = i.checked_sub(1).map(|p| tokens[p]);
        let kind = if in_attribute {
            OccurrenceKind::InAttribute
        } else if previous.is_some_and(|p| p.is_punct(text, ":")) {
            OccurrenceKind::InType
        } else if previous.is_some_and(|p| p.is_punct(text, "|")) {
            OccurrenceKind::InPattern
        } else {
            OccurrenceKind::Use
        };

        self.references.push(Reference {
            name: token.name(text).to_string(),
            offset: token.span.start,
            range: Range::on_line(token.line, token.column, token.end_column()),
            kind,
        });
    }

    /// Locals end at the next module-level `let` or `type`
    fn close_local_scopes(&mut self, tokens: &[Token], text: &str) {
        let boundaries: Vec<usize> = tokens
            .iter()
            .filter(|t| t.column == 0 && matches!(t.text(text), "let" | "type"))
            .filter(|t| t.kind == TokenKind::Keyword)
            .map(|t| t.span.start)
            .collect();

        for binding in self.bindings.iter_mut().filter(|b| !b.top_level) {
            binding.scope_end = boundaries
                .iter()
                .copied()
                .find(|&b| b > binding.offset)
                .unwrap_or(usize::MAX);
        }
    }

    fn exports(&self, visible: impl Fn(Accessibility) -> bool) -> impl Iterator<Item = &Binding> {
        self.bindings
            .iter()
            .filter(move |b| b.top_level && visible(b.symbol.accessibility))
    }
}

fn adjacent_pair(text: &str, tokens: &[Token], i: usize, first: &str, second: &str) -> bool {
    match (tokens.get(i), tokens.get(i + 1)) {
        (Some(a), Some(b)) => {
            a.is_punct(text, first) && b.is_punct(text, second) && a.span.end() == b.span.start
        }
        _ => false,
    }
}

/// Names a file can see beyond its own bindings
struct Environment {
    siblings: Vec<FileAnalysis>,
    referenced: Vec<Binding>,
}

impl Environment {
    fn for_project(options: &ProjectOptions) -> Self {
        let siblings = options
            .source_files
            .iter()
            .map(|f| FileAnalysis::new(&f.path, &f.text, &options.defines))
            .collect();

        let referenced = options
            .referenced_projects
            .iter()
            .flat_map(|project| {
                project
                    .source_files
                    .iter()
                    .map(|f| FileAnalysis::new(&f.path, &f.text, &project.defines))
                    .collect::<Vec<_>>()
            })
            .flat_map(|analysis| {
                analysis
                    .exports(|a| a == Accessibility::Public)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();

        Self {
            siblings,
            referenced,
        }
    }

    fn resolve(&self, file: &FileAnalysis, reference: &Reference) -> Option<Arc<Symbol>> {
        let local = file
            .bindings
            .iter()
            .filter(|b| {
                b.symbol.name == reference.name
                    && b.offset < reference.offset
                    && reference.offset < b.scope_end
            })
            .max_by_key(|b| b.offset);

        let sibling = || {
            self.siblings
                .iter()
                .filter(|s| s.path != file.path)
                .flat_map(|s| s.exports(|a| a != Accessibility::Private))
                .find(|b| b.symbol.name == reference.name)
        };

        let referenced = || {
            self.referenced
                .iter()
                .find(|b| b.symbol.name == reference.name)
        };

        local
            .or_else(sibling)
            .or_else(referenced)
            .map(|b| Arc::clone(&b.symbol))
    }

    /// Definitions and resolved references of `file`, in source order
    fn uses(&self, file: &FileAnalysis) -> Vec<SymbolUse> {
        let mut ordered: Vec<(usize, SymbolUse)> = file
            .bindings
            .iter()
            .map(|b| {
                let range = SourceRange::new(&file.path, b.range);
                (
                    b.offset,
                    SymbolUse::new(Arc::clone(&b.symbol), range, OccurrenceKind::Definition),
                )
            })
            .collect();

        for reference in &file.references {
            let Some(symbol) = self.resolve(file, reference) else {
                continue;
            };
            let range = SourceRange::new(&file.path, reference.range);
            // Annotations are reported both as plain uses and as type uses
            if reference.kind == OccurrenceKind::InType {
                ordered.push((
                    reference.offset,
                    SymbolUse::new(Arc::clone(&symbol), range.clone(), OccurrenceKind::Use),
                ));
            }
            ordered.push((
                reference.offset,
                SymbolUse::new(symbol, range, reference.kind),
            ));
        }

        ordered.sort_by_key(|(offset, _)| *offset);
        ordered.into_iter().map(|(_, u)| u).collect()
    }
}

struct CheckedFile {
    uses: Vec<SymbolUse>,
}

impl FileCheckResults for CheckedFile {
    fn symbol_use_at_location(
        &self,
        line: u32,
        end_column: u32,
        line_text: &str,
        island: &[String],
    ) -> Option<SymbolUse> {
        let name = island.last()?;
        self.uses
            .iter()
            .find(|u| {
                let range = u.range.range;
                range.start.line == line
                    && range.end.column == end_column
                    && u.symbol.name == *name
                    && line_text
                        .get(range.start.column as usize..range.end.column as usize)
                        .is_some_and(|s| s.contains(name.as_str()))
            })
            .cloned()
    }

    fn uses_of_symbol_in_file(&self, symbol: &Symbol) -> Vec<SymbolUse> {
        self.uses
            .iter()
            .filter(|u| *u.symbol == *symbol)
            .cloned()
            .collect()
    }

    fn all_uses(&self) -> Vec<SymbolUse> {
        self.uses.clone()
    }
}

struct CheckedProject {
    uses: Vec<SymbolUse>,
}

impl ProjectCheckResults for CheckedProject {
    fn uses_of_symbol(&self, symbol: &Symbol) -> Vec<SymbolUse> {
        self.uses
            .iter()
            .filter(|u| *u.symbol == *symbol)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalChecker;

impl LexicalChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TypeChecker for LexicalChecker {
    async fn parse_and_check_file(
        &self,
        path: &Path,
        _version: u64,
        text: &str,
        options: &ProjectOptions,
    ) -> Result<FileCheck, CheckError> {
        let mut analysis = FileAnalysis::new(path, text, &options.defines);
        let parse = Arc::new(ParsedFile {
            path: path.to_path_buf(),
            diagnostics: std::mem::take(&mut analysis.diagnostics),
        });

        if !options.contains_file(path) {
            tracing::debug!(
                "{} is not part of project {}",
                path.display(),
                options.project_id
            );
            return Ok(FileCheck {
                parse,
                results: None,
            });
        }

        let env = Environment::for_project(options);
        let uses = env.uses(&analysis);
        tracing::debug!("Checked {} ({} uses)", path.display(), uses.len());

        Ok(FileCheck {
            parse,
            results: Some(Arc::new(CheckedFile { uses })),
        })
    }

    async fn parse_and_check_project(
        &self,
        options: &ProjectOptions,
    ) -> Result<Arc<dyn ProjectCheckResults>, CheckError> {
        let env = Environment::for_project(options);
        let uses: Vec<SymbolUse> = env.siblings.iter().flat_map(|f| env.uses(f)).collect();
        tracing::debug!(
            "Checked project {} ({} files, {} uses)",
            options.project_id,
            env.siblings.len(),
            uses.len()
        );
        Ok(Arc::new(CheckedProject { uses }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::solution::ProjectId;
    use crate::services::checker::SourceFile;

    fn options(name: &str, files: &[(&str, &str)]) -> ProjectOptions {
        ProjectOptions {
            project_id: ProjectId::new(name),
            source_files: files
                .iter()
                .map(|(path, text)| SourceFile {
                    path: PathBuf::from(path),
                    version: 0,
                    text: Arc::from(*text),
                })
                .collect(),
            defines: Vec::new(),
            referenced_projects: Vec::new(),
            stamp: 0,
        }
    }

    async fn check(path: &str, options: &ProjectOptions) -> Arc<dyn FileCheckResults> {
        let text = options
            .source_files
            .iter()
            .find(|f| f.path == Path::new(path))
            .map(|f| Arc::clone(&f.text))
            .unwrap();
        LexicalChecker
            .parse_and_check_file(Path::new(path), 0, &text, options)
            .await
            .unwrap()
            .results
            .unwrap()
    }

    fn names_and_kinds(uses: &[SymbolUse]) -> Vec<(String, OccurrenceKind)> {
        uses.iter()
            .map(|u| (u.symbol.name.clone(), u.kind))
            .collect()
    }

    #[tokio::test]
    async fn test_let_binding_and_use() {
        let opts = options("P", &[("/p/a.ml", "let x = 1\nlet y = x + 1")]);
        let results = check("/p/a.ml", &opts).await;

        let x = results
            .symbol_use_at_location(0, 5, "let x = 1", &["x".to_string()])
            .unwrap();
        assert!(x.is_definition());
        assert_eq!(x.symbol.kind, SymbolKind::Value);

        let uses = results.uses_of_symbol_in_file(&x.symbol);
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[1].range.range, Range::on_line(1, 8, 9));
        assert_eq!(uses[1].kind, OccurrenceKind::Use);
    }

    #[tokio::test]
    async fn test_keyword_does_not_correlate() {
        let opts = options("P", &[("/p/a.ml", "let x = 1")]);
        let results = check("/p/a.ml", &opts).await;
        assert!(
            results
                .symbol_use_at_location(0, 3, "let x = 1", &["let".to_string()])
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_parameters_are_local_to_their_function() {
        let text = "let add a b = a + b\nlet a = 2\nlet c = a";
        let opts = options("P", &[("/p/a.ml", text)]);
        let results = check("/p/a.ml", &opts).await;
        let uses = results.all_uses();

        let param_a = uses
            .iter()
            .find(|u| u.symbol.name == "a" && u.symbol.kind == SymbolKind::Parameter)
            .unwrap();
        assert!(param_a.symbol.is_local);
        assert_eq!(results.uses_of_symbol_in_file(&param_a.symbol).len(), 2);

        let add = uses.iter().find(|u| u.symbol.name == "add").unwrap();
        assert_eq!(add.symbol.kind, SymbolKind::Function);

        // The module-level `a` owns the use on the last line
        let last = uses.last().unwrap();
        assert_eq!(last.range.range.start.line, 2);
        assert_eq!(last.symbol.kind, SymbolKind::Value);
        assert!(!last.symbol.is_local);
    }

    #[tokio::test]
    async fn test_type_annotations_report_use_and_in_type() {
        let text = "type Point = { x: int }\nlet origin (p: Point) = p";
        let opts = options("P", &[("/p/a.ml", text)]);
        let results = check("/p/a.ml", &opts).await;
        let point = results
            .symbol_use_at_location(0, 10, "type Point = { x: int }", &["Point".to_string()])
            .unwrap();

        let uses = results.uses_of_symbol_in_file(&point.symbol);
        assert_eq!(
            names_and_kinds(&uses),
            vec![
                ("Point".to_string(), OccurrenceKind::Definition),
                ("Point".to_string(), OccurrenceKind::Use),
                ("Point".to_string(), OccurrenceKind::InType),
            ]
        );
        assert_eq!(uses[1].range, uses[2].range);
    }

    #[tokio::test]
    async fn test_attribute_use() {
        let text = "type Obsolete = { m: string }\n[<Obsolete>]\nlet old = 1";
        let opts = options("P", &[("/p/a.ml", text)]);
        let results = check("/p/a.ml", &opts).await;
        let kinds: Vec<OccurrenceKind> = results
            .all_uses()
            .iter()
            .filter(|u| u.symbol.name == "Obsolete")
            .map(|u| u.kind)
            .collect();
        assert_eq!(kinds, vec![OccurrenceKind::Definition, OccurrenceKind::InAttribute]);
    }

    #[tokio::test]
    async fn test_sibling_and_accessibility() {
        let opts = options(
            "P",
            &[
                ("/p/a.ml", "let shared = 1\nlet private hidden = 2"),
                ("/p/b.ml", "let s = shared\nlet h = hidden"),
            ],
        );
        let results = check("/p/b.ml", &opts).await;
        let names: Vec<String> = results
            .all_uses()
            .iter()
            .filter(|u| !u.is_definition())
            .map(|u| u.symbol.name.clone())
            .collect();
        assert_eq!(names, vec!["shared"]);
    }

    #[tokio::test]
    async fn test_referenced_project_exports_public_only() {
        let lib = options(
            "Lib",
            &[("/lib/a.ml", "let api = 1\nlet internal detail = 2")],
        );
        let mut app = options("App", &[("/app/m.ml", "let x = api\nlet y = detail")]);
        app.referenced_projects.push(Arc::new(lib));

        let project = LexicalChecker.parse_and_check_project(&app).await.unwrap();
        let file = check("/app/m.ml", &app).await;
        let api = file
            .all_uses()
            .into_iter()
            .find(|u| u.symbol.name == "api")
            .unwrap();

        assert_eq!(api.symbol.declaration.as_ref().unwrap().file(), Path::new("/lib/a.ml"));
        assert_eq!(project.uses_of_symbol(&api.symbol).len(), 1);
        assert!(file.all_uses().iter().all(|u| u.symbol.name != "detail"));
    }

    #[tokio::test]
    async fn test_file_outside_project_has_no_results() {
        let opts = options("P", &[("/p/a.ml", "let a = 1")]);
        let check = LexicalChecker
            .parse_and_check_file(Path::new("/other.ml"), 0, "let a = 1", &opts)
            .await
            .unwrap();
        assert!(check.results.is_none());
    }

    #[tokio::test]
    async fn test_symbol_id_survives_lines_inserted_above() {
        let before = options("P", &[("/p/a.ml", "let x = 1\nlet f a = a + x")]);
        let after = options(
            "P",
            &[("/p/a.ml", "let a = 0\n\nlet x = 1\nlet f a = a + x")],
        );
        let old = check("/p/a.ml", &before).await.all_uses();
        let new = check("/p/a.ml", &after).await.all_uses();

        let id_of = |uses: &[SymbolUse], name: &str, kind: SymbolKind| {
            uses.iter()
                .find(|u| u.symbol.name == name && u.symbol.kind == kind)
                .map(|u| u.symbol.id)
                .unwrap()
        };
        assert_eq!(
            id_of(&old, "x", SymbolKind::Value),
            id_of(&new, "x", SymbolKind::Value)
        );
        assert_eq!(
            id_of(&old, "a", SymbolKind::Parameter),
            id_of(&new, "a", SymbolKind::Parameter)
        );
        assert_ne!(
            id_of(&new, "a", SymbolKind::Value),
            id_of(&new, "a", SymbolKind::Parameter)
        );
    }

    #[tokio::test]
    async fn test_shadowed_bindings_get_distinct_ids() {
        let text = "let x = 1\nlet x = x + 1";
        let opts = options("P", &[("/p/a.ml", text)]);
        let uses = check("/p/a.ml", &opts).await.all_uses();
        let definitions: Vec<SymbolId> = uses
            .iter()
            .filter(|u| u.is_definition())
            .map(|u| u.symbol.id)
            .collect();
        assert_eq!(definitions.len(), 2);
        assert_ne!(definitions[0], definitions[1]);
    }

    #[tokio::test]
    async fn test_lambda_parameters() {
        let text = "let f = fun n -> n + 1";
        let opts = options("P", &[("/p/a.ml", text)]);
        let results = check("/p/a.ml", &opts).await;
        let n = results
            .symbol_use_at_location(0, 13, text, &["n".to_string()])
            .unwrap();
        assert_eq!(n.symbol.kind, SymbolKind::Parameter);
        assert_eq!(results.uses_of_symbol_in_file(&n.symbol).len(), 2);
    }
}
