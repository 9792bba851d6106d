//! Go source parsing with tree-sitter.
//!
//! Turns one Go file into chunks. Only top-level declarations are
//! considered: functions, methods, and `type` specs whose underlying type
//! is a struct or an interface. Everything else at the top level (vars,
//! consts, aliases, named non-struct types) is ignored, and nothing nested
//! inside a function body becomes a chunk.

use chrono::{DateTime, Utc};
use tree_sitter::{Node, Parser, Tree};

use vectcode_core::chunk::{chunk_id, Chunk, ChunkKind};

use crate::error::ExtractError;

pub const LANGUAGE: &str = "go";

/// Selector names treated as route registrations.
const ENDPOINT_VERBS: &[&str] = &[
    "GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "Get", "Post", "Put", "Delete",
    "Patch", "Head", "Options",
];

/// Selector names treated as outbound client calls.
const CLIENT_VERBS: &[&str] = &["Get", "Post", "Put", "Delete", "Patch"];

/// A top-level declaration that yields a chunk.
enum Declaration<'t> {
    Function {
        node: Node<'t>,
    },
    Method {
        node: Node<'t>,
        receiver: String,
    },
    Struct {
        decl: Node<'t>,
        spec: Node<'t>,
    },
    Interface {
        decl: Node<'t>,
        spec: Node<'t>,
    },
}

impl Declaration<'_> {
    fn kind(&self) -> ChunkKind {
        match self {
            Declaration::Function { .. } => ChunkKind::Function,
            Declaration::Method { .. } => ChunkKind::Method,
            Declaration::Struct { .. } => ChunkKind::Struct,
            Declaration::Interface { .. } => ChunkKind::Interface,
        }
    }
}

/// File-level facts shared by every chunk of one file.
pub struct FileContext<'a> {
    pub project: &'a str,
    /// Relative to the project root, `/`-separated.
    pub file_path: &'a str,
    pub last_modified: DateTime<Utc>,
}

fn new_parser() -> Result<Parser, ExtractError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_go::LANGUAGE.into())
        .map_err(|e| ExtractError::parse("<go grammar>", format!("failed to load grammar: {e}")))?;
    Ok(parser)
}

/// Reusable Go parser. Not `Sync`; create one per walk.
pub struct GoParser {
    parser: Parser,
}

impl GoParser {
    pub fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            parser: new_parser()?,
        })
    }

    /// Parse one file's source into chunks.
    ///
    /// A file whose syntax tree contains error nodes is rejected as a whole
    /// rather than yielding partial chunks.
    pub fn parse_source(
        &mut self,
        source: &str,
        ctx: &FileContext<'_>,
    ) -> Result<Vec<Chunk>, ExtractError> {
        let tree = self.parse_tree(source, ctx.file_path)?;
        let root = tree.root_node();

        let package = package_name(root, source);
        let imports = imports(root, source);

        let chunks = declarations(root, source)
            .into_iter()
            .map(|decl| build_chunk(&decl, source, ctx, &package, &imports))
            .collect();
        Ok(chunks)
    }

    fn parse_tree(&mut self, source: &str, file_path: &str) -> Result<Tree, ExtractError> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| ExtractError::parse(file_path, "parser returned no tree"))?;

        let root = tree.root_node();
        if root.has_error() {
            let position = first_error(root)
                .map(|n| {
                    format!(
                        "syntax error at line {}:{}",
                        n.start_position().row + 1,
                        n.start_position().column + 1
                    )
                })
                .unwrap_or_else(|| "syntax error".to_string());
            return Err(ExtractError::parse(file_path, position));
        }
        Ok(tree)
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error())
        .find_map(first_error)
}

fn text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.byte_range()).unwrap_or_default()
}

fn line_range(node: Node<'_>) -> (usize, usize) {
    (node.start_position().row + 1, node.end_position().row + 1)
}

fn package_name(root: Node<'_>, source: &str) -> String {
    let mut cursor = root.walk();
    let clause = root
        .named_children(&mut cursor)
        .find(|n| n.kind() == "package_clause");
    clause
        .and_then(|c| {
            let mut inner = c.walk();
            let ident = c
                .named_children(&mut inner)
                .find(|n| n.kind() == "package_identifier");
            ident
        })
        .map(|n| text(n, source).to_string())
        .unwrap_or_default()
}

/// Import paths in declaration order, quotes stripped.
fn imports(root: Node<'_>, source: &str) -> Vec<String> {
    let mut specs = Vec::new();
    let mut cursor = root.walk();
    for decl in root.named_children(&mut cursor) {
        if decl.kind() == "import_declaration" {
            collect_import_specs(decl, &mut specs);
        }
    }

    specs
        .into_iter()
        .filter_map(|spec| spec.child_by_field_name("path"))
        .map(|path| text(path, source).trim_matches('"').to_string())
        .collect()
}

fn collect_import_specs<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "import_spec" => out.push(child),
            "import_spec_list" => collect_import_specs(child, out),
            _ => {}
        }
    }
}

/// Classify the top-level children of a file.
fn declarations<'t>(root: Node<'t>, source: &str) -> Vec<Declaration<'t>> {
    let mut found = Vec::new();
    let mut cursor = root.walk();

    for node in root.named_children(&mut cursor) {
        match node.kind() {
            "function_declaration" => found.push(Declaration::Function { node }),
            "method_declaration" => {
                let receiver = receiver_type(node, source);
                found.push(Declaration::Method { node, receiver });
            }
            "type_declaration" => {
                let mut specs = node.walk();
                for spec in node.named_children(&mut specs) {
                    if spec.kind() != "type_spec" {
                        continue;
                    }
                    match spec.child_by_field_name("type").map(|t| t.kind()) {
                        Some("struct_type") => found.push(Declaration::Struct { decl: node, spec }),
                        Some("interface_type") => {
                            found.push(Declaration::Interface { decl: node, spec })
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    found
}

/// Receiver type as written: `T`, `*T`, `*Stack[T]`.
fn receiver_type(method: Node<'_>, source: &str) -> String {
    let Some(receiver) = method.child_by_field_name("receiver") else {
        return String::new();
    };
    let mut cursor = receiver.walk();
    let param = receiver
        .named_children(&mut cursor)
        .find(|n| n.kind() == "parameter_declaration");
    param
        .and_then(|p| p.child_by_field_name("type"))
        .map(|t| text(t, source).to_string())
        .unwrap_or_default()
}

fn build_chunk(
    decl: &Declaration<'_>,
    source: &str,
    ctx: &FileContext<'_>,
    package: &str,
    imports: &[String],
) -> Chunk {
    let (code_node, range_node, name_node, receiver) = match decl {
        Declaration::Function { node } => (*node, *node, node.child_by_field_name("name"), None),
        Declaration::Method { node, receiver } => (
            *node,
            *node,
            node.child_by_field_name("name"),
            Some(receiver.clone()),
        ),
        Declaration::Struct { decl, spec } | Declaration::Interface { decl, spec } => {
            (*decl, *spec, spec.child_by_field_name("name"), None)
        }
    };

    let name = name_node
        .map(|n| text(n, source).to_string())
        .unwrap_or_default();
    let (line_start, line_end) = line_range(range_node);

    let (http_endpoints, http_calls, imports) = match decl {
        Declaration::Function { node } | Declaration::Method { node, .. } => {
            let (endpoints, calls) = node
                .child_by_field_name("body")
                .map(|body| http_usage(body, source))
                .unwrap_or_default();
            (endpoints, calls, imports.to_vec())
        }
        _ => (Vec::new(), Vec::new(), Vec::new()),
    };

    Chunk {
        id: chunk_id(ctx.project, ctx.file_path, &name),
        project: ctx.project.to_string(),
        file_path: ctx.file_path.to_string(),
        package: package.to_string(),
        language: LANGUAGE.to_string(),
        kind: decl.kind(),
        name,
        receiver,
        code: text(code_node, source).to_string(),
        line_start,
        line_end,
        doc: doc_comment(code_node, source),
        http_endpoints,
        http_calls,
        imports,
        last_modified: ctx.last_modified,
    }
}

/// Scan a body (closures included) for verb-named selector calls with a
/// string literal first argument. Returns `(endpoints, outbound_calls)`.
fn http_usage(body: Node<'_>, source: &str) -> (Vec<String>, Vec<String>) {
    let mut endpoints = Vec::new();
    let mut calls = Vec::new();
    let mut stack = vec![body];

    while let Some(node) = stack.pop() {
        if node.kind() == "call_expression" {
            if let Some((verb, literal)) = verb_call(node, source) {
                if ENDPOINT_VERBS.contains(&verb) {
                    endpoints.push(format!("{} {}", verb, literal));
                }
                if CLIENT_VERBS.contains(&verb) {
                    calls.push(literal.to_string());
                }
            }
        }

        // Push in reverse so children are visited in source order.
        let mut cursor = node.walk();
        let children: Vec<_> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }

    (endpoints, calls)
}

fn verb_call<'s>(call: Node<'_>, source: &'s str) -> Option<(&'s str, &'s str)> {
    let function = call.child_by_field_name("function")?;
    if function.kind() != "selector_expression" {
        return None;
    }
    let verb = text(function.child_by_field_name("field")?, source);

    let args = call.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    let first = args
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment")?;
    match first.kind() {
        "interpreted_string_literal" | "raw_string_literal" => {
            Some((verb, text(first, source).trim_matches('"')))
        }
        _ => None,
    }
}

/// The comment group directly above `decl`, normalised.
///
/// The group is the run of comments whose last line ends on the line just
/// before the declaration, with no blank line between members. A comment
/// that trails code on its own line is not part of it.
fn doc_comment(decl: Node<'_>, source: &str) -> Option<String> {
    let mut group = Vec::new();
    let mut next_row = decl.start_position().row;
    let mut current = decl.prev_named_sibling();

    while let Some(node) = current {
        if node.kind() != "comment" || node.end_position().row + 1 < next_row {
            break;
        }
        if group.is_empty() && node.end_position().row + 1 != next_row {
            break;
        }
        let trailing = node
            .prev_named_sibling()
            .map(|prev| {
                prev.kind() != "comment" && prev.end_position().row == node.start_position().row
            })
            .unwrap_or(false);
        if trailing {
            break;
        }
        group.push(text(node, source));
        next_row = node.start_position().row;
        current = node.prev_named_sibling();
    }

    if group.is_empty() {
        return None;
    }
    group.reverse();
    normalize_comment_group(&group)
}

/// Render a comment group as plain text: markers removed, directives
/// dropped, blank runs collapsed, terminated by a newline.
pub fn normalize_comment_group(comments: &[&str]) -> Option<String> {
    let mut lines: Vec<String> = Vec::new();

    for comment in comments {
        if let Some(body) = comment.strip_prefix("//") {
            if is_directive(body) {
                continue;
            }
            lines.push(body.strip_prefix(' ').unwrap_or(body).to_string());
        } else if let Some(body) = comment.strip_prefix("/*") {
            let body = body.strip_suffix("*/").unwrap_or(body);
            lines.extend(body.split('\n').map(str::to_string));
        }
    }

    let mut out: Vec<String> = Vec::new();
    for line in lines {
        let line = line.trim_end().to_string();
        if line.is_empty() && out.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }

    if out.is_empty() {
        return None;
    }
    let mut text = out.join("\n");
    text.push('\n');
    Some(text)
}

/// `//go:generate`, `//line`, `//export` and similar tool directives.
fn is_directive(body: &str) -> bool {
    if body.starts_with("line ") || body.starts_with("extern ") || body.starts_with("export ") {
        return true;
    }
    let Some((prefix, rest)) = body.split_once(':') else {
        return false;
    };
    !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && rest
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<Chunk> {
        let ctx = FileContext {
            project: "proj",
            file_path: "pkg/file.go",
            last_modified: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        };
        GoParser::new().unwrap().parse_source(source, &ctx).unwrap()
    }

    fn by_name<'c>(chunks: &'c [Chunk], name: &str) -> &'c Chunk {
        chunks
            .iter()
            .find(|c| c.name == name)
            .unwrap_or_else(|| panic!("no chunk named {}", name))
    }

    #[test]
    fn test_method_with_receiver() {
        let chunks = parse("package main\n\ntype T struct{}\n\nfunc (t T) Foo() {}\n");
        let foo = by_name(&chunks, "Foo");
        assert_eq!(foo.kind, ChunkKind::Method);
        assert_eq!(foo.receiver.as_deref(), Some("T"));
        assert_eq!(foo.id, "proj:pkg/file.go:Foo");
        assert_eq!(foo.package, "main");
        assert_eq!(foo.language, "go");
    }

    #[test]
    fn test_pointer_and_generic_receivers() {
        let chunks = parse(
            "package s\n\nfunc (s *Server) Run() {}\n\nfunc (st *Stack[T]) Push(v T) {}\n",
        );
        assert_eq!(by_name(&chunks, "Run").receiver.as_deref(), Some("*Server"));
        assert_eq!(
            by_name(&chunks, "Push").receiver.as_deref(),
            Some("*Stack[T]")
        );
    }

    #[test]
    fn test_function_lines_and_imports() {
        let src = "package main\n\nimport (\n\t\"fmt\"\n\tnethttp \"net/http\"\n)\n\nfunc Hello() {\n\tfmt.Println(\"hi\")\n}\n";
        let chunks = parse(src);
        assert_eq!(chunks.len(), 1);
        let hello = &chunks[0];
        assert_eq!(hello.kind, ChunkKind::Function);
        assert!(hello.receiver.is_none());
        assert_eq!((hello.line_start, hello.line_end), (8, 10));
        assert_eq!(hello.imports, vec!["fmt", "net/http"]);
        assert!(hello.code.starts_with("func Hello() {"));
        assert!(hello.code.ends_with('}'));
    }

    #[test]
    fn test_single_import_form() {
        let chunks = parse("package main\n\nimport \"os\"\n\nfunc Exit() { os.Exit(1) }\n");
        assert_eq!(chunks[0].imports, vec!["os"]);
    }

    #[test]
    fn test_types_struct_and_interface_only() {
        let src = "package model\n\nimport \"time\"\n\n\
                   // User is a person.\n\
                   type User struct {\n\tName string\n}\n\n\
                   type Store interface {\n\tGet(id int) User\n}\n\n\
                   type ID int\n\n\
                   type Alias = User\n\n\
                   var x = 1\n\n\
                   const y = 2\n";
        let chunks = parse(src);
        let names: Vec<&str> = chunks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["User", "Store"]);

        let user = by_name(&chunks, "User");
        assert_eq!(user.kind, ChunkKind::Struct);
        assert_eq!(user.doc.as_deref(), Some("User is a person.\n"));
        assert!(user.imports.is_empty());
        assert!(user.code.starts_with("type User struct"));
        assert_eq!((user.line_start, user.line_end), (6, 8));

        assert_eq!(by_name(&chunks, "Store").kind, ChunkKind::Interface);
    }

    #[test]
    fn test_grouped_type_declaration() {
        let src = "package p\n\n\
                   // Shapes used by the renderer.\n\
                   type (\n\
                   \tPoint struct{ X, Y int }\n\
                   \tCount int\n\
                   \tDrawer interface{ Draw() }\n\
                   )\n";
        let chunks = parse(src);
        assert_eq!(chunks.len(), 2);

        let point = by_name(&chunks, "Point");
        assert_eq!(point.kind, ChunkKind::Struct);
        assert_eq!((point.line_start, point.line_end), (5, 5));
        assert!(point.code.starts_with("type ("));
        assert!(point.code.contains("Drawer interface"));
        assert_eq!(point.doc.as_deref(), Some("Shapes used by the renderer.\n"));

        let drawer = by_name(&chunks, "Drawer");
        assert_eq!(drawer.kind, ChunkKind::Interface);
        assert_eq!(drawer.line_start, 7);
    }

    #[test]
    fn test_nested_declarations_ignored() {
        let src = "package p\n\nfunc Outer() {\n\ttype local struct{}\n\tinner := func() {}\n\t_ = inner\n}\n";
        let chunks = parse(src);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name, "Outer");
    }

    #[test]
    fn test_doc_comment_attachment() {
        let src = "package p\n\n\
                   // Detached comment.\n\n\
                   // Run does work.\n\
                   //\n\
                   // It blocks.\n\
                   //go:noinline\n\
                   func Run() {}\n\n\
                   var v = 1 // trailing\n\
                   func Next() {}\n\n\
                   func Bare() {}\n";
        let chunks = parse(src);
        assert_eq!(
            by_name(&chunks, "Run").doc.as_deref(),
            Some("Run does work.\n\nIt blocks.\n")
        );
        assert_eq!(by_name(&chunks, "Next").doc, None);
        assert_eq!(by_name(&chunks, "Bare").doc, None);
    }

    #[test]
    fn test_block_comment_doc() {
        let src = "package p\n\n/*\n  Block explains.\n*/\nfunc Block() {}\n";
        let chunks = parse(src);
        assert_eq!(chunks[0].doc.as_deref(), Some("  Block explains.\n"));
    }

    #[test]
    fn test_http_heuristic() {
        let src = r#"package api

func Routes(r *Router, c *Client) {
	r.GET("/users", list)
	r.Post("/users", create)
	r.HEAD("/health", ping)
	go func() {
		c.Get("http://billing/api")
	}()
	r.Handle("/ignored", h)
	r.GET(path, dynamic)
}
"#;
        let chunks = parse(src);
        let routes = &chunks[0];
        assert_eq!(
            routes.http_endpoints,
            vec!["GET /users", "Post /users", "HEAD /health", "Get http://billing/api"]
        );
        assert_eq!(routes.http_calls, vec!["/users", "http://billing/api"]);
    }

    #[test]
    fn test_raw_string_literal_keeps_backticks() {
        let src = "package api\n\nfunc R(r *Router) {\n\tr.PUT(`/raw`, h)\n}\n";
        let chunks = parse(src);
        assert_eq!(chunks[0].http_endpoints, vec!["PUT `/raw`"]);
        assert!(chunks[0].http_calls.is_empty());
    }

    #[test]
    fn test_syntax_error_rejects_file() {
        let ctx = FileContext {
            project: "proj",
            file_path: "bad.go",
            last_modified: Utc::now(),
        };
        let err = GoParser::new()
            .unwrap()
            .parse_source("package main\n\nfunc Broken( {\n", &ctx)
            .unwrap_err();
        assert!(matches!(err, ExtractError::Parse { .. }));
    }

    #[test]
    fn test_normalize_comment_group() {
        assert_eq!(
            normalize_comment_group(&["// a  ", "//", "//", "//  b"]).as_deref(),
            Some("a\n\n b\n")
        );
        assert_eq!(normalize_comment_group(&["//go:generate stringer"]), None);
        assert_eq!(normalize_comment_group(&["//", "// "]), None);
        assert!(is_directive("go:embed x"));
        assert!(is_directive("line foo.go:10"));
        assert!(!is_directive(" Note: this is prose"));
    }
}
