//! Owned expression model lowered from the Python syntax tree
//!
//! ast-grep nodes borrow the parsed document, which cannot cross the rayon
//! join. Everything downstream of the scanner works on these owned values
//! instead. Only the constructs the evaluator understands are lowered
//! structurally; anything else becomes [`ExprKind::Unsupported`] carrying the
//! original source text for error messages.

use ast_grep_language::Python;
use trigr_manifest::SourceLocation;

pub(crate) type PyNode<'r> = ast_grep_core::Node<'r, ast_grep_core::source::StrDoc<Python>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub location: SourceLocation,
    /// Byte offset of the expression within its module
    pub offset: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    None,
    List(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Name(String),
    /// Dotted attribute chain made only of identifiers, e.g. `options.RESET_VALUE`
    Path(Vec<String>),
    Call { callee: Box<Expr>, args: Vec<Arg> },
    Unsupported,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    Keyword {
        name: String,
        value: Expr,
        location: SourceLocation,
    },
    /// `*args` or `**kwargs`
    Splat(SourceLocation),
}

impl Expr {
    pub fn is_none(&self) -> bool {
        matches!(self.kind, ExprKind::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Dotted path of a name or attribute chain
    pub fn path(&self) -> Option<Vec<&str>> {
        match &self.kind {
            ExprKind::Name(name) => Some(vec![name.as_str()]),
            ExprKind::Path(parts) => Some(parts.iter().map(String::as_str).collect()),
            _ => None,
        }
    }
}

/// Byte offset to 1-based line/column conversion
#[derive(Debug, Clone)]
pub(crate) struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(content: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(content.match_indices('\n').map(|(i, _)| i + 1));
        LineIndex { starts }
    }

    /// Column counts characters, not bytes
    pub fn locate(&self, content: &str, offset: usize) -> (usize, usize) {
        let line = self.starts.partition_point(|&start| start <= offset).max(1);
        let line_start = self.starts[line - 1];
        let column = content
            .get(line_start..offset)
            .map_or(1, |prefix| prefix.chars().count() + 1);
        (line, column)
    }
}

/// Lowers nodes of one module
pub(crate) struct Lowering<'a> {
    file: &'a str,
    content: &'a str,
    lines: LineIndex,
}

impl<'a> Lowering<'a> {
    pub fn new(file: &'a str, content: &'a str) -> Self {
        Lowering {
            file,
            content,
            lines: LineIndex::new(content),
        }
    }

    pub fn file(&self) -> &str {
        self.file
    }

    pub fn location(&self, offset: usize) -> SourceLocation {
        let (line, column) = self.lines.locate(self.content, offset);
        SourceLocation::new(self.file, line, column)
    }

    pub fn expr(&self, node: &PyNode<'_>) -> Expr {
        let text = node.text().to_string();
        let kind = match &*node.kind() {
            "true" => ExprKind::Bool(true),
            "false" => ExprKind::Bool(false),
            "none" => ExprKind::None,
            "integer" => parse_int(&text).map_or(ExprKind::Unsupported, ExprKind::Int),
            "float" => parse_float(&text).map_or(ExprKind::Unsupported, ExprKind::Float),
            "string" => parse_string(&text).map_or(ExprKind::Unsupported, ExprKind::Str),
            "concatenated_string" => self.concatenated(node),
            "list" | "tuple" => ExprKind::List(
                named_children(node)
                    .iter()
                    .map(|child| self.expr(child))
                    .collect(),
            ),
            "dictionary" => self.dictionary(node),
            "parenthesized_expression" => {
                let inner = named_children(node);
                if let [only] = inner.as_slice() {
                    return self.expr(only);
                }
                ExprKind::Unsupported
            }
            "unary_operator" => self.unary(node),
            "identifier" => ExprKind::Name(text.clone()),
            "attribute" => self.attribute(node),
            "call" => self.call(node),
            _ => ExprKind::Unsupported,
        };

        let offset = node.range().start;
        Expr {
            kind,
            location: self.location(offset),
            offset,
            text,
        }
    }

    /// Arguments of a call node; generator arguments lower to one unsupported positional
    pub fn args(&self, call: &PyNode<'_>) -> Vec<Arg> {
        let Some(arguments) = call.field("arguments") else {
            return Vec::new();
        };
        if arguments.kind() != "argument_list" {
            return vec![Arg::Positional(self.expr(&arguments))];
        }

        named_children(&arguments)
            .iter()
            .map(|arg| match &*arg.kind() {
                "keyword_argument" => {
                    let name = arg
                        .field("name")
                        .map(|n| n.text().to_string())
                        .unwrap_or_default();
                    let value = match arg.field("value") {
                        Some(value) => self.expr(&value),
                        None => self.expr(arg),
                    };
                    Arg::Keyword {
                        name,
                        value,
                        location: self.location(arg.range().start),
                    }
                }
                "list_splat" | "dictionary_splat" => {
                    Arg::Splat(self.location(arg.range().start))
                }
                _ => Arg::Positional(self.expr(arg)),
            })
            .collect()
    }

    fn concatenated(&self, node: &PyNode<'_>) -> ExprKind {
        let mut joined = String::new();
        for part in named_children(node) {
            if part.kind() != "string" {
                return ExprKind::Unsupported;
            }
            match parse_string(&part.text()) {
                Some(s) => joined.push_str(&s),
                None => return ExprKind::Unsupported,
            }
        }
        ExprKind::Str(joined)
    }

    fn dictionary(&self, node: &PyNode<'_>) -> ExprKind {
        let mut entries = Vec::new();
        for pair in named_children(node) {
            if pair.kind() != "pair" {
                return ExprKind::Unsupported;
            }
            let (Some(key), Some(value)) = (pair.field("key"), pair.field("value")) else {
                return ExprKind::Unsupported;
            };
            entries.push((self.expr(&key), self.expr(&value)));
        }
        ExprKind::Dict(entries)
    }

    fn unary(&self, node: &PyNode<'_>) -> ExprKind {
        let operator = node.field("operator").map(|op| op.text().to_string());
        let Some(argument) = node.field("argument") else {
            return ExprKind::Unsupported;
        };
        match (operator.as_deref(), self.expr(&argument).kind) {
            (Some("-"), ExprKind::Int(value)) => ExprKind::Int(-value),
            (Some("-"), ExprKind::Float(value)) => ExprKind::Float(-value),
            (Some("+"), kind @ (ExprKind::Int(_) | ExprKind::Float(_))) => kind,
            _ => ExprKind::Unsupported,
        }
    }

    fn attribute(&self, node: &PyNode<'_>) -> ExprKind {
        let (Some(object), Some(attribute)) = (node.field("object"), node.field("attribute"))
        else {
            return ExprKind::Unsupported;
        };
        let attribute = attribute.text().to_string();
        match self.expr(&object).kind {
            ExprKind::Name(name) => ExprKind::Path(vec![name, attribute]),
            ExprKind::Path(mut parts) => {
                parts.push(attribute);
                ExprKind::Path(parts)
            }
            _ => ExprKind::Unsupported,
        }
    }

    fn call(&self, node: &PyNode<'_>) -> ExprKind {
        let Some(function) = node.field("function") else {
            return ExprKind::Unsupported;
        };
        ExprKind::Call {
            callee: Box::new(self.expr(&function)),
            args: self.args(node),
        }
    }
}

/// Named children, skipping comments
pub(crate) fn named_children<'r>(node: &PyNode<'r>) -> Vec<PyNode<'r>> {
    node.children()
        .filter(|child| child.is_named() && child.kind() != "comment")
        .collect()
}

/// First `ERROR` node or missing token in the tree, as a byte offset
///
/// Missing tokens inserted by error recovery are zero-width leaves.
pub(crate) fn find_syntax_error(node: &PyNode<'_>, is_root: bool) -> Option<(usize, String)> {
    if node.kind() == "ERROR" {
        let snippet: String = node.text().chars().take(40).collect();
        return Some((node.range().start, format!("unexpected `{}`", snippet.trim())));
    }
    let children: Vec<_> = node.children().collect();
    if !is_root && children.is_empty() && node.range().is_empty() {
        return Some((node.range().start, format!("missing `{}`", node.kind())));
    }
    children
        .iter()
        .find_map(|child| find_syntax_error(child, false))
}

pub(crate) fn parse_int(text: &str) -> Option<i64> {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != '_')
        .collect::<String>()
        .to_ascii_lowercase();
    if let Some(hex) = cleaned.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(oct) = cleaned.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()
    } else if let Some(bin) = cleaned.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()
    } else {
        cleaned.parse().ok()
    }
}

pub(crate) fn parse_float(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    if cleaned.ends_with(['j', 'J']) {
        return None;
    }
    cleaned.parse().ok()
}

/// Decode a single Python string literal, prefix and quotes included
///
/// Byte strings and f-strings are not constants and yield `None`.
pub(crate) fn parse_string(text: &str) -> Option<String> {
    let quote_at = text.find(|c| c == '"' || c == '\'')?;
    let prefix = text[..quote_at].to_ascii_lowercase();
    if prefix.contains('f') || prefix.contains('b') {
        return None;
    }
    let raw = prefix.contains('r');

    let body = &text[quote_at..];
    let delimiter = if body.starts_with("\"\"\"") {
        "\"\"\""
    } else if body.starts_with("'''") {
        "'''"
    } else {
        &body[..1]
    };
    let inner = body.strip_prefix(delimiter)?.strip_suffix(delimiter)?;

    Some(if raw {
        inner.to_string()
    } else {
        unescape(inner)
    })
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'v' => out.push('\u{0B}'),
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = (0..width).filter_map(|_| chars.next()).collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if digits.len() == width => out.push(decoded),
                    _ => {
                        out.push('\\');
                        out.push(next);
                        out.push_str(&digits);
                    }
                }
            }
            // Unknown escapes are kept verbatim
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use crate::syntax::*;
    use ast_grep_core::AstGrep;

    fn lower_first_expression(source: &str) -> Option<Expr> {
        let sg = AstGrep::new(source, Python);
        let root = sg.root();
        let lowering = Lowering::new("main.py", source);
        let statement = named_children(&root).into_iter().next()?;
        let expression = named_children(&statement).into_iter().next()?;
        Some(lowering.expr(&expression))
    }

    #[test]
    fn test_parse_int_forms() {
        assert_eq!(parse_int("1_000"), Some(1000));
        assert_eq!(parse_int("0x1F"), Some(31));
        assert_eq!(parse_int("0o17"), Some(15));
        assert_eq!(parse_int("0b101"), Some(5));
        assert_eq!(parse_int("12j"), None);
    }

    #[test]
    fn test_parse_float_forms() {
        assert_eq!(parse_float("1.5"), Some(1.5));
        assert_eq!(parse_float("1e3"), Some(1000.0));
        assert_eq!(parse_float("1_0.5"), Some(10.5));
        assert_eq!(parse_float("2.0j"), None);
    }

    #[test]
    fn test_parse_string_forms() {
        assert_eq!(parse_string("\"my-topic\"").as_deref(), Some("my-topic"));
        assert_eq!(parse_string("'a\\nb'").as_deref(), Some("a\nb"));
        assert_eq!(parse_string("r'a\\nb'").as_deref(), Some("a\\nb"));
        assert_eq!(parse_string("\"\"\"doc\"\"\"").as_deref(), Some("doc"));
        assert_eq!(parse_string("u'\\x41\\u00e9'").as_deref(), Some("Aé"));
        assert_eq!(parse_string("''").as_deref(), Some(""));
        assert_eq!(parse_string("f'{x}'"), None);
        assert_eq!(parse_string("b'raw'"), None);
    }

    #[test]
    fn test_line_index() {
        let content = "a = 1\nbb = 2\n";
        let index = LineIndex::new(content);
        assert_eq!(index.locate(content, 0), (1, 1));
        assert_eq!(index.locate(content, 4), (1, 5));
        assert_eq!(index.locate(content, 6), (2, 1));
        assert_eq!(index.locate(content, 11), (2, 6));
    }

    #[test]
    fn test_lower_literals() {
        let Some(expr) = lower_first_expression("[1, -2, 'x' \"y\", (3.5), True, None]\n") else {
            panic!("expected an expression");
        };
        let ExprKind::List(items) = expr.kind else {
            panic!("expected a list, got {:?}", expr.kind);
        };
        let kinds: Vec<ExprKind> = items.into_iter().map(|item| item.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ExprKind::Int(1),
                ExprKind::Int(-2),
                ExprKind::Str("xy".to_string()),
                ExprKind::Float(3.5),
                ExprKind::Bool(true),
                ExprKind::None,
            ]
        );
    }

    #[test]
    fn test_lower_call_with_keywords() {
        let source = "https.onRequest(\"hello\", memory=512, *rest)\n";
        let Some(expr) = lower_first_expression(source) else {
            panic!("expected an expression");
        };
        let ExprKind::Call { callee, args } = expr.kind else {
            panic!("expected a call");
        };
        assert_eq!(callee.path(), Some(vec!["https", "onRequest"]));
        assert_eq!(args.len(), 3);
        assert!(matches!(&args[0], Arg::Positional(e) if e.as_str() == Some("hello")));
        assert!(matches!(&args[1], Arg::Keyword { name, value, .. }
            if name == "memory" && value.kind == ExprKind::Int(512)));
        assert!(matches!(&args[2], Arg::Splat(_)));
        assert_eq!(expr.location.to_string(), "main.py:1:1");
    }

    #[test]
    fn test_lower_rejects_non_constant() {
        let Some(expr) = lower_first_expression("a + 1\n") else {
            panic!("expected an expression");
        };
        assert_eq!(expr.kind, ExprKind::Unsupported);
        assert_eq!(expr.text, "a + 1");
    }

    #[test]
    fn test_find_syntax_error() {
        let sg = AstGrep::new("def broken(:\n    pass\n", Python);
        assert!(find_syntax_error(&sg.root(), true).is_some());

        let sg = AstGrep::new("x = [1, 2]\n", Python);
        assert!(find_syntax_error(&sg.root(), true).is_none());
    }
}
