//! Text Templates
//!
//! A small template language for the generated files:
//!
//! - `{{ cls.cppClassName }}` substitutes a value, `{{ name | proper }}`
//!   passes it through `proper`, `camel`, `upper` or `lower`
//! - `{% if [not] path %}` / `{% else %}` / `{% endif %}`
//! - `{% for item in path %}` / `{% endfor %}`, with `loop.first`,
//!   `loop.last`, `loop.index` (from 1) and `loop.index0` inside the body
//! - `{# ... #}` comments
//!
//! A block tag immediately followed by a newline consumes that newline.
//! Templates come from a directory or from the default set compiled into the
//! crate, and are parsed on first use.

use std::path::{Path, PathBuf};

use include_dir::{include_dir, Dir};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Result, SchemaGenError};
use crate::names::{camel_case, lower_case, proper_case, upper_case};

/// Default templates compiled into the crate.
static EMBEDDED_TEMPLATES: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/templates");

// =============================================================================
// Template Set
// =============================================================================

#[derive(Debug, Clone)]
enum TemplateSource {
    Directory(PathBuf),
    Embedded,
}

/// Where named templates are loaded from.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    source: TemplateSource,
}

impl TemplateSet {
    /// Templates read from `dir`; the directory must exist.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(SchemaGenError::config(format!(
                "Template directory {} does not exist",
                dir.display()
            )));
        }
        info!("Loading templates from {}", dir.display());
        Ok(Self {
            source: TemplateSource::Directory(dir.to_path_buf()),
        })
    }

    /// The default templates shipped with the crate.
    pub fn embedded() -> Self {
        info!("Loading built-in templates");
        Self {
            source: TemplateSource::Embedded,
        }
    }

    /// Load and parse the template called `name`.
    pub fn get(&self, name: &str) -> Result<Template> {
        let text = match &self.source {
            TemplateSource::Directory(dir) => {
                let path = dir.join(name);
                if !path.is_file() {
                    return Err(SchemaGenError::TemplateNotFound(name.to_string()));
                }
                std::fs::read_to_string(path)?
            }
            TemplateSource::Embedded => EMBEDDED_TEMPLATES
                .get_file(name)
                .and_then(|f| f.contents_utf8())
                .ok_or_else(|| SchemaGenError::TemplateNotFound(name.to_string()))?
                .to_string(),
        };
        debug!("Parsing template {}", name);
        Template::parse(name, &text)
    }
}

// =============================================================================
// Syntax
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filter {
    Proper,
    Camel,
    Upper,
    Lower,
}

impl Filter {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "proper" => Some(Self::Proper),
            "camel" => Some(Self::Camel),
            "upper" => Some(Self::Upper),
            "lower" => Some(Self::Lower),
            _ => None,
        }
    }

    fn apply(&self, text: &str) -> String {
        match self {
            Self::Proper => proper_case(text),
            Self::Camel => camel_case(text),
            Self::Upper => upper_case(text),
            Self::Lower => lower_case(text),
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Var {
        path: Vec<String>,
        filters: Vec<Filter>,
        line: usize,
    },
    If {
        negate: bool,
        path: Vec<String>,
        then: Vec<Node>,
        otherwise: Vec<Node>,
        line: usize,
    },
    For {
        var: String,
        path: Vec<String>,
        body: Vec<Node>,
        line: usize,
    },
}

/// Lexical pieces of a template.
#[derive(Debug)]
enum Segment<'t> {
    Text(&'t str),
    Expr(&'t str, usize),
    Tag(&'t str, usize),
}

fn split_segments<'t>(name: &str, text: &'t str) -> Result<Vec<Segment<'t>>> {
    let mut segments = Vec::new();
    let mut rest = text;
    let mut line = 1;

    while !rest.is_empty() {
        let Some(start) = next_open(rest) else {
            segments.push(Segment::Text(rest));
            break;
        };
        if start > 0 {
            segments.push(Segment::Text(&rest[..start]));
            line += rest[..start].matches('\n').count();
            rest = &rest[start..];
            continue;
        }

        let (close, kind) = match &rest[..2] {
            "{{" => ("}}", 0),
            "{%" => ("%}", 1),
            _ => ("#}", 2),
        };
        let end = rest.find(close).ok_or_else(|| SchemaGenError::Template {
            template: name.to_string(),
            line,
            message: format!("unterminated `{}`", &rest[..2]),
        })?;
        let inner = rest[2..end].trim();
        let tag_line = line;
        line += rest[..end].matches('\n').count();
        rest = &rest[end + 2..];

        match kind {
            0 => segments.push(Segment::Expr(inner, tag_line)),
            1 => {
                segments.push(Segment::Tag(inner, tag_line));
                if let Some(stripped) = rest.strip_prefix('\n') {
                    rest = stripped;
                    line += 1;
                }
            }
            _ => {}
        }
    }
    Ok(segments)
}

fn is_open(text: &str) -> bool {
    text.starts_with("{{") || text.starts_with("{%") || text.starts_with("{#")
}

/// Byte offset of the next `{{`, `{%` or `{#`.
fn next_open(text: &str) -> Option<usize> {
    text.match_indices('{')
        .map(|(i, _)| i)
        .find(|&i| is_open(&text[i..]))
}

fn parse_path(expr: &str) -> Vec<String> {
    expr.split('.').map(|s| s.trim().to_string()).collect()
}

fn valid_path(path: &[String]) -> bool {
    path.iter().all(|part| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

/// Which block the parser is currently filling.
enum Frame {
    Root,
    If {
        negate: bool,
        path: Vec<String>,
        then: Option<Vec<Node>>,
        line: usize,
    },
    For {
        var: String,
        path: Vec<String>,
        line: usize,
    },
}

// =============================================================================
// Template
// =============================================================================

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(name: &str, text: &str) -> Result<Self> {
        let error = |line: usize, message: String| SchemaGenError::Template {
            template: name.to_string(),
            line,
            message,
        };

        let mut frames: Vec<(Frame, Vec<Node>)> = vec![(Frame::Root, Vec::new())];

        for segment in split_segments(name, text)? {
            match segment {
                Segment::Text(text) => {
                    if let Some((_, nodes)) = frames.last_mut() {
                        nodes.push(Node::Text(text.to_string()));
                    }
                }
                Segment::Expr(expr, line) => {
                    let mut parts = expr.split('|');
                    let path = parse_path(parts.next().unwrap_or_default());
                    if !valid_path(&path) {
                        return Err(error(line, format!("invalid expression `{expr}`")));
                    }
                    let filters = parts
                        .map(|f| {
                            Filter::parse(f.trim())
                                .ok_or_else(|| error(line, format!("unknown filter `{}`", f.trim())))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    if let Some((_, nodes)) = frames.last_mut() {
                        nodes.push(Node::Var { path, filters, line });
                    }
                }
                Segment::Tag(tag, line) => {
                    let words: Vec<&str> = tag.split_whitespace().collect();
                    match words.as_slice() {
                        ["if", "not", path] | ["if", path] => {
                            let path = parse_path(path);
                            if !valid_path(&path) {
                                return Err(error(line, format!("invalid condition `{tag}`")));
                            }
                            let negate = words.len() == 3;
                            frames.push((
                                Frame::If {
                                    negate,
                                    path,
                                    then: None,
                                    line,
                                },
                                Vec::new(),
                            ));
                        }
                        ["else"] => match frames.last_mut() {
                            Some((Frame::If { then, .. }, nodes)) if then.is_none() => {
                                *then = Some(std::mem::take(nodes));
                            }
                            _ => return Err(error(line, "`else` outside of `if`".to_string())),
                        },
                        ["endif"] => match frames.pop() {
                            Some((
                                Frame::If {
                                    negate,
                                    path,
                                    then,
                                    line,
                                },
                                nodes,
                            )) => {
                                let (then, otherwise) = match then {
                                    Some(then) => (then, nodes),
                                    None => (nodes, Vec::new()),
                                };
                                push_node(
                                    &mut frames,
                                    Node::If {
                                        negate,
                                        path,
                                        then,
                                        otherwise,
                                        line,
                                    },
                                );
                            }
                            _ => return Err(error(line, "`endif` without `if`".to_string())),
                        },
                        ["for", var, "in", path] => {
                            let path = parse_path(path);
                            if !valid_path(&path) {
                                return Err(error(line, format!("invalid loop `{tag}`")));
                            }
                            frames.push((
                                Frame::For {
                                    var: var.to_string(),
                                    path,
                                    line,
                                },
                                Vec::new(),
                            ));
                        }
                        ["endfor"] => match frames.pop() {
                            Some((Frame::For { var, path, line }, body)) => {
                                push_node(&mut frames, Node::For { var, path, body, line });
                            }
                            _ => return Err(error(line, "`endfor` without `for`".to_string())),
                        },
                        _ => return Err(error(line, format!("unknown tag `{tag}`"))),
                    }
                }
            }
        }

        let (frame, nodes) = frames.pop().unwrap_or((Frame::Root, Vec::new()));
        match frame {
            Frame::Root => Ok(Self {
                name: name.to_string(),
                nodes,
            }),
            Frame::If { line, .. } => Err(error(line, "unclosed `if` block".to_string())),
            Frame::For { line, .. } => Err(error(line, "unclosed `for` block".to_string())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render against `context`, which must be a JSON object.
    pub fn render(&self, context: &Value) -> Result<String> {
        let mut out = String::new();
        let mut scopes = Vec::new();
        self.render_nodes(&self.nodes, context, &mut scopes, &mut out)?;
        Ok(out)
    }

    fn render_nodes(
        &self,
        nodes: &[Node],
        context: &Value,
        scopes: &mut Vec<(String, Value)>,
        out: &mut String,
    ) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Var { path, filters, line } => {
                    let value = self.lookup(path, context, scopes, *line)?;
                    let text = filters
                        .iter()
                        .fold(display(value), |acc, f| f.apply(&acc));
                    out.push_str(&text);
                }
                Node::If {
                    negate,
                    path,
                    then,
                    otherwise,
                    line,
                } => {
                    let value = self.lookup(path, context, scopes, *line)?;
                    let branch = if truthy(value) != *negate { then } else { otherwise };
                    self.render_nodes(branch, context, scopes, out)?;
                }
                Node::For { var, path, body, line } => {
                    let items = match self.lookup(path, context, scopes, *line)? {
                        Value::Array(items) => items.clone(),
                        Value::Null => Vec::new(),
                        _ => {
                            return Err(SchemaGenError::Template {
                                template: self.name.clone(),
                                line: *line,
                                message: format!("`{}` is not a list", path.join(".")),
                            })
                        }
                    };
                    let count = items.len();
                    for (index, item) in items.into_iter().enumerate() {
                        let state = serde_json::json!({
                            "first": index == 0,
                            "last": index + 1 == count,
                            "index": index + 1,
                            "index0": index,
                        });
                        scopes.push(("loop".to_string(), state));
                        scopes.push((var.clone(), item));
                        let result = self.render_nodes(body, context, scopes, out);
                        scopes.truncate(scopes.len() - 2);
                        result?;
                    }
                }
            }
        }
        Ok(())
    }

    fn lookup<'v>(
        &self,
        path: &[String],
        context: &'v Value,
        scopes: &'v [(String, Value)],
        line: usize,
    ) -> Result<&'v Value> {
        let unknown = || SchemaGenError::Template {
            template: self.name.clone(),
            line,
            message: format!("unknown name `{}`", path.join(".")),
        };

        let (head, tail) = path.split_first().ok_or_else(unknown)?;
        let mut value = scopes
            .iter()
            .rev()
            .find(|(name, _)| name == head)
            .map(|(_, v)| v)
            .or_else(|| context.get(head))
            .ok_or_else(unknown)?;
        for part in tail {
            value = match value {
                Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
                other => other.get(part),
            }
            .ok_or_else(unknown)?;
        }
        Ok(value)
    }
}

fn push_node(frames: &mut [(Frame, Vec<Node>)], node: Node) {
    if let Some((_, nodes)) = frames.last_mut() {
        nodes.push(node);
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(text: &str, context: Value) -> Result<String> {
        Template::parse("test", text)?.render(&context)
    }

    #[test]
    fn test_substitution_and_filters() {
        let out = render(
            "class {{ cls.name }} : {{ cls.name | upper }} {{ cls.name|proper }}",
            json!({ "cls": { "name": "fooBar" } }),
        )
        .unwrap();
        assert_eq!(out, "class fooBar : FOOBAR FooBar");
    }

    #[test]
    fn test_if_else_consumes_newlines() {
        let text = "{% if flag %}\nyes\n{% else %}\nno\n{% endif %}\ndone";
        assert_eq!(render(text, json!({ "flag": true })).unwrap(), "yes\ndone");
        assert_eq!(render(text, json!({ "flag": "" })).unwrap(), "no\ndone");
        let negated = "{% if not flag %}off{% endif %}";
        assert_eq!(render(negated, json!({ "flag": null })).unwrap(), "off");
    }

    #[test]
    fn test_for_loop_state() {
        let text = "{% for t in tokens %}{{ t.id }}{% if not loop.last %}, {% endif %}{% endfor %}";
        let out = render(text, json!({ "tokens": [{ "id": "a" }, { "id": "b" }, { "id": "c" }] })).unwrap();
        assert_eq!(out, "a, b, c");
    }

    #[test]
    fn test_lone_braces_are_text() {
        let out = render("struct { int x; } {{ n }}", json!({ "n": 3 })).unwrap();
        assert_eq!(out, "struct { int x; } 3");
    }

    #[test]
    fn test_comment_is_dropped() {
        assert_eq!(render("a{# note #}b", json!({})).unwrap(), "ab");
    }

    #[test]
    fn test_unknown_name_reports_line() {
        let err = render("line one\n{{ missing }}", json!({})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error in template test at line 2: unknown name `missing`"
        );
    }

    #[test]
    fn test_unclosed_block() {
        let err = render("{% for x in xs %}\n{{ x }}", json!({ "xs": [] })).unwrap_err();
        assert!(err.to_string().contains("unclosed `for` block"));
        let err = render("{% endif %}", json!({})).unwrap_err();
        assert!(err.to_string().contains("`endif` without `if`"));
    }

    #[test]
    fn test_embedded_templates_parse() {
        let templates = TemplateSet::embedded();
        for name in [
            "api.h",
            "schemaClass.h",
            "schemaClass.cpp",
            "wrapSchemaClass.cpp",
            "tokens.h",
            "tokens.cpp",
            "wrapTokens.cpp",
            "plugInfo.json",
        ] {
            assert!(templates.get(name).is_ok(), "{name} failed to parse");
        }
        assert!(matches!(
            templates.get("missing.h"),
            Err(SchemaGenError::TemplateNotFound(_))
        ));
    }
}
