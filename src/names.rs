//! Identifier and Token Utilities
//!
//! Pure string helpers shared by the parser, the token gatherer and the
//! templates:
//! - case conversion (ProperCase, camelCase, UPPER, lower)
//! - identifier validation and sanitizing
//! - reserved-word handling for every target output language
//! - multiple-apply instance name templating
//!
//! Word splitting treats every run of characters outside `[A-Za-z0-9_]` as a
//! separator. Underscores stay part of a word.

use std::collections::HashSet;

use lazy_static::lazy_static;
use tracing::info;

/// Placeholder substituted for the instance name in multiple-apply names.
pub const INSTANCE_NAME_PLACEHOLDER: &str = "__INSTANCE_NAME__";

/// Stand-in used when an instance-templated name has to become an identifier.
pub const MULTIPLE_APPLY_TEMPLATE_IDENTIFIER: &str = "_MultipleApplyTemplate_";

/// Separator between namespace components of property and schema names.
pub const NAMESPACE_DELIMITER: char = ':';

const CPP_RESERVED_KEYWORDS: &[&str] = &[
    "alignas", "alignof", "and", "and_eq", "asm", "atomic_cancel",
    "atomic_commit", "atomic_noexcept", "auto", "bitand", "bitor", "bool",
    "break", "case", "catch", "char", "char8_t", "char16_t", "char32_t",
    "class", "compl", "concept", "const", "consteval", "constexpr",
    "constinit", "const_cast", "continue", "co_await", "co_return",
    "co_yield", "decltype", "default", "delete", "do", "double",
    "dynamic_cast", "else", "enum", "explicit", "export", "extern", "false",
    "float", "for", "friend", "goto", "if", "inline", "int", "long",
    "mutable", "namespace", "new", "noexcept", "not", "not_eq", "nullptr",
    "operator", "or", "or_eq", "private", "protected", "public", "reflexpr",
    "register", "reinterpret_cast", "requires", "return", "short", "signed",
    "sizeof", "static", "static_assert", "static_cast", "struct", "switch",
    "synchronized", "template", "this", "thread_local", "throw", "true",
    "try", "typedef", "typeid", "typename", "union", "unsigned", "using",
    "virtual", "void", "volatile", "wchar_t", "while", "xor", "xor_eq",
];

const PYTHON_RESERVED_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await",
    "break", "class", "continue", "def", "del", "elif", "else", "except",
    "finally", "for", "from", "global", "if", "import", "in", "is",
    "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

lazy_static! {
    // `interface` is a macro on Windows COM builds, so it is treated as reserved.
    static ref RESERVED_WORDS: HashSet<&'static str> = CPP_RESERVED_KEYWORDS
        .iter()
        .chain(PYTHON_RESERVED_KEYWORDS.iter())
        .chain(["interface"].iter())
        .copied()
        .collect();
}

// =============================================================================
// Case Conversion
// =============================================================================

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Split on runs of non-word characters, dropping empty pieces.
fn words(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| !is_word_char(c)).filter(|w| !w.is_empty())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

/// Returns the given string (camelCase or ProperCase) in ProperCase,
/// stripping out any non-word characters.
///
/// Single-character inputs are upper-cased wholesale.
pub fn proper_case(s: &str) -> String {
    if s.chars().count() > 1 {
        words(s).map(capitalize).collect()
    } else {
        s.to_uppercase()
    }
}

/// Returns the given string in camelCase, stripping out any non-word
/// characters.
pub fn camel_case(s: &str) -> String {
    if s.chars().count() > 1 {
        let proper = proper_case(s);
        let mut chars = proper.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => first.to_lowercase().chain(chars).collect(),
        }
    } else {
        s.to_lowercase()
    }
}

pub fn upper_case(s: &str) -> String {
    s.to_uppercase()
}

pub fn lower_case(s: &str) -> String {
    s.to_lowercase()
}

// =============================================================================
// Identifiers
// =============================================================================

/// Letter or underscore start, alphanumeric or underscore continuation.
pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(is_word_char)
        }
        _ => false,
    }
}

/// Replace every character that cannot appear in an identifier with `_`.
///
/// An empty input becomes `_`.
pub fn make_valid_identifier(s: &str) -> String {
    if s.is_empty() {
        return "_".to_string();
    }
    s.chars()
        .enumerate()
        .map(|(i, c)| {
            let valid = if i == 0 {
                c.is_ascii_alphabetic() || c == '_'
            } else {
                is_word_char(c)
            };
            if valid { c } else { '_' }
        })
        .collect()
}

/// Whether `s` is a keyword in any of the generated languages.
pub fn is_reserved_word(s: &str) -> bool {
    RESERVED_WORDS.contains(s)
}

/// Turn a raw token or property name into an identifier.
///
/// A leading digit is prefixed with `_`. Unless literal identifiers are in
/// use (and the name has no namespaces), the result is camelCased. Anything
/// still invalid is sanitized and the substitution is logged.
pub fn make_valid_token(raw: &str, use_literal_identifier: bool) -> String {
    let mut token = if raw.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{raw}")
    } else {
        raw.to_string()
    };
    if !use_literal_identifier || token.contains(NAMESPACE_DELIMITER) {
        token = camel_case(&token);
    }
    if !is_valid_identifier(&token) {
        let sanitized = make_valid_identifier(&token);
        info!("Updated token {} to a valid identifier {}", raw, sanitized);
        token = sanitized;
    }
    token
}

// =============================================================================
// Documentation
// =============================================================================

/// Left-strip each line of a doc string and re-join with `leader`.
pub fn sanitize_doc(doc: Option<&str>, leader: &str) -> String {
    match doc {
        None => String::new(),
        Some(doc) => doc
            .split('\n')
            .map(str::trim_start)
            .collect::<Vec<_>>()
            .join(leader),
    }
}

// =============================================================================
// Multiple-Apply Names
// =============================================================================

/// `prefix:__INSTANCE_NAME__[:base]`
pub fn make_multiple_apply_name_template(prefix: &str, base_name: &str) -> String {
    let mut name = format!("{prefix}{NAMESPACE_DELIMITER}{INSTANCE_NAME_PLACEHOLDER}");
    if !base_name.is_empty() {
        name.push(NAMESPACE_DELIMITER);
        name.push_str(base_name);
    }
    name
}

/// Substitute `instance_name` for the placeholder in a templated name.
pub fn make_multiple_apply_name_instance(name_template: &str, instance_name: &str) -> String {
    name_template.replace(INSTANCE_NAME_PLACEHOLDER, instance_name)
}

/// Split an applied schema name like `CollectionAPI:lod` into type and instance.
pub fn type_name_and_instance(api_schema_name: &str) -> (&str, &str) {
    match api_schema_name.split_once(NAMESPACE_DELIMITER) {
        Some((type_name, instance)) => (type_name, instance),
        None => (api_schema_name, ""),
    }
}

/// Rewrite a built-in API schema name into instance-templated form, so that
/// applying the owning multiple-apply schema with instance `bar` also applies
/// `OtherAPI:bar` (or `OtherAPI:bar:foo` for `OtherAPI:foo`).
pub fn make_multiple_apply_schema_name_template(api_schema_name: &str) -> String {
    let (type_name, instance) = type_name_and_instance(api_schema_name);
    make_multiple_apply_name_template(type_name, instance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proper_case() {
        assert_eq!(proper_case("fooBar"), "FooBar");
        assert_eq!(proper_case("primvars:displayColor"), "PrimvarsDisplayColor");
        assert_eq!(proper_case("some thing-else"), "SomeThingElse");
        assert_eq!(proper_case("x"), "X");
        // Underscores are word characters
        assert_eq!(proper_case("foo_bar"), "Foo_bar");
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("FooBar"), "fooBar");
        assert_eq!(camel_case("xformOp:translate"), "xformOpTranslate");
        assert_eq!(camel_case("X"), "x");
        assert_eq!(camel_case("::"), "");
    }

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("foo_1"));
        assert!(is_valid_identifier("_foo"));
        assert!(!is_valid_identifier("1foo"));
        assert!(!is_valid_identifier("foo-bar"));
        assert!(!is_valid_identifier(""));
        assert_eq!(make_valid_identifier("foo-bar.baz"), "foo_bar_baz");
        assert_eq!(make_valid_identifier(""), "_");
    }

    #[test]
    fn test_make_valid_token() {
        assert_eq!(make_valid_token("3dTexture", false), "_3dTexture");
        assert_eq!(make_valid_token("foo:bar", true), "fooBar");
        assert_eq!(make_valid_token("Foo", true), "Foo");
        assert_eq!(make_valid_token("Foo", false), "foo");
        assert_eq!(make_valid_token("foo-bar", true), "foo_bar");
    }

    #[test]
    fn test_reserved_words() {
        assert!(is_reserved_word("class"));
        assert!(is_reserved_word("lambda"));
        assert!(is_reserved_word("None"));
        assert!(is_reserved_word("interface"));
        assert!(!is_reserved_word("points"));
    }

    #[test]
    fn test_sanitize_doc() {
        assert_eq!(sanitize_doc(None, "\n/// "), "");
        assert_eq!(sanitize_doc(Some("a\n   b"), "\n/// "), "a\n/// b");
    }

    #[test]
    fn test_multiple_apply_names() {
        assert_eq!(
            make_multiple_apply_name_template("collection", "includes"),
            "collection:__INSTANCE_NAME__:includes"
        );
        assert_eq!(
            make_multiple_apply_name_instance("collection:__INSTANCE_NAME__:includes", "lod"),
            "collection:lod:includes"
        );
        assert_eq!(
            make_multiple_apply_schema_name_template("OtherAPI"),
            "OtherAPI:__INSTANCE_NAME__"
        );
        assert_eq!(
            make_multiple_apply_schema_name_template("OtherAPI:foo"),
            "OtherAPI:__INSTANCE_NAME__:foo"
        );
    }
}
