//! Token Gathering
//!
//! Collects every string constant the generated code refers to: attribute
//! and relationship names, token-valued fallbacks, allowed values, schema
//! tokens, namespace prefixes and library tokens.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{Result, SchemaGenError};
use crate::layer::{Dictionary, DictionaryExt, Value};
use crate::names::{camel_case, is_reserved_word, is_valid_identifier, make_valid_token, proper_case, sanitize_doc};
use crate::schema::ClassInfo;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    /// Identifier used in generated code.
    pub id: String,
    /// Literal string value.
    pub value: String,
    pub desc: String,
}

/// Token identifiers mapped to their tokens, in insertion order.
#[derive(Debug, Default)]
struct TokenTable {
    tokens: IndexMap<String, Token>,
}

impl TokenTable {
    /// Add a token, returning the identifier it was stored under.
    ///
    /// Reserved words get a trailing underscore. Identifiers already present
    /// must map to the same value; their descriptions are merged newest first.
    fn add(&mut self, id: &str, value: &str, desc: &str, use_literal_identifier: bool) -> Result<String> {
        let mut id = id.to_string();
        if is_reserved_word(&id) {
            id.push('_');
        }
        if !is_valid_identifier(&id) {
            id = make_valid_token(&id, use_literal_identifier);
        } else if !use_literal_identifier {
            id = camel_case(&id);
        }

        match self.tokens.get_mut(&id) {
            Some(existing) => {
                if existing.value != value {
                    return Err(SchemaGenError::TokenConflict {
                        id,
                        existing: existing.value.clone(),
                        conflicting: value.to_string(),
                    });
                }
                existing.desc = format!("{desc}, {}", existing.desc);
            }
            None => {
                self.tokens.insert(
                    id.clone(),
                    Token {
                        id: id.clone(),
                        value: value.to_string(),
                        desc: desc.to_string(),
                    },
                );
            }
        }
        Ok(id)
    }

    /// Case-insensitive order first, case-sensitive second.
    fn into_sorted(self) -> Vec<Token> {
        let mut tokens: Vec<Token> = self.tokens.into_values().collect();
        tokens.sort_by(|a, b| {
            a.id.to_lowercase()
                .cmp(&b.id.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        tokens
    }
}

fn accessor_desc(kind: &str, cls: &ClassInfo, api_name: &str, raw_name: &str) -> String {
    if api_name.is_empty() {
        format!("{kind} for {} schema attribute {raw_name}", cls.cpp_class_name)
    } else {
        format!("{kind} for {}::Get{}Attr()", cls.cpp_class_name, proper_case(api_name))
    }
}

fn token_info(entry: Option<&Dictionary>, key: &str) -> Option<String> {
    entry.and_then(|d| d.get_str(key)).map(str::to_string)
}

/// Gather the tokens of every class plus the library-wide tokens.
///
/// Each class's `tokens` set is filled with the identifiers it contributed.
pub fn gather_tokens(
    classes: &mut [ClassInfo],
    library_name: &str,
    library_tokens: &Dictionary,
) -> Result<Vec<Token>> {
    let mut table = TokenTable::default();

    for cls in classes.iter_mut() {
        // Reverse name order so the prepended descriptions read forward.
        let mut attrs: Vec<_> = cls.attrs.values().collect();
        attrs.sort_by_key(|a| std::cmp::Reverse(a.prop.name.to_lowercase()));

        let mut contributed = Vec::new();
        for attr in attrs {
            contributed.push(attr.prop.name.clone());
            table.add(&attr.prop.name, &attr.prop.raw_name, &cls.cpp_class_name, false)?;

            if attr.is_token_typed() {
                if let Some(Value::String(fallback)) = &attr.fallback {
                    if !fallback.is_empty() {
                        let desc = accessor_desc("Default value", cls, &attr.prop.api_name, &attr.prop.raw_name);
                        contributed.push(table.add(fallback, fallback, &desc, cls.use_literal_identifier)?);
                    }
                }
            }

            for value in attr.allowed_tokens.iter().flatten() {
                // Empty strings are allowed values but get no named constant.
                if value.is_empty() {
                    continue;
                }
                let desc = accessor_desc("Possible value", cls, &attr.prop.api_name, &attr.prop.raw_name);
                contributed.push(table.add(value, value, &desc, cls.use_literal_identifier)?);
            }
        }

        // Relationship names, schema tokens, namespace prefixes and library
        // tokens keep their literal spelling.
        for rel in cls.rels.values() {
            contributed.push(rel.prop.name.clone());
            table.add(&rel.prop.name, &rel.prop.raw_name, &cls.cpp_class_name, true)?;
        }

        if let Some(schema_tokens) = cls.custom_data.get_dict("schemaTokens") {
            for (token, entry) in schema_tokens {
                let info = entry.value.as_dict();
                let value = token_info(info, "value").unwrap_or_else(|| token.clone());
                let doc = token_info(info, "doc")
                    .unwrap_or_else(|| format!("Special token for the {} schema.", cls.cpp_class_name));
                contributed.push(token.clone());
                table.add(token, &value, &sanitize_doc(Some(&doc), " "), true)?;
            }
        }

        if let Some(prefix) = &cls.property_namespace_prefix {
            contributed.push(prefix.clone());
            let desc = format!("Property namespace prefix for the {} schema.", cls.cpp_class_name);
            table.add(prefix, prefix, &desc, true)?;
        }

        cls.tokens.extend(contributed);
    }

    for (token, entry) in library_tokens {
        let info = entry.value.as_dict();
        let value = token_info(info, "value").unwrap_or_else(|| token.clone());
        let doc = token_info(info, "doc")
            .unwrap_or_else(|| format!("Special token for the {library_name} library."));
        table.add(token, &value, &sanitize_doc(Some(&doc), " "), true)?;
    }

    Ok(table.into_sorted())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{parse_layer, LayerStack};
    use crate::schema::parse_schema;
    use crate::types::TypeRegistry;

    const CLASSES: &str = r#"class Widget "Widget" (
    inherits = </Typed>
    customData = {
        dictionary schemaTokens = {
            dictionary SpecialOne = {
                string value = "special-one"
                string doc = """First special
                token"""
            }
        }
    }
) {
    uniform token mode = "FastMode" (
        allowedTokens = ["FastMode", "SlowMode"]
    )
}

class "ShinyAPI" (
    inherits = </APISchemaBase>
    customData = {
        dictionary schemaTokens = {
            dictionary SpecialOne = {
                string value = "special-one"
                string doc = "Shiny use"
            }
        }
    }
) {
}
"#;

    fn global(name: &str, path: &str, extra: &str) -> String {
        format!(
            "#usda 1.0\nover \"GLOBAL\" (\n    customData = {{\n        string libraryName = \"{name}\"\n        string libraryPath = \"{path}\"\n{extra}    }}\n) {{\n}}\n\n"
        )
    }

    /// Gather the tokens of `CLASSES`, with `root_extra` and `base_extra`
    /// added to the root and sublayer `/GLOBAL` customData.
    fn gather(root_extra: &str, base_extra: &str) -> Vec<Token> {
        let root = global("myLib", "my/lib", root_extra) + CLASSES;
        let base = global("usd", "wabi/usd/usd", base_extra)
            + "class \"Typed\" {\n}\n\nclass \"APISchemaBase\" {\n}\n";
        let stack = LayerStack::from_layers(vec![
            parse_layer(&root, "schema.usda").unwrap(),
            parse_layer(&base, "base.usda").unwrap(),
        ]);
        let parsed = parse_schema(&stack, &TypeRegistry::new(), "UsdSchemaBase").unwrap();
        let mut classes = parsed.classes;
        gather_tokens(&mut classes, &parsed.library.name, &parsed.library.library_tokens).unwrap()
    }

    fn ids(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_literal_identifiers_keep_spelling() {
        let tokens = gather("        bool useLiteralIdentifier = true\n", "");
        assert_eq!(ids(&tokens), ["FastMode", "mode", "SlowMode", "SpecialOne"]);
    }

    #[test]
    fn test_literal_flag_only_read_from_root_layer() {
        let tokens = gather("", "        bool useLiteralIdentifier = true\n");
        assert_eq!(ids(&tokens), ["fastMode", "mode", "slowMode", "SpecialOne"]);
    }

    #[test]
    fn test_schema_tokens_merge_docs() {
        let tokens = gather("", "");
        let special = tokens.iter().find(|t| t.id == "SpecialOne").unwrap();
        assert_eq!(special.value, "special-one");
        assert_eq!(special.desc, "Shiny use, First special token");
    }

    #[test]
    fn test_reserved_word_gets_underscore() {
        let mut table = TokenTable::default();
        assert_eq!(table.add("class", "class", "d", false).unwrap(), "class_");
        assert_eq!(table.add("None", "None", "d", true).unwrap(), "None_");
    }

    #[test]
    fn test_camel_case_unless_literal() {
        let mut table = TokenTable::default();
        assert_eq!(table.add("FooBar", "FooBar", "d", false).unwrap(), "fooBar");
        assert_eq!(table.add("FooBar", "FooBar", "d", true).unwrap(), "FooBar");
        assert_eq!(table.add("foo:bar", "foo:bar", "d", true).unwrap(), "fooBar");
    }

    #[test]
    fn test_descriptions_merge_newest_first() {
        let mut table = TokenTable::default();
        table.add("size", "size", "UsdA", false).unwrap();
        table.add("size", "size", "UsdB", false).unwrap();
        let tokens = table.into_sorted();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].desc, "UsdB, UsdA");
    }

    #[test]
    fn test_conflicting_values_fail() {
        let mut table = TokenTable::default();
        table.add("fooBar", "foo:bar", "UsdA", false).unwrap();
        let err = table.add("fooBar", "fooBar", "UsdB", false).unwrap_err();
        assert!(err
            .to_string()
            .contains("One-to-Many mapping encountered: fooBar maps to \"foo:bar\" and \"fooBar\""));
    }

    #[test]
    fn test_sort_order() {
        let mut table = TokenTable::default();
        for id in ["beta", "Alpha", "alpha", "Beta_", "gamma"] {
            table.add(id, id, "d", true).unwrap();
        }
        let ids: Vec<String> = table.into_sorted().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, ["Alpha", "alpha", "beta", "Beta_", "gamma"]);
    }
}
