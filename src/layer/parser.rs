//! Recursive-descent parser for the layer text format.

use indexmap::IndexMap;

use super::tokenizer::{tokenize, Token, TokenKind};
use super::{
    Dictionary, Layer, ListOpKeyword, PrimSpec, PropertyKind, PropertySpec, Specifier,
    TypedValue, Value, Variability,
};
use crate::error::{Result, SchemaGenError};

/// Parse layer text. `file` is only used in error messages.
pub fn parse_layer(text: &str, file: &str) -> Result<Layer> {
    let tokens = tokenize(text, file)?;
    let mut parser = Parser {
        tokens,
        index: 0,
        file,
    };
    parser.parse_layer()
}

struct Parser<'a> {
    tokens: Vec<Token>,
    index: usize,
    file: &'a str,
}

impl<'a> Parser<'a> {
    // =========================================================================
    // Token helpers
    // =========================================================================

    fn current(&self) -> &Token {
        // The token list always ends with Eof and Eof is never consumed.
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn peek(&self, offset: usize) -> &Token {
        &self.tokens[(self.index + offset).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.index += 1;
        }
        token
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.current().is_punct(c) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn eat_identifier(&mut self, word: &str) -> bool {
        if self.current().is_identifier(word) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<()> {
        if self.eat_punct(c) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("\"{c}\"")))
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        if self.current().kind == TokenKind::Identifier {
            Ok(self.advance().text)
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    fn expect_string(&mut self) -> Result<String> {
        match &self.current().kind {
            TokenKind::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(self.unexpected("string")),
        }
    }

    fn error_at(&self, token: &Token, message: String) -> SchemaGenError {
        SchemaGenError::Parse {
            file: self.file.to_string(),
            line: token.line,
            column: token.column,
            message,
        }
    }

    fn unexpected(&self, expected: &str) -> SchemaGenError {
        let token = self.current();
        let found = if token.kind == TokenKind::Eof {
            "end of file".to_string()
        } else {
            format!("{:?}", token.text)
        };
        self.error_at(token, format!("expected {expected} but found {found}"))
    }

    /// Statement separators are optional.
    fn skip_separators(&mut self) {
        while self.eat_punct(';') {}
    }

    // =========================================================================
    // Layer
    // =========================================================================

    fn parse_layer(&mut self) -> Result<Layer> {
        let mut layer = Layer::anonymous();

        if self.eat_punct('(') {
            self.parse_layer_metadata(&mut layer)?;
        }

        while self.current().kind != TokenKind::Eof {
            layer.root_prims.push(self.parse_prim()?);
        }
        Ok(layer)
    }

    fn parse_layer_metadata(&mut self, layer: &mut Layer) -> Result<()> {
        loop {
            self.skip_separators();
            if self.eat_punct(')') {
                return Ok(());
            }
            if let TokenKind::String(s) = &self.current().kind {
                layer.comment = Some(s.clone());
                self.advance();
                continue;
            }
            let key = self.expect_identifier()?;
            self.expect_punct('=')?;
            match key.as_str() {
                "doc" | "documentation" => layer.documentation = Some(self.expect_string()?),
                "subLayers" => {
                    self.expect_punct('[')?;
                    while !self.eat_punct(']') {
                        match &self.current().kind {
                            TokenKind::Asset(path) => {
                                layer.sub_layers.push(path.clone());
                                self.advance();
                            }
                            _ => return Err(self.unexpected("sublayer asset path")),
                        }
                        // Layer offsets are accepted and ignored.
                        if self.current().is_punct('(') {
                            self.parse_value()?;
                        }
                        self.eat_punct(',');
                    }
                }
                _ => {
                    let value = self.parse_value()?;
                    layer.metadata.insert(key, value);
                }
            }
        }
    }

    // =========================================================================
    // Prims
    // =========================================================================

    fn at_prim(&self) -> bool {
        let token = self.current();
        token.kind == TokenKind::Identifier && Specifier::from_keyword(&token.text).is_some()
    }

    fn parse_prim(&mut self) -> Result<PrimSpec> {
        let token = self.advance();
        let specifier = Specifier::from_keyword(&token.text).ok_or_else(|| {
            self.error_at(
                &token,
                format!("expected \"def\", \"over\" or \"class\" but found {:?}", token.text),
            )
        })?;

        let type_name = if self.current().kind == TokenKind::Identifier {
            self.advance().text
        } else {
            String::new()
        };
        let mut prim = PrimSpec::new(self.expect_string()?, specifier);
        prim.type_name = type_name;

        if self.eat_punct('(') {
            self.parse_prim_metadata(&mut prim)?;
        }

        self.expect_punct('{')?;
        loop {
            self.skip_separators();
            if self.eat_punct('}') {
                break;
            }
            if self.at_prim() {
                prim.children.push(self.parse_prim()?);
            } else if self.eat_identifier("reorder") {
                self.expect_identifier()?;
                self.expect_punct('=')?;
                self.parse_value()?;
            } else {
                self.parse_property(&mut prim)?;
            }
        }
        Ok(prim)
    }

    fn parse_list_op_keyword(&mut self) -> ListOpKeyword {
        let token = self.current();
        // A keyword is only a list-op keyword when a field name follows it.
        if token.kind == TokenKind::Identifier && self.peek(1).kind == TokenKind::Identifier {
            if let Some(keyword) = ListOpKeyword::from_keyword(&token.text) {
                self.index += 1;
                return keyword;
            }
        }
        ListOpKeyword::Explicit
    }

    fn parse_prim_metadata(&mut self, prim: &mut PrimSpec) -> Result<()> {
        loop {
            self.skip_separators();
            if self.eat_punct(')') {
                return Ok(());
            }
            if let TokenKind::String(s) = &self.current().kind {
                prim.documentation = Some(s.clone());
                self.advance();
                continue;
            }

            let keyword = self.parse_list_op_keyword();
            let key = self.expect_identifier()?;
            self.expect_punct('=')?;
            match key.as_str() {
                "doc" | "documentation" => prim.documentation = Some(self.expect_string()?),
                "inherits" => {
                    let paths = self.parse_path_list()?;
                    prim.inherits.set(keyword, paths);
                }
                "apiSchemas" => {
                    let names = self.parse_string_list()?;
                    prim.api_schemas.set(keyword, names);
                }
                "customData" => prim.custom_data = self.parse_dictionary()?,
                "specifier" | "typeName" => {
                    let token = self.current().clone();
                    return Err(self.error_at(&token, format!("\"{key}\" cannot be authored as metadata")));
                }
                _ => {
                    let value = self.parse_value()?;
                    prim.metadata.insert(key, value);
                }
            }
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    fn parse_property(&mut self, prim: &mut PrimSpec) -> Result<()> {
        let custom = self.eat_identifier("custom");
        let variability = if self.eat_identifier("uniform") {
            Variability::Uniform
        } else {
            self.eat_identifier("varying");
            Variability::Varying
        };

        if self.eat_identifier("rel") {
            let name = self.expect_identifier()?;
            let mut property = PropertySpec::relationship(name);
            property.custom = custom;
            property.variability = variability;
            if self.eat_punct('=') {
                let targets = self.parse_path_list()?;
                property.kind = PropertyKind::Relationship {
                    targets: Some(targets),
                };
            }
            if self.eat_punct('(') {
                self.parse_property_metadata(&mut property)?;
            }
            prim.properties.push(property);
            return Ok(());
        }

        let type_token = self.current().clone();
        let mut type_name = self.expect_identifier()?;
        if self.eat_punct('[') {
            self.expect_punct(']')?;
            type_name.push_str("[]");
        }
        let full_name = self.expect_identifier()?;

        // `name.connect = ...` and `name.timeSamples = {...}` extend the attribute.
        if let Some((name, suffix)) = full_name.rsplit_once('.') {
            self.expect_punct('=')?;
            let mut property = take_or_create_attribute(prim, name, &type_name);
            match (&mut property.kind, suffix) {
                (PropertyKind::Attribute { connections, .. }, "connect") => {
                    *connections = Some(self.parse_path_list()?);
                }
                (PropertyKind::Attribute { has_time_samples, .. }, "timeSamples") => {
                    self.parse_time_samples()?;
                    *has_time_samples = true;
                }
                _ => {
                    return Err(self.error_at(
                        &type_token,
                        format!("unsupported attribute field \"{suffix}\""),
                    ))
                }
            }
            prim.properties.push(property);
            return Ok(());
        }

        let mut property = take_or_create_attribute(prim, &full_name, &type_name);
        property.custom = custom;
        property.variability = variability;
        if self.eat_punct('=') {
            let value = self.parse_value()?;
            if let PropertyKind::Attribute { default, .. } = &mut property.kind {
                *default = Some(value);
            }
        }
        if self.eat_punct('(') {
            self.parse_property_metadata(&mut property)?;
        }
        prim.properties.push(property);
        Ok(())
    }

    fn parse_property_metadata(&mut self, property: &mut PropertySpec) -> Result<()> {
        loop {
            self.skip_separators();
            if self.eat_punct(')') {
                return Ok(());
            }
            if let TokenKind::String(s) = &self.current().kind {
                property.documentation = Some(s.clone());
                self.advance();
                continue;
            }
            let key = self.expect_identifier()?;
            self.expect_punct('=')?;
            match key.as_str() {
                "doc" | "documentation" => property.documentation = Some(self.expect_string()?),
                "allowedTokens" => property.allowed_tokens = Some(self.parse_string_list()?),
                "customData" => property.custom_data = self.parse_dictionary()?,
                _ => {
                    let value = self.parse_value()?;
                    property.metadata.insert(key, value);
                }
            }
        }
    }

    fn parse_time_samples(&mut self) -> Result<()> {
        self.expect_punct('{')?;
        while !self.eat_punct('}') {
            if self.current().kind != TokenKind::Number {
                return Err(self.unexpected("time code"));
            }
            self.advance();
            self.expect_punct(':')?;
            self.parse_value()?;
            self.eat_punct(',');
        }
        Ok(())
    }

    // =========================================================================
    // Values
    // =========================================================================

    /// A single path, a bracketed list of paths, or `None`.
    fn parse_path_list(&mut self) -> Result<Vec<String>> {
        if self.eat_identifier("None") {
            return Ok(Vec::new());
        }
        if let TokenKind::Path(path) = &self.current().kind {
            let path = path.clone();
            self.advance();
            return Ok(vec![path]);
        }
        self.expect_punct('[')?;
        let mut paths = Vec::new();
        while !self.eat_punct(']') {
            match &self.current().kind {
                TokenKind::Path(path) => {
                    paths.push(path.clone());
                    self.advance();
                }
                _ => return Err(self.unexpected("path")),
            }
            self.eat_punct(',');
        }
        Ok(paths)
    }

    fn parse_string_list(&mut self) -> Result<Vec<String>> {
        if self.eat_identifier("None") {
            return Ok(Vec::new());
        }
        self.expect_punct('[')?;
        let mut items = Vec::new();
        while !self.eat_punct(']') {
            items.push(self.expect_string()?);
            self.eat_punct(',');
        }
        Ok(items)
    }

    fn parse_value(&mut self) -> Result<Value> {
        let token = self.current().clone();
        let value = match &token.kind {
            TokenKind::String(s) => {
                self.advance();
                Value::String(s.clone())
            }
            TokenKind::Asset(s) => {
                self.advance();
                // Asset-and-prim-path pairs (references) keep only the asset.
                if let TokenKind::Path(_) = self.current().kind {
                    self.advance();
                }
                Value::Asset(s.clone())
            }
            TokenKind::Path(s) => {
                self.advance();
                Value::Path(s.clone())
            }
            TokenKind::Number => {
                self.advance();
                Value::Number(token.text.clone())
            }
            TokenKind::Identifier => {
                self.advance();
                match token.text.as_str() {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    "None" => Value::None,
                    "inf" | "-inf" | "nan" => Value::Number(token.text.clone()),
                    // Bare identifiers only appear as enum-like metadata values.
                    other => Value::String(other.to_string()),
                }
            }
            TokenKind::Punct('[') => {
                self.advance();
                Value::Array(self.parse_sequence(']')?)
            }
            TokenKind::Punct('(') => {
                self.advance();
                Value::Tuple(self.parse_sequence(')')?)
            }
            TokenKind::Punct('{') => Value::Dictionary(self.parse_dictionary()?),
            _ => return Err(self.unexpected("value")),
        };
        Ok(value)
    }

    fn parse_sequence(&mut self, close: char) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        while !self.eat_punct(close) {
            items.push(self.parse_value()?);
            if !self.eat_punct(',') && !self.current().is_punct(close) {
                return Err(self.unexpected(&format!("\",\" or \"{close}\"")));
            }
        }
        Ok(items)
    }

    /// `{ type key = value ... }`
    fn parse_dictionary(&mut self) -> Result<Dictionary> {
        self.expect_punct('{')?;
        let mut dict = IndexMap::new();
        loop {
            self.skip_separators();
            self.eat_punct(',');
            if self.eat_punct('}') {
                return Ok(dict);
            }
            let mut type_name = self.expect_identifier()?;
            if self.eat_punct('[') {
                self.expect_punct(']')?;
                type_name.push_str("[]");
            }
            let key = match &self.current().kind {
                TokenKind::String(s) => {
                    let s = s.clone();
                    self.advance();
                    s
                }
                _ => self.expect_identifier()?,
            };
            self.expect_punct('=')?;
            let value = if type_name == "dictionary" {
                Value::Dictionary(self.parse_dictionary()?)
            } else {
                self.parse_value()?
            };
            dict.insert(key, TypedValue::new(type_name, value));
        }
    }
}

/// Remove an already-declared attribute so it can be extended in place, or
/// start a new one.
fn take_or_create_attribute(prim: &mut PrimSpec, name: &str, type_name: &str) -> PropertySpec {
    match prim.properties.iter().position(|p| p.name == name && p.is_attribute()) {
        Some(index) => prim.properties.remove(index),
        None => PropertySpec::attribute(name, type_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::DictionaryExt;

    const SAMPLE: &str = r#"#usda 1.0
(
    "Layer comment"
    doc = "Layer docs"
    subLayers = [
        @../base/schema.usda@
    ]
)

over "GLOBAL" (
    customData = {
        string libraryName = "myLib"
        bool useLiteralIdentifier = 0
        dictionary libraryTokens = {
            dictionary foo = {
                string doc = "foo doc"
            }
        }
    }
) {
}

class Widget "Widget" (
    inherits = </Typed>
    doc = """Multi
    line"""
    prepend apiSchemas = ["FooAPI"]
    customData = {
        string[] extraIncludes = ["a.h", "b.h"]
    }
)
{
    uniform token mode = "fast" (
        allowedTokens = ["fast", "slow"]
        doc = "Mode"
        customData = {
            string apiName = "speed"
        }
    )
    float3[] points
    double radius = 1.5
    rel target (doc = "Target")
    float width.connect = </Other.width>
}
"#;

    #[test]
    fn test_parse_layer_metadata() {
        let layer = parse_layer(SAMPLE, "sample.usda").unwrap();
        assert_eq!(layer.comment.as_deref(), Some("Layer comment"));
        assert_eq!(layer.documentation.as_deref(), Some("Layer docs"));
        assert_eq!(layer.sub_layers, vec!["../base/schema.usda"]);
        assert_eq!(layer.root_prims.len(), 2);
    }

    #[test]
    fn test_parse_global_custom_data() {
        let layer = parse_layer(SAMPLE, "sample.usda").unwrap();
        let global = layer.prim("GLOBAL").unwrap();
        assert_eq!(global.specifier, Specifier::Over);
        assert_eq!(global.custom_data.get_str("libraryName"), Some("myLib"));
        assert_eq!(global.custom_data.get_bool("useLiteralIdentifier"), Some(false));
        let tokens = global.custom_data.get_dict("libraryTokens").unwrap();
        assert_eq!(tokens.get_dict("foo").unwrap().get_str("doc"), Some("foo doc"));
    }

    #[test]
    fn test_parse_class() {
        let layer = parse_layer(SAMPLE, "sample.usda").unwrap();
        let widget = layer.prim("Widget").unwrap();
        assert_eq!(widget.specifier, Specifier::Class);
        assert_eq!(widget.type_name, "Widget");
        assert_eq!(widget.inherits.explicit, Some(vec!["/Typed".to_string()]));
        assert_eq!(widget.api_schemas.prepended, vec!["FooAPI".to_string()]);
        assert_eq!(widget.documentation.as_deref(), Some("Multi\n    line"));
        assert_eq!(
            widget.custom_data.get_str_list("extraIncludes"),
            Some(vec!["a.h".to_string(), "b.h".to_string()])
        );
    }

    #[test]
    fn test_parse_properties() {
        let layer = parse_layer(SAMPLE, "sample.usda").unwrap();
        let widget = layer.prim("Widget").unwrap();
        let names: Vec<&str> = widget.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["mode", "points", "radius", "target", "width"]);

        let mode = widget.property("mode").unwrap();
        assert_eq!(mode.variability, Variability::Uniform);
        assert_eq!(mode.type_name(), Some("token"));
        assert_eq!(mode.default_value(), Some(&Value::String("fast".into())));
        assert_eq!(mode.allowed_tokens.as_ref().unwrap().len(), 2);
        assert_eq!(mode.custom_data.get_str("apiName"), Some("speed"));

        assert_eq!(widget.property("points").unwrap().type_name(), Some("float3[]"));
        assert_eq!(
            widget.property("radius").unwrap().default_value(),
            Some(&Value::Number("1.5".into()))
        );
        let target = widget.property("target").unwrap();
        assert!(!target.is_attribute());
        assert_eq!(target.documentation.as_deref(), Some("Target"));

        let width = widget.property("width").unwrap();
        assert!(width.info_keys().contains(&"connectionPaths".to_string()));
    }

    #[test]
    fn test_parse_error_location() {
        let err = parse_layer("class \"A\" {\n    float\n}", "broken.usda").unwrap_err();
        match err {
            SchemaGenError::Parse { file, line, .. } => {
                assert_eq!(file, "broken.usda");
                assert_eq!(line, 3);
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_list_op_keyword_requires_field_name() {
        let layer = parse_layer(
            "class \"A\" (\n    delete inherits = </B>\n    append apiSchemas = [\"X\"]\n) {}",
            "t",
        )
        .unwrap();
        let a = layer.prim("A").unwrap();
        assert_eq!(a.inherits.deleted, vec!["/B".to_string()]);
        assert_eq!(a.api_schemas.appended, vec!["X".to_string()]);
        assert!(!a.api_schemas.is_prepend_only());
    }
}
