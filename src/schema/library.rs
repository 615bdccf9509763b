//! Library-wide settings authored on the `/GLOBAL` prim.

use crate::error::{Result, SchemaGenError};
use crate::layer::{Dictionary, DictionaryExt, Layer, LayerStack};
use crate::names::proper_case;

pub const GLOBAL_PRIM_NAME: &str = "GLOBAL";

/// Settings for the library being generated.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryInfo {
    pub name: String,
    /// Empty when code generation is skipped.
    pub path: String,
    /// Prefix of every generated class name.
    pub prefix: String,
    pub tokens_prefix: String,
    pub use_export_api: bool,
    pub library_tokens: Dictionary,
    /// True when any layer in the stack opts out of code generation.
    pub skip_code_generation: bool,
    /// Read from the schema file itself, never from sublayers.
    pub use_literal_identifier: bool,
}

impl LibraryInfo {
    pub fn from_stack(stack: &LayerStack) -> Result<Self> {
        let root = stack.root();
        Ok(Self {
            name: library_name(root)?,
            path: library_path(root)?,
            prefix: library_prefix(root)?,
            tokens_prefix: tokens_prefix(root)?,
            use_export_api: metadata(root)?.get_bool("useExportAPI").unwrap_or(true),
            library_tokens: metadata(root)?
                .get_dict("libraryTokens")
                .cloned()
                .unwrap_or_default(),
            skip_code_generation: stack.layers().iter().any(skips_code_generation),
            use_literal_identifier: uses_literal_identifier(root),
        })
    }
}

/// customData of the layer's `/GLOBAL` prim.
pub fn metadata(layer: &Layer) -> Result<&Dictionary> {
    let global = layer.prim(GLOBAL_PRIM_NAME).ok_or_else(|| {
        SchemaGenError::config(
            "Code generation requires a \"/GLOBAL\" prim with customData to define at \
             least libraryName. GLOBAL prim not found.",
        )
    })?;
    if global.custom_data.is_empty() {
        return Err(SchemaGenError::config(
            "customData is either empty or not defined on /GLOBAL prim. At least \
             \"libraryName\" entries in customData are required for code generation.",
        ));
    }
    Ok(&global.custom_data)
}

pub fn library_name(layer: &Layer) -> Result<String> {
    metadata(layer)?
        .get_str("libraryName")
        .map(str::to_string)
        .ok_or_else(|| {
            SchemaGenError::config(
                "Code generation requires that \"libraryName\" be defined in customData \
                 on /GLOBAL prim.",
            )
        })
}

pub fn library_path(layer: &Layer) -> Result<String> {
    if skips_code_generation(layer) {
        return Ok(String::new());
    }
    metadata(layer)?
        .get_str("libraryPath")
        .map(str::to_string)
        .ok_or_else(|| {
            SchemaGenError::config(
                "\"libraryPath\" is required in customData on /GLOBAL prim unless the \
                 schema is declared codeless by specifying skipCodeGeneration=true. The \
                 format for libraryPath is \"path/to/lib\".",
            )
        })
}

/// Falls back to ProperCase(libraryName).
pub fn library_prefix(layer: &Layer) -> Result<String> {
    match metadata(layer)?.get_str("libraryPrefix") {
        Some(prefix) => Ok(prefix.to_string()),
        None => Ok(proper_case(&library_name(layer)?)),
    }
}

/// Falls back to the library prefix.
pub fn tokens_prefix(layer: &Layer) -> Result<String> {
    match metadata(layer)?.get_str("tokensPrefix") {
        Some(prefix) => Ok(prefix.to_string()),
        None => library_prefix(layer),
    }
}

/// Layers without library metadata never skip.
pub fn skips_code_generation(layer: &Layer) -> bool {
    metadata(layer)
        .ok()
        .and_then(|m| m.get_bool("skipCodeGeneration"))
        .unwrap_or(false)
}

pub fn uses_literal_identifier(layer: &Layer) -> bool {
    metadata(layer)
        .ok()
        .and_then(|m| m.get_bool("useLiteralIdentifier"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::parse_layer;

    fn layer(custom_data: &str) -> Layer {
        let text = format!("#usda 1.0\nover \"GLOBAL\" (\n    customData = {{\n{custom_data}\n    }}\n) {{\n}}\n");
        parse_layer(&text, "global.usda").unwrap()
    }

    #[test]
    fn test_defaults() {
        let root = layer("string libraryName = \"myLib\"\nstring libraryPath = \"my/lib\"");
        let stack = LayerStack::from_layers(vec![root]);
        let info = LibraryInfo::from_stack(&stack).unwrap();
        assert_eq!(info.name, "myLib");
        assert_eq!(info.path, "my/lib");
        assert_eq!(info.prefix, "MyLib");
        assert_eq!(info.tokens_prefix, "MyLib");
        assert!(info.use_export_api);
        assert!(!info.skip_code_generation);
        assert!(!info.use_literal_identifier);
    }

    #[test]
    fn test_explicit_prefixes() {
        let root = layer(
            "string libraryName = \"myLib\"\nstring libraryPath = \"my/lib\"\n\
             string libraryPrefix = \"Ml\"\nstring tokensPrefix = \"MlT\"\nbool useExportAPI = false",
        );
        let info = LibraryInfo::from_stack(&LayerStack::from_layers(vec![root])).unwrap();
        assert_eq!(info.prefix, "Ml");
        assert_eq!(info.tokens_prefix, "MlT");
        assert!(!info.use_export_api);
    }

    #[test]
    fn test_missing_library_path() {
        let root = layer("string libraryName = \"foo\"");
        let err = LibraryInfo::from_stack(&LayerStack::from_layers(vec![root])).unwrap_err();
        assert!(err.to_string().contains("\"libraryPath\" is required"));
    }

    #[test]
    fn test_codeless_library() {
        let root = layer("string libraryName = \"foo\"\nbool skipCodeGeneration = true");
        let info = LibraryInfo::from_stack(&LayerStack::from_layers(vec![root])).unwrap();
        assert_eq!(info.path, "");
        assert!(info.skip_code_generation);
    }

    #[test]
    fn test_missing_global() {
        let root = parse_layer("#usda 1.0\nclass \"Foo\" {\n}\n", "t").unwrap();
        let err = LibraryInfo::from_stack(&LayerStack::from_layers(vec![root])).unwrap_err();
        assert!(err.to_string().contains("GLOBAL prim not found"));
    }

    #[test]
    fn test_skip_code_generation_from_sublayer() {
        let root = layer("string libraryName = \"foo\"\nstring libraryPath = \"foo\"");
        let sub = layer("string libraryName = \"bar\"\nbool skipCodeGeneration = true");
        let info = LibraryInfo::from_stack(&LayerStack::from_layers(vec![root, sub])).unwrap();
        assert_eq!(info.path, "foo");
        assert!(info.skip_code_generation);
    }
}
