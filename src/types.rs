//! Registered Schema Types
//!
//! Schema libraries that were generated before, and that the schema being
//! generated sublayers, are known by their `plugInfo.json` and
//! `generatedSchema.usda` sitting next to their `schema.usda`. They answer
//! two questions during generation:
//!
//! - is an out-of-batch parent API schema applied, and is it multiple-apply
//! - which prim definitions are built in and so cannot be overridden

use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::layer::{Layer, LayerStack, PrimDefinitions, Specifier};
use crate::plug_info::{plugin_types, read_plug_info, PLUG_INFO_FILE};
use crate::registry::GENERATED_SCHEMA_FILE;
use crate::schema::SchemaKind;

/// A schema class registered by a previously generated library.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredType {
    pub cpp_name: String,
    pub bases: Vec<String>,
    /// Absent for entries written before schema kinds were recorded.
    pub schema_kind: Option<SchemaKind>,
}

impl RegisteredType {
    fn from_entry(cpp_name: &str, entry: &Value) -> Self {
        Self {
            cpp_name: cpp_name.to_string(),
            bases: entry
                .get("bases")
                .and_then(Value::as_array)
                .map(|bases| {
                    bases
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            schema_kind: entry
                .get("schemaKind")
                .and_then(Value::as_str)
                .and_then(|kind| kind.parse().ok()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: IndexMap<String, RegisteredType>,
    definitions: PrimDefinitions,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the libraries behind every sublayer of `stack`.
    ///
    /// Unreadable or malformed files are skipped with a warning.
    pub fn from_layer_stack(stack: &LayerStack) -> Self {
        let mut registry = Self::new();
        for layer in stack.sublayers() {
            let Some(dir) = layer.directory().filter(|d| !d.as_os_str().is_empty()) else {
                continue;
            };
            registry.load_plug_info(&dir.join(PLUG_INFO_FILE));
            registry.load_generated_schema(&dir.join(GENERATED_SCHEMA_FILE));
        }
        debug!(
            "Registered {} schema types and {} prim definitions",
            registry.types.len(),
            registry.definitions.len()
        );
        registry
    }

    fn load_plug_info(&mut self, path: &Path) {
        if !path.is_file() {
            return;
        }
        match read_plug_info(path) {
            Ok(info) => {
                for types in plugin_types(&info) {
                    for (cpp_name, entry) in types {
                        self.register(RegisteredType::from_entry(cpp_name, entry));
                    }
                }
            }
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    fn load_generated_schema(&mut self, path: &Path) {
        if !path.is_file() {
            return;
        }
        match Layer::open(path) {
            Ok(layer) => {
                for prim in layer.root_prims {
                    if prim.specifier == Specifier::Class {
                        self.definitions.insert(prim.name.clone(), prim);
                    }
                }
            }
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    /// Register a type; earlier (stronger) registrations win.
    pub fn register(&mut self, registered: RegisteredType) {
        self.types
            .entry(registered.cpp_name.clone())
            .or_insert(registered);
    }

    pub fn find(&self, cpp_name: &str) -> Option<&RegisteredType> {
        self.types.get(cpp_name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn is_applied_api_schema(&self, cpp_name: &str) -> bool {
        self.find(cpp_name)
            .and_then(|t| t.schema_kind)
            .is_some_and(|k| k.is_applied_api())
    }

    pub fn is_multiple_apply_api_schema(&self, cpp_name: &str) -> bool {
        self.find(cpp_name)
            .and_then(|t| t.schema_kind)
            .is_some_and(|k| k.is_multiple_apply())
    }

    /// Built-in prim definitions, keyed by schema type name.
    pub fn definitions(&self) -> &PrimDefinitions {
        &self.definitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_kinds() {
        let mut registry = TypeRegistry::new();
        registry.register(RegisteredType::from_entry(
            "UsdCollectionAPI",
            &json!({ "bases": ["UsdAPISchemaBase"], "schemaKind": "multipleApplyAPI" }),
        ));
        registry.register(RegisteredType::from_entry(
            "UsdModelAPI",
            &json!({ "bases": ["UsdAPISchemaBase"], "schemaKind": "nonAppliedAPI" }),
        ));
        registry.register(RegisteredType::from_entry("UsdLegacy", &json!({})));

        assert!(registry.is_applied_api_schema("UsdCollectionAPI"));
        assert!(registry.is_multiple_apply_api_schema("UsdCollectionAPI"));
        assert!(!registry.is_applied_api_schema("UsdModelAPI"));
        assert!(!registry.is_applied_api_schema("UsdLegacy"));
        assert!(registry.find("UsdMissing").is_none());
        assert_eq!(registry.find("UsdModelAPI").unwrap().bases, ["UsdAPISchemaBase"]);
    }

    #[test]
    fn test_first_registration_wins() {
        let mut registry = TypeRegistry::new();
        registry.register(RegisteredType::from_entry("A", &json!({ "schemaKind": "singleApplyAPI" })));
        registry.register(RegisteredType::from_entry("A", &json!({ "schemaKind": "nonAppliedAPI" })));
        assert_eq!(registry.len(), 1);
        assert!(registry.is_applied_api_schema("A"));
    }
}
