//! Schema Registry Document
//!
//! Writes `generatedSchema.usda`: every generated class flattened into one
//! self-contained prim, with inherited members copied in and authoring-only
//! data (customData, library metadata, classes of other libraries) removed.
//! Runtime consumers read this file instead of composing `schema.usda`.

use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info};

use crate::error::{Result, SchemaGenError};
use crate::layer::{
    export_to_string, Dictionary, DictionaryExt, Layer, LayerStack, ListOp, PrimSpec, Specifier,
    TypedValue, Value,
};
use crate::names::make_multiple_apply_name_template;
use crate::output::OutputWriter;
use crate::schema::library::GLOBAL_PRIM_NAME;
use crate::schema::{ApiSchemaType, ClassInfo, API_SUFFIX};
use crate::types::TypeRegistry;

pub const GENERATED_SCHEMA_FILE: &str = "generatedSchema.usda";

const MANGLE_PREFIX: &str = "__MANGLED_TO_AVOID_BUILTINS__";

const GENERATED_COMMENT: &str = "WARNING: THIS FILE IS GENERATED BY schemagen.  DO NOT EDIT.";

lazy_static! {
    static ref REF_MARKUP: Regex = Regex::new(r"\\+ref [^\s]+ ").unwrap();
    static ref SECTION_MARKUP: Regex = Regex::new(r"\\+section [^\s]+ ").unwrap();
}

fn mangle(type_name: &str) -> String {
    format!("{MANGLE_PREFIX}{type_name}")
}

fn demangle(type_name: &str) -> String {
    type_name.replace(MANGLE_PREFIX, "")
}

// =============================================================================
// Flattening
// =============================================================================

/// Flatten the stack with type names mangled so that built-in definitions of
/// the very types being generated do not pin their properties.
pub fn flatten_for_registry(stack: &LayerStack, types: &TypeRegistry) -> Layer {
    let mut session = Layer::anonymous();
    for name in stack.root_prim_names() {
        let type_name = stack.composed_type_name(&name);
        if !type_name.is_empty() {
            let mut over = PrimSpec::new(name, Specifier::Over);
            over.type_name = mangle(&type_name);
            session.root_prims.push(over);
        }
    }

    let mut flat = stack.flatten(&session, types.definitions());
    for prim in &mut flat.root_prims {
        prim.type_name = demangle(&prim.type_name);
        // Only the class's own opinion counts; parents' docs are not inherited.
        prim.documentation = stack
            .prim_stack(&prim.name)
            .into_iter()
            .find_map(|(_, spec)| spec.documentation.clone());
    }
    flat
}

/// Copy every property of a multiple-apply schema to its instance-templated
/// name and drop the originals.
fn rename_with_instance_prefix(prim: &mut PrimSpec) -> Result<()> {
    if prim.properties.is_empty() {
        return Ok(());
    }
    let prefix = prim
        .custom_data
        .get_str("propertyNamespacePrefix")
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            SchemaGenError::definition(
                prim.path(),
                "propertyNamespacePrefix must exist as a metadata field on multiple-apply API \
                 schemas with properties",
            )
        })?;

    let mut renamed = Vec::with_capacity(prim.properties.len());
    for property in &prim.properties {
        let name = make_multiple_apply_name_template(&prefix, &property.name);
        if prim.has_property(&name) {
            return Err(SchemaGenError::definition(
                prim.path(),
                format!("Prefixed property name '{name}' already exists as property base name in the schema."),
            ));
        }
        let mut property = property.clone();
        property.name = name;
        renamed.push(property);
    }
    prim.properties = renamed;
    Ok(())
}

/// API schema prims may only carry a few metadata fields.
fn check_api_metadata(prim: &PrimSpec, api_schema_type: &str) -> Result<()> {
    let mut allowed = vec!["specifier", "customData", "documentation"];
    if api_schema_type != ApiSchemaType::NonApplied.as_str() {
        allowed.push("apiSchemas");
    }
    let invalid: Vec<String> = prim
        .info_keys()
        .into_iter()
        .filter(|key| !allowed.contains(&key.as_str()))
        .collect();
    if invalid.is_empty() {
        return Ok(());
    }
    Err(SchemaGenError::definition(
        prim.path(),
        format!(
            "Found invalid metadata fields {invalid:?} in API schema definition. API schemas of \
             type {api_schema_type} can only provide prim metadata fallbacks for {allowed:?}"
        ),
    ))
}

/// Build the registry layer for the parsed `classes`.
pub fn build_registry_layer(
    stack: &LayerStack,
    classes: &[ClassInfo],
    types: &TypeRegistry,
) -> Result<Layer> {
    let mut flat = flatten_for_registry(stack, types);

    if !flat.remove_prim(GLOBAL_PRIM_NAME) {
        error!("Could not remove GLOBAL prim.");
    }
    flat.root_prims
        .retain(|prim| classes.iter().any(|cls| cls.usd_prim_type_name == prim.name));

    let mut fallback_types = Dictionary::new();
    for prim in &mut flat.root_prims {
        let Some(cls) = classes.iter().find(|cls| cls.usd_prim_type_name == prim.name) else {
            continue;
        };

        if prim.name.ends_with(API_SUFFIX) {
            let api_schema_type = prim
                .custom_data
                .get_str("apiSchemaType")
                .unwrap_or(ApiSchemaType::SingleApply.as_str())
                .to_string();
            if api_schema_type == ApiSchemaType::MultipleApply.as_str() {
                rename_with_instance_prefix(prim)?;
            }
            check_api_metadata(prim, &api_schema_type)?;
        }

        if !prim.type_name.is_empty() {
            if let Some(fallbacks) = prim
                .custom_data
                .get_str_list("fallbackTypes")
                .filter(|f| !f.is_empty())
            {
                let tokens = fallbacks.into_iter().map(Value::String).collect();
                fallback_types.insert(prim.name.clone(), TypedValue::new("token[]", Value::Array(tokens)));
            }
        }

        // Explicit, and already instance-templated for multiple-apply schemas.
        if !cls.all_applied_api_schemas.is_empty() {
            prim.api_schemas = ListOp::explicit(cls.all_applied_api_schemas.clone());
        }

        prim.custom_data.clear();
        for property in &mut prim.properties {
            property.custom_data.clear();
        }
    }

    flat.comment = Some(GENERATED_COMMENT.to_string());
    if !fallback_types.is_empty() {
        flat.metadata
            .insert("fallbackPrimTypes".to_string(), Value::Dictionary(fallback_types));
    }
    Ok(flat)
}

/// Remove documentation markup from serialized layer text. Backslashes are
/// escaped at this point, so `\em` reads `\\em`.
pub fn strip_doc_markup(source: &str) -> String {
    let source = source.replace(r"\\em ", "").replace(r"\\li", "-");
    let source = REF_MARKUP.replace_all(&source, "");
    SECTION_MARKUP.replace_all(&source, "").into_owned()
}

/// Write `<codegen_path>/generatedSchema.usda`.
pub fn generate_registry(
    codegen_path: &Path,
    stack: &LayerStack,
    classes: &[ClassInfo],
    types: &TypeRegistry,
    writer: &mut OutputWriter,
) -> Result<()> {
    let layer = build_registry_layer(stack, classes, types)?;
    info!("Generating registry");
    let source = strip_doc_markup(&export_to_string(&layer));
    writer.write(&codegen_path.join(GENERATED_SCHEMA_FILE), &source)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::parse_layer;
    use crate::schema::parse_schema;

    const BASE: &str = r#"#usda 1.0
over "GLOBAL" (
    customData = {
        string libraryName = "usd"
        string libraryPath = "wabi/usd/usd"
        string libraryPrefix = "Usd"
    }
) {
}

class "Typed" {
}

class "APISchemaBase" {
}
"#;

    const SCHEMA: &str = r#"#usda 1.0
over "GLOBAL" (
    customData = {
        string libraryName = "myLib"
        string libraryPath = "my/lib"
    }
) {
}

class "Base" (
    inherits = </Typed>
    doc = """Base \\em class, see \\ref Other for more."""
    customData = {
        string className = "BaseThing"
    }
) {
    int size = 1 (
        customData = {
            string apiName = "sizeAttr"
        }
    )
}

class Widget "Widget" (
    inherits = </Base>
    customData = {
        token[] fallbackTypes = ["Base"]
    }
) {
    float width
}

class "CollectionAPI" (
    inherits = </APISchemaBase>
    customData = {
        token apiSchemaType = "multipleApply"
        token propertyNamespacePrefix = "collection"
    }
) {
    rel includes
}
"#;

    fn stack() -> LayerStack {
        LayerStack::from_layers(vec![
            parse_layer(SCHEMA, "schema.usda").unwrap(),
            parse_layer(BASE, "base.usda").unwrap(),
        ])
    }

    fn registry() -> Layer {
        let stack = stack();
        let types = TypeRegistry::new();
        let parsed = parse_schema(&stack, &types, "UsdSchemaBase").unwrap();
        build_registry_layer(&stack, &parsed.classes, &types).unwrap()
    }

    #[test]
    fn test_only_generated_classes_remain() {
        let layer = registry();
        let names: Vec<&str> = layer.root_prims.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Base", "Widget", "CollectionAPI"]);
        assert_eq!(layer.comment.as_deref(), Some(GENERATED_COMMENT));
    }

    #[test]
    fn test_inherited_members_are_flattened() {
        let layer = registry();
        let widget = layer.prim("Widget").unwrap();
        assert_eq!(widget.type_name, "Widget");
        assert!(widget.has_property("size"));
        assert!(widget.has_property("width"));
        assert!(widget.inherits.is_empty());
        // Docs are not inherited and customData is gone.
        assert!(widget.documentation.is_none());
        assert!(widget.custom_data.is_empty());
        assert!(widget.property("size").unwrap().custom_data.is_empty());
    }

    #[test]
    fn test_multiple_apply_properties_are_templated() {
        let layer = registry();
        let collection = layer.prim("CollectionAPI").unwrap();
        assert!(collection.has_property("collection:__INSTANCE_NAME__:includes"));
        assert!(!collection.has_property("includes"));
    }

    #[test]
    fn test_fallback_prim_types() {
        let layer = registry();
        let fallbacks = layer.metadata.get("fallbackPrimTypes").unwrap();
        let dict = fallbacks.as_dict().unwrap();
        assert_eq!(dict.get_str_list("Widget").unwrap(), ["Base"]);
    }

    #[test]
    fn test_markup_is_stripped() {
        let text = strip_doc_markup(&export_to_string(&registry()));
        assert!(text.contains("doc = \"Base class, see for more.\""));
        assert_eq!(strip_doc_markup(r"\\li one"), "- one");
        assert_eq!(strip_doc_markup(r"see \\section intro here"), "see here");
    }

    #[test]
    fn test_api_metadata_allow_list() {
        let mut prim = PrimSpec::new("FooAPI", Specifier::Class);
        prim.metadata.insert("hidden".into(), Value::Bool(true));
        let err = check_api_metadata(&prim, "singleApply").unwrap_err();
        assert!(err.to_string().contains("Found invalid metadata fields [\"hidden\"]"));

        prim.metadata.clear();
        prim.api_schemas = ListOp::explicit(vec!["BarAPI".into()]);
        assert!(check_api_metadata(&prim, "singleApply").is_ok());
        assert!(check_api_metadata(&prim, "nonApplied").is_err());
    }

    #[test]
    fn test_prefixed_name_collision() {
        let mut prim = PrimSpec::new("FooAPI", Specifier::Class);
        prim.custom_data.insert(
            "propertyNamespacePrefix".into(),
            TypedValue::new("token", Value::String("foo".into())),
        );
        prim.properties.push(crate::layer::PropertySpec::relationship("a"));
        prim.properties
            .push(crate::layer::PropertySpec::relationship("foo:__INSTANCE_NAME__:a"));
        let err = rename_with_instance_prefix(&mut prim).unwrap_err();
        assert!(err.to_string().contains("already exists as property base name"));
    }
}
