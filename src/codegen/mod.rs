//! Code Generation
//!
//! Renders the per-library and per-class source files from templates.
//!
//! Architecture:
//! - `globals`: library-wide render context shared by every template
//! - `class_context`: projection of one `ClassInfo` for the class templates
//! - `tokens`: the token table that backs the generated tokens files
//! - `custom`: hand-written tails of previously generated files
//!
//! Templates never see `ClassInfo` directly, only the JSON contexts built
//! here.

pub mod custom;
pub mod template;
pub mod tokens;

use std::path::Path;

use serde_json::{json, Value};
use tracing::info;

use crate::config::CodegenConfig;
use crate::error::Result;
use crate::names::upper_case;
use crate::output::OutputWriter;
use crate::schema::{ApiGetImplementation, AttrInfo, ClassInfo, LibraryInfo, PropInfo, RelInfo};

use self::custom::extract_custom_code;
use self::template::TemplateSet;
use self::tokens::Token;

// =============================================================================
// Render Contexts
// =============================================================================

/// Library-wide values available to every template.
pub fn globals(library: &LibraryInfo, codegen: &CodegenConfig) -> Value {
    let api_macro = if library.use_export_api {
        format!("{}_API ", upper_case(&library.name))
    } else {
        String::new()
    };
    json!({
        "libraryName": library.name,
        "libraryPath": library.path,
        "libraryPrefix": library.prefix,
        "tokensPrefix": library.tokens_prefix,
        "useExportAPI": library.use_export_api,
        "apiMacro": api_macro,
        "namespaceOpen": codegen.namespace_open,
        "namespaceClose": codegen.namespace_close,
        "namespaceUsing": codegen.namespace_using,
        "headerTerminator": codegen.header_terminator,
        "schemaBaseClass": codegen.schema_base_class,
        "tokens": [],
        "hasTokenAttrs": false,
    })
}

fn prop_context(prop: &PropInfo) -> serde_json::Map<String, Value> {
    let mut map = serde_json::Map::new();
    map.insert("name".into(), json!(prop.name));
    map.insert("rawName".into(), json!(prop.raw_name));
    map.insert("apiName".into(), json!(prop.api_name));
    map.insert("doc".into(), json!(prop.doc));
    map.insert(
        "generatedGet".into(),
        json!(!prop.api_name.is_empty() && prop.api_get == ApiGetImplementation::Generated),
    );
    map
}

fn attr_context(attr: &AttrInfo) -> Value {
    let mut map = prop_context(&attr.prop);
    map.insert("typeName".into(), json!(attr.type_name));
    map.insert("usdType".into(), json!(attr.usd_type));
    map.insert("cppType".into(), json!(attr.cpp_type));
    map.insert("variability".into(), json!(attr.variability.symbol()));
    map.insert(
        "details".into(),
        Value::Array(
            attr.details
                .iter()
                .map(|(label, value)| json!({ "label": label, "value": value }))
                .collect(),
        ),
    );
    Value::Object(map)
}

fn rel_context(rel: &RelInfo) -> Value {
    Value::Object(prop_context(&rel.prop))
}

/// The `cls` value seen by the class templates.
pub fn class_context(cls: &ClassInfo) -> Value {
    json!({
        "className": cls.class_name,
        "cppClassName": cls.cpp_class_name,
        "usdPrimTypeName": cls.usd_prim_type_name,
        "primName": cls.prim_name,
        "headerFile": cls.header_file(),
        "parentLibPath": cls.parent_lib_path,
        "parentHeaderFile": cls.parent_header_file(),
        "parentCppClassName": cls.parent_cpp_class_name,
        "hasTokens": !cls.tokens.is_empty(),
        "extraIncludes": cls.extra_includes,
        "doc": cls.doc,
        "schemaKind": cls.schema_kind.as_str(),
        "schemaKindEnumValue": cls.schema_kind.enum_value(),
        "isConcrete": cls.is_concrete,
        "isTyped": cls.is_typed,
        "isAppliedAPISchema": cls.is_applied_api_schema,
        "isMultipleApply": cls.is_multiple_apply,
        "propertyNamespacePrefix": cls.property_namespace_prefix,
        "attrs": cls.attrs.values().map(attr_context).collect::<Vec<_>>(),
        "rels": cls.rels.values().map(rel_context).collect::<Vec<_>>(),
    })
}

fn with_entries(mut context: Value, entries: Value) -> Value {
    if let (Value::Object(base), Value::Object(extra)) = (&mut context, entries) {
        base.extend(extra);
    }
    context
}

// =============================================================================
// Custom Code Defaults
// =============================================================================

fn header_default(codegen: &CodegenConfig) -> String {
    let mut text = format!("}};\n\n{}\n", codegen.namespace_close);
    let terminator = codegen.header_terminator.trim();
    if !terminator.is_empty() {
        text.push_str(&format!("\n{terminator}\n"));
    }
    text
}

fn wrap_default(use_export_api: bool) -> &'static str {
    if use_export_api {
        "\nnamespace {\n\nWRAP_CUSTOM {\n}\n\n}"
    } else {
        "\nWRAP_CUSTOM {\n}\n"
    }
}

// =============================================================================
// Generation
// =============================================================================

/// Write the export header, the tokens files and three files per class.
pub fn generate_code(
    codegen_path: &Path,
    classes: &[ClassInfo],
    tokens: &[Token],
    library: &LibraryInfo,
    codegen: &CodegenConfig,
    templates: &TemplateSet,
    writer: &mut OutputWriter,
) -> Result<()> {
    let globals = with_entries(globals(library, codegen), json!({ "tokens": tokens }));

    if library.use_export_api {
        info!("Writing export header");
        let api = templates.get("api.h")?;
        writer.write(&codegen_path.join("api.h"), &api.render(&globals)?)?;
    }

    if !tokens.is_empty() {
        info!("Writing schema tokens");
        for name in ["tokens.h", "tokens.cpp", "wrapTokens.cpp"] {
            let template = templates.get(name)?;
            writer.write(&codegen_path.join(name), &template.render(&globals)?)?;
        }
    }

    let header = templates.get("schemaClass.h")?;
    let source = templates.get("schemaClass.cpp")?;
    let wrapper = templates.get("wrapSchemaClass.cpp")?;
    let header_tail = header_default(codegen);

    info!("Generating classes");
    for cls in classes {
        let context = with_entries(
            globals.clone(),
            json!({
                "cls": class_context(cls),
                "hasTokenAttrs": cls.attrs.values().any(AttrInfo::is_token_typed),
            }),
        );

        let outputs = [
            (&header, cls.header_file(), header_tail.as_str()),
            (&source, cls.cpp_file(), ""),
            (&wrapper, cls.wrap_file(), wrap_default(library.use_export_api)),
        ];
        for (template, file_name, default_tail) in outputs {
            let path = codegen_path.join(file_name);
            let rendered = template.render(&context)?;
            let content = rendered + &extract_custom_code(&path, default_tail);
            writer.write(&path, &content)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Dictionary;

    fn library(use_export_api: bool) -> LibraryInfo {
        LibraryInfo {
            name: "myLib".into(),
            path: "my/lib".into(),
            prefix: "MyLib".into(),
            tokens_prefix: "MyLib".into(),
            use_export_api,
            library_tokens: Dictionary::new(),
            skip_code_generation: false,
            use_literal_identifier: false,
        }
    }

    #[test]
    fn test_globals() {
        let codegen = CodegenConfig::default();
        let value = globals(&library(true), &codegen);
        assert_eq!(value["apiMacro"], "MYLIB_API ");
        assert_eq!(value["namespaceOpen"], "WABI_NAMESPACE_BEGIN");
        assert_eq!(globals(&library(false), &codegen)["apiMacro"], "");
    }

    #[test]
    fn test_header_default() {
        let mut codegen = CodegenConfig::default();
        assert_eq!(header_default(&codegen), "};\n\nWABI_NAMESPACE_END\n\n#endif\n");
        codegen.header_terminator = "  ".into();
        assert_eq!(header_default(&codegen), "};\n\nWABI_NAMESPACE_END\n");
    }

    #[test]
    fn test_with_entries_overrides() {
        let merged = with_entries(json!({ "a": 1, "b": 2 }), json!({ "b": 3 }));
        assert_eq!(merged, json!({ "a": 1, "b": 3 }));
    }
}
