//! Plugin Descriptor
//!
//! Merges the generated classes into `plugInfo.json`. Type entries marked
//! `autoGenerated` are replaced on every run; everything else in the
//! descriptor is carried over untouched.

use std::path::Path;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::codegen::template::TemplateSet;
use crate::codegen::globals;
use crate::config::CodegenConfig;
use crate::error::{Result, SchemaGenError};
use crate::layer::{dictionary_to_json, DictionaryExt};
use crate::output::OutputWriter;
use crate::schema::{ClassInfo, LibraryInfo};

pub const PLUG_INFO_FILE: &str = "plugInfo.json";

const BANNER: &str = "# Portions of this file auto-generated by schemagen.\n\
                      # Edits will survive regeneration except for comments and\n\
                      # changes to types with autoGenerated=true.\n";

/// Drop every line whose first non-blank character is `#`.
pub fn strip_comment_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn parse_plug_info(text: &str) -> Result<Value> {
    Ok(serde_json::from_str(&strip_comment_lines(text))?)
}

pub fn read_plug_info(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)?;
    parse_plug_info(&text)
        .map_err(|e| SchemaGenError::PlugInfo(format!("reading {}: {e}", path.display())))
}

/// The `Types` dictionary of every plugin in a descriptor.
pub fn plugin_types(info: &Value) -> Vec<&Map<String, Value>> {
    match info.get("Plugins").and_then(Value::as_array) {
        Some(plugins) => plugins
            .iter()
            .filter_map(|p| p.pointer("/Info/Types").and_then(Value::as_object))
            .collect(),
        None => info
            .get("Types")
            .and_then(Value::as_object)
            .into_iter()
            .collect(),
    }
}

// =============================================================================
// Type Entries
// =============================================================================

/// Descriptor entry for one generated class.
pub fn class_entry(cls: &ClassInfo, schema_base_class: &str) -> Map<String, Value> {
    let mut entry = Map::new();
    // Hand-authored extras first so generated keys win.
    if let Some(extra) = cls.custom_data.get_dict("extraPlugInfo") {
        if let Value::Object(extra) = dictionary_to_json(extra) {
            entry.extend(extra);
        }
    }
    entry.insert("bases".into(), json!([cls.parent_cpp_class_name]));
    entry.insert("autoGenerated".into(), json!(true));
    entry.insert("schemaKind".into(), json!(cls.schema_kind.as_str()));

    add_apply_info(&mut entry, cls);

    if cls.is_typed || cls.is_api {
        entry.insert("alias".into(), json!({ schema_base_class: cls.usd_prim_type_name }));
    }
    entry
}

fn add_apply_info(entry: &mut Map<String, Value>, cls: &ClassInfo) {
    if !cls.is_applied_api_schema {
        return;
    }
    let lists = [
        ("apiSchemaAutoApplyTo", &cls.api_auto_apply),
        ("apiSchemaCanOnlyApplyTo", &cls.api_can_only_apply),
        ("apiSchemaAllowedInstanceNames", &cls.api_allowed_instance_names),
    ];
    for (key, list) in lists {
        if let Some(list) = list.as_ref().filter(|l| !l.is_empty()) {
            entry.insert(key.into(), json!(list));
        }
    }

    if let Some(instances) = &cls.api_schema_instances {
        let mut per_instance = Map::new();
        for (name, instance) in instances {
            let can_only_apply = instance
                .value
                .as_dict()
                .and_then(|d| d.get_str_list("apiSchemaCanOnlyApplyTo"))
                .filter(|l| !l.is_empty());
            if let Some(targets) = can_only_apply {
                per_instance.insert(name.clone(), json!({ "apiSchemaCanOnlyApplyTo": targets }));
            }
        }
        if !per_instance.is_empty() {
            entry.insert("apiSchemaInstances".into(), Value::Object(per_instance));
        }
    }
}

/// Replace the library's generated type entries with `classes`.
pub fn merge_plug_info(
    info: &mut Value,
    classes: &[ClassInfo],
    library_name: &str,
    skip_code_generation: bool,
    schema_base_class: &str,
) -> Result<()> {
    if !info.is_object() {
        return Err(SchemaGenError::PlugInfo("descriptor is not a JSON object".into()));
    }

    let types = if info.get("Plugins").is_some() {
        let plugins = info
            .get_mut("Plugins")
            .and_then(Value::as_array_mut)
            .ok_or_else(|| SchemaGenError::PlugInfo("\"Plugins\" must be a list".into()))?;
        let mut library_plugin = None;
        // Plugins after the library's own entry are left untouched.
        for plugin in plugins.iter_mut() {
            // Codeless libraries ship resources only.
            if let Some(fields) = plugin.as_object_mut().filter(|_| skip_code_generation) {
                fields.insert("Type".into(), json!("resource"));
            }
            if plugin.get("Name").and_then(Value::as_str) == Some(library_name) {
                library_plugin = Some(plugin);
                break;
            }
        }
        let plugin = library_plugin.ok_or_else(|| {
            SchemaGenError::PlugInfo(format!(
                "Could not find plugin metadata section for {library_name}"
            ))
        })?;
        object_entry(object_entry(plugin, "Info")?, "Types")?
    } else {
        object_entry(info, "Types")?
    };

    let types = types
        .as_object_mut()
        .ok_or_else(|| SchemaGenError::PlugInfo("\"Types\" must be a dictionary".into()))?;
    types.retain(|_, entry| {
        !entry
            .get("autoGenerated")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    });
    for cls in classes {
        types.insert(
            cls.cpp_class_name.clone(),
            Value::Object(class_entry(cls, schema_base_class)),
        );
    }
    Ok(())
}

/// `value[key]`, inserting an empty dictionary when absent.
fn object_entry<'v>(value: &'v mut Value, key: &str) -> Result<&'v mut Value> {
    let map = value
        .as_object_mut()
        .ok_or_else(|| SchemaGenError::PlugInfo(format!("expected a dictionary holding \"{key}\"")))?;
    Ok(map.entry(key).or_insert_with(|| json!({})))
}

/// Keys sorted at every level.
fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Value::Object(keys.into_iter().map(|k| (k.clone(), sorted(&map[k]))).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Banner followed by the descriptor with sorted keys and 4-space indents.
pub fn render_plug_info(info: &Value) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    sorted(info).serialize(&mut serializer)?;
    let body = String::from_utf8(buf)
        .map_err(|e| SchemaGenError::PlugInfo(format!("descriptor is not UTF-8: {e}")))?;
    Ok(format!("{BANNER}{body}"))
}

// =============================================================================
// Generation
// =============================================================================

/// Update `<codegen_path>/plugInfo.json` with the parsed classes.
///
/// Nothing is written when no classes were parsed. A missing descriptor
/// starts from the `plugInfo.json` template.
pub fn generate_plug_info(
    codegen_path: &Path,
    classes: &[ClassInfo],
    library: &LibraryInfo,
    codegen: &CodegenConfig,
    templates: &TemplateSet,
    writer: &mut OutputWriter,
) -> Result<()> {
    let template = templates.get(PLUG_INFO_FILE)?;
    if classes.is_empty() {
        return Ok(());
    }

    let path = codegen_path.join(PLUG_INFO_FILE);
    let mut info = if path.is_file() {
        read_plug_info(&path).map_err(|e| {
            error!("{}", e);
            e
        })?
    } else {
        let skeleton = template.render(&globals(library, codegen))?;
        parse_plug_info(&skeleton).map_err(|e| {
            SchemaGenError::PlugInfo(format!("{e} from template {}", template.name()))
        })?
    };

    merge_plug_info(
        &mut info,
        classes,
        &library.name,
        library.skip_code_generation,
        &codegen.schema_base_class,
    )?;

    info!("Writing plugin info");
    writer.write(&path, &render_plug_info(&info)?)?;
    Ok(())
}
