//! Serializes a `Layer` back to the text format.
//!
//! Output is deterministic for a given layer so that regenerated registry
//! documents compare byte-for-byte.

use super::{Dictionary, Layer, ListOp, PrimSpec, PropertyKind, PropertySpec, Value, Variability};
use crate::names::is_valid_identifier;

const INDENT: &str = "    ";

pub fn export_to_string(layer: &Layer) -> String {
    let mut out = String::from("#usda 1.0\n");

    let has_metadata = layer.comment.is_some()
        || layer.documentation.is_some()
        || !layer.metadata.is_empty()
        || !layer.sub_layers.is_empty();
    if has_metadata {
        out.push_str("(\n");
        if let Some(comment) = &layer.comment {
            out.push_str(&format!("{INDENT}{}\n", quote(comment)));
        }
        if let Some(doc) = &layer.documentation {
            out.push_str(&format!("{INDENT}doc = {}\n", quote(doc)));
        }
        for (key, value) in &layer.metadata {
            out.push_str(&format!("{INDENT}{key} = {}\n", format_value(value, 1)));
        }
        if !layer.sub_layers.is_empty() {
            out.push_str(&format!("{INDENT}subLayers = [\n"));
            let entries: Vec<String> = layer
                .sub_layers
                .iter()
                .map(|path| format!("{INDENT}{INDENT}@{path}@"))
                .collect();
            out.push_str(&entries.join(",\n"));
            out.push_str(&format!("\n{INDENT}]\n"));
        }
        out.push_str(")\n");
    }

    for prim in &layer.root_prims {
        out.push('\n');
        write_prim(&mut out, prim, 0);
    }
    out
}

// =============================================================================
// Prims
// =============================================================================

fn write_prim(out: &mut String, prim: &PrimSpec, depth: usize) {
    let pad = INDENT.repeat(depth);
    out.push_str(&pad);
    out.push_str(prim.specifier.keyword());
    if !prim.type_name.is_empty() {
        out.push(' ');
        out.push_str(&prim.type_name);
    }
    out.push_str(&format!(" {}", quote_simple(&prim.name)));

    let metadata = prim_metadata_lines(prim, depth + 1);
    if !metadata.is_empty() {
        out.push_str(" (\n");
        out.push_str(&metadata);
        out.push_str(&format!("{pad})"));
    }
    out.push_str(&format!("\n{pad}{{\n"));

    for (i, property) in prim.properties.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        write_property(out, property, depth + 1);
    }

    for (i, child) in prim.children.iter().enumerate() {
        if i > 0 || !prim.properties.is_empty() {
            out.push('\n');
        }
        write_prim(out, child, depth + 1);
    }
    out.push_str(&format!("{pad}}}\n"));
}

fn prim_metadata_lines(prim: &PrimSpec, depth: usize) -> String {
    let pad = INDENT.repeat(depth);
    let mut out = String::new();
    for (key, value) in &prim.metadata {
        out.push_str(&format!("{pad}{key} = {}\n", format_value(value, depth)));
    }
    if !prim.custom_data.is_empty() {
        out.push_str(&format!(
            "{pad}customData = {}\n",
            format_dictionary(&prim.custom_data, depth)
        ));
    }
    if let Some(doc) = &prim.documentation {
        out.push_str(&format!("{pad}doc = {}\n", quote(doc)));
    }
    write_list_op(&mut out, &pad, "inherits", &prim.inherits, |p| format!("<{p}>"));
    write_list_op(&mut out, &pad, "apiSchemas", &prim.api_schemas, |s| quote_simple(s));
    out
}

fn write_list_op(
    out: &mut String,
    pad: &str,
    field: &str,
    op: &ListOp,
    format_item: impl Fn(&str) -> String,
) {
    for (keyword, items) in op.authored() {
        let rendered: Vec<String> = items.iter().map(|item| format_item(item)).collect();
        let value = if field == "inherits" && rendered.len() == 1 {
            rendered[0].clone()
        } else {
            format!("[{}]", rendered.join(", "))
        };
        match keyword.keyword() {
            Some(word) => out.push_str(&format!("{pad}{word} {field} = {value}\n")),
            None => out.push_str(&format!("{pad}{field} = {value}\n")),
        }
    }
}

// =============================================================================
// Properties
// =============================================================================

fn write_property(out: &mut String, property: &PropertySpec, depth: usize) {
    let pad = INDENT.repeat(depth);
    let mut head = pad.clone();
    if property.custom {
        head.push_str("custom ");
    }
    if property.variability == Variability::Uniform {
        head.push_str("uniform ");
    }

    let mut connection_line = None;
    match &property.kind {
        PropertyKind::Attribute {
            type_name,
            default,
            connections,
            ..
        } => {
            head.push_str(&format!("{type_name} {}", property.name));
            if let Some(value) = default {
                head.push_str(&format!(" = {}", format_value(value, depth)));
            }
            if let Some(paths) = connections {
                connection_line = Some(format!(
                    "{pad}{type_name} {}.connect = {}\n",
                    property.name,
                    format_paths(paths)
                ));
            }
        }
        PropertyKind::Relationship { targets } => {
            head.push_str(&format!("rel {}", property.name));
            if let Some(paths) = targets {
                head.push_str(&format!(" = {}", format_paths(paths)));
            }
        }
    }
    out.push_str(&head);

    let metadata = property_metadata_lines(property, depth + 1);
    if !metadata.is_empty() {
        out.push_str(" (\n");
        out.push_str(&metadata);
        out.push_str(&format!("{pad})"));
    }
    out.push('\n');
    if let Some(line) = connection_line {
        out.push_str(&line);
    }
}

/// `[uniform ]type name[ = default]`, as the attribute reads in a layer.
pub fn attribute_declaration(property: &PropertySpec) -> String {
    let mut text = String::new();
    if property.variability == Variability::Uniform {
        text.push_str("uniform ");
    }
    text.push_str(&format!("{} {}", property.type_name().unwrap_or_default(), property.name));
    if let Some(value) = property.default_value() {
        text.push_str(&format!(" = {}", format_value(value, 0)));
    }
    text
}

fn property_metadata_lines(property: &PropertySpec, depth: usize) -> String {
    let pad = INDENT.repeat(depth);
    let mut out = String::new();
    if let Some(tokens) = &property.allowed_tokens {
        let items: Vec<String> = tokens.iter().map(|t| quote_simple(t)).collect();
        out.push_str(&format!("{pad}allowedTokens = [{}]\n", items.join(", ")));
    }
    for (key, value) in &property.metadata {
        out.push_str(&format!("{pad}{key} = {}\n", format_value(value, depth)));
    }
    if !property.custom_data.is_empty() {
        out.push_str(&format!(
            "{pad}customData = {}\n",
            format_dictionary(&property.custom_data, depth)
        ));
    }
    if let Some(doc) = &property.documentation {
        out.push_str(&format!("{pad}doc = {}\n", quote(doc)));
    }
    out
}

fn format_paths(paths: &[String]) -> String {
    match paths {
        [] => "None".to_string(),
        [single] => format!("<{single}>"),
        many => {
            let items: Vec<String> = many.iter().map(|p| format!("<{p}>")).collect();
            format!("[{}]", items.join(", "))
        }
    }
}

// =============================================================================
// Values
// =============================================================================

fn format_value(value: &Value, depth: usize) -> String {
    match value {
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.clone(),
        Value::String(s) => quote(s),
        Value::Asset(s) => format!("@{s}@"),
        Value::Path(s) => format!("<{s}>"),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(|v| format_value(v, depth)).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Tuple(items) => {
            let items: Vec<String> = items.iter().map(|v| format_value(v, depth)).collect();
            format!("({})", items.join(", "))
        }
        Value::Dictionary(dict) => format_dictionary(dict, depth),
        Value::None => "None".to_string(),
    }
}

fn format_dictionary(dict: &Dictionary, depth: usize) -> String {
    let pad = INDENT.repeat(depth);
    let inner = INDENT.repeat(depth + 1);
    let mut out = String::from("{\n");
    for (key, entry) in dict {
        let key = if is_valid_identifier(key) {
            key.clone()
        } else {
            quote_simple(key)
        };
        out.push_str(&format!(
            "{inner}{} {key} = {}\n",
            entry.type_name,
            format_value(&entry.value, depth + 1)
        ));
    }
    out.push_str(&pad);
    out.push('}');
    out
}

/// Quote with triple quotes when the text spans lines.
fn quote(text: &str) -> String {
    if text.contains('\n') {
        let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"\"\"{escaped}\"\"\"")
    } else {
        quote_simple(text)
    }
}

fn quote_simple(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{parse_layer, ListOpKeyword, Specifier, TypedValue};

    fn sample_layer() -> Layer {
        let mut layer = Layer::anonymous();
        layer.comment = Some("generated".into());

        let mut prim = PrimSpec::new("Widget", Specifier::Class);
        prim.type_name = "Widget".into();
        prim.documentation = Some("Line one\nLine \"two\"".into());
        prim.inherits = ListOp::explicit(vec!["/Typed".into()]);
        prim.api_schemas.set(ListOpKeyword::Prepend, vec!["FooAPI".into()]);
        prim.custom_data
            .insert("className".into(), TypedValue::new("string", Value::String("W".into())));

        let mut mode = PropertySpec::attribute("mode", "token");
        mode.variability = Variability::Uniform;
        mode.allowed_tokens = Some(vec!["a".into(), "b".into()]);
        if let PropertyKind::Attribute { default, .. } = &mut mode.kind {
            *default = Some(Value::String("a".into()));
        }
        prim.properties.push(mode);
        prim.properties.push(PropertySpec::relationship("target"));
        layer.root_prims.push(prim);
        layer
    }

    #[test]
    fn test_export_format() {
        let text = export_to_string(&sample_layer());
        assert!(text.starts_with("#usda 1.0\n(\n    \"generated\"\n)\n\nclass Widget \"Widget\" (\n"));
        assert!(text.contains("    inherits = </Typed>\n"));
        assert!(text.contains("    prepend apiSchemas = [\"FooAPI\"]\n"));
        assert!(text.contains("    uniform token mode = \"a\" (\n        allowedTokens = [\"a\", \"b\"]\n    )\n"));
        assert!(text.contains("    rel target\n"));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn test_export_reparses_to_same_layer() {
        let layer = sample_layer();
        let reparsed = parse_layer(&export_to_string(&layer), "roundtrip").unwrap();
        assert_eq!(reparsed.root_prims, layer.root_prims);
        assert_eq!(reparsed.comment, layer.comment);
    }

    #[test]
    fn test_export_is_stable() {
        let first = export_to_string(&sample_layer());
        let second = export_to_string(&parse_layer(&first, "again").unwrap());
        assert_eq!(first, second);
    }
}
