//! Schema Class Parsing
//!
//! Builds a [`ClassInfo`] for every class prim of the schema layer and runs
//! the structural checks on it. Problems are accumulated into
//! [`Diagnostics`] and raised together once every class has been visited;
//! missing library metadata fails immediately.

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics};
use super::library::{library_path, library_prefix, LibraryInfo};
use super::{
    find_class, ApiGetImplementation, ApiSchemaType, AttrInfo, ClassInfo, PropInfo, RelInfo,
    SchemaKind, API_SCHEMA_BASE, API_SUFFIX, SCHEMA_BASE, TYPED,
};
use crate::error::{Result, SchemaGenError};
use crate::layer::{
    attribute_declaration, find_value_type, prim_name_from_path, Dictionary, DictionaryExt, Layer,
    LayerStack, PrimSpec, PropertyKind, PropertySpec, Specifier, Variability,
};
use crate::names::{
    camel_case, make_multiple_apply_name_instance, make_multiple_apply_name_template,
    make_multiple_apply_schema_name_template, make_valid_token, proper_case, sanitize_doc,
    MULTIPLE_APPLY_TEMPLATE_IDENTIFIER,
};
use crate::types::TypeRegistry;

/// Fields the schema registry computes itself; authoring them is an error.
const DISALLOWED_FIELDS: &[&str] = &[
    "active",
    "clipSets",
    "clips",
    "connectionPaths",
    "instanceable",
    "payload",
    "prefix",
    "prefixSubstitutions",
    "references",
    "specializes",
    "suffix",
    "suffixSubstitutions",
    "targetPaths",
    "timeSamples",
    "variantSelection",
    "variantSetNames",
    "variantSets",
    "variants",
];

const CLASS_DOC_LEADER: &str = "\n/// ";
const PROPERTY_DOC_LEADER: &str = "\n    /// ";

/// Library settings and classes of one schema layer stack.
#[derive(Debug, Clone)]
pub struct ParsedSchema {
    pub library: LibraryInfo,
    pub classes: Vec<ClassInfo>,
}

/// Parse every class defined in the root layer of `stack`.
///
/// `types` answers parent lookups for API schemas defined by previously
/// generated libraries.
pub fn parse_schema(
    stack: &LayerStack,
    types: &TypeRegistry,
    schema_base_class: &str,
) -> Result<ParsedSchema> {
    let library = LibraryInfo::from_stack(stack)?;
    stack.check_inheritance_cycles()?;

    let mut diags = Diagnostics::new();
    let mut classes = Vec::new();

    for prim in &stack.root().root_prims {
        if prim.name == TYPED || prim.specifier != Specifier::Class {
            continue;
        }
        validate_fields(prim, &mut diags);

        let mut cls = build_class(stack, prim, &library, schema_base_class, &mut diags)?;
        for property in &prim.properties {
            add_property(&mut cls, property, &library.tokens_prefix, &mut diags);
        }
        check_multiple_apply(&mut cls, &mut diags);
        debug!("Parsed class {} ({})", cls.cpp_class_name, cls.schema_kind);
        classes.push(cls);
    }

    check_api_compatibility(&classes, types, &mut diags);

    if diags.has_errors() {
        return Err(SchemaGenError::SchemaDefinition(diags));
    }
    for item in diags.warnings() {
        warn!("{}", item);
    }
    Ok(ParsedSchema { library, classes })
}

// =============================================================================
// Field Validation
// =============================================================================

fn validate_fields(prim: &PrimSpec, diags: &mut Diagnostics) {
    report_disallowed(&prim.path(), &prim.info_keys(), diags);
    for property in &prim.properties {
        let path = format!("{}.{}", prim.path(), property.name);
        report_disallowed(&path, &property.info_keys(), diags);
    }
}

fn report_disallowed(path: &str, keys: &[String], diags: &mut Diagnostics) {
    for key in keys.iter().filter(|k| DISALLOWED_FIELDS.contains(&k.as_str())) {
        let message = match key.as_str() {
            "targetPaths" => {
                format!("Relationship targets on <{path}> cannot be specified in a schema.")
            }
            "connectionPaths" => {
                format!("Attribute connections on <{path}> cannot be specified in a schema.")
            }
            _ => format!("Fallback values for '{key}' on <{path}> cannot be specified in a schema."),
        };
        diags.report(path, DiagnosticCode::DisallowedField, message);
    }
}

// =============================================================================
// Classes
// =============================================================================

/// className, cppClassName and baseFileName for a prim.
fn class_names(prim_name: &str, custom_data: &Dictionary, prefix: &str) -> (String, String, String) {
    let class_name = custom_data
        .get_str("className")
        .map(str::to_string)
        .unwrap_or_else(|| proper_case(prim_name));
    let cpp_class_name = format!("{prefix}{class_name}");
    let base_file_name = custom_data
        .get_str("fileName")
        .map(str::to_string)
        .unwrap_or_else(|| camel_case(&class_name));
    (class_name, cpp_class_name, base_file_name)
}

/// The first layer in the stack defining `name`, with its spec.
///
/// The implicit `SchemaBase` resolves to the weakest layer and no spec.
fn defining_layer<'s>(stack: &'s LayerStack, name: &str) -> Option<(&'s Layer, Option<&'s PrimSpec>)> {
    if name == SCHEMA_BASE {
        return stack.layers().last().map(|layer| (layer, None));
    }
    stack
        .layers()
        .iter()
        .find_map(|layer| layer.prim(name).map(|prim| (layer, Some(prim))))
}

struct Parent {
    prim_name: String,
    cpp_class_name: String,
    base_file_name: String,
    lib_path: String,
    api_schema_type: Option<String>,
}

fn resolve_parent(
    stack: &LayerStack,
    prim: &PrimSpec,
    parent_name: &str,
    schema_base_class: &str,
    diags: &mut Diagnostics,
) -> Result<Parent> {
    let mut parent = Parent {
        prim_name: parent_name.to_string(),
        cpp_class_name: String::new(),
        base_file_name: String::new(),
        lib_path: String::new(),
        api_schema_type: None,
    };
    match defining_layer(stack, parent_name) {
        Some((layer, Some(spec))) => {
            let (_, cpp, base) = class_names(&spec.name, &spec.custom_data, &library_prefix(layer)?);
            parent.cpp_class_name = cpp;
            parent.base_file_name = base;
            parent.lib_path = library_path(layer)?;
            parent.api_schema_type = spec.custom_data.get_str("apiSchemaType").map(str::to_string);
        }
        Some((layer, None)) => {
            parent.lib_path = library_path(layer)?;
            parent.base_file_name = "schemaBase".to_string();
            if prim.name == TYPED || prim.name == API_SCHEMA_BASE {
                parent.cpp_class_name = schema_base_class.to_string();
            }
        }
        None => diags.report(
            prim.path(),
            DiagnosticCode::UnresolvedParent,
            format!("Could not find the defining layer for schema: {parent_name}"),
        ),
    }
    Ok(parent)
}

fn build_class(
    stack: &LayerStack,
    prim: &PrimSpec,
    library: &LibraryInfo,
    schema_base_class: &str,
    diags: &mut Diagnostics,
) -> Result<ClassInfo> {
    let path = prim.path();
    let custom_data = prim.custom_data.clone();

    if !prim.type_name.is_empty() && prim.type_name != prim.name {
        diags.report(
            &path,
            DiagnosticCode::TypeNameMismatch,
            format!(
                "Code generation requires that every instantiable class's name must match its \
                 declared type ('{}' and '{}' do not match.)",
                prim.type_name, prim.name
            ),
        );
    }

    let inherits = stack.composed_inherits(&prim.name);
    if inherits.len() > 1 {
        diags.report(
            &path,
            DiagnosticCode::MultipleInheritance,
            format!(
                "Schemas can only inherit from one other schema at most. This schema inherits \
                 from {} ({}).",
                inherits.len(),
                inherits.join(", ")
            ),
        );
    }

    let (class_name, cpp_class_name, base_file_name) =
        class_names(&prim.name, &custom_data, &library.prefix);
    let parent_name = inherits
        .first()
        .map(|p| prim_name_from_path(p).to_string())
        .unwrap_or_else(|| SCHEMA_BASE.to_string());
    let parent = resolve_parent(stack, prim, &parent_name, schema_base_class, diags)?;

    if !prim.api_schemas.is_empty() && !prim.api_schemas.is_prepend_only() {
        diags.report(
            &path,
            DiagnosticCode::InvalidApiSchemasListOp,
            "The 'apiSchemas' metadata list operation is only allowed to prepend API schemas.",
        );
    }

    // A class may not redeclare an inherited type name.
    let mut type_name = prim.type_name.clone();
    let redeclared = inherits.iter().any(|p| {
        defining_layer(stack, prim_name_from_path(p))
            .and_then(|(_, spec)| spec)
            .is_some_and(|spec| spec.type_name == type_name)
    });
    if redeclared {
        type_name.clear();
    }

    let is_concrete = !type_name.is_empty();
    let is_typed = stack.is_typed(&prim.name);
    let is_api_schema_base = prim.name == API_SCHEMA_BASE;
    let is_api = !is_typed && !is_concrete && !is_api_schema_base;

    let raw_api_schema_type = custom_data
        .get_str("apiSchemaType")
        .map(str::to_string)
        .or_else(|| is_api.then(|| ApiSchemaType::SingleApply.as_str().to_string()));
    let api_schema_type = match raw_api_schema_type.as_deref().map(str::parse::<ApiSchemaType>) {
        Some(Ok(kind)) => Some(kind),
        Some(Err(raw)) => {
            if is_api {
                diags.report(
                    &path,
                    DiagnosticCode::InvalidApiSchemaType,
                    format!(
                        "CustomData 'apiSchemaType' is {raw}. It must be one of [{}] for an API \
                         schema.",
                        ApiSchemaType::ALL.join(", ")
                    ),
                );
            }
            None
        }
        None => None,
    };

    let non_empty_list =
        |key: &str| custom_data.get_str_list(key).filter(|list| !list.is_empty());
    let property_namespace_prefix = custom_data
        .get_str("propertyNamespacePrefix")
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    let api_auto_apply = non_empty_list("apiSchemaAutoApplyTo");
    let api_can_only_apply = non_empty_list("apiSchemaCanOnlyApplyTo");
    let api_allowed_instance_names = non_empty_list("apiSchemaAllowedInstanceNames");
    let api_schema_instances = custom_data
        .get_dict("apiSchemaInstances")
        .filter(|d| !d.is_empty())
        .cloned();
    let fallback_prim_types = non_empty_list("fallbackTypes");

    let is_multiple_apply = api_schema_type == Some(ApiSchemaType::MultipleApply);
    let is_single_apply = api_schema_type == Some(ApiSchemaType::SingleApply);
    let is_applied_api_schema = is_single_apply || is_multiple_apply;

    if !is_multiple_apply {
        let misplaced = [
            ("propertyNamespacePrefix", property_namespace_prefix.is_some()),
            ("apiSchemaAllowedInstanceNames", api_allowed_instance_names.is_some()),
            ("apiSchemaInstances", api_schema_instances.is_some()),
        ];
        for (key, _) in misplaced.iter().filter(|(_, present)| *present) {
            diags.report(
                &path,
                DiagnosticCode::MisplacedApiMetadata,
                format!("{key} should only be used as a customData field on multiple-apply API schemas."),
            );
        }
    }
    if api_auto_apply.is_some() && !is_single_apply {
        diags.report(
            &path,
            DiagnosticCode::MisplacedApiMetadata,
            "apiSchemaAutoApplyTo should only be used as a customData field on single-apply API \
             schemas.",
        );
    }
    if api_can_only_apply.is_some() && !is_applied_api_schema {
        diags.report(
            &path,
            DiagnosticCode::MisplacedApiMetadata,
            "apiSchemaCanOnlyApplyTo should only be used as a customData field on applied API \
             schemas.",
        );
    }

    let schema_kind = if is_typed {
        if is_concrete {
            SchemaKind::ConcreteTyped
        } else {
            SchemaKind::AbstractTyped
        }
    } else if is_multiple_apply {
        SchemaKind::MultipleApplyApi
    } else if is_single_apply {
        SchemaKind::SingleApplyApi
    } else if is_api {
        SchemaKind::NonAppliedApi
    } else {
        SchemaKind::AbstractBase
    };

    if is_concrete && !is_typed {
        diags.report(
            &path,
            DiagnosticCode::ConcreteNotTyped,
            "Schema classes must either inherit Typed(IsA), or neither inherit typed nor provide \
             a typename(API).",
        );
    }
    if is_api && !prim.name.ends_with(API_SUFFIX) {
        diags.report(
            &path,
            DiagnosticCode::MissingApiSuffix,
            "API schemas must be named with an API suffix.",
        );
    }
    if is_api && parent.prim_name != API_SCHEMA_BASE {
        if is_applied_api_schema {
            diags.report(
                &path,
                DiagnosticCode::InvalidApiParent,
                "Applied API schemas must explicitly inherit directly from APISchemaBase.",
            );
        } else if parent.api_schema_type.as_deref() != Some(ApiSchemaType::NonApplied.as_str()) {
            diags.report(
                &path,
                DiagnosticCode::InvalidApiParent,
                "Non-applied API schemas must inherit directly from APISchemaBase or another \
                 non-applied API schema.",
            );
        }
    }
    if !is_api && is_applied_api_schema {
        diags.report(
            &path,
            DiagnosticCode::MisplacedApiMetadata,
            "Non API schemas cannot have non-empty apiSchemaType value.",
        );
    }
    if fallback_prim_types.is_some() && !is_concrete {
        diags.report(
            &path,
            DiagnosticCode::MisplacedFallbackTypes,
            "fallbackPrimTypes can only be used as a customData field on concrete typed schema \
             classes",
        );
    }

    Ok(ClassInfo {
        prim_name: prim.name.clone(),
        usd_prim_type_name: prim.name.clone(),
        class_name,
        cpp_class_name,
        base_file_name,
        parent_prim_name: parent.prim_name,
        parent_cpp_class_name: parent.cpp_class_name,
        parent_base_file_name: parent.base_file_name,
        parent_lib_path: parent.lib_path,
        doc: sanitize_doc(prim.documentation.as_deref(), CLASS_DOC_LEADER),
        raw_doc: prim.documentation.clone(),
        type_name,
        extra_includes: custom_data.get_str("extraIncludes").map(str::to_string),
        api_schemas_metadata: prim.api_schemas.clone(),
        all_applied_api_schemas: stack.composed_api_schemas(&prim.name),
        custom_data,
        is_concrete,
        is_typed,
        is_api_schema_base,
        is_api,
        api_schema_type,
        is_applied_api_schema,
        is_multiple_apply,
        schema_kind,
        property_namespace_prefix,
        api_auto_apply,
        api_can_only_apply,
        api_allowed_instance_names,
        api_schema_instances,
        fallback_prim_types,
        use_literal_identifier: library.use_literal_identifier,
        attrs: IndexMap::new(),
        rels: IndexMap::new(),
        tokens: Default::default(),
    })
}

/// Property count rules and instance templating for multiple-apply schemas.
fn check_multiple_apply(cls: &mut ClassInfo, diags: &mut Diagnostics) {
    if !cls.is_multiple_apply {
        return;
    }
    let path = cls.path();
    match (&cls.property_namespace_prefix, cls.has_properties()) {
        (Some(_), false) => diags.report(
            &path,
            DiagnosticCode::MultipleApplyProperties,
            "Multiple-apply schemas that have the propertyNamespacePrefix metadata fields must \
             have at least one property",
        ),
        (None, true) => diags.report(
            &path,
            DiagnosticCode::MultipleApplyProperties,
            "Multiple-apply schemas that do not have a propertyNamespacePrefix metadata field \
             must have zero properties",
        ),
        _ => {}
    }

    let templated = |names: &[String]| -> Vec<String> {
        names
            .iter()
            .map(|name| make_multiple_apply_schema_name_template(name))
            .collect()
    };
    cls.all_applied_api_schemas = templated(&cls.all_applied_api_schemas);
    cls.api_schemas_metadata.prepended = templated(&cls.api_schemas_metadata.prepended);
}

// =============================================================================
// Properties
// =============================================================================

fn prop_info(cls: &ClassInfo, property: &PropertySpec, path: &str, diags: &mut Diagnostics) -> PropInfo {
    let (raw_name, name) = match &cls.property_namespace_prefix {
        Some(prefix) => {
            let raw = make_multiple_apply_name_template(prefix, &property.name);
            let name = camel_case(&make_multiple_apply_name_instance(
                &raw,
                MULTIPLE_APPLY_TEMPLATE_IDENTIFIER,
            ));
            (raw, name)
        }
        None => (
            property.name.clone(),
            make_valid_token(&property.name, false),
        ),
    };

    let api_get = match property.custom_data.get_str("apiGetImplementation") {
        None | Some("generated") => ApiGetImplementation::Generated,
        Some("custom") => ApiGetImplementation::Custom,
        Some(other) => {
            diags.report(
                path,
                DiagnosticCode::InvalidApiGetImplementation,
                format!("Token '{other}' is not valid."),
            );
            ApiGetImplementation::Generated
        }
    };

    PropInfo {
        name,
        raw_name,
        api_name: property
            .custom_data
            .get_str("apiName")
            .map(str::to_string)
            .unwrap_or_else(|| camel_case(&property.name)),
        api_get,
        doc: sanitize_doc(property.documentation.as_deref(), PROPERTY_DOC_LEADER),
        raw_doc: property.documentation.clone(),
        custom_data: property.custom_data.clone(),
    }
}

fn add_property(cls: &mut ClassInfo, property: &PropertySpec, tokens_prefix: &str, diags: &mut Diagnostics) {
    let path = format!("{}.{}", cls.path(), property.name);
    let prop = prop_info(cls, property, &path, diags);

    match &property.kind {
        PropertyKind::Attribute { type_name, default, .. } => {
            let Some(value_type) = find_value_type(type_name) else {
                diags.report(
                    &path,
                    DiagnosticCode::UnknownValueType,
                    format!(
                        "Code generation requires that all attributes have a known type (<{path}> \
                         has type '{type_name}', which is not a known value type.)"
                    ),
                );
                return;
            };

            let declaration = attribute_declaration(property);
            let usd_type = format!("SdfValueTypeNames->{}", value_type.symbol);
            let mut details = vec![
                ("Declaration".to_string(), format!("`{declaration}`")),
                ("C++ Type".to_string(), value_type.cpp_type_name.clone()),
                ("\\ref Usd_Datatypes \"Usd Type\"".to_string(), usd_type.clone()),
            ];
            if property.variability == Variability::Uniform {
                details.push((
                    "\\ref SdfVariability \"Variability\"".to_string(),
                    Variability::Uniform.symbol().to_string(),
                ));
            }
            if let Some(tokens) = property.allowed_tokens.as_ref().filter(|t| !t.is_empty()) {
                let values: Vec<&str> = tokens
                    .iter()
                    .map(|t| if t.is_empty() { "\"\"" } else { t.as_str() })
                    .collect();
                details.push((
                    format!("\\ref {tokens_prefix}Tokens \"Allowed Values\""),
                    values.join(", "),
                ));
            }

            let attr = AttrInfo {
                prop,
                type_name: type_name.clone(),
                usd_type,
                cpp_type: value_type.cpp_type_name,
                variability: property.variability,
                fallback: default.clone(),
                allowed_tokens: property.allowed_tokens.clone(),
                declaration,
                details,
            };
            check_unique("Attribute", cls, &attr.prop, cls.attrs.values().map(|a| &a.prop), diags);
            cls.attrs.insert(attr.prop.name.clone(), attr);
        }
        PropertyKind::Relationship { .. } => {
            let rel = RelInfo { prop };
            check_unique("Relationship", cls, &rel.prop, cls.rels.values().map(|r| &r.prop), diags);
            cls.rels.insert(rel.prop.name.clone(), rel);
        }
    }
}

/// Names and API names must be unique among properties of the same kind.
/// An empty API name opts out of the check.
fn check_unique<'a>(
    kind: &str,
    cls: &ClassInfo,
    prop: &PropInfo,
    existing: impl Iterator<Item = &'a PropInfo> + Clone,
    diags: &mut Diagnostics,
) {
    if prop.api_name.is_empty() {
        return;
    }
    let path = cls.path();
    if existing.clone().any(|p| p.name == prop.name) {
        diags.report(
            &path,
            DiagnosticCode::DuplicatePropertyName,
            format!(
                "Schema {kind} names must be unique, irrespective of namespacing. Duplicate name \
                 encountered: {}.{}",
                cls.usd_prim_type_name, prop.name
            ),
        );
    } else if let Some(other) = existing
        .filter(|p| !p.api_name.is_empty())
        .find(|p| p.api_name == prop.api_name)
    {
        let item = DiagnosticItem::new(
            &path,
            DiagnosticCode::DuplicateApiName,
            format!(
                "Schema {kind} API names must be unique. Duplicate apiName encountered: {}.{}",
                cls.usd_prim_type_name, prop.api_name
            ),
        );
        diags.push(item.with_context(format!("{} and {}", other.raw_name, prop.raw_name)));
    }
}

// =============================================================================
// Cross-Class Checks
// =============================================================================

/// API schemas and their non-root parents must agree on how they apply.
fn check_api_compatibility(classes: &[ClassInfo], types: &TypeRegistry, diags: &mut Diagnostics) {
    for cls in classes.iter().filter(|c| c.is_api && c.parent_prim_name != API_SCHEMA_BASE) {
        let parent = &cls.parent_cpp_class_name;
        let (parent_applied, parent_multiple) = match find_class(classes, parent) {
            Some(p) => (p.is_applied_api_schema, p.is_multiple_apply),
            None if types.find(parent).is_some() => (
                types.is_applied_api_schema(parent),
                types.is_multiple_apply_api_schema(parent),
            ),
            None => continue,
        };

        if cls.is_applied_api_schema != parent_applied {
            diags.report(
                cls.path(),
                DiagnosticCode::IncompatibleApiBase,
                format!(
                    "API schema '{}' inherits from incompatible base API schema '{parent}'. Both \
                     must be either applied API schemas or non-applied API schemas.",
                    cls.cpp_class_name
                ),
            );
        } else if cls.is_multiple_apply != parent_multiple {
            diags.report(
                cls.path(),
                DiagnosticCode::IncompatibleApiBase,
                format!(
                    "API schema '{}' inherits from incompatible base API schema '{parent}'. Both \
                     must be either single-apply or multiple-apply.",
                    cls.cpp_class_name
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::parse_layer;
    use crate::types::RegisteredType;

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

    fn stack(body: &str) -> LayerStack {
        let text = format!(
            "#usda 1.0\nover \"GLOBAL\" (\n    customData = {{\n        string libraryName = \"myLib\"\n        string libraryPath = \"my/lib\"\n    }}\n) {{\n}}\n\n{body}"
        );
        LayerStack::from_layers(vec![
            parse_layer(&text, "schema.usda").unwrap(),
            parse_layer(BASE, "base.usda").unwrap(),
        ])
    }

    fn parse(body: &str) -> Result<ParsedSchema> {
        parse_schema(&stack(body), &TypeRegistry::new(), "UsdSchemaBase")
    }

    fn diagnostics(body: &str) -> Diagnostics {
        match parse(body) {
            Err(SchemaGenError::SchemaDefinition(diags)) => diags,
            other => panic!("expected schema definition errors, got {other:?}"),
        }
    }

    #[test]
    fn test_concrete_typed_class() {
        let parsed = parse(
            r#"class Widget "Widget" (
    inherits = </Typed>
    doc = """A widget.
    Second line."""
) {
    uniform token mode = "a" (
        allowedTokens = ["a", ""]
    )
    float3[] points
    rel target
}
"#,
        )
        .unwrap();
        assert_eq!(parsed.library.name, "myLib");
        let cls = &parsed.classes[0];
        assert_eq!(cls.cpp_class_name, "MyLibWidget");
        assert_eq!(cls.base_file_name, "widget");
        assert_eq!(cls.parent_cpp_class_name, "UsdTyped");
        assert_eq!(cls.parent_header_file(), "typed.h");
        assert_eq!(cls.parent_lib_path, "wabi/usd/usd");
        assert_eq!(cls.schema_kind, SchemaKind::ConcreteTyped);
        assert_eq!(cls.doc, "A widget.\n/// Second line.");

        let mode = &cls.attrs["mode"];
        assert_eq!(mode.usd_type, "SdfValueTypeNames->Token");
        assert_eq!(mode.details[0].1, "`uniform token mode = \"a\"`");
        assert_eq!(mode.details[3].1, "SdfVariabilityUniform");
        assert_eq!(mode.details[4], ("\\ref MyLibTokens \"Allowed Values\"".to_string(), "a, \"\"".to_string()));
        assert_eq!(cls.attrs["points"].cpp_type, "VtArray<GfVec3f>");
        assert!(cls.rels.contains_key("target"));
    }

    #[test]
    fn test_name_must_match_type() {
        let diags = diagnostics("class Other \"Widget\" (\n    inherits = </Typed>\n) {\n}\n");
        assert!(diags.contains(DiagnosticCode::TypeNameMismatch));
    }

    #[test]
    fn test_single_inheritance() {
        let diags = diagnostics(
            "class Widget \"Widget\" (\n    inherits = [</Typed>, </APISchemaBase>]\n) {\n}\n",
        );
        assert!(diags.contains(DiagnosticCode::MultipleInheritance));
    }

    #[test]
    fn test_applied_api_parent() {
        let diags = diagnostics(
            "class \"FooAPI\" (\n    inherits = </APISchemaBase>\n) {\n}\n\n\
             class \"BarAPI\" (\n    inherits = </FooAPI>\n    customData = {\n        token apiSchemaType = \"singleApply\"\n    }\n) {\n}\n",
        );
        let message = diags.errors().map(|d| d.message.clone()).collect::<Vec<_>>().join("\n");
        assert!(message.contains("must explicitly inherit directly from APISchemaBase"));
    }

    #[test]
    fn test_api_suffix_and_kinds() {
        let diags = diagnostics("class \"Foo\" (\n    inherits = </APISchemaBase>\n) {\n}\n");
        assert!(diags.contains(DiagnosticCode::MissingApiSuffix));

        let parsed = parse(
            "class \"ModelAPI\" (\n    inherits = </APISchemaBase>\n    customData = {\n        token apiSchemaType = \"nonApplied\"\n    }\n) {\n}\n",
        )
        .unwrap();
        assert_eq!(parsed.classes[0].schema_kind, SchemaKind::NonAppliedApi);
    }

    #[test]
    fn test_multiple_apply_prefix_rules() {
        let diags = diagnostics(
            "class \"CollectionAPI\" (\n    inherits = </APISchemaBase>\n    customData = {\n        token apiSchemaType = \"multipleApply\"\n        token propertyNamespacePrefix = \"collection\"\n    }\n) {\n}\n",
        );
        assert!(diags.contains(DiagnosticCode::MultipleApplyProperties));

        let diags = diagnostics(
            "class \"CollectionAPI\" (\n    inherits = </APISchemaBase>\n    customData = {\n        token apiSchemaType = \"multipleApply\"\n    }\n) {\n    rel includes\n}\n",
        );
        assert!(diags.contains(DiagnosticCode::MultipleApplyProperties));
    }

    #[test]
    fn test_multiple_apply_names_are_templated() {
        let parsed = parse(
            "class \"CollectionAPI\" (\n    inherits = </APISchemaBase>\n    prepend apiSchemas = [\"OtherAPI:foo\"]\n    customData = {\n        token apiSchemaType = \"multipleApply\"\n        token propertyNamespacePrefix = \"collection\"\n    }\n) {\n    rel includes\n}\n",
        )
        .unwrap();
        let cls = &parsed.classes[0];
        assert_eq!(cls.schema_kind, SchemaKind::MultipleApplyApi);
        let rel = &cls.rels["collection_MultipleApplyTemplate_Includes"];
        assert_eq!(rel.prop.raw_name, "collection:__INSTANCE_NAME__:includes");
        assert_eq!(cls.all_applied_api_schemas, ["OtherAPI:__INSTANCE_NAME__:foo"]);
        assert_eq!(cls.api_schemas_metadata.prepended, ["OtherAPI:__INSTANCE_NAME__:foo"]);
    }

    #[test]
    fn test_field_errors_accumulate() {
        let diags = diagnostics(
            "class Widget \"Widget\" (\n    inherits = </Typed>\n) {\n    mystery foo\n    rel bar = </Target>\n    int baz.connect = </Widget.other>\n}\n",
        );
        assert!(diags.contains(DiagnosticCode::UnknownValueType));
        assert!(diags.contains(DiagnosticCode::DisallowedField));
        assert_eq!(diags.error_count(), 3);
    }

    #[test]
    fn test_duplicate_api_names() {
        let diags = diagnostics(
            "class Widget \"Widget\" (\n    inherits = </Typed>\n) {\n    int a (\n        customData = {\n            string apiName = \"shared\"\n        }\n    )\n    int b (\n        customData = {\n            string apiName = \"shared\"\n        }\n    )\n}\n",
        );
        assert!(diags.contains(DiagnosticCode::DuplicateApiName));
        assert!(diags.to_string().contains("  - a and b"));
    }

    #[test]
    fn test_invalid_api_get_is_a_warning() {
        let parsed = parse(
            "class Widget \"Widget\" (\n    inherits = </Typed>\n) {\n    int a (\n        customData = {\n            token apiGetImplementation = \"sometimes\"\n        }\n    )\n}\n",
        )
        .unwrap();
        assert_eq!(parsed.classes[0].attrs["a"].prop.api_get, ApiGetImplementation::Generated);
    }

    #[test]
    fn test_incompatible_registered_parent() {
        let mut types = TypeRegistry::new();
        types.register(RegisteredType {
            cpp_name: "UsdFooAPI".into(),
            bases: vec!["UsdAPISchemaBase".into()],
            schema_kind: Some(SchemaKind::SingleApplyApi),
        });
        let base = format!("{BASE}\nclass \"FooAPI\" (\n    inherits = </APISchemaBase>\n) {{\n}}\n");
        let text = "#usda 1.0\nover \"GLOBAL\" (\n    customData = {\n        string libraryName = \"myLib\"\n        string libraryPath = \"my/lib\"\n    }\n) {\n}\n\nclass \"BarAPI\" (\n    inherits = </FooAPI>\n    customData = {\n        token apiSchemaType = \"nonApplied\"\n    }\n) {\n}\n";
        let stack = LayerStack::from_layers(vec![
            parse_layer(text, "schema.usda").unwrap(),
            parse_layer(&base, "base.usda").unwrap(),
        ]);
        let err = parse_schema(&stack, &types, "UsdSchemaBase").unwrap_err();
        let SchemaGenError::SchemaDefinition(diags) = err else {
            panic!("unexpected error {err}");
        };
        assert!(diags.contains(DiagnosticCode::IncompatibleApiBase));
    }
}
