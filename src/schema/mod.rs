//! Schema Model
//!
//! Per-class information derived from the schema layer stack: generated
//! names, inheritance, API schema categorization and the class's own
//! attributes and relationships.
//!
//! - `library`: library-wide settings read from `/GLOBAL`
//! - `parse`: builds `ClassInfo` for every class and validates them
//! - `diagnostics`: accumulated schema definition problems

pub mod diagnostics;
pub mod library;
pub mod parse;

pub use diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};
pub use library::LibraryInfo;
pub use parse::{parse_schema, ParsedSchema};

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::layer::{Dictionary, ListOp, Value, Variability};
use crate::names::proper_case;

/// Prim name of the typed schema root.
pub const TYPED: &str = "Typed";
/// Prim name of the API schema root.
pub const API_SCHEMA_BASE: &str = "APISchemaBase";
/// Implicit parent of classes with no `inherits`.
pub const SCHEMA_BASE: &str = "SchemaBase";
/// Required suffix of API schema names.
pub const API_SUFFIX: &str = "API";

// =============================================================================
// Classification
// =============================================================================

/// Value of the `apiSchemaType` customData field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiSchemaType {
    NonApplied,
    SingleApply,
    MultipleApply,
}

impl ApiSchemaType {
    pub const ALL: [&'static str; 3] = ["nonApplied", "singleApply", "multipleApply"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonApplied => "nonApplied",
            Self::SingleApply => "singleApply",
            Self::MultipleApply => "multipleApply",
        }
    }
}

impl FromStr for ApiSchemaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nonApplied" => Ok(Self::NonApplied),
            "singleApply" => Ok(Self::SingleApply),
            "multipleApply" => Ok(Self::MultipleApply),
            other => Err(other.to_string()),
        }
    }
}

/// Mutually exclusive schema category, computed from the class definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    AbstractBase,
    AbstractTyped,
    ConcreteTyped,
    NonAppliedApi,
    SingleApplyApi,
    MultipleApplyApi,
}

impl SchemaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AbstractBase => "abstractBase",
            Self::AbstractTyped => "abstractTyped",
            Self::ConcreteTyped => "concreteTyped",
            Self::NonAppliedApi => "nonAppliedAPI",
            Self::SingleApplyApi => "singleApplyAPI",
            Self::MultipleApplyApi => "multipleApplyAPI",
        }
    }

    /// Enumerator name used by generated code (`UsdSchemaKind::ConcreteTyped`).
    pub fn enum_value(&self) -> String {
        format!("UsdSchemaKind::{}", proper_case(self.as_str()))
    }

    pub fn is_applied_api(&self) -> bool {
        matches!(self, Self::SingleApplyApi | Self::MultipleApplyApi)
    }

    pub fn is_multiple_apply(&self) -> bool {
        matches!(self, Self::MultipleApplyApi)
    }
}

impl FromStr for SchemaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abstractBase" => Ok(Self::AbstractBase),
            "abstractTyped" => Ok(Self::AbstractTyped),
            "concreteTyped" => Ok(Self::ConcreteTyped),
            "nonAppliedAPI" => Ok(Self::NonAppliedApi),
            "singleApplyAPI" => Ok(Self::SingleApplyApi),
            "multipleApplyAPI" => Ok(Self::MultipleApplyApi),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How accessors for a property are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiGetImplementation {
    /// Full public API is generated.
    #[default]
    Generated,
    /// Only the declaration is generated.
    Custom,
}

impl ApiGetImplementation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Custom => "custom",
        }
    }
}

// =============================================================================
// Members
// =============================================================================

/// Fields shared by attributes and relationships.
#[derive(Debug, Clone, PartialEq)]
pub struct PropInfo {
    /// Identifier used for tokens and generated names.
    pub name: String,
    /// Property name as registered; namespace-prefixed for multiple-apply.
    pub raw_name: String,
    /// Name used for accessors; empty suppresses them.
    pub api_name: String,
    pub api_get: ApiGetImplementation,
    /// Documentation with comment leaders applied.
    pub doc: String,
    pub raw_doc: Option<String>,
    pub custom_data: Dictionary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttrInfo {
    pub prop: PropInfo,
    /// Declared type (`float3[]`).
    pub type_name: String,
    /// `SdfValueTypeNames->Float3Array`
    pub usd_type: String,
    pub cpp_type: String,
    pub variability: Variability,
    pub fallback: Option<Value>,
    pub allowed_tokens: Option<Vec<String>>,
    /// Attribute declaration as it reads in the schema document.
    pub declaration: String,
    /// (label, value) rows for generated documentation.
    pub details: Vec<(String, String)>,
}

impl AttrInfo {
    pub fn is_token_typed(&self) -> bool {
        self.type_name == "token"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelInfo {
    pub prop: PropInfo,
}

// =============================================================================
// Class
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ClassInfo {
    // Identity
    pub prim_name: String,
    pub usd_prim_type_name: String,
    pub class_name: String,
    pub cpp_class_name: String,
    pub base_file_name: String,

    // Hierarchy
    pub parent_prim_name: String,
    pub parent_cpp_class_name: String,
    pub parent_base_file_name: String,
    pub parent_lib_path: String,

    // Metadata
    pub doc: String,
    pub raw_doc: Option<String>,
    /// Declared type name; empty for abstract classes.
    pub type_name: String,
    pub extra_includes: Option<String>,
    pub custom_data: Dictionary,
    /// Built-in API schemas authored directly on the class (prepend only).
    pub api_schemas_metadata: ListOp,
    /// Built-in API schemas including those of parent classes.
    pub all_applied_api_schemas: Vec<String>,

    // Classification
    pub is_concrete: bool,
    pub is_typed: bool,
    pub is_api_schema_base: bool,
    pub is_api: bool,
    pub api_schema_type: Option<ApiSchemaType>,
    pub is_applied_api_schema: bool,
    pub is_multiple_apply: bool,
    pub schema_kind: SchemaKind,

    // API schema metadata
    pub property_namespace_prefix: Option<String>,
    pub api_auto_apply: Option<Vec<String>>,
    pub api_can_only_apply: Option<Vec<String>>,
    pub api_allowed_instance_names: Option<Vec<String>>,
    pub api_schema_instances: Option<Dictionary>,
    pub fallback_prim_types: Option<Vec<String>>,

    // Members
    pub use_literal_identifier: bool,
    pub attrs: IndexMap<String, AttrInfo>,
    pub rels: IndexMap<String, RelInfo>,
    /// Token identifiers contributed by this class; filled by token gathering.
    pub tokens: BTreeSet<String>,
}

impl ClassInfo {
    pub fn path(&self) -> String {
        format!("/{}", self.prim_name)
    }

    pub fn header_file(&self) -> String {
        format!("{}.h", self.base_file_name)
    }

    pub fn parent_header_file(&self) -> String {
        format!("{}.h", self.parent_base_file_name)
    }

    pub fn cpp_file(&self) -> String {
        format!("{}.cpp", self.base_file_name)
    }

    pub fn wrap_file(&self) -> String {
        format!("wrap{}.cpp", self.class_name)
    }

    pub fn has_properties(&self) -> bool {
        !self.attrs.is_empty() || !self.rels.is_empty()
    }
}

/// Find a parsed class by its generated C++ class name.
pub fn find_class<'a>(classes: &'a [ClassInfo], cpp_class_name: &str) -> Option<&'a ClassInfo> {
    classes.iter().find(|c| c.cpp_class_name == cpp_class_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_kind_strings() {
        assert_eq!(SchemaKind::NonAppliedApi.as_str(), "nonAppliedAPI");
        assert_eq!(SchemaKind::NonAppliedApi.enum_value(), "UsdSchemaKind::NonAppliedAPI");
        assert_eq!(
            "multipleApplyAPI".parse::<SchemaKind>(),
            Ok(SchemaKind::MultipleApplyApi)
        );
        assert!(SchemaKind::SingleApplyApi.is_applied_api());
        assert!(!SchemaKind::ConcreteTyped.is_applied_api());
    }

    #[test]
    fn test_api_schema_type_parse() {
        assert_eq!("singleApply".parse::<ApiSchemaType>(), Ok(ApiSchemaType::SingleApply));
        assert_eq!("sometimes".parse::<ApiSchemaType>(), Err("sometimes".to_string()));
    }
}
