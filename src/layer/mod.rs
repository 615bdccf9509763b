//! Schema Documents
//!
//! In-memory form of the layered text documents schemas are authored in:
//! prims with a specifier, type name, metadata and properties, organized in
//! a layer stack where stronger layers override weaker ones.
//!
//! - `tokenizer` / `parser`: text → `Layer`
//! - `writer`: `Layer` → text
//! - `stack`: sublayer resolution, composition queries and flattening
//! - `value_types`: the attribute value type vocabulary

pub mod parser;
pub mod stack;
pub mod tokenizer;
pub mod value_types;
pub mod writer;

pub use parser::parse_layer;
pub use stack::{LayerStack, PrimDefinitions};
pub use value_types::{find_value_type, is_known_value_type, ValueType};
pub use writer::{attribute_declaration, export_to_string};

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::Result;

// =============================================================================
// Values
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    /// Numbers keep their source lexeme so re-serialization is byte-stable.
    Number(String),
    String(String),
    Asset(String),
    Path(String),
    Array(Vec<Value>),
    Tuple(Vec<Value>),
    Dictionary(Dictionary),
    None,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => Some(n != "0"),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Value::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Strings out of an array value; non-string members are skipped.
    pub fn as_str_list(&self) -> Option<Vec<String>> {
        match self {
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Plain JSON rendering used by the plugin descriptor.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => n
                .parse::<i64>()
                .map(Json::from)
                .or_else(|_| n.parse::<f64>().map(Json::from))
                .unwrap_or_else(|_| Json::String(n.clone())),
            Value::String(s) | Value::Asset(s) | Value::Path(s) => Json::String(s.clone()),
            Value::Array(items) | Value::Tuple(items) => {
                Json::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Dictionary(dict) => dictionary_to_json(dict),
            Value::None => Json::Null,
        }
    }
}

/// A dictionary entry keeps its declared type for re-serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub type_name: String,
    pub value: Value,
}

impl TypedValue {
    pub fn new(type_name: impl Into<String>, value: Value) -> Self {
        Self {
            type_name: type_name.into(),
            value,
        }
    }
}

pub type Dictionary = IndexMap<String, TypedValue>;

/// Typed accessors over customData-style dictionaries.
pub trait DictionaryExt {
    fn get_value(&self, key: &str) -> Option<&Value>;

    fn get_str(&self, key: &str) -> Option<&str> {
        self.get_value(key).and_then(Value::as_str)
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_value(key).and_then(Value::as_bool)
    }

    fn get_dict(&self, key: &str) -> Option<&Dictionary> {
        self.get_value(key).and_then(Value::as_dict)
    }

    fn get_str_list(&self, key: &str) -> Option<Vec<String>> {
        self.get_value(key).and_then(Value::as_str_list)
    }
}

impl DictionaryExt for Dictionary {
    fn get_value(&self, key: &str) -> Option<&Value> {
        self.get(key).map(|entry| &entry.value)
    }
}

pub fn dictionary_to_json(dict: &Dictionary) -> serde_json::Value {
    serde_json::Value::Object(
        dict.iter()
            .map(|(k, v)| (k.clone(), v.value.to_json()))
            .collect(),
    )
}

/// Merge `weaker` under `stronger`: stronger keys win, nested dictionaries
/// merge recursively.
pub fn merge_dictionaries(stronger: &Dictionary, weaker: &Dictionary) -> Dictionary {
    let mut merged = weaker.clone();
    for (key, entry) in stronger {
        let combined = match (merged.get(key), &entry.value) {
            (Some(TypedValue { value: Value::Dictionary(w), .. }), Value::Dictionary(s)) => {
                TypedValue::new(entry.type_name.clone(), Value::Dictionary(merge_dictionaries(s, w)))
            }
            _ => entry.clone(),
        };
        merged.insert(key.clone(), combined);
    }
    merged
}

// =============================================================================
// List Operations
// =============================================================================

/// Keyword preceding a list-op valued field (`prepend apiSchemas = [...]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOpKeyword {
    Explicit,
    Prepend,
    Append,
    Delete,
    Add,
}

impl ListOpKeyword {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "prepend" => Some(Self::Prepend),
            "append" => Some(Self::Append),
            "delete" => Some(Self::Delete),
            "add" => Some(Self::Add),
            _ => None,
        }
    }

    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            Self::Explicit => None,
            Self::Prepend => Some("prepend"),
            Self::Append => Some("append"),
            Self::Delete => Some("delete"),
            Self::Add => Some("add"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOp {
    pub explicit: Option<Vec<String>>,
    pub prepended: Vec<String>,
    pub appended: Vec<String>,
    pub deleted: Vec<String>,
    pub added: Vec<String>,
}

impl ListOp {
    pub fn explicit(items: Vec<String>) -> Self {
        Self {
            explicit: Some(items),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.explicit.is_none()
            && self.prepended.is_empty()
            && self.appended.is_empty()
            && self.deleted.is_empty()
            && self.added.is_empty()
    }

    pub fn is_prepend_only(&self) -> bool {
        self.explicit.is_none()
            && self.appended.is_empty()
            && self.deleted.is_empty()
            && self.added.is_empty()
    }

    pub fn set(&mut self, keyword: ListOpKeyword, items: Vec<String>) {
        match keyword {
            ListOpKeyword::Explicit => self.explicit = Some(items),
            ListOpKeyword::Prepend => self.prepended = items,
            ListOpKeyword::Append => self.appended = items,
            ListOpKeyword::Delete => self.deleted = items,
            ListOpKeyword::Add => self.added = items,
        }
    }

    /// Explicit items, or else the prepended/appended/added items.
    pub fn added_or_explicit_items(&self) -> Vec<String> {
        match &self.explicit {
            Some(items) => items.clone(),
            None => self
                .prepended
                .iter()
                .chain(self.appended.iter())
                .chain(self.added.iter())
                .cloned()
                .collect(),
        }
    }

    /// Apply this operation to a weaker list.
    pub fn apply(&self, base: &[String]) -> Vec<String> {
        if let Some(items) = &self.explicit {
            return dedup(items.iter().cloned());
        }
        let kept = base
            .iter()
            .filter(|item| !self.deleted.contains(item))
            .filter(|item| !self.prepended.contains(item) && !self.appended.contains(item));
        let mut result = dedup(self.prepended.iter().chain(kept).cloned());
        for item in self.added.iter().chain(self.appended.iter()) {
            if self.appended.contains(item) {
                result.retain(|existing| existing != item);
                result.push(item.clone());
            } else if !result.contains(item) {
                result.push(item.clone());
            }
        }
        result
    }

    /// Every (keyword, items) pair that is authored, in writing order.
    pub fn authored(&self) -> Vec<(ListOpKeyword, &[String])> {
        let mut out: Vec<(ListOpKeyword, &[String])> = Vec::new();
        if let Some(items) = &self.explicit {
            out.push((ListOpKeyword::Explicit, items));
        }
        for (keyword, items) in [
            (ListOpKeyword::Delete, &self.deleted),
            (ListOpKeyword::Add, &self.added),
            (ListOpKeyword::Prepend, &self.prepended),
            (ListOpKeyword::Append, &self.appended),
        ] {
            if !items.is_empty() {
                out.push((keyword, items));
            }
        }
        out
    }
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

// =============================================================================
// Specs
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specifier {
    Def,
    Over,
    Class,
}

impl Specifier {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "def" => Some(Self::Def),
            "over" => Some(Self::Over),
            "class" => Some(Self::Class),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Def => "def",
            Self::Over => "over",
            Self::Class => "class",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variability {
    #[default]
    Varying,
    Uniform,
}

impl Variability {
    /// Name used in generated documentation and code.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Varying => "SdfVariabilityVarying",
            Self::Uniform => "SdfVariabilityUniform",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    Attribute {
        type_name: String,
        default: Option<Value>,
        connections: Option<Vec<String>>,
        has_time_samples: bool,
    },
    Relationship {
        targets: Option<Vec<String>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertySpec {
    pub name: String,
    pub custom: bool,
    pub variability: Variability,
    pub kind: PropertyKind,
    pub documentation: Option<String>,
    pub allowed_tokens: Option<Vec<String>>,
    pub custom_data: Dictionary,
    /// Any other authored metadata, by field name.
    pub metadata: IndexMap<String, Value>,
}

impl PropertySpec {
    pub fn attribute(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(
            name,
            PropertyKind::Attribute {
                type_name: type_name.into(),
                default: None,
                connections: None,
                has_time_samples: false,
            },
        )
    }

    pub fn relationship(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Relationship { targets: None })
    }

    fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            custom: false,
            variability: Variability::Varying,
            kind,
            documentation: None,
            allowed_tokens: None,
            custom_data: Dictionary::new(),
            metadata: IndexMap::new(),
        }
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self.kind, PropertyKind::Attribute { .. })
    }

    pub fn type_name(&self) -> Option<&str> {
        match &self.kind {
            PropertyKind::Attribute { type_name, .. } => Some(type_name),
            PropertyKind::Relationship { .. } => None,
        }
    }

    pub fn default_value(&self) -> Option<&Value> {
        match &self.kind {
            PropertyKind::Attribute { default, .. } => default.as_ref(),
            PropertyKind::Relationship { .. } => None,
        }
    }

    /// Names of every authored field.
    pub fn info_keys(&self) -> Vec<String> {
        let mut keys = vec!["variability".to_string()];
        match &self.kind {
            PropertyKind::Attribute {
                default,
                connections,
                has_time_samples,
                ..
            } => {
                keys.push("typeName".to_string());
                if default.is_some() {
                    keys.push("default".to_string());
                }
                if connections.is_some() {
                    keys.push("connectionPaths".to_string());
                }
                if *has_time_samples {
                    keys.push("timeSamples".to_string());
                }
            }
            PropertyKind::Relationship { targets } => {
                if targets.is_some() {
                    keys.push("targetPaths".to_string());
                }
            }
        }
        if self.documentation.is_some() {
            keys.push("documentation".to_string());
        }
        if self.allowed_tokens.is_some() {
            keys.push("allowedTokens".to_string());
        }
        if !self.custom_data.is_empty() {
            keys.push("customData".to_string());
        }
        keys.extend(self.metadata.keys().cloned());
        keys
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimSpec {
    pub name: String,
    pub specifier: Specifier,
    pub type_name: String,
    pub documentation: Option<String>,
    pub inherits: ListOp,
    pub api_schemas: ListOp,
    pub custom_data: Dictionary,
    /// Any other authored metadata, by field name.
    pub metadata: IndexMap<String, Value>,
    pub properties: Vec<PropertySpec>,
    pub children: Vec<PrimSpec>,
}

impl PrimSpec {
    pub fn new(name: impl Into<String>, specifier: Specifier) -> Self {
        Self {
            name: name.into(),
            specifier,
            type_name: String::new(),
            documentation: None,
            inherits: ListOp::default(),
            api_schemas: ListOp::default(),
            custom_data: Dictionary::new(),
            metadata: IndexMap::new(),
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn path(&self) -> String {
        format!("/{}", self.name)
    }

    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// Names of every authored metadata field, `specifier` included.
    pub fn info_keys(&self) -> Vec<String> {
        let mut keys = vec!["specifier".to_string()];
        if !self.type_name.is_empty() {
            keys.push("typeName".to_string());
        }
        if self.documentation.is_some() {
            keys.push("documentation".to_string());
        }
        if !self.inherits.is_empty() {
            keys.push("inheritPaths".to_string());
        }
        if !self.api_schemas.is_empty() {
            keys.push("apiSchemas".to_string());
        }
        if !self.custom_data.is_empty() {
            keys.push("customData".to_string());
        }
        keys.extend(self.metadata.keys().cloned());
        keys
    }
}

/// Prim name out of a root prim path (`</Typed>` → `Typed`).
pub fn prim_name_from_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

// =============================================================================
// Layer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Layer {
    /// Where the layer was read from; empty for in-memory layers.
    pub identifier: PathBuf,
    /// Layer comment (bare string in the layer metadata block).
    pub comment: Option<String>,
    pub documentation: Option<String>,
    pub sub_layers: Vec<String>,
    pub metadata: IndexMap<String, Value>,
    pub root_prims: Vec<PrimSpec>,
}

impl Layer {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Read and parse a layer file.
    pub fn open(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut layer = parse_layer(&text, &path.display().to_string())?;
        layer.identifier = path.to_path_buf();
        Ok(layer)
    }

    pub fn prim(&self, name: &str) -> Option<&PrimSpec> {
        self.root_prims.iter().find(|p| p.name == name)
    }

    pub fn prim_mut(&mut self, name: &str) -> Option<&mut PrimSpec> {
        self.root_prims.iter_mut().find(|p| p.name == name)
    }

    /// Remove a root prim, reporting whether it existed.
    pub fn remove_prim(&mut self, name: &str) -> bool {
        let before = self.root_prims.len();
        self.root_prims.retain(|p| p.name != name);
        before != self.root_prims.len()
    }

    /// Directory sublayer paths are resolved against.
    pub fn directory(&self) -> Option<&Path> {
        self.identifier.parent()
    }
}
