//! Layer Stack
//!
//! The schema file and everything it sublayers, strongest first, plus the
//! handful of composition queries the generator needs:
//! - composed metadata across the prim stack
//! - inheritance (composed `inherits`, transitive "is typed", cycle checks)
//! - applied API schemas through the prim stack and inherited classes
//! - flattening into a single self-contained layer

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use petgraph::algo::kosaraju_scc;
use petgraph::graph::DiGraph;
use tracing::debug;

use super::{
    merge_dictionaries, prim_name_from_path, Dictionary, Layer, ListOp, PrimSpec, PropertyKind,
    PropertySpec, Specifier,
};
use crate::error::{Result, SchemaGenError};

/// Root of the typed schema hierarchy.
pub const TYPED_PRIM_NAME: &str = "Typed";

/// Prim definitions shipped by previously generated libraries, keyed by
/// schema type name. Their property types and variability win over any
/// opinion in the layer stack.
#[derive(Debug, Clone, Default)]
pub struct PrimDefinitions {
    prims: IndexMap<String, PrimSpec>,
}

impl PrimDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, type_name: impl Into<String>, prim: PrimSpec) {
        self.prims.insert(type_name.into(), prim);
    }

    pub fn get(&self, type_name: &str) -> Option<&PrimSpec> {
        self.prims.get(type_name)
    }

    pub fn len(&self) -> usize {
        self.prims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prims.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LayerStack {
    /// Strongest first; index 0 is the root layer.
    layers: Vec<Layer>,
}

impl LayerStack {
    /// Open `path` and, depth-first, every layer it sublayers.
    pub fn open(path: &Path, search_paths: &[PathBuf]) -> Result<Self> {
        let mut layers = Vec::new();
        let mut chain = Vec::new();
        let mut opened = HashSet::new();
        open_recursive(path, search_paths, &mut chain, &mut opened, &mut layers)?;
        Ok(Self { layers })
    }

    /// Build a stack from already-parsed layers, strongest first.
    pub fn from_layers(layers: Vec<Layer>) -> Self {
        Self { layers }
    }

    pub fn root(&self) -> &Layer {
        &self.layers[0]
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Layers below the root, strongest first.
    pub fn sublayers(&self) -> &[Layer] {
        &self.layers[1..]
    }

    /// Every spec for a root prim, strongest first, with its layer index.
    pub fn prim_stack(&self, name: &str) -> Vec<(usize, &PrimSpec)> {
        self.layers
            .iter()
            .enumerate()
            .filter_map(|(i, layer)| layer.prim(name).map(|p| (i, p)))
            .collect()
    }

    /// Root prim names, stronger layers' order first.
    pub fn root_prim_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for layer in &self.layers {
            for prim in &layer.root_prims {
                if !names.contains(&prim.name) {
                    names.push(prim.name.clone());
                }
            }
        }
        names
    }

    pub fn has_prim(&self, name: &str) -> bool {
        self.layers.iter().any(|layer| layer.prim(name).is_some())
    }

    // =========================================================================
    // Composed metadata
    // =========================================================================

    /// Strongest non-`over` specifier; `over` when every opinion is one.
    pub fn composed_specifier(&self, name: &str) -> Option<Specifier> {
        let stack = self.prim_stack(name);
        let (_, strongest) = stack.first()?;
        Some(
            stack
                .iter()
                .map(|(_, p)| p.specifier)
                .find(|s| *s != Specifier::Over)
                .unwrap_or(strongest.specifier),
        )
    }

    /// Strongest type name authored on the prim's own specs.
    ///
    /// Inherited classes are not consulted, so a class that authors no type
    /// name reports an empty one here. [`LayerStack::flatten`] still gives
    /// such a class the type name of its nearest typed ancestor.
    pub fn composed_type_name(&self, name: &str) -> String {
        self.prim_stack(name)
            .into_iter()
            .map(|(_, p)| p.type_name.as_str())
            .find(|t| !t.is_empty())
            .unwrap_or_default()
            .to_string()
    }

    pub fn composed_custom_data(&self, name: &str) -> Dictionary {
        self.prim_stack(name)
            .into_iter()
            .rev()
            .fold(Dictionary::new(), |acc, (_, p)| merge_dictionaries(&p.custom_data, &acc))
    }

    /// Inherit paths with list-ops applied weakest to strongest.
    pub fn composed_inherits(&self, name: &str) -> Vec<String> {
        compose_list_op(self.prim_stack(name).into_iter().map(|(_, p)| &p.inherits))
    }

    /// Whether `name` transitively inherits from `/Typed`.
    pub fn is_typed(&self, name: &str) -> bool {
        let mut visited = HashSet::new();
        let mut pending = vec![name.to_string()];
        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            for path in self.composed_inherits(&current) {
                let parent = prim_name_from_path(&path);
                if parent == TYPED_PRIM_NAME {
                    return true;
                }
                pending.push(parent.to_string());
            }
        }
        false
    }

    /// Reject inheritance cycles among root prims.
    pub fn check_inheritance_cycles(&self) -> Result<()> {
        let names = self.root_prim_names();
        let mut graph: DiGraph<String, ()> = DiGraph::with_capacity(names.len(), names.len());
        let mut indices = IndexMap::with_capacity(names.len());
        for name in &names {
            indices.insert(name.clone(), graph.add_node(name.clone()));
        }
        for name in &names {
            for path in self.composed_inherits(name) {
                if let Some(&parent) = indices.get(prim_name_from_path(&path)) {
                    graph.add_edge(indices[name], parent, ());
                }
            }
        }

        for scc in kosaraju_scc(&graph) {
            let self_loop = scc.len() == 1 && graph.contains_edge(scc[0], scc[0]);
            if scc.len() > 1 || self_loop {
                let mut members: Vec<&str> = scc.iter().map(|&i| graph[i].as_str()).collect();
                members.sort_unstable();
                return Err(SchemaGenError::definition(
                    format!("/{}", members[0]),
                    format!("Inheritance cycle between {}", members.join(", ")),
                ));
            }
        }
        Ok(())
    }

    /// Applied API schemas through the prim stack and inherited classes.
    ///
    /// Inherited class opinions are weaker than the prim's own.
    pub fn composed_api_schemas(&self, name: &str) -> Vec<String> {
        let specs = self.composed_specs(name);
        compose_list_op(specs.into_iter().map(|p| &p.api_schemas))
    }

    /// All specs contributing to `name`, strongest first: its own prim stack
    /// followed by the specs of each inherited class, depth first.
    fn composed_specs(&self, name: &str) -> Vec<&PrimSpec> {
        let mut specs = Vec::new();
        let mut visited = HashSet::new();
        self.collect_specs(name, &mut visited, &mut specs);
        specs
    }

    fn collect_specs<'s>(
        &'s self,
        name: &str,
        visited: &mut HashSet<String>,
        specs: &mut Vec<&'s PrimSpec>,
    ) {
        if !visited.insert(name.to_string()) {
            return;
        }
        specs.extend(self.prim_stack(name).into_iter().map(|(_, p)| p));
        for path in self.composed_inherits(name) {
            self.collect_specs(prim_name_from_path(&path), visited, specs);
        }
    }

    // =========================================================================
    // Flattening
    // =========================================================================

    /// Resolve every root prim into one self-contained spec.
    ///
    /// `session` is consulted as the strongest layer. Inherited members are
    /// copied in and the `inherits` arcs dropped. Properties of prims whose
    /// composed type has a built-in definition keep the built-in type name
    /// and variability.
    pub fn flatten(&self, session: &Layer, builtins: &PrimDefinitions) -> Layer {
        let mut composed = Vec::with_capacity(self.layers.len() + 1);
        composed.push(session.clone());
        composed.extend(self.layers.iter().cloned());
        let full = LayerStack::from_layers(composed);

        let mut flat = Layer::anonymous();
        flat.documentation = self.root().documentation.clone();
        for name in self.root_prim_names() {
            let specs = full.composed_specs(&name);
            let mut prim = flatten_specs(&name, &specs);
            prim.api_schemas = api_schema_list_op(full.composed_api_schemas(&name));
            if let Some(builtin) = builtins.get(&prim.type_name) {
                pin_builtin_properties(&mut prim, builtin);
            }
            flat.root_prims.push(prim);
        }
        debug!("Flattened {} prims", flat.root_prims.len());
        flat
    }
}

fn open_recursive(
    path: &Path,
    search_paths: &[PathBuf],
    chain: &mut Vec<PathBuf>,
    opened: &mut HashSet<PathBuf>,
    layers: &mut Vec<Layer>,
) -> Result<()> {
    let canonical = path.canonicalize().map_err(|e| {
        SchemaGenError::config(format!("Unable to open layer {}: {e}", path.display()))
    })?;
    if chain.contains(&canonical) {
        return Err(SchemaGenError::config(format!(
            "Sublayer cycle detected at {}",
            path.display()
        )));
    }
    if !opened.insert(canonical.clone()) {
        return Ok(());
    }

    let layer = Layer::open(&canonical)?;
    debug!("Opened layer {}", canonical.display());
    let sub_layers = layer.sub_layers.clone();
    let base_dir = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
    layers.push(layer);

    chain.push(canonical);
    for sub_layer in sub_layers {
        let resolved = resolve_layer_path(&sub_layer, &base_dir, search_paths).ok_or_else(|| {
            SchemaGenError::config(format!(
                "Unable to resolve sublayer @{sub_layer}@ of {}",
                path.display()
            ))
        })?;
        open_recursive(&resolved, search_paths, chain, opened, layers)?;
    }
    chain.pop();
    Ok(())
}

/// Relative to the including layer first, then each search path.
pub fn resolve_layer_path(asset: &str, base_dir: &Path, search_paths: &[PathBuf]) -> Option<PathBuf> {
    let asset_path = Path::new(asset);
    if asset_path.is_absolute() {
        return asset_path.exists().then(|| asset_path.to_path_buf());
    }
    std::iter::once(base_dir)
        .chain(search_paths.iter().map(PathBuf::as_path))
        .map(|dir| dir.join(asset_path))
        .find(|candidate| candidate.exists())
}

/// Apply list-ops given strongest first.
fn compose_list_op<'a>(ops: impl DoubleEndedIterator<Item = &'a ListOp>) -> Vec<String> {
    ops.rev().fold(Vec::new(), |acc, op| op.apply(&acc))
}

fn api_schema_list_op(schemas: Vec<String>) -> ListOp {
    if schemas.is_empty() {
        ListOp::default()
    } else {
        ListOp::explicit(schemas)
    }
}

/// Merge specs given strongest first into one prim spec.
fn flatten_specs(name: &str, specs: &[&PrimSpec]) -> PrimSpec {
    let specifier = specs
        .iter()
        .map(|p| p.specifier)
        .find(|s| *s != Specifier::Over)
        .unwrap_or(Specifier::Over);
    let mut prim = PrimSpec::new(name, specifier);
    prim.type_name = specs
        .iter()
        .map(|p| p.type_name.as_str())
        .find(|t| !t.is_empty())
        .unwrap_or_default()
        .to_string();
    prim.documentation = specs.iter().find_map(|p| p.documentation.clone());

    for spec in specs.iter().rev() {
        prim.custom_data = merge_dictionaries(&spec.custom_data, &prim.custom_data);
        for (key, value) in &spec.metadata {
            prim.metadata.insert(key.clone(), value.clone());
        }
    }

    let mut property_names: Vec<&str> = Vec::new();
    for spec in specs {
        for property in &spec.properties {
            if !property_names.contains(&property.name.as_str()) {
                property_names.push(&property.name);
            }
        }
    }
    for property_name in property_names {
        let opinions: Vec<&PropertySpec> = specs
            .iter()
            .filter_map(|p| p.property(property_name))
            .collect();
        prim.properties.push(flatten_property(&opinions));
    }

    let mut child_names: Vec<&str> = Vec::new();
    for spec in specs {
        for child in &spec.children {
            if !child_names.contains(&child.name.as_str()) {
                child_names.push(&child.name);
            }
        }
    }
    for child_name in child_names {
        let child_specs: Vec<&PrimSpec> = specs
            .iter()
            .filter_map(|p| p.children.iter().find(|c| c.name == child_name))
            .collect();
        prim.children.push(flatten_specs(child_name, &child_specs));
    }
    prim
}

/// Merge property opinions given strongest first.
fn flatten_property(opinions: &[&PropertySpec]) -> PropertySpec {
    let strongest = opinions[0];
    let mut property = strongest.clone();
    property.documentation = opinions.iter().find_map(|p| p.documentation.clone());
    property.allowed_tokens = opinions.iter().find_map(|p| p.allowed_tokens.clone());
    property.custom_data = Dictionary::new();
    property.metadata = IndexMap::new();
    for opinion in opinions.iter().rev() {
        property.custom_data = merge_dictionaries(&opinion.custom_data, &property.custom_data);
        for (key, value) in &opinion.metadata {
            property.metadata.insert(key.clone(), value.clone());
        }
    }
    if let PropertyKind::Attribute { default, .. } = &mut property.kind {
        *default = opinions.iter().find_map(|p| p.default_value().cloned());
    }
    property
}

fn pin_builtin_properties(prim: &mut PrimSpec, builtin: &PrimSpec) {
    for property in &mut prim.properties {
        let Some(definition) = builtin.property(&property.name) else {
            continue;
        };
        property.variability = definition.variability;
        if let (
            PropertyKind::Attribute { type_name, .. },
            PropertyKind::Attribute {
                type_name: builtin_type,
                ..
            },
        ) = (&mut property.kind, &definition.kind)
        {
            type_name.clone_from(builtin_type);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{parse_layer, DictionaryExt};

    const BASE: &str = r#"#usda 1.0
class "Typed" {
}

class "APISchemaBase" {
}

class Thing "Thing" (
    inherits = </Typed>
    doc = "Base thing"
    customData = {
        string className = "Thing"
        string shared = "base"
    }
)
{
    float size = 1.0 (
        doc = "Size"
    )
}
"#;

    const LIB: &str = r#"#usda 1.0
class Widget "Widget" (
    inherits = </Thing>
    prepend apiSchemas = ["WidgetAPI"]
    customData = {
        string shared = "lib"
    }
)
{
    token mode = "fast"
}

class "Loose" {
}

over "Thing" (
    customData = {
        string extra = "lib"
    }
) {
}
"#;

    fn stack() -> LayerStack {
        LayerStack::from_layers(vec![
            parse_layer(LIB, "lib.usda").unwrap(),
            parse_layer(BASE, "base.usda").unwrap(),
        ])
    }

    #[test]
    fn test_root_prim_order() {
        assert_eq!(
            stack().root_prim_names(),
            ["Widget", "Loose", "Thing", "Typed", "APISchemaBase"]
        );
    }

    #[test]
    fn test_composed_metadata() {
        let stack = stack();
        assert_eq!(stack.composed_specifier("Thing"), Some(Specifier::Class));
        assert_eq!(stack.composed_type_name("Thing"), "Thing");
        let custom_data = stack.composed_custom_data("Thing");
        assert_eq!(custom_data.get_str("shared"), Some("base"));
        assert_eq!(custom_data.get_str("extra"), Some("lib"));
    }

    #[test]
    fn test_is_typed() {
        let stack = stack();
        assert!(stack.is_typed("Widget"));
        assert!(stack.is_typed("Thing"));
        assert!(!stack.is_typed("Loose"));
        assert!(!stack.is_typed("Typed"));
    }

    #[test]
    fn test_inheritance_cycle_rejected() {
        let layer = parse_layer(
            "class \"A\" (inherits = </B>) {}\nclass \"B\" (inherits = </A>) {}",
            "cycle.usda",
        )
        .unwrap();
        let err = LayerStack::from_layers(vec![layer]).check_inheritance_cycles().unwrap_err();
        assert!(err.to_string().contains("Inheritance cycle between A, B"));
        assert!(stack().check_inheritance_cycles().is_ok());
    }

    #[test]
    fn test_composed_api_schemas() {
        assert_eq!(stack().composed_api_schemas("Widget"), ["WidgetAPI"]);
        assert!(stack().composed_api_schemas("Thing").is_empty());
    }

    #[test]
    fn test_flatten_copies_inherited_members() {
        let flat = stack().flatten(&Layer::anonymous(), &PrimDefinitions::new());
        let widget = flat.prim("Widget").unwrap();
        let names: Vec<&str> = widget.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["mode", "size"]);
        assert!(widget.inherits.is_empty());
        assert_eq!(widget.documentation.as_deref(), Some("Base thing"));
        assert_eq!(widget.custom_data.get_str("shared"), Some("lib"));
        assert_eq!(widget.api_schemas.explicit, Some(vec!["WidgetAPI".to_string()]));
    }

    #[test]
    fn test_type_name_comes_from_own_specs_only() {
        let layer = parse_layer(
            "class Sub \"Sub\" {\n}\n\nclass \"Thing\" (inherits = </Sub>) {\n}\n",
            "typed.usda",
        )
        .unwrap();
        let stack = LayerStack::from_layers(vec![layer]);
        assert_eq!(stack.composed_type_name("Sub"), "Sub");
        assert_eq!(stack.composed_type_name("Thing"), "");

        let flat = stack.flatten(&Layer::anonymous(), &PrimDefinitions::new());
        assert_eq!(flat.prim("Thing").unwrap().type_name, "Sub");

        // Session opinions on the parent reach the inheriting class too.
        let mut session = Layer::anonymous();
        let mut over = PrimSpec::new("Sub", Specifier::Over);
        over.type_name = "Renamed".into();
        session.root_prims.push(over);
        let flat = stack.flatten(&session, &PrimDefinitions::new());
        assert_eq!(flat.prim("Thing").unwrap().type_name, "Renamed");
    }

    #[test]
    fn test_flatten_session_and_builtins() {
        let mut session = Layer::anonymous();
        let mut over = PrimSpec::new("Widget", Specifier::Over);
        over.type_name = "Renamed".into();
        session.root_prims.push(over);

        let mut builtin = PrimSpec::new("Renamed", Specifier::Class);
        let mut mode = PropertySpec::attribute("mode", "string");
        mode.variability = crate::layer::Variability::Uniform;
        builtin.properties.push(mode);
        let mut builtins = PrimDefinitions::new();
        builtins.insert("Renamed", builtin);

        let flat = stack().flatten(&session, &builtins);
        let widget = flat.prim("Widget").unwrap();
        assert_eq!(widget.type_name, "Renamed");
        let mode = widget.property("mode").unwrap();
        assert_eq!(mode.type_name(), Some("string"));
        assert_eq!(mode.variability, crate::layer::Variability::Uniform);
    }

    #[test]
    fn test_open_resolves_sublayers() {
        let dir = tempfile::tempdir().unwrap();
        let base_dir = dir.path().join("base");
        std::fs::create_dir(&base_dir).unwrap();
        std::fs::write(base_dir.join("schema.usda"), BASE).unwrap();
        let lib_text = LIB.replacen(
            "#usda 1.0\n",
            "#usda 1.0\n(\n    subLayers = [@base/schema.usda@]\n)\n",
            1,
        );
        std::fs::write(dir.path().join("schema.usda"), lib_text).unwrap();

        let stack = LayerStack::open(&dir.path().join("schema.usda"), &[]).unwrap();
        assert_eq!(stack.layers().len(), 2);
        assert!(stack.sublayers()[0].prim("Typed").is_some());
    }

    #[test]
    fn test_open_reports_missing_sublayer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.usda");
        std::fs::write(&path, "#usda 1.0\n(\n    subLayers = [@missing.usda@]\n)\n").unwrap();
        let err = LayerStack::open(&path, &[]).unwrap_err();
        assert!(err.to_string().contains("Unable to resolve sublayer @missing.usda@"));
    }
}
