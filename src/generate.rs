//! Generation Pipeline
//!
//! One run: open the schema layer stack, register previously generated
//! libraries, parse the classes, then write code, plugin descriptor and
//! registry document through a shared [`OutputWriter`].

use std::path::{Path, PathBuf};

use tracing::info;

use crate::codegen::template::TemplateSet;
use crate::codegen::tokens::gather_tokens;
use crate::codegen::generate_code;
use crate::config::GenConfig;
use crate::error::{Result, SchemaGenError};
use crate::layer::LayerStack;
use crate::output::{OutputWriter, WriteOutcome};
use crate::plug_info::generate_plug_info;
use crate::registry::generate_registry;
use crate::schema::parse_schema;
use crate::types::TypeRegistry;

/// What a successful run did.
#[derive(Debug, Clone, Default)]
pub struct GenerateSummary {
    /// Prim type names of the processed classes.
    pub classes: Vec<String>,
    /// Per-file results in write order.
    pub outcomes: Vec<(PathBuf, WriteOutcome)>,
}

impl GenerateSummary {
    pub fn outcome(&self, path: &Path) -> Option<WriteOutcome> {
        self.outcomes
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, o)| *o)
    }
}

/// Generate every artifact for the schema at `schema_path` into
/// `codegen_path`.
pub fn generate(
    schema_path: &Path,
    codegen_path: &Path,
    templates: &TemplateSet,
    config: &GenConfig,
) -> Result<GenerateSummary> {
    if !schema_path.is_file() {
        return Err(SchemaGenError::config(format!(
            "Schema path must be a valid schema file: {}",
            schema_path.display()
        )));
    }

    let stack = LayerStack::open(schema_path, &config.resolver.search_paths)?;
    let types = TypeRegistry::from_layer_stack(&stack);
    let parsed = parse_schema(&stack, &types, &config.codegen.schema_base_class)?;
    let library = parsed.library;
    let mut classes = parsed.classes;

    let mut writer = OutputWriter::new(config.output.validate);
    if writer.is_validating() {
        info!("Validation on, any diffs found will cause failure.");
    }

    let class_names: Vec<String> = classes.iter().map(|c| c.usd_prim_type_name.clone()).collect();
    info!("Processing schema classes:");
    info!("{}", class_names.join(", "));

    std::fs::create_dir_all(codegen_path)?;

    // Tokens only back generated code, so codeless libraries skip both.
    if !library.skip_code_generation {
        let tokens = gather_tokens(&mut classes, &library.name, &library.library_tokens)?;
        generate_code(
            codegen_path,
            &classes,
            &tokens,
            &library,
            &config.codegen,
            templates,
            &mut writer,
        )?;
    }
    generate_plug_info(codegen_path, &classes, &library, &config.codegen, templates, &mut writer)?;
    generate_registry(codegen_path, &stack, &classes, &types, &mut writer)?;

    Ok(GenerateSummary {
        classes: class_names,
        outcomes: writer.outcomes().to_vec(),
    })
}
