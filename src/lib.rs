//! schemagen
//!
//! Generates the code and registry files of a schema library from its
//! declarative schema layer.
//!
//! ## Features
//!
//! - **Validation**: naming, inheritance and API schema rules are checked for
//!   every class, and all problems are reported in one run
//! - **Code Generation**: per-class header, source and wrapper files plus a
//!   tokens table, rendered from replaceable templates
//! - **Custom Code**: hand-written code below the custom code marker survives
//!   regeneration
//! - **Plugin Info**: generated type entries are merged into `plugInfo.json`
//! - **Registry**: inheritance is flattened into `generatedSchema.usda`
//! - **Validate Mode**: diff against the files on disk instead of writing
//!
//! ## Pipeline
//!
//! ```text
//! schema.usda ─► LayerStack ─► parse_schema ─► ClassInfo[]
//!                                                 │
//!          ┌──────────────┬───────────────┬───────┴────────┐
//!          ▼              ▼               ▼                ▼
//!     gather_tokens  generate_code  generate_plug_info  generate_registry
//!                            └───────────┴── OutputWriter ─┘
//! ```

pub mod codegen;
pub mod config;
pub mod error;
pub mod generate;
pub mod layer;
pub mod names;
pub mod output;
pub mod plug_info;
pub mod registry;
pub mod schema;
pub mod types;

pub use codegen::template::TemplateSet;
pub use codegen::tokens::{gather_tokens, Token};
pub use config::{CodegenConfig, GenConfig};
pub use error::{Result, SchemaGenError};
pub use generate::{generate, GenerateSummary};
pub use layer::{Layer, LayerStack};
pub use output::{OutputWriter, WriteOutcome};
pub use schema::{parse_schema, ClassInfo, Diagnostics, LibraryInfo, ParsedSchema, SchemaKind};
pub use types::TypeRegistry;
