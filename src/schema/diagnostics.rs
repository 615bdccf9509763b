//! Diagnostics
//!
//! Collects schema definition problems while classes and properties are
//! parsed, so every offending field is reported in one run.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // === Naming ===
    /// Declared type name differs from the prim name
    TypeNameMismatch,
    /// API schema without the `API` suffix
    MissingApiSuffix,

    // === Inheritance ===
    /// More than one direct parent
    MultipleInheritance,
    /// Parent schema not found in the layer stack
    UnresolvedParent,
    /// Concrete class that does not inherit Typed
    ConcreteNotTyped,
    /// API schema with an invalid parent
    InvalidApiParent,
    /// Parent and child API schemas disagree on how they apply
    IncompatibleApiBase,

    // === Class metadata ===
    /// Apply metadata on the wrong kind of schema
    MisplacedApiMetadata,
    /// apiSchemaType outside nonApplied/singleApply/multipleApply
    InvalidApiSchemaType,
    /// apiSchemas authored with something other than prepend
    InvalidApiSchemasListOp,
    /// fallbackTypes on a non-concrete class
    MisplacedFallbackTypes,
    /// Multiple-apply property count does not fit the namespace prefix
    MultipleApplyProperties,
    /// Field the schema registry does not accept
    DisallowedField,

    // === Properties ===
    /// Attribute type outside the value type vocabulary
    UnknownValueType,
    /// Two properties resolve to the same identifier
    DuplicatePropertyName,
    /// Two properties share an API name
    DuplicateApiName,
    /// apiGetImplementation is neither generated nor custom
    InvalidApiGetImplementation,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TypeNameMismatch => "E001",
            Self::MissingApiSuffix => "E002",
            Self::MultipleInheritance => "E003",
            Self::UnresolvedParent => "E004",
            Self::ConcreteNotTyped => "E005",
            Self::InvalidApiParent => "E006",
            Self::IncompatibleApiBase => "E007",
            Self::MisplacedApiMetadata => "E008",
            Self::InvalidApiSchemaType => "E009",
            Self::InvalidApiSchemasListOp => "E010",
            Self::MisplacedFallbackTypes => "E011",
            Self::MultipleApplyProperties => "E012",
            Self::DisallowedField => "E013",
            Self::UnknownValueType => "E014",
            Self::DuplicatePropertyName => "E015",
            Self::DuplicateApiName => "E016",
            Self::InvalidApiGetImplementation => "W001",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::InvalidApiGetImplementation => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Path of the offending prim or property (`/Foo` or `/Foo.bar`)
    pub path: String,
    pub code: DiagnosticCode,
    pub message: String,
    /// Additional context (e.g., conflicting names)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(path: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: Invalid schema definition at <{}>\n{}",
            self.code,
            self.code.severity(),
            self.path,
            self.message
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: DiagnosticItem) {
        self.items.push(item);
    }

    /// Record a problem; severity comes from the code.
    pub fn report(&mut self, path: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) {
        self.push(DiagnosticItem::new(path, code, message));
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.severity() == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Warning)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Whether any item carries `code`.
    pub fn contains(&self, code: DiagnosticCode) -> bool {
        self.items.iter().any(|i| i.code == code)
    }

    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if self.has_errors() {
            output.push_str(&format!(
                "\n{} error(s), {} warning(s)\n",
                self.error_count(),
                self.warning_count()
            ));
        } else if !self.is_empty() {
            output.push_str(&format!("\n{} warning(s)\n", self.warning_count()));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a DiagnosticItem;
    type IntoIter = std::slice::Iter<'a, DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
