//! Hand-written sections of generated files.

use std::path::Path;

use tracing::error;

/// Everything after this line in a generated file belongs to its author.
pub const CUSTOM_CODE_MARKER: &str = "// --(BEGIN CUSTOM CODE)--\n";

/// The custom section of a previously generated file, or `default` when the
/// file is missing, has no single marker, or nothing but whitespace after it.
pub fn extract_custom_code(path: &Path, default: &str) -> String {
    if !path.exists() {
        return default.to_string();
    }
    match std::fs::read_to_string(path) {
        Ok(existing) => split_custom_code(&existing)
            .map(str::to_string)
            .unwrap_or_else(|| default.to_string()),
        Err(e) => {
            error!("Unable to read {}: {}", path.display(), e);
            default.to_string()
        }
    }
}

fn split_custom_code(existing: &str) -> Option<&str> {
    let parts: Vec<&str> = existing.split(CUSTOM_CODE_MARKER).collect();
    match parts.as_slice() {
        [_, custom] if !custom.trim().is_empty() => Some(custom),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_custom_section_is_kept_verbatim() {
        let text = format!("generated\n{CUSTOM_CODE_MARKER}  void Foo();\n}};\n");
        assert_eq!(split_custom_code(&text), Some("  void Foo();\n};\n"));
    }

    #[test]
    fn test_blank_or_ambiguous_sections_fall_back() {
        assert_eq!(split_custom_code(&format!("a\n{CUSTOM_CODE_MARKER}  \n\n")), None);
        assert_eq!(split_custom_code("no marker at all"), None);
        let twice = format!("a\n{CUSTOM_CODE_MARKER}b\n{CUSTOM_CODE_MARKER}c\n");
        assert_eq!(split_custom_code(&twice), None);
    }

    #[test]
    fn test_missing_file_uses_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("foo.h");
        assert_eq!(extract_custom_code(&path, "};\n"), "};\n");

        std::fs::write(&path, format!("x\n{CUSTOM_CODE_MARKER}int y;\n")).unwrap();
        assert_eq!(extract_custom_code(&path, "};\n"), "int y;\n");
    }
}
