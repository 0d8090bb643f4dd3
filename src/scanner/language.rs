//! Languages the remote parsers understand
//!
//! Their extensions are always part of the scanner's include list.

use std::path::Path;

/// A parser-backed language and the extensions it claims (with leading dot).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageSpec {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
}

pub const SUPPORTED_LANGUAGES: &[LanguageSpec] = &[
    LanguageSpec {
        name: "go",
        extensions: &[".go"],
    },
    LanguageSpec {
        name: "java",
        extensions: &[".java"],
    },
    LanguageSpec {
        name: "python",
        extensions: &[".py"],
    },
    LanguageSpec {
        name: "javascript",
        extensions: &[".js", ".jsx", ".vue"],
    },
    LanguageSpec {
        name: "typescript",
        extensions: &[".ts", ".tsx"],
    },
    LanguageSpec {
        name: "cpp",
        extensions: &[".cpp", ".cc", ".cxx", ".hpp"],
    },
    LanguageSpec {
        name: "c",
        extensions: &[".h", ".c"],
    },
];

/// Every parser extension in declaration order.
pub fn supported_extensions() -> Vec<&'static str> {
    SUPPORTED_LANGUAGES
        .iter()
        .flat_map(|lang| lang.extensions.iter().copied())
        .collect()
}

/// Extension of `path` with its leading dot, the form include lists use.
pub fn dotted_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| format!(".{}", ext))
}
