//! Output naming: rename steps, archive-safe entry names and collision suffixes.

use dropkit_core::models::{RenameMode, RenameOptions};
use std::collections::HashSet;
use std::path::Path;

/// Apply a file-renaming step to an output name.
pub fn apply_rename(file_name: &str, options: &RenameOptions) -> String {
    let text = options.text.trim();
    match (options.mode, split_name(file_name)) {
        (RenameMode::Before, _) => format!("{}{}", text, file_name),
        (RenameMode::After, (stem, Some(ext))) => format!("{}{}.{}", stem, text, ext),
        (RenameMode::After, (_, None)) => format!("{}{}", file_name, text),
        (RenameMode::Replace, (_, Some(ext))) => format!("{}.{}", text, ext),
        (RenameMode::Replace, (_, None)) => text.to_string(),
    }
}

/// Split into stem and extension as written. Dot files and names ending in
/// a dot have no extension.
fn split_name(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    }
}

/// Strip any path components so a name cannot escape the archive root.
pub fn sanitize_entry_name(file_name: &str, fallback: &str) -> String {
    Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or(fallback)
        .to_string()
}

/// Hands out unique names, suffixing repeats with ` (2)`, ` (3)`, ...
#[derive(Debug, Default)]
pub struct UniqueNames {
    taken: HashSet<String>,
}

impl UniqueNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, name: &str) -> String {
        if self.taken.insert(name.to_string()) {
            return name.to_string();
        }

        let (stem, ext) = match split_name(name) {
            (stem, Some(ext)) => (stem, format!(".{}", ext)),
            (stem, None) => (stem, String::new()),
        };

        let mut n = 2;
        loop {
            let candidate = format!("{} ({}){}", stem, n, ext);
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rename(mode: RenameMode, text: &str) -> RenameOptions {
        RenameOptions {
            mode,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_apply_rename_modes() {
        assert_eq!(
            apply_rename("report.pdf", &rename(RenameMode::Before, "processed_")),
            "processed_report.pdf"
        );
        assert_eq!(
            apply_rename("report.final.PDF", &rename(RenameMode::After, "_v2")),
            "report.final_v2.PDF"
        );
        assert_eq!(
            apply_rename("report.pdf", &rename(RenameMode::Replace, "summary")),
            "summary.pdf"
        );
        assert_eq!(apply_rename("README", &rename(RenameMode::After, "_old")), "README_old");
    }

    #[test]
    fn test_sanitize_entry_name() {
        assert_eq!(sanitize_entry_name("../../etc/passwd", "fallback"), "passwd");
        assert_eq!(sanitize_entry_name("photo.webp", "fallback"), "photo.webp");
        assert_eq!(sanitize_entry_name("", "fallback"), "fallback");
        assert_eq!(sanitize_entry_name("..", "fallback"), "fallback");
    }

    #[test]
    fn test_unique_names_suffix_before_extension() {
        let mut names = UniqueNames::new();
        assert_eq!(names.claim("summary.pdf"), "summary.pdf");
        assert_eq!(names.claim("summary.pdf"), "summary (2).pdf");
        assert_eq!(names.claim("summary.pdf"), "summary (3).pdf");
        assert_eq!(names.claim("notes"), "notes");
        assert_eq!(names.claim("notes"), "notes (2)");
    }
}
