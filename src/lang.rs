/// Fixed extension→language map. Returns `"unknown"` for anything not in the
/// walker's own include list — this daemon only ever indexes those extensions,
/// so the map stays small and closed rather than trying to be exhaustive.
pub fn detect_language(ext: &str) -> &'static str {
    match ext.trim_start_matches('.').to_lowercase().as_str() {
        "js" => "javascript",
        "ts" => "typescript",
        "jsx" => "javascript",
        "tsx" => "typescript",
        "py" => "python",
        "go" => "go",
        "rs" => "rust",
        "java" => "java",
        "cs" => "csharp",
        "php" => "php",
        "rb" => "ruby",
        "md" => "markdown",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_resolve() {
        assert_eq!(detect_language("rs"), "rust");
        assert_eq!(detect_language(".rs"), "rust");
        assert_eq!(detect_language("yml"), "yaml");
    }

    #[test]
    fn unknown_extension_falls_back() {
        assert_eq!(detect_language("xyz"), "unknown");
    }
}
