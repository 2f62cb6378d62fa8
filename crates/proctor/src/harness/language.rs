//! Language to solution-file mapping.

/// File extension used for `language`. Unknown languages get `txt`.
pub fn extension_for(language: &str) -> &'static str {
    match language.trim().to_ascii_lowercase().as_str() {
        "javascript" | "js" | "node" => "js",
        "typescript" | "ts" => "ts",
        "python" | "python3" | "py" => "py",
        "java" => "java",
        "cpp" | "c++" => "cpp",
        "c" => "c",
        "go" | "golang" => "go",
        "rust" | "rs" => "rs",
        "ruby" | "rb" => "rb",
        _ => "txt",
    }
}

/// `solution.<ext>` for `language`.
pub fn default_file_name(language: &str) -> String {
    format!("solution.{}", extension_for(language))
}

/// The agent's override if it named a file, otherwise the language default.
pub fn resolve_target_file(file_override: Option<&str>, language: &str) -> String {
    match file_override.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => default_file_name(language),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_languages_map_to_extensions() {
        let cases = [
            ("javascript", "js"),
            ("TypeScript", "ts"),
            ("python", "py"),
            ("java", "java"),
            ("cpp", "cpp"),
            ("c", "c"),
            ("go", "go"),
            ("rust", "rs"),
            ("ruby", "rb"),
        ];
        for (lang, ext) in cases {
            assert_eq!(extension_for(lang), ext, "{lang}");
        }
    }

    #[test]
    fn unknown_language_falls_back_to_txt() {
        assert_eq!(default_file_name("brainfuck"), "solution.txt");
    }

    #[test]
    fn override_wins_unless_blank() {
        assert_eq!(resolve_target_file(Some("src/main.py"), "javascript"), "src/main.py");
        assert_eq!(resolve_target_file(Some("  "), "javascript"), "solution.js");
        assert_eq!(resolve_target_file(None, "python"), "solution.py");
    }
}
