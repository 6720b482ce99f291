//! Language detection from file names and content.

use std::path::Path;

/// Guesses the language of `content`, returning an empty string when no
/// rule matches.
///
/// The file extension wins; otherwise a `#!` interpreter line is inspected.
/// Results are lower-case language identifiers.
///
/// ```
/// assert_eq!(glotd::detect("main.py", ""), "python");
/// assert_eq!(glotd::detect("run", "#!/usr/bin/env ruby\nputs 1"), "ruby");
/// assert_eq!(glotd::detect("notes.txt", "hello"), "");
/// ```
#[must_use]
pub fn detect(filename: &str, content: &str) -> String {
    from_extension(filename)
        .or_else(|| from_shebang(content))
        .unwrap_or_default()
        .to_owned()
}

fn from_extension(filename: &str) -> Option<&'static str> {
    let extension = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    let language = match extension.as_str() {
        "py" | "pyi" => "python",
        "rs" => "rust",
        "go" => "go",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "java" => "java",
        "rb" => "ruby",
        "php" => "php",
        "sh" | "bash" => "bash",
        "cs" => "csharp",
        "cpp" | "cc" | "cxx" | "hpp" => "cpp",
        "c" | "h" => "c",
        _ => return None,
    };
    Some(language)
}

fn from_shebang(content: &str) -> Option<&'static str> {
    let line = content.lines().next()?.strip_prefix("#!")?;
    let mut words = line.split_whitespace();
    let program = words.next()?;
    let program = if program.ends_with("/env") {
        words.find(|word| !word.starts_with('-'))?
    } else {
        program
    };
    let interpreter = program.rsplit('/').next()?;
    let stem = interpreter.trim_end_matches(|ch: char| ch.is_ascii_digit() || ch == '.');
    let language = match stem {
        "python" => "python",
        "ruby" => "ruby",
        "node" | "nodejs" => "javascript",
        "php" => "php",
        "sh" | "bash" | "dash" | "zsh" => "bash",
        _ => return None,
    };
    Some(language)
}
