//! Identifier normalization for generated class and constant names.
//!
//! Taxonomy names are free text ("Drive-by Compromise", "man_in_the_browser")
//! and have to be flattened into valid identifiers before they can name a
//! class, a package segment, or an enum constant.

/// Characters treated as word separators in taxonomy names.
const SEPARATORS: [char; 5] = ['-', '_', '/', '(', ')'];

/// Convert a taxonomy display name into a class identifier.
///
/// Separators become spaces, each whitespace-delimited token gets its first
/// character uppercased (interior casing is left alone), and the tokens are
/// concatenated. Empty tokens from consecutive separators are dropped.
pub fn class_name(name: &str) -> String {
    let spaced: String = name
        .chars()
        .map(|c| if SEPARATORS.contains(&c) { ' ' } else { c })
        .collect();

    spaced.split_whitespace().map(capitalize_first).collect()
}

fn capitalize_first(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Collapse a redundant repeated prefix in an underscore-separated constant
/// identifier.
///
/// Constant names are built by concatenating a category name with a value
/// name that often restates the category, e.g.
/// `WINDOWS_REGISTRY_WINDOWS_REGISTRY_KEY_CREATION`. Two patterns are
/// detected, both only for *immediately adjacent* repeats:
///
/// - a token equal to its neighbor: everything before the repeat and one
///   copy of the token are dropped;
/// - a two-token pair immediately repeating (checked only when no single
///   repeat fired and the identifier has more than 4 tokens): the leading
///   copy of the pair is dropped.
///
/// Anything else, including repeats elsewhere in the string or repeats of
/// three or more tokens, is returned unchanged.
pub fn collapse_tautology(identifier: &str) -> String {
    let tokens: Vec<&str> = identifier.split('_').collect();
    if tokens.len() < 2 {
        return identifier.to_string();
    }

    for i in 0..tokens.len() - 1 {
        if tokens[i] == tokens[i + 1] {
            return tokens[i + 1..].join("_");
        }
    }

    if tokens.len() > 4 {
        for i in 3..tokens.len() {
            if tokens[i] == tokens[i - 2] && tokens[i - 1] == tokens[i - 3] {
                return tokens[i - 1..].join("_");
            }
        }
    }

    identifier.to_string()
}

/// Derive the enum-constant key for a categorical display value.
///
/// Uppercases, maps spaces/colons/hyphens to underscores, collapses runs of
/// underscores, then removes a repeated category prefix via
/// [`collapse_tautology`].
pub fn constant_key(display: &str) -> String {
    let mut key: String = display
        .to_uppercase()
        .chars()
        .map(|c| if matches!(c, ' ' | ':' | '-') { '_' } else { c })
        .collect();

    while key.contains("__") {
        key = key.replace("__", "_");
    }

    collapse_tautology(&key)
}

/// Escape free text for embedding as a single-line string literal.
///
/// Backslashes are doubled before quotes are touched, double quotes become
/// single quotes, and newline characters are removed.
pub fn escape_literal(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "'")
        .replace(['\n', '\r'], "")
}
