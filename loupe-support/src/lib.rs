use std::fmt;

/// Shared message templates for analysis issues. Keeping the phrasing in one
/// place means the engine, the CLI, and the tests all agree on the exact text.
pub fn undefined_message(element: &str, name: impl fmt::Display) -> String {
    format!("reference to undefined {element} '{name}'")
}

pub fn call_undefined_message(element: &str, name: impl fmt::Display) -> String {
    format!("call to undefined {element} '{name}'")
}

pub fn mismatch_message(context: &str, expected: impl fmt::Display, actual: impl fmt::Display) -> String {
    format!("{context}: expected {expected}, found {actual}")
}

pub fn arity_message(
    name: impl fmt::Display,
    required: usize,
    maximum: Option<usize>,
    supplied: usize,
) -> String {
    match maximum {
        Some(maximum) if supplied > maximum => {
            format!("too many arguments to '{name}': expected at most {maximum}, got {supplied}")
        }
        _ => format!("too few arguments to '{name}': expected at least {required}, got {supplied}"),
    }
}

pub fn redefinition_message(
    element: &str,
    name: impl fmt::Display,
    original_file: &str,
    original_line: u32,
) -> String {
    format!(
        "{element} '{name}' was already defined at {original_file}:{original_line}"
    )
}

pub fn internal_redefinition_message(element: &str, name: impl fmt::Display) -> String {
    format!("{element} '{name}' redefines an internal {element}")
}

pub fn deprecated_message(element: &str, name: impl fmt::Display) -> String {
    format!("use of deprecated {element} '{name}'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_message_picks_direction() {
        assert_eq!(
            arity_message("f", 2, Some(3), 4),
            "too many arguments to 'f': expected at most 3, got 4"
        );
        assert_eq!(
            arity_message("f", 2, Some(3), 1),
            "too few arguments to 'f': expected at least 2, got 1"
        );
        assert_eq!(
            arity_message("f", 1, None, 0),
            "too few arguments to 'f': expected at least 1, got 0"
        );
    }
}
