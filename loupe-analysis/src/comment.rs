//! Doc-comment collaborator: turns raw `/** */` text into structured type
//! information. The engine trusts whatever comes out of here and merges it
//! with signature-derived types.

use crate::fqsen::Fqsen;
use crate::types::{Type, UnionType};

/// Structured view of one doc comment.
#[derive(Debug, Clone, Default)]
pub struct Comment {
    pub is_deprecated: bool,
    /// `@param` entries: (parameter name without `$`, union type).
    pub parameters: Vec<(String, UnionType)>,
    /// `@var` entries: (variable name without `$`, union type).
    pub variables: Vec<(String, UnionType)>,
    /// `@return` entry, if present.
    pub return_type: Option<UnionType>,
}

impl Comment {
    pub fn parameter_type(&self, name: &str) -> Option<&UnionType> {
        self.parameters
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, union)| union)
    }
}

/// Parses the tags the engine cares about out of a raw doc comment.
pub fn parse(raw: &str, namespace: &str) -> Comment {
    let mut comment = Comment::default();
    for line in raw.lines() {
        let line = line
            .trim()
            .trim_start_matches("/**")
            .trim_end_matches("*/")
            .trim_start_matches('*')
            .trim();
        if let Some(rest) = line.strip_prefix("@param") {
            if let Some((union, name)) = split_type_and_variable(rest) {
                comment
                    .parameters
                    .push((name, union_type_from_string(union, namespace)));
            }
        } else if let Some(rest) = line.strip_prefix("@var") {
            if let Some((union, name)) = split_type_and_variable(rest) {
                comment
                    .variables
                    .push((name, union_type_from_string(union, namespace)));
            }
        } else if let Some(rest) = line.strip_prefix("@return") {
            let raw_type = rest.trim().split_whitespace().next().unwrap_or("");
            if !raw_type.is_empty() {
                comment.return_type = Some(union_type_from_string(raw_type, namespace));
            }
        } else if line.starts_with("@deprecated") {
            comment.is_deprecated = true;
        }
    }
    comment
}

/// Splits `" int|string $name description"` into the type text and the bare
/// variable name.
fn split_type_and_variable(rest: &str) -> Option<(&str, String)> {
    let mut words = rest.trim().split_whitespace();
    let first = words.next()?;
    if let Some(name) = first.strip_prefix('$') {
        // `@var $x int` ordering is also seen in the wild.
        let ty = words.next()?;
        return Some((ty, name.to_string()));
    }
    let name = words.next()?.strip_prefix('$')?;
    Some((first, name.to_string()))
}

/// Parses a type annotation string (`"int|string"`, `"?Foo"`, `"\Bar[]"`,
/// `"self"`) into a union type, qualifying class names against `namespace`.
/// Unrecognized fragments are skipped rather than guessed at.
pub fn union_type_from_string(raw: &str, namespace: &str) -> UnionType {
    let mut union = UnionType::new();
    for part in raw.split('|') {
        let mut part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some(stripped) = part.strip_prefix('?') {
            union.add_type(Type::Null);
            part = stripped;
        }
        let mut array_depth = 0;
        while let Some(stripped) = part.strip_suffix("[]") {
            array_depth += 1;
            part = stripped;
        }
        let base = match Type::from_native_name(part) {
            Some(native) => native,
            None => {
                if !part.chars().next().is_some_and(valid_name_start) {
                    continue;
                }
                Type::ClassName(Fqsen::from_name_in_namespace(part, namespace))
            }
        };
        let mut ty = base;
        for _ in 0..array_depth {
            ty = ty.as_generic_array();
        }
        union.add_type(ty);
    }
    union
}

fn valid_name_start(c: char) -> bool {
    c == '\\' || c == '_' || c.is_ascii_alphabetic()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_param_var_return_and_deprecated() {
        let raw = "/**\n * @param int|string $id the id\n * @var \\Foo $foo\n * @return string[]\n * @deprecated\n */";
        let comment = parse(raw, "App");
        assert!(comment.is_deprecated);
        assert_eq!(comment.parameters.len(), 1);
        assert_eq!(
            comment.parameter_type("id"),
            Some(&UnionType::from_types([Type::Int, Type::String]))
        );
        assert_eq!(comment.variables[0].0, "foo");
        assert_eq!(
            comment.return_type,
            Some(UnionType::from_type(Type::String.as_generic_array()))
        );
    }

    #[test]
    fn nullable_and_array_suffixes() {
        let union = union_type_from_string("?Foo[]", "");
        assert!(union.has_type(&Type::Null));
        assert!(union.has_type(
            &Type::ClassName(Fqsen::from_full_name("Foo")).as_generic_array()
        ));
    }

    #[test]
    fn relative_names_qualify_against_namespace() {
        let union = union_type_from_string("Model", "App");
        assert!(union.has_type(&Type::ClassName(Fqsen::from_full_name("\\App\\Model"))));
    }
}
