use std::fmt;

use serde::Deserialize;

/// Fully-Qualified Structural Element Name.
///
/// The globally unique key identifying a class, function, method, property,
/// or constant. Stored in canonical form with a leading `\`; class and
/// function lookups are case-insensitive, which the [`CodeBase`](crate::codebase::CodeBase)
/// handles by keying its maps on [`Fqsen::lookup_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub struct Fqsen(String);

impl Fqsen {
    /// Builds an FQSEN from a (possibly already qualified) name and the
    /// namespace it appeared in. A leading `\` makes the name absolute.
    pub fn from_name_in_namespace(name: &str, namespace: &str) -> Self {
        if let Some(absolute) = name.strip_prefix('\\') {
            return Self(format!("\\{absolute}"));
        }
        if namespace.is_empty() {
            Self(format!("\\{name}"))
        } else {
            let namespace = namespace.trim_matches('\\');
            Self(format!("\\{namespace}\\{name}"))
        }
    }

    /// An FQSEN that is already fully qualified.
    pub fn from_full_name(name: &str) -> Self {
        Self::from_name_in_namespace(name, "")
    }

    /// `\NS\Class::method`
    pub fn method(class: &Fqsen, name: &str) -> Self {
        Self(format!("{}::{name}", class.0))
    }

    /// The unqualified trailing name.
    pub fn name(&self) -> &str {
        let tail = match self.0.rfind("::") {
            Some(index) => &self.0[index + 2..],
            None => &self.0,
        };
        tail.rsplit('\\').next().unwrap_or(tail)
    }

    /// Case-folded key for class/function lookup (PHP treats both as
    /// case-insensitive).
    pub fn lookup_key(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fqsen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualifies_relative_names() {
        let fqsen = Fqsen::from_name_in_namespace("Foo", "App\\Models");
        assert_eq!(fqsen.as_str(), "\\App\\Models\\Foo");
        assert_eq!(fqsen.name(), "Foo");
    }

    #[test]
    fn absolute_names_ignore_namespace() {
        let fqsen = Fqsen::from_name_in_namespace("\\Foo", "App");
        assert_eq!(fqsen.as_str(), "\\Foo");
    }

    #[test]
    fn member_names() {
        let class = Fqsen::from_full_name("Foo");
        assert_eq!(Fqsen::method(&class, "bar").as_str(), "\\Foo::bar");
        assert_eq!(Fqsen::method(&class, "bar").name(), "bar");
    }
}
