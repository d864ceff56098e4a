use std::collections::BTreeSet;
use std::fmt;

use crate::codebase::CodeBase;
use crate::fqsen::Fqsen;

/// One concrete type. Structural equality doubles as interning: two values
/// denoting the same logical type always compare (and hash) equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    Int,
    Float,
    String,
    Bool,
    Array,
    Callable,
    Object,
    Resource,
    Void,
    Null,
    Mixed,
    /// `self` inside a class body; resolved against the context before use.
    SelfType,
    /// `static` inside a class body; late static binding placeholder.
    StaticType,
    ClassName(Fqsen),
    /// "array of T"
    GenericArray(Box<Type>),
}

impl Type {
    pub fn from_native_name(name: &str) -> Option<Type> {
        match name {
            "int" | "integer" => Some(Type::Int),
            "float" | "double" => Some(Type::Float),
            "string" => Some(Type::String),
            "bool" | "boolean" | "true" | "false" => Some(Type::Bool),
            "array" => Some(Type::Array),
            "callable" => Some(Type::Callable),
            "object" => Some(Type::Object),
            "resource" => Some(Type::Resource),
            "void" => Some(Type::Void),
            "null" => Some(Type::Null),
            "mixed" => Some(Type::Mixed),
            "self" => Some(Type::SelfType),
            "static" | "$this" => Some(Type::StaticType),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Type::Int => "int".to_string(),
            Type::Float => "float".to_string(),
            Type::String => "string".to_string(),
            Type::Bool => "bool".to_string(),
            Type::Array => "array".to_string(),
            Type::Callable => "callable".to_string(),
            Type::Object => "object".to_string(),
            Type::Resource => "resource".to_string(),
            Type::Void => "void".to_string(),
            Type::Null => "null".to_string(),
            Type::Mixed => "mixed".to_string(),
            Type::SelfType => "self".to_string(),
            Type::StaticType => "static".to_string(),
            Type::ClassName(fqsen) => fqsen.to_string(),
            Type::GenericArray(element) => format!("{}[]", element.describe()),
        }
    }

    pub fn is_array_like(&self) -> bool {
        matches!(self, Type::Array | Type::GenericArray(_))
    }

    /// Wraps this type as "array of self".
    pub fn as_generic_array(&self) -> Type {
        Type::GenericArray(Box::new(self.clone()))
    }

    /// Unwraps one level of "array of T"; `None` for non-array members.
    pub fn generic_array_element(&self) -> Option<Type> {
        match self {
            Type::GenericArray(element) => Some(element.as_ref().clone()),
            _ => None,
        }
    }

    /// Replaces `self`/`static` placeholders with the given class.
    pub fn resolved_in_class(&self, class: &Fqsen) -> Type {
        match self {
            Type::SelfType | Type::StaticType => Type::ClassName(class.clone()),
            Type::GenericArray(element) => {
                Type::GenericArray(Box::new(element.resolved_in_class(class)))
            }
            other => other.clone(),
        }
    }

    /// Whether `self` can be used where `other` is expected.
    ///
    /// Class covariance needs ancestor lookup, which is why cast checks take
    /// the code base instead of being a pure function of two types.
    pub fn can_cast_to_type(&self, other: &Type, codebase: &CodeBase) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Type::Mixed, _) | (_, Type::Mixed) => true,
            // null is accepted anywhere; incomplete inference should not
            // cascade into spurious mismatches.
            (Type::Null, _) => true,
            (Type::Int, Type::Float) => true,
            (Type::GenericArray(_), Type::Array) => true,
            (Type::Array, Type::GenericArray(_)) => true,
            (Type::GenericArray(a), Type::GenericArray(b)) => a.can_cast_to_type(b, codebase),
            (Type::ClassName(_), Type::Object) => true,
            (Type::ClassName(from), Type::ClassName(to)) => {
                from.lookup_key() == to.lookup_key()
                    || codebase
                        .ancestors_of(from)
                        .iter()
                        .any(|ancestor| ancestor.lookup_key() == to.lookup_key())
            }
            _ => false,
        }
    }

    /// This type together with all of its transitive ancestors/interfaces.
    pub fn expanded_types(&self, codebase: &CodeBase) -> UnionType {
        let mut union = UnionType::from_type(self.clone());
        if let Type::ClassName(fqsen) = self {
            for ancestor in codebase.ancestors_of(fqsen) {
                union.add_type(Type::ClassName(ancestor));
            }
        }
        union
    }

    pub fn as_union_type(&self) -> UnionType {
        UnionType::from_type(self.clone())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// A duplicate-free, order-irrelevant set of [`Type`].
///
/// The empty union means "no information yet" (not void, not null) and is
/// treated permissively by every cast check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnionType {
    types: BTreeSet<Type>,
}

impl UnionType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_type(ty: Type) -> Self {
        let mut union = Self::new();
        union.add_type(ty);
        union
    }

    pub fn from_types(types: impl IntoIterator<Item = Type>) -> Self {
        let mut union = Self::new();
        for ty in types {
            union.add_type(ty);
        }
        union
    }

    pub fn add_type(&mut self, ty: Type) {
        self.types.insert(ty);
    }

    pub fn add_union_type(&mut self, other: &UnionType) {
        for ty in &other.types {
            self.types.insert(ty.clone());
        }
    }

    pub fn has_type(&self, ty: &Type) -> bool {
        self.types.contains(ty)
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Type> {
        self.types.iter()
    }

    /// Class types named by members of this union.
    pub fn class_fqsens(&self) -> Vec<Fqsen> {
        self.types
            .iter()
            .filter_map(|ty| match ty {
                Type::ClassName(fqsen) => Some(fqsen.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn resolved_in_class(&self, class: &Fqsen) -> UnionType {
        Self::from_types(self.types.iter().map(|ty| ty.resolved_in_class(class)))
    }

    /// True iff every member of `self` can cast to at least one member of
    /// `other`. An empty union on either side is "could be anything" and
    /// passes.
    pub fn can_cast_to_union(&self, other: &UnionType, codebase: &CodeBase) -> bool {
        if self.is_empty() || other.is_empty() {
            return true;
        }
        self.types.iter().all(|from| {
            other
                .types
                .iter()
                .any(|to| from.can_cast_to_type(to, codebase))
        })
    }

    /// Like [`can_cast_to_union`](Self::can_cast_to_union), but expands the
    /// source's class types to their full ancestor sets first. Used for
    /// assignment and property-type compatibility (covariant only).
    pub fn can_cast_to_expanded_union(&self, other: &UnionType, codebase: &CodeBase) -> bool {
        self.expanded(codebase).can_cast_to_union(other, codebase)
    }

    pub fn expanded(&self, codebase: &CodeBase) -> UnionType {
        let mut union = UnionType::new();
        for ty in &self.types {
            union.add_union_type(&ty.expanded_types(codebase));
        }
        union
    }

    /// Wraps each member as "array of T".
    pub fn as_generic_array_types(&self) -> UnionType {
        Self::from_types(self.types.iter().map(Type::as_generic_array))
    }

    /// Unwraps "array of T" back to T, dropping non-array members.
    pub fn generic_array_element_types(&self) -> UnionType {
        Self::from_types(self.types.iter().filter_map(Type::generic_array_element))
    }

    /// Set intersection. Used by the control-flow merge engine, never by
    /// ordinary widening.
    pub fn intersection(&self, other: &UnionType) -> UnionType {
        Self::from_types(self.types.intersection(&other.types).cloned())
    }

    pub fn describe(&self) -> String {
        if self.types.is_empty() {
            return "<unknown>".to_string();
        }
        self.types
            .iter()
            .map(Type::describe)
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl fmt::Display for UnionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

impl FromIterator<Type> for UnionType {
    fn from_iter<I: IntoIterator<Item = Type>>(iter: I) -> Self {
        Self::from_types(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_type_is_idempotent() {
        let mut union = UnionType::new();
        union.add_type(Type::Int);
        union.add_type(Type::Int);
        assert_eq!(union.len(), 1);
        assert!(union.has_type(&Type::Int));
    }

    #[test]
    fn generic_array_wraps_and_unwraps() {
        let union = UnionType::from_types([Type::Int, Type::String]);
        let arrays = union.as_generic_array_types();
        assert!(arrays.has_type(&Type::Int.as_generic_array()));
        assert_eq!(arrays.generic_array_element_types(), union);
    }

    #[test]
    fn intersection_is_set_intersection() {
        let a = UnionType::from_types([Type::Int, Type::String]);
        let b = UnionType::from_types([Type::Int, Type::Bool]);
        assert_eq!(a.intersection(&b), UnionType::from_type(Type::Int));
    }
}
