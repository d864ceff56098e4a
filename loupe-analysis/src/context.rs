use std::collections::HashMap;

use crate::fqsen::Fqsen;
use crate::types::UnionType;

/// A local variable: a name and the union of every type observed for it so
/// far in the current scope.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub union_type: UnionType,
}

impl Variable {
    pub fn new(name: impl Into<String>, union_type: UnionType) -> Self {
        Self {
            name: name.into(),
            union_type,
        }
    }
}

/// A declared parameter. Cloned into a fresh [`Variable`] at function entry
/// so inference inside the body never corrupts the canonical signature used
/// for call-site checks.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub union_type: UnionType,
    pub is_optional: bool,
    pub is_variadic: bool,
    pub is_pass_by_reference: bool,
    pub default_type: UnionType,
}

impl Parameter {
    pub fn to_variable(&self) -> Variable {
        let mut union_type = self.union_type.clone();
        union_type.add_union_type(&self.default_type);
        Variable::new(self.name.clone(), union_type)
    }
}

/// Variable map local to one lexical region. Created fresh at the start of
/// each function/method/closure body and at global scope.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    variables: HashMap<String, Variable>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn get_variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn get_variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.get_mut(name)
    }

    pub fn add_variable(&mut self, variable: Variable) {
        self.variables.insert(variable.name.clone(), variable);
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &String> {
        self.variables.keys()
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }
}

/// Handle to a scope slot in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// Owns every scope created during the analysis of one file.
///
/// "The same scope, mutated in place" is the same arena slot mutated through
/// its id; "a new scope that must not leak" is an explicit clone into a new
/// slot. Contexts carry only the id.
#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_scope(&mut self) -> ScopeId {
        self.scopes.push(Scope::new());
        ScopeId(self.scopes.len() - 1)
    }

    pub fn clone_scope(&mut self, id: ScopeId) -> ScopeId {
        let clone = self.scopes[id.0].clone();
        self.scopes.push(clone);
        ScopeId(self.scopes.len() - 1)
    }

    pub fn insert_scope(&mut self, scope: Scope) -> ScopeId {
        self.scopes.push(scope);
        ScopeId(self.scopes.len() - 1)
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0]
    }
}

/// "Where am I": the value threaded through every visit. Cloned, never
/// mutated, when entering a nested lexical construct, so sibling branches
/// can't leak state into each other. The scope's variable map is the
/// deliberate, arena-managed exception.
#[derive(Debug, Clone)]
pub struct Context {
    file: String,
    line: u32,
    namespace: String,
    class_fqsen: Option<Fqsen>,
    function_fqsen: Option<Fqsen>,
    scope: ScopeId,
}

impl Context {
    pub fn new(file: impl Into<String>, scope: ScopeId) -> Self {
        Self {
            file: file.into(),
            line: 0,
            namespace: String::new(),
            class_fqsen: None,
            function_fqsen: None,
            scope,
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn class_fqsen(&self) -> Option<&Fqsen> {
        self.class_fqsen.as_ref()
    }

    pub fn function_fqsen(&self) -> Option<&Fqsen> {
        self.function_fqsen.as_ref()
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn with_line(&self, line: u32) -> Self {
        if line == 0 || line == self.line {
            return self.clone();
        }
        let mut next = self.clone();
        next.line = line;
        next
    }

    pub fn with_namespace(&self, namespace: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.namespace = namespace.into();
        next
    }

    pub fn with_class(&self, class: Fqsen) -> Self {
        let mut next = self.clone();
        next.class_fqsen = Some(class);
        next
    }

    pub fn with_function(&self, function: Fqsen) -> Self {
        let mut next = self.clone();
        next.function_fqsen = Some(function);
        next
    }

    pub fn with_scope(&self, scope: ScopeId) -> Self {
        let mut next = self.clone();
        next.scope = scope;
        next
    }

    /// Qualifies a (possibly relative) name against the current namespace.
    pub fn qualified(&self, name: &str) -> Fqsen {
        Fqsen::from_name_in_namespace(name, &self.namespace)
    }
}
