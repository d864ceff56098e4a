use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;

use crate::ast::Node;
use crate::context::Parameter;
use crate::fqsen::Fqsen;
use crate::issue::{IssueCollector, IssueKind};
use crate::types::UnionType;

/// Conditions that abort the analysis of one file. Everything else is a
/// diagnostic plus local recovery.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("class '{class}' requires unknown ancestor '{ancestor}'")]
    MissingAncestor { class: String, ancestor: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub union_type: UnionType,
    pub visibility: Visibility,
    pub is_static: bool,
    pub defining_class: Fqsen,
    pub file: String,
    pub line: u32,
    /// True for properties synthesized by a permissive write, which have no
    /// declared type to violate.
    pub is_dynamic: bool,
}

#[derive(Debug, Clone)]
pub struct ClassConstant {
    pub name: String,
    pub union_type: UnionType,
    pub defining_class: Fqsen,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct Constant {
    pub fqsen: Fqsen,
    pub union_type: UnionType,
    pub file: String,
    pub line: u32,
}

/// Analysis progress of one function-like body. An `Analyzing` function
/// re-entered recursively short-circuits with its current inferred type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    Unvisited,
    Analyzing,
    Analyzed,
}

/// A function, method, or closure signature plus inference state.
#[derive(Debug, Clone)]
pub struct FunctionLike {
    pub fqsen: Fqsen,
    pub file: String,
    pub line: u32,
    pub parameters: Vec<Parameter>,
    /// Declared (signature or docblock) return type; empty when undeclared.
    pub return_type: UnionType,
    pub has_declared_return_type: bool,
    /// Grown as return statements are observed.
    pub inferred_return_type: UnionType,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_deprecated: bool,
    pub returns_reference: bool,
    pub is_internal: bool,
    /// Declared inside a conditional block (suppresses redefinition
    /// diagnostics against internal or other conditional definitions).
    pub is_conditional: bool,
    pub defining_class: Option<Fqsen>,
    /// Body handle for re-analysis; never retained in quick mode.
    pub body: Option<Rc<Node>>,
    pub state: AnalysisState,
    /// Minimum runtime version, for internal functions.
    pub min_version: Option<&'static str>,
}

impl FunctionLike {
    pub fn new(fqsen: Fqsen, file: impl Into<String>, line: u32) -> Self {
        Self {
            fqsen,
            file: file.into(),
            line,
            parameters: Vec::new(),
            return_type: UnionType::new(),
            has_declared_return_type: false,
            inferred_return_type: UnionType::new(),
            visibility: Visibility::Public,
            is_static: false,
            is_abstract: false,
            is_deprecated: false,
            returns_reference: false,
            is_internal: false,
            is_conditional: false,
            defining_class: None,
            body: None,
            state: AnalysisState::Unvisited,
            min_version: None,
        }
    }

    pub fn required_parameter_count(&self) -> usize {
        self.parameters
            .iter()
            .filter(|param| !param.is_optional && !param.is_variadic)
            .count()
    }

    /// `None` when a variadic parameter lifts the maximum.
    pub fn maximum_parameter_count(&self) -> Option<usize> {
        if self.parameters.iter().any(|param| param.is_variadic) {
            None
        } else {
            Some(self.parameters.len())
        }
    }

    pub fn has_declared_parameter_types(&self) -> bool {
        self.parameters.iter().any(|param| !param.union_type.is_empty())
    }

    /// Declared return type when present, inferred otherwise.
    pub fn effective_return_type(&self) -> UnionType {
        if self.has_declared_return_type {
            self.return_type.clone()
        } else {
            self.inferred_return_type.clone()
        }
    }
}

/// A class, interface, or trait.
#[derive(Debug, Clone)]
pub struct Clazz {
    pub fqsen: Fqsen,
    pub file: String,
    pub line: u32,
    pub is_interface: bool,
    pub is_trait: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_internal: bool,
    pub is_conditional: bool,
    pub parent: Option<Fqsen>,
    pub interfaces: Vec<Fqsen>,
    pub traits: Vec<Fqsen>,
    pub properties: HashMap<String, Property>,
    pub constants: HashMap<String, ClassConstant>,
    /// Keyed by lower-cased method name (PHP methods are case-insensitive).
    pub methods: HashMap<String, FunctionLike>,
    /// Ancestor contents already flattened into the maps above.
    hierarchy_imported: bool,
}

impl Clazz {
    pub fn new(fqsen: Fqsen, file: impl Into<String>, line: u32) -> Self {
        Self {
            fqsen,
            file: file.into(),
            line,
            is_interface: false,
            is_trait: false,
            is_abstract: false,
            is_final: false,
            is_internal: false,
            is_conditional: false,
            parent: None,
            interfaces: Vec::new(),
            traits: Vec::new(),
            properties: HashMap::new(),
            constants: HashMap::new(),
            methods: HashMap::new(),
            hierarchy_imported: false,
        }
    }

    pub fn get_method(&self, name: &str) -> Option<&FunctionLike> {
        self.methods.get(&name.to_ascii_lowercase())
    }

    pub fn get_method_mut(&mut self, name: &str) -> Option<&mut FunctionLike> {
        self.methods.get_mut(&name.to_ascii_lowercase())
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(&name.to_ascii_lowercase())
    }

    pub fn add_method(&mut self, method: FunctionLike) -> bool {
        let key = method.fqsen.name().to_ascii_lowercase();
        if self.methods.contains_key(&key) {
            return false;
        }
        self.methods.insert(key, method);
        true
    }

    fn direct_ancestors(&self) -> Vec<(Fqsen, bool)> {
        let mut ancestors = Vec::new();
        if let Some(parent) = &self.parent {
            ancestors.push((parent.clone(), true));
        }
        for used in &self.traits {
            ancestors.push((used.clone(), true));
        }
        for interface in &self.interfaces {
            ancestors.push((interface.clone(), false));
        }
        ancestors
    }
}

/// The global symbol table.
///
/// Every element is addressed by FQSEN; multiple declarations under one base
/// name are kept as alternates (canonical first) and tried in declaration
/// order at use sites. All lookups go through `has_*`/`get_*`; nothing
/// walks the AST for name resolution after the declaration pass.
#[derive(Debug, Default)]
pub struct CodeBase {
    classes: HashMap<String, Vec<Clazz>>,
    functions: HashMap<String, Vec<FunctionLike>>,
    constants: HashMap<String, Constant>,
}

impl CodeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, class: Clazz) {
        self.classes
            .entry(class.fqsen.lookup_key())
            .or_default()
            .push(class);
    }

    pub fn has_class(&self, fqsen: &Fqsen) -> bool {
        self.classes.contains_key(&fqsen.lookup_key())
    }

    /// The canonical (first-declared) class for an FQSEN.
    pub fn get_class(&self, fqsen: &Fqsen) -> Option<&Clazz> {
        self.classes
            .get(&fqsen.lookup_key())
            .and_then(|alternates| alternates.first())
    }

    pub fn get_class_mut(&mut self, fqsen: &Fqsen) -> Option<&mut Clazz> {
        self.classes
            .get_mut(&fqsen.lookup_key())
            .and_then(|alternates| alternates.first_mut())
    }

    pub fn class_alternates(&self, fqsen: &Fqsen) -> &[Clazz] {
        self.classes
            .get(&fqsen.lookup_key())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn class_fqsens(&self) -> Vec<Fqsen> {
        self.classes
            .values()
            .filter_map(|alternates| alternates.first())
            .map(|class| class.fqsen.clone())
            .collect()
    }

    pub fn add_function(&mut self, function: FunctionLike) {
        self.functions
            .entry(function.fqsen.lookup_key())
            .or_default()
            .push(function);
    }

    pub fn has_function(&self, fqsen: &Fqsen) -> bool {
        self.functions.contains_key(&fqsen.lookup_key())
    }

    pub fn get_function(&self, fqsen: &Fqsen) -> Option<&FunctionLike> {
        self.functions
            .get(&fqsen.lookup_key())
            .and_then(|alternates| alternates.first())
    }

    pub fn get_function_mut(&mut self, fqsen: &Fqsen) -> Option<&mut FunctionLike> {
        self.functions
            .get_mut(&fqsen.lookup_key())
            .and_then(|alternates| alternates.first_mut())
    }

    /// Alternates in declaration order; canonical first.
    pub fn function_alternates(&self, fqsen: &Fqsen) -> &[FunctionLike] {
        self.functions
            .get(&fqsen.lookup_key())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn add_constant(&mut self, constant: Constant) {
        // Constants are case-sensitive in PHP.
        self.constants
            .insert(constant.fqsen.as_str().to_string(), constant);
    }

    pub fn get_constant(&self, fqsen: &Fqsen) -> Option<&Constant> {
        self.constants.get(fqsen.as_str())
    }

    /// A method on the canonical class (inherited members are visible here
    /// once ancestors were imported).
    pub fn get_method(&self, class: &Fqsen, name: &str) -> Option<&FunctionLike> {
        self.get_class(class).and_then(|clazz| clazz.get_method(name))
    }

    pub fn get_method_mut(&mut self, class: &Fqsen, name: &str) -> Option<&mut FunctionLike> {
        self.get_class_mut(class)
            .and_then(|clazz| clazz.get_method_mut(name))
    }

    /// Every transitive ancestor (parent chain, interfaces, traits) of a
    /// class, cycle-safe.
    pub fn ancestors_of(&self, fqsen: &Fqsen) -> Vec<Fqsen> {
        let mut seen = vec![fqsen.lookup_key()];
        let mut queue = vec![fqsen.clone()];
        let mut ancestors = Vec::new();
        while let Some(current) = queue.pop() {
            let Some(class) = self.get_class(&current) else {
                continue;
            };
            for (ancestor, _) in class.direct_ancestors() {
                let key = ancestor.lookup_key();
                if seen.contains(&key) {
                    continue;
                }
                seen.push(key);
                queue.push(ancestor.clone());
                ancestors.push(ancestor);
            }
        }
        ancestors
    }

    /// Flattens trait/interface/parent contents into the class's own maps so
    /// use-site lookups never walk the inheritance chain. Idempotent and
    /// memoized; importing the same ancestor twice is a no-op.
    ///
    /// A missing parent or trait is fatal for the declaring file; a missing
    /// interface only loses constants and is reported as `Undefined`.
    pub fn import_ancestors(
        &mut self,
        fqsen: &Fqsen,
        issues: &mut IssueCollector,
    ) -> Result<(), AnalysisError> {
        let key = fqsen.lookup_key();
        let (imported, ancestors, file, line) = match self
            .classes
            .get(&key)
            .and_then(|alternates| alternates.first())
        {
            Some(class) => (
                class.hierarchy_imported,
                class.direct_ancestors(),
                class.file.clone(),
                class.line,
            ),
            None => return Ok(()),
        };
        if imported {
            return Ok(());
        }
        // Set the flag before recursing so hierarchy cycles terminate.
        if let Some(class) = self.classes.get_mut(&key).and_then(|a| a.first_mut()) {
            class.hierarchy_imported = true;
        }

        for (ancestor, required) in ancestors {
            if !self.has_class(&ancestor) {
                if required {
                    return Err(AnalysisError::MissingAncestor {
                        class: fqsen.to_string(),
                        ancestor: ancestor.to_string(),
                    });
                }
                issues.emit(
                    IssueKind::Undefined,
                    &file,
                    line,
                    loupe_support::undefined_message("interface", &ancestor),
                );
                continue;
            }
            self.import_ancestors(&ancestor, issues)?;

            let (properties, constants, methods) = {
                let source = self.get_class(&ancestor).expect("ancestor just checked");
                (
                    source.properties.clone(),
                    source.constants.clone(),
                    source.methods.clone(),
                )
            };
            let class = self
                .classes
                .get_mut(&key)
                .and_then(|alternates| alternates.first_mut())
                .expect("class just checked");
            for (name, property) in properties {
                if property.visibility == Visibility::Private {
                    continue;
                }
                class.properties.entry(name).or_insert(property);
            }
            for (name, constant) in constants {
                class.constants.entry(name).or_insert(constant);
            }
            for (name, method) in methods {
                if method.visibility == Visibility::Private {
                    continue;
                }
                class.methods.entry(name).or_insert(method);
            }
        }
        Ok(())
    }

    /// Post-pass over class alternates: emits one `Redefinition` per extra
    /// definition, pointing at both sites. Conditional redefinitions of
    /// internal or other conditional definitions stay silent.
    pub fn analyze_duplicate_classes(&self, issues: &mut IssueCollector) {
        for alternates in self.classes.values() {
            let Some((canonical, rest)) = alternates.split_first() else {
                continue;
            };
            for extra in rest {
                if extra.is_conditional && (canonical.is_internal || canonical.is_conditional) {
                    continue;
                }
                let message = if canonical.is_internal {
                    loupe_support::internal_redefinition_message("class", &extra.fqsen)
                } else {
                    loupe_support::redefinition_message(
                        "class",
                        &extra.fqsen,
                        &canonical.file,
                        canonical.line,
                    )
                };
                issues.emit(IssueKind::Redefinition, &extra.file, extra.line, message);
            }
        }
    }

    pub fn analyze_duplicate_functions(&self, issues: &mut IssueCollector) {
        for alternates in self.functions.values() {
            let Some((canonical, rest)) = alternates.split_first() else {
                continue;
            };
            for extra in rest {
                if extra.is_conditional && (canonical.is_internal || canonical.is_conditional) {
                    continue;
                }
                let message = if canonical.is_internal {
                    loupe_support::internal_redefinition_message("function", &extra.fqsen)
                } else {
                    loupe_support::redefinition_message(
                        "function",
                        &extra.fqsen,
                        &canonical.file,
                        canonical.line,
                    )
                };
                issues.emit(IssueKind::Redefinition, &extra.file, extra.line, message);
            }
        }
    }
}
