//! Pass one: a single depth-first, left-to-right traversal that populates
//! the code base with class/function/property/constant skeletons. Types come
//! from signatures and doc comments only; no expression evaluation happens
//! here. Forward references are legal, so this pass must finish over every
//! file before any analysis starts.

use std::rc::Rc;

use crate::ast::{flags, Node, NodeKind};
use crate::codebase::{
    ClassConstant, Clazz, CodeBase, Constant, FunctionLike, Property, Visibility,
};
use crate::comment::{self, Comment};
use crate::config::Config;
use crate::context::Parameter;
use crate::fqsen::Fqsen;
use crate::issue::{IssueCollector, IssueKind};
use crate::types::{Type, UnionType};

pub struct DeclarationPass<'a> {
    codebase: &'a mut CodeBase,
    issues: &'a mut IssueCollector,
    config: &'a Config,
    file: &'a str,
}

#[derive(Clone)]
struct DeclScope {
    namespace: String,
    class: Option<Fqsen>,
    /// Inside an `if`/`switch`/loop body: declarations here are
    /// conditionally defined.
    conditional: bool,
}

impl<'a> DeclarationPass<'a> {
    pub fn new(
        codebase: &'a mut CodeBase,
        issues: &'a mut IssueCollector,
        config: &'a Config,
        file: &'a str,
    ) -> Self {
        Self {
            codebase,
            issues,
            config,
            file,
        }
    }

    pub fn scan(&mut self, root: &Node) {
        let scope = DeclScope {
            namespace: String::new(),
            class: None,
            conditional: false,
        };
        self.scan_node(&scope, root);
    }

    fn scan_node(&mut self, scope: &DeclScope, node: &Node) {
        match node.kind {
            NodeKind::StmtList => {
                for child in &node.children {
                    self.scan_node(scope, child);
                }
            }
            NodeKind::Namespace => {
                let mut inner = scope.clone();
                inner.namespace = node.name_or_empty().to_string();
                if let Some(body) = node.child(0) {
                    self.scan_node(&inner, body);
                }
            }
            NodeKind::Class => self.scan_class(scope, node),
            NodeKind::Function => self.scan_function(scope, node),
            NodeKind::Method => self.scan_method(scope, node),
            NodeKind::PropertyGroup => self.scan_property_group(scope, node),
            NodeKind::ClassConstGroup => {
                for elem in &node.children {
                    self.scan_class_constant(scope, elem);
                }
            }
            NodeKind::ConstElem => self.scan_global_constant(scope, node),
            // Declarations nested under control flow exist only on some
            // executions.
            NodeKind::If => {
                let conditional = DeclScope {
                    conditional: true,
                    ..scope.clone()
                };
                for elem in &node.children {
                    if let Some(body) = elem.child(1) {
                        self.scan_node(&conditional, body);
                    }
                }
            }
            NodeKind::Switch => {
                let conditional = DeclScope {
                    conditional: true,
                    ..scope.clone()
                };
                for case in node.children.iter().skip(1) {
                    if let Some(body) = case.child(1) {
                        self.scan_node(&conditional, body);
                    }
                }
            }
            NodeKind::While => {
                let conditional = DeclScope {
                    conditional: true,
                    ..scope.clone()
                };
                if let Some(body) = node.child(1) {
                    self.scan_node(&conditional, body);
                }
            }
            NodeKind::Foreach => {
                let conditional = DeclScope {
                    conditional: true,
                    ..scope.clone()
                };
                if let Some(body) = node.child(3) {
                    self.scan_node(&conditional, body);
                }
            }
            // Everything else carries no declarations.
            _ => {}
        }
    }

    fn scan_class(&mut self, scope: &DeclScope, node: &Node) {
        let fqsen = Fqsen::from_name_in_namespace(node.name_or_empty(), &scope.namespace);
        let mut class = Clazz::new(fqsen.clone(), self.file, node.line);
        class.is_interface = node.has_flag(flags::INTERFACE);
        class.is_trait = node.has_flag(flags::TRAIT);
        class.is_abstract = node.has_flag(flags::ABSTRACT);
        class.is_final = node.has_flag(flags::FINAL);
        class.is_conditional = scope.conditional;

        if let Some(extends) = node.child(0) {
            class.parent = Some(Fqsen::from_name_in_namespace(
                extends.name_or_empty(),
                &scope.namespace,
            ));
        }
        if let Some(implements) = node.child(1) {
            class.interfaces = name_list(implements, &scope.namespace);
        }
        if let Some(uses) = node.child(2) {
            class.traits = name_list(uses, &scope.namespace);
        }
        self.codebase.add_class(class);

        let inner = DeclScope {
            class: Some(fqsen),
            ..scope.clone()
        };
        if let Some(body) = node.child(3) {
            self.scan_node(&inner, body);
        }
    }

    fn scan_function(&mut self, scope: &DeclScope, node: &Node) {
        let fqsen = Fqsen::from_name_in_namespace(node.name_or_empty(), &scope.namespace);
        let function = self.build_function_like(scope, node, fqsen, None);
        self.codebase.add_function(function);
    }

    fn scan_method(&mut self, scope: &DeclScope, node: &Node) {
        let Some(class_fqsen) = scope.class.clone() else {
            // A method node outside a class body is malformed input; skip it.
            return;
        };
        let fqsen = Fqsen::method(&class_fqsen, node.name_or_empty());
        let mut method = self.build_function_like(scope, node, fqsen, Some(class_fqsen.clone()));
        method.visibility = visibility_from_flags(node.flags);
        method.is_static = node.has_flag(flags::STATIC);
        method.is_abstract = node.has_flag(flags::ABSTRACT);

        let line = node.line;
        let Some(class) = self.codebase.get_class_mut(&class_fqsen) else {
            return;
        };
        let original_line = class
            .get_method(node.name_or_empty())
            .map(|existing| existing.line);
        if class.add_method(method) {
            return;
        }
        // PHP rejects duplicate methods inside one class body outright, so
        // there is no alternate chain to grow here.
        self.issues.emit(
            IssueKind::Redefinition,
            self.file,
            line,
            loupe_support::redefinition_message(
                "method",
                format!("{}::{}", class_fqsen, node.name_or_empty()),
                self.file,
                original_line.unwrap_or(0),
            ),
        );
    }

    fn build_function_like(
        &mut self,
        scope: &DeclScope,
        node: &Node,
        fqsen: Fqsen,
        defining_class: Option<Fqsen>,
    ) -> FunctionLike {
        let comment = node
            .doc_comment
            .as_deref()
            .map(|raw| comment::parse(raw, &scope.namespace))
            .unwrap_or_default();

        let mut function = FunctionLike::new(fqsen, self.file, node.line);
        function.is_conditional = scope.conditional;
        function.is_deprecated = comment.is_deprecated || node.has_flag(flags::DEPRECATED);
        function.returns_reference = node.has_flag(flags::BY_REF);
        function.defining_class = defining_class;

        if let Some(param_list) = node.child(0) {
            function.parameters = param_list
                .children
                .iter()
                .map(|param| self.build_parameter(scope, param, &comment))
                .collect();
        }

        if let Some(anno) = node.child(1) {
            function.return_type =
                comment::union_type_from_string(anno.name_or_empty(), &scope.namespace);
            function.has_declared_return_type = !function.return_type.is_empty();
        } else if let Some(doc_return) = comment.return_type {
            function.return_type = doc_return;
            function.has_declared_return_type = !function.return_type.is_empty();
        }

        if !self.config.quick_mode {
            function.body = node.child(2).cloned().map(Rc::new);
        }
        function
    }

    fn build_parameter(&mut self, scope: &DeclScope, node: &Node, comment: &Comment) -> Parameter {
        let name = node.name_or_empty().to_string();
        let mut union_type = node
            .child(0)
            .map(|anno| comment::union_type_from_string(anno.name_or_empty(), &scope.namespace))
            .unwrap_or_default();
        if union_type.is_empty() {
            if let Some(doc_type) = comment.parameter_type(&name) {
                union_type = doc_type.clone();
            }
        }
        let default = node.child(1);
        Parameter {
            name,
            union_type,
            is_optional: default.is_some() || node.has_flag(flags::VARIADIC),
            is_variadic: node.has_flag(flags::VARIADIC),
            is_pass_by_reference: node.has_flag(flags::BY_REF),
            default_type: default.map(literal_union_type).unwrap_or_default(),
        }
    }

    fn scan_property_group(&mut self, scope: &DeclScope, node: &Node) {
        let Some(class_fqsen) = scope.class.clone() else {
            return;
        };
        let comment = node
            .doc_comment
            .as_deref()
            .map(|raw| comment::parse(raw, &scope.namespace))
            .unwrap_or_default();
        let declared = node
            .child(0)
            .map(|anno| comment::union_type_from_string(anno.name_or_empty(), &scope.namespace))
            .unwrap_or_default();
        let visibility = visibility_from_flags(node.flags);
        let is_static = node.has_flag(flags::STATIC);

        for elem in node.children.iter().skip(1) {
            if elem.kind != NodeKind::PropertyElem {
                continue;
            }
            let name = elem.name_or_empty().to_string();
            let mut union_type = declared.clone();
            if union_type.is_empty() {
                if let Some((_, doc_type)) = comment
                    .variables
                    .iter()
                    .find(|(var, _)| var.is_empty() || *var == name)
                {
                    union_type = doc_type.clone();
                }
            }
            if union_type.is_empty() {
                if let Some(default) = elem.child(0) {
                    union_type = literal_union_type(default);
                }
            }
            let property = Property {
                name: name.clone(),
                union_type,
                visibility,
                is_static,
                defining_class: class_fqsen.clone(),
                file: self.file.to_string(),
                line: elem.line,
                is_dynamic: false,
            };
            if let Some(class) = self.codebase.get_class_mut(&class_fqsen) {
                if class.properties.contains_key(&name) {
                    self.issues.emit(
                        IssueKind::Redefinition,
                        self.file,
                        elem.line,
                        loupe_support::redefinition_message(
                            "property",
                            format!("{class_fqsen}::${name}"),
                            self.file,
                            class.properties[&name].line,
                        ),
                    );
                } else {
                    class.properties.insert(name, property);
                }
            }
        }
    }

    fn scan_class_constant(&mut self, scope: &DeclScope, node: &Node) {
        let Some(class_fqsen) = scope.class.clone() else {
            return;
        };
        if node.kind != NodeKind::ClassConstElem {
            return;
        }
        let name = node.name_or_empty().to_string();
        let constant = ClassConstant {
            name: name.clone(),
            union_type: node.child(0).map(literal_union_type).unwrap_or_default(),
            defining_class: class_fqsen.clone(),
            line: node.line,
        };
        if let Some(class) = self.codebase.get_class_mut(&class_fqsen) {
            class.constants.entry(name).or_insert(constant);
        }
    }

    fn scan_global_constant(&mut self, scope: &DeclScope, node: &Node) {
        let fqsen = Fqsen::from_name_in_namespace(node.name_or_empty(), &scope.namespace);
        self.codebase.add_constant(Constant {
            fqsen,
            union_type: node.child(0).map(literal_union_type).unwrap_or_default(),
            file: self.file.to_string(),
            line: node.line,
        });
    }
}

fn visibility_from_flags(bits: u32) -> Visibility {
    if bits & flags::PRIVATE != 0 {
        Visibility::Private
    } else if bits & flags::PROTECTED != 0 {
        Visibility::Protected
    } else {
        Visibility::Public
    }
}

fn name_list(node: &Node, namespace: &str) -> Vec<Fqsen> {
    node.children
        .iter()
        .filter(|child| child.kind == NodeKind::Name)
        .map(|child| Fqsen::from_name_in_namespace(child.name_or_empty(), namespace))
        .collect()
}

/// Shallow type of a default-value expression. Anything beyond a literal or
/// a literal array is left unknown; this pass never evaluates expressions.
pub(crate) fn literal_union_type(node: &Node) -> UnionType {
    let ty = match node.kind {
        NodeKind::IntLit => Type::Int,
        NodeKind::FloatLit => Type::Float,
        NodeKind::StringLit => Type::String,
        NodeKind::BoolLit => Type::Bool,
        NodeKind::NullLit => Type::Null,
        NodeKind::Array => Type::Array,
        NodeKind::UnaryOp => {
            return node.child(0).map(literal_union_type).unwrap_or_default();
        }
        _ => return UnionType::new(),
    };
    UnionType::from_type(ty)
}
