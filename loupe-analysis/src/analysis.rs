//! Pass two: flow-sensitive analysis. Walks the AST again with the fully
//! populated code base, threading a [`Context`] pre-order and synthesizing
//! expression types post-order. Every failure here is a diagnostic plus a
//! best-effort value; analysis of siblings and parents always continues.

use crate::ast::{Node, NodeKind};
use crate::codebase::{AnalysisState, CodeBase, FunctionLike, Visibility};
use crate::comment::union_type_from_string;
use crate::config::Config;
use crate::context::{Context, Parameter, ScopeArena, Variable};
use crate::flow;
use crate::fqsen::Fqsen;
use crate::issue::{IssueCollector, IssueKind};
use crate::types::{Type, UnionType};

const SUPERGLOBALS: &[&str] = &[
    "GLOBALS", "_GET", "_POST", "_SERVER", "_SESSION", "_COOKIE", "_FILES", "_ENV", "_REQUEST",
];

pub struct Analyzer<'a> {
    pub(crate) codebase: &'a mut CodeBase,
    pub(crate) config: &'a Config,
    pub(crate) issues: &'a mut IssueCollector,
    pub(crate) arena: ScopeArena,
    /// Lookup keys of function-likes currently being re-analyzed from call
    /// sites; bounds mutual recursion together with the configured depth cap.
    pub(crate) call_stack: Vec<String>,
}

/// Analyzes one file against the (already declared and flattened) code base.
pub fn analyze_file(
    codebase: &mut CodeBase,
    config: &Config,
    issues: &mut IssueCollector,
    file: &str,
    root: &Node,
) {
    let mut analyzer = Analyzer {
        codebase,
        config,
        issues,
        arena: ScopeArena::new(),
        call_stack: Vec::new(),
    };
    let scope = analyzer.arena.new_scope();
    let ctx = Context::new(file, scope);
    analyzer.analyze_node(&ctx, root);
}

impl<'a> Analyzer<'a> {
    pub(crate) fn line_of(&self, ctx: &Context, node: &Node) -> u32 {
        if node.line > 0 {
            node.line
        } else {
            ctx.line()
        }
    }

    pub(crate) fn emit(&mut self, kind: IssueKind, ctx: &Context, node: &Node, message: String) {
        let line = self.line_of(ctx, node);
        self.issues.emit(kind, ctx.file(), line, message);
    }

    /// Statement-level walk. Returns the context following the statement:
    /// assignments are visible to later statements in the same block, branch
    /// joins substitute a merged scope.
    pub(crate) fn analyze_node(&mut self, ctx: &Context, node: &Node) -> Context {
        let ctx = ctx.with_line(node.line);
        match node.kind {
            NodeKind::StmtList => {
                let mut current = ctx.clone();
                for child in &node.children {
                    current = self.analyze_node(&current, child);
                }
                current
            }
            NodeKind::Namespace => {
                let inner = ctx.with_namespace(node.name_or_empty());
                match node.child(0) {
                    Some(body) => self.analyze_node(&inner, body),
                    None => inner,
                }
            }
            NodeKind::Class => {
                self.analyze_class(&ctx, node);
                ctx
            }
            NodeKind::Function => {
                let fqsen =
                    Fqsen::from_name_in_namespace(node.name_or_empty(), ctx.namespace());
                self.analyze_function_body(&ctx, &fqsen, None, node.child(2));
                ctx
            }
            NodeKind::If => self.analyze_if(&ctx, node),
            NodeKind::Switch => self.analyze_switch(&ctx, node),
            NodeKind::While => self.analyze_while(&ctx, node),
            NodeKind::Foreach => self.analyze_foreach(&ctx, node),
            NodeKind::Return => {
                self.analyze_return(&ctx, node);
                ctx
            }
            NodeKind::Echo => {
                for child in &node.children {
                    self.union_type_of(&ctx, child);
                }
                ctx
            }
            // Declaration-only kinds were handled in pass one.
            NodeKind::PropertyGroup
            | NodeKind::ClassConstGroup
            | NodeKind::ConstElem
            | NodeKind::Method
            | NodeKind::Missing => ctx,
            // Anything else at statement level is an expression statement.
            _ => {
                if self.config.dead_code_detection && is_ineffective_statement(node) {
                    self.emit(
                        IssueKind::NoOp,
                        &ctx,
                        node,
                        "statement has no effect".to_string(),
                    );
                }
                self.union_type_of(&ctx, node);
                ctx
            }
        }
    }

    fn analyze_class(&mut self, ctx: &Context, node: &Node) {
        let fqsen = Fqsen::from_name_in_namespace(node.name_or_empty(), ctx.namespace());
        let class_ctx = ctx.with_class(fqsen.clone());
        let Some(body) = node.child(3) else {
            return;
        };
        for member in &body.children {
            if member.kind == NodeKind::Method {
                let method_fqsen = Fqsen::method(&fqsen, member.name_or_empty());
                self.analyze_function_body(
                    &class_ctx,
                    &method_fqsen,
                    Some(fqsen.clone()),
                    member.child(2),
                );
            }
        }
    }

    /// Analyzes a declared function/method body in a fresh scope seeded with
    /// its parameters. The body node comes from the tree being walked (quick
    /// mode retains no handle on the declaration). Guarded by the
    /// per-function state machine: a body already `Analyzing` is never
    /// re-entered.
    fn analyze_function_body(
        &mut self,
        ctx: &Context,
        fqsen: &Fqsen,
        class: Option<Fqsen>,
        body: Option<&Node>,
    ) {
        let Some(body) = body else {
            return;
        };
        let Some(function) = self.lookup_function_like(fqsen, class.as_ref()) else {
            return;
        };
        if function.state == AnalysisState::Analyzing {
            return;
        }
        let parameters = function.parameters.clone();
        let is_static = function.is_static;
        self.set_function_state(fqsen, class.as_ref(), AnalysisState::Analyzing);

        let scope = self.arena.new_scope();
        for parameter in &parameters {
            self.arena.get_mut(scope).add_variable(parameter.to_variable());
        }
        if let Some(class_fqsen) = &class {
            if !is_static {
                self.arena.get_mut(scope).add_variable(Variable::new(
                    "this",
                    UnionType::from_type(Type::ClassName(class_fqsen.clone())),
                ));
            }
        }

        let mut body_ctx = ctx.with_function(fqsen.clone()).with_scope(scope);
        if let Some(class_fqsen) = class {
            body_ctx = body_ctx.with_class(class_fqsen);
        }
        self.analyze_node(&body_ctx, body);
        self.set_function_state(fqsen, body_ctx.class_fqsen(), AnalysisState::Analyzed);
    }

    fn analyze_if(&mut self, ctx: &Context, node: &Node) -> Context {
        let mut branches = Vec::new();
        let mut exhaustive = false;
        for elem in &node.children {
            let branch_scope = self.arena.clone_scope(ctx.scope());
            let branch_ctx = ctx.with_scope(branch_scope);
            match elem.child(0) {
                Some(cond) => {
                    self.union_type_of(&branch_ctx, cond);
                }
                None => exhaustive = true,
            }
            // A nested branch inside the body may leave the walk in a fresh
            // merged scope; the join must see that final scope, not the clone
            // we started from.
            let end_ctx = match elem.child(1) {
                Some(body) => self.analyze_node(&branch_ctx, body),
                None => branch_ctx,
            };
            branches.push(end_ctx.scope());
        }
        if !exhaustive {
            // The conditional may fall through untouched; the state before
            // it is an implicit branch.
            branches.push(ctx.scope());
        }
        let merged = flow::merge_branch_scopes(&mut self.arena, &branches);
        ctx.with_scope(merged)
    }

    fn analyze_switch(&mut self, ctx: &Context, node: &Node) -> Context {
        if let Some(subject) = node.child(0) {
            self.union_type_of(ctx, subject);
        }
        let mut branches = Vec::new();
        let mut exhaustive = false;
        for case in node.children.iter().skip(1) {
            let branch_scope = self.arena.clone_scope(ctx.scope());
            let branch_ctx = ctx.with_scope(branch_scope);
            match case.child(0) {
                Some(value) => {
                    self.union_type_of(&branch_ctx, value);
                }
                None => exhaustive = true,
            }
            let end_ctx = match case.child(1) {
                Some(body) => self.analyze_node(&branch_ctx, body),
                None => branch_ctx,
            };
            branches.push(end_ctx.scope());
        }
        if !exhaustive {
            branches.push(ctx.scope());
        }
        let merged = flow::merge_branch_scopes(&mut self.arena, &branches);
        ctx.with_scope(merged)
    }

    fn analyze_while(&mut self, ctx: &Context, node: &Node) -> Context {
        if let Some(cond) = node.child(0) {
            self.union_type_of(ctx, cond);
        }
        // The body may run zero times, so its exit scope merges against the
        // pre-loop scope.
        let body_scope = self.arena.clone_scope(ctx.scope());
        let mut exit_scope = body_scope;
        if let Some(body) = node.child(1) {
            let body_ctx = ctx.with_scope(body_scope);
            exit_scope = self.analyze_node(&body_ctx, body).scope();
        }
        let merged = flow::merge_branch_scopes(&mut self.arena, &[exit_scope, ctx.scope()]);
        ctx.with_scope(merged)
    }

    fn analyze_foreach(&mut self, ctx: &Context, node: &Node) -> Context {
        let iterable = node
            .child(0)
            .map(|expr| self.union_type_of(ctx, expr))
            .unwrap_or_default();
        let body_scope = self.arena.clone_scope(ctx.scope());
        let body_ctx = ctx.with_scope(body_scope);

        if let Some(value_var) = node.child(1) {
            let element = iterable.generic_array_element_types();
            self.resolve_assignment(&body_ctx, value_var, element, false);
        }
        if let Some(key_var) = node.child(2) {
            let key_type = UnionType::from_types([Type::Int, Type::String]);
            self.resolve_assignment(&body_ctx, key_var, key_type, false);
        }
        let mut exit_scope = body_scope;
        if let Some(body) = node.child(3) {
            exit_scope = self.analyze_node(&body_ctx, body).scope();
        }
        let merged = flow::merge_branch_scopes(&mut self.arena, &[exit_scope, ctx.scope()]);
        ctx.with_scope(merged)
    }

    fn analyze_return(&mut self, ctx: &Context, node: &Node) {
        let returned = match node.child(0) {
            Some(expr) => self.union_type_of(ctx, expr),
            None => UnionType::from_type(Type::Void),
        };
        let Some(function) = self.current_function(ctx) else {
            return;
        };
        if function.has_declared_return_type {
            let mut declared = function.return_type.clone();
            if let Some(class) = ctx.class_fqsen() {
                declared = declared.resolved_in_class(class);
            }
            if !returned.can_cast_to_expanded_union(&declared, self.codebase) {
                self.emit(
                    IssueKind::TypeMismatch,
                    ctx,
                    node,
                    loupe_support::mismatch_message("return type", &declared, &returned),
                );
            }
        }
        if let Some(function) = self.current_function_mut(ctx) {
            function.inferred_return_type.add_union_type(&returned);
        }
    }

    // ------------------------------------------------------------------
    // Expression typing
    // ------------------------------------------------------------------

    /// Computes the union type of an expression, emitting diagnostics along
    /// the way. Always returns a best-effort value; an empty union means
    /// "no information".
    pub(crate) fn union_type_of(&mut self, ctx: &Context, node: &Node) -> UnionType {
        let ctx = ctx.with_line(node.line);
        match node.kind {
            NodeKind::IntLit => UnionType::from_type(Type::Int),
            NodeKind::FloatLit => UnionType::from_type(Type::Float),
            NodeKind::StringLit => UnionType::from_type(Type::String),
            NodeKind::BoolLit => UnionType::from_type(Type::Bool),
            NodeKind::NullLit => UnionType::from_type(Type::Null),
            NodeKind::Array => self.union_type_of_array(&ctx, node),
            NodeKind::Var => self.union_type_of_variable(&ctx, node),
            NodeKind::Name => self.union_type_of_constant(&ctx, node),
            NodeKind::Assign | NodeKind::AssignRef => {
                let rhs = node
                    .child(1)
                    .map(|value| self.union_type_of(&ctx, value))
                    .unwrap_or_default();
                if let Some(target) = node.child(0) {
                    self.resolve_assignment(&ctx, target, rhs.clone(), false);
                }
                rhs
            }
            NodeKind::Dim => self.union_type_of_dim(&ctx, node),
            NodeKind::Prop => self.union_type_of_property(&ctx, node),
            NodeKind::StaticProp => self.union_type_of_static_property(&ctx, node),
            NodeKind::ClassConst => self.union_type_of_class_constant(&ctx, node),
            NodeKind::Call => self.analyze_call(&ctx, node),
            NodeKind::MethodCall => self.analyze_method_call(&ctx, node),
            NodeKind::StaticCall => self.analyze_static_call(&ctx, node),
            NodeKind::New => self.analyze_new(&ctx, node),
            NodeKind::Closure => self.analyze_closure(&ctx, node),
            NodeKind::BinaryOp => self.union_type_of_binary(&ctx, node),
            NodeKind::UnaryOp => self.union_type_of_unary(&ctx, node),
            NodeKind::Spread => node
                .child(0)
                .map(|inner| self.union_type_of(&ctx, inner))
                .unwrap_or_default(),
            // A node kind with no expression value.
            _ => UnionType::new(),
        }
    }

    fn union_type_of_array(&mut self, ctx: &Context, node: &Node) -> UnionType {
        let mut elements = UnionType::new();
        for elem in &node.children {
            if let Some(value) = elem.child(0) {
                elements.add_union_type(&self.union_type_of(ctx, value));
            }
            if let Some(key) = elem.child(1) {
                self.union_type_of(ctx, key);
            }
        }
        if elements.is_empty() {
            UnionType::from_type(Type::Array)
        } else {
            elements.as_generic_array_types()
        }
    }

    fn union_type_of_variable(&mut self, ctx: &Context, node: &Node) -> UnionType {
        let name = node.name_or_empty();
        if name == "this" {
            return match ctx.class_fqsen() {
                Some(class) => UnionType::from_type(Type::ClassName(class.clone())),
                None => UnionType::new(),
            };
        }
        if SUPERGLOBALS.contains(&name) {
            return UnionType::from_type(Type::Array);
        }
        match self.arena.get(ctx.scope()).get_variable(name) {
            Some(variable) => variable.union_type.clone(),
            None => {
                self.emit(
                    IssueKind::Undefined,
                    ctx,
                    node,
                    loupe_support::undefined_message("variable", format!("${name}")),
                );
                UnionType::new()
            }
        }
    }

    fn union_type_of_constant(&mut self, ctx: &Context, node: &Node) -> UnionType {
        let name = node.name_or_empty();
        let qualified = ctx.qualified(name);
        if let Some(constant) = self.codebase.get_constant(&qualified) {
            return constant.union_type.clone();
        }
        let global = Fqsen::from_full_name(name);
        if let Some(constant) = self.codebase.get_constant(&global) {
            return constant.union_type.clone();
        }
        self.emit(
            IssueKind::Undefined,
            ctx,
            node,
            loupe_support::undefined_message("constant", name),
        );
        UnionType::new()
    }

    fn union_type_of_dim(&mut self, ctx: &Context, node: &Node) -> UnionType {
        let base = node
            .child(0)
            .map(|expr| self.union_type_of(ctx, expr))
            .unwrap_or_default();
        if let Some(index) = node.child(1) {
            self.union_type_of(ctx, index);
        }
        if base.is_empty() {
            return UnionType::new();
        }
        let mut result = base.generic_array_element_types();
        // Offsets into strings yield strings; plain `array`/`mixed` stay
        // unknown rather than guessed.
        if base.has_type(&Type::String) {
            result.add_type(Type::String);
        }
        let indexable = base.iter().any(|ty| {
            ty.is_array_like() || matches!(ty, Type::String | Type::Mixed)
        });
        if !indexable {
            self.emit(
                IssueKind::TypeMismatch,
                ctx,
                node,
                format!("array access on non-array type {base}"),
            );
        }
        result
    }

    /// Looks up a property across the class types of `object_union`.
    /// Returns the property types unioned over every class that declares it.
    fn union_type_of_property(&mut self, ctx: &Context, node: &Node) -> UnionType {
        let object = node
            .child(0)
            .map(|expr| self.union_type_of(ctx, expr))
            .unwrap_or_default();
        let name = node.name_or_empty();
        let classes = object.class_fqsens();
        if classes.is_empty() {
            return UnionType::new();
        }
        let mut result = UnionType::new();
        let mut found = false;
        let mut has_magic_get = false;
        for class_fqsen in &classes {
            let Some(class) = self.codebase.get_class(class_fqsen) else {
                continue;
            };
            if class.get_method("__get").is_some() {
                has_magic_get = true;
            }
            if let Some(property) = class.properties.get(name) {
                found = true;
                let property = property.clone();
                self.check_property_access(ctx, node, &property);
                result.add_union_type(&property.union_type.resolved_in_class(class_fqsen));
            }
        }
        if !found && !has_magic_get {
            self.emit(
                IssueKind::Undefined,
                ctx,
                node,
                loupe_support::undefined_message(
                    "property",
                    format!("{}->{name}", classes[0]),
                ),
            );
        }
        result
    }

    pub(crate) fn check_property_access(
        &mut self,
        ctx: &Context,
        node: &Node,
        property: &crate::codebase::Property,
    ) {
        let allowed = match property.visibility {
            Visibility::Public => true,
            Visibility::Private => ctx
                .class_fqsen()
                .is_some_and(|current| current.lookup_key() == property.defining_class.lookup_key()),
            Visibility::Protected => ctx.class_fqsen().is_some_and(|current| {
                current.lookup_key() == property.defining_class.lookup_key()
                    || self
                        .codebase
                        .ancestors_of(current)
                        .iter()
                        .any(|a| a.lookup_key() == property.defining_class.lookup_key())
            }),
        };
        if !allowed {
            let visibility = match property.visibility {
                Visibility::Private => "private",
                Visibility::Protected => "protected",
                Visibility::Public => unreachable!("public access is always allowed"),
            };
            self.emit(
                IssueKind::Access,
                ctx,
                node,
                format!(
                    "cannot access {visibility} property {}::${}",
                    property.defining_class, property.name
                ),
            );
        }
    }

    fn union_type_of_static_property(&mut self, ctx: &Context, node: &Node) -> UnionType {
        let Some(class_fqsen) = node
            .child(0)
            .and_then(|class| self.resolve_class_name(ctx, class.name_or_empty()))
        else {
            return UnionType::new();
        };
        let name = node.name_or_empty();
        if !self.codebase.has_class(&class_fqsen) {
            self.emit(
                IssueKind::Undefined,
                ctx,
                node,
                loupe_support::undefined_message("class", &class_fqsen),
            );
            return UnionType::new();
        }
        match self
            .codebase
            .get_class(&class_fqsen)
            .and_then(|class| class.properties.get(name))
            .cloned()
        {
            Some(property) => {
                self.check_property_access(ctx, node, &property);
                property.union_type.resolved_in_class(&class_fqsen)
            }
            None => {
                self.emit(
                    IssueKind::Undefined,
                    ctx,
                    node,
                    loupe_support::undefined_message(
                        "static property",
                        format!("{class_fqsen}::${name}"),
                    ),
                );
                UnionType::new()
            }
        }
    }

    fn union_type_of_class_constant(&mut self, ctx: &Context, node: &Node) -> UnionType {
        let Some(class_fqsen) = node
            .child(0)
            .and_then(|class| self.resolve_class_name(ctx, class.name_or_empty()))
        else {
            return UnionType::new();
        };
        let name = node.name_or_empty();
        if name == "class" {
            return UnionType::from_type(Type::String);
        }
        if !self.codebase.has_class(&class_fqsen) {
            self.emit(
                IssueKind::Undefined,
                ctx,
                node,
                loupe_support::undefined_message("class", &class_fqsen),
            );
            return UnionType::new();
        }
        match self
            .codebase
            .get_class(&class_fqsen)
            .and_then(|class| class.constants.get(name))
        {
            Some(constant) => constant.union_type.clone(),
            None => {
                self.emit(
                    IssueKind::Undefined,
                    ctx,
                    node,
                    loupe_support::undefined_message(
                        "class constant",
                        format!("{class_fqsen}::{name}"),
                    ),
                );
                UnionType::new()
            }
        }
    }

    fn union_type_of_binary(&mut self, ctx: &Context, node: &Node) -> UnionType {
        let left = node
            .child(0)
            .map(|expr| self.union_type_of(ctx, expr))
            .unwrap_or_default();
        let right = node
            .child(1)
            .map(|expr| self.union_type_of(ctx, expr))
            .unwrap_or_default();
        match node.name_or_empty() {
            "+" | "-" | "*" | "%" | "**" | "/" => {
                if node.name_or_empty() == "+"
                    && left.iter().all(Type::is_array_like)
                    && !left.is_empty()
                    && right.iter().all(Type::is_array_like)
                    && !right.is_empty()
                {
                    let mut merged = left.clone();
                    merged.add_union_type(&right);
                    return merged;
                }
                self.check_numeric_operand(ctx, node, &left);
                self.check_numeric_operand(ctx, node, &right);
                if left.has_type(&Type::Float) || right.has_type(&Type::Float) {
                    UnionType::from_type(Type::Float)
                } else {
                    UnionType::from_type(Type::Int)
                }
            }
            "." => UnionType::from_type(Type::String),
            "==" | "===" | "!=" | "!==" | "<" | ">" | "<=" | ">=" | "&&" | "||" | "and"
            | "or" | "xor" | "instanceof" => UnionType::from_type(Type::Bool),
            "<=>" => UnionType::from_type(Type::Int),
            "&" | "|" | "^" | "<<" | ">>" => UnionType::from_type(Type::Int),
            "??" => {
                let mut merged = UnionType::from_types(
                    left.iter().filter(|ty| **ty != Type::Null).cloned(),
                );
                merged.add_union_type(&right);
                merged
            }
            _ => UnionType::new(),
        }
    }

    fn check_numeric_operand(&mut self, ctx: &Context, node: &Node, operand: &UnionType) {
        if operand.is_empty() {
            return;
        }
        let numeric = UnionType::from_types([Type::Int, Type::Float]);
        if !operand.can_cast_to_union(&numeric, self.codebase) {
            self.emit(
                IssueKind::TypeMismatch,
                ctx,
                node,
                loupe_support::mismatch_message("arithmetic operand", "int|float", operand),
            );
        }
    }

    fn union_type_of_unary(&mut self, ctx: &Context, node: &Node) -> UnionType {
        let operand = node
            .child(0)
            .map(|expr| self.union_type_of(ctx, expr))
            .unwrap_or_default();
        match node.name_or_empty() {
            "!" => UnionType::from_type(Type::Bool),
            "-" | "+" => {
                self.check_numeric_operand(ctx, node, &operand);
                if operand.has_type(&Type::Float) {
                    UnionType::from_type(Type::Float)
                } else {
                    UnionType::from_type(Type::Int)
                }
            }
            "~" => UnionType::from_type(Type::Int),
            _ => operand,
        }
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    fn analyze_call(&mut self, ctx: &Context, node: &Node) -> UnionType {
        let Some(callee) = node.child(0) else {
            return UnionType::new();
        };
        let args = node.child(1);
        if callee.kind != NodeKind::Name {
            // Indirect call through an expression; type the callee and the
            // arguments, nothing more can be checked.
            let callee_type = self.union_type_of(ctx, callee);
            let callable = UnionType::from_types([Type::Callable, Type::String, Type::Object]);
            if !callee_type.can_cast_to_union(&callable, self.codebase) {
                self.emit(
                    IssueKind::TypeMismatch,
                    ctx,
                    node,
                    loupe_support::mismatch_message("callee", "callable", &callee_type),
                );
            }
            if let Some(args) = args {
                for arg in &args.children {
                    self.union_type_of(ctx, arg);
                }
            }
            return UnionType::new();
        }

        let name = callee.name_or_empty();
        let mut fqsen = ctx.qualified(name);
        if !self.codebase.has_function(&fqsen) {
            // Unqualified calls fall back to the global namespace.
            let global = Fqsen::from_full_name(name);
            if self.codebase.has_function(&global) {
                fqsen = global;
            }
        }
        if !self.codebase.has_function(&fqsen) {
            self.emit(
                IssueKind::Undefined,
                ctx,
                node,
                loupe_support::call_undefined_message("function", name),
            );
            if let Some(args) = args {
                for arg in &args.children {
                    self.union_type_of(ctx, arg);
                }
            }
            return UnionType::new();
        }

        let alternates: Vec<FunctionLike> =
            self.codebase.function_alternates(&fqsen).to_vec();
        let canonical = &alternates[0];
        if canonical.is_deprecated {
            self.emit(
                IssueKind::Deprecated,
                ctx,
                node,
                loupe_support::deprecated_message("function", &fqsen),
            );
        }
        if let Some(min_version) = canonical.min_version {
            if !self.config.supports_version(min_version) {
                self.emit(
                    IssueKind::Availability,
                    ctx,
                    node,
                    format!(
                        "'{fqsen}' requires version {min_version}, target is {}",
                        self.config.target_version
                    ),
                );
            }
        }

        let arg_types = self.check_call(ctx, &alternates, args, &fqsen.to_string());
        self.maybe_reanalyze(ctx, &fqsen, None, &arg_types);
        self.codebase
            .get_function(&fqsen)
            .map(FunctionLike::effective_return_type)
            .unwrap_or_default()
    }

    fn analyze_method_call(&mut self, ctx: &Context, node: &Node) -> UnionType {
        let object = node
            .child(0)
            .map(|expr| self.union_type_of(ctx, expr))
            .unwrap_or_default();
        let args = node.child(1);
        let name = node.name_or_empty();
        let classes = object.class_fqsens();
        if classes.is_empty() {
            // Unknown receiver: stay quiet, type the arguments.
            if let Some(args) = args {
                for arg in &args.children {
                    self.union_type_of(ctx, arg);
                }
            }
            return UnionType::new();
        }
        for class_fqsen in &classes {
            let Some(class) = self.codebase.get_class(class_fqsen) else {
                continue;
            };
            if let Some(method) = class.get_method(name) {
                let method = method.clone();
                return self.analyze_resolved_call(ctx, node, class_fqsen, &method, args, false);
            }
            if class.get_method("__call").is_some() {
                if let Some(args) = args {
                    for arg in &args.children {
                        self.union_type_of(ctx, arg);
                    }
                }
                return UnionType::new();
            }
        }
        self.emit(
            IssueKind::Undefined,
            ctx,
            node,
            loupe_support::call_undefined_message(
                "method",
                format!("{}::{name}", classes[0]),
            ),
        );
        if let Some(args) = args {
            for arg in &args.children {
                self.union_type_of(ctx, arg);
            }
        }
        UnionType::new()
    }

    fn analyze_static_call(&mut self, ctx: &Context, node: &Node) -> UnionType {
        let Some(class_name) = node.child(0) else {
            return UnionType::new();
        };
        let args = node.child(1);
        let name = node.name_or_empty();
        let Some(class_fqsen) = self.resolve_class_name(ctx, class_name.name_or_empty()) else {
            return UnionType::new();
        };
        if !self.codebase.has_class(&class_fqsen) {
            self.emit(
                IssueKind::Undefined,
                ctx,
                node,
                loupe_support::undefined_message("class", &class_fqsen),
            );
            return UnionType::new();
        }
        let Some(method) = self.codebase.get_method(&class_fqsen, name).cloned() else {
            self.emit(
                IssueKind::Undefined,
                ctx,
                node,
                loupe_support::call_undefined_message(
                    "method",
                    format!("{class_fqsen}::{name}"),
                ),
            );
            return UnionType::new();
        };
        self.analyze_resolved_call(ctx, node, &class_fqsen, &method, args, true)
    }

    /// Shared tail of instance and static method calls once the method is
    /// resolved.
    fn analyze_resolved_call(
        &mut self,
        ctx: &Context,
        node: &Node,
        class_fqsen: &Fqsen,
        method: &FunctionLike,
        args: Option<&Node>,
        called_statically: bool,
    ) -> UnionType {
        let display = format!("{class_fqsen}::{}", method.fqsen.name());
        if method.is_deprecated {
            self.emit(
                IssueKind::Deprecated,
                ctx,
                node,
                loupe_support::deprecated_message("method", &display),
            );
        }
        // Instance-context calls inside the hierarchy (`self::helper()`) are
        // legitimate PHP; everything else mixing staticness is flagged.
        if called_statically && !method.is_static {
            let in_hierarchy = ctx.class_fqsen().is_some_and(|current| {
                current.lookup_key() == class_fqsen.lookup_key()
                    || self
                        .codebase
                        .ancestors_of(current)
                        .iter()
                        .any(|a| a.lookup_key() == class_fqsen.lookup_key())
            });
            if !in_hierarchy {
                self.emit(
                    IssueKind::StaticMisuse,
                    ctx,
                    node,
                    format!("static call to instance method '{display}'"),
                );
            }
        }
        if !called_statically && method.is_static {
            self.emit(
                IssueKind::StaticMisuse,
                ctx,
                node,
                format!("instance call to static method '{display}'"),
            );
        }

        let alternates = vec![method.clone()];
        let arg_types = self.check_call(ctx, &alternates, args, &display);
        self.maybe_reanalyze(ctx, &method.fqsen, Some(class_fqsen), &arg_types);
        let latest = self
            .codebase
            .get_method(class_fqsen, method.fqsen.name())
            .map(FunctionLike::effective_return_type)
            .unwrap_or_else(|| method.effective_return_type());
        latest.resolved_in_class(class_fqsen)
    }

    fn analyze_new(&mut self, ctx: &Context, node: &Node) -> UnionType {
        let Some(class_name) = node.child(0) else {
            return UnionType::new();
        };
        let args = node.child(1);
        let Some(class_fqsen) = self.resolve_class_name(ctx, class_name.name_or_empty()) else {
            return UnionType::new();
        };
        if !self.codebase.has_class(&class_fqsen) {
            self.emit(
                IssueKind::Undefined,
                ctx,
                node,
                loupe_support::undefined_message("class", &class_fqsen),
            );
            if let Some(args) = args {
                for arg in &args.children {
                    self.union_type_of(ctx, arg);
                }
            }
            return UnionType::new();
        }
        match self.codebase.get_method(&class_fqsen, "__construct").cloned() {
            Some(constructor) => {
                let display = format!("{class_fqsen}::__construct");
                let alternates = vec![constructor];
                self.check_call(ctx, &alternates, args, &display);
            }
            None => {
                // The implicit default constructor takes no arguments.
                let supplied = args.map(|list| list.children.len()).unwrap_or(0);
                if supplied > 0 {
                    self.emit(
                        IssueKind::ParameterCount,
                        ctx,
                        node,
                        loupe_support::arity_message(&class_fqsen, 0, Some(0), supplied),
                    );
                }
                if let Some(args) = args {
                    for arg in &args.children {
                        self.union_type_of(ctx, arg);
                    }
                }
            }
        }
        UnionType::from_type(Type::ClassName(class_fqsen))
    }

    /// Closure bodies run in a fresh scope: parameters plus whatever the
    /// `use` clause imports. By-value captures copy the current type; by-ref
    /// captures write their final type back and autovivify missing outer
    /// variables.
    fn analyze_closure(&mut self, ctx: &Context, node: &Node) -> UnionType {
        let scope = self.arena.new_scope();
        if let Some(param_list) = node.child(0) {
            for param_node in &param_list.children {
                let parameter = parameter_from_node(param_node, ctx.namespace());
                self.arena.get_mut(scope).add_variable(parameter.to_variable());
            }
        }
        let mut by_ref_uses = Vec::new();
        if let Some(uses) = node.child(2) {
            for use_node in &uses.children {
                let name = use_node.name_or_empty().to_string();
                let by_ref = use_node.has_flag(crate::ast::flags::BY_REF);
                let outer = self
                    .arena
                    .get(ctx.scope())
                    .get_variable(&name)
                    .map(|variable| variable.union_type.clone());
                match outer {
                    Some(union_type) => {
                        self.arena
                            .get_mut(scope)
                            .add_variable(Variable::new(name.clone(), union_type));
                    }
                    None if by_ref => {
                        // Reference captures spring into existence like
                        // reference parameters do.
                        self.arena
                            .get_mut(ctx.scope())
                            .add_variable(Variable::new(name.clone(), UnionType::new()));
                        self.arena
                            .get_mut(scope)
                            .add_variable(Variable::new(name.clone(), UnionType::new()));
                    }
                    None => {
                        self.emit(
                            IssueKind::Undefined,
                            ctx,
                            use_node,
                            loupe_support::undefined_message("variable", format!("${name}")),
                        );
                    }
                }
                if by_ref {
                    by_ref_uses.push(name);
                }
            }
        }
        if ctx.class_fqsen().is_some() {
            let this_type = self
                .arena
                .get(ctx.scope())
                .get_variable("this")
                .map(|variable| variable.union_type.clone());
            if let Some(this_type) = this_type {
                self.arena
                    .get_mut(scope)
                    .add_variable(Variable::new("this", this_type));
            }
        }

        let closure_ctx = ctx
            .with_function(Fqsen::from_full_name("{closure}"))
            .with_scope(scope);
        let mut exit_scope = scope;
        if let Some(body) = node.child(3) {
            exit_scope = self.analyze_node(&closure_ctx, body).scope();
        }
        for name in by_ref_uses {
            let final_type = self
                .arena
                .get(exit_scope)
                .get_variable(&name)
                .map(|variable| variable.union_type.clone())
                .unwrap_or_default();
            if let Some(outer) = self.arena.get_mut(ctx.scope()).get_variable_mut(&name) {
                outer.union_type.add_union_type(&final_type);
            }
        }
        UnionType::from_type(Type::Callable)
    }

    // ------------------------------------------------------------------
    // Shared lookups
    // ------------------------------------------------------------------

    /// Resolves a class name expression, honoring `self`/`static`/`parent`
    /// placeholders against the current context.
    pub(crate) fn resolve_class_name(&self, ctx: &Context, name: &str) -> Option<Fqsen> {
        match name {
            "" => None,
            "self" | "static" => ctx.class_fqsen().cloned(),
            "parent" => ctx
                .class_fqsen()
                .and_then(|class| self.codebase.get_class(class))
                .and_then(|class| class.parent.clone()),
            _ => {
                let qualified = ctx.qualified(name);
                if self.codebase.has_class(&qualified) {
                    return Some(qualified);
                }
                let global = Fqsen::from_full_name(name);
                if self.codebase.has_class(&global) {
                    return Some(global);
                }
                Some(qualified)
            }
        }
    }

    fn lookup_function_like(&self, fqsen: &Fqsen, class: Option<&Fqsen>) -> Option<&FunctionLike> {
        match class {
            Some(class_fqsen) => self.codebase.get_method(class_fqsen, fqsen.name()),
            None => self.codebase.get_function(fqsen),
        }
    }

    fn set_function_state(
        &mut self,
        fqsen: &Fqsen,
        class: Option<&Fqsen>,
        state: AnalysisState,
    ) {
        let function = match class {
            Some(class_fqsen) => self.codebase.get_method_mut(class_fqsen, fqsen.name()),
            None => self.codebase.get_function_mut(fqsen),
        };
        if let Some(function) = function {
            function.state = state;
        }
    }

    fn current_function(&self, ctx: &Context) -> Option<&FunctionLike> {
        let fqsen = ctx.function_fqsen()?;
        self.lookup_function_like(fqsen, ctx.class_fqsen())
    }

    fn current_function_mut(&mut self, ctx: &Context) -> Option<&mut FunctionLike> {
        let fqsen = ctx.function_fqsen()?.clone();
        match ctx.class_fqsen() {
            Some(class_fqsen) => {
                let class_fqsen = class_fqsen.clone();
                self.codebase.get_method_mut(&class_fqsen, fqsen.name())
            }
            None => self.codebase.get_function_mut(&fqsen),
        }
    }

    /// Call-site re-analysis: when a callee declared no parameter types and
    /// the call supplies concrete ones, its body is re-visited with the
    /// narrowed types. Bounded by the configured depth cap and the active
    /// call stack; skipped entirely in quick mode.
    fn maybe_reanalyze(
        &mut self,
        ctx: &Context,
        fqsen: &Fqsen,
        class: Option<&Fqsen>,
        arg_types: &[UnionType],
    ) {
        if self.config.quick_mode {
            return;
        }
        let Some(function) = self.lookup_function_like(fqsen, class) else {
            return;
        };
        if function.is_internal
            || function.body.is_none()
            || function.has_declared_parameter_types()
            || function.state == AnalysisState::Analyzing
        {
            return;
        }
        if arg_types.iter().all(UnionType::is_empty) {
            return;
        }
        let key = match class {
            Some(class_fqsen) => format!("{}::{}", class_fqsen.lookup_key(), fqsen.name()),
            None => fqsen.lookup_key(),
        };
        if self.call_stack.contains(&key) || self.call_stack.len() >= self.config.recursion_depth_cap
        {
            return;
        }

        let Some(body) = function.body.clone() else {
            return;
        };
        let parameters = function.parameters.clone();
        let file = function.file.clone();
        let is_static = function.is_static;

        // Narrow the signature's inferred parameter types monotonically.
        if let Some(function) = match class {
            Some(class_fqsen) => self.codebase.get_method_mut(class_fqsen, fqsen.name()),
            None => self.codebase.get_function_mut(fqsen),
        } {
            for (parameter, arg_type) in function.parameters.iter_mut().zip(arg_types.iter()) {
                parameter.union_type.add_union_type(arg_type);
            }
            function.state = AnalysisState::Analyzing;
        }

        self.call_stack.push(key);
        let scope = self.arena.new_scope();
        for (index, parameter) in parameters.iter().enumerate() {
            let mut variable = parameter.to_variable();
            if let Some(arg_type) = arg_types.get(index) {
                variable.union_type.add_union_type(arg_type);
            }
            self.arena.get_mut(scope).add_variable(variable);
        }
        let mut body_ctx = Context::new(&file, scope).with_function(fqsen.clone());
        if let Some(class_fqsen) = class {
            body_ctx = body_ctx.with_class(class_fqsen.clone());
            if !is_static {
                self.arena.get_mut(scope).add_variable(Variable::new(
                    "this",
                    UnionType::from_type(Type::ClassName(class_fqsen.clone())),
                ));
            }
        }
        // The walk is the same one the declared-order pass ran; findings it
        // repeats collapse in the collector, findings the narrowed parameter
        // types expose are new.
        self.analyze_node(&body_ctx, &body);
        self.call_stack.pop();
        self.set_function_state(fqsen, class, AnalysisState::Analyzed);
    }
}

fn is_ineffective_statement(node: &Node) -> bool {
    matches!(
        node.kind,
        NodeKind::Var
            | NodeKind::IntLit
            | NodeKind::FloatLit
            | NodeKind::StringLit
            | NodeKind::BoolLit
            | NodeKind::NullLit
    )
}

/// Builds a parameter from a `Param` node outside the declaration pass
/// (closures are not registered in the code base).
pub(crate) fn parameter_from_node(node: &Node, namespace: &str) -> Parameter {
    let union_type = node
        .child(0)
        .map(|anno| union_type_from_string(anno.name_or_empty(), namespace))
        .unwrap_or_default();
    let default = node.child(1);
    Parameter {
        name: node.name_or_empty().to_string(),
        union_type,
        is_optional: default.is_some() || node.has_flag(crate::ast::flags::VARIADIC),
        is_variadic: node.has_flag(crate::ast::flags::VARIADIC),
        is_pass_by_reference: node.has_flag(crate::ast::flags::BY_REF),
        default_type: default
            .map(crate::declaration::literal_union_type)
            .unwrap_or_default(),
    }
}
