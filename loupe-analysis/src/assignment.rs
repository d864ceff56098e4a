//! Assignment targets. A plain variable write replaces what the scope knew;
//! every structured write (array dimension, list destructuring) folds into
//! what is already there, because one element observed says nothing about the
//! others.

use crate::analysis::Analyzer;
use crate::ast::{Node, NodeKind};
use crate::codebase::{Property, Visibility};
use crate::context::{Context, Variable};
use crate::fqsen::Fqsen;
use crate::issue::IssueKind;
use crate::types::{Type, UnionType};

impl<'a> Analyzer<'a> {
    /// Applies `value` to an assignment target. `union_with_existing` selects
    /// between replacing the target's known type (direct `$x = ...`) and
    /// widening it (the base of a dimension write).
    pub(crate) fn resolve_assignment(
        &mut self,
        ctx: &Context,
        target: &Node,
        value: UnionType,
        union_with_existing: bool,
    ) {
        match target.kind {
            NodeKind::Var => self.assign_variable(ctx, target, value, union_with_existing),
            NodeKind::Dim => {
                if let Some(index) = target.child(1) {
                    self.union_type_of(ctx, index);
                }
                let Some(base) = target.child(0) else {
                    return;
                };
                // `$x[...] = v` makes $x an array of v on top of whatever it
                // already held.
                let wrapped = if value.is_empty() {
                    UnionType::from_type(Type::Array)
                } else {
                    value.as_generic_array_types()
                };
                self.resolve_assignment(ctx, base, wrapped, true);
            }
            NodeKind::Prop => self.assign_property(ctx, target, value),
            NodeKind::StaticProp => self.assign_static_property(ctx, target, value),
            NodeKind::List => {
                let element = value.generic_array_element_types();
                for entry in &target.children {
                    if entry.is_missing() {
                        continue;
                    }
                    self.resolve_assignment(ctx, entry, element.clone(), false);
                }
            }
            // Writing through anything else (a call result, a literal) is a
            // parse-level oddity; type it to surface nested issues and move on.
            _ => {
                self.union_type_of(ctx, target);
            }
        }
    }

    fn assign_variable(
        &mut self,
        ctx: &Context,
        target: &Node,
        value: UnionType,
        union_with_existing: bool,
    ) {
        let name = target.name_or_empty();
        if name == "this" {
            return;
        }
        let scope = self.arena.get_mut(ctx.scope());
        match scope.get_variable_mut(name) {
            Some(variable) if union_with_existing => {
                variable.union_type.add_union_type(&value);
            }
            Some(variable) => {
                variable.union_type = value;
            }
            None => {
                scope.add_variable(Variable::new(name, value));
            }
        }
    }

    fn assign_property(&mut self, ctx: &Context, target: &Node, value: UnionType) {
        let object = target
            .child(0)
            .map(|expr| self.union_type_of(ctx, expr))
            .unwrap_or_default();
        let name = target.name_or_empty();
        let classes = object.class_fqsens();
        if classes.is_empty() {
            return;
        }
        let mut found = false;
        let mut has_magic_set = false;
        for class_fqsen in &classes {
            let Some(class) = self.codebase.get_class(class_fqsen) else {
                continue;
            };
            if class.get_method("__set").is_some() {
                has_magic_set = true;
            }
            let Some(property) = class.properties.get(name).cloned() else {
                continue;
            };
            found = true;
            self.check_property_access(ctx, target, &property);
            let declared = property.union_type.resolved_in_class(class_fqsen);
            if !property.is_dynamic
                && !declared.is_empty()
                && !value.can_cast_to_expanded_union(&declared, self.codebase)
            {
                self.emit(
                    IssueKind::TypeMismatch,
                    ctx,
                    target,
                    loupe_support::mismatch_message(
                        &format!("property {class_fqsen}::${name}"),
                        &declared,
                        &value,
                    ),
                );
            }
            // The write happens at runtime whether or not it type-checks;
            // record the observed type so later reads see it.
            if let Some(property) = self
                .codebase
                .get_class_mut(class_fqsen)
                .and_then(|clazz| clazz.properties.get_mut(name))
            {
                property.union_type.add_union_type(&value);
            }
        }
        if found || has_magic_set {
            return;
        }
        if self.config.allow_undeclared_property_write {
            let Some(class_fqsen) = classes.first() else {
                return;
            };
            let property = Property {
                name: name.to_string(),
                union_type: value,
                visibility: Visibility::Public,
                is_static: false,
                defining_class: class_fqsen.clone(),
                file: ctx.file().to_string(),
                line: self.line_of(ctx, target),
                is_dynamic: true,
            };
            if let Some(class) = self.codebase.get_class_mut(class_fqsen) {
                class.properties.insert(name.to_string(), property);
            }
        } else {
            self.emit(
                IssueKind::Undefined,
                ctx,
                target,
                loupe_support::undefined_message("property", format!("{}->{name}", classes[0])),
            );
        }
    }

    /// A property handed to a by-reference parameter. The callee writes
    /// through it, so the parameter's declared type folds into the property
    /// and a missing one springs into existence with that type instead of
    /// being reported. Returns the property's type after the write.
    pub(crate) fn vivify_property_argument(
        &mut self,
        ctx: &Context,
        target: &Node,
        declared: &UnionType,
    ) -> UnionType {
        let classes: Vec<Fqsen> = match target.kind {
            NodeKind::StaticProp => target
                .child(0)
                .and_then(|class| self.resolve_class_name(ctx, class.name_or_empty()))
                .filter(|fqsen| self.codebase.has_class(fqsen))
                .into_iter()
                .collect(),
            _ => target
                .child(0)
                .map(|expr| self.union_type_of(ctx, expr))
                .unwrap_or_default()
                .class_fqsens(),
        };
        let name = target.name_or_empty();
        let mut result = UnionType::new();
        let mut found = false;
        for class_fqsen in &classes {
            let Some(property) = self
                .codebase
                .get_class(class_fqsen)
                .and_then(|class| class.properties.get(name))
                .cloned()
            else {
                continue;
            };
            found = true;
            self.check_property_access(ctx, target, &property);
            if let Some(property) = self
                .codebase
                .get_class_mut(class_fqsen)
                .and_then(|class| class.properties.get_mut(name))
            {
                property.union_type.add_union_type(declared);
                result.add_union_type(&property.union_type.resolved_in_class(class_fqsen));
            }
        }
        if found {
            return result;
        }
        let Some(class_fqsen) = classes.first() else {
            return declared.clone();
        };
        let property = Property {
            name: name.to_string(),
            union_type: declared.clone(),
            visibility: Visibility::Public,
            is_static: target.kind == NodeKind::StaticProp,
            defining_class: class_fqsen.clone(),
            file: ctx.file().to_string(),
            line: self.line_of(ctx, target),
            is_dynamic: true,
        };
        if let Some(class) = self.codebase.get_class_mut(class_fqsen) {
            class.properties.insert(name.to_string(), property);
        }
        declared.clone()
    }

    fn assign_static_property(&mut self, ctx: &Context, target: &Node, value: UnionType) {
        let Some(class_fqsen) = target
            .child(0)
            .and_then(|class| self.resolve_class_name(ctx, class.name_or_empty()))
        else {
            return;
        };
        let name = target.name_or_empty();
        if !self.codebase.has_class(&class_fqsen) {
            self.emit(
                IssueKind::Undefined,
                ctx,
                target,
                loupe_support::undefined_message("class", &class_fqsen),
            );
            return;
        }
        let Some(property) = self
            .codebase
            .get_class(&class_fqsen)
            .and_then(|class| class.properties.get(name))
            .cloned()
        else {
            self.emit(
                IssueKind::Undefined,
                ctx,
                target,
                loupe_support::undefined_message(
                    "static property",
                    format!("{class_fqsen}::${name}"),
                ),
            );
            return;
        };
        self.check_property_access(ctx, target, &property);
        let declared = property.union_type.resolved_in_class(&class_fqsen);
        if !property.is_dynamic
            && !declared.is_empty()
            && !value.can_cast_to_expanded_union(&declared, self.codebase)
        {
            self.emit(
                IssueKind::TypeMismatch,
                ctx,
                target,
                loupe_support::mismatch_message(
                    &format!("property {class_fqsen}::${name}"),
                    &declared,
                    &value,
                ),
            );
        }
        if let Some(property) = self
            .codebase
            .get_class_mut(&class_fqsen)
            .and_then(|class| class.properties.get_mut(name))
        {
            property.union_type.add_union_type(&value);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::Node;
    use crate::codebase::CodeBase;
    use crate::config::Config;
    use crate::engine::analyze_program;
    use crate::issue::{IssueCollector, IssueKind};

    fn run(root: Node) -> IssueCollector {
        let mut codebase = CodeBase::new();
        let mut issues = IssueCollector::new();
        analyze_program(
            &mut codebase,
            &Config::default(),
            &mut issues,
            &[("test.php".to_string(), root)],
        );
        issues
    }

    #[test]
    fn reassignment_replaces_the_known_type() {
        // $x = 1; $x = "s"; f($x) where f(int): the string must win.
        let root = Node::stmt_list(
            1,
            vec![
                Node::function(
                    "takes_int",
                    vec![Node::param("n", Some("int"), 1)],
                    None,
                    vec![],
                    1,
                ),
                Node::assign(Node::var("x", 2), Node::int(1, 2), 2),
                Node::assign(Node::var("x", 3), Node::string("s", 3), 3),
                Node::call("takes_int", vec![Node::var("x", 4)], 4),
            ],
        );
        let issues = run(root);
        assert_eq!(issues.count_kind(IssueKind::TypeMismatch), 1);
    }

    #[test]
    fn dimension_write_widens_instead_of_replacing() {
        // $x[] = 1; $x[] = "s"; $x stays int[]|string[], so no mismatch
        // arises from the second write.
        let root = Node::stmt_list(
            1,
            vec![
                Node::assign(
                    Node::dim(Node::var("x", 2), None, 2),
                    Node::int(1, 2),
                    2,
                ),
                Node::assign(
                    Node::dim(Node::var("x", 3), None, 3),
                    Node::string("s", 3),
                    3,
                ),
            ],
        );
        let issues = run(root);
        // The first dim write autovivifies $x; nothing is undefined and
        // nothing mismatches.
        assert!(issues.is_empty(), "unexpected: {:?}", issues.issues());
    }
}
