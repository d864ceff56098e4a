//! Call-site argument binding. Alternates are tried in declaration order and
//! a call that satisfies any of them is accepted; only when every alternate
//! rejects are the canonical signature's complaints reported.

use crate::analysis::Analyzer;
use crate::ast::{Node, NodeKind};
use crate::codebase::FunctionLike;
use crate::context::{Context, Parameter, Variable};
use crate::issue::IssueKind;
use crate::types::UnionType;

/// One deferred complaint from matching a signature.
type SignatureError = (IssueKind, u32, String);

impl<'a> Analyzer<'a> {
    /// Checks an argument list against every alternate of a callee and
    /// returns the argument types (positionally, for parameter narrowing).
    pub(crate) fn check_call(
        &mut self,
        ctx: &Context,
        alternates: &[FunctionLike],
        args: Option<&Node>,
        display: &str,
    ) -> Vec<UnionType> {
        let arg_nodes: Vec<&Node> = args
            .map(|list| list.children.iter().collect())
            .unwrap_or_default();
        let canonical = alternates.first();

        let mut arg_types = Vec::with_capacity(arg_nodes.len());
        for (index, arg) in arg_nodes.iter().enumerate() {
            let parameter = canonical.and_then(|function| parameter_at(function, index));
            arg_types.push(self.union_type_of_argument(ctx, arg, parameter));
        }

        let has_spread = arg_nodes.iter().any(|node| node.kind == NodeKind::Spread);
        let mut canonical_errors = Vec::new();
        for (index, alternate) in alternates.iter().enumerate() {
            let errors =
                self.match_signature(ctx, alternate, &arg_nodes, &arg_types, has_spread, display);
            if errors.is_empty() {
                return arg_types;
            }
            if index == 0 {
                canonical_errors = errors;
            }
        }
        for (kind, line, message) in canonical_errors {
            self.issues.emit(kind, ctx.file(), line, message);
        }
        arg_types
    }

    /// Types one argument expression. A variable or property handed to a
    /// by-reference parameter is written by the callee, so an undeclared one
    /// springs into existence (with the parameter's declared type) instead
    /// of being reported.
    fn union_type_of_argument(
        &mut self,
        ctx: &Context,
        node: &Node,
        parameter: Option<&Parameter>,
    ) -> UnionType {
        let by_ref = parameter.is_some_and(|param| param.is_pass_by_reference);
        if by_ref {
            let declared = parameter
                .map(|param| param.union_type.clone())
                .unwrap_or_default();
            match node.kind {
                NodeKind::Var => {
                    let name = node.name_or_empty().to_string();
                    let scope = self.arena.get_mut(ctx.scope());
                    return match scope.get_variable_mut(&name) {
                        Some(variable) => {
                            variable.union_type.add_union_type(&declared);
                            variable.union_type.clone()
                        }
                        None => {
                            scope.add_variable(Variable::new(name, declared.clone()));
                            declared
                        }
                    };
                }
                NodeKind::Prop | NodeKind::StaticProp => {
                    return self.vivify_property_argument(ctx, node, &declared);
                }
                _ => {}
            }
        }
        self.union_type_of(ctx, node)
    }

    /// Matches supplied arguments against one signature, collecting errors
    /// instead of emitting so the caller can fall back to other alternates.
    fn match_signature(
        &self,
        ctx: &Context,
        function: &FunctionLike,
        arg_nodes: &[&Node],
        arg_types: &[UnionType],
        has_spread: bool,
        display: &str,
    ) -> Vec<SignatureError> {
        let mut errors = Vec::new();
        let supplied = arg_nodes.len();
        // An unpacked argument contributes an unknown number of values, so
        // counting is meaningless in both directions.
        if !has_spread {
            let required = function.required_parameter_count();
            let maximum = function.maximum_parameter_count();
            let too_many = maximum.is_some_and(|max| supplied > max);
            if supplied < required || too_many {
                errors.push((
                    IssueKind::ParameterCount,
                    ctx.line(),
                    loupe_support::arity_message(display, required, maximum, supplied),
                ));
            }
        }
        for (index, arg_type) in arg_types.iter().enumerate() {
            if arg_nodes[index].kind == NodeKind::Spread {
                continue;
            }
            let Some(parameter) = parameter_at(function, index) else {
                continue;
            };
            if parameter.union_type.is_empty() {
                continue;
            }
            if !arg_type.can_cast_to_expanded_union(&parameter.union_type, self.codebase) {
                let line = if arg_nodes[index].line > 0 {
                    arg_nodes[index].line
                } else {
                    ctx.line()
                };
                errors.push((
                    IssueKind::TypeMismatch,
                    line,
                    loupe_support::mismatch_message(
                        &format!("argument {} (${}) of '{display}'", index + 1, parameter.name),
                        &parameter.union_type,
                        arg_type,
                    ),
                ));
            }
        }
        errors
    }
}

/// The parameter bound at an argument position; a trailing variadic absorbs
/// every position past the end.
fn parameter_at(function: &FunctionLike, index: usize) -> Option<&Parameter> {
    if let Some(parameter) = function.parameters.get(index) {
        return Some(parameter);
    }
    function
        .parameters
        .last()
        .filter(|parameter| parameter.is_variadic)
}

#[cfg(test)]
mod tests {
    use crate::ast::{Node, NodeKind};
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
    fn too_few_arguments_is_reported_once() {
        let root = Node::stmt_list(
            1,
            vec![
                Node::function(
                    "pair",
                    vec![
                        Node::param("a", Some("int"), 1),
                        Node::param("b", Some("int"), 1),
                    ],
                    None,
                    vec![],
                    1,
                ),
                Node::call("pair", vec![Node::int(1, 2)], 2),
            ],
        );
        let issues = run(root);
        assert_eq!(issues.count_kind(IssueKind::ParameterCount), 1);
    }

    #[test]
    fn by_ref_parameter_autovivifies_its_argument() {
        // sort($list) must not report $list as undefined; it is created by
        // the call.
        let root = Node::stmt_list(
            1,
            vec![
                Node::call("sort", vec![Node::var("list", 2)], 2),
                Node::var("list", 3),
            ],
        );
        let issues = run(root);
        assert_eq!(issues.count_kind(IssueKind::Undefined), 0);
    }

    #[test]
    fn spread_arguments_suppress_the_arity_check() {
        // pair(...$args) supplies an unknown number of values, so neither
        // the minimum nor the maximum count can be enforced.
        let root = Node::stmt_list(
            1,
            vec![
                Node::function(
                    "pair",
                    vec![
                        Node::param("a", Some("int"), 1),
                        Node::param("b", Some("int"), 1),
                    ],
                    None,
                    vec![],
                    1,
                ),
                Node::assign(
                    Node::var("args", 2),
                    Node::new(NodeKind::Array, 2),
                    2,
                ),
                Node::call(
                    "pair",
                    vec![Node::new(NodeKind::Spread, 3)
                        .with_children(vec![Node::var("args", 3)])],
                    3,
                ),
            ],
        );
        let issues = run(root);
        assert_eq!(issues.count_kind(IssueKind::ParameterCount), 0);
    }

    #[test]
    fn variadic_lifts_the_maximum() {
        let root = Node::stmt_list(
            1,
            vec![Node::call(
                "sprintf",
                vec![
                    Node::string("%d %d %d", 2),
                    Node::int(1, 2),
                    Node::int(2, 2),
                    Node::int(3, 2),
                ],
                2,
            )],
        );
        let issues = run(root);
        assert!(issues.is_empty(), "unexpected: {:?}", issues.issues());
    }
}
