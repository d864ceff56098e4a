//! End-to-end scenarios: build a syntax tree, run the full two-pass
//! analysis, and assert on the issues that come out.

use loupe_analysis::ast::{flags, Node, NodeKind};
use loupe_analysis::{
    analyze_program, CodeBase, Config, Fqsen, Issue, IssueCollector, IssueKind, Type,
};

fn analyze_capturing(config: Config, root: Node) -> (Vec<Issue>, CodeBase) {
    let mut codebase = CodeBase::new();
    let mut issues = IssueCollector::new();
    analyze_program(
        &mut codebase,
        &config,
        &mut issues,
        &[("test.php".to_string(), root)],
    );
    (issues.into_sorted(), codebase)
}

fn analyze_with(config: Config, root: Node) -> Vec<Issue> {
    analyze_capturing(config, root).0
}

fn analyze(root: Node) -> Vec<Issue> {
    analyze_with(Config::default(), root)
}

fn count(issues: &[Issue], kind: IssueKind) -> usize {
    issues.iter().filter(|issue| issue.kind == kind).count()
}

fn class_node(name: &str, extends: Option<&str>, members: Vec<Node>, line: u32) -> Node {
    Node::new(NodeKind::Class, line).with_name(name).with_children(vec![
        extends
            .map(|parent| Node::name_ref(parent, line))
            .unwrap_or_else(Node::missing),
        Node::new(NodeKind::NameList, line),
        Node::new(NodeKind::NameList, line),
        Node::stmt_list(line, members),
    ])
}

fn method_node(
    name: &str,
    bits: u32,
    params: Vec<Node>,
    return_anno: Option<&str>,
    body: Vec<Node>,
    line: u32,
) -> Node {
    Node::new(NodeKind::Method, line)
        .with_name(name)
        .with_flags(bits)
        .with_children(vec![
            Node::new(NodeKind::ParamList, line).with_children(params),
            return_anno
                .map(|raw| Node::new(NodeKind::TypeAnno, line).with_name(raw))
                .unwrap_or_else(Node::missing),
            Node::stmt_list(line, body),
        ])
}

fn property_node(bits: u32, type_anno: Option<&str>, name: &str, line: u32) -> Node {
    Node::new(NodeKind::PropertyGroup, line)
        .with_flags(bits)
        .with_children(vec![
            type_anno
                .map(|raw| Node::new(NodeKind::TypeAnno, line).with_name(raw))
                .unwrap_or_else(Node::missing),
            Node::new(NodeKind::PropertyElem, line)
                .with_name(name)
                .with_children(vec![Node::missing()]),
        ])
}

fn array_of(values: Vec<Node>, line: u32) -> Node {
    let elems = values
        .into_iter()
        .map(|value| {
            Node::new(NodeKind::ArrayElem, line).with_children(vec![value, Node::missing()])
        })
        .collect();
    Node::new(NodeKind::Array, line).with_children(elems)
}

// ---------------------------------------------------------------------
// Undefined references
// ---------------------------------------------------------------------

#[test]
fn undefined_variable_and_function() {
    let root = Node::stmt_list(
        1,
        vec![
            Node::var("ghost", 2),
            Node::call("vanished", vec![], 3),
        ],
    );
    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::Undefined), 2);
    assert!(issues[0].message.contains("$ghost"));
    assert!(issues[1].message.contains("vanished"));
}

#[test]
fn forward_references_are_fine() {
    // Call first, declare after: the declaration pass finished before any
    // analysis started.
    let root = Node::stmt_list(
        1,
        vec![
            Node::call("later", vec![], 2),
            Node::function("later", vec![], None, vec![], 3),
        ],
    );
    assert!(analyze(root).is_empty());
}

#[test]
fn undefined_class_constant() {
    let root = Node::stmt_list(
        1,
        vec![
            class_node(
                "Limits",
                None,
                vec![Node::new(NodeKind::ClassConstGroup, 2).with_children(vec![
                    Node::new(NodeKind::ClassConstElem, 2)
                        .with_name("MAX")
                        .with_children(vec![Node::int(10, 2)]),
                ])],
                2,
            ),
            Node::new(NodeKind::ClassConst, 3)
                .with_name("MAX")
                .with_children(vec![Node::name_ref("Limits", 3)]),
            Node::new(NodeKind::ClassConst, 4)
                .with_name("MIN")
                .with_children(vec![Node::name_ref("Limits", 4)]),
        ],
    );
    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::Undefined), 1);
    assert!(issues[0].message.contains("MIN"));
}

// ---------------------------------------------------------------------
// Flow merging
// ---------------------------------------------------------------------

#[test]
fn variable_set_in_one_branch_is_dropped_at_the_join() {
    let root = Node::stmt_list(
        1,
        vec![
            Node::if_stmt(
                vec![(
                    Some(Node::bool(true, 2)),
                    vec![Node::assign(Node::var("y", 3), Node::int(1, 3), 3)],
                )],
                2,
            ),
            Node::var("y", 5),
        ],
    );
    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::Undefined), 1);
    assert!(issues[0].message.contains("$y"));
}

#[test]
fn variable_set_in_every_branch_survives_the_join() {
    let root = Node::stmt_list(
        1,
        vec![
            Node::if_stmt(
                vec![
                    (
                        Some(Node::bool(true, 2)),
                        vec![Node::assign(Node::var("z", 3), Node::int(1, 3), 3)],
                    ),
                    (
                        None,
                        vec![Node::assign(Node::var("z", 4), Node::int(2, 4), 4)],
                    ),
                ],
                2,
            ),
            Node::var("z", 6),
        ],
    );
    assert!(analyze(root).is_empty());
}

#[test]
fn conflicting_branch_types_mean_no_information_not_an_error() {
    // $x becomes string in one arm and float in the other; the intersection
    // is empty, and an empty union passes every check.
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
            Node::if_stmt(
                vec![
                    (
                        Some(Node::bool(true, 3)),
                        vec![Node::assign(Node::var("x", 4), Node::string("s", 4), 4)],
                    ),
                    (
                        None,
                        vec![Node::assign(Node::var("x", 5), Node::float(2.5, 5), 5)],
                    ),
                ],
                3,
            ),
            Node::call("takes_int", vec![Node::var("x", 7)], 7),
        ],
    );
    assert!(analyze(root).is_empty());
}

#[test]
fn foreach_binds_the_element_type_and_drops_it_after() {
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
            Node::assign(
                Node::var("nums", 2),
                array_of(vec![Node::int(1, 2), Node::int(2, 2)], 2),
                2,
            ),
            Node::new(NodeKind::Foreach, 3).with_children(vec![
                Node::var("nums", 3),
                Node::var("v", 3),
                Node::missing(),
                Node::stmt_list(
                    3,
                    vec![Node::call("takes_int", vec![Node::var("v", 4)], 4)],
                ),
            ]),
            Node::var("v", 6),
        ],
    );
    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::TypeMismatch), 0);
    // The loop may run zero times, so $v does not survive it.
    assert_eq!(count(&issues, IssueKind::Undefined), 1);
}

// ---------------------------------------------------------------------
// Declared types
// ---------------------------------------------------------------------

#[test]
fn return_type_is_checked_against_returns() {
    let root = Node::stmt_list(
        1,
        vec![Node::function(
            "answer",
            vec![],
            Some("int"),
            vec![Node::ret(Some(Node::string("forty-two", 2)), 2)],
            1,
        )],
    );
    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::TypeMismatch), 1);
    assert!(issues[0].message.contains("return type"));
}

#[test]
fn doc_comment_parameter_types_bind_like_declared_ones() {
    let root = Node::stmt_list(
        1,
        vec![
            Node::function(
                "halve",
                vec![Node::param("n", None, 1)],
                None,
                vec![],
                1,
            )
            .with_doc("/** @param int $n */"),
            Node::call("halve", vec![Node::string("s", 2)], 2),
        ],
    );
    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::TypeMismatch), 1);
}

#[test]
fn subclasses_satisfy_parent_parameter_types() {
    let root = Node::stmt_list(
        1,
        vec![
            class_node("Base", None, vec![], 1),
            class_node("Child", Some("Base"), vec![], 2),
            Node::function(
                "wants",
                vec![Node::param("b", Some("Base"), 3)],
                None,
                vec![],
                3,
            ),
            Node::call("wants", vec![Node::new_object("Child", vec![], 4)], 4),
            Node::call("wants", vec![Node::int(1, 5)], 5),
        ],
    );
    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::TypeMismatch), 1);
    assert_eq!(issues[0].line, 5);
}

#[test]
fn property_write_is_checked_but_still_recorded() {
    let root = Node::stmt_list(
        1,
        vec![
            class_node(
                "Counter",
                None,
                vec![property_node(flags::PUBLIC, Some("int"), "n", 2)],
                2,
            ),
            Node::assign(
                Node::var("c", 3),
                Node::new_object("Counter", vec![], 3),
                3,
            ),
            Node::assign(
                Node::prop(Node::var("c", 4), "n", 4),
                Node::string("oops", 4),
                4,
            ),
        ],
    );
    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::TypeMismatch), 1);
    assert_eq!(count(&issues, IssueKind::Undefined), 0);
}

#[test]
fn mismatched_property_write_still_grows_the_inferred_type() {
    let root = Node::stmt_list(
        1,
        vec![
            class_node(
                "Counter",
                None,
                vec![property_node(flags::PUBLIC, Some("int"), "n", 2)],
                2,
            ),
            Node::assign(
                Node::prop(Node::new_object("Counter", vec![], 3), "n", 3),
                Node::string("oops", 3),
                3,
            ),
        ],
    );
    let (issues, codebase) = analyze_capturing(Config::default(), root);
    assert_eq!(count(&issues, IssueKind::TypeMismatch), 1);
    // The complaint is recorded, but so is the write: later reads of ->n see
    // int|string.
    let counter = codebase
        .get_class(&Fqsen::from_full_name("Counter"))
        .unwrap();
    let property = &counter.properties["n"];
    assert!(property.union_type.has_type(&Type::Int));
    assert!(property.union_type.has_type(&Type::String));
}

#[test]
fn by_ref_arguments_autovivify_properties_too() {
    // preg_match("p", "s", $b->m) writes $b->m through the by-ref third
    // parameter; the missing property springs into existence with the
    // parameter's type instead of being reported.
    let root = Node::stmt_list(
        1,
        vec![
            class_node("Box", None, vec![], 1),
            Node::assign(Node::var("b", 2), Node::new_object("Box", vec![], 2), 2),
            Node::call(
                "preg_match",
                vec![
                    Node::string("p", 3),
                    Node::string("s", 3),
                    Node::prop(Node::var("b", 3), "m", 3),
                ],
                3,
            ),
        ],
    );
    let (issues, codebase) = analyze_capturing(Config::default(), root);
    assert_eq!(count(&issues, IssueKind::Undefined), 0);
    let class = codebase.get_class(&Fqsen::from_full_name("Box")).unwrap();
    assert!(class.properties.contains_key("m"));
}

#[test]
fn static_property_writes_are_checked_and_recorded() {
    let root = Node::stmt_list(
        1,
        vec![
            class_node(
                "Cfg",
                None,
                vec![property_node(
                    flags::PUBLIC | flags::STATIC,
                    Some("int"),
                    "limit",
                    2,
                )],
                2,
            ),
            Node::assign(
                Node::new(NodeKind::StaticProp, 3)
                    .with_name("limit")
                    .with_children(vec![Node::name_ref("Cfg", 3)]),
                Node::string("ten", 3),
                3,
            ),
        ],
    );
    let (issues, codebase) = analyze_capturing(Config::default(), root);
    assert_eq!(count(&issues, IssueKind::TypeMismatch), 1);
    // The write is recorded despite the complaint.
    let class = codebase.get_class(&Fqsen::from_full_name("Cfg")).unwrap();
    assert!(class.properties["limit"].union_type.has_type(&Type::String));
}

#[test]
fn list_destructure_binds_each_target_to_the_element_type() {
    // [$a, $b] = ["x", "y"]; both targets come out as string.
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
            Node::assign(
                Node::new(NodeKind::List, 2)
                    .with_children(vec![Node::var("a", 2), Node::var("b", 2)]),
                array_of(vec![Node::string("x", 2), Node::string("y", 2)], 2),
                2,
            ),
            Node::call("takes_int", vec![Node::var("a", 3)], 3),
        ],
    );
    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::Undefined), 0);
    assert_eq!(count(&issues, IssueKind::TypeMismatch), 1);
}

#[test]
fn undeclared_property_write_is_reported_unless_configured() {
    let write = |line| {
        Node::stmt_list(
            1,
            vec![
                class_node("Bag", None, vec![], 1),
                Node::assign(
                    Node::prop(Node::new_object("Bag", vec![], line), "extra", line),
                    Node::int(1, line),
                    line,
                ),
            ],
        )
    };
    let issues = analyze(write(2));
    assert_eq!(count(&issues, IssueKind::Undefined), 1);

    let permissive = Config {
        allow_undeclared_property_write: true,
        ..Config::default()
    };
    let issues = analyze_with(permissive, write(2));
    assert_eq!(count(&issues, IssueKind::Undefined), 0);
}

// ---------------------------------------------------------------------
// Methods, visibility, staticness
// ---------------------------------------------------------------------

#[test]
fn inherited_methods_resolve_and_their_return_type_flows() {
    let root = Node::stmt_list(
        1,
        vec![
            class_node(
                "Greeter",
                None,
                vec![method_node(
                    "greet",
                    flags::PUBLIC,
                    vec![],
                    Some("string"),
                    vec![Node::ret(Some(Node::string("hi", 2)), 2)],
                    2,
                )],
                1,
            ),
            class_node("Polite", Some("Greeter"), vec![], 3),
            Node::function(
                "takes_int",
                vec![Node::param("n", Some("int"), 4)],
                None,
                vec![],
                4,
            ),
            Node::call(
                "takes_int",
                vec![Node::method_call(
                    Node::new_object("Polite", vec![], 5),
                    "greet",
                    vec![],
                    5,
                )],
                5,
            ),
        ],
    );
    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::Undefined), 0);
    // string return value handed to an int parameter
    assert_eq!(count(&issues, IssueKind::TypeMismatch), 1);
}

#[test]
fn private_properties_are_invisible_outside_their_class() {
    let root = Node::stmt_list(
        1,
        vec![
            class_node(
                "Vault",
                None,
                vec![
                    property_node(flags::PRIVATE, Some("int"), "secret", 2),
                    method_node(
                        "peek",
                        flags::PUBLIC,
                        vec![],
                        Some("int"),
                        vec![Node::ret(
                            Some(Node::prop(Node::var("this", 3), "secret", 3)),
                            3,
                        )],
                        3,
                    ),
                ],
                1,
            ),
            Node::prop(Node::new_object("Vault", vec![], 5), "secret", 5),
        ],
    );
    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::Access), 1);
    assert_eq!(count(&issues, IssueKind::Undefined), 0);
}

#[test]
fn staticness_mismatches_are_flagged_both_ways() {
    let root = Node::stmt_list(
        1,
        vec![
            class_node(
                "Svc",
                None,
                vec![
                    method_node("make", flags::PUBLIC | flags::STATIC, vec![], None, vec![], 2),
                    method_node("run", flags::PUBLIC, vec![], None, vec![], 3),
                ],
                1,
            ),
            Node::method_call(Node::new_object("Svc", vec![], 5), "make", vec![], 5),
            Node::static_call("Svc", "run", vec![], 6),
        ],
    );
    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::StaticMisuse), 2);
}

#[test]
fn unknown_method_is_reported_once() {
    let root = Node::stmt_list(
        1,
        vec![
            class_node("Empty_", None, vec![], 1),
            Node::method_call(Node::new_object("Empty_", vec![], 2), "nope", vec![], 2),
        ],
    );
    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::Undefined), 1);
    assert!(issues[0].message.contains("nope"));
}

#[test]
fn constructing_an_undeclared_class_is_reported() {
    let root = Node::stmt_list(1, vec![Node::new_object("Phantom", vec![], 2)]);
    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::Undefined), 1);
}

#[test]
fn default_constructor_takes_no_arguments() {
    let root = Node::stmt_list(
        1,
        vec![
            class_node("Plain", None, vec![], 1),
            Node::new_object("Plain", vec![Node::int(1, 2)], 2),
        ],
    );
    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::ParameterCount), 1);
}

// ---------------------------------------------------------------------
// Deprecation, availability, dead code
// ---------------------------------------------------------------------

#[test]
fn deprecated_functions_warn_at_call_sites() {
    let root = Node::stmt_list(
        1,
        vec![
            Node::function("old", vec![], None, vec![], 1).with_flags(flags::DEPRECATED),
            Node::call("old", vec![], 2),
        ],
    );
    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::Deprecated), 1);
}

#[test]
fn builtins_carry_a_minimum_version() {
    let root = Node::stmt_list(
        1,
        vec![Node::call(
            "str_contains",
            vec![Node::string("haystack", 2), Node::string("needle", 2)],
            2,
        )],
    );
    let old_target = Config {
        target_version: "7.4".to_string(),
        ..Config::default()
    };
    let issues = analyze_with(old_target, root.clone());
    assert_eq!(count(&issues, IssueKind::Availability), 1);

    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::Availability), 0);
}

#[test]
fn dead_code_detection_flags_bare_literals() {
    let root = Node::stmt_list(
        1,
        vec![
            Node::int(42, 2),
            Node::assign(Node::var("x", 3), Node::int(1, 3), 3),
        ],
    );
    assert_eq!(count(&analyze(root.clone()), IssueKind::NoOp), 0);

    let config = Config {
        dead_code_detection: true,
        ..Config::default()
    };
    assert_eq!(count(&analyze_with(config, root), IssueKind::NoOp), 1);
}

// ---------------------------------------------------------------------
// Call-site re-analysis
// ---------------------------------------------------------------------

#[test]
fn untyped_callees_are_revisited_with_concrete_argument_types() {
    // double() declares no parameter types, so its body passes on the first
    // visit; the call with a string narrows $x and the second visit finds
    // the bad arithmetic.
    let root = Node::stmt_list(
        1,
        vec![
            Node::function(
                "double",
                vec![Node::param("x", None, 1)],
                None,
                vec![Node::ret(
                    Some(Node::binary_op("*", Node::var("x", 2), Node::int(2, 2), 2)),
                    2,
                )],
                1,
            ),
            Node::call("double", vec![Node::string("s", 3)], 3),
        ],
    );
    let issues = analyze(root.clone());
    assert_eq!(count(&issues, IssueKind::TypeMismatch), 1);

    // Quick mode skips re-analysis entirely.
    let quick = Config {
        quick_mode: true,
        ..Config::default()
    };
    let issues = analyze_with(quick, root);
    assert_eq!(count(&issues, IssueKind::TypeMismatch), 0);
}

// ---------------------------------------------------------------------
// Redefinitions
// ---------------------------------------------------------------------

#[test]
fn duplicate_user_functions_are_reported() {
    let root = Node::stmt_list(
        1,
        vec![
            Node::function("dup", vec![], None, vec![], 1),
            Node::function("dup", vec![], None, vec![], 5),
        ],
    );
    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::Redefinition), 1);
    assert_eq!(issues[0].line, 5);
    assert!(issues[0].message.contains("test.php:1"));
}

#[test]
fn conditional_shims_over_builtins_stay_silent() {
    // if (...) { function str_contains(...) {...} }, the polyfill pattern.
    let root = Node::stmt_list(
        1,
        vec![Node::if_stmt(
            vec![(
                Some(Node::bool(true, 2)),
                vec![Node::function(
                    "str_contains",
                    vec![
                        Node::param("h", Some("string"), 3),
                        Node::param("n", Some("string"), 3),
                    ],
                    Some("bool"),
                    vec![Node::ret(Some(Node::bool(true, 4)), 4)],
                    3,
                )],
            )],
            2,
        )],
    );
    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::Redefinition), 0);
}

#[test]
fn a_call_matching_any_alternate_signature_passes_arity() {
    // Two conditional declarations of pick(): the canonical takes two ints,
    // the alternate takes one. A one-argument call satisfies the alternate;
    // a zero-argument call satisfies neither and reports the canonical's
    // requirement.
    let conditionally = |function: Node, line| {
        Node::if_stmt(vec![(Some(Node::bool(true, line)), vec![function])], line)
    };
    let declarations = vec![
        conditionally(
            Node::function(
                "pick",
                vec![
                    Node::param("a", Some("int"), 2),
                    Node::param("b", Some("int"), 2),
                ],
                None,
                vec![],
                2,
            ),
            2,
        ),
        conditionally(
            Node::function("pick", vec![Node::param("a", Some("int"), 4)], None, vec![], 4),
            4,
        ),
    ];

    let mut accepted = declarations.clone();
    accepted.push(Node::call("pick", vec![Node::int(1, 6)], 6));
    let issues = analyze(Node::stmt_list(1, accepted));
    assert_eq!(count(&issues, IssueKind::ParameterCount), 0);
    assert_eq!(count(&issues, IssueKind::Redefinition), 0);

    let mut rejected = declarations;
    rejected.push(Node::call("pick", vec![], 6));
    let issues = analyze(Node::stmt_list(1, rejected));
    assert_eq!(count(&issues, IssueKind::ParameterCount), 1);
    assert!(issues
        .iter()
        .any(|issue| issue.message.contains("expected at least 2")));
}

#[test]
fn unconditional_builtin_redefinition_is_reported() {
    let root = Node::stmt_list(
        1,
        vec![Node::function("count", vec![], None, vec![], 2)],
    );
    let issues = analyze(root);
    assert_eq!(count(&issues, IssueKind::Redefinition), 1);
    assert!(issues[0].message.contains("internal"));
}
