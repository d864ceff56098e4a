//! Batch driver: seeds the builtin tables, runs the declaration pass over
//! every file, settles duplicates and hierarchies, then analyzes file by
//! file. A class whose parent or trait never turned up aborts analysis of
//! its declaring file only; the rest of the batch proceeds.

use std::collections::HashSet;

use crate::analysis;
use crate::ast::Node;
use crate::builtins;
use crate::codebase::CodeBase;
use crate::config::Config;
use crate::declaration::DeclarationPass;
use crate::issue::{IssueCollector, IssueKind};

pub fn analyze_program(
    codebase: &mut CodeBase,
    config: &Config,
    issues: &mut IssueCollector,
    files: &[(String, Node)],
) {
    builtins::seed(codebase);

    for (file, root) in files {
        DeclarationPass::new(codebase, issues, config, file).scan(root);
    }
    codebase.analyze_duplicate_classes(issues);
    codebase.analyze_duplicate_functions(issues);

    let mut skipped: HashSet<String> = HashSet::new();
    for fqsen in codebase.class_fqsens() {
        let Some((file, line)) = codebase
            .get_class(&fqsen)
            .map(|class| (class.file.clone(), class.line))
        else {
            continue;
        };
        if let Err(error) = codebase.import_ancestors(&fqsen, issues) {
            issues.emit(IssueKind::Undefined, &file, line, error.to_string());
            skipped.insert(file);
        }
    }

    for (file, root) in files {
        if skipped.contains(file) {
            continue;
        }
        analysis::analyze_file(codebase, config, issues, file, root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Node, NodeKind};

    #[test]
    fn missing_parent_aborts_only_the_declaring_file() {
        let orphan = Node::stmt_list(
            1,
            vec![Node::new(NodeKind::Class, 1)
                .with_name("Orphan")
                .with_children(vec![
                    Node::name_ref("Ghost", 1),
                    Node::new(NodeKind::NameList, 1),
                    Node::new(NodeKind::NameList, 1),
                    Node::stmt_list(1, vec![]),
                ])],
        );
        // The second file has its own problem that must still be reported.
        let other = Node::stmt_list(1, vec![Node::var("nope", 2)]);

        let mut codebase = CodeBase::new();
        let mut issues = IssueCollector::new();
        analyze_program(
            &mut codebase,
            &Config::default(),
            &mut issues,
            &[
                ("orphan.php".to_string(), orphan),
                ("other.php".to_string(), other),
            ],
        );
        let sorted = issues.into_sorted();
        assert!(sorted
            .iter()
            .any(|issue| issue.file == "orphan.php" && issue.message.contains("Ghost")));
        assert!(sorted
            .iter()
            .any(|issue| issue.file == "other.php" && issue.message.contains("$nope")));
    }

    #[test]
    fn interfaces_are_optional_ancestors() {
        let root = Node::stmt_list(
            1,
            vec![Node::new(NodeKind::Class, 1)
                .with_name("Impl")
                .with_children(vec![
                    Node::missing(),
                    Node::new(NodeKind::NameList, 1)
                        .with_children(vec![Node::name_ref("UnknownIface", 1)]),
                    Node::new(NodeKind::NameList, 1),
                    Node::stmt_list(1, vec![]),
                ])],
        );
        let mut codebase = CodeBase::new();
        let mut issues = IssueCollector::new();
        analyze_program(
            &mut codebase,
            &Config::default(),
            &mut issues,
            &[("impl.php".to_string(), root)],
        );
        assert_eq!(issues.count_kind(IssueKind::Undefined), 1);
    }
}
