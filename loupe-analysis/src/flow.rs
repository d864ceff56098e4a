//! Control-flow merge engine: combines the variable state of mutually
//! exclusive branches into one conservative scope.

use crate::context::{Scope, ScopeArena, ScopeId, Variable};

/// Merges the scopes produced by each branch of a conditional.
///
/// A variable survives iff it is present in every branch; its merged type is
/// the intersection of its per-branch types, since after the conditional we
/// only know what held on every path. Callers include the pre-conditional scope
/// as an implicit branch when no `else`/`default` makes the branching
/// exhaustive. A single eligible branch passes through unchanged.
pub fn merge_branch_scopes(arena: &mut ScopeArena, branches: &[ScopeId]) -> ScopeId {
    match branches {
        [] => arena.new_scope(),
        [only] => *only,
        [first, rest @ ..] => {
            let mut merged = Scope::new();
            for variable in arena.get(*first).variables() {
                let mut union_type = variable.union_type.clone();
                let everywhere = rest.iter().all(|branch| {
                    match arena.get(*branch).get_variable(&variable.name) {
                        Some(other) => {
                            union_type = union_type.intersection(&other.union_type);
                            true
                        }
                        None => false,
                    }
                });
                if everywhere {
                    merged.add_variable(Variable::new(variable.name.clone(), union_type));
                }
            }
            arena.insert_scope(merged)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Type, UnionType};

    fn scope_with(arena: &mut ScopeArena, vars: &[(&str, UnionType)]) -> ScopeId {
        let id = arena.new_scope();
        for (name, union) in vars {
            arena
                .get_mut(id)
                .add_variable(Variable::new(*name, union.clone()));
        }
        id
    }

    #[test]
    fn merge_intersects_types_and_drops_partial_variables() {
        let mut arena = ScopeArena::new();
        let left = scope_with(
            &mut arena,
            &[
                ("x", UnionType::from_type(Type::Int)),
                ("only_left", UnionType::from_type(Type::Bool)),
            ],
        );
        let right = scope_with(
            &mut arena,
            &[("x", UnionType::from_types([Type::Int, Type::String]))],
        );

        let merged = merge_branch_scopes(&mut arena, &[left, right]);
        let scope = arena.get(merged);
        assert_eq!(
            scope.get_variable("x").unwrap().union_type,
            UnionType::from_type(Type::Int)
        );
        assert!(scope.get_variable("only_left").is_none());
    }

    #[test]
    fn single_branch_passes_through() {
        let mut arena = ScopeArena::new();
        let only = scope_with(&mut arena, &[("x", UnionType::from_type(Type::Int))]);
        assert_eq!(merge_branch_scopes(&mut arena, &[only]), only);
    }
}
