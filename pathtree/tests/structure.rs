use std::collections::HashSet;

use pathtree::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Every identifier reachable from `tree`, embedded interiors included. Boundaries are
/// counted once, as they share their identifier with the embedded root.
fn all_ids<K: TreeKind>(tree: &Tree<K>, out: &mut Vec<NodeId>) {
    for id in tree.node_ids() {
        match tree.get_subtree_at(&id).unwrap() {
            Some(handle) => {
                let guard = handle.read();
                all_ids(guard.tree(), out);
            }
            None => out.push(id),
        }
    }
}

fn assert_connected<K: TreeKind>(tree: &Tree<K>) {
    for id in tree.node_ids() {
        if !tree.is_root(&id) {
            let parent = id.parent().unwrap();
            assert!(tree.contains(&parent), "`{}` has no parent in the tree", id);
        }
    }
}

fn random_pick(rng: &mut impl Rng, ids: &[NodeId]) -> NodeId {
    ids[rng.random_range(0..ids.len())].clone()
}

#[test]
fn identifiers_stay_unique_under_random_edits() {
    let mut rng = ChaCha20Rng::seed_from_u64(0x42);
    let mut tree = GenericTree::new(Some(0u32));
    let mut expected_len = 1usize;
    let mut embedded = Vec::new();

    for step in 0..400u32 {
        let ids = tree.node_ids();
        let editable: Vec<NodeId> = ids
            .iter()
            .filter(|id| !tree.is_subtree(id).unwrap())
            .cloned()
            .collect();

        match rng.random_range(0..10) {
            0..=3 => {
                let parent = random_pick(&mut rng, &editable);
                tree.append_child(&parent, NodeContent::Value(step)).unwrap();
                expected_len += 1;
            }
            4 | 5 => {
                let source = random_pick(&mut rng, &ids);
                let target = random_pick(&mut rng, &editable);
                if tree.is_root(&source) || target == source || target.is_descendant_of(&source) {
                    assert!(tree.move_subtree(&source, &target).is_err());
                } else {
                    let mapping = tree.move_subtree(&source, &target).unwrap();
                    assert!(mapping.values().all(|id| tree.contains(id)));
                }
            }
            6 => {
                let copy = tree.deep_clone();
                let branch = random_pick(&mut rng, &ids);
                let target = random_pick(&mut rng, &editable);
                let mapping = tree.append_tree_at(&target, &copy, Some(&branch)).unwrap();
                assert!(mapping[&branch].is_child_of(&target));
                expected_len += mapping.len();
            }
            7 if ids.len() > 8 => {
                let victim = random_pick(&mut rng, &ids);
                if !tree.is_root(&victim) {
                    expected_len -= tree.remove_at(&victim).unwrap().len();
                }
            }
            8 => {
                let parent = random_pick(&mut rng, &editable);
                embedded.push(tree.create_subtree_at(&parent).unwrap());
                expected_len += 1;
            }
            _ => {
                if let Some(handle) = embedded.last() {
                    let mut sub = handle.write();
                    let parents = sub.node_ids();
                    let parent = random_pick(&mut rng, &parents);
                    sub.append_child(&parent, NodeContent::Value(step)).unwrap();
                }
            }
        }

        assert_eq!(tree.len(), expected_len);
        assert_connected(tree.tree());
        let mut ids = Vec::new();
        all_ids(tree.tree(), &mut ids);
        let unique: HashSet<&NodeId> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len(), "duplicate identifier after step {}", step);
    }
}

#[test]
fn removals_never_leave_single_child_branches() {
    let mut rng = ChaCha20Rng::seed_from_u64(0x1234);
    for _ in 0..10 {
        let mut tree = ExpressionTree::with_root(Predicate::operand("n", "$eq", 0));
        for value in 1..40 {
            let ids = tree.node_ids();
            let parent = random_pick(&mut rng, &ids);
            let junction = if rng.random_bool(0.5) {
                Predicate::and()
            } else {
                Predicate::or()
            };
            tree.append_with_junction(&parent, junction, Predicate::operand("n", "$eq", value))
                .unwrap();
        }
        tree.validate_tree().unwrap();

        while tree.len() > 1 {
            let ids = tree.node_ids();
            let victim = random_pick(&mut rng, &ids[1..]);
            let removal = tree.remove_at(&victim).unwrap();
            assert!(removal.removed.contains(&victim));
            assert!(removal.relocated.values().all(|id| tree.contains(id)));
            tree.validate_tree().unwrap();
        }
        assert!(tree.get_payload_at(tree.root_id()).unwrap().unwrap().is_operand());
    }
}

#[test]
fn promoted_leaf_keeps_its_content_first() {
    let leaf_content = Predicate::operand("age", "$gt", 10);
    let new_content = Predicate::operand("age", "$lt", 20);
    let mut tree = ExpressionTree::with_root(Predicate::or());
    let root = tree.root_id().clone();
    let leaf = tree
        .append_child(&root, NodeContent::Value(leaf_content.clone()))
        .unwrap();
    tree.append_child(&root, NodeContent::Value(Predicate::operand("x", "$eq", 1)))
        .unwrap();

    let outcome = tree
        .append_with_junction(&leaf, Predicate::and(), new_content.clone())
        .unwrap();
    assert!(outcome.is_new_branch);
    assert!(tree.is_branch(&leaf).unwrap());
    assert_eq!(tree.get_payload_at(&leaf).unwrap(), Some(&Predicate::and()));

    let children: Vec<Predicate> = tree
        .get_children_ids_of(&leaf, true)
        .unwrap()
        .iter()
        .map(|id| tree.get_payload_at(id).unwrap().unwrap().clone())
        .collect();
    assert_eq!(children, vec![leaf_content, new_content]);
}

#[test]
fn embedded_tree_is_the_stored_instance() {
    let mut tree = ExpressionTree::with_root(Predicate::and());
    let root = tree.root_id().clone();
    tree.append_child(&root, NodeContent::Value(Predicate::operand("x", "$eq", 1)))
        .unwrap();
    let handle = tree.create_subtree_at(&root).unwrap();

    let stored = tree.get_content_at(&handle.root_id()).unwrap();
    assert_eq!(stored.as_subtree(), Some(&handle));
    assert!(stored.as_subtree().unwrap().ptr_eq(&handle));
    assert!(handle.read().id_generator().shares_counter_with(tree.id_generator()));

    let inner_child = {
        let mut sub = handle.write();
        let sub_root = sub.root_id().clone();
        sub.replace_content_at(&sub_root, NodeContent::Value(Predicate::or()))
            .unwrap();
        sub.append_child(&sub_root, NodeContent::Value(Predicate::operand("y", "$eq", 2)))
            .unwrap()
    };
    // The interior lives in the embedded dictionary only.
    assert!(!tree.contains(&inner_child));
    assert!(
        !tree
            .get_descendant_ids_of(&root, true)
            .unwrap()
            .contains(&inner_child)
    );
    assert_eq!(tree.count_total_nodes(false), 3);
    assert_eq!(tree.count_total_nodes(true), 4);

    // Moving the boundary re-roots the embedded tree and keeps the same instance.
    let target = tree
        .append_child(&root, NodeContent::Value(Predicate::operand("z", "$eq", 3)))
        .unwrap();
    let mapping = tree.move_subtree(&handle.root_id(), &target).unwrap();
    let moved = mapping.values().next().unwrap();
    assert_eq!(&handle.root_id(), moved);
    assert_eq!(tree.get_subtree_at(moved).unwrap(), Some(handle.clone()));
    assert!(handle.read().contains(&inner_child.rebase(&inner_child.parent().unwrap(), moved).unwrap()));
}

#[test]
fn config_drives_new_trees() {
    let config = TreeConfig::from_toml_str(
        r#"
        root_node_id = "query"
        default_junction = "$or"
        "#,
    )
    .unwrap();
    let mut target = ExpressionTree::with_config(&config);
    assert_eq!(target.root_id().as_str(), "query");
    let root = target.root_id().clone();
    target
        .replace_content_at(&root, NodeContent::Value(Predicate::operand("a", "$eq", 1)))
        .unwrap();

    let source = ExpressionTree::with_root(Predicate::operand("b", "$eq", 2));
    let graft = target.append_tree_at(&root, &source, None).unwrap();
    assert!(graft.promoted.is_some());
    assert_eq!(target.get_payload_at(&root).unwrap(), Some(&Predicate::or()));
    assert!(graft.grafted[source.root_id()].as_str().starts_with("query:"));
}
