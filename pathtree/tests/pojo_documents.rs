use pathtree::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde_json::{Value, json};

/// Identifier-free view of a tree: contents and child order only.
#[derive(Debug, PartialEq)]
enum Shape {
    Node(Option<Predicate>, Vec<Shape>),
    Subtree(Box<Shape>),
}

fn shape(tree: &Tree<ExpressionTree>, id: &NodeId) -> Shape {
    match tree.get_content_at(id).unwrap() {
        NodeContent::Subtree(handle) => {
            let guard = handle.read();
            Shape::Subtree(Box::new(shape(&guard, guard.root_id())))
        }
        content => Shape::Node(
            content.as_value().cloned(),
            tree.get_children_ids_of(id, true)
                .unwrap()
                .iter()
                .map(|child| shape(tree, child))
                .collect(),
        ),
    }
}

fn random_operand(rng: &mut impl Rng) -> Predicate {
    let subject = ["age", "name", "city", "score"][rng.random_range(0..4)];
    let operator = ["$eq", "$gt", "$lt", "$ne"][rng.random_range(0..4)];
    Predicate::operand(subject, operator, rng.random_range(0..100))
}

/// Valid expression tree built only through junction appends, with a few embedded subtrees.
fn random_tree(rng: &mut impl Rng, steps: usize) -> ExpressionTree {
    let mut tree = ExpressionTree::with_root(random_operand(rng));
    for _ in 0..steps {
        let candidates: Vec<NodeId> = tree
            .node_ids()
            .into_iter()
            .filter(|id| !tree.is_subtree(id).unwrap())
            .collect();
        let parent = candidates[rng.random_range(0..candidates.len())].clone();
        let junction = if rng.random_bool(0.5) {
            Predicate::and()
        } else {
            Predicate::or()
        };

        if rng.random_bool(0.1) && !tree.is_root(&parent) && tree.is_leaf(&parent).unwrap() {
            let branch = tree.get_parent_id_of(&parent).unwrap().unwrap();
            let handle = tree.create_subtree_at(&branch).unwrap();
            let mut sub = handle.write();
            let sub_root = sub.root_id().clone();
            sub.replace_content_at(&sub_root, NodeContent::Value(random_operand(rng)))
                .unwrap();
            sub.append_with_junction(&sub_root, junction, random_operand(rng))
                .unwrap();
        } else {
            tree.append_with_junction(&parent, junction, random_operand(rng))
                .unwrap();
        }
    }
    tree
}

#[test]
fn export_then_import_preserves_structure() {
    let mut rng = ChaCha20Rng::seed_from_u64(0x42);
    for _ in 0..20 {
        let tree = random_tree(&mut rng, 30);
        tree.validate_tree().unwrap();
        let document = tree.to_pojo_at(tree.root_id()).unwrap();
        let restored = ExpressionTree::from_pojo(&document).unwrap();

        assert_eq!(
            shape(&restored, restored.root_id()),
            shape(&tree, tree.root_id())
        );
        assert_eq!(restored.count_total_nodes(true), tree.count_total_nodes(true));
    }
}

#[test]
fn json_round_trip_through_text() {
    let mut rng = ChaCha20Rng::seed_from_u64(7);
    let tree = random_tree(&mut rng, 15);
    let text = tree.to_json_at(tree.root_id()).unwrap().to_string();
    let restored = ExpressionTree::from_json_str(&text).unwrap();
    assert_eq!(
        shape(&restored, restored.root_id()),
        shape(&tree, tree.root_id())
    );
}

#[test]
fn export_of_inner_branch_is_rooted_there() {
    let mut tree = ExpressionTree::with_root(Predicate::or());
    let root = tree.root_id().clone();
    tree.append_child(&root, NodeContent::Value(Predicate::operand("x", "$eq", 1)))
        .unwrap();
    let branch = tree
        .append_child(&root, NodeContent::Value(Predicate::and()))
        .unwrap();
    tree.append_child(&branch, NodeContent::Value(Predicate::operand("y", "$eq", 2)))
        .unwrap();
    tree.append_child(&branch, NodeContent::Value(Predicate::operand("z", "$eq", 3)))
        .unwrap();

    let document = tree.to_pojo_at(&branch).unwrap();
    assert_eq!(document.len(), 3);
    assert_eq!(document[branch.as_str()].parent_id, branch.as_str());

    let copy = ExpressionTree::from_pojo(&document).unwrap();
    assert_eq!(copy.root_id(), &branch);
    assert_eq!(shape(&copy, copy.root_id()), shape(&tree, &branch));
}

#[test]
fn reference_document_is_imported_and_reexported() {
    let source = json!({
        "_root_": { "parentId": "_root_", "nodeContent": { "operator": "$or" } },
        "_root_:0": { "parentId": "_root_", "nodeContent": { "subject": "x", "op": "$eq", "value": 1 } },
        "_root_:1": { "parentId": "_root_", "nodeContent": { "subject": "y", "op": "$eq", "value": 2 } }
    });
    let tree = ExpressionTree::from_json_str(&source.to_string()).unwrap();
    let root = tree.root_id().clone();
    assert_eq!(root.as_str(), "_root_");
    assert!(tree.is_branch(&root).unwrap());
    assert_eq!(tree.get_children_ids_of(&root, true).unwrap().len(), 2);

    let exported = tree.to_json_at(&root).unwrap();
    let entries = exported.as_object().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries["_root_"]["nodeContent"], json!({ "operator": "$or" }));
    let mut subjects: Vec<&Value> = entries
        .values()
        .filter(|entry| entry["parentId"] == "_root_" && entry["nodeContent"].get("subject").is_some())
        .map(|entry| &entry["nodeContent"]["subject"])
        .collect();
    subjects.sort_by_key(|subject| subject.as_str().map(str::to_string));
    assert_eq!(subjects, vec![&json!("x"), &json!("y")]);

    let again = ExpressionTree::from_json_str(&exported.to_string()).unwrap();
    assert_eq!(shape(&again, again.root_id()), shape(&tree, &root));
}

#[test]
fn dangling_parent_is_an_orphan() {
    let source = json!({
        "a": { "parentId": "a", "nodeContent": {} },
        "b": { "parentId": "z", "nodeContent": {} }
    });
    let err = Tree::<GenericTree<Value>>::from_json_str(&source.to_string()).unwrap_err();
    assert!(err.kind().is_malformed_document());
    assert!(err.is_orphan_nodes());
}

#[test]
fn two_self_parented_entries_are_rejected() {
    let source = json!({
        "a": { "parentId": "a", "nodeContent": {} },
        "b": { "parentId": "b", "nodeContent": {} }
    });
    let err = Tree::<GenericTree<Value>>::from_json_str(&source.to_string()).unwrap_err();
    assert!(err.kind().is_malformed_document());
    assert!(err.is_multiple_roots());
}

#[test]
fn malformed_json_is_a_serialization_error() {
    let err = ExpressionTree::from_json_str("{ not json").unwrap_err();
    assert!(err.kind().is_serialization());
}

#[test]
fn export_transform_is_applied() {
    let mut tree = GenericTree::new(Some(1u32));
    let root = tree.root_id().clone();
    tree.append_child(&root, NodeContent::Value(2)).unwrap();
    tree.append_child(&root, NodeContent::Empty).unwrap();

    let document = tree
        .to_pojo_at_with(&root, |payload| payload.map_or(0, |value| value * 10))
        .unwrap();
    let mut contents: Vec<u32> = document.values().map(|entry| entry.node_content).collect();
    contents.sort();
    assert_eq!(contents, vec![0, 10, 20]);

    let restored = Tree::<GenericTree<u32>>::from_pojo_with(&document, |content| {
        (*content != 0).then_some(content / 10)
    })
    .unwrap();
    assert_eq!(restored.get_payload_at(&root).unwrap(), Some(&1));
    assert_eq!(restored.len(), 3);
}
