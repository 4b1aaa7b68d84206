use proptest::{collection::vec, option, prelude::*};
use workflow::{
    ast::{NodeId, Tree},
    parser::parse,
    path::{NodePath, PathError},
    preprocessor::Preprocessor,
};

fn identifier() -> impl Strategy<Value = String> {
    // Never spells `any`, `all` or a keyword literal.
    "[b-z][a-z]{0,2}"
}

fn expression() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        (0i64..1000).prop_map(|n| n.to_string()),
        identifier(),
        Just("\"s\"".to_string()),
    ];
    leaf.prop_recursive(4, 48, 4, |inner| {
        prop_oneof![
            (
                inner.clone(),
                prop_oneof![Just('+'), Just('-'), Just('*'), Just('/')],
                inner.clone()
            )
                .prop_map(|(left, op, right)| format!("({} {} {})", left, op, right)),
            (
                identifier(),
                vec(inner.clone(), 0..3),
                vec(inner.clone(), 0..3),
                option::of(inner.clone()),
                option::of(inner.clone())
            )
                .prop_map(|(function, args, keywords, starargs, kwargs)| {
                    let mut parts = args;
                    parts.extend(
                        keywords
                            .into_iter()
                            .enumerate()
                            .map(|(i, value)| format!("k{}={}", i, value)),
                    );
                    parts.extend(starargs.map(|value| format!("*{}", value)));
                    parts.extend(kwargs.map(|value| format!("**{}", value)));
                    format!("{}({})", function, parts.join(", "))
                }),
            (
                prop_oneof![Just("any"), Just("all")],
                vec(inner.clone(), 0..3)
            )
                .prop_map(|(function, args)| format!("{}({})", function, args.join(", "))),
        ]
    })
}

fn program() -> impl Strategy<Value = String> {
    vec(expression(), 1..3).prop_map(|statements| statements.join("\n"))
}

fn tree_of(source: &str) -> Tree {
    let mut tree = parse(source).unwrap();
    Preprocessor::new().process(&mut tree).unwrap();
    tree
}

/// Every reachable node with the path derived for it by appending from the root.
fn derived_paths(tree: &Tree) -> Vec<(NodeId, NodePath)> {
    let mut found = Vec::new();
    let mut stack = vec![(tree.root(), NodePath::root())];
    while let Some((node, path)) = stack.pop() {
        for child in tree.children(node) {
            let child_path = path.append(tree, child).unwrap();
            stack.push((child, child_path));
        }
        found.push((node, path));
    }
    found
}

proptest! {
    #[test]
    fn rendered_paths_resolve_to_the_same_node(source in program()) {
        let tree = tree_of(&source);
        let paths = derived_paths(&tree);
        prop_assert_eq!(paths.len(), tree.reachable().len());
        for (node, path) in paths {
            let reparsed: NodePath = path.to_string().parse().unwrap();
            prop_assert_eq!(&reparsed, &path);
            prop_assert_eq!(reparsed.resolve(&tree).unwrap(), node);
        }
    }

    #[test]
    fn append_resolves_to_the_child(source in program()) {
        let tree = tree_of(&source);
        for (node, path) in derived_paths(&tree) {
            let fresh: NodePath = path.to_string().parse().unwrap();
            for child in tree.children(node) {
                let appended = fresh.append(&tree, child).unwrap();
                let uncached: NodePath = appended.to_string().parse().unwrap();
                prop_assert_eq!(uncached.resolve(&tree).unwrap(), child);
            }
        }
    }

    #[test]
    fn paths_compare_by_rendering_across_trees(source in program()) {
        let first = tree_of(&source);
        let second = tree_of(&source);
        let left = derived_paths(&first);
        let right = derived_paths(&second);
        for ((_, a), (_, b)) in left.iter().zip(right.iter()) {
            prop_assert_eq!(a, b);
        }
    }
}

#[test]
fn test_append_rejects_grandchild() {
    let tree = tree_of("add(1, 2)");
    let call: NodePath = "/0/".parse().unwrap();
    let literal: NodePath = "/0//args:0".parse().unwrap();
    let literal = literal.resolve(&tree).unwrap();
    assert!(call.resolve(&tree).is_ok());
    assert!(matches!(
        NodePath::root().append(&tree, literal),
        Err(PathError::NotAChild { .. })
    ));
}

#[test]
fn test_paths_through_rewritten_arguments() {
    let before = parse("any(echo(1), echo(2))").unwrap();
    let path: NodePath = "/0//args:1".parse().unwrap();
    let id = path.resolve(&before).unwrap();

    let mut after = before.clone();
    Preprocessor::new().process(&mut after).unwrap();
    let fresh: NodePath = "/0//args:1".parse().unwrap();
    assert_eq!(fresh.resolve(&after).unwrap(), id);
    assert_eq!(path.resolve(&after).unwrap(), id);
}
