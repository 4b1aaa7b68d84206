use pretty_assertions::assert_eq;
use workflow::{
    eval::{builtins::Builtin, NodeState, Token},
    Evaluator, RunStatus, Value,
};

use super::Harness;

#[test]
fn test_literals_complete_without_pending_calls() {
    let cases = [
        ("7", Value::Integer(7)),
        ("2.5", Value::Float(2.5)),
        ("\"text\"", Value::String("text".to_string())),
        ("true", Value::Boolean(true)),
        ("null", Value::Null),
    ];
    for (source, expected) in cases {
        let mut evaluator = Evaluator::from_string(source).unwrap();
        assert_eq!(evaluator.run().unwrap(), RunStatus::Complete(expected));
        assert!(evaluator.registry().is_empty());
    }
}

#[test]
fn test_suspend_then_resume() {
    let mut harness = Harness::new("add(1, 2) * 10");
    assert_eq!(
        harness.evaluator.run().unwrap(),
        RunStatus::Suspended { pending: 1 }
    );
    assert!(!harness.evaluator.is_complete());
    assert!(!harness.evaluator.is_running());

    let request = harness.dispatched().remove(0);
    assert_eq!(request.operation, Builtin::Add);
    assert_eq!(request.callback, "harness");
    assert_eq!(request.arguments, vec![Value::Integer(1), Value::Integer(2)]);

    assert_eq!(
        harness
            .evaluator
            .resolve(&request.token, Value::Integer(3))
            .unwrap(),
        RunStatus::Complete(Value::Integer(30))
    );
    assert_eq!(harness.evaluator.return_value(), Some(&Value::Integer(30)));
}

#[test]
fn test_right_operand_waits_for_left() {
    let mut harness = Harness::new("add(1, 2) + add(3, 4)");
    harness.evaluator.run().unwrap();

    let first = harness.dispatched();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].arguments, vec![Value::Integer(1), Value::Integer(2)]);

    assert_eq!(
        harness
            .evaluator
            .resolve(&first[0].token, Value::Integer(3))
            .unwrap(),
        RunStatus::Suspended { pending: 1 }
    );
    let second = harness.dispatched();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].arguments, vec![Value::Integer(3), Value::Integer(4)]);

    assert_eq!(
        harness
            .evaluator
            .resolve(&second[0].token, Value::Integer(7))
            .unwrap(),
        RunStatus::Complete(Value::Integer(10))
    );
}

#[test]
fn test_call_arguments_resolve_left_to_right() {
    let mut harness = Harness::new("add(echo(1), echo(2))");
    harness.evaluator.run().unwrap();
    let first = harness.dispatched();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].operation, Builtin::Echo);
    assert_eq!(first[0].arguments, vec![Value::Integer(1)]);

    harness
        .evaluator
        .resolve(&first[0].token, Value::Integer(1))
        .unwrap();
    let second = harness.dispatched();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].arguments, vec![Value::Integer(2)]);

    harness
        .evaluator
        .resolve(&second[0].token, Value::Integer(2))
        .unwrap();
    let third = harness.dispatched();
    assert_eq!(third[0].operation, Builtin::Add);
    assert_eq!(third[0].arguments, vec![Value::Integer(1), Value::Integer(2)]);
}

#[test]
fn test_duplicate_resolution_is_noop() {
    let mut harness = Harness::new("echo(1) + echo(2)");
    harness.evaluator.run().unwrap();
    let token = harness.dispatched()[0].token;

    let once = harness.evaluator.resolve(&token, Value::Integer(1)).unwrap();
    let passes = harness.evaluator.passes();
    let dispatched = harness.dispatched().len();

    let twice = harness.evaluator.resolve(&token, Value::Integer(100)).unwrap();
    assert_eq!(once, twice);
    assert_eq!(harness.evaluator.passes(), passes);
    assert!(harness.dispatched().is_empty());
    assert_eq!(dispatched, 1);
    assert_eq!(
        harness.evaluator.registry().get(&token).unwrap().value,
        Some(Value::Integer(1))
    );
}

#[test]
fn test_unknown_token_is_ignored() {
    let mut harness = Harness::new("echo(1)");
    let status = harness.evaluator.run().unwrap();
    let passes = harness.evaluator.passes();

    assert_eq!(
        harness
            .evaluator
            .resolve(&Token::new(), Value::Integer(5))
            .unwrap(),
        status
    );
    assert_eq!(harness.evaluator.passes(), passes);
}

#[test]
fn test_parked_node_is_addressed_by_path() {
    let mut harness = Harness::new("echo(1) + 1");
    harness.evaluator.run().unwrap();
    let token = harness.dispatched()[0].token;

    let entry = harness.evaluator.registry().get(&token).unwrap();
    assert_eq!(entry.path.to_string(), "/0//left");
    assert!(!entry.completed);
    assert_eq!(
        harness.evaluator.state(entry.node),
        Some(&NodeState::Parked(token))
    );
}

#[test]
fn test_completed_subtrees_are_not_redispatched() {
    let mut harness = Harness::new("list(echo(1), 2, echo(3))");
    harness.evaluator.run().unwrap();
    let first = harness.dispatched();
    harness
        .evaluator
        .resolve(&first[0].token, Value::Integer(1))
        .unwrap();
    let second = harness.dispatched();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].arguments, vec![Value::Integer(3)]);

    assert_eq!(
        harness
            .evaluator
            .resolve(&second[0].token, Value::Integer(3))
            .unwrap(),
        RunStatus::Complete(Value::List(vec![
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(3)
        ]))
    );
    assert!(harness.dispatched().is_empty());
}
