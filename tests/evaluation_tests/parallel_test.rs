use pretty_assertions::assert_eq;
use workflow::{preprocessor::RewriteError, Evaluator, RunStatus, Value, WorkflowError};

use super::Harness;

#[test]
fn test_all_waits_for_every_argument() {
    let mut harness = Harness::new("all(add(1, 2), mul(3, 4))");
    assert_eq!(
        harness.evaluator.run().unwrap(),
        RunStatus::Suspended { pending: 2 }
    );
    let requests = harness.dispatched();
    assert_eq!(requests.len(), 2);

    assert_eq!(
        harness
            .evaluator
            .resolve(&requests[1].token, Value::Integer(12))
            .unwrap(),
        RunStatus::Suspended { pending: 1 }
    );
    assert_eq!(
        harness
            .evaluator
            .resolve(&requests[0].token, Value::Integer(3))
            .unwrap(),
        RunStatus::Complete(Value::List(vec![Value::Integer(3), Value::Integer(12)]))
    );
}

#[test]
fn test_any_takes_first_result() {
    let mut harness = Harness::new("any(add(1, 3), add(4, 5))");
    harness.evaluator.run().unwrap();
    let requests = harness.dispatched();
    assert_eq!(requests.len(), 2);

    assert_eq!(
        harness
            .evaluator
            .resolve(&requests[1].token, Value::Integer(9))
            .unwrap(),
        RunStatus::Complete(Value::Integer(9))
    );

    // The slower result is recorded but changes nothing.
    assert_eq!(
        harness
            .evaluator
            .resolve(&requests[0].token, Value::Integer(4))
            .unwrap(),
        RunStatus::Complete(Value::Integer(9))
    );
    let entry = harness.evaluator.registry().get(&requests[0].token).unwrap();
    assert!(entry.completed);
    assert_eq!(entry.value, Some(Value::Integer(4)));
}

#[test]
fn test_parallel_inside_sequence() {
    let mut harness = Harness::new("any(echo(1), echo(2)) + echo(10)");
    harness.evaluator.run().unwrap();
    let parallel = harness.dispatched();
    assert_eq!(parallel.len(), 2);

    harness
        .evaluator
        .resolve(&parallel[0].token, Value::Integer(1))
        .unwrap();
    let right = harness.dispatched();
    assert_eq!(right.len(), 1);
    assert_eq!(right[0].arguments, vec![Value::Integer(10)]);

    // A late parallel result does not disturb the pending right operand.
    assert_eq!(
        harness
            .evaluator
            .resolve(&parallel[1].token, Value::Integer(2))
            .unwrap(),
        RunStatus::Suspended { pending: 1 }
    );
    assert_eq!(
        harness
            .evaluator
            .resolve(&right[0].token, Value::Integer(10))
            .unwrap(),
        RunStatus::Complete(Value::Integer(11))
    );
}

#[test]
fn test_nested_parallel() {
    let mut harness = Harness::new("all(any(echo(1), echo(2)), 3)");
    harness.evaluator.run().unwrap();
    let requests = harness.dispatched();
    assert_eq!(
        harness
            .evaluator
            .resolve(&requests[1].token, Value::Integer(2))
            .unwrap(),
        RunStatus::Complete(Value::List(vec![Value::Integer(2), Value::Integer(3)]))
    );
}

#[test]
fn test_parallel_rejects_keywords() {
    assert!(matches!(
        Evaluator::from_string("all(echo(1), x=2)"),
        Err(WorkflowError::Rewrite(RewriteError::UnsupportedArguments { .. }))
    ));
}
