//! Error surface: every failure names what went wrong and where.

use crate::{compile, CompileError, Node, Opcode::*, ReshapeError, Transform};

#[test]
fn duplicate_label() {
    let err = compile(vec![
        Node::jumpdest("x"),
        Node::SetDepth(0),
        Node::jumpdest("x"),
        Node::SetDepth(0),
    ])
    .unwrap_err();
    assert_eq!(err, CompileError::DuplicateLabel { name: "x".into() });

    // A JumpDest and a Label share the namespace.
    let err = compile(vec![Node::jumpdest("x"), Node::SetDepth(0), Node::label("x")]).unwrap_err();
    assert_eq!(err, CompileError::DuplicateLabel { name: "x".into() });
}

#[test]
fn undefined_label() {
    let err = compile(vec![Node::push_label("ghost")]).unwrap_err();
    assert_eq!(err, CompileError::UndefinedLabel { name: "ghost".into() });

    let err = compile(vec![
        Node::label("a"),
        Node::push_size("a", "ghost"),
    ])
    .unwrap_err();
    assert_eq!(err, CompileError::UndefinedLabel { name: "ghost".into() });
}

#[test]
fn depth_mismatch_carries_the_node_index() {
    let err = compile(vec![PC.into(), Node::ExpectDepth(2)]).unwrap_err();
    assert_eq!(err, CompileError::DepthMismatch { expected: 2, got: 1, node_index: 1 });
}

#[test]
fn stack_underflow() {
    let err = compile(vec![ADD.into()]).unwrap_err();
    assert_eq!(err, CompileError::StackUnderflow { need: 2, have: 0, node_index: 0 });

    // The failing instruction sits inside a flattened Fn.
    let err = compile(vec![Node::Fn(vec![MSTORE.into(), PUSH0.into()]), ADD.into()]).unwrap_err();
    assert_eq!(err, CompileError::StackUnderflow { need: 2, have: 1, node_index: 1 });
}

#[test]
fn stack_overflow() {
    let err = compile(vec![Node::SetDepth(1024), PC.into()]).unwrap_err();
    assert_eq!(err, CompileError::StackOverflow { depth: 1025, node_index: 1 });

    let err = compile(vec![Node::SetDepth(1025)]).unwrap_err();
    assert_eq!(err, CompileError::StackOverflow { depth: 1025, node_index: 0 });
}

#[test]
fn jumpdest_requires_set_depth() {
    let err = compile(vec![Node::jumpdest("x"), GAS.into()]).unwrap_err();
    assert_eq!(err, CompileError::MissingSetDepthAfterJumpDest { node_index: 1 });

    // An assertion in between is fine; the requirement stays pending.
    let ok = compile(vec![
        Node::jumpdest("x"),
        Node::ExpectDepth(0),
        Node::SetDepth(0),
        GAS.into(),
    ]);
    assert!(ok.is_ok());
}

#[test]
fn inversion_of_non_dup_swap() {
    let err = compile(vec![PC.into(), Node::Inverted(ADD)]).unwrap_err();
    assert_eq!(err, CompileError::InvalidInversion { op: ADD, depth: 1, node_index: 1 });
}

#[test]
fn inversion_below_the_stack() {
    // DUP1 needs at least one tracked value.
    let err = compile(vec![Node::Inverted(DUP1)]).unwrap_err();
    assert_eq!(err, CompileError::InvalidInversion { op: DUP1, depth: 0, node_index: 0 });

    // A SWAP needs one more: with a single value there is nothing to swap
    // with.
    let err = compile(vec![PC.into(), Node::Inverted(SWAP1)]).unwrap_err();
    assert_eq!(err, CompileError::InvalidInversion { op: SWAP1, depth: 1, node_index: 1 });

    // DUP3 from the bottom of a two-value stack reaches below it.
    let err = compile(vec![PC.into(), PC.into(), Node::Inverted(DUP3)]).unwrap_err();
    assert_eq!(err, CompileError::InvalidInversion { op: DUP3, depth: 2, node_index: 2 });
}

#[test]
fn bad_reshape_propagates_the_reason() {
    let err = compile(vec![
        PC.into(),
        PC.into(),
        Node::Reshape(Transform::permute([0, 0])),
    ])
    .unwrap_err();
    assert_eq!(
        err,
        CompileError::BadReshape {
            source: ReshapeError::DuplicateIndex { index: 0 },
            node_index: 2,
        },
    );
}

#[test]
fn reshape_must_fit_the_tracked_stack() {
    // The solver's ops are depth-checked like any other instruction:
    // clearing three slots with only two tracked values underflows on the
    // last POP.
    let err = compile(vec![
        PC.into(),
        PC.into(),
        Node::Reshape(Transform::transform(3, [])),
    ])
    .unwrap_err();
    assert_eq!(err, CompileError::StackUnderflow { need: 1, have: 0, node_index: 2 });
}

#[test]
fn reshape_updates_the_tracked_depth() {
    let ok = compile(vec![
        PC.into(),
        PC.into(),
        PC.into(),
        Node::Reshape(Transform::transform(3, [0])),
        Node::ExpectDepth(1),
    ]);
    assert!(ok.is_ok(), "{ok:?}");
}

#[test]
fn size_overflow() {
    let err = compile(vec![
        Node::label("a"),
        Node::Raw(vec![0; 70_000]),
        Node::label("b"),
        Node::push_size("a", "b"),
    ])
    .unwrap_err();
    assert_eq!(
        err,
        CompileError::SizeOverflow { between: ("a".into(), "b".into()), diff: 70_000 },
    );
}

#[test]
fn oversized_label_group_cannot_be_pushed() {
    // Seventeen two-byte entries exceed a 32-byte stack word.
    let mut code: Vec<Node> = vec![Node::Raw(vec![0; 300])];
    let names: Vec<String> = (0..17).map(|i| format!("L{i}")).collect();
    for name in &names {
        code.push(Node::label(name.clone()));
        code.push(Node::Raw(vec![0]));
    }
    code.push(Node::push_labels(names));

    let err = compile(code).unwrap_err();
    assert!(matches!(err, CompileError::BadPush { .. }), "{err}");
}

#[test]
fn errors_render_with_context() {
    let err = compile(vec![ADD.into()]).unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("[0]"), "{rendered}");
    assert!(rendered.contains("popping 2"), "{rendered}");
}
