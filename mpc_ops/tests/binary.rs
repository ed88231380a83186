use mpc_ops::{
    binary::{ArithmeticKind, LEFT, OUT, RIGHT},
    config::{ProtocolKind, SessionConfig},
    exec_node::{ExecNode, ExecNodeBuilder, TensorRef, TensorStatus},
    get_operator,
    harness::{feed_inputs_as_private, feed_inputs_as_public, feed_inputs_as_secret, NamedTensor},
    session::{make_sessions, ExecContext},
    verify::{expect_tensor_eq, reveal_secret, SECRET_ATOL},
    DataType, OpAsyncRunner, OpError, Tensor,
};

use TensorStatus::*;

const PROTOCOLS: [ProtocolKind; 2] = [ProtocolKind::Spdz, ProtocolKind::SemiHonest];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Clone, Debug)]
struct Operand {
    tensor: Tensor,
    status: TensorStatus,
}

fn operand(tensor: impl Into<Tensor>, status: TensorStatus) -> Operand {
    Operand {
        tensor: tensor.into(),
        status,
    }
}

fn output_dtype(kind: ArithmeticKind, lhs: &Tensor, rhs: &Tensor) -> DataType {
    let both_int = lhs.dtype().is_integer() && rhs.dtype().is_integer();
    if both_int && kind != ArithmeticKind::Div {
        DataType::Int64
    } else {
        DataType::Float64
    }
}

fn binary_node(kind: ArithmeticKind, op_type: &str, lhs: &Operand, rhs: &Operand) -> ExecNode {
    let secure = lhs.status == Secret || rhs.status == Secret;
    let out_status = if secure { Secret } else { Private };
    ExecNodeBuilder::new(op_type)
        .node_name(format!("{}-test", kind.op_type()))
        .add_input(LEFT, vec![TensorRef::new("x", lhs.tensor.dtype(), lhs.status)])
        .add_input(RIGHT, vec![TensorRef::new("y", rhs.tensor.dtype(), rhs.status)])
        .add_output(
            OUT,
            vec![TensorRef::new(
                "z",
                output_dtype(kind, &lhs.tensor, &rhs.tensor),
                out_status,
            )],
        )
        .build()
}

/// Sessions of both parties with inputs placed according to their statuses.
fn prepare(
    protocol: ProtocolKind,
    node: &ExecNode,
    lhs: &Operand,
    rhs: &Operand,
) -> Result<Vec<ExecContext>, OpError> {
    let mut ctxs: Vec<_> = make_sessions(&SessionConfig::two_party(protocol))
        .into_iter()
        .map(|session| ExecContext::new(node.clone(), session))
        .collect();

    for (name, input) in [("x", lhs), ("y", rhs)] {
        let inputs = [NamedTensor::new(name, input.tensor.clone())];
        match input.status {
            Private => feed_inputs_as_private(&mut ctxs[0], &inputs),
            Public => feed_inputs_as_public(&mut ctxs, &inputs),
            Secret => feed_inputs_as_secret(&mut ctxs, &inputs)?,
        }
    }
    Ok(ctxs)
}

/// Start every party, then wait for all of them.
fn run_parties(ops: &[ArithmeticKind], ctxs: Vec<ExecContext>) -> Vec<Result<ExecContext, OpError>> {
    let mut runners: Vec<_> = ops
        .iter()
        .map(|kind| OpAsyncRunner::new(get_operator(kind.op_type()).unwrap()))
        .collect();
    let mut results: Vec<Option<Result<ExecContext, OpError>>> = Vec::new();
    for (runner, ctx) in runners.iter_mut().zip(ctxs) {
        results.push(runner.start(ctx).err().map(Err));
    }
    runners
        .iter_mut()
        .zip(results)
        .map(|(runner, started)| started.unwrap_or_else(|| runner.wait()))
        .collect()
}

/// Run binary operator and return its output, revealed if it is secret.
fn run_binary(
    protocol: ProtocolKind,
    kind: ArithmeticKind,
    lhs: &Operand,
    rhs: &Operand,
) -> Result<Tensor, OpError> {
    let node = binary_node(kind, kind.op_type(), lhs, rhs);
    let mut ctxs = prepare(protocol, &node, lhs, rhs)?;

    if lhs.status == Secret || rhs.status == Secret {
        let ctxs = run_parties(&[kind, kind], ctxs)
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;
        reveal_secret(&ctxs, "z")
    } else {
        let ctx = ctxs.swap_remove(0);
        let ctx = run_parties(&[kind], vec![ctx]).remove(0)?;
        ctx.session()
            .table()
            .get_tensor("z")
            .cloned()
            .ok_or_else(|| OpError::TensorNotFound("z".into()))
    }
}

struct Case {
    kind: ArithmeticKind,
    lhs: Operand,
    rhs: Operand,
    expected: Tensor,
}

fn check_cases(cases: &[Case]) {
    init_tracing();
    for protocol in PROTOCOLS {
        for case in cases {
            let secure = case.lhs.status == Secret || case.rhs.status == Secret;
            let actual = run_binary(protocol, case.kind, &case.lhs, &case.rhs).unwrap_or_else(|err| {
                panic!("{:?} {:?} failed: {}", protocol, case.kind, err)
            });
            let atol = if secure { Some(SECRET_ATOL) } else { None };
            if let Err(mismatch) = expect_tensor_eq(&case.expected, &actual, atol) {
                panic!("{:?} {:?}:\n{}", protocol, case.kind, mismatch);
            }
        }
    }
}

#[test]
fn test_add() {
    check_cases(&[
        Case {
            kind: ArithmeticKind::Add,
            lhs: operand(vec![1i64, 2, 3], Secret),
            rhs: operand(vec![10i64, 20, 30], Secret),
            expected: Tensor::from(vec![11i64, 22, 33]),
        },
        Case {
            kind: ArithmeticKind::Add,
            lhs: operand(vec![1i64, 2, 3], Private),
            rhs: operand(vec![10i64, 20, 30], Public),
            expected: Tensor::from(vec![11i64, 22, 33]),
        },
        Case {
            kind: ArithmeticKind::Add,
            lhs: operand(vec![1.5, -2.25], Public),
            rhs: operand(vec![1i64, 2], Secret),
            expected: Tensor::from(vec![2.5, -0.25]),
        },
        Case {
            kind: ArithmeticKind::Add,
            lhs: operand(vec![1_000_000i64, 3_000_000_000, -(1 << 40)], Secret),
            rhs: operand(vec![1i64, -5, 1 << 39], Secret),
            expected: Tensor::from(vec![1_000_001i64, 2_999_999_995, -(1 << 39)]),
        },
        Case {
            kind: ArithmeticKind::Add,
            lhs: operand(vec![i64::MAX - 1, i64::MIN + 1], Secret),
            rhs: operand(vec![1i64, -1], Public),
            expected: Tensor::from(vec![i64::MAX, i64::MIN]),
        },
    ]);
}

#[test]
fn test_minus_and_mul() {
    check_cases(&[
        Case {
            kind: ArithmeticKind::Minus,
            lhs: operand(vec![1.5, 0.0, -3.0], Secret),
            rhs: operand(vec![0.5, 2.0, 4.0], Secret),
            expected: Tensor::from(vec![1.0, -2.0, -7.0]),
        },
        Case {
            kind: ArithmeticKind::Minus,
            lhs: operand(vec![1.5, 0.0, -3.0], Private),
            rhs: operand(vec![0.5, 2.0, 4.0], Private),
            expected: Tensor::from(vec![1.0, -2.0, -7.0]),
        },
        Case {
            kind: ArithmeticKind::Mul,
            lhs: operand(vec![1.5, -2.0, 0.1], Secret),
            rhs: operand(vec![2.0, 3.5, 10.0], Public),
            expected: Tensor::from(vec![3.0, -7.0, 1.0]),
        },
        Case {
            kind: ArithmeticKind::Mul,
            lhs: operand(vec![-3i64, 7], Secret),
            rhs: operand(vec![4i64, 6], Secret),
            expected: Tensor::from(vec![-12i64, 42]),
        },
        Case {
            kind: ArithmeticKind::Mul,
            lhs: operand(vec![-3i64, 7], Public),
            rhs: operand(vec![4i64, 6], Private),
            expected: Tensor::from(vec![-12i64, 42]),
        },
    ]);
}

#[test]
fn test_div_widens_integers() {
    let expected = Tensor::from(vec![0.5, 1.0]);
    check_cases(&[
        Case {
            kind: ArithmeticKind::Div,
            lhs: operand(vec![1i64, 3], Public),
            rhs: operand(vec![2i64, 3], Public),
            expected: expected.clone(),
        },
        Case {
            kind: ArithmeticKind::Div,
            lhs: operand(vec![1i64, 3], Secret),
            rhs: operand(vec![2i64, 3], Secret),
            expected,
        },
        Case {
            kind: ArithmeticKind::Div,
            lhs: operand(vec![-1.0, 7.5], Secret),
            rhs: operand(vec![4i64, 2], Public),
            expected: Tensor::from(vec![-0.25, 3.75]),
        },
    ]);
}

#[test]
fn test_int_div_truncates_towards_zero() {
    check_cases(&[
        Case {
            kind: ArithmeticKind::IntDiv,
            lhs: operand(vec![1i64, 3], Public),
            rhs: operand(vec![2i64, 3], Public),
            expected: Tensor::from(vec![0i64, 1]),
        },
        Case {
            kind: ArithmeticKind::IntDiv,
            lhs: operand(vec![1i64, 3], Secret),
            rhs: operand(vec![2i64, 3], Secret),
            expected: Tensor::from(vec![0i64, 1]),
        },
        Case {
            kind: ArithmeticKind::IntDiv,
            lhs: operand(vec![-7i64, 7], Private),
            rhs: operand(vec![2i64, -2], Public),
            expected: Tensor::from(vec![-3i64, -3]),
        },
        Case {
            kind: ArithmeticKind::IntDiv,
            lhs: operand(vec![-7i64, 7], Secret),
            rhs: operand(vec![2i64, -2], Secret),
            expected: Tensor::from(vec![-3i64, -3]),
        },
    ]);
}

#[test]
fn test_status_independence() {
    init_tracing();
    let lhs = Tensor::from(vec![0.75, -4.5, 12.0]);
    let rhs = Tensor::from(vec![3i64, 2, -5]);
    for kind in [
        ArithmeticKind::Add,
        ArithmeticKind::Minus,
        ArithmeticKind::Mul,
        ArithmeticKind::Div,
        ArithmeticKind::IntDiv,
    ] {
        let plain = run_binary(
            ProtocolKind::Spdz,
            kind,
            &operand(lhs.clone(), Private),
            &operand(rhs.clone(), Public),
        )
        .unwrap();
        for protocol in PROTOCOLS {
            let secure = run_binary(
                protocol,
                kind,
                &operand(lhs.clone(), Secret),
                &operand(rhs.clone(), Secret),
            )
            .unwrap();
            expect_tensor_eq(&plain, &secure, Some(SECRET_ATOL)).unwrap();
        }
    }
}

#[test]
fn test_mod_fails_on_both_paths() {
    init_tracing();
    for protocol in PROTOCOLS {
        for (lhs, rhs) in [
            (vec![5i64, 7], vec![2i64, 3]),
            (Vec::new(), Vec::new()),
        ] {
            for status in [Secret, Public] {
                let result = run_binary(
                    protocol,
                    ArithmeticKind::Mod,
                    &operand(lhs.clone(), status),
                    &operand(rhs.clone(), status),
                );
                assert!(
                    matches!(result, Err(OpError::Unimplemented { op_type: "Mod" })),
                    "{:?}",
                    result
                );
            }
        }
    }
}

#[test]
fn test_mod_fails_before_reading_inputs() {
    init_tracing();
    let empty = ExecNodeBuilder::new("Mod").node_name("Mod-empty").build();
    let lhs = operand(vec![5i64, 7], Secret);
    let rhs = operand(vec![2i64, 3], Secret);
    // Inputs are declared but never fed.
    let unfed = binary_node(ArithmeticKind::Mod, "Mod", &lhs, &rhs);

    for node in [empty, unfed] {
        let ctx = ExecContext::new(node, make_sessions(&SessionConfig::default()).remove(0));
        let result = run_parties(&[ArithmeticKind::Mod], vec![ctx]).remove(0);
        assert!(
            matches!(result, Err(OpError::Unimplemented { op_type: "Mod" })),
            "{:?}",
            result.err()
        );
    }
}

#[test]
fn test_plain_kernel_error() {
    let result = run_binary(
        ProtocolKind::Spdz,
        ArithmeticKind::IntDiv,
        &operand(vec![1i64], Private),
        &operand(vec![0i64], Public),
    );
    match result {
        Err(err @ OpError::Kernel { .. }) => assert_eq!(
            err.to_string(),
            "IntDiv: caught error while invoking divide function: Invalid: divide by zero"
        ),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_failing_party_fails_peer() {
    init_tracing();
    for protocol in PROTOCOLS {
        let lhs = operand(vec![1i64, 2], Secret);
        let rhs = operand(vec![3i64, 4], Secret);
        let node = binary_node(ArithmeticKind::Mul, "Mul", &lhs, &rhs);
        let ctxs = prepare(protocol, &node, &lhs, &rhs).unwrap();

        // The second party runs a different operator on the same node.
        let mut results = run_parties(&[ArithmeticKind::Mul, ArithmeticKind::Mod], ctxs);
        assert!(matches!(results.remove(0), Err(OpError::Protocol(_))));
        assert!(matches!(results.remove(0), Err(OpError::InvalidNode(_))));
    }
}

#[test]
fn test_invalid_nodes() {
    let lhs = operand(vec![1i64], Secret);
    let rhs = operand(vec![2i64], Private);
    assert!(matches!(
        run_binary(ProtocolKind::Spdz, ArithmeticKind::Add, &lhs, &rhs),
        Err(OpError::UnsupportedStatus(_))
    ));

    let strings = Operand {
        tensor: Tensor::String(vec!["a".to_string()].into()),
        status: Public,
    };
    assert!(matches!(
        run_binary(ProtocolKind::Spdz, ArithmeticKind::Add, &strings, &strings),
        Err(OpError::InvalidDataType { op_type: "Add", .. })
    ));

    let out_of_range = operand(vec![1e15], Secret);
    assert!(matches!(
        run_binary(ProtocolKind::Spdz, ArithmeticKind::Add, &out_of_range, &out_of_range),
        Err(OpError::Numeric(_))
    ));
}

#[test]
fn test_registry() {
    for kind in ArithmeticKind::ALL {
        assert_eq!(get_operator(kind.op_type()).unwrap().op_type(), kind.op_type());
    }
    assert!(get_operator("Modulo").is_none());
}
