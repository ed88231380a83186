use std::{error::Error, fs, time::Instant};

use argh::FromArgs;
use mpc_ops::{
    binary::{LEFT, OUT, RIGHT},
    config::SessionConfig,
    exec_node::{ExecNodeBuilder, TensorRef, TensorStatus},
    get_operator,
    harness::{feed_inputs_as_private, feed_inputs_as_public, feed_inputs_as_secret, NamedTensor},
    session::{make_sessions, ExecContext},
    verify::reveal_secret,
    DataType, OpAsyncRunner, OpError, Tensor,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Run binary arithmetic operator between in-process parties.
#[derive(FromArgs, Debug)]
struct Options {
    /// operator type: Add, Minus, Mul, Div, IntDiv or Mod
    #[argh(option)]
    op: String,

    /// path to JSON array with left operand
    #[argh(option)]
    left: String,

    /// path to JSON array with right operand
    #[argh(option)]
    right: String,

    /// element type of left operand
    #[argh(option, default = "DataType::Int64")]
    left_dtype: DataType,

    /// element type of right operand
    #[argh(option, default = "DataType::Int64")]
    right_dtype: DataType,

    /// status of left operand: public, private or secret
    #[argh(option, default = "TensorStatus::Secret")]
    left_status: TensorStatus,

    /// status of right operand: public, private or secret
    #[argh(option, default = "TensorStatus::Secret")]
    right_status: TensorStatus,

    /// path to session configuration file
    #[argh(option)]
    config: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let options: Options = argh::from_env();
    let config = match &options.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };

    let lhs = Tensor::from_json(options.left_dtype, &fs::read_to_string(&options.left)?)?;
    let rhs = Tensor::from_json(options.right_dtype, &fs::read_to_string(&options.right)?)?;

    let statuses = [options.left_status, options.right_status];
    let secure = statuses.contains(&TensorStatus::Secret);
    let out_status = if secure {
        TensorStatus::Secret
    } else {
        TensorStatus::Private
    };
    let out_dtype = if lhs.dtype().is_integer() && rhs.dtype().is_integer() && options.op != "Div" {
        DataType::Int64
    } else {
        DataType::Float64
    };

    let node = ExecNodeBuilder::new(&options.op)
        .add_input(LEFT, vec![TensorRef::new("left", lhs.dtype(), options.left_status)])
        .add_input(RIGHT, vec![TensorRef::new("right", rhs.dtype(), options.right_status)])
        .add_output(OUT, vec![TensorRef::new("out", out_dtype, out_status)])
        .build();

    let mut ctxs: Vec<_> = make_sessions(&config)
        .into_iter()
        .map(|session| ExecContext::new(node.clone(), session))
        .collect();

    for (input, status) in [
        (NamedTensor::new("left", lhs), options.left_status),
        (NamedTensor::new("right", rhs), options.right_status),
    ] {
        let inputs = [input];
        match status {
            TensorStatus::Private => feed_inputs_as_private(&mut ctxs[0], &inputs),
            TensorStatus::Public => feed_inputs_as_public(&mut ctxs, &inputs),
            TensorStatus::Secret => feed_inputs_as_secret(&mut ctxs, &inputs)?,
        }
    }

    if !secure {
        ctxs.truncate(1);
    }

    info!(op = %options.op, parties = ctxs.len(), secure, "Running operator");
    let start_time = Instant::now();

    let mut runners = Vec::with_capacity(ctxs.len());
    for ctx in ctxs {
        let op = get_operator(&options.op).ok_or_else(|| OpError::UnknownOperator(options.op.clone()))?;
        let mut runner = OpAsyncRunner::new(op);
        runner.start(ctx)?;
        runners.push(runner);
    }
    let results: Vec<_> = runners.iter_mut().map(OpAsyncRunner::wait).collect();
    let ctxs = results.into_iter().collect::<Result<Vec<_>, _>>()?;

    let output = if secure {
        reveal_secret(&ctxs, "out")?
    } else {
        ctxs[0]
            .session()
            .table()
            .get_tensor("out")
            .cloned()
            .ok_or_else(|| OpError::TensorNotFound("out".into()))?
    };

    info!(elapsed = ?start_time.elapsed(), "Operator finished");
    println!("{}", output.to_json());
    Ok(())
}
