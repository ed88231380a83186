//! Binary arithmetic operators.
//!
//! Every operator runs either as a secure protocol over secret values or as a plain kernel over
//! tensors. The strategy is selected from statuses of the node inputs, and both produce
//! numerically equivalent results.

use async_trait::async_trait;
use itertools::izip;
use mpc::{
    circuits::join_circuits_all,
    executor::MpcExecutionContext,
    kernels::{self, SecretDType, SecretValue},
    MpcEngine,
};
use tracing::debug;

use crate::{
    compute::{self, ComputeError},
    error::OpError,
    exec_node::{ExecNode, TensorRef, TensorStatus},
    operator::Operator,
    session::{encode_tensor, ExecContext, SecretTensor, Session},
    tensor::{DataType, Tensor},
};

pub const LEFT: &str = "Left";
pub const RIGHT: &str = "Right";
pub const OUT: &str = "Out";

/// Binary arithmetic operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArithmeticKind {
    Add,
    Minus,
    Mul,
    /// True division, integer operands are widened.
    Div,
    /// Division truncated towards zero for integer operands.
    IntDiv,
    Mod,
}

impl ArithmeticKind {
    pub const ALL: [ArithmeticKind; 6] = [
        ArithmeticKind::Add,
        ArithmeticKind::Minus,
        ArithmeticKind::Mul,
        ArithmeticKind::Div,
        ArithmeticKind::IntDiv,
        ArithmeticKind::Mod,
    ];

    pub fn op_type(self) -> &'static str {
        match self {
            ArithmeticKind::Add => "Add",
            ArithmeticKind::Minus => "Minus",
            ArithmeticKind::Mul => "Mul",
            ArithmeticKind::Div => "Div",
            ArithmeticKind::IntDiv => "IntDiv",
            ArithmeticKind::Mod => "Mod",
        }
    }

    /// Compute operation over plaintext tensors.
    pub fn compute_in_plain(self, lhs: &Tensor, rhs: &Tensor) -> Result<Tensor, OpError> {
        let op_type = self.op_type();
        match self {
            ArithmeticKind::Add => invoke(op_type, "add", &[lhs, rhs]),
            ArithmeticKind::Minus => invoke(op_type, "subtract", &[lhs, rhs]),
            ArithmeticKind::Mul => invoke(op_type, "multiply", &[lhs, rhs]),
            ArithmeticKind::Div if lhs.dtype().is_integer() && rhs.dtype().is_integer() => {
                let lhs = compute::cast(lhs, DataType::Float64)
                    .map_err(|source| kernel_error(op_type, "cast", source))?;
                invoke(op_type, "divide", &[&lhs, rhs])
            }
            ArithmeticKind::Div | ArithmeticKind::IntDiv => invoke(op_type, "divide", &[lhs, rhs]),
            ArithmeticKind::Mod => Err(OpError::Unimplemented { op_type }),
        }
    }

    /// Compute operation over secret values. Must be called within a running circuit.
    pub async fn compute_on_secret<E: MpcEngine>(
        self,
        ctx: &MpcExecutionContext<E>,
        lhs: &SecretValue<E::Share>,
        rhs: &SecretValue<E::Share>,
    ) -> Result<SecretValue<E::Share>, OpError> {
        Ok(match self {
            ArithmeticKind::Add => kernels::add(ctx, lhs, rhs).await?,
            ArithmeticKind::Minus => kernels::sub(ctx, lhs, rhs).await?,
            ArithmeticKind::Mul => kernels::mul(ctx, lhs, rhs).await?,
            ArithmeticKind::Div
                if lhs.dtype == SecretDType::Int && rhs.dtype == SecretDType::Int =>
            {
                let lhs = kernels::dtype_cast(ctx, lhs, SecretDType::Fxp).await;
                kernels::div(ctx, &lhs, rhs).await?
            }
            ArithmeticKind::Div | ArithmeticKind::IntDiv => kernels::div(ctx, lhs, rhs).await?,
            ArithmeticKind::Mod => {
                return Err(OpError::Unimplemented {
                    op_type: self.op_type(),
                })
            }
        })
    }
}

fn kernel_error(op_type: &'static str, function: &'static str, source: ComputeError) -> OpError {
    OpError::Kernel {
        op_type,
        function,
        source,
    }
}

fn invoke(op_type: &'static str, function: &'static str, args: &[&Tensor]) -> Result<Tensor, OpError> {
    compute::call_function(function, args).map_err(|source| kernel_error(op_type, function, source))
}

/// Execution strategy of an operator invocation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExecMode {
    /// Protocol over secret values, run cooperatively by all parties.
    Secure,
    /// Local kernel over plaintext tensors.
    Plain,
}

/// Select execution strategy from statuses of node inputs and outputs.
pub fn select_mode(inputs: &[TensorStatus], outputs: &[TensorStatus]) -> Result<ExecMode, OpError> {
    if inputs.contains(&TensorStatus::Secret) {
        if inputs.contains(&TensorStatus::Private) {
            return Err(OpError::UnsupportedStatus(
                "private inputs must be shared before secure computation".into(),
            ));
        }
        if let Some(status) = outputs.iter().find(|&&s| s != TensorStatus::Secret) {
            return Err(OpError::UnsupportedStatus(format!(
                "{} output of secure computation",
                status
            )));
        }
        Ok(ExecMode::Secure)
    } else {
        if outputs.contains(&TensorStatus::Secret) {
            return Err(OpError::UnsupportedStatus(
                "Secret output of plaintext computation".into(),
            ));
        }
        Ok(ExecMode::Plain)
    }
}

/// Arithmetic operator over `Left` and `Right` slots, producing `Out`.
pub struct ArithmeticOp {
    kind: ArithmeticKind,
}

impl ArithmeticOp {
    pub fn new(kind: ArithmeticKind) -> Self {
        Self { kind }
    }

    /// Check that every referenced tensor is numeric.
    pub fn validate_io_data_types(&self, node: &ExecNode) -> Result<(), OpError> {
        let refs = node.inputs.values().chain(node.outputs.values()).flatten();
        for tensor_ref in refs {
            if !tensor_ref.dtype.is_numeric() {
                return Err(OpError::InvalidDataType {
                    op_type: self.kind.op_type(),
                    name: tensor_ref.name.clone(),
                    dtype: tensor_ref.dtype,
                });
            }
        }
        Ok(())
    }

    fn validate_arity(&self, node: &ExecNode) -> Result<(), OpError> {
        let (left, right, out) = (node.input(LEFT), node.input(RIGHT), node.output(OUT));
        if left.len() != right.len() || left.len() != out.len() {
            return Err(OpError::InvalidNode(format!(
                "{}: slots {}, {} and {} have {}, {} and {} tensors",
                node.node_name,
                LEFT,
                RIGHT,
                OUT,
                left.len(),
                right.len(),
                out.len()
            )));
        }
        Ok(())
    }

    fn run_plain(&self, node: &ExecNode, session: &mut Session) -> Result<(), OpError> {
        for (lhs, rhs, out) in izip!(node.input(LEFT), node.input(RIGHT), node.output(OUT)) {
            let result = self
                .kind
                .compute_in_plain(plain_input(session, lhs)?, plain_input(session, rhs)?)?;
            session.table_mut().add_tensor(out.name.clone(), result);
        }
        Ok(())
    }

    async fn run_secure(&self, node: &ExecNode, session: &mut Session) -> Result<(), OpError> {
        let pairs = izip!(node.input(LEFT), node.input(RIGHT))
            .map(|(lhs, rhs)| Ok((secret_input(session, lhs)?, secret_input(session, rhs)?)))
            .collect::<Result<Vec<_>, OpError>>()?;

        let kind = self.kind;
        let results = session
            .protocol()
            .run(|ctx| {
                Box::pin(join_circuits_all(
                    pairs
                        .iter()
                        .map(move |(lhs, rhs)| kind.compute_on_secret(ctx, lhs, rhs)),
                ))
            })
            .await?;

        for (out, result) in izip!(node.output(OUT), results) {
            session.table_mut().add_secret(out.name.clone(), result?);
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl Operator for ArithmeticOp {
    fn op_type(&self) -> &'static str {
        self.kind.op_type()
    }

    async fn run(&self, ctx: &mut ExecContext) -> Result<(), OpError> {
        let (node, session) = ctx.split_mut();
        if node.op_type != self.op_type() {
            return Err(OpError::InvalidNode(format!(
                "{} operator cannot run {} node",
                self.op_type(),
                node.op_type
            )));
        }
        if self.kind == ArithmeticKind::Mod {
            return Err(OpError::Unimplemented {
                op_type: self.op_type(),
            });
        }
        self.validate_arity(node)?;
        self.validate_io_data_types(node)?;

        let inputs: Vec<_> = node
            .input(LEFT)
            .iter()
            .chain(node.input(RIGHT))
            .map(|tensor_ref| tensor_ref.status)
            .collect();
        let outputs: Vec<_> = node.output(OUT).iter().map(|tensor_ref| tensor_ref.status).collect();
        let mode = select_mode(&inputs, &outputs)?;

        debug!(
            party = session.party_id(),
            node = %node.node_name,
            op = self.op_type(),
            ?mode,
            "Running operator"
        );
        match mode {
            ExecMode::Secure => self.run_secure(node, session).await,
            ExecMode::Plain => self.run_plain(node, session),
        }
    }
}

fn plain_input<'a>(session: &'a Session, tensor_ref: &TensorRef) -> Result<&'a Tensor, OpError> {
    session
        .table()
        .get_tensor(&tensor_ref.name)
        .ok_or_else(|| OpError::TensorNotFound(tensor_ref.name.clone()))
}

/// Secret operand of secure computation, public tensors are lifted without communication.
fn secret_input(session: &Session, tensor_ref: &TensorRef) -> Result<SecretTensor, OpError> {
    match tensor_ref.status {
        TensorStatus::Secret => session
            .table()
            .get_secret(&tensor_ref.name)
            .cloned()
            .ok_or_else(|| OpError::TensorNotFound(tensor_ref.name.clone())),
        TensorStatus::Public => {
            let (dtype, raw) = encode_tensor(plain_input(session, tensor_ref)?)?;
            Ok(SecretValue::from_public(session.protocol(), dtype, &raw))
        }
        TensorStatus::Private => Err(OpError::UnsupportedStatus(format!(
            "private input {} of secure computation",
            tensor_ref.name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use mpc::{
        fields::Mersenne127,
        plaintext::{MockMpcEngine, PlainShare},
    };

    use super::*;
    use crate::session::decode_tensor;

    use TensorStatus::*;

    type MockContext = MpcExecutionContext<MockMpcEngine<Mersenne127>>;

    fn lift(ctx: &MockContext, tensor: &Tensor) -> SecretValue<PlainShare<Mersenne127>> {
        let (dtype, raw) = encode_tensor(tensor).unwrap();
        SecretValue::from_public(ctx, dtype, &raw)
    }

    async fn secure(kind: ArithmeticKind, lhs: &Tensor, rhs: &Tensor) -> Result<Tensor, OpError> {
        let ctx = MockContext::new(MockMpcEngine::new());
        let (lhs, rhs) = (lift(&ctx, lhs), lift(&ctx, rhs));
        let (lhs, rhs) = (&lhs, &rhs);
        ctx.run(|ctx| {
            Box::pin(async move {
                let value = kind.compute_on_secret(ctx, lhs, rhs).await?;
                let raw = kernels::reveal(ctx, &value).await;
                decode_tensor(value.dtype, raw)
            })
        })
        .await
        .unwrap()
    }

    #[test]
    fn test_select_mode() {
        assert_eq!(select_mode(&[Secret, Public], &[Secret]).unwrap(), ExecMode::Secure);
        assert_eq!(select_mode(&[Private, Public], &[Private]).unwrap(), ExecMode::Plain);
        assert_eq!(select_mode(&[Public, Public], &[Public]).unwrap(), ExecMode::Plain);
        assert!(select_mode(&[Secret, Private], &[Secret]).is_err());
        assert!(select_mode(&[Secret, Secret], &[Private]).is_err());
        assert!(select_mode(&[Private, Private], &[Secret]).is_err());
    }

    #[test]
    fn test_plain_div_widens_integers() {
        let lhs = Tensor::from(vec![1i64, 3]);
        let rhs = Tensor::from(vec![2i64, 3]);
        assert_eq!(
            ArithmeticKind::Div.compute_in_plain(&lhs, &rhs).unwrap(),
            Tensor::from(vec![0.5, 1.0])
        );
        assert_eq!(
            ArithmeticKind::IntDiv.compute_in_plain(&lhs, &rhs).unwrap(),
            Tensor::from(vec![0i64, 1])
        );
    }

    #[test]
    fn test_plain_errors() {
        let lhs = Tensor::from(vec![1i64]);
        let zero = Tensor::from(vec![0i64]);
        let err = ArithmeticKind::IntDiv.compute_in_plain(&lhs, &zero).unwrap_err();
        assert_eq!(
            err.to_string(),
            "IntDiv: caught error while invoking divide function: Invalid: divide by zero"
        );

        let empty = Tensor::from(Vec::<i64>::new());
        assert!(matches!(
            ArithmeticKind::Mod.compute_in_plain(&empty, &empty),
            Err(OpError::Unimplemented { op_type: "Mod" })
        ));
    }

    #[tokio::test]
    async fn test_secure_div() {
        let lhs = Tensor::from(vec![1i64, 3]);
        let rhs = Tensor::from(vec![2i64, 3]);
        assert_eq!(
            secure(ArithmeticKind::Div, &lhs, &rhs).await.unwrap(),
            Tensor::from(vec![0.5, 1.0])
        );
        assert_eq!(
            secure(ArithmeticKind::IntDiv, &lhs, &rhs).await.unwrap(),
            Tensor::from(vec![0i64, 1])
        );

        let lhs = Tensor::from(vec![-7i64, 7]);
        let rhs = Tensor::from(vec![2i64, -2]);
        assert_eq!(
            secure(ArithmeticKind::IntDiv, &lhs, &rhs).await.unwrap(),
            Tensor::from(vec![-3i64, -3])
        );
    }

    #[tokio::test]
    async fn test_secure_mod_is_unimplemented() {
        let empty = Tensor::from(Vec::<i64>::new());
        assert!(matches!(
            secure(ArithmeticKind::Mod, &empty, &empty).await,
            Err(OpError::Unimplemented { op_type: "Mod" })
        ));
    }

    #[tokio::test]
    async fn test_secure_mixed_types() {
        let lhs = Tensor::from(vec![2i64, -4]);
        let rhs = Tensor::from(vec![0.25, 1.5]);
        assert_eq!(
            secure(ArithmeticKind::Mul, &lhs, &rhs).await.unwrap(),
            Tensor::from(vec![0.5, -6.0])
        );
        assert_eq!(
            secure(ArithmeticKind::Minus, &rhs, &lhs).await.unwrap(),
            Tensor::from(vec![-1.75, 5.5])
        );
    }
}
