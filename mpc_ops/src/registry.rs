use std::collections::HashMap;

use static_init::dynamic;

use crate::{
    binary::{ArithmeticKind, ArithmeticOp},
    operator::Operator,
};

#[dynamic]
static ARITHMETIC_OPS: HashMap<&'static str, ArithmeticKind> = ArithmeticKind::ALL
    .iter()
    .map(|&kind| (kind.op_type(), kind))
    .collect();

/// Create fresh operator instance of given type.
pub fn get_operator(op_type: &str) -> Option<Box<dyn Operator>> {
    ARITHMETIC_OPS
        .get(op_type)
        .map(|&kind| Box::new(ArithmeticOp::new(kind)) as Box<dyn Operator>)
}

/// Names of all registered operator types.
pub fn operator_types() -> Vec<&'static str> {
    let mut types: Vec<_> = ARITHMETIC_OPS.keys().copied().collect();
    types.sort_unstable();
    types
}
