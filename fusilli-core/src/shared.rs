use std::sync::{Arc, RwLock};

use crate::attributes::TensorAttr;

/// A tensor shared between the graph that owns it and every node that
/// reads or writes it. Tensors never reference nodes back, so the graph
/// remains a DAG of owned values with no cycles to reason about.
pub type SharedTensor = Arc<RwLock<TensorAttr>>;

pub fn new_shared(attr: TensorAttr) -> SharedTensor {
    Arc::new(RwLock::new(attr))
}

/// Marks a node-produced tensor as a materialized graph output: clears
/// `is_virtual` and sets `is_output`. Node outputs are virtual by default
/// (see `Graph::new_output`); calling this is how a caller opts one into
/// the compiled function's result set.
pub fn mark_output(tensor: &SharedTensor) {
    let mut t = tensor.write().unwrap();
    *t = t.clone().set_is_virtual(false).set_output(true);
}
