pub mod context;
pub mod conv;
pub mod custom_op;
pub mod layernorm;
pub mod matmul;
pub mod pointwise;
pub mod reduction;
pub mod tensor_attr;

pub use context::Context;
pub use conv::ConvAttr;
pub use custom_op::CustomOpAttr;
pub use layernorm::{LayernormAttr, NormFwdPhase};
pub use matmul::MatmulAttr;
pub use pointwise::{PointwiseAttr, PointwiseMode};
pub use reduction::{ReductionAttr, ReductionMode};
pub use tensor_attr::{ScalarValue, TensorAttr};
