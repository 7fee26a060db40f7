mod attributes;
mod backend;
mod cache;
mod compile;
mod data_type;
mod dllib;
mod emit;
mod error;
mod float_types;
mod graph;
mod node;
mod runtime;
mod shared;
pub mod support;

pub use attributes::{
    Context, ConvAttr, CustomOpAttr, LayernormAttr, MatmulAttr, NormFwdPhase, PointwiseAttr, PointwiseMode,
    ReductionAttr, ReductionMode, ScalarValue, TensorAttr,
};
pub use backend::Backend;
pub use data_type::DataType;
pub use error::{Error, ErrorKind, Result};
#[cfg(feature = "bfloat")]
pub use float_types::BFloat16;
#[cfg(feature = "half")]
pub use float_types::Float16;
pub use graph::{Graph, VariantPack};
pub use runtime::{Buffer, Device, Handle, RuntimeInstance};
pub use shared::{mark_output, SharedTensor};
pub use support::logging::init_logging;
