use std::sync::atomic::{AtomicU64, Ordering};

use crate::attributes::context::Context;
use crate::data_type::DataType;
use crate::error::{Error, ErrorKind, Result};
use crate::{fusilli_bail, fusilli_ensure};

/// A single scalar constant value, carried by a `TensorAttr` when
/// `is_scalar` is set. Emitted as a dense literal constant at module scope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    Float(f32),
    Double(f64),
    Int64(i64),
    Boolean(bool),
}

/// Semantic descriptor of a tensor: shape, layout, dtype, and role. Carries
/// no storage of its own — storage is bound only at `execute` time via a
/// `Buffer` in the variant pack.
#[derive(Debug, Clone)]
pub struct TensorAttr {
    name: String,
    dim: Vec<i64>,
    stride: Vec<i64>,
    data_type: DataType,
    is_virtual: bool,
    is_output: bool,
    is_scalar: bool,
    scalar_value: Option<ScalarValue>,
}

static ANON_COUNTER: AtomicU64 = AtomicU64::new(0);

impl Default for TensorAttr {
    fn default() -> Self {
        Self::new()
    }
}

impl TensorAttr {
    pub fn new() -> Self {
        let id = ANON_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self {
            name: format!("tensor_{id}"),
            dim: Vec::new(),
            stride: Vec::new(),
            data_type: DataType::NotSet,
            is_virtual: false,
            is_output: false,
            is_scalar: false,
            scalar_value: None,
        }
    }

    /// A rank-1 `[1]` constant tensor carrying `value`.
    pub fn from_scalar(value: ScalarValue) -> Self {
        let mut attr = Self::new();
        attr.is_scalar = true;
        attr.dim = vec![1];
        attr.stride = vec![1];
        attr.scalar_value = Some(value);
        attr.data_type = match value {
            ScalarValue::Float(_) => DataType::Float,
            ScalarValue::Double(_) => DataType::Double,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::Boolean(_) => DataType::Boolean,
        };
        attr
    }

    // -- builders --

    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn set_dim(mut self, dim: impl Into<Vec<i64>>) -> Self {
        self.dim = dim.into();
        self
    }

    pub fn set_stride(mut self, stride: impl Into<Vec<i64>>) -> Self {
        self.stride = stride.into();
        self
    }

    pub fn set_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn set_output(mut self, is_output: bool) -> Self {
        self.is_output = is_output;
        self
    }

    pub fn set_is_virtual(mut self, is_virtual: bool) -> Self {
        self.is_virtual = is_virtual;
        self
    }

    pub fn set_is_scalar(mut self, is_scalar: bool) -> Self {
        self.is_scalar = is_scalar;
        self
    }

    // -- queries --

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dim(&self) -> &[i64] {
        &self.dim
    }

    pub fn stride(&self) -> &[i64] {
        &self.stride
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    pub fn is_output(&self) -> bool {
        self.is_output
    }

    pub fn is_scalar(&self) -> bool {
        self.is_scalar
    }

    pub fn scalar_value(&self) -> Option<ScalarValue> {
        self.scalar_value
    }

    pub fn rank(&self) -> usize {
        self.dim.len()
    }

    pub fn volume(&self) -> i64 {
        self.dim.iter().product()
    }

    /// Indices that sort axes by (descending stride, descending dim) — the
    /// permutation the emitter applies to present this tensor's operand in
    /// canonical logical (row-major-after-permute) order.
    pub fn logical_to_physical_permutation(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.rank()).collect();
        order.sort_by(|&a, &b| {
            self.stride[b]
                .cmp(&self.stride[a])
                .then(self.dim[b].cmp(&self.dim[a]))
        });
        order
    }

    pub fn physical_dim(&self) -> Vec<i64> {
        self.logical_to_physical_permutation()
            .into_iter()
            .map(|i| self.dim[i])
            .collect()
    }

    /// Row-major contiguous strides for `dim`.
    pub fn contiguous_strides(dim: &[i64]) -> Vec<i64> {
        let mut strides = vec![1i64; dim.len()];
        for i in (0..dim.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * dim[i + 1];
        }
        strides
    }

    pub fn is_contiguous(&self) -> bool {
        self.stride == Self::contiguous_strides(&self.dim)
    }

    /// Channels-last for rank 4/5: channel axis (index 1) has unit stride,
    /// remaining axes row-major under the logical permutation
    /// `[0, 2, 3, (4,) 1]`.
    pub fn is_channels_last(&self) -> bool {
        let rank = self.rank();
        if rank != 4 && rank != 5 {
            return false;
        }
        if self.stride.get(1) != Some(&1) {
            return false;
        }
        let mut permuted_dim: Vec<i64> = vec![self.dim[0]];
        permuted_dim.extend(&self.dim[2..rank]);
        permuted_dim.push(self.dim[1]);
        let mut permuted_stride: Vec<i64> = vec![self.stride[0]];
        permuted_stride.extend(&self.stride[2..rank]);
        permuted_stride.push(self.stride[1]);
        permuted_stride == Self::contiguous_strides(&permuted_dim)
    }

    /// Assigns a default dtype from `ctx` when `NotSet`: IO dtype for
    /// non-virtual tensors, intermediate dtype otherwise.
    pub fn fill_from_context(&mut self, ctx: &Context) {
        if self.data_type == DataType::NotSet {
            self.data_type = if self.is_virtual {
                ctx.intermediate_data_type()
            } else {
                ctx.io_data_type()
            };
        }
    }

    pub fn validate(&self) -> Result<()> {
        fusilli_ensure!(
            self.dim.len() == self.stride.len(),
            ErrorKind::InvalidAttribute,
            "tensor `{}`: dim rank {} does not match stride rank {}",
            self.name,
            self.dim.len(),
            self.stride.len()
        );
        fusilli_ensure!(
            !self.dim.is_empty(),
            ErrorKind::AttributeNotSet,
            "tensor `{}`: dim not set",
            self.name
        );
        fusilli_ensure!(
            self.dim.iter().all(|&d| d > 0),
            ErrorKind::InvalidAttribute,
            "tensor `{}`: dims must be positive, got {:?}",
            self.name,
            self.dim
        );
        if self.is_scalar {
            fusilli_ensure!(
                self.rank() <= 1,
                ErrorKind::InvalidAttribute,
                "tensor `{}`: scalar tensors must have rank <= 1",
                self.name
            );
            fusilli_ensure!(
                self.scalar_value.is_some(),
                ErrorKind::AttributeNotSet,
                "tensor `{}`: marked scalar but has no value",
                self.name
            );
            fusilli_ensure!(
                !self.is_output,
                ErrorKind::InvalidAttribute,
                "tensor `{}`: scalar tensors cannot be graph outputs",
                self.name
            );
        }
        if self.is_output {
            fusilli_ensure!(
                !self.is_virtual,
                ErrorKind::InvalidAttribute,
                "tensor `{}`: cannot be both output and virtual",
                self.name
            );
        }
        if !self.is_virtual && self.name.is_empty() {
            fusilli_bail!(
                ErrorKind::AttributeNotSet,
                "non-virtual tensor has no name"
            );
        }
        if self.data_type == DataType::NotSet {
            fusilli_bail!(
                ErrorKind::AttributeNotSet,
                "tensor `{}`: data type not set",
                self.name
            );
        }
        Ok(())
    }
}

/// Orders tensors by name, used to fix module-argument order at emission.
pub fn sort_by_name(tensors: &mut [std::sync::Arc<std::sync::RwLock<TensorAttr>>]) {
    tensors.sort_by(|a, b| a.read().unwrap().name().cmp(b.read().unwrap().name()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_strides_row_major() {
        assert_eq!(TensorAttr::contiguous_strides(&[2, 3, 4]), vec![12, 4, 1]);
    }

    #[test]
    fn detects_contiguous() {
        let t = TensorAttr::new().set_dim(vec![2, 3]).set_stride(vec![3, 1]);
        assert!(t.is_contiguous());
        assert!(!t.is_channels_last());
    }

    #[test]
    fn detects_channels_last_rank4() {
        // NCHW dims [1,3,4,5], channels-last strides.
        let t = TensorAttr::new()
            .set_dim(vec![1, 3, 4, 5])
            .set_stride(vec![60, 1, 15, 3]);
        assert!(t.is_channels_last());
        assert!(!t.is_contiguous());
    }

    #[test]
    fn physical_dim_matches_permutation() {
        let t = TensorAttr::new()
            .set_dim(vec![1, 3, 4, 5])
            .set_stride(vec![60, 1, 15, 3]);
        // logical NCHW order recovered from channels-last strides.
        assert_eq!(t.physical_dim(), vec![1, 4, 5, 3]);
    }

    #[test]
    fn transposed_2d_permutation() {
        let t = TensorAttr::new().set_dim(vec![3, 2]).set_stride(vec![1, 3]);
        assert_eq!(t.logical_to_physical_permutation(), vec![1, 0]);
        assert_eq!(t.physical_dim(), vec![2, 3]);
    }

    #[test]
    fn validate_rejects_mismatched_rank() {
        let t = TensorAttr::new()
            .set_name("x")
            .set_dim(vec![1, 2])
            .set_stride(vec![1])
            .set_data_type(DataType::Float);
        assert_eq!(t.validate().unwrap_err().kind(), ErrorKind::InvalidAttribute);
    }

    #[test]
    fn validate_rejects_output_virtual() {
        let t = TensorAttr::new()
            .set_name("x")
            .set_dim(vec![1])
            .set_stride(vec![1])
            .set_data_type(DataType::Float)
            .set_output(true)
            .set_is_virtual(true);
        assert_eq!(t.validate().unwrap_err().kind(), ErrorKind::InvalidAttribute);
    }
}
