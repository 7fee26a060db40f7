/// Attributes shared by the forward-convolution and both gradient nodes.
/// Padding is a single vector per spatial dim — asymmetric pre/post padding
/// cannot be represented (a documented core-level limitation; see
/// `DESIGN.md`).
#[derive(Debug, Clone, Default)]
pub struct ConvAttr {
    name: String,
    padding: Vec<i64>,
    stride: Vec<i64>,
    dilation: Vec<i64>,
}

impl ConvAttr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn set_padding(mut self, padding: impl Into<Vec<i64>>) -> Self {
        self.padding = padding.into();
        self
    }

    pub fn set_stride(mut self, stride: impl Into<Vec<i64>>) -> Self {
        self.stride = stride.into();
        self
    }

    pub fn set_dilation(mut self, dilation: impl Into<Vec<i64>>) -> Self {
        self.dilation = dilation.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn padding(&self) -> &[i64] {
        &self.padding
    }

    pub fn stride(&self) -> &[i64] {
        &self.stride
    }

    pub fn dilation(&self) -> &[i64] {
        &self.dilation
    }

    /// Number of spatial dims this attribute set was configured for, used
    /// to cross-check against operand rank (4 for 2D, 5 for 3D).
    pub fn spatial_rank(&self) -> usize {
        self.padding.len()
    }
}
