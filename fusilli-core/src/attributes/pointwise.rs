/// Pointwise operation mode. Each comparison variant maps to `torch.aten.*`
/// at emission and forces a `Boolean` output dtype regardless of input
/// dtype; every other variant preserves the input dtype.
///
/// `CmpNe` corresponds to the original implementation's `CMP_NEQ` constant
/// (the textual asm table is keyed to that name, not `CMP_NE`, despite the
/// more common abbreviation used elsewhere for this family).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointwiseMode {
    Add,
    Sub,
    Mul,
    Div,
    Ceil,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpLe,
    CmpGt,
    CmpGe,
    ReluFwd,
    SigmoidFwd,
    TanhFwd,
}

impl PointwiseMode {
    /// Number of tensor operands this mode consumes.
    pub fn arity(self) -> usize {
        match self {
            PointwiseMode::Ceil
            | PointwiseMode::ReluFwd
            | PointwiseMode::SigmoidFwd
            | PointwiseMode::TanhFwd => 1,
            _ => 2,
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            PointwiseMode::CmpEq
                | PointwiseMode::CmpNe
                | PointwiseMode::CmpLt
                | PointwiseMode::CmpLe
                | PointwiseMode::CmpGt
                | PointwiseMode::CmpGe
        )
    }

    /// The `torch.aten.*` op name this mode lowers to.
    pub fn mlir_op_name(self) -> &'static str {
        match self {
            PointwiseMode::Add => "torch.aten.add.Tensor",
            PointwiseMode::Sub => "torch.aten.sub.Tensor",
            PointwiseMode::Mul => "torch.aten.mul.Tensor",
            PointwiseMode::Div => "torch.aten.div.Tensor",
            PointwiseMode::Ceil => "torch.aten.ceil",
            PointwiseMode::CmpEq => "torch.aten.eq.Tensor",
            PointwiseMode::CmpNe => "torch.aten.ne.Tensor",
            PointwiseMode::CmpLt => "torch.aten.lt.Tensor",
            PointwiseMode::CmpLe => "torch.aten.le.Tensor",
            PointwiseMode::CmpGt => "torch.aten.gt.Tensor",
            PointwiseMode::CmpGe => "torch.aten.ge.Tensor",
            PointwiseMode::ReluFwd => "torch.aten.relu",
            PointwiseMode::SigmoidFwd => "torch.aten.sigmoid",
            PointwiseMode::TanhFwd => "torch.aten.tanh",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PointwiseAttr {
    name: String,
    mode: Option<PointwiseMode>,
}

impl Default for PointwiseAttr {
    fn default() -> Self {
        Self {
            name: String::new(),
            mode: None,
        }
    }
}

impl PointwiseAttr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn set_mode(mut self, mode: PointwiseMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> Option<PointwiseMode> {
        self.mode
    }
}
