pub mod conv;
pub mod custom_op;
pub mod layernorm;
pub mod matmul;
pub mod pointwise;
pub mod reduction;

pub use conv::{ConvDGradNode, ConvFPropNode, ConvWGradNode};
pub use custom_op::CustomOpNode;
pub use layernorm::LayerNormNode;
pub use matmul::MatmulNode;
pub use pointwise::PointwiseNode;
pub use reduction::ReductionNode;

use crate::attributes::Context;
use crate::emit::Emitter;
use crate::error::Result;

/// Sum type over every node kind a graph can own. A tagged union rather
/// than a trait-object hierarchy: the operation set is closed and each
/// variant's three-phase validation and emission logic is simple enough
/// that dynamic dispatch buys nothing but indirection.
#[derive(Clone)]
pub enum NodeKind {
    ConvFProp(ConvFPropNode),
    ConvWGrad(ConvWGradNode),
    ConvDGrad(ConvDGradNode),
    Matmul(MatmulNode),
    Pointwise(PointwiseNode),
    Reduction(ReductionNode),
    LayerNorm(LayerNormNode),
    CustomOp(CustomOpNode),
}

macro_rules! dispatch {
    ($self:expr, $node:ident => $body:expr) => {
        match $self {
            NodeKind::ConvFProp($node) => $body,
            NodeKind::ConvWGrad($node) => $body,
            NodeKind::ConvDGrad($node) => $body,
            NodeKind::Matmul($node) => $body,
            NodeKind::Pointwise($node) => $body,
            NodeKind::Reduction($node) => $body,
            NodeKind::LayerNorm($node) => $body,
            NodeKind::CustomOp($node) => $body,
        }
    };
}

impl NodeKind {
    pub fn name(&self) -> &str {
        dispatch!(self, n => n.name())
    }

    pub fn pre_validate(&self) -> Result<()> {
        dispatch!(self, n => n.pre_validate())
    }

    pub fn infer_properties(&mut self, ctx: &Context) -> Result<()> {
        dispatch!(self, n => n.infer_properties(ctx))
    }

    pub fn post_validate(&self) -> Result<()> {
        dispatch!(self, n => n.post_validate())
    }

    pub fn emit_module_scope_asm(&self, emitter: &mut Emitter) -> Result<()> {
        dispatch!(self, n => n.emit_module_scope_asm(emitter))
    }

    pub fn emit_pre_asm(&self, emitter: &mut Emitter) -> Result<()> {
        dispatch!(self, n => n.emit_pre_asm(emitter))
    }

    pub fn emit_post_asm(&self, emitter: &mut Emitter) -> Result<()> {
        dispatch!(self, n => n.emit_post_asm(emitter))
    }
}
