use crate::attributes::{Context, DataType, PointwiseAttr};
use crate::emit::Emitter;
use crate::error::{ErrorKind, Result};
use crate::fusilli_ensure;
use crate::shared::SharedTensor;

#[derive(Clone)]
pub struct PointwiseNode {
    pub attr: PointwiseAttr,
    pub in0: SharedTensor,
    pub in1: Option<SharedTensor>,
    pub out0: SharedTensor,
}

fn broadcast_shape(a: &[i64], b: &[i64], node_name: &str) -> Result<Vec<i64>> {
    let rank = a.len().max(b.len());
    let pad = |d: &[i64]| -> Vec<i64> {
        let mut v = vec![1i64; rank - d.len()];
        v.extend_from_slice(d);
        v
    };
    let (a, b) = (pad(a), pad(b));
    let mut out = Vec::with_capacity(rank);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let d = if x == y || y == 1 {
            x
        } else if x == 1 {
            y
        } else {
            return Err(crate::error::Error::new(
                ErrorKind::InvalidAttribute,
                format!("pointwise `{node_name}`: dims {x} and {y} are not broadcast-compatible"),
            ));
        };
        out.push(d);
    }
    Ok(out)
}

impl PointwiseNode {
    pub fn name(&self) -> &str {
        self.attr.name()
    }

    pub fn pre_validate(&self) -> Result<()> {
        let mode = self.attr.mode().ok_or_else(|| {
            crate::error::Error::new(
                ErrorKind::AttributeNotSet,
                format!("pointwise `{}`: mode not set", self.name()),
            )
        })?;
        if mode.arity() == 2 {
            fusilli_ensure!(
                self.in1.is_some(),
                ErrorKind::AttributeNotSet,
                "pointwise `{}`: mode {:?} requires a second operand",
                self.name(),
                mode
            );
        }
        Ok(())
    }

    pub fn infer_properties(&mut self, ctx: &Context) -> Result<()> {
        let mode = self.attr.mode().unwrap();
        let in0 = self.in0.read().unwrap().clone();
        let shape = if let Some(in1) = &self.in1 {
            let in1 = in1.read().unwrap().clone();
            broadcast_shape(in0.dim(), in1.dim(), self.name())?
        } else {
            in0.dim().to_vec()
        };
        let mut out0 = self.out0.write().unwrap();
        if out0.dim().is_empty() {
            let stride = crate::attributes::TensorAttr::contiguous_strides(&shape);
            *out0 = out0.clone().set_dim(shape).set_stride(stride);
        }
        if mode.is_comparison() {
            out0.fill_from_context(ctx);
            if out0.data_type() != DataType::Boolean {
                *out0 = out0.clone().set_data_type(DataType::Boolean);
            }
        } else {
            out0.fill_from_context(ctx);
        }
        Ok(())
    }

    pub fn post_validate(&self) -> Result<()> {
        Ok(())
    }

    pub fn emit_module_scope_asm(&self, _emitter: &mut Emitter) -> Result<()> {
        Ok(())
    }

    pub fn emit_pre_asm(&self, emitter: &mut Emitter) -> Result<()> {
        let mode = self.attr.mode().unwrap();
        let in0 = self.in0.read().unwrap().clone();
        let out0 = self.out0.read().unwrap().clone();
        let in0_ssa = emitter.operand_in_logical_order(&in0, self.name())?;
        let out_ssa = emitter.fresh_temp(&format!("{}_OUT_0", self.name()));
        if mode.arity() == 2 {
            let in1 = self.in1.as_ref().unwrap().read().unwrap().clone();
            let in1_ssa = emitter.operand_in_logical_order(&in1, self.name())?;
            emitter.emit_body_line(format!(
                "{out_ssa} = {} {in0_ssa}, {in1_ssa} : {}, {} -> {}",
                mode.mlir_op_name(),
                Emitter::vtensor_type(&in0),
                Emitter::vtensor_type(&in1),
                Emitter::vtensor_type(&out0),
            ));
        } else {
            emitter.emit_body_line(format!(
                "{out_ssa} = {} {in0_ssa} : {} -> {}",
                mode.mlir_op_name(),
                Emitter::vtensor_type(&in0),
                Emitter::vtensor_type(&out0),
            ));
        }
        emitter.write_back_physical_layout(&out0, &out_ssa, self.name())?;
        Ok(())
    }

    pub fn emit_post_asm(&self, _emitter: &mut Emitter) -> Result<()> {
        Ok(())
    }
}
