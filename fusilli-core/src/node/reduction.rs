use crate::attributes::{Context, ReductionAttr};
use crate::emit::Emitter;
use crate::error::{ErrorKind, Result};
use crate::fusilli_ensure;
use crate::shared::SharedTensor;

#[derive(Clone)]
pub struct ReductionNode {
    pub attr: ReductionAttr,
    pub x: SharedTensor,
    pub y: SharedTensor,
}

impl ReductionNode {
    pub fn name(&self) -> &str {
        self.attr.name()
    }

    pub fn pre_validate(&self) -> Result<()> {
        fusilli_ensure!(
            self.attr.mode().is_some(),
            ErrorKind::AttributeNotSet,
            "reduction `{}`: mode not set",
            self.name()
        );
        Ok(())
    }

    pub fn infer_properties(&mut self, ctx: &Context) -> Result<()> {
        let x = self.x.read().unwrap().clone();
        let mut y = self.y.write().unwrap();
        if y.dim().is_empty() {
            let stride = crate::attributes::TensorAttr::contiguous_strides(x.dim());
            *y = y.clone().set_dim(x.dim().to_vec()).set_stride(stride);
        }
        y.fill_from_context(ctx);
        Ok(())
    }

    /// The caller indicates reduced axes by setting 1s in the already-set
    /// output shape; a rank mismatch between X and Y here is an invalid
    /// attribute (not an unset one, which is what the original
    /// implementation's `postValidateNode` labels it as — see `DESIGN.md`).
    pub fn post_validate(&self) -> Result<()> {
        let x = self.x.read().unwrap();
        let y = self.y.read().unwrap();
        fusilli_ensure!(
            x.rank() == y.rank(),
            ErrorKind::InvalidAttribute,
            "reduction `{}`: X rank {} does not match Y rank {}",
            self.name(),
            x.rank(),
            y.rank()
        );
        Ok(())
    }

    pub fn emit_module_scope_asm(&self, _emitter: &mut Emitter) -> Result<()> {
        Ok(())
    }

    pub fn emit_pre_asm(&self, emitter: &mut Emitter) -> Result<()> {
        let mode = self.attr.mode().unwrap();
        let x = self.x.read().unwrap().clone();
        let y = self.y.read().unwrap().clone();
        let x_ssa = emitter.operand_in_logical_order(&x, self.name())?;
        let reduced_axes: Vec<usize> = x
            .dim()
            .iter()
            .zip(y.dim().iter())
            .enumerate()
            .filter(|(_, (&xd, &yd))| xd != yd && yd == 1)
            .map(|(i, _)| i)
            .collect();
        let out_ssa = emitter.fresh_temp(&format!("{}_Y", self.name()));
        emitter.emit_body_line(format!(
            "{out_ssa} = {} {x_ssa}, dims={:?}, keepdim=true : {} -> {}",
            mode.mlir_op_name(),
            reduced_axes,
            Emitter::vtensor_type(&x),
            Emitter::vtensor_type(&y),
        ));
        emitter.write_back_physical_layout(&y, &out_ssa, self.name())?;
        Ok(())
    }

    pub fn emit_post_asm(&self, _emitter: &mut Emitter) -> Result<()> {
        Ok(())
    }
}
