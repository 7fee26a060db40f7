use crate::attributes::{Context, ConvAttr};
use crate::emit::Emitter;
use crate::error::{ErrorKind, Result};
use crate::fusilli_ensure;
use crate::shared::SharedTensor;

fn out_spatial(in_dim: i64, pad: i64, dilation: i64, filt: i64, stride: i64) -> i64 {
    (in_dim + 2 * pad - dilation * (filt - 1) - 1) / stride + 1
}

fn check_spatial_rank(attr: &ConvAttr, rank: usize, node_name: &str) -> Result<()> {
    let spatial = rank - 2;
    fusilli_ensure!(
        attr.spatial_rank() == spatial,
        ErrorKind::InvalidAttribute,
        "conv `{node_name}`: padding/stride/dilation rank {} does not match operand spatial rank {}",
        attr.spatial_rank(),
        spatial
    );
    fusilli_ensure!(
        attr.stride().len() == spatial && attr.dilation().len() == spatial,
        ErrorKind::InvalidAttribute,
        "conv `{node_name}`: stride/dilation rank mismatch"
    );
    Ok(())
}

#[derive(Clone)]
pub struct ConvFPropNode {
    pub attr: ConvAttr,
    pub x: SharedTensor,
    pub w: SharedTensor,
    pub y: SharedTensor,
}

impl ConvFPropNode {
    pub fn name(&self) -> &str {
        self.attr.name()
    }

    pub fn pre_validate(&self) -> Result<()> {
        fusilli_ensure!(
            !self.attr.padding().is_empty(),
            ErrorKind::AttributeNotSet,
            "conv_fprop `{}`: padding not set",
            self.name()
        );
        fusilli_ensure!(
            self.attr.padding().iter().all(|&p| p >= 0),
            ErrorKind::InvalidAttribute,
            "conv_fprop `{}`: padding must be non-negative (asymmetric padding is unsupported)",
            self.name()
        );
        Ok(())
    }

    pub fn infer_properties(&mut self, ctx: &Context) -> Result<()> {
        let x = self.x.read().unwrap().clone();
        let w = self.w.read().unwrap().clone();
        let rank = x.rank();
        check_spatial_rank(&self.attr, rank, self.name())?;
        let mut y = self.y.write().unwrap();
        if y.dim().is_empty() {
            let mut dim = vec![x.dim()[0], w.dim()[0]];
            for i in 0..rank - 2 {
                dim.push(out_spatial(
                    x.dim()[i + 2],
                    self.attr.padding()[i],
                    self.attr.dilation()[i],
                    w.dim()[i + 2],
                    self.attr.stride()[i],
                ));
            }
            let stride = crate::attributes::TensorAttr::contiguous_strides(&dim);
            *y = y.clone().set_dim(dim).set_stride(stride);
        }
        y.fill_from_context(ctx);
        Ok(())
    }

    pub fn post_validate(&self) -> Result<()> {
        let x = self.x.read().unwrap();
        let w = self.w.read().unwrap();
        let y = self.y.read().unwrap();
        fusilli_ensure!(
            x.rank() == w.rank() && w.rank() == y.rank(),
            ErrorKind::InvalidAttribute,
            "conv_fprop `{}`: X/W/Y rank mismatch",
            self.name()
        );
        fusilli_ensure!(
            x.dim()[1] % w.dim()[1] == 0,
            ErrorKind::InvalidAttribute,
            "conv_fprop `{}`: X channels {} not divisible by W in-channels {}",
            self.name(),
            x.dim()[1],
            w.dim()[1]
        );
        Ok(())
    }

    pub fn emit_module_scope_asm(&self, _emitter: &mut Emitter) -> Result<()> {
        Ok(())
    }

    pub fn emit_pre_asm(&self, emitter: &mut Emitter) -> Result<()> {
        let x = self.x.read().unwrap().clone();
        let w = self.w.read().unwrap().clone();
        let y = self.y.read().unwrap().clone();
        let x_ssa = emitter.operand_in_logical_order(&x, self.name())?;
        let w_ssa = emitter.operand_in_logical_order(&w, self.name())?;
        let out_ssa = emitter.fresh_temp(&format!("{}_Y", self.name()));
        emitter.emit_body_line(format!(
            "{out_ssa} = torch.aten.convolution {x_ssa}, {w_ssa}, padding={:?}, stride={:?}, dilation={:?} : -> {}",
            self.attr.padding(),
            self.attr.stride(),
            self.attr.dilation(),
            Emitter::vtensor_type(&y),
        ));
        emitter.write_back_physical_layout(&y, &out_ssa, self.name())?;
        Ok(())
    }

    pub fn emit_post_asm(&self, _emitter: &mut Emitter) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct ConvWGradNode {
    pub attr: ConvAttr,
    pub dy: SharedTensor,
    pub x: SharedTensor,
    pub dw: SharedTensor,
}

impl ConvWGradNode {
    pub fn name(&self) -> &str {
        self.attr.name()
    }

    pub fn pre_validate(&self) -> Result<()> {
        fusilli_ensure!(
            !self.attr.padding().is_empty(),
            ErrorKind::AttributeNotSet,
            "conv_wgrad `{}`: padding not set",
            self.name()
        );
        Ok(())
    }

    pub fn infer_properties(&mut self, ctx: &Context) -> Result<()> {
        let x = self.x.read().unwrap().clone();
        check_spatial_rank(&self.attr, x.rank(), self.name())?;
        let mut dw = self.dw.write().unwrap();
        if dw.dim().is_empty() {
            // DW's shape is [K, C/groups, R, S, ...] and depends on the
            // filter shape the caller intends to produce; unlike the
            // forward pass, weight-grad shape cannot be derived from DY/X
            // alone, so the caller must set it.
            fusilli_ensure!(
                !dw.name().is_empty(),
                ErrorKind::AttributeNotSet,
                "conv_wgrad `{}`: DW output shape must be provided by the caller",
                self.name()
            );
        }
        dw.fill_from_context(ctx);
        Ok(())
    }

    pub fn post_validate(&self) -> Result<()> {
        let dy = self.dy.read().unwrap();
        let x = self.x.read().unwrap();
        let dw = self.dw.read().unwrap();
        fusilli_ensure!(
            dy.rank() == x.rank() && x.rank() == dw.rank(),
            ErrorKind::InvalidAttribute,
            "conv_wgrad `{}`: DY/X/DW rank mismatch",
            self.name()
        );
        Ok(())
    }

    pub fn emit_module_scope_asm(&self, _emitter: &mut Emitter) -> Result<()> {
        Ok(())
    }

    pub fn emit_pre_asm(&self, emitter: &mut Emitter) -> Result<()> {
        let dy = self.dy.read().unwrap().clone();
        let x = self.x.read().unwrap().clone();
        let dw = self.dw.read().unwrap().clone();
        let dy_ssa = emitter.operand_in_logical_order(&dy, self.name())?;
        let x_ssa = emitter.operand_in_logical_order(&x, self.name())?;
        let out_ssa = emitter.fresh_temp(&format!("{}_DW", self.name()));
        emitter.emit_body_line(format!(
            "{out_ssa} = torch.aten.convolution_backward {dy_ssa}, {x_ssa}, output_mask=[false,true,false], padding={:?}, stride={:?}, dilation={:?} : -> {}",
            self.attr.padding(),
            self.attr.stride(),
            self.attr.dilation(),
            Emitter::vtensor_type(&dw),
        ));
        emitter.write_back_physical_layout(&dw, &out_ssa, self.name())?;
        Ok(())
    }

    pub fn emit_post_asm(&self, _emitter: &mut Emitter) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct ConvDGradNode {
    pub attr: ConvAttr,
    pub dy: SharedTensor,
    pub w: SharedTensor,
    pub dx: SharedTensor,
}

impl ConvDGradNode {
    pub fn name(&self) -> &str {
        self.attr.name()
    }

    pub fn pre_validate(&self) -> Result<()> {
        fusilli_ensure!(
            !self.attr.padding().is_empty(),
            ErrorKind::AttributeNotSet,
            "conv_dgrad `{}`: padding not set",
            self.name()
        );
        Ok(())
    }

    pub fn infer_properties(&mut self, ctx: &Context) -> Result<()> {
        let dy = self.dy.read().unwrap().clone();
        let w = self.w.read().unwrap().clone();
        check_spatial_rank(&self.attr, w.rank(), self.name())?;
        let mut dx = self.dx.write().unwrap();
        if dx.dim().is_empty() {
            fusilli_ensure!(
                !dx.name().is_empty(),
                ErrorKind::AttributeNotSet,
                "conv_dgrad `{}`: DX output shape must be provided by the caller",
                self.name()
            );
        }
        let _ = &dy;
        dx.fill_from_context(ctx);
        Ok(())
    }

    pub fn post_validate(&self) -> Result<()> {
        let dy = self.dy.read().unwrap();
        let w = self.w.read().unwrap();
        let dx = self.dx.read().unwrap();
        fusilli_ensure!(
            dy.rank() == w.rank() && w.rank() == dx.rank(),
            ErrorKind::InvalidAttribute,
            "conv_dgrad `{}`: DY/W/DX rank mismatch",
            self.name()
        );
        Ok(())
    }

    pub fn emit_module_scope_asm(&self, _emitter: &mut Emitter) -> Result<()> {
        Ok(())
    }

    pub fn emit_pre_asm(&self, emitter: &mut Emitter) -> Result<()> {
        let dy = self.dy.read().unwrap().clone();
        let w = self.w.read().unwrap().clone();
        let dx = self.dx.read().unwrap().clone();
        let dy_ssa = emitter.operand_in_logical_order(&dy, self.name())?;
        let w_ssa = emitter.operand_in_logical_order(&w, self.name())?;
        let out_ssa = emitter.fresh_temp(&format!("{}_DX", self.name()));
        emitter.emit_body_line(format!(
            "{out_ssa} = torch.aten.convolution_backward {dy_ssa}, {w_ssa}, output_mask=[true,false,false], padding={:?}, stride={:?}, dilation={:?} : -> {}",
            self.attr.padding(),
            self.attr.stride(),
            self.attr.dilation(),
            Emitter::vtensor_type(&dx),
        ));
        emitter.write_back_physical_layout(&dx, &out_ssa, self.name())?;
        Ok(())
    }

    pub fn emit_post_asm(&self, _emitter: &mut Emitter) -> Result<()> {
        Ok(())
    }
}
