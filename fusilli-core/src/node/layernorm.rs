use crate::attributes::{Context, LayernormAttr, NormFwdPhase};
use crate::emit::Emitter;
use crate::error::{ErrorKind, Result};
use crate::fusilli_ensure;
use crate::shared::SharedTensor;

#[derive(Clone)]
pub struct LayerNormNode {
    pub attr: LayernormAttr,
    pub x: SharedTensor,
    pub scale: Option<SharedTensor>,
    pub bias: Option<SharedTensor>,
    pub epsilon: SharedTensor,
    pub y: SharedTensor,
    pub mean: Option<SharedTensor>,
    pub inv_variance: Option<SharedTensor>,
}

/// Output shape/stride for the non-batch per-row statistics tensors
/// (mean, inv-variance): `[B,1,1,...]` with unit strides, matching X's
/// batch dim and trailing-ones rank.
fn stats_shape(x_dim: &[i64]) -> (Vec<i64>, Vec<i64>) {
    let mut dim = vec![x_dim[0]];
    dim.extend(std::iter::repeat(1).take(x_dim.len() - 1));
    let stride = vec![1i64; x_dim.len()];
    (dim, stride)
}

impl LayerNormNode {
    pub fn name(&self) -> &str {
        self.attr.name()
    }

    pub fn pre_validate(&self) -> Result<()> {
        fusilli_ensure!(
            self.attr.forward_phase().is_some(),
            ErrorKind::AttributeNotSet,
            "layernorm `{}`: forward phase not set",
            self.name()
        );
        fusilli_ensure!(
            self.epsilon.read().unwrap().is_scalar(),
            ErrorKind::InvalidAttribute,
            "layernorm `{}`: epsilon must be a scalar constant",
            self.name()
        );
        let x = self.x.read().unwrap();
        fusilli_ensure!(
            x.rank() >= 2,
            ErrorKind::InvalidAttribute,
            "layernorm `{}`: X rank must be >= 2",
            self.name()
        );
        fusilli_ensure!(
            x.is_contiguous() || x.is_channels_last(),
            ErrorKind::NotImplemented,
            "layernorm `{}`: X must be contiguous or channels-last",
            self.name()
        );
        let training = self.attr.forward_phase() == Some(NormFwdPhase::Training);
        fusilli_ensure!(
            training == (self.mean.is_some() && self.inv_variance.is_some()),
            ErrorKind::InvalidAttribute,
            "layernorm `{}`: mean/inv_variance must be set iff phase is Training",
            self.name()
        );
        Ok(())
    }

    pub fn infer_properties(&mut self, ctx: &Context) -> Result<()> {
        let x = self.x.read().unwrap().clone();
        let mut non_batch_dim = x.dim().to_vec();
        non_batch_dim[0] = 1;

        for side in [self.scale.as_ref(), self.bias.as_ref()] {
            if let Some(t) = side {
                let mut t = t.write().unwrap();
                if t.dim().is_empty() {
                    let stride = if x.is_channels_last() {
                        let mut d = non_batch_dim.clone();
                        let last = d.remove(1);
                        d.push(last);
                        let s = crate::attributes::TensorAttr::contiguous_strides(&d);
                        let mut stride = vec![0i64; x.rank()];
                        stride[0] = s[0];
                        for i in 2..x.rank() {
                            stride[i] = s[i - 1];
                        }
                        stride[1] = s[x.rank() - 1];
                        stride
                    } else {
                        crate::attributes::TensorAttr::contiguous_strides(&non_batch_dim)
                    };
                    *t = t.clone().set_dim(non_batch_dim.clone()).set_stride(stride);
                }
                t.fill_from_context(ctx);
            }
        }

        {
            let mut eps = self.epsilon.write().unwrap();
            eps.fill_from_context(ctx);
        }

        {
            let mut y = self.y.write().unwrap();
            if y.dim().is_empty() {
                *y = y.clone().set_dim(x.dim().to_vec()).set_stride(x.stride().to_vec());
            }
            y.fill_from_context(ctx);
        }

        if self.attr.forward_phase() == Some(NormFwdPhase::Training) {
            let (dim, stride) = stats_shape(x.dim());
            if let Some(mean) = &self.mean {
                let mut mean = mean.write().unwrap();
                if mean.dim().is_empty() {
                    *mean = mean.clone().set_dim(dim.clone()).set_stride(stride.clone());
                }
                mean.fill_from_context(ctx);
            }
            if let Some(inv_var) = &self.inv_variance {
                let mut inv_var = inv_var.write().unwrap();
                if inv_var.dim().is_empty() {
                    *inv_var = inv_var.clone().set_dim(dim).set_stride(stride);
                }
                inv_var.fill_from_context(ctx);
            }
        }
        Ok(())
    }

    pub fn post_validate(&self) -> Result<()> {
        let x = self.x.read().unwrap();
        let y = self.y.read().unwrap();
        fusilli_ensure!(
            x.rank() == y.rank(),
            ErrorKind::InvalidAttribute,
            "layernorm `{}`: X/Y rank mismatch",
            self.name()
        );
        Ok(())
    }

    pub fn emit_module_scope_asm(&self, _emitter: &mut Emitter) -> Result<()> {
        Ok(())
    }

    pub fn emit_pre_asm(&self, emitter: &mut Emitter) -> Result<()> {
        let x = self.x.read().unwrap().clone();
        let y = self.y.read().unwrap().clone();
        let eps = self.epsilon.read().unwrap().clone();
        let x_ssa = emitter.operand_in_logical_order(&x, self.name())?;
        let eps_ssa = emitter.emit_scalar_constant(self.name(), &eps)?;
        let normalized_shape: Vec<i64> = x.dim()[1..].to_vec();

        if self.attr.forward_phase() == Some(NormFwdPhase::Training) {
            let mean = self.mean.as_ref().unwrap().read().unwrap().clone();
            let inv_var = self.inv_variance.as_ref().unwrap().read().unwrap().clone();
            let y_ssa = emitter.fresh_temp(&format!("{}_Y", self.name()));
            let mean_ssa = emitter.fresh_temp(&format!("{}_MEAN", self.name()));
            let rstd_ssa = emitter.fresh_temp(&format!("{}_INV_VARIANCE", self.name()));
            emitter.emit_body_line(format!(
                "{y_ssa}, {mean_ssa}, {rstd_ssa} = torch.aten.native_layer_norm {x_ssa}, normalized_shape={:?}, eps={eps_ssa} : {} -> {}, {}, {}",
                normalized_shape,
                Emitter::vtensor_type(&x),
                Emitter::vtensor_type(&y),
                Emitter::vtensor_type(&mean),
                Emitter::vtensor_type(&inv_var),
            ));
            emitter.write_back_physical_layout(&y, &y_ssa, self.name())?;
            emitter.write_back_physical_layout(&mean, &mean_ssa, self.name())?;
            emitter.write_back_physical_layout(&inv_var, &rstd_ssa, self.name())?;
        } else {
            let y_ssa = emitter.fresh_temp(&format!("{}_Y", self.name()));
            emitter.emit_body_line(format!(
                "{y_ssa} = torch.aten.layer_norm {x_ssa}, normalized_shape={:?}, eps={eps_ssa} : {} -> {}",
                normalized_shape,
                Emitter::vtensor_type(&x),
                Emitter::vtensor_type(&y),
            ));
            emitter.write_back_physical_layout(&y, &y_ssa, self.name())?;
        }
        Ok(())
    }

    pub fn emit_post_asm(&self, _emitter: &mut Emitter) -> Result<()> {
        Ok(())
    }
}
