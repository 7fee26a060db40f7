use crate::attributes::{Context, CustomOpAttr};
use crate::emit::Emitter;
use crate::error::{ErrorKind, Result};
use crate::fusilli_ensure;
use crate::shared::SharedTensor;

#[derive(Clone)]
pub struct CustomOpNode {
    pub attr: CustomOpAttr,
    pub inputs: Vec<SharedTensor>,
    pub outputs: Vec<SharedTensor>,
}

impl CustomOpNode {
    pub fn name(&self) -> &str {
        self.attr.name()
    }

    pub fn pre_validate(&self) -> Result<()> {
        fusilli_ensure!(
            !self.attr.mlir_template().is_empty(),
            ErrorKind::AttributeNotSet,
            "custom_op `{}`: MLIR template not set",
            self.name()
        );
        fusilli_ensure!(
            !self.inputs.is_empty() && !self.outputs.is_empty(),
            ErrorKind::AttributeNotSet,
            "custom_op `{}`: inputs and outputs must be non-empty",
            self.name()
        );
        for t in self.inputs.iter().chain(self.outputs.iter()) {
            let t = t.read().unwrap();
            fusilli_ensure!(
                !t.is_scalar(),
                ErrorKind::InvalidAttribute,
                "custom_op `{}`: operand `{}` must not be scalar",
                self.name(),
                t.name()
            );
        }
        fusilli_ensure!(
            self.outputs.len() == self.attr.output_count(),
            ErrorKind::InvalidAttribute,
            "custom_op `{}`: declared output_count {} does not match {} output tensors",
            self.name(),
            self.attr.output_count(),
            self.outputs.len()
        );
        Ok(())
    }

    pub fn infer_properties(&mut self, ctx: &Context) -> Result<()> {
        // A custom op's MLIR is opaque to us; output shapes must already be
        // fully specified by the caller. We only default dtypes.
        for out in &self.outputs {
            out.write().unwrap().fill_from_context(ctx);
        }
        Ok(())
    }

    pub fn post_validate(&self) -> Result<()> {
        for out in &self.outputs {
            out.read().unwrap().validate()?;
        }
        Ok(())
    }

    /// Resolves `{FUNC_NAME}`, `{IN<i>_DTYPE}`, `{OUT<i>_DTYPE}` in the
    /// user's template and emits the resolved function at module scope.
    /// The template's body is otherwise opaque: there is no validation
    /// beyond substring replacement, so a syntax error in it surfaces only
    /// at compile time.
    pub fn emit_module_scope_asm(&self, emitter: &mut Emitter) -> Result<()> {
        let mut resolved = self.attr.mlir_template().replace("{FUNC_NAME}", self.name());
        for (i, t) in self.inputs.iter().enumerate() {
            let dt = t.read().unwrap().data_type().mlir_asm().to_string();
            resolved = resolved.replace(&format!("{{IN{i}_DTYPE}}"), &dt);
        }
        for (i, t) in self.outputs.iter().enumerate() {
            let dt = t.read().unwrap().data_type().mlir_asm().to_string();
            resolved = resolved.replace(&format!("{{OUT{i}_DTYPE}}"), &dt);
        }
        emitter.emit_module_line(resolved);
        Ok(())
    }

    pub fn emit_pre_asm(&self, emitter: &mut Emitter) -> Result<()> {
        let mut operand_ssas = Vec::with_capacity(self.inputs.len());
        let mut operand_tys = Vec::with_capacity(self.inputs.len());
        for t in &self.inputs {
            let t = t.read().unwrap().clone();
            operand_ssas.push(emitter.operand_in_logical_order(&t, self.name())?);
            operand_tys.push(Emitter::vtensor_type(&t));
        }
        let out_snapshots: Vec<_> = self.outputs.iter().map(|o| o.read().unwrap().clone()).collect();
        let out_ssas: Vec<String> = out_snapshots
            .iter()
            .map(|o| emitter.fresh_temp(&format!("{}_{}", self.name(), o.name())))
            .collect();
        let out_tys: Vec<String> = out_snapshots.iter().map(Emitter::vtensor_type).collect();
        emitter.emit_body_line(format!(
            "{} = func.call @{}({}) : ({}) -> {}",
            out_ssas.join(", "),
            self.name(),
            operand_ssas.join(", "),
            operand_tys.join(", "),
            if out_tys.len() == 1 {
                out_tys[0].clone()
            } else {
                format!("({})", out_tys.join(", "))
            },
        ));
        for (out, ssa) in out_snapshots.iter().zip(out_ssas.iter()) {
            emitter.write_back_physical_layout(out, ssa, self.name())?;
        }
        Ok(())
    }

    pub fn emit_post_asm(&self, _emitter: &mut Emitter) -> Result<()> {
        Ok(())
    }
}
