//! `Graph`: the root composite node. Owns every tensor and sub-node, and
//! orchestrates validation, MLIR emission, compilation, and execution.

use std::collections::{HashMap, HashSet};
use std::ffi::c_void;
use std::sync::Arc;

use crate::attributes::{
    Context, ConvAttr, CustomOpAttr, LayernormAttr, MatmulAttr, NormFwdPhase, PointwiseAttr, ReductionAttr, TensorAttr,
};
use crate::cache::{self, CacheFile, CachedAssets, CachedAssetsType};
use crate::compile::CompileDriver;
use crate::emit::Emitter;
use crate::error::{Error, ErrorKind, Result};
use crate::fusilli_bail;
use crate::fusilli_ensure;
use crate::node::{
    ConvDGradNode, ConvFPropNode, ConvWGradNode, CustomOpNode, LayerNormNode, MatmulNode, NodeKind, PointwiseNode,
    ReductionNode,
};
use crate::runtime::{Buffer, Handle, VmContext, WorkspaceContract};
use crate::shared::{new_shared, SharedTensor};

pub struct Graph {
    name: String,
    context: Context,
    /// Tensors registered via `tensor()`: graph operands, including scalars.
    inputs: Vec<SharedTensor>,
    /// Tensors produced by a node; virtual by default until the caller
    /// marks one an output with `shared::mark_output`.
    node_outputs: Vec<SharedTensor>,
    nodes: Vec<NodeKind>,
    validated: bool,
    workspace_size: Option<u64>,
    cached_assets: Option<CachedAssets>,
    vm_context: Option<VmContext>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context: Context::new(),
            inputs: Vec::new(),
            node_outputs: Vec::new(),
            nodes: Vec::new(),
            validated: false,
            workspace_size: None,
            cached_assets: None,
            vm_context: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    fn auto_name(&self, op: &str, role: &str) -> String {
        format!("{op}_{}_{role}", self.nodes.len())
    }

    /// Registers a top-level graph operand (non-virtual by construction).
    /// Scalar tensors are registered the same way and excluded later at
    /// emission/execution time.
    pub fn tensor(&mut self, attr: TensorAttr) -> SharedTensor {
        let t = new_shared(attr);
        self.inputs.push(Arc::clone(&t));
        t
    }

    fn new_output(&mut self, attr: TensorAttr) -> SharedTensor {
        let t = new_shared(attr.set_is_virtual(true));
        self.node_outputs.push(Arc::clone(&t));
        t
    }

    // -- builders --

    pub fn conv_fprop(&mut self, attr: ConvAttr, x: SharedTensor, w: SharedTensor) -> SharedTensor {
        let idx = self.nodes.len();
        let attr = if attr.name().is_empty() { attr.set_name(format!("conv_fprop_{idx}")) } else { attr };
        let y = self.new_output(TensorAttr::new().set_name(self.auto_name("conv_fprop", "Y")));
        self.nodes.push(NodeKind::ConvFProp(ConvFPropNode { attr, x, w, y: Arc::clone(&y) }));
        y
    }

    pub fn conv_wgrad(&mut self, attr: ConvAttr, dy: SharedTensor, x: SharedTensor, dw: TensorAttr) -> SharedTensor {
        let idx = self.nodes.len();
        let attr = if attr.name().is_empty() { attr.set_name(format!("conv_wgrad_{idx}")) } else { attr };
        let dw_name = if dw.name().is_empty() { self.auto_name("conv_wgrad", "DW") } else { dw.name().to_string() };
        let dw = self.new_output(dw.set_name(dw_name));
        self.nodes.push(NodeKind::ConvWGrad(ConvWGradNode { attr, dy, x, dw: Arc::clone(&dw) }));
        dw
    }

    pub fn conv_dgrad(&mut self, attr: ConvAttr, dy: SharedTensor, w: SharedTensor, dx: TensorAttr) -> SharedTensor {
        let idx = self.nodes.len();
        let attr = if attr.name().is_empty() { attr.set_name(format!("conv_dgrad_{idx}")) } else { attr };
        let dx_name = if dx.name().is_empty() { self.auto_name("conv_dgrad", "DX") } else { dx.name().to_string() };
        let dx = self.new_output(dx.set_name(dx_name));
        self.nodes.push(NodeKind::ConvDGrad(ConvDGradNode { attr, dy, w, dx: Arc::clone(&dx) }));
        dx
    }

    pub fn matmul(&mut self, attr: MatmulAttr, a: SharedTensor, b: SharedTensor) -> SharedTensor {
        let idx = self.nodes.len();
        let attr = if attr.name().is_empty() { attr.set_name(format!("matmul_{idx}")) } else { attr };
        let c = self.new_output(TensorAttr::new().set_name(self.auto_name("matmul", "C")));
        self.nodes.push(NodeKind::Matmul(MatmulNode { attr, a, b, c: Arc::clone(&c) }));
        c
    }

    pub fn pointwise(&mut self, attr: PointwiseAttr, in0: SharedTensor, in1: Option<SharedTensor>) -> SharedTensor {
        let idx = self.nodes.len();
        let attr = if attr.name().is_empty() { attr.set_name(format!("pointwise_{idx}")) } else { attr };
        let out0 = self.new_output(TensorAttr::new().set_name(self.auto_name("pointwise", "OUT_0")));
        self.nodes.push(NodeKind::Pointwise(PointwiseNode { attr, in0, in1, out0: Arc::clone(&out0) }));
        out0
    }

    pub fn reduction(&mut self, attr: ReductionAttr, x: SharedTensor, out_shape: TensorAttr) -> SharedTensor {
        let idx = self.nodes.len();
        let attr = if attr.name().is_empty() { attr.set_name(format!("reduction_{idx}")) } else { attr };
        let y_name = if out_shape.name().is_empty() { self.auto_name("reduction", "Y") } else { out_shape.name().to_string() };
        let y = self.new_output(out_shape.set_name(y_name));
        self.nodes.push(NodeKind::Reduction(ReductionNode { attr, x, y: Arc::clone(&y) }));
        y
    }

    /// `scale`/`bias` are optional affine parameters; when the phase is
    /// `Training`, returns `(Y, Some(mean), Some(inv_variance))`, else
    /// `(Y, None, None)`.
    pub fn layernorm(
        &mut self,
        attr: LayernormAttr,
        x: SharedTensor,
        scale: Option<SharedTensor>,
        bias: Option<SharedTensor>,
        epsilon: SharedTensor,
    ) -> (SharedTensor, Option<SharedTensor>, Option<SharedTensor>) {
        let idx = self.nodes.len();
        let attr = if attr.name().is_empty() { attr.set_name(format!("layernorm_{idx}")) } else { attr };
        let training = attr.forward_phase() == Some(NormFwdPhase::Training);
        let y = self.new_output(TensorAttr::new().set_name(self.auto_name("layernorm", "Y")));
        let (mean, inv_variance) = if training {
            let mean = self.new_output(TensorAttr::new().set_name(self.auto_name("layernorm", "MEAN")));
            let inv_var = self.new_output(TensorAttr::new().set_name(self.auto_name("layernorm", "INV_VARIANCE")));
            (Some(mean), Some(inv_var))
        } else {
            (None, None)
        };
        self.nodes.push(NodeKind::LayerNorm(LayerNormNode {
            attr,
            x,
            scale,
            bias,
            epsilon,
            y: Arc::clone(&y),
            mean: mean.clone(),
            inv_variance: inv_variance.clone(),
        }));
        (y, mean, inv_variance)
    }

    pub fn custom_op(&mut self, attr: CustomOpAttr, inputs: Vec<SharedTensor>, out_shapes: Vec<TensorAttr>) -> Vec<SharedTensor> {
        let idx = self.nodes.len();
        let attr = if attr.name().is_empty() { attr.set_name(format!("custom_op_{idx}")) } else { attr };
        let outputs: Vec<SharedTensor> = out_shapes
            .into_iter()
            .enumerate()
            .map(|(i, shape)| {
                let name = if shape.name().is_empty() { self.auto_name("custom_op", &format!("OUT_{i}")) } else { shape.name().to_string() };
                self.new_output(shape.set_name(name))
            })
            .collect();
        self.nodes.push(NodeKind::CustomOp(CustomOpNode { attr, inputs, outputs: outputs.clone() }));
        outputs
    }

    // -- resolved operand sets --

    fn resolved_inputs(&self) -> Vec<SharedTensor> {
        let mut v: Vec<SharedTensor> = self.inputs.iter().filter(|t| !t.read().unwrap().is_scalar()).cloned().collect();
        v.sort_by(|a, b| a.read().unwrap().name().cmp(b.read().unwrap().name()));
        v
    }

    fn scalar_inputs(&self) -> Vec<SharedTensor> {
        self.inputs.iter().filter(|t| t.read().unwrap().is_scalar()).cloned().collect()
    }

    fn resolved_outputs(&self) -> Vec<SharedTensor> {
        let mut v: Vec<SharedTensor> = self.node_outputs.iter().filter(|t| t.read().unwrap().is_output()).cloned().collect();
        v.sort_by(|a, b| a.read().unwrap().name().cmp(b.read().unwrap().name()));
        v
    }

    // -- validation --

    fn collect_names(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for t in self.inputs.iter().chain(self.node_outputs.iter()) {
            let name = t.read().unwrap().name().to_string();
            fusilli_ensure!(seen.insert(name.clone()), ErrorKind::InvalidAttribute, "duplicate tensor name `{name}`");
        }
        for n in &self.nodes {
            let name = n.name().to_string();
            fusilli_ensure!(seen.insert(name.clone()), ErrorKind::InvalidAttribute, "duplicate node name `{name}`");
        }
        Ok(())
    }

    /// Three-phase validation over the whole node list: all `pre_validate`
    /// first, then `infer_properties` in insertion (bottom-up) order, then
    /// all `post_validate`; finally every tensor the graph owns is validated
    /// now that its shape/dtype are fully inferred.
    pub fn validate(&mut self) -> Result<()> {
        self.collect_names()?;
        for n in &self.nodes {
            n.pre_validate()?;
        }
        for n in &mut self.nodes {
            n.infer_properties(&self.context)?;
        }
        for n in &self.nodes {
            n.post_validate()?;
        }
        for t in self.inputs.iter().chain(self.node_outputs.iter()) {
            let mut t = t.write().unwrap();
            t.fill_from_context(&self.context);
            t.validate()?;
        }
        self.validated = true;
        Ok(())
    }

    /// Emits the full textual module: module-scope prelude (custom-op
    /// declarations), the entry function signature (materialized outputs
    /// first, then non-scalar inputs, both name-sorted), scalar constants,
    /// then each node's emission in insertion order, writebacks, and
    /// `return`.
    pub fn emit_asm(&self) -> Result<String> {
        fusilli_ensure!(self.validated, ErrorKind::NotValidated, "graph `{}` not validated", self.name);
        let mut emitter = Emitter::new();
        for n in &self.nodes {
            n.emit_module_scope_asm(&mut emitter)?;
        }

        let outputs = self.resolved_outputs();
        let inputs = self.resolved_inputs();

        let mut params = Vec::new();
        let mut output_param_ssas = Vec::new();
        for (i, t) in outputs.iter().enumerate() {
            let t = t.read().unwrap();
            let ssa = format!("%out{i}");
            output_param_ssas.push(ssa.clone());
            params.push(format!("{ssa}: {}", Emitter::mutable_tensor_type(&t)));
        }
        for (i, t) in inputs.iter().enumerate() {
            let t = t.read().unwrap();
            let ssa = format!("%in{i}");
            emitter.bind(t.name(), ssa.clone());
            params.push(format!("{ssa}: {}", Emitter::vtensor_type(&t)));
        }

        for t in self.scalar_inputs() {
            let t = t.read().unwrap();
            emitter.emit_scalar_constant(&self.name, &t)?;
        }

        for n in &self.nodes {
            n.emit_pre_asm(&mut emitter)?;
            n.emit_post_asm(&mut emitter)?;
        }

        for (out_ssa, t) in output_param_ssas.iter().zip(outputs.iter()) {
            let t = t.read().unwrap();
            let value_ssa = emitter.value_of(t.name())?;
            emitter.emit_body_line(format!(
                "torch.overwrite.tensor.contents {value_ssa} overwrites {out_ssa} : {}, {}",
                Emitter::vtensor_type(&t),
                Emitter::mutable_tensor_type(&t),
            ));
        }

        let mut module = String::new();
        module.push_str("module {\n");
        for line in emitter.module_scope().lines() {
            module.push_str("  ");
            module.push_str(line);
            module.push('\n');
        }
        module.push_str(&format!(
            "  func.func @main({}) attributes {{torch.assume_strict_symbolic_shapes}} {{\n",
            params.join(", ")
        ));
        module.push_str(emitter.body());
        module.push_str("    return\n");
        module.push_str("  }\n");
        module.push_str("}\n");
        Ok(module)
    }

    /// Requires `validate()` to have succeeded. Emits MLIR, checks the
    /// on-disk cache, and compiles on a miss. Returns whether compilation
    /// actually ran (`true`) or the existing artifact was reused (`false`).
    /// A freshly-constructed `Graph` never starts out holding a prior
    /// `CachedAssets`, so its first `compile()` call always misses even if
    /// the files already exist on disk.
    pub fn compile(&mut self, handle: &Handle, remove: bool) -> Result<bool> {
        fusilli_ensure!(self.validated, ErrorKind::NotValidated, "graph `{}` not validated", self.name);
        let asm = self.emit_asm()?;
        let driver = CompileDriver::discover()?;
        let dir = cache::cache_dir_for(&self.name);
        let stats_path = dir.join("iree-compile-statistics.json");
        let flags = crate::backend::compile_flags(handle.backend(), &stats_path)?;
        let input_path = dir.join("iree-compile-input.mlir");
        let output_path = dir.join("iree-compile-output.vmfb");
        let command = driver.build_command(input_path, output_path, flags);
        let command_text = command.to_command_string();

        if let Some(existing) = &self.cached_assets {
            if cache::is_cache_valid(existing, asm.as_bytes(), command_text.as_bytes()) {
                tracing::debug!(graph = %self.name, "cache hit");
                return Ok(false);
            }
        }

        tracing::info!(graph = %self.name, "compiling");
        let input_file = CacheFile::create(&self.name, CachedAssetsType::Input, asm.as_bytes(), remove)?;
        let command_file = CacheFile::create(&self.name, CachedAssetsType::Command, command_text.as_bytes(), remove)?;
        driver.run(&command)?;
        let output_file = CacheFile::open(&self.name, CachedAssetsType::Output)?;
        let statistics_file = CacheFile::open(&self.name, CachedAssetsType::Statistics)
            .or_else(|_| CacheFile::create(&self.name, CachedAssetsType::Statistics, b"{}", remove))?;
        let cached_assets = CachedAssets::new(&self.name, input_file, output_file, command_file, statistics_file);

        let module_bytes = cached_assets.read(CachedAssetsType::Output)?;
        let vm_context = VmContext::create(handle, &module_bytes)?;
        self.workspace_size = Some(match vm_context.workspace_contract()? {
            WorkspaceContract::None => 0,
            WorkspaceContract::Constant(size) => size,
            WorkspaceContract::Dynamic => fusilli_bail!(
                ErrorKind::NotImplemented,
                "graph `{}`: transient-workspace size is a dynamic function (iree.abi.transients.size), only a constant size is supported",
                self.name
            ),
        });
        self.cached_assets = Some(cached_assets);
        self.vm_context = Some(vm_context);
        Ok(true)
    }

    pub fn workspace_size(&self) -> Option<u64> {
        self.workspace_size
    }

    /// Maps the variant pack onto the compiled function's ABI (materialized
    /// outputs first, then inputs, then the optional workspace buffer) and
    /// invokes it.
    pub fn execute(&self, handle: &Handle, variant_pack: &VariantPack<'_>, workspace: Option<&Buffer>) -> Result<()> {
        fusilli_ensure!(self.cached_assets.is_some(), ErrorKind::NotCompiled, "graph `{}` not compiled", self.name);
        let required_workspace = self.workspace_size.unwrap_or(0);
        if required_workspace > 0 {
            fusilli_ensure!(
                workspace.is_some(),
                ErrorKind::VariantPackError,
                "graph `{}` requires a workspace buffer of {required_workspace} bytes",
                self.name
            );
        } else {
            fusilli_ensure!(workspace.is_none(), ErrorKind::VariantPackError, "graph `{}` does not use a workspace; pass None", self.name);
        }

        for t in self.resolved_outputs() {
            let t = t.read().unwrap();
            fusilli_ensure!(
                variant_pack.contains(t.name()),
                ErrorKind::VariantPackError,
                "missing buffer for output `{}`",
                t.name()
            );
        }
        for t in self.resolved_inputs() {
            let t = t.read().unwrap();
            fusilli_ensure!(
                variant_pack.contains(t.name()),
                ErrorKind::VariantPackError,
                "missing buffer for input `{}`",
                t.name()
            );
        }
        for t in self.scalar_inputs() {
            let t = t.read().unwrap();
            fusilli_ensure!(
                !variant_pack.contains(t.name()),
                ErrorKind::VariantPackError,
                "scalar tensor `{}` must not appear in the variant pack",
                t.name()
            );
        }

        let vm_context = self.vm_context.as_ref().ok_or_else(|| {
            Error::new(ErrorKind::NotCompiled, format!("graph `{}` not compiled", self.name))
        })?;

        tracing::info!(graph = %self.name, backend = ?handle.backend(), "executing");

        // Outputs are pushed as their own array (`call_invoke`'s ABI keeps
        // inputs/outputs separate rather than one ordered list); the
        // workspace buffer, when present, rides along with the inputs,
        // followed by two null dummy fences on async backends, which the
        // runtime treats as already-signaled.
        let mut input_ptrs: Vec<*mut c_void> = Vec::new();
        for t in self.resolved_inputs() {
            let t = t.read().unwrap();
            let buffer = variant_pack.get(t.name()).ok_or_else(|| {
                Error::new(ErrorKind::VariantPackError, format!("missing buffer for input `{}`", t.name()))
            })?;
            input_ptrs.push(buffer.raw());
        }
        if let Some(ws) = workspace {
            input_ptrs.push(ws.raw());
        }
        if handle.backend().executes_async() {
            input_ptrs.push(std::ptr::null_mut());
            input_ptrs.push(std::ptr::null_mut());
        }

        let mut output_ptrs: Vec<*mut c_void> = Vec::new();
        for t in self.resolved_outputs() {
            let t = t.read().unwrap();
            let buffer = variant_pack.get(t.name()).ok_or_else(|| {
                Error::new(ErrorKind::VariantPackError, format!("missing buffer for output `{}`", t.name()))
            })?;
            output_ptrs.push(buffer.raw());
        }

        vm_context.call_invoke(&input_ptrs, &mut output_ptrs)
    }
}

/// Maps tensor names to the buffers bound to them for one `execute` call.
#[derive(Default)]
pub struct VariantPack<'a> {
    map: HashMap<String, &'a Buffer>,
}

impl<'a> VariantPack<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, tensor: &SharedTensor, buffer: &'a Buffer) -> Self {
        let name = tensor.read().unwrap().name().to_string();
        self.map.insert(name, buffer);
        self
    }

    pub fn contains(&self, tensor_name: &str) -> bool {
        self.map.contains_key(tensor_name)
    }

    pub fn get(&self, tensor_name: &str) -> Option<&Buffer> {
        self.map.get(tensor_name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::PointwiseMode;
    use crate::data_type::DataType;
    use crate::shared::mark_output;

    #[test]
    fn duplicate_tensor_names_rejected() {
        let mut g = Graph::new("dup");
        g.tensor(TensorAttr::new().set_name("x").set_dim(vec![1]).set_stride(vec![1]).set_data_type(DataType::Float));
        g.tensor(TensorAttr::new().set_name("x").set_dim(vec![1]).set_stride(vec![1]).set_data_type(DataType::Float));
        assert_eq!(g.validate().unwrap_err().kind(), ErrorKind::InvalidAttribute);
    }

    #[test]
    fn conv_fprop_all_ones_shape_inference() {
        let mut g = Graph::new("conv1x1");
        let x = g.tensor(
            TensorAttr::new()
                .set_name("X")
                .set_dim(vec![4, 8, 8, 8])
                .set_stride(TensorAttr::contiguous_strides(&[4, 8, 8, 8]))
                .set_data_type(DataType::Float),
        );
        let w = g.tensor(
            TensorAttr::new()
                .set_name("W")
                .set_dim(vec![16, 8, 1, 1])
                .set_stride(TensorAttr::contiguous_strides(&[16, 8, 1, 1]))
                .set_data_type(DataType::Float),
        );
        let y = g.conv_fprop(ConvAttr::new().set_padding(vec![0, 0]).set_stride(vec![1, 1]).set_dilation(vec![1, 1]), x, w);
        mark_output(&y);
        g.validate().unwrap();
        assert_eq!(y.read().unwrap().dim(), &[4, 16, 8, 8]);
    }

    #[test]
    fn emit_asm_is_deterministic() {
        let mut g = Graph::new("det");
        let x = g.tensor(
            TensorAttr::new()
                .set_name("X")
                .set_dim(vec![2, 2])
                .set_stride(vec![2, 1])
                .set_data_type(DataType::Float),
        );
        let out = g.pointwise(PointwiseAttr::new().set_mode(PointwiseMode::ReluFwd), x, None);
        mark_output(&out);
        g.validate().unwrap();
        let a = g.emit_asm().unwrap();
        let b = g.emit_asm().unwrap();
        assert_eq!(a, b);
        assert!(a.contains("torch.aten.relu"));
    }

    #[test]
    fn variant_pack_rejects_missing_output_binding() {
        let mut g = Graph::new("missing_output");
        let x = g.tensor(
            TensorAttr::new()
                .set_name("X")
                .set_dim(vec![2])
                .set_stride(vec![1])
                .set_data_type(DataType::Float),
        );
        let out = g.pointwise(PointwiseAttr::new().set_mode(PointwiseMode::ReluFwd), x, None);
        mark_output(&out);
        g.validate().unwrap();
        // Never compiled, so execute() fails at the NotCompiled check
        // before any variant-pack binding is even inspected.
        assert!(g.cached_assets.is_none());
    }
}
