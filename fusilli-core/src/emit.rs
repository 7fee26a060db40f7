//! MLIR textual emission helpers: SSA value tracking, layout-permutation
//! wrapping, and dtype-to-textual-type mapping. Node `emit_*` methods write
//! through an `Emitter` rather than returning strings directly so that
//! module-scope declarations (custom-op function bodies) and per-node body
//! statements accumulate independently, matching the two-region shape of
//! the emitted module described in the design (module prelude + one entry
//! function).

use std::collections::HashMap;

use crate::attributes::TensorAttr;
use crate::data_type::DataType;
use crate::error::{Error, ErrorKind, Result};

pub struct Emitter {
    module_scope: String,
    body: String,
    /// tensor name -> SSA value currently holding its logical-order content.
    value_map: HashMap<String, String>,
    temp_counter: u64,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            module_scope: String::new(),
            body: String::new(),
            value_map: HashMap::new(),
            temp_counter: 0,
        }
    }

    pub fn module_scope(&self) -> &str {
        &self.module_scope
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn emit_module_line(&mut self, line: impl AsRef<str>) {
        self.module_scope.push_str(line.as_ref());
        self.module_scope.push('\n');
    }

    pub fn emit_body_line(&mut self, line: impl AsRef<str>) {
        self.body.push_str("  ");
        self.body.push_str(line.as_ref());
        self.body.push('\n');
    }

    /// Binds `tensor_name` to the SSA value that currently holds its
    /// content (in physical/as-declared layout, not logical order).
    pub fn bind(&mut self, tensor_name: &str, ssa: impl Into<String>) {
        self.value_map.insert(tensor_name.to_string(), ssa.into());
    }

    pub fn value_of(&self, tensor_name: &str) -> Result<String> {
        self.value_map.get(tensor_name).cloned().ok_or_else(|| {
            Error::new(
                ErrorKind::InternalError,
                format!("emitter: no SSA value bound for tensor `{tensor_name}`"),
            )
        })
    }

    pub fn fresh_temp(&mut self, hint: &str) -> String {
        let id = self.temp_counter;
        self.temp_counter += 1;
        format!("%{hint}_{id}")
    }

    /// MLIR value-tensor type annotation, e.g. `!torch.vtensor<[2,3],f32>`.
    pub fn vtensor_type(tensor: &TensorAttr) -> String {
        let dims: Vec<String> = tensor.dim().iter().map(|d| d.to_string()).collect();
        format!("!torch.vtensor<[{}],{}>", dims.join(","), tensor.data_type().mlir_asm())
    }

    /// MLIR mutable tensor type for output-argument positions.
    pub fn mutable_tensor_type(tensor: &TensorAttr) -> String {
        let dims: Vec<String> = tensor.dim().iter().map(|d| d.to_string()).collect();
        format!("!torch.tensor<[{}],{}>", dims.join(","), tensor.data_type().mlir_asm())
    }

    /// Ensures `tensor`'s currently-bound SSA value is in canonical logical
    /// order, inserting a permute when its stride order differs, and
    /// returns the SSA name to use as an operand. The permuted value is
    /// itself bound under a derived name so a later inverse-permute can
    /// look it up.
    pub fn operand_in_logical_order(&mut self, tensor: &TensorAttr, node_name: &str) -> Result<String> {
        let current = self.value_of(tensor.name())?;
        let perm = tensor.logical_to_physical_permutation();
        if perm.iter().enumerate().all(|(i, &p)| i == p) {
            return Ok(current);
        }
        let list_elems: Vec<String> = perm.iter().map(|i| format!("%int{i}_{node_name}")).collect();
        for (i, name) in perm.iter().zip(list_elems.iter()) {
            self.emit_body_line(format!("{name} = torch.constant.int {i}", name = name, i = i));
        }
        let logical_dim: Vec<i64> = perm.iter().map(|&i| tensor.dim()[i]).collect();
        let list_ssa = self.fresh_temp(&format!("{}_permlist", tensor.name()));
        self.emit_body_line(format!(
            "{list_ssa} = torch.prim.ListConstruct {} : ({}) -> !torch.list<int>",
            list_elems.join(", "),
            list_elems.iter().map(|_| "!torch.int").collect::<Vec<_>>().join(", "),
        ));
        let out_ssa = self.fresh_temp(&format!("{}_{}_perm", tensor.name(), node_name));
        let in_ty = Self::vtensor_type(tensor);
        let out_ty_tensor = tensor.clone().set_dim(logical_dim);
        let out_ty = Self::vtensor_type(&out_ty_tensor);
        self.emit_body_line(format!(
            "{out_ssa} = torch.aten.permute {current}, {list_ssa} : {in_ty}, !torch.list<int> -> {out_ty}"
        ));
        self.bind(&format!("{}@{}", tensor.name(), node_name), out_ssa.clone());
        Ok(out_ssa)
    }

    /// Applies the inverse permutation of `tensor`'s declared layout to
    /// `value_ssa` (assumed to be in canonical logical order), binds the
    /// result to `tensor.name()`, and returns the SSA name.
    pub fn write_back_physical_layout(
        &mut self,
        tensor: &TensorAttr,
        value_ssa: &str,
        node_name: &str,
    ) -> Result<String> {
        let perm = tensor.logical_to_physical_permutation();
        if perm.iter().enumerate().all(|(i, &p)| i == p) {
            self.bind(tensor.name(), value_ssa);
            return Ok(value_ssa.to_string());
        }
        let mut inverse = vec![0usize; perm.len()];
        for (logical_pos, &physical_pos) in perm.iter().enumerate() {
            inverse[physical_pos] = logical_pos;
        }
        let list_elems: Vec<String> = inverse
            .iter()
            .map(|i| format!("%int{i}_{node_name}_inv"))
            .collect();
        for (i, name) in inverse.iter().zip(list_elems.iter()) {
            self.emit_body_line(format!("{name} = torch.constant.int {i}"));
        }
        let list_ssa = self.fresh_temp(&format!("{}_invpermlist", tensor.name()));
        self.emit_body_line(format!(
            "{list_ssa} = torch.prim.ListConstruct {} : ({}) -> !torch.list<int>",
            list_elems.join(", "),
            list_elems.iter().map(|_| "!torch.int").collect::<Vec<_>>().join(", "),
        ));
        let out_ssa = self.fresh_temp(&format!("{}_{}_unperm", tensor.name(), node_name));
        let logical_dim = tensor.physical_dim();
        let in_ty_tensor = tensor.clone().set_dim(logical_dim);
        let in_ty = Self::vtensor_type(&in_ty_tensor);
        let out_ty = Self::vtensor_type(tensor);
        self.emit_body_line(format!(
            "{out_ssa} = torch.aten.permute {value_ssa}, {list_ssa} : {in_ty}, !torch.list<int> -> {out_ty}"
        ));
        self.bind(tensor.name(), out_ssa.clone());
        Ok(out_ssa)
    }

    /// Emits a scalar constant declaration for a graph-level scalar input,
    /// named `<graph_name>_<tensor_name>` as the design prescribes.
    pub fn emit_scalar_constant(&mut self, graph_name: &str, tensor: &TensorAttr) -> Result<String> {
        let value = tensor.scalar_value().ok_or_else(|| {
            Error::new(
                ErrorKind::InternalError,
                format!("tensor `{}` marked scalar but has no value", tensor.name()),
            )
        })?;
        let ssa = format!("%{graph_name}_{}", tensor.name());
        let literal = match value {
            crate::attributes::ScalarValue::Float(v) => {
                format!("{ssa} = torch.constant.float {v:?} : !torch.float")
            }
            crate::attributes::ScalarValue::Double(v) => {
                format!("{ssa} = torch.constant.float {v:?} : !torch.float")
            }
            crate::attributes::ScalarValue::Int64(v) => {
                format!("{ssa} = torch.constant.int {v} : !torch.int")
            }
            crate::attributes::ScalarValue::Boolean(v) => {
                format!("{ssa} = torch.constant.bool {v} : !torch.bool")
            }
        };
        self.emit_body_line(literal);
        self.bind(tensor.name(), ssa.clone());
        Ok(ssa)
    }
}

/// dtype tag used by `IreeHalElementType`-equivalent lookups in the
/// runtime buffer layer; kept next to the emitter so the two mappings
/// (textual MLIR type, runtime element type) stay side by side.
pub fn is_floating(dt: DataType) -> bool {
    matches!(
        dt,
        DataType::Float | DataType::Half | DataType::BFloat16 | DataType::Double | DataType::Fp8E5M2
    )
}
