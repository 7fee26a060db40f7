use crate::attributes::{Context, MatmulAttr};
use crate::emit::Emitter;
use crate::error::{ErrorKind, Result};
use crate::fusilli_ensure;
use crate::shared::SharedTensor;

#[derive(Clone)]
pub struct MatmulNode {
    pub attr: MatmulAttr,
    pub a: SharedTensor,
    pub b: SharedTensor,
    pub c: SharedTensor,
}

fn broadcast_batch(a: &[i64], b: &[i64], node_name: &str) -> Result<Vec<i64>> {
    fusilli_ensure!(
        a.len() == b.len(),
        ErrorKind::InvalidAttribute,
        "matmul `{node_name}`: batch rank mismatch ({} vs {})",
        a.len(),
        b.len()
    );
    let mut out = Vec::with_capacity(a.len());
    for (&x, &y) in a.iter().zip(b.iter()) {
        let d = if x == y || y == 1 {
            x
        } else if x == 1 {
            y
        } else {
            return Err(crate::error::Error::new(
                ErrorKind::InvalidAttribute,
                format!("matmul `{node_name}`: batch dims {x} and {y} are not broadcast-compatible"),
            ));
        };
        out.push(d);
    }
    Ok(out)
}

impl MatmulNode {
    pub fn name(&self) -> &str {
        self.attr.name()
    }

    pub fn pre_validate(&self) -> Result<()> {
        let a = self.a.read().unwrap();
        let b = self.b.read().unwrap();
        fusilli_ensure!(
            a.rank() >= 2 && b.rank() >= 2,
            ErrorKind::InvalidAttribute,
            "matmul `{}`: operands must have rank >= 2",
            self.name()
        );
        fusilli_ensure!(
            a.rank() == b.rank(),
            ErrorKind::InvalidAttribute,
            "matmul `{}`: A rank {} != B rank {}",
            self.name(),
            a.rank(),
            b.rank()
        );
        Ok(())
    }

    pub fn infer_properties(&mut self, ctx: &Context) -> Result<()> {
        let a = self.a.read().unwrap().clone();
        let b = self.b.read().unwrap().clone();
        let rank = a.rank();
        let (m, k_a) = if self.attr.transpose_a() {
            (a.dim()[rank - 1], a.dim()[rank - 2])
        } else {
            (a.dim()[rank - 2], a.dim()[rank - 1])
        };
        let (k_b, n) = if self.attr.transpose_b() {
            (b.dim()[rank - 1], b.dim()[rank - 2])
        } else {
            (b.dim()[rank - 2], b.dim()[rank - 1])
        };
        fusilli_ensure!(
            k_a == k_b,
            ErrorKind::InvalidAttribute,
            "matmul `{}`: inner dim mismatch ({} vs {})",
            self.name(),
            k_a,
            k_b
        );
        let batch = broadcast_batch(&a.dim()[..rank - 2], &b.dim()[..rank - 2], self.name())?;
        let mut c = self.c.write().unwrap();
        if c.dim().is_empty() {
            let mut dim = batch;
            dim.push(m);
            dim.push(n);
            let stride = crate::attributes::TensorAttr::contiguous_strides(&dim);
            *c = c.clone().set_dim(dim).set_stride(stride);
        }
        c.fill_from_context(ctx);
        Ok(())
    }

    pub fn post_validate(&self) -> Result<()> {
        let a = self.a.read().unwrap();
        let b = self.b.read().unwrap();
        let c = self.c.read().unwrap();
        fusilli_ensure!(
            c.rank() == a.rank(),
            ErrorKind::InvalidAttribute,
            "matmul `{}`: output rank does not match operand rank",
            self.name()
        );
        if a.data_type() != b.data_type() {
            fusilli_ensure!(
                a.rank() == 3,
                ErrorKind::InvalidAttribute,
                "matmul `{}`: mixed-precision operands require rank 3 (a single batch dim), got rank {}",
                self.name(),
                a.rank()
            );
            fusilli_ensure!(
                a.dim()[0] == b.dim()[0],
                ErrorKind::InvalidAttribute,
                "matmul `{}`: mixed-precision operands must have equal batch dims ({} vs {})",
                self.name(),
                a.dim()[0],
                b.dim()[0]
            );
        }
        let rank = a.rank();
        if rank > 2 {
            fusilli_ensure!(
                a.logical_to_physical_permutation()[..rank - 2] == (0..rank - 2).collect::<Vec<_>>()
                    && b.logical_to_physical_permutation()[..rank - 2] == (0..rank - 2).collect::<Vec<_>>(),
                ErrorKind::InvalidAttribute,
                "matmul `{}`: batch dims must be outermost and non-transposed",
                self.name()
            );
        }
        Ok(())
    }

    pub fn emit_module_scope_asm(&self, _emitter: &mut Emitter) -> Result<()> {
        Ok(())
    }

    pub fn emit_pre_asm(&self, emitter: &mut Emitter) -> Result<()> {
        let a = self.a.read().unwrap().clone();
        let b = self.b.read().unwrap().clone();
        let c = self.c.read().unwrap().clone();
        let a_ssa = emitter.operand_in_logical_order(&a, self.name())?;
        let b_ssa = emitter.operand_in_logical_order(&b, self.name())?;
        let out_ssa = emitter.fresh_temp(&format!("{}_C", self.name()));
        emitter.emit_body_line(format!(
            "{out_ssa} = torch.aten.matmul {a_ssa}, {b_ssa} : {}, {} -> {}",
            Emitter::vtensor_type(&a),
            Emitter::vtensor_type(&b),
            Emitter::vtensor_type(&c),
        ));
        emitter.write_back_physical_layout(&c, &out_ssa, self.name())?;
        Ok(())
    }

    pub fn emit_post_asm(&self, _emitter: &mut Emitter) -> Result<()> {
        Ok(())
    }
}
