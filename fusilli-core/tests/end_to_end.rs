//! Numeric end-to-end scenarios. These exercise `compile()`/`execute()`
//! against a real compiled-and-loaded module and therefore require an
//! installed IREE-family compiler and its shared runtime library; they are
//! `#[ignore]`d and gated at the top of each test so `cargo test` in an
//! environment without the toolchain reports them skipped rather than
//! failing.

use fusilli_core::support::external_tools;
use fusilli_core::{mark_output, Backend, ConvAttr, DataType, Graph, Handle, MatmulAttr, PointwiseAttr, PointwiseMode, TensorAttr, VariantPack};

fn toolchain_available() -> bool {
    external_tools::find_iree_compile().is_some() && external_tools::find_iree_compiler_lib().is_some()
}

fn contiguous(name: &str, dim: Vec<i64>) -> TensorAttr {
    let stride = TensorAttr::contiguous_strides(&dim);
    TensorAttr::new().set_name(name).set_dim(dim).set_stride(stride).set_data_type(DataType::Float)
}

#[test]
#[ignore = "requires an installed IREE-family compiler and runtime library"]
fn conv_fprop_1x1_all_ones_yields_channel_count() {
    assert!(toolchain_available(), "toolchain not found; run with FUSILLI_IREE_COMPILE_PATH/FUSILLI_IREE_COMPILER_LIB_PATH set");

    let mut g = Graph::new("e2e_conv_fprop");
    let x = g.tensor(contiguous("X", vec![4, 8, 8, 8]));
    let w = g.tensor(contiguous("W", vec![16, 8, 1, 1]));
    let y = g.conv_fprop(ConvAttr::new().set_padding(vec![0, 0]).set_stride(vec![1, 1]).set_dilation(vec![1, 1]), x.clone(), w.clone());
    mark_output(&y);
    g.validate().unwrap();

    let handle = Handle::create(Backend::Cpu, 0, 0).unwrap();
    g.compile(&handle, true).unwrap();

    let x_data = vec![1.0f32; 4 * 8 * 8 * 8];
    let w_data = vec![1.0f32; 16 * 8 * 1 * 1];
    let y_data = vec![0.0f32; 4 * 16 * 8 * 8];
    let x_buf = fusilli_core::Buffer::allocate(&handle, &[4, 8, 8, 8], &x_data).unwrap();
    let w_buf = fusilli_core::Buffer::allocate(&handle, &[16, 8, 1, 1], &w_data).unwrap();
    let y_buf = fusilli_core::Buffer::allocate(&handle, &[4, 16, 8, 8], &y_data).unwrap();

    let vp = VariantPack::new().bind(&x, &x_buf).bind(&w, &w_buf).bind(&y, &y_buf);
    g.execute(&handle, &vp, None).unwrap();

    let mut out = Vec::new();
    y_buf.read::<f32>(&mut out).unwrap();
    assert!(out.iter().all(|&v| (v - 8.0).abs() < 1e-5));
}

#[test]
#[ignore = "requires an installed IREE-family compiler and runtime library"]
fn conv_wgrad_1x1_all_ones_with_bias() {
    assert!(toolchain_available(), "toolchain not found");

    let mut g = Graph::new("e2e_conv_wgrad_bias");
    let dy = g.tensor(contiguous("DY", vec![4, 16, 8, 8]));
    let x = g.tensor(contiguous("X", vec![4, 8, 8, 8]));
    let attr = ConvAttr::new().set_padding(vec![0, 0]).set_stride(vec![1, 1]).set_dilation(vec![1, 1]);
    let dw = g.conv_wgrad(attr, dy.clone(), x.clone(), contiguous("DW", vec![16, 8, 1, 1]));
    let db_shape = TensorAttr::new().set_name("DB").set_dim(vec![1, 16, 1, 1]).set_stride(vec![16, 1, 1, 1]).set_data_type(DataType::Float);
    let db = g.reduction(
        fusilli_core::ReductionAttr::new().set_mode(fusilli_core::ReductionMode::Sum),
        dy.clone(),
        db_shape,
    );
    mark_output(&dw);
    mark_output(&db);
    g.validate().unwrap();

    let handle = Handle::create(Backend::Cpu, 0, 0).unwrap();
    g.compile(&handle, true).unwrap();

    let dy_buf = fusilli_core::Buffer::allocate(&handle, &[4, 16, 8, 8], &vec![1.0f32; 4 * 16 * 8 * 8]).unwrap();
    let x_buf = fusilli_core::Buffer::allocate(&handle, &[4, 8, 8, 8], &vec![1.0f32; 4 * 8 * 8 * 8]).unwrap();
    let dw_buf = fusilli_core::Buffer::allocate(&handle, &[16, 8, 1, 1], &vec![0.0f32; 16 * 8]).unwrap();
    let db_buf = fusilli_core::Buffer::allocate(&handle, &[1, 16, 1, 1], &vec![0.0f32; 16]).unwrap();

    let vp = VariantPack::new().bind(&dy, &dy_buf).bind(&x, &x_buf).bind(&dw, &dw_buf).bind(&db, &db_buf);
    g.execute(&handle, &vp, None).unwrap();

    let mut dw_out = Vec::new();
    dw_buf.read::<f32>(&mut dw_out).unwrap();
    assert!(dw_out.iter().all(|&v| (v - 256.0).abs() < 1e-3));

    let mut db_out = Vec::new();
    db_buf.read::<f32>(&mut db_out).unwrap();
    assert!(db_out.iter().all(|&v| (v - 256.0).abs() < 1e-3));
}

#[test]
#[ignore = "requires an installed IREE-family compiler and runtime library"]
fn batched_matmul_with_bias() {
    assert!(toolchain_available(), "toolchain not found");

    let mut g = Graph::new("e2e_batched_matmul_bias");
    let a = g.tensor(contiguous("A", vec![16, 32, 64]));
    let b = g.tensor(contiguous("B", vec![16, 64, 128]));
    let bias = g.tensor(contiguous("BIAS", vec![1, 1, 128]));
    let c = g.matmul(MatmulAttr::new(), a.clone(), b.clone());
    let out = g.pointwise(PointwiseAttr::new().set_mode(PointwiseMode::Add), c, Some(bias.clone()));
    mark_output(&out);
    g.validate().unwrap();

    let handle = Handle::create(Backend::Cpu, 0, 0).unwrap();
    g.compile(&handle, true).unwrap();

    let a_buf = fusilli_core::Buffer::allocate(&handle, &[16, 32, 64], &vec![1.0f32; 16 * 32 * 64]).unwrap();
    let b_buf = fusilli_core::Buffer::allocate(&handle, &[16, 64, 128], &vec![1.0f32; 16 * 64 * 128]).unwrap();
    let bias_buf = fusilli_core::Buffer::allocate(&handle, &[1, 1, 128], &vec![2.0f32; 128]).unwrap();
    let out_buf = fusilli_core::Buffer::allocate(&handle, &[16, 32, 128], &vec![0.0f32; 16 * 32 * 128]).unwrap();

    let vp = VariantPack::new().bind(&a, &a_buf).bind(&b, &b_buf).bind(&bias, &bias_buf).bind(&out, &out_buf);
    g.execute(&handle, &vp, None).unwrap();

    let mut result = Vec::new();
    out_buf.read::<f32>(&mut result).unwrap();
    assert!(result.iter().all(|&v| (v - 66.0).abs() < 1e-3));
}

#[test]
#[ignore = "requires an installed IREE-family compiler and runtime library"]
fn pointwise_add_with_transposed_operand() {
    assert!(toolchain_available(), "toolchain not found");

    let mut g = Graph::new("e2e_pointwise_transposed");
    let a = g.tensor(contiguous("A", vec![3, 2]));
    let b = g.tensor(
        TensorAttr::new()
            .set_name("B")
            .set_dim(vec![3, 2])
            .set_stride(vec![1, 3])
            .set_data_type(DataType::Float),
    );
    let out = g.pointwise(PointwiseAttr::new().set_mode(PointwiseMode::Add), a.clone(), Some(b.clone()));
    mark_output(&out);
    g.validate().unwrap();

    let handle = Handle::create(Backend::Cpu, 0, 0).unwrap();
    g.compile(&handle, true).unwrap();

    // A is row-major [1,2,3,4,5,6]; B has the same backing data but stride
    // [1,3], so B logically equals transpose(A)'s data interpretation.
    let data = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
    let a_buf = fusilli_core::Buffer::allocate(&handle, &[3, 2], &data).unwrap();
    let b_buf = fusilli_core::Buffer::allocate(&handle, &[3, 2], &data).unwrap();
    let out_buf = fusilli_core::Buffer::allocate(&handle, &[3, 2], &vec![0.0f32; 6]).unwrap();

    let vp = VariantPack::new().bind(&a, &a_buf).bind(&b, &b_buf).bind(&out, &out_buf);
    g.execute(&handle, &vp, None).unwrap();

    let mut result = Vec::new();
    out_buf.read::<f32>(&mut result).unwrap();
    assert_eq!(result, vec![2.0, 6.0, 5.0, 9.0, 8.0, 12.0]);
}

#[test]
#[ignore = "requires an installed IREE-family compiler and runtime library"]
fn layernorm_training_nchw_matches_closed_form() {
    assert!(toolchain_available(), "toolchain not found");

    let mut g = Graph::new("e2e_layernorm_training");
    let x = g.tensor(contiguous("X", vec![2, 3, 32, 32]));
    let scale = g.tensor(TensorAttr::new().set_name("SCALE").set_dim(vec![1, 3, 32, 32]).set_stride(TensorAttr::contiguous_strides(&[1, 3, 32, 32])).set_data_type(DataType::Float));
    let bias = g.tensor(TensorAttr::new().set_name("BIAS").set_dim(vec![1, 3, 32, 32]).set_stride(TensorAttr::contiguous_strides(&[1, 3, 32, 32])).set_data_type(DataType::Float));
    let eps = g.tensor(TensorAttr::from_scalar(fusilli_core::ScalarValue::Double(1e-5)).set_name("EPS"));

    let (y, mean, inv_var) = g.layernorm(
        fusilli_core::LayernormAttr::new().set_forward_phase(fusilli_core::NormFwdPhase::Training),
        x.clone(),
        Some(scale.clone()),
        Some(bias.clone()),
        eps,
    );
    let mean = mean.unwrap();
    let inv_var = inv_var.unwrap();
    mark_output(&y);
    mark_output(&mean);
    mark_output(&inv_var);
    g.validate().unwrap();

    let handle = Handle::create(Backend::Cpu, 0, 0).unwrap();
    g.compile(&handle, true).unwrap();

    // Per batch b, the first half of X's 3*32*32 elements is 2b, the second
    // half is 2b+2; mean = 2b+1, variance = 1 (so inv-variance = 1/sqrt(1+eps)).
    let per_batch = 3 * 32 * 32;
    let mut x_data = Vec::with_capacity(2 * per_batch);
    for b in 0..2i64 {
        for i in 0..per_batch {
            x_data.push(if i < per_batch / 2 { (2 * b) as f32 } else { (2 * b + 2) as f32 });
        }
    }
    let scale_data = vec![0.5f32; per_batch];
    let bias_data = vec![1.0f32; per_batch];

    let x_buf = fusilli_core::Buffer::allocate(&handle, &[2, 3, 32, 32], &x_data).unwrap();
    let scale_buf = fusilli_core::Buffer::allocate(&handle, &[1, 3, 32, 32], &scale_data).unwrap();
    let bias_buf = fusilli_core::Buffer::allocate(&handle, &[1, 3, 32, 32], &bias_data).unwrap();
    let y_buf = fusilli_core::Buffer::allocate(&handle, &[2, 3, 32, 32], &vec![0.0f32; 2 * per_batch]).unwrap();
    let mean_buf = fusilli_core::Buffer::allocate(&handle, &[2, 1, 1, 1], &vec![0.0f32; 2]).unwrap();
    let inv_var_buf = fusilli_core::Buffer::allocate(&handle, &[2, 1, 1, 1], &vec![0.0f32; 2]).unwrap();

    let vp = VariantPack::new()
        .bind(&x, &x_buf)
        .bind(&scale, &scale_buf)
        .bind(&bias, &bias_buf)
        .bind(&y, &y_buf)
        .bind(&mean, &mean_buf)
        .bind(&inv_var, &inv_var_buf);
    g.execute(&handle, &vp, None).unwrap();

    let mut mean_out = Vec::new();
    mean_buf.read::<f32>(&mut mean_out).unwrap();
    assert!((mean_out[0] - 1.0).abs() < 1e-3);
    assert!((mean_out[1] - 3.0).abs() < 1e-3);

    let mut inv_var_out = Vec::new();
    inv_var_buf.read::<f32>(&mut inv_var_out).unwrap();
    assert!((inv_var_out[0] - 1.0).abs() < 1e-2);

    let mut y_out = Vec::new();
    y_buf.read::<f32>(&mut y_out).unwrap();
    let expected_lo = 0.5 * (-1.0 / (1.0f64 + 1e-5).sqrt()) + 1.0;
    let expected_hi = 0.5 * (1.0 / (1.0f64 + 1e-5).sqrt()) + 1.0;
    assert!((y_out[0] as f64 - expected_lo).abs() < 1e-2);
    assert!((y_out[per_batch - 1] as f64 - expected_hi).abs() < 1e-2);
}

#[test]
#[ignore = "requires an installed IREE-family compiler and runtime library"]
fn cache_hit_determinism_across_fresh_instances() {
    assert!(toolchain_available(), "toolchain not found");

    let build = || {
        let mut g = Graph::new("e2e_cache_determinism");
        let x = g.tensor(contiguous("X", vec![4]));
        let out = g.pointwise(PointwiseAttr::new().set_mode(PointwiseMode::ReluFwd), x, None);
        mark_output(&out);
        g.validate().unwrap();
        g
    };

    let handle = Handle::create(Backend::Cpu, 0, 0).unwrap();

    let mut g1 = build();
    let recompiled_1 = g1.compile(&handle, false).unwrap();
    assert!(recompiled_1);
    let asm1 = g1.emit_asm().unwrap();

    let mut g2 = build();
    // A fresh Graph instance never trusts on-disk cache state: this always
    // reports a recompile even though the two graphs are structurally
    // identical and will produce byte-identical IR.
    let recompiled_2 = g2.compile(&handle, true).unwrap();
    assert!(recompiled_2);
    let asm2 = g2.emit_asm().unwrap();

    assert_eq!(asm1, asm2);
}
