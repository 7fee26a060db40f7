//! Exercises the graph-builder API end to end through `validate()` and
//! `emit_asm()`, without a compile/execute step (no toolchain required).

use fusilli_core::{
    mark_output, Context, ConvAttr, CustomOpAttr, DataType, ErrorKind, Graph, LayernormAttr, MatmulAttr, NormFwdPhase,
    PointwiseAttr, PointwiseMode, ReductionAttr, ReductionMode, ScalarValue, TensorAttr,
};

fn input(g: &mut Graph, name: &str, dim: Vec<i64>) -> fusilli_core::SharedTensor {
    let stride = TensorAttr::contiguous_strides(&dim);
    g.tensor(TensorAttr::new().set_name(name).set_dim(dim).set_stride(stride).set_data_type(DataType::Float))
}

#[test]
fn matmul_batched_with_bias_shapes() {
    let mut g = Graph::new("batched_matmul_bias");
    let a = input(&mut g, "A", vec![16, 32, 64]);
    let b = input(&mut g, "B", vec![16, 64, 128]);
    let bias = input(&mut g, "BIAS", vec![1, 1, 128]);

    let c = g.matmul(MatmulAttr::new(), a, b);
    let out = g.pointwise(PointwiseAttr::new().set_mode(PointwiseMode::Add), c, Some(bias));
    mark_output(&out);

    g.validate().unwrap();
    assert_eq!(out.read().unwrap().dim(), &[16, 32, 128]);
}

#[test]
fn pointwise_broadcasts_and_infers_contiguous_stride() {
    let mut g = Graph::new("broadcast_add");
    let a = input(&mut g, "A", vec![3, 2]);
    let b = g.tensor(
        TensorAttr::new()
            .set_name("B")
            .set_dim(vec![3, 2])
            .set_stride(vec![1, 3])
            .set_data_type(DataType::Float),
    );
    let out = g.pointwise(PointwiseAttr::new().set_mode(PointwiseMode::Add), a, Some(b));
    mark_output(&out);
    g.validate().unwrap();
    assert_eq!(out.read().unwrap().dim(), &[3, 2]);
    assert!(out.read().unwrap().is_contiguous());
}

#[test]
fn comparison_pointwise_forces_boolean_output() {
    let mut g = Graph::new("cmp");
    let a = input(&mut g, "A", vec![4]);
    let b = input(&mut g, "B", vec![4]);
    let out = g.pointwise(PointwiseAttr::new().set_mode(PointwiseMode::CmpNe), a, Some(b));
    mark_output(&out);
    g.validate().unwrap();
    assert_eq!(out.read().unwrap().data_type(), DataType::Boolean);
}

#[test]
fn reduction_sum_over_last_axis() {
    let mut g = Graph::new("reduce_sum");
    let x = input(&mut g, "X", vec![4, 16, 8, 8]);
    let y_shape = TensorAttr::new().set_dim(vec![4, 16, 8, 1]).set_stride(vec![128, 8, 1, 1]).set_data_type(DataType::Float);
    let y = g.reduction(ReductionAttr::new().set_mode(ReductionMode::Sum), x, y_shape);
    mark_output(&y);
    g.validate().unwrap();
    assert_eq!(y.read().unwrap().dim(), &[4, 16, 8, 1]);
}

#[test]
fn layernorm_training_returns_mean_and_inv_variance() {
    let mut g = Graph::new("layernorm_train");
    let x = input(&mut g, "X", vec![2, 3, 32, 32]);
    let scale = input(&mut g, "SCALE", vec![1, 3, 32, 32]);
    let bias = input(&mut g, "BIAS", vec![1, 3, 32, 32]);
    let eps = g.tensor(TensorAttr::from_scalar(ScalarValue::Double(1e-5)).set_name("EPS"));

    let (y, mean, inv_var) = g.layernorm(
        LayernormAttr::new().set_forward_phase(NormFwdPhase::Training),
        x,
        Some(scale),
        Some(bias),
        eps,
    );
    mark_output(&y);
    let mean = mean.unwrap();
    let inv_var = inv_var.unwrap();
    mark_output(&mean);
    mark_output(&inv_var);

    g.validate().unwrap();
    assert_eq!(mean.read().unwrap().dim(), &[2, 1, 1, 1]);
    assert_eq!(inv_var.read().unwrap().dim(), &[2, 1, 1, 1]);
}

#[test]
fn layernorm_inference_has_no_mean_or_inv_variance() {
    let mut g = Graph::new("layernorm_infer");
    let x = input(&mut g, "X", vec![2, 3, 32, 32]);
    let eps = g.tensor(TensorAttr::from_scalar(ScalarValue::Double(1e-5)).set_name("EPS"));
    let (y, mean, inv_var) = g.layernorm(
        LayernormAttr::new().set_forward_phase(NormFwdPhase::Inference),
        x,
        None,
        None,
        eps,
    );
    mark_output(&y);
    assert!(mean.is_none());
    assert!(inv_var.is_none());
    g.validate().unwrap();
}

#[test]
fn custom_op_emits_resolved_template_and_call_site() {
    let mut g = Graph::new("custom_relu_like");
    let x = input(&mut g, "X", vec![4]);
    let outputs = g.custom_op(
        CustomOpAttr::new()
            .set_mlir_template(
                "func.func private @{FUNC_NAME}(%arg0: {IN0_DTYPE}) -> {OUT0_DTYPE} { return %arg0 : {OUT0_DTYPE} }",
            )
            .set_output_count(1),
        vec![x],
        vec![TensorAttr::new().set_dim(vec![4]).set_stride(vec![1]).set_data_type(DataType::Float)],
    );
    mark_output(&outputs[0]);
    g.validate().unwrap();
    let asm = g.emit_asm().unwrap();
    assert!(asm.contains("func.func private @custom_op_0"));
}

#[test]
fn conv_wgrad_with_bias_shapes() {
    let mut g = Graph::new("conv_wgrad_bias");
    let dy = input(&mut g, "DY", vec![4, 16, 8, 8]);
    let x = input(&mut g, "X", vec![4, 8, 8, 8]);
    let attr = ConvAttr::new().set_padding(vec![0, 0]).set_stride(vec![1, 1]).set_dilation(vec![1, 1]);
    let dw = g.conv_wgrad(attr, dy, x, TensorAttr::new().set_dim(vec![16, 8, 1, 1]).set_stride(vec![8, 1, 1, 1]).set_data_type(DataType::Float));
    mark_output(&dw);
    g.validate().unwrap();
    assert_eq!(dw.read().unwrap().dim(), &[16, 8, 1, 1]);
}

#[test]
fn custom_context_propagates_intermediate_dtype() {
    let mut g = Graph::new("ctx_double").set_context(Context::new().set_io_data_type(DataType::Float).set_intermediate_data_type(DataType::Double));
    let x = input(&mut g, "X", vec![4]);
    let out = g.pointwise(PointwiseAttr::new().set_mode(PointwiseMode::ReluFwd), x, None);
    // Left virtual (not marked an output): fill_from_context assigns the
    // context's intermediate dtype rather than its IO dtype.
    g.validate().unwrap();
    assert_eq!(out.read().unwrap().data_type(), DataType::Double);
}

#[test]
fn matmul_mismatched_batch_rejected() {
    let mut g = Graph::new("bad_batch");
    let a = input(&mut g, "A", vec![3, 2, 4]);
    let b = input(&mut g, "B", vec![5, 4, 6]);
    let out = g.matmul(MatmulAttr::new(), a, b);
    mark_output(&out);
    assert_eq!(g.validate().unwrap_err().kind(), ErrorKind::InvalidAttribute);
}

#[test]
fn emit_asm_sorts_outputs_and_inputs_by_name() {
    let mut g = Graph::new("sorted_params");
    let b = input(&mut g, "B", vec![2]);
    let a = input(&mut g, "A", vec![2]);
    let out_z = g.pointwise(PointwiseAttr::new().set_mode(PointwiseMode::Add), a, Some(b));
    mark_output(&out_z);
    g.validate().unwrap();
    let asm = g.emit_asm().unwrap();
    let main_line = asm.lines().find(|l| l.contains("func.func @main")).unwrap();
    let in_a = main_line.find("%in0").unwrap();
    let in_b = main_line.find("%in1").unwrap();
    // inputs sorted by name: A before B.
    assert!(in_a < in_b);
}
