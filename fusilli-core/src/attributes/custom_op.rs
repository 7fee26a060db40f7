#[derive(Debug, Clone, Default)]
pub struct CustomOpAttr {
    name: String,
    mlir_template: String,
    output_count: usize,
}

impl CustomOpAttr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// A `func.func private` template with `{FUNC_NAME}`, `{IN<i>_DTYPE}`,
    /// `{OUT<i>_DTYPE}` placeholders, resolved at emission time.
    pub fn set_mlir_template(mut self, template: impl Into<String>) -> Self {
        self.mlir_template = template.into();
        self
    }

    pub fn set_output_count(mut self, count: usize) -> Self {
        self.output_count = count;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mlir_template(&self) -> &str {
        &self.mlir_template
    }

    pub fn output_count(&self) -> usize {
        self.output_count
    }
}
