#[derive(Debug, Clone, Default)]
pub struct MatmulAttr {
    name: String,
    transpose_a: bool,
    transpose_b: bool,
}

impl MatmulAttr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn set_transpose_a(mut self, v: bool) -> Self {
        self.transpose_a = v;
        self
    }

    pub fn set_transpose_b(mut self, v: bool) -> Self {
        self.transpose_b = v;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transpose_a(&self) -> bool {
        self.transpose_a
    }

    pub fn transpose_b(&self) -> bool {
        self.transpose_b
    }
}
