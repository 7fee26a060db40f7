use crate::data_type::DataType;

/// Graph-wide default dtypes, consulted by `TensorAttr::fill_from_context`
/// whenever a tensor's dtype was left `NotSet`.
#[derive(Debug, Clone, Copy)]
pub struct Context {
    io_data_type: DataType,
    intermediate_data_type: DataType,
    compute_data_type: DataType,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            io_data_type: DataType::Float,
            intermediate_data_type: DataType::Float,
            compute_data_type: DataType::Float,
        }
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_io_data_type(mut self, dt: DataType) -> Self {
        self.io_data_type = dt;
        self
    }

    pub fn set_intermediate_data_type(mut self, dt: DataType) -> Self {
        self.intermediate_data_type = dt;
        self
    }

    pub fn set_compute_data_type(mut self, dt: DataType) -> Self {
        self.compute_data_type = dt;
        self
    }

    pub fn io_data_type(&self) -> DataType {
        self.io_data_type
    }

    pub fn intermediate_data_type(&self) -> DataType {
        self.intermediate_data_type
    }

    pub fn compute_data_type(&self) -> DataType {
        self.compute_data_type
    }
}
