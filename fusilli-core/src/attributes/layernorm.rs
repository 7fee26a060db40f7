/// Which direction a layernorm node computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormFwdPhase {
    Inference,
    Training,
}

#[derive(Debug, Clone)]
pub struct LayernormAttr {
    name: String,
    phase: Option<NormFwdPhase>,
}

impl Default for LayernormAttr {
    fn default() -> Self {
        Self {
            name: String::new(),
            phase: None,
        }
    }
}

impl LayernormAttr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn set_forward_phase(mut self, phase: NormFwdPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn forward_phase(&self) -> Option<NormFwdPhase> {
        self.phase
    }
}
