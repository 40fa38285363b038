/// One CPACS value a module reads or writes.
#[derive(Debug, Clone, PartialEq)]
pub struct VarSpec {
    pub var_name: String,
    pub default_value: Option<f64>,
    pub unit: String,
    pub description: String,
    pub xpath: String,
}

impl VarSpec {
    pub fn new(var_name: &str, xpath: impl Into<String>) -> Self {
        Self {
            var_name: var_name.to_string(),
            default_value: None,
            unit: "1".to_string(),
            description: String::new(),
            xpath: xpath.into(),
        }
    }

    pub fn default_value(mut self, value: f64) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// The inputs and outputs a module declares against the CPACS file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpacsInOut {
    pub inputs: Vec<VarSpec>,
    pub outputs: Vec<VarSpec>,
}

impl CpacsInOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_input(mut self, spec: VarSpec) -> Self {
        self.inputs.push(spec);
        self
    }

    pub fn add_output(mut self, spec: VarSpec) -> Self {
        self.outputs.push(spec);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }
}

/// Workflow-integration metadata for modules run by an external workflow engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Integration {
    pub name: &'static str,
    pub description: &'static str,
    pub exec: &'static str,
    pub author: &'static str,
    pub email: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleSpec {
    pub name: &'static str,
    pub integration: Option<Integration>,
    pub inout: CpacsInOut,
}

impl ModuleSpec {
    pub fn input(&self, var_name: &str) -> Option<&VarSpec> {
        self.inout.inputs.iter().find(|v| v.var_name == var_name)
    }

    pub fn output(&self, var_name: &str) -> Option<&VarSpec> {
        self.inout.outputs.iter().find(|v| v.var_name == var_name)
    }
}
