use super::error::EngineError;
use crate::core::cpacs::{CpacsDocument, Element, OPTIM_VARIABLES_XPATH};
use crate::core::specs::{ModuleSpec, VarSpec};
use indexmap::IndexMap;
use std::path::Path;
use tracing::{debug, info};

/// A named value tracked across the optimisation run.
///
/// `history` is append-only: element 0 is the value found when the
/// dictionaries were built, every later element belongs to one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableEntry {
    pub key: String,
    pub name: String,
    pub history: Vec<f64>,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub get_path: String,
    pub set_path: Option<String>,
    pub unit: Option<String>,
    pub description: Option<String>,
}

impl VariableEntry {
    pub fn initial(&self) -> Option<f64> {
        self.history.first().copied()
    }

    pub fn latest(&self) -> Option<f64> {
        self.history.last().copied()
    }

    pub fn push(&mut self, value: f64) {
        self.history.push(value);
    }

    pub fn is_design(&self) -> bool {
        self.set_path.is_some()
    }

    pub fn bounds(&self) -> (Option<f64>, Option<f64>) {
        (self.lower_bound, self.upper_bound)
    }
}

/// Keyed by variable key, in declaration order.
pub type DesignVariableDict = IndexMap<String, VariableEntry>;
pub type ResultVariableDict = IndexMap<String, VariableEntry>;

/// A variable declaration as stored under
/// `/cpacs/toolspecific/CEASIOMpy/Optimisation/variables/variable`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Declaration {
    pub key: String,
    pub name: Option<String>,
    pub get_path: String,
    pub set_path: Option<String>,
    pub default: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub unit: Option<String>,
    pub description: Option<String>,
}

impl Declaration {
    fn from_element(element: &Element) -> Result<Self, EngineError> {
        let text = |tag: &str| {
            element
                .child(tag)
                .map(Element::text)
                .filter(|t| !t.is_empty())
        };
        let key = text("key").ok_or_else(|| {
            EngineError::InvalidDeclaration("a variable declaration has no <key>".to_string())
        })?;
        let number = |tag: &str| -> Result<Option<f64>, EngineError> {
            text(tag)
                .map(|raw| {
                    raw.parse::<f64>().map_err(|_| {
                        EngineError::InvalidDeclaration(format!(
                            "<{}> of '{}' is not a number: '{}'",
                            tag, key, raw
                        ))
                    })
                })
                .transpose()
        };

        let declaration = Declaration {
            get_path: text("getPath").ok_or_else(|| {
                EngineError::InvalidDeclaration(format!("variable '{}' has no <getPath>", key))
            })?,
            name: text("name"),
            set_path: text("setPath"),
            default: number("default")?,
            min: number("min")?,
            max: number("max")?,
            unit: text("unit"),
            description: text("description"),
            key,
        };

        if let (Some(min), Some(max)) = (declaration.min, declaration.max) {
            if min > max {
                return Err(EngineError::InvalidDeclaration(format!(
                    "variable '{}' has min {} greater than max {}",
                    declaration.key, min, max
                )));
            }
        }
        Ok(declaration)
    }

    fn to_element(&self) -> Element {
        let mut element = Element::new("variable");
        let mut push = |tag: &str, value: Option<String>| {
            if let Some(value) = value {
                element.push_child(Element::with_text(tag, value));
            }
        };
        push("key", Some(self.key.clone()));
        push("name", self.name.clone());
        push("getPath", Some(self.get_path.clone()));
        push("setPath", self.set_path.clone());
        push("default", self.default.map(|v| v.to_string()));
        push("min", self.min.map(|v| v.to_string()));
        push("max", self.max.map(|v| v.to_string()));
        push("unit", self.unit.clone());
        push("description", self.description.clone());
        element
    }

    fn into_entry(self, initial: f64) -> VariableEntry {
        VariableEntry {
            name: self.name.unwrap_or_else(|| self.key.clone()),
            key: self.key,
            history: vec![initial],
            lower_bound: self.min,
            upper_bound: self.max,
            get_path: self.get_path,
            set_path: self.set_path,
            unit: self.unit,
            description: self.description,
        }
    }
}

pub fn read_declarations(doc: &CpacsDocument) -> Result<Vec<Declaration>, EngineError> {
    let xpath = format!("{}/variable", OPTIM_VARIABLES_XPATH);
    doc.elements(&xpath)?
        .into_iter()
        .map(Declaration::from_element)
        .collect()
}

/// Builds `(results, design)` from the declarations embedded in the CPACS file.
pub fn init_dict(cpacs_path: &Path) -> Result<(ResultVariableDict, DesignVariableDict), EngineError> {
    info!("Building variable dictionaries from {:?}", cpacs_path);
    let doc = CpacsDocument::open(cpacs_path)?;
    build_dicts(&doc)
}

pub fn build_dicts(
    doc: &CpacsDocument,
) -> Result<(ResultVariableDict, DesignVariableDict), EngineError> {
    let mut results = ResultVariableDict::new();
    let mut design = DesignVariableDict::new();

    for declaration in read_declarations(doc)? {
        if results.contains_key(&declaration.key) || design.contains_key(&declaration.key) {
            return Err(EngineError::InvalidDeclaration(format!(
                "variable '{}' is declared more than once",
                declaration.key
            )));
        }

        let initial = match doc.get_f64(&declaration.get_path)? {
            Some(value) => value,
            None => declaration
                .default
                .ok_or_else(|| EngineError::MissingDeclaration {
                    key: declaration.key.clone(),
                    xpath: declaration.get_path.clone(),
                })?,
        };

        let entry = declaration.into_entry(initial);
        debug!(
            key = %entry.key,
            initial,
            design = entry.is_design(),
            "Registered variable."
        );
        let target = if entry.is_design() {
            &mut design
        } else {
            &mut results
        };
        target.insert(entry.key.clone(), entry);
    }

    Ok((results, design))
}

/// Appends the value found at every result variable's get path.
///
/// All values are read before any history is touched, so a missing path
/// leaves every history unchanged.
pub fn update_res_var_dict(
    results: &mut ResultVariableDict,
    doc: &CpacsDocument,
) -> Result<(), EngineError> {
    let mut values = Vec::with_capacity(results.len());
    for (key, entry) in results.iter() {
        let value = doc
            .get_f64(&entry.get_path)?
            .ok_or_else(|| EngineError::PathNotFound {
                key: key.clone(),
                xpath: entry.get_path.clone(),
            })?;
        values.push(value);
    }
    for (entry, value) in results.values_mut().zip(values) {
        entry.push(value);
    }
    Ok(())
}

/// Writes the latest value of every design variable at its set path.
pub fn apply_design_variables(
    doc: &mut CpacsDocument,
    design: &DesignVariableDict,
) -> Result<(), EngineError> {
    for (key, entry) in design {
        let (Some(set_path), Some(value)) = (&entry.set_path, entry.latest()) else {
            continue;
        };
        debug!(key = %key, value, xpath = %set_path, "Applying design variable.");
        doc.set_f64(set_path, value)?;
    }
    Ok(())
}

/// Declares the variables of a module spec in the CPACS file.
///
/// Inputs become design variables (set and get at the same path), outputs
/// become result variables. With `spread`, inputs that carry a default get
/// bounds `default -/+ spread * |default|`. Keys that are already declared are
/// left untouched. Returns the number of declarations added.
pub fn declare_from_spec(
    doc: &mut CpacsDocument,
    spec: &ModuleSpec,
    spread: Option<f64>,
) -> Result<usize, EngineError> {
    let existing: Vec<String> = read_declarations(doc)?
        .into_iter()
        .map(|d| d.key)
        .collect();

    let declaration = |var: &VarSpec, design: bool| {
        let bounds = match (design, var.default_value, spread) {
            (true, Some(default), Some(spread)) => {
                let delta = spread.abs() * default.abs();
                (Some(default - delta), Some(default + delta))
            }
            _ => (None, None),
        };
        Declaration {
            key: var.var_name.clone(),
            name: Some(var.var_name.clone()),
            get_path: var.xpath.clone(),
            set_path: design.then(|| var.xpath.clone()),
            default: var.default_value,
            min: bounds.0,
            max: bounds.1,
            unit: Some(var.unit.clone()),
            description: Some(var.description.clone()).filter(|d| !d.is_empty()),
        }
    };

    let new_declarations: Vec<Declaration> = spec
        .inout
        .inputs
        .iter()
        .map(|v| declaration(v, true))
        .chain(spec.inout.outputs.iter().map(|v| declaration(v, false)))
        .filter(|d| !existing.contains(&d.key))
        .collect();

    let container = doc.ensure_element(OPTIM_VARIABLES_XPATH)?;
    for declaration in &new_declarations {
        container.push_child(declaration.to_element());
    }
    info!(
        "Declared {} variable(s) from module '{}'.",
        new_declarations.len(),
        spec.name
    );
    Ok(new_declarations.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::specs::registry;
    use tempfile::tempdir;

    const CPACS: &str = r#"<cpacs>
  <toolspecific><CEASIOMpy>
    <ranges><cruiseSpeed>272</cruiseSpeed></ranges>
    <aerodynamics><su2><cl>0.5</cl></su2></aerodynamics>
    <Optimisation><variables>
      <variable>
        <key>cruise_speed</key>
        <name>Cruise speed</name>
        <getPath>/cpacs/toolspecific/CEASIOMpy/ranges/cruiseSpeed</getPath>
        <setPath>/cpacs/toolspecific/CEASIOMpy/ranges/cruiseSpeed</setPath>
        <min>200</min>
        <max>300</max>
        <unit>m/s</unit>
        <description>Cruise speed of the reference point</description>
      </variable>
      <variable>
        <key>cruise_alt</key>
        <getPath>/cpacs/toolspecific/CEASIOMpy/ranges/cruiseAltitude</getPath>
        <setPath>/cpacs/toolspecific/CEASIOMpy/ranges/cruiseAltitude</setPath>
        <default>12000</default>
      </variable>
      <variable>
        <key>cl</key>
        <getPath>/cpacs/toolspecific/CEASIOMpy/aerodynamics/su2/cl</getPath>
      </variable>
      <variable>
        <key>cd</key>
        <getPath>/cpacs/toolspecific/CEASIOMpy/aerodynamics/su2/cd</getPath>
        <default>0.1</default>
        <min>-1</min>
      </variable>
    </variables></Optimisation>
  </CEASIOMpy></toolspecific>
</cpacs>"#;

    fn doc() -> CpacsDocument {
        CpacsDocument::parse_str(CPACS).unwrap()
    }

    #[test]
    fn build_dicts_classifies_by_set_path() {
        let (results, design) = build_dicts(&doc()).unwrap();
        assert_eq!(design.keys().collect::<Vec<_>>(), ["cruise_speed", "cruise_alt"]);
        assert_eq!(results.keys().collect::<Vec<_>>(), ["cl", "cd"]);
        assert!(design.values().all(VariableEntry::is_design));
        assert!(!results.values().any(VariableEntry::is_design));
    }

    #[test]
    fn build_dicts_reads_current_values_and_bounds() {
        let (results, design) = build_dicts(&doc()).unwrap();
        let speed = &design["cruise_speed"];
        assert_eq!(speed.history, vec![272.0]);
        assert_eq!(speed.name, "Cruise speed");
        assert_eq!(speed.bounds(), (Some(200.0), Some(300.0)));
        assert_eq!(speed.unit.as_deref(), Some("m/s"));
        assert_eq!(
            speed.description.as_deref(),
            Some("Cruise speed of the reference point")
        );
        assert_eq!(results["cl"].description, None);
        assert_eq!(results["cl"].history, vec![0.5]);
        assert_eq!(results["cl"].name, "cl");
        assert_eq!(results["cd"].bounds(), (Some(-1.0), None));
    }

    #[test]
    fn missing_node_with_default_uses_the_default() {
        let (results, design) = build_dicts(&doc()).unwrap();
        assert_eq!(design["cruise_alt"].history, vec![12000.0]);
        assert_eq!(results["cd"].history, vec![0.1]);
    }

    #[test]
    fn missing_node_without_default_is_a_missing_declaration() {
        let mut doc = doc();
        doc.remove("/cpacs/toolspecific/CEASIOMpy/aerodynamics/su2/cl")
            .unwrap();
        let result = build_dicts(&doc);
        assert!(matches!(
            result,
            Err(EngineError::MissingDeclaration { ref key, .. }) if key == "cl"
        ));
    }

    #[test]
    fn duplicate_and_malformed_declarations_are_rejected() {
        let mut duplicated = doc();
        let container = duplicated.ensure_element(OPTIM_VARIABLES_XPATH).unwrap();
        let copy = container.children[0].clone();
        container.children.push(copy);
        assert!(matches!(
            build_dicts(&duplicated),
            Err(EngineError::InvalidDeclaration(_))
        ));

        let mut inverted = doc();
        inverted
            .set_text(
                &format!("{}/variable[1]/min", OPTIM_VARIABLES_XPATH),
                "400",
            )
            .unwrap();
        assert!(matches!(
            build_dicts(&inverted),
            Err(EngineError::InvalidDeclaration(_))
        ));

        let mut non_numeric = doc();
        non_numeric
            .set_text(
                &format!("{}/variable[2]/default", OPTIM_VARIABLES_XPATH),
                "high",
            )
            .unwrap();
        assert!(matches!(
            build_dicts(&non_numeric),
            Err(EngineError::InvalidDeclaration(_))
        ));
    }

    #[test]
    fn init_dict_reads_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ToolInput.xml");
        doc().save(&path).unwrap();
        let (results, design) = init_dict(&path).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(design.len(), 2);
    }

    #[test]
    fn update_appends_one_value_per_result() {
        let (mut results, _) = build_dicts(&doc()).unwrap();
        let mut output = doc();
        output
            .set_f64("/cpacs/toolspecific/CEASIOMpy/aerodynamics/su2/cl", 0.6)
            .unwrap();
        output
            .set_f64("/cpacs/toolspecific/CEASIOMpy/aerodynamics/su2/cd", 0.12)
            .unwrap();

        update_res_var_dict(&mut results, &output).unwrap();

        assert_eq!(results["cl"].history, vec![0.5, 0.6]);
        assert_eq!(results["cd"].history, vec![0.1, 0.12]);
    }

    #[test]
    fn update_with_missing_path_appends_nothing() {
        let (mut results, _) = build_dicts(&doc()).unwrap();
        let output = doc();

        let result = update_res_var_dict(&mut results, &output);

        assert!(matches!(
            result,
            Err(EngineError::PathNotFound { ref key, .. }) if key == "cd"
        ));
        assert_eq!(results["cl"].history.len(), 1);
        assert_eq!(results["cd"].history.len(), 1);
    }

    #[test]
    fn applied_design_values_read_back_identically() {
        let (_, mut design) = build_dicts(&doc()).unwrap();
        design["cruise_speed"].push(251.123456789);
        design["cruise_alt"].push(10_500.5);
        let mut target = doc();

        apply_design_variables(&mut target, &design).unwrap();

        for entry in design.values() {
            let read = target.get_f64(&entry.get_path).unwrap().unwrap();
            assert!((read - entry.latest().unwrap()).abs() < 1e-12);
        }
    }

    #[test]
    fn declare_from_spec_seeds_design_and_result_variables() {
        let mut doc = CpacsDocument::parse_str("<cpacs/>").unwrap();
        let spec = registry::lookup("SkinFriction").unwrap();

        let added = declare_from_spec(&mut doc, &spec, Some(0.1)).unwrap();
        assert_eq!(added, 6);

        let declarations = read_declarations(&doc).unwrap();
        let speed = declarations
            .iter()
            .find(|d| d.key == "cruise_speed")
            .unwrap();
        assert_eq!(speed.set_path.as_deref(), Some(speed.get_path.as_str()));
        assert!((speed.min.unwrap() - 244.8).abs() < 1e-9);
        assert!((speed.max.unwrap() - 299.2).abs() < 1e-9);
        assert_eq!(speed.unit.as_deref(), Some("m/s"));

        let wetted = declarations
            .iter()
            .find(|d| d.key == "wetted_area")
            .unwrap();
        assert_eq!(wetted.min, None);

        let cd0 = declarations.iter().find(|d| d.key == "cd0").unwrap();
        assert_eq!(cd0.set_path, None);

        assert_eq!(declare_from_spec(&mut doc, &spec, None).unwrap(), 0);
    }
}
