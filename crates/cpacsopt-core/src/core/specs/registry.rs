use super::models::{CpacsInOut, Integration, ModuleSpec, VarSpec};
use crate::core::cpacs::CEASIOM_XPATH;
use phf::{Map, phf_map};

type SpecFactory = fn() -> ModuleSpec;

static BUILTIN_SPECS: Map<&'static str, SpecFactory> = phf_map! {
    "SkinFriction" => skin_friction as SpecFactory,
    "CPACS2SUMO" => cpacs2sumo as SpecFactory,
};

pub fn lookup(module: &str) -> Option<ModuleSpec> {
    BUILTIN_SPECS.get(module).map(|factory| factory())
}

/// Names of all built-in modules, sorted.
pub fn module_names() -> Vec<&'static str> {
    let mut names: Vec<_> = BUILTIN_SPECS.keys().copied().collect();
    names.sort_unstable();
    names
}

fn ceasiom(suffix: &str) -> String {
    format!("{}{}", CEASIOM_XPATH, suffix)
}

fn skin_friction() -> ModuleSpec {
    let inout = CpacsInOut::new()
        .add_input(
            VarSpec::new("wetted_area", ceasiom("/geometry/analysis/wettedArea"))
                .unit("m^2")
                .description("Wetted area of the aircraft (calculated by SU2)"),
        )
        .add_input(
            VarSpec::new("cruise_speed", ceasiom("/ranges/cruiseSpeed"))
                .default_value(272.0)
                .unit("m/s")
                .description("Aircraft cruise speed"),
        )
        .add_input(
            VarSpec::new("cruise_alt", ceasiom("/ranges/cruiseAltitude"))
                .default_value(12000.0)
                .unit("m")
                .description("Aircraft cruise altitude"),
        )
        .add_output(
            VarSpec::new("cd0", ceasiom("/aerodynamics/su2/cd0"))
                .description("Skin friction drag coefficient"),
        )
        .add_output(
            VarSpec::new("wing_area", ceasiom("/geometry/analysis/wingArea"))
                .unit("m^2")
                .description("Wing area of the main (largest) wing"),
        )
        .add_output(
            VarSpec::new("wing_span", ceasiom("/geometry/analysis/wingSpan"))
                .unit("m")
                .description("Wing span of the main (largest) wing"),
        );

    ModuleSpec {
        name: "SkinFriction",
        integration: None,
        inout,
    }
}

fn cpacs2sumo() -> ModuleSpec {
    ModuleSpec {
        name: "CPACS2SUMO",
        integration: Some(Integration {
            name: "CPACS2SUMO",
            description: "Convert CPACS .xml file into SUMO .smx file",
            exec: "pwd\npython cpacs2sumo.py",
            author: "Aidan Jungo",
            email: "aidan.jungo@cfse.ch",
        }),
        inout: CpacsInOut::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skin_friction_declares_three_inputs_and_three_outputs() {
        let spec = lookup("SkinFriction").unwrap();
        assert_eq!(spec.inout.inputs.len(), 3);
        assert_eq!(spec.inout.outputs.len(), 3);

        let speed = spec.input("cruise_speed").unwrap();
        assert_eq!(speed.default_value, Some(272.0));
        assert_eq!(speed.unit, "m/s");
        assert_eq!(
            speed.xpath,
            "/cpacs/toolspecific/CEASIOMpy/ranges/cruiseSpeed"
        );

        let wetted = spec.input("wetted_area").unwrap();
        assert_eq!(wetted.default_value, None);
        assert_eq!(
            wetted.xpath,
            "/cpacs/toolspecific/CEASIOMpy/geometry/analysis/wettedArea"
        );

        assert_eq!(
            spec.output("cd0").unwrap().xpath,
            "/cpacs/toolspecific/CEASIOMpy/aerodynamics/su2/cd0"
        );
        assert!(spec.integration.is_none());
    }

    #[test]
    fn cpacs2sumo_has_integration_metadata_but_no_variables() {
        let spec = lookup("CPACS2SUMO").unwrap();
        assert!(spec.inout.is_empty());
        let integration = spec.integration.unwrap();
        assert_eq!(integration.name, "CPACS2SUMO");
        assert!(integration.exec.contains("cpacs2sumo.py"));
    }

    #[test]
    fn unknown_module_has_no_spec() {
        assert!(lookup("WeightConventional").is_none());
    }

    #[test]
    fn module_names_are_sorted() {
        assert_eq!(module_names(), ["CPACS2SUMO", "SkinFriction"]);
    }
}
