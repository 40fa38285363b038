use crate::cli::SpecsArgs;
use crate::error::{CliError, Result};
use cpacsopt::core::specs::{ModuleSpec, VarSpec, registry};

pub fn run(args: SpecsArgs) -> Result<()> {
    match args.module {
        None => {
            println!("Built-in module specs:");
            for name in registry::module_names() {
                println!("  {}", name);
            }
        }
        Some(name) => {
            let spec = registry::lookup(&name).ok_or_else(|| {
                CliError::Argument(format!(
                    "Unknown module '{}'. Known modules: {}",
                    name,
                    registry::module_names().join(", ")
                ))
            })?;
            print!("{}", render(&spec));
        }
    }
    Ok(())
}

fn render(spec: &ModuleSpec) -> String {
    let mut out = format!("Module {}\n", spec.name);
    if let Some(integration) = &spec.integration {
        out.push_str(&format!(
            "  {} ({})\n  exec: {}\n  author: {} <{}>\n",
            integration.name,
            integration.description,
            integration.exec,
            integration.author,
            integration.email
        ));
    }
    render_vars(&mut out, "Inputs", &spec.inout.inputs);
    render_vars(&mut out, "Outputs", &spec.inout.outputs);
    out
}

fn render_vars(out: &mut String, title: &str, vars: &[VarSpec]) {
    if vars.is_empty() {
        return;
    }
    out.push_str(&format!("  {}:\n", title));
    for var in vars {
        let default = var
            .default_value
            .map_or_else(|| "-".to_string(), |v| v.to_string());
        out.push_str(&format!(
            "    {:<16} default {:<8} [{}] {}\n      {}\n",
            var.var_name, default, var.unit, var.description, var.xpath
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skin_friction_lists_inputs_and_outputs() {
        let spec = registry::lookup("SkinFriction").unwrap();
        let text = render(&spec);
        assert!(text.starts_with("Module SkinFriction"));
        assert!(text.contains("Inputs:"));
        assert!(text.contains("cruise_speed"));
        assert!(text.contains("Outputs:"));
        assert!(text.contains("wing_span"));
    }

    #[test]
    fn unknown_module_is_an_argument_error() {
        let result = run(SpecsArgs {
            module: Some("NoSuchModule".to_string()),
        });
        assert!(matches!(result, Err(CliError::Argument(msg)) if msg.contains("SkinFriction")));
    }
}
