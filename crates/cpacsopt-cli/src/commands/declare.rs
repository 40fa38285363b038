use crate::cli::DeclareArgs;
use crate::error::{CliError, Result};
use cpacsopt::core::cpacs::CpacsDocument;
use cpacsopt::core::specs::registry;
use cpacsopt::engine::error::EngineError;
use cpacsopt::engine::variables::declare_from_spec;
use tracing::info;

pub fn run(args: DeclareArgs) -> Result<()> {
    let spec = registry::lookup(&args.module).ok_or_else(|| {
        CliError::Argument(format!(
            "Unknown module '{}'. Known modules: {}",
            args.module,
            registry::module_names().join(", ")
        ))
    })?;
    if let Some(spread) = args.spread {
        if !(spread.is_finite() && spread >= 0.0) {
            return Err(CliError::Argument(format!(
                "--spread must be a non-negative number, got {}",
                spread
            )));
        }
    }

    let mut doc = CpacsDocument::open(&args.input).map_err(EngineError::from)?;
    let added = declare_from_spec(&mut doc, &spec, args.spread)?;

    let output = args.output.as_ref().unwrap_or(&args.input);
    doc.save(output).map_err(EngineError::from)?;
    info!("Saved {:?}", output);
    println!(
        "✓ Declared {} variable(s) from '{}' in {}",
        added,
        spec.name,
        output.display()
    );
    Ok(())
}
