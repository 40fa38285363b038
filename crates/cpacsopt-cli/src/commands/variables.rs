use crate::cli::VariablesArgs;
use crate::error::Result;
use cpacsopt::core::cpacs::CpacsDocument;
use cpacsopt::engine::error::EngineError;
use cpacsopt::engine::variables::{VariableEntry, build_dicts};
use tracing::info;

pub fn run(args: VariablesArgs) -> Result<()> {
    info!("Reading declarations from {:?}", args.input);
    let doc = CpacsDocument::open(&args.input).map_err(EngineError::from)?;
    let (results, design) = build_dicts(&doc)?;

    println!("Design variables ({}):", design.len());
    for entry in design.values() {
        println!("{}", describe(entry));
    }
    println!("Result variables ({}):", results.len());
    for entry in results.values() {
        println!("{}", describe(entry));
    }
    Ok(())
}

fn describe(entry: &VariableEntry) -> String {
    let bound = |b: Option<f64>| b.map_or_else(|| "-".to_string(), |v| v.to_string());
    format!(
        "  {:<20} {:>12} [{}, {}] {}\n    {}",
        entry.key,
        entry
            .initial()
            .map_or_else(|| "-".to_string(), |v| v.to_string()),
        bound(entry.lower_bound),
        bound(entry.upper_bound),
        entry.unit.as_deref().unwrap_or(""),
        entry.get_path
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_shows_value_bounds_and_path() {
        let entry = VariableEntry {
            key: "cruise_speed".to_string(),
            name: "cruise_speed".to_string(),
            history: vec![272.0],
            lower_bound: Some(250.0),
            upper_bound: None,
            get_path: "/cpacs/toolspecific/CEASIOMpy/ranges/cruiseSpeed".to_string(),
            set_path: None,
            unit: Some("m/s".to_string()),
            description: None,
        };
        let text = describe(&entry);
        assert!(text.contains("272"));
        assert!(text.contains("[250, -]"));
        assert!(text.contains("m/s"));
        assert!(text.ends_with("/cpacs/toolspecific/CEASIOMpy/ranges/cruiseSpeed"));
    }
}
