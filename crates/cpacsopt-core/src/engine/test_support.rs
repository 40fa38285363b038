use super::config::{RoutineConfig, RoutineConfigBuilder, RoutineType};
use super::error::EngineError;
use super::progress::ProgressReporter;
use super::runner::ModuleRunner;
use super::session::{OptimisationSession, Routine};
use super::variables::build_dicts;
use super::workspace::{ModuleWorkspace, UPDATER_MODULE, ensure_parent};
use crate::core::cpacs::CpacsDocument;
use std::fs;
use tempfile::{TempDir, tempdir};

pub const SPEED_XPATH: &str = "/cpacs/toolspecific/CEASIOMpy/ranges/cruiseSpeed";
pub const CL_XPATH: &str = "/cpacs/toolspecific/CEASIOMpy/aerodynamics/su2/cl";
pub const CD_XPATH: &str = "/cpacs/toolspecific/CEASIOMpy/aerodynamics/su2/cd";

/// One design variable (`speed`, 100..300) and two results (`cl`, `cd`).
pub const INITIAL: &str = r#"<cpacs>
  <vehicles><aircraft><model><analyses><aeroPerformance>
    <aeroMap uID="test_optim"><aeroPerformanceMap>
      <altitude>0</altitude><machNumber>0.3</machNumber>
      <angleOfAttack>2</angleOfAttack><angleOfSideslip>0</angleOfSideslip>
      <cl>0.1</cl>
    </aeroPerformanceMap></aeroMap>
  </aeroPerformance></analyses></model></aircraft></vehicles>
  <toolspecific><CEASIOMpy>
    <aerodynamics><su2><aeroMapUID>test_optim</aeroMapUID><cl>0.4</cl><cd>0.1</cd></su2></aerodynamics>
    <ranges><cruiseSpeed>200</cruiseSpeed></ranges>
    <Optimisation><variables>
      <variable>
        <key>speed</key>
        <getPath>/cpacs/toolspecific/CEASIOMpy/ranges/cruiseSpeed</getPath>
        <setPath>/cpacs/toolspecific/CEASIOMpy/ranges/cruiseSpeed</setPath>
        <min>100</min><max>300</max>
      </variable>
      <variable>
        <key>cl</key>
        <getPath>/cpacs/toolspecific/CEASIOMpy/aerodynamics/su2/cl</getPath>
      </variable>
      <variable>
        <key>cd</key>
        <getPath>/cpacs/toolspecific/CEASIOMpy/aerodynamics/su2/cd</getPath>
      </variable>
    </variables></Optimisation>
  </CEASIOMpy></toolspecific>
</cpacs>"#;

/// Stand-in aerodynamics module: `cl = speed / 1000`, `cd = 0.1`.
pub fn fake_aero(module: &str, ws: &ModuleWorkspace) -> Result<(), EngineError> {
    let mut doc = CpacsDocument::open(&ws.tool_input(module))?;
    let speed = doc.get_f64(SPEED_XPATH)?.unwrap_or_default();
    doc.set_f64(CL_XPATH, speed / 1000.0)?;
    doc.set_f64(CD_XPATH, 0.1)?;
    ensure_parent(&ws.tool_output(module))?;
    doc.save(&ws.tool_output(module))?;
    Ok(())
}

/// A temporary module root with `INITIAL` staged as the updater input.
pub fn setup(modules: &[&str]) -> (TempDir, RoutineConfig) {
    let dir = tempdir().unwrap();
    let config = RoutineConfigBuilder::new()
        .routine_type(RoutineType::Optimisation)
        .modules(modules.iter().copied())
        .root(dir.path().to_path_buf())
        .build()
        .unwrap();
    let ws = ModuleWorkspace::new(dir.path());
    let updater_in = ws.tool_input(UPDATER_MODULE);
    ensure_parent(&updater_in).unwrap();
    fs::write(&updater_in, INITIAL).unwrap();
    (dir, config)
}

pub fn session<'a>(
    config: &RoutineConfig,
    runner: &'a dyn ModuleRunner,
    reporter: &'a ProgressReporter<'a>,
) -> OptimisationSession<'a> {
    let doc = CpacsDocument::parse_str(INITIAL).unwrap();
    let routine = Routine::from_config(config, "2020-06-04_12-00-00".to_string()).unwrap();
    OptimisationSession::new(routine, build_dicts(&doc).unwrap(), config, runner, reporter).unwrap()
}
