use demsim::{DriverConfig, Scenario, ScenarioConfig};
use demsim::{dump_matrix, quasi_static_velocity_verlet_with_window, velocity_verlet};

use clap::Parser;
use anyhow::Result;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short, default_value = "two_particle.yaml")]
    file_name: String,

    /// Directory the position/velocity dumps are written to
    #[arg(short, default_value = ".")]
    out_dir: PathBuf,
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name);
    let file = File::open(&config_path)?;
    let reader = BufReader::new(file);
    let scenario_cfg: ScenarioConfig = serde_yaml::from_reader(reader)?;

    Ok(scenario_cfg)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let scenario_cfg = load_scenario_from_yaml(&args.file_name)?;
    let mut scenario = Scenario::build_scenario(scenario_cfg)?;

    let p = scenario.parameters.clone();
    let sys = &mut scenario.system;

    match scenario.engine.driver {
        DriverConfig::Transient => {
            // fixed-step run until t_end
            while sys.t() < p.t_end {
                velocity_verlet(sys, p.dt);
            }
            println!("transient run finished at t = {}", sys.t());
        }
        DriverConfig::QuasiStatic => {
            let iiter = quasi_static_velocity_verlet_with_window(sys, p.dt, p.tol, p.ncheck);
            println!("quasi-static run converged after {iiter} iterations (t = {})", sys.t());
        }
    }

    // dump final state for diagnostics
    dump_matrix(args.out_dir.join("x.txt"), sys.x())?;
    dump_matrix(args.out_dir.join("v.txt"), sys.v())?;
    dump_matrix(args.out_dir.join("f.txt"), &sys.f())?;

    Ok(())
}
