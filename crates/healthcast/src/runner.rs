use std::fs;
use std::path::PathBuf;

use color_eyre::eyre::{Context, Result, eyre};
use healthcast_core::model::Scenario;
use healthcast_core::{RunSummary, read_clients_with, simulate_and_write};

use crate::config_file::{config_dir, load_config, resolve_path};

/// Which scenario workbooks to produce
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScenarioSelection {
    #[default]
    Both,
    Decline,
    Improvement,
}

impl ScenarioSelection {
    pub fn scenarios(self) -> &'static [Scenario] {
        match self {
            ScenarioSelection::Both => &Scenario::ALL,
            ScenarioSelection::Decline => &[Scenario::Decline],
            ScenarioSelection::Improvement => &[Scenario::Improvement],
        }
    }
}

/// Command-line overrides on top of the assumptions document
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config: PathBuf,
    pub input: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub n_sim: Option<u32>,
    pub seed: Option<u64>,
    pub scenarios: ScenarioSelection,
}

/// Load, simulate and write every selected scenario.
///
/// Relative paths, whether given on the command line or in the document,
/// resolve against the directory of the config file.
pub fn run(options: &RunOptions) -> Result<Vec<RunSummary>> {
    let base_dir = config_dir(&options.config);
    let mut config = load_config(&options.config)?;
    if let Some(n_sim) = options.n_sim {
        config.n_sim = Some(n_sim);
    }
    if let Some(seed) = options.seed {
        config.seed = Some(seed);
    }
    let model = config.resolve().wrap_err("invalid assumptions")?;

    let input = match (&options.input, config.input_xlsx.as_deref()) {
        (Some(path), _) => resolve_path(&base_dir, path),
        (None, Some(path)) => resolve_path(&base_dir, path),
        (None, None) => return Err(eyre!("no intake workbook: pass --input or set `input_xlsx`")),
    };
    let output_dir = match (&options.output_dir, config.output_dir.as_deref()) {
        (Some(path), _) => resolve_path(&base_dir, path),
        (None, Some(path)) => resolve_path(&base_dir, path),
        (None, None) => base_dir.clone(),
    };
    fs::create_dir_all(&output_dir)
        .wrap_err_with(|| format!("failed to create {}", output_dir.display()))?;

    let clients = read_clients_with(&input, &model.labels)
        .wrap_err_with(|| format!("failed to read clients from {}", input.display()))?;
    tracing::info!(
        clients = clients.len(),
        tests = model.num_tests(),
        n_sim = model.n_sim,
        seed = model.seed,
        "starting forecast"
    );

    let mut summaries = Vec::with_capacity(options.scenarios.scenarios().len());
    for &scenario in options.scenarios.scenarios() {
        let output = resolve_path(&output_dir, config.output_file(scenario));
        let summary = simulate_and_write(&clients, &model, scenario, &output)
            .wrap_err_with(|| format!("{scenario} run failed"))?;
        summaries.push(summary);
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthcast_core::workbook::{OoxmlReader, OoxmlWriter, WorkbookSheet};
    use std::path::Path;

    const CONFIG: &str = r#"{
        "tests_order": ["VO2 max", "Grip Strength", "HbA1c"],
        "higher_is_better": ["VO2 max", "Grip Strength"],
        "lower_is_better": ["HbA1c"],
        "decline": {
            "base_rate_per_decade": {"VO2 max": 0.1, "Grip Strength": 0.08, "HbA1c": 0.03},
            "post_rate_per_decade": {"VO2 max": 0.15},
            "accelerate_from_age": {"VO2 max": 65}
        },
        "rate_uncertainty_cv": {"VO2 max": 0.2, "Grip Strength": 0.2, "HbA1c": 0.3},
        "measurement_cv": {"VO2 max": 0.05, "Grip Strength": 0.05, "HbA1c": 0.02},
        "correlations": {
            "tests": ["VO2 max", "Grip Strength"],
            "pairs": [["VO2 max", "Grip Strength", 0.6]]
        },
        "improvement": {
            "vo2_age_cutoff": 60,
            "vo2_under": [0.10, 0.20],
            "vo2_over": [0.05, 0.10],
            "ranges": {"HbA1c": [0.02, 0.08]}
        },
        "n_sim": 50,
        "seed": 42,
        "sanity_check": {"enabled": true, "tolerance_abs": 0.01, "tolerance_rel": 0.02},
        "input_xlsx": "clients.xlsx",
        "output_dir": "out"
    }"#;

    fn write_fixture(dir: &Path) -> PathBuf {
        let config = dir.join("mc_assumptions.json");
        fs::write(&config, CONFIG).unwrap();

        let mut ada = WorkbookSheet::new("Sheet1");
        ada.push_row(["Name".into(), "Ada".into()]);
        ada.push_row(["Age".into(), 45.0.into()]);
        ada.push_row(["VO2 Max".into(), 40.0.into()]);
        ada.push_row(["HbA1c".into(), 5.4.into()]);
        let mut bo = WorkbookSheet::new("Sheet2");
        bo.push_row(["Name".into(), "Bo".into()]);
        bo.push_row(["Age".into(), 70.0.into()]);
        bo.push_row(["Grip strength".into(), 28.0.into()]);
        OoxmlWriter.write(&dir.join("clients.xlsx"), &[ada, bo]).unwrap();
        config
    }

    #[test]
    fn test_run_writes_both_scenarios() {
        let dir = tempfile::tempdir().unwrap();
        let options = RunOptions {
            config: write_fixture(dir.path()),
            ..RunOptions::default()
        };

        let summaries = run(&options).unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].scenario, Scenario::Decline);
        assert_eq!(summaries[0].output, dir.path().join("out/MonteCarlo_Decline.xlsx"));
        assert_eq!(summaries[1].output, dir.path().join("out/MonteCarlo_Improvement.xlsx"));
        assert_eq!(summaries[0].clients, 2);
        // Ada lacks grip, Bo lacks VO2 and HbA1c
        assert_eq!(summaries[0].stats.missing_baselines, 3);

        let sheets = OoxmlReader.read_path(&summaries[1].output).unwrap();
        let names: Vec<&str> = sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Ada_45", "Bo_70"]);
    }

    #[test]
    fn test_overrides_and_reproducibility() {
        let dir = tempfile::tempdir().unwrap();
        let options = RunOptions {
            config: write_fixture(dir.path()),
            output_dir: Some(PathBuf::from("override")),
            n_sim: Some(5),
            seed: Some(9),
            scenarios: ScenarioSelection::Decline,
            ..RunOptions::default()
        };

        let first = run(&options).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].draws_per_client, 5);
        let path = dir.path().join("override/MonteCarlo_Decline.xlsx");
        let bytes = fs::read(&path).unwrap();

        run(&options).unwrap();
        assert_eq!(fs::read(&path).unwrap(), bytes);
    }

    #[test]
    fn test_missing_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("mc_assumptions.json");
        fs::write(&config, CONFIG).unwrap();
        let options = RunOptions {
            config,
            ..RunOptions::default()
        };
        let err = run(&options).unwrap_err();
        assert!(format!("{err:?}").contains("clients.xlsx"));
    }
}
