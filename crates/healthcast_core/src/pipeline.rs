//! Entry points: client intake and scenario output
//!
//! [`read_clients`] turns an intake workbook into [`Client`]s;
//! [`simulate_and_write`] projects a cohort under one scenario and writes the
//! result workbook. The correlation factor is built before anything is
//! simulated, so a bad correlation section never produces partial output.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::{ForecastModel, LabelTable};
use crate::correlation::CholeskyFactor;
use crate::error::Result;
use crate::model::{Client, ClientProjection, ProjectionStats, Scenario};
use crate::sanity::SanityChecker;
use crate::simulation::CohortSimulator;
use crate::workbook::{
    CellValue, OoxmlReader, OoxmlWriter, SpreadsheetReader, SpreadsheetWriter, WorkbookSheet,
    sanitize_sheet_name,
};

pub const HEADER: [&str; 4] = ["Test", "Baseline", "Year 5 Mean", "Year 10 Mean"];

const NAME_LABEL: &str = "Name";
const AGE_LABEL: &str = "Age";

/// What one scenario run did
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub scenario: Scenario,
    pub output: PathBuf,
    pub clients: usize,
    pub draws_per_client: u32,
    pub stats: ProjectionStats,
    pub sanity_findings: usize,
    pub elapsed: Duration,
}

/// Clients from an intake workbook using the built-in label table
pub fn read_clients(path: &Path) -> Result<Vec<Client>> {
    read_clients_with(path, &LabelTable::default())
}

pub fn read_clients_with(path: &Path, labels: &LabelTable) -> Result<Vec<Client>> {
    read_clients_from(&OoxmlReader, path, labels)
}

/// One client per sheet, in workbook order
pub fn read_clients_from(
    reader: &impl SpreadsheetReader,
    path: &Path,
    labels: &LabelTable,
) -> Result<Vec<Client>> {
    let sheets = reader.read_sheets(path)?;
    let clients: Vec<Client> = sheets.iter().map(|s| client_from_sheet(s, labels)).collect();
    tracing::info!(
        path = %path.display(),
        clients = clients.len(),
        "read intake workbook"
    );
    Ok(clients)
}

/// Interpret a label/value sheet as a client.
///
/// `Name` and `Age` are reserved. Other labels go through `labels`; values
/// that do not parse as numbers count as missing.
#[must_use]
pub fn client_from_sheet(sheet: &WorkbookSheet, labels: &LabelTable) -> Client {
    let labeled = sheet.labeled();
    let name = labeled
        .get_ignore_case(NAME_LABEL)
        .map(|v| v.text().trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| sheet.name.clone());
    let age = labeled.get_ignore_case(AGE_LABEL).and_then(CellValue::as_number);

    let mut client = Client {
        sheet_name: sheet.name.clone(),
        name,
        age,
        ..Client::default()
    };
    for (label, value) in labeled.iter() {
        let trimmed = label.trim();
        if trimmed.eq_ignore_ascii_case(NAME_LABEL) || trimmed.eq_ignore_ascii_case(AGE_LABEL) {
            continue;
        }
        let Some(test) = labels.resolve(label) else {
            continue;
        };
        match value.as_number() {
            Some(v) => {
                client.baselines.insert(test.to_string(), v);
            }
            None => {
                client.baselines.remove(test);
            }
        }
    }
    client
}

/// Output sheet for one client: a header then one row per ordered test
#[must_use]
pub fn build_sheet(
    client: &Client,
    projection: &ClientProjection,
    model: &ForecastModel,
) -> WorkbookSheet {
    let mut sheet = WorkbookSheet::new(sanitize_sheet_name(&client.sheet_label()));
    sheet.push_row(HEADER.map(CellValue::from));
    for test in model.test_ids() {
        let name = &model.definition(test).name;
        sheet.push_row([
            CellValue::from(name.as_str()),
            CellValue::from(client.baseline(name)),
            CellValue::from(projection.mean(test, 5)),
            CellValue::from(projection.mean(test, 10)),
        ]);
    }
    sheet
}

/// Project every client under `scenario` and write one sheet each to
/// `output_path`
pub fn simulate_and_write(
    clients: &[Client],
    model: &ForecastModel,
    scenario: Scenario,
    output_path: &Path,
) -> Result<RunSummary> {
    simulate_and_write_with(&OoxmlWriter, clients, model, scenario, output_path)
}

pub fn simulate_and_write_with(
    writer: &impl SpreadsheetWriter,
    clients: &[Client],
    model: &ForecastModel,
    scenario: Scenario,
    output_path: &Path,
) -> Result<RunSummary> {
    let factor = CholeskyFactor::from_model(model)?;
    let started = Instant::now();

    let projections = CohortSimulator::new(model, &factor, scenario).simulate_cohort(clients);

    let checker = SanityChecker::new(model, scenario);
    let mut stats = ProjectionStats::default();
    let mut sanity_findings = 0;
    let sheets: Vec<WorkbookSheet> = clients
        .iter()
        .zip(&projections)
        .map(|(client, projection)| {
            stats.merge(&projection.stats);
            sanity_findings += checker.check(client, projection).len();
            build_sheet(client, projection, model)
        })
        .collect();

    writer.write_sheets(output_path, &sheets)?;
    let elapsed = started.elapsed();

    if stats.missing_baselines > 0 {
        tracing::info!(
            %scenario,
            missing = stats.missing_baselines,
            "skipped tests without a baseline"
        );
    }
    if stats.zero_baselines > 0 {
        tracing::warn!(
            %scenario,
            zero = stats.zero_baselines,
            "zero baselines excluded from direction checks"
        );
    }
    tracing::info!(
        %scenario,
        clients = clients.len(),
        n_sim = model.n_sim,
        sanity_findings,
        elapsed_ms = elapsed.as_millis() as u64,
        output = %output_path.display(),
        "scenario complete"
    );

    Ok(RunSummary {
        scenario,
        output: output_path.to_path_buf(),
        clients: clients.len(),
        draws_per_client: model.n_sim,
        stats,
        sanity_findings,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForecastBuilder;
    use crate::model::TestId;

    fn intake_sheet() -> WorkbookSheet {
        let mut sheet = WorkbookSheet::new("Sheet1");
        sheet.push_row(["Name".into(), "  Ada  ".into()]);
        sheet.push_row([" age ".into(), "45.7".into()]);
        sheet.push_row(["VO2 Max (ml/kg/min)".into(), 40.0.into()]);
        sheet.push_row(["Fasting glucose".into(), 5.1.into()]);
        sheet.push_row(["HbA1c %".into(), "n/a".into()]);
        sheet.push_row(["Grip strength".into(), "35".into()]);
        sheet.push_row(["Shoe size".into(), 9.0.into()]);
        sheet
    }

    #[test]
    fn test_client_from_sheet() {
        let client = client_from_sheet(&intake_sheet(), &LabelTable::default());
        assert_eq!(client.name, "Ada");
        assert_eq!(client.sheet_name, "Sheet1");
        assert_eq!(client.age, Some(45.7));
        assert_eq!(client.baseline("VO2 max"), Some(40.0));
        assert_eq!(client.baseline("Grip Strength"), Some(35.0));
        assert_eq!(client.baseline("HbA1c"), None);
        assert_eq!(client.baselines.len(), 2);
        assert_eq!(client.sheet_label(), "Ada_45");
    }

    #[test]
    fn test_blank_name_falls_back_to_sheet() {
        let mut sheet = WorkbookSheet::new("Client 7");
        sheet.push_row(["Name".into(), "   ".into()]);
        sheet.push_row(["Age".into(), "unknown".into()]);
        let client = client_from_sheet(&sheet, &LabelTable::default());
        assert_eq!(client.name, "Client 7");
        assert_eq!(client.age, None);
        assert_eq!(client.sheet_label(), "Client 7_");
    }

    #[test]
    fn test_build_sheet_rows_follow_tests_order() {
        let model = ForecastBuilder::new()
            .test("VO2 max", |t| t)
            .test("FEV1", |t| t)
            .n_sim(1)
            .build()
            .unwrap();
        let client = Client::new("Ada", Some(45.0)).with_baseline("VO2 max", 40.0);
        let projection = ClientProjection {
            client_index: 0,
            mean5: vec![Some(39.0), None],
            mean10: vec![Some(38.0), None],
            stats: ProjectionStats::default(),
        };
        let sheet = build_sheet(&client, &projection, &model);
        assert_eq!(sheet.name, "Ada_45");
        assert_eq!(sheet.rows[0], HEADER.map(CellValue::from).to_vec());
        assert_eq!(
            sheet.rows[1],
            vec![
                CellValue::from("VO2 max"),
                CellValue::Number(40.0),
                CellValue::Number(39.0),
                CellValue::Number(38.0)
            ]
        );
        assert_eq!(
            sheet.rows[2],
            vec![
                CellValue::from("FEV1"),
                CellValue::Empty,
                CellValue::Empty,
                CellValue::Empty
            ]
        );
        assert_eq!(projection.mean(TestId(1), 5), None);
    }
}
