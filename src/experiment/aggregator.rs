use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::constant::RESULTS_CSV;
use crate::database::insert_results;
use crate::experiment::snapshot::write_snapshot;
use crate::experiment::trial::{ResultRow, TrialReport};
use crate::experiment::BoxError;

/// What workers send to the aggregator.
#[derive(Debug)]
pub enum TrialMessage {
    Report(Box<TrialReport>),
    /// All workers are done; flush and return.
    Stop,
}

/// Single owner of the result files. Persists every report as soon as it
/// arrives so a crash loses at most the trial in flight.
pub struct Aggregator {
    output_dir: PathBuf,
    csv_path: PathBuf,
    pool: Option<SqlitePool>,
    rows: Vec<ResultRow>,
}

impl Aggregator {
    pub fn new(output_dir: &Path, pool: Option<SqlitePool>) -> Result<Self, BoxError> {
        fs::create_dir_all(output_dir)?;
        Ok(Aggregator {
            output_dir: output_dir.to_path_buf(),
            csv_path: output_dir.join(RESULTS_CSV),
            pool,
            rows: Vec::new(),
        })
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    /// Consumes reports until `Stop` arrives or every sender is gone. Returns
    /// all rows written during this run.
    pub async fn run(mut self, mut rx: mpsc::Receiver<TrialMessage>) -> Result<Vec<ResultRow>, BoxError> {
        while let Some(message) = rx.recv().await {
            match message {
                TrialMessage::Report(report) => self.persist(report).await?,
                TrialMessage::Stop => break,
            }
        }
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
        info!(
            "Aggregated {} rows into {}",
            self.rows.len(),
            self.csv_path.display()
        );
        Ok(self.rows)
    }

    async fn persist(&mut self, report: Box<TrialReport>) -> Result<(), BoxError> {
        let trial = report.trial;
        let csv_path = self.csv_path.clone();
        let output_dir = self.output_dir.clone();
        let rows = tokio::task::spawn_blocking(move || -> Result<Vec<ResultRow>, BoxError> {
            let rows = report.rows();
            append_csv(&csv_path, &rows)?;
            write_snapshot(&output_dir, &report)?;
            Ok(rows)
        })
        .await??;

        if let Some(pool) = &self.pool {
            if let Err(e) = insert_results(pool, &rows).await {
                // the csv and snapshot already hold the trial
                warn!("Failed to store trial {} in the database: {}", trial, e);
            }
        }
        debug!("Trial {} persisted ({} rows)", trial, rows.len());
        self.rows.extend(rows);
        Ok(())
    }
}

fn append_csv(csv_path: &Path, rows: &[ResultRow]) -> Result<(), BoxError> {
    let has_header = fs::metadata(csv_path).map(|m| m.len() > 0).unwrap_or(false);
    let file = OpenOptions::new().create(true).append(true).open(csv_path)?;
    let mut wtr = WriterBuilder::new().has_headers(!has_header).from_writer(file);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::snapshot::{read_snapshot, snapshot_path};
    use crate::experiment::trial::{ScenarioReport, StageReport};
    use crate::dispatch::DispatchOutcome;
    use chrono::Utc;

    fn report(trial: usize) -> TrialReport {
        TrialReport {
            trial,
            seed: 64 + trial as u64,
            timestamp: Utc::now(),
            demand: vec![],
            scenarios: vec![ScenarioReport {
                scenario: "vans".to_string(),
                stages: vec![StageReport {
                    stage: 0,
                    outcome: DispatchOutcome {
                        vehicle_class: "van".to_string(),
                        vehicles_used: 1,
                        routes: vec![],
                        unserved: vec![],
                        distance_km: 4.5,
                        time_min: 20.0,
                        co2_kg: 0.9,
                        trace: vec![],
                    },
                }],
            }],
        }
    }

    #[tokio::test]
    async fn header_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let aggregator = Aggregator::new(dir.path(), None).unwrap();
        let csv_path = aggregator.csv_path().to_path_buf();
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(aggregator.run(rx));

        tx.send(TrialMessage::Report(Box::new(report(0)))).await.unwrap();
        tx.send(TrialMessage::Report(Box::new(report(1)))).await.unwrap();
        tx.send(TrialMessage::Stop).await.unwrap();
        let rows = handle.await.unwrap().unwrap();
        assert_eq!(rows.len(), 2);

        let content = fs::read_to_string(&csv_path).unwrap();
        assert_eq!(content.matches("vehicle_class").count(), 1);
        assert_eq!(content.lines().count(), 3);
        assert_eq!(read_snapshot(&snapshot_path(dir.path(), 1)).unwrap().trial, 1);
    }

    #[tokio::test]
    async fn appends_to_an_existing_table() {
        let dir = tempfile::tempdir().unwrap();
        for trial in 0..2 {
            let aggregator = Aggregator::new(dir.path(), None).unwrap();
            let (tx, rx) = mpsc::channel(1);
            let handle = tokio::spawn(aggregator.run(rx));
            tx.send(TrialMessage::Report(Box::new(report(trial)))).await.unwrap();
            drop(tx);
            handle.await.unwrap().unwrap();
        }

        let mut reader = csv::Reader::from_path(dir.path().join(RESULTS_CSV)).unwrap();
        let rows: Vec<ResultRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows.iter().map(|r| r.trial).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[tokio::test]
    async fn write_failure_stops_the_aggregator() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("results");
        let aggregator = Aggregator::new(&output, None).unwrap();
        fs::remove_dir_all(&output).unwrap();

        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(aggregator.run(rx));
        tx.send(TrialMessage::Report(Box::new(report(0)))).await.unwrap();
        drop(tx);
        assert!(handle.await.unwrap().is_err());
    }
}
