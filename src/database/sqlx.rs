use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::error::Error;
use std::str::FromStr;
use tracing::info;

use crate::experiment::ResultRow;

pub async fn db_connection(database_url: &str) -> Result<SqlitePool, Box<dyn Error + Send + Sync>> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;
    info!("Connected to SQLite database at {database_url}");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trial_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            trial INTEGER NOT NULL,
            seed INTEGER NOT NULL,
            scenario TEXT NOT NULL,
            stage INTEGER NOT NULL,
            vehicle_class TEXT NOT NULL,
            vehicles_used INTEGER NOT NULL,
            trips INTEGER NOT NULL,
            distance_km REAL NOT NULL,
            time_min REAL NOT NULL,
            served INTEGER NOT NULL,
            unserved INTEGER NOT NULL,
            co2_kg REAL NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}

/// Inserts the rows of one trial in a single transaction.
pub async fn insert_results(pool: &SqlitePool, rows: &[ResultRow]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO trial_results (
                timestamp, trial, seed, scenario, stage, vehicle_class, vehicles_used,
                trips, distance_km, time_min, served, unserved, co2_kg
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.timestamp)
        .bind(row.trial as i64)
        .bind(row.seed as i64)
        .bind(&row.scenario)
        .bind(row.stage as i64)
        .bind(&row.vehicle_class)
        .bind(row.vehicles_used as i64)
        .bind(row.trips as i64)
        .bind(row.distance_km)
        .bind(row.time_min)
        .bind(row.served as i64)
        .bind(row.unserved as i64)
        .bind(row.co2_kg)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    fn row(trial: usize) -> ResultRow {
        ResultRow {
            timestamp: "2024-01-01T00:00:00+00:00".to_string(),
            trial,
            seed: 64 + trial as u64,
            scenario: "vans".to_string(),
            stage: 0,
            vehicle_class: "van".to_string(),
            vehicles_used: 2,
            trips: 3,
            distance_km: 12.5,
            time_min: 80.0,
            served: 20,
            unserved: 1,
            co2_kg: 2.5,
        }
    }

    #[tokio::test]
    async fn rows_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("results.sqlite").display());
        let pool = db_connection(&url).await.unwrap();

        insert_results(&pool, &[row(0), row(1)]).await.unwrap();

        let rows = sqlx::query("SELECT trial, distance_km FROM trial_results ORDER BY trial")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get::<i64, _>("trial"), 1);
        assert_eq!(rows[0].get::<f64, _>("distance_km"), 12.5);
    }
}
