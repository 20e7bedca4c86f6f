pub mod errors;
mod models;

use std::collections::BTreeMap;
use std::time::Duration;
use log::{error, info};
use sqlx::postgres::PgConnectOptions;
use sqlx::{ConnectOptions, Connection};
use tokio::time::timeout;
use crate::initialization::PiConfig;
use crate::manager_pi::errors::PiError;
pub use crate::manager_pi::models::{HistorianMeta, HistorianResult};
use crate::manager_pi::models::PiRow;
use crate::models::{DataPoint, TimeWindow};
use crate::timeutil::{unix_to_iso, unix_to_naive};
use crate::units::{convert_length, LengthUnit};

/// Interpolated series at the historian's fixed 15-minute granularity,
/// tag list and time bounds bound as values.
const INTERP_SQL: &str = r#"SELECT "tag", "time", "value" FROM piinterp
WHERE "tag" = ANY($1) AND "time" >= $2 AND "time" <= $3 AND "timestep" = '15m'
ORDER BY "time""#;

/// Client for the PI historian, reached over its relational link. One
/// scoped connection per query; no pooling.
pub struct PiHistorian {
    config: PiConfig,
}

impl PiHistorian {
    pub fn new(config: &PiConfig) -> Self {
        Self { config: config.clone() }
    }

    /// Pulls the 15-minute interpolated series for the given tags over the
    /// window. Per tag the series is deduplicated by timestamp (last
    /// observation wins), sorted ascending, and converted feet to inches.
    ///
    /// This call never fails: any connect or query problem comes back as
    /// an error field on the result so a caller composing several branches
    /// does not have to treat this one specially. An empty query result is
    /// an empty series, not an error.
    pub async fn fetch_interpolated(&self, window: TimeWindow, tags: &[String]) -> HistorianResult {
        match self.query_interpolated(window, tags).await {
            Ok(time_series) => {
                info!("historian returned series for {} tags", time_series.len());
                HistorianResult {
                    source: "EBMUD".to_string(),
                    meta: HistorianMeta { tags: tags.to_vec() },
                    time_series,
                    error: None,
                }
            }
            Err(e) => {
                error!("historian query for tags {:?} failed: {}", tags, e);
                HistorianResult {
                    source: "EBMUD".to_string(),
                    meta: HistorianMeta { tags: tags.to_vec() },
                    time_series: empty_series(tags),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn query_interpolated(
        &self,
        window: TimeWindow,
        tags: &[String],
    ) -> Result<BTreeMap<String, Vec<DataPoint>>, PiError> {
        if tags.is_empty() {
            return Ok(BTreeMap::new());
        }

        let limit = Duration::from_secs(self.config.query_timeout_secs);
        let mut conn = timeout(limit, self.connect_options().connect()).await??;

        // The connection is released on every exit path before this
        // function returns, including a query failure or timeout.
        let query_result = timeout(
            limit,
            sqlx::query_as::<_, PiRow>(INTERP_SQL)
                .bind(tags)
                .bind(unix_to_naive(window.start_unix))
                .bind(unix_to_naive(window.end_unix))
                .fetch_all(&mut conn),
        )
        .await;
        let _ = conn.close().await;

        let rows = query_result??;
        let mut series = transform_rows(rows);
        for tag in tags {
            series.entry(tag.clone()).or_default();
        }

        Ok(series)
    }

    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .database(&self.config.database)
            .username(&self.config.user)
            .password(&self.config.password)
    }
}

fn empty_series(tags: &[String]) -> BTreeMap<String, Vec<DataPoint>> {
    tags.iter().map(|tag| (tag.clone(), Vec::new())).collect()
}

/// Groups rows per tag, deduplicates by timestamp keeping the last
/// observed row, sorts ascending, converts feet to inches and drops
/// sensor gaps.
fn transform_rows(rows: Vec<PiRow>) -> BTreeMap<String, Vec<DataPoint>> {
    let mut by_tag: BTreeMap<String, BTreeMap<i64, Option<f64>>> = BTreeMap::new();
    for row in rows {
        by_tag
            .entry(row.tag)
            .or_default()
            .insert(row.time.and_utc().timestamp(), row.value);
    }

    by_tag
        .into_iter()
        .map(|(tag, points)| {
            let series = points
                .into_iter()
                .filter_map(|(t, value)| {
                    let reading = convert_length(value, LengthUnit::Feet, LengthUnit::Inches)?;
                    Some(DataPoint { date_time: unix_to_iso(t), reading })
                })
                .collect();
            (tag, series)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn row(tag: &str, t: i64, value: Option<f64>) -> PiRow {
        PiRow {
            tag: tag.to_string(),
            time: DateTime::from_timestamp(t, 0).unwrap().naive_utc(),
            value,
        }
    }

    #[test]
    fn rows_become_sorted_inch_series_per_tag() {
        let rows = vec![
            row("UP", 1800, Some(2.0)),
            row("UP", 900, Some(1.0)),
            row("DN", 900, Some(0.5)),
        ];

        let series = transform_rows(rows);
        assert_eq!(series.len(), 2);
        assert_eq!(series["UP"], vec![
            DataPoint { date_time: unix_to_iso(900), reading: 12.0 },
            DataPoint { date_time: unix_to_iso(1800), reading: 24.0 },
        ]);
        assert_eq!(series["DN"], vec![
            DataPoint { date_time: unix_to_iso(900), reading: 6.0 },
        ]);
    }

    #[test]
    fn duplicate_timestamps_keep_the_last_observation() {
        let rows = vec![
            row("UP", 900, Some(1.0)),
            row("UP", 900, Some(3.0)),
        ];

        let series = transform_rows(rows);
        assert_eq!(series["UP"], vec![
            DataPoint { date_time: unix_to_iso(900), reading: 36.0 },
        ]);
    }

    #[test]
    fn sensor_gaps_are_dropped_from_the_series() {
        let rows = vec![
            row("UP", 900, Some(1.0)),
            row("UP", 1800, None),
            row("UP", 2700, Some(2.0)),
        ];

        let series = transform_rows(rows);
        assert_eq!(series["UP"].len(), 2);
    }

    #[test]
    fn no_rows_means_empty_series_not_an_error() {
        let series = transform_rows(Vec::new());
        assert!(series.is_empty());

        let seeded = empty_series(&["UP".to_string(), "DN".to_string()]);
        assert_eq!(seeded.len(), 2);
        assert!(seeded.values().all(|s| s.is_empty()));
    }
}
