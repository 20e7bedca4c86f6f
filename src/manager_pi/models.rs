use std::collections::BTreeMap;
use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;
use crate::models::DataPoint;

/// One interpolated historian row. A null value is a sensor gap.
#[derive(Debug, FromRow)]
pub struct PiRow {
    pub tag: String,
    pub time: NaiveDateTime,
    pub value: Option<f64>,
}

/// What the historian branch hands back: per-tag series in display units,
/// plus an error message instead of a failure.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorianResult {
    pub source: String,
    pub meta: HistorianMeta,
    pub time_series: BTreeMap<String, Vec<DataPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct HistorianMeta {
    pub tags: Vec<String>,
}
