use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Formatter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::timeutil::{to_unix_seconds, TimeInput, TimeParseError};

/// Inclusive UNIX-seconds window `[start, end]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub start_unix: i64,
    pub end_unix: i64,
}

#[derive(Debug)]
pub enum WindowError {
    TimeFormat(String),
    Backwards(String),
}

impl fmt::Display for WindowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            WindowError::TimeFormat(e) => write!(f, "WindowError::TimeFormat: {}", e),
            WindowError::Backwards(e) => write!(f, "WindowError::Backwards: {}", e),
        }
    }
}

impl From<TimeParseError> for WindowError {
    fn from(e: TimeParseError) -> Self {
        WindowError::TimeFormat(e.0)
    }
}

impl TimeWindow {
    /// Normalizes both bounds to UNIX seconds and rejects a window whose
    /// end precedes its start, before any upstream call is made.
    pub fn new(start: &TimeInput, end: &TimeInput) -> Result<Self, WindowError> {
        let start_unix = to_unix_seconds(start)?;
        let end_unix = to_unix_seconds(end)?;
        if end_unix < start_unix {
            return Err(WindowError::Backwards(
                "end time must be greater than or equal to start time".to_string(),
            ));
        }

        Ok(TimeWindow { start_unix, end_unix })
    }
}

/// One raw level measurement. A missing value is a sensor gap; it survives
/// the fetch but is dropped from any series emitted to the dashboard.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    pub t: i64,
    pub value: Option<f64>,
}

/// Everything the MHM device service reports for one device over one
/// window. Built incrementally across pages, finalized once pagination
/// completes. Never cached, never persisted.
#[derive(Clone, Debug)]
pub struct DeviceRecord {
    pub device_id: String,
    pub coordinates: Option<(f64, f64)>,
    pub max_distance_mm: Option<f64>,
    pub last_water_level_mm: Option<f64>,
    pub last_fill_percent: Option<f64>,
    pub window: TimeWindow,
    pub measurements: Vec<Measurement>,
}

impl DeviceRecord {
    /// The wire form of the record: sensor gaps are dropped here, at the
    /// emission boundary.
    pub fn into_payload(self) -> DevicePayload {
        let measurements = self
            .measurements
            .into_iter()
            .filter_map(|m| m.value.map(|level_mm| LevelPoint { t: m.t, level_mm }))
            .collect();

        DevicePayload {
            device_id: self.device_id,
            coordinates: self.coordinates,
            max_distance_mm: self.max_distance_mm,
            last_water_level_mm: self.last_water_level_mm,
            last_fill_percent: self.last_fill_percent,
            window: self.window,
            measurements,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePayload {
    pub device_id: String,
    pub coordinates: Option<(f64, f64)>,
    pub max_distance_mm: Option<f64>,
    pub last_water_level_mm: Option<f64>,
    pub last_fill_percent: Option<f64>,
    pub window: TimeWindow,
    pub measurements: Vec<LevelPoint>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LevelPoint {
    pub t: i64,
    #[serde(rename = "levelMm")]
    pub level_mm: f64,
}

/// Display-facing series point: ISO8601 timestamp, reading in inches.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    pub date_time: String,
    pub reading: f64,
}

/// Where a site's reference level comes from: an ADS PRISM flow meter or a
/// set of PI historian tags. Sites without a configured reference get a
/// placeholder branch.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "source")]
pub enum SiteReference {
    #[serde(rename = "ADS")]
    Ads {
        #[serde(rename = "locationId")]
        location_id: u32,
    },
    #[serde(rename = "EBMUD")]
    Ebmud { tags: Vec<String> },
}

/// One monitored manhole site as configured in the site catalog.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub site_id: String,
    pub site_name: String,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<SiteReference>,
    pub lat: f64,
    pub lng: f64,
}

/// Device branch of a site aggregate, series converted to inches.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceBranch {
    pub device_id: String,
    pub last_water_level_in: Option<f64>,
    pub last_fill_percent: Option<f64>,
    pub time_series: Vec<InchPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct InchPoint {
    pub t: i64,
    #[serde(rename = "levelIn")]
    pub level_in: f64,
}

/// Reference branch of a site aggregate. Exactly one source shape is
/// populated per request; the constructors below are the only way to build
/// one.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceBranch {
    pub source: Option<String>,
    pub meta: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<DataPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_series: Option<BTreeMap<String, Vec<DataPoint>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReferenceBranch {
    pub fn ads(location_id: u32, data: Vec<DataPoint>, error: Option<String>) -> Self {
        ReferenceBranch {
            source: Some("ADS".to_string()),
            meta: serde_json::json!({ "locationId": location_id }),
            data: Some(data),
            time_series: None,
            error,
        }
    }

    pub fn ebmud(
        tags: Vec<String>,
        time_series: BTreeMap<String, Vec<DataPoint>>,
        error: Option<String>,
    ) -> Self {
        ReferenceBranch {
            source: Some("EBMUD".to_string()),
            meta: serde_json::json!({ "tags": tags }),
            data: None,
            time_series: Some(time_series),
            error,
        }
    }

    /// Placeholder for sites with no configured reference source.
    pub fn unconfigured() -> Self {
        ReferenceBranch {
            source: None,
            meta: Value::Null,
            data: None,
            time_series: None,
            error: None,
        }
    }
}

/// Rain branch of a site aggregate: the rain gauge of record plus the
/// cumulative rainfall over the window.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RainBranch {
    pub source: String,
    pub gauge_location_id: u32,
    pub data: Vec<DataPoint>,
    pub cumulative_in: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Top-level response for one site. Always well-formed: branch failures
/// land in the branch's own error field, never in a failed response.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteAggregate {
    pub site: Site,
    pub timeframe: TimeWindow,
    pub mhm: DeviceBranch,
    #[serde(rename = "ref")]
    pub reference: ReferenceBranch,
    pub rain: RainBranch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_from_mixed_inputs() {
        let window = TimeWindow::new(
            &TimeInput::Text("2025-09-01T00:00:00Z".to_string()),
            &TimeInput::Unix(1756857599.0),
        )
        .unwrap();
        assert_eq!(window.start_unix, 1756684800);
        assert_eq!(window.end_unix, 1756857599);
    }

    #[test]
    fn backwards_window_is_rejected() {
        let err = TimeWindow::new(&TimeInput::Unix(100.0), &TimeInput::Unix(99.0)).unwrap_err();
        assert!(matches!(err, WindowError::Backwards(_)));
    }

    #[test]
    fn unparseable_bound_is_a_format_error() {
        let err = TimeWindow::new(
            &TimeInput::Text("not a date".to_string()),
            &TimeInput::Unix(0.0),
        )
        .unwrap_err();
        assert!(matches!(err, WindowError::TimeFormat(_)));
    }

    #[test]
    fn payload_drops_sensor_gaps() {
        let record = DeviceRecord {
            device_id: "951".to_string(),
            coordinates: None,
            max_distance_mm: None,
            last_water_level_mm: Some(208.0),
            last_fill_percent: Some(9.0),
            window: TimeWindow { start_unix: 0, end_unix: 100 },
            measurements: vec![
                Measurement { t: 10, value: Some(118.0) },
                Measurement { t: 20, value: None },
                Measurement { t: 30, value: Some(120.5) },
            ],
        };

        let payload = record.into_payload();
        assert_eq!(payload.measurements, vec![
            LevelPoint { t: 10, level_mm: 118.0 },
            LevelPoint { t: 30, level_mm: 120.5 },
        ]);
    }

    #[test]
    fn site_reference_parses_both_sources() {
        let ads: SiteReference =
            serde_json::from_str(r#"{"source": "ADS", "locationId": 3}"#).unwrap();
        assert!(matches!(ads, SiteReference::Ads { location_id: 3 }));

        let ebmud: SiteReference =
            serde_json::from_str(r#"{"source": "EBMUD", "tags": ["OAK_EST_UP_LVL"]}"#).unwrap();
        assert!(matches!(ebmud, SiteReference::Ebmud { .. }));
    }
}
