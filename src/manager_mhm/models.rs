use serde::Deserialize;
use serde_json::Value;

/// One page of the client device service response. Metadata fields ride
/// along on every page; only the first page's values are kept.
#[derive(Deserialize)]
pub struct ClientDevicePage {
    pub device_id: Option<Value>,
    pub device_coordinates: Option<(f64, f64)>,
    pub max_distance: Option<f64>,
    pub last_water_level: Option<f64>,
    pub last_fill_percentage: Option<f64>,
    #[serde(default)]
    pub water_level_measurements: Vec<LevelRow>,
}

/// One measurement row. A null level is a sensor gap.
#[derive(Deserialize)]
pub struct LevelRow {
    pub measurement_unix_timestamp: i64,
    pub water_level_mm: Option<f64>,
}

/// The device id comes back as a bare number or a string depending on the
/// provider revision.
pub fn device_id_string(value: &Value) -> Option<String> {
    if let Some(num) = value.as_i64() {
        return Some(num.to_string());
    }
    value.as_str().map(|s| s.to_string())
}
