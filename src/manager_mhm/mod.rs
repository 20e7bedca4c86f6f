pub mod errors;
mod models;

use std::time::Duration;
use log::debug;
use reqwest::Client;
use tokio::time::sleep;
use crate::initialization::MhmConfig;
use crate::manager_mhm::errors::MhmError;
use crate::manager_mhm::models::{device_id_string, ClientDevicePage, LevelRow};
use crate::models::{DeviceRecord, Measurement, TimeWindow};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const BACKOFF_BASE: f64 = 1.2;

/// Client for the MHM device-metrics service. Level history comes back in
/// cursor-paginated pages ordered by timestamp.
pub struct Mhm {
    api_base: String,
    api_key: String,
    pause_between_requests: f64,
    max_retries: u32,
    client: Client,
}

struct DeviceMeta {
    device_id: String,
    coordinates: Option<(f64, f64)>,
    max_distance_mm: Option<f64>,
    last_water_level_mm: Option<f64>,
    last_fill_percent: Option<f64>,
}

impl Mhm {
    /// Returns a new instance of the Mhm struct
    ///
    /// # Arguments
    ///
    /// * 'config' - MHM configuration struct
    pub fn new(config: &MhmConfig) -> Result<Self, MhmError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            api_base: config.api_base.to_string(),
            api_key: config.api_key.to_string(),
            pause_between_requests: config.pause_between_requests,
            max_retries: config.max_retries,
            client,
        })
    }

    /// Fetches every level measurement for a device within the window,
    /// walking the paginated API from window start until the window is
    /// covered.
    ///
    /// The cursor starts at the window start and advances to one past the
    /// last timestamp of each page. Pagination stops on an empty page, on
    /// the first row past the window end (the provider is chronological),
    /// on a cursor that fails to advance, or on a cursor past the window
    /// end. Measurements are sorted on finalization since upstream order
    /// is assumed but not trusted.
    ///
    /// # Arguments
    ///
    /// * 'window' - time window to cover
    /// * 'device_id' - device to fetch
    pub async fn fetch_level_data(
        &self,
        window: TimeWindow,
        device_id: &str,
    ) -> Result<DeviceRecord, MhmError> {
        let mut cursor = window.start_unix;
        let mut points: Vec<Measurement> = Vec::new();
        let mut meta: Option<DeviceMeta> = None;

        loop {
            let page = self.get_page_with_retries(device_id, cursor).await?;

            if meta.is_none() {
                meta = Some(page_meta(&page, device_id));
            }

            let scan = scan_page(&page.water_level_measurements, &window);
            points.extend(scan.in_window.iter().copied());

            match advance_cursor(&scan, cursor, &window) {
                Some(next) => {
                    debug!("device {}: cursor {} -> {}", device_id, cursor, next);
                    cursor = next;
                    if self.pause_between_requests > 0.0 {
                        sleep(Duration::from_secs_f64(self.pause_between_requests)).await;
                    }
                }
                None => break,
            }
        }

        points.sort_by_key(|m| m.t);

        let meta = meta.unwrap_or_else(|| DeviceMeta {
            device_id: device_id.to_string(),
            coordinates: None,
            max_distance_mm: None,
            last_water_level_mm: None,
            last_fill_percent: None,
        });

        Ok(DeviceRecord {
            device_id: meta.device_id,
            coordinates: meta.coordinates,
            max_distance_mm: meta.max_distance_mm,
            last_water_level_mm: meta.last_water_level_mm,
            last_fill_percent: meta.last_fill_percent,
            window,
            measurements: points,
        })
    }

    /// Requests one page, retrying transport failures and 5xx statuses up
    /// to max_retries extra attempts with geometric backoff. 4xx statuses
    /// are not retried.
    async fn get_page_with_retries(
        &self,
        device_id: &str,
        cursor: i64,
    ) -> Result<ClientDevicePage, MhmError> {
        let url = format!("{}/client_device", self.api_base);
        let mut attempt: u32 = 0;

        loop {
            let result = self.client.get(&url)
                .header("api_key", &self.api_key)
                .query(&[
                    ("device_id", device_id.to_string()),
                    ("starting_unix_timestamp", cursor.to_string()),
                ])
                .send().await;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_server_error() && attempt < self.max_retries {
                        debug!("device {}: {} on attempt {}, retrying", device_id, status, attempt);
                    } else if !status.is_success() {
                        return Err(MhmError::Upstream(format!("{:?}", status)));
                    } else {
                        let json = resp.text().await?;
                        let page: ClientDevicePage = serde_json::from_str(&json)?;
                        return Ok(page);
                    }
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(e.into());
                    }
                    debug!("device {}: request failed on attempt {}: {}", device_id, attempt, e);
                }
            }

            sleep(backoff_delay(attempt)).await;
            attempt += 1;
        }
    }
}

fn page_meta(page: &ClientDevicePage, requested_id: &str) -> DeviceMeta {
    DeviceMeta {
        device_id: page
            .device_id
            .as_ref()
            .and_then(device_id_string)
            .unwrap_or_else(|| requested_id.to_string()),
        coordinates: page.device_coordinates,
        max_distance_mm: page.max_distance,
        last_water_level_mm: page.last_water_level,
        last_fill_percent: page.last_fill_percentage,
    }
}

struct PageScan {
    in_window: Vec<Measurement>,
    last_ts: Option<i64>,
    exceeded_window: bool,
}

/// Scans one page in provider order: rows past the window end stop the scan
/// (nothing of interest follows on a chronological feed), rows from the
/// window start onward are kept.
fn scan_page(rows: &[LevelRow], window: &TimeWindow) -> PageScan {
    let mut in_window = Vec::new();
    let mut exceeded_window = false;

    for row in rows {
        if row.measurement_unix_timestamp > window.end_unix {
            exceeded_window = true;
            break;
        }
        if row.measurement_unix_timestamp >= window.start_unix {
            in_window.push(Measurement {
                t: row.measurement_unix_timestamp,
                value: row.water_level_mm,
            });
        }
    }

    PageScan {
        in_window,
        last_ts: rows.last().map(|r| r.measurement_unix_timestamp),
        exceeded_window,
    }
}

/// Next cursor after a page, or None when pagination is done: empty page,
/// window exceeded, cursor not advancing (stall guard), or cursor past the
/// window end.
fn advance_cursor(scan: &PageScan, cursor: i64, window: &TimeWindow) -> Option<i64> {
    let last_ts = scan.last_ts?;
    let next = last_ts + 1;

    if scan.exceeded_window || next <= cursor || next > window.end_unix {
        None
    } else {
        Some(next)
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs_f64(BACKOFF_BASE.powi(attempt as i32))
}
