use log::warn;
use serde_json::Value;
use crate::initialization::Config;
use crate::manager_mhm::Mhm;
use crate::manager_pi::PiHistorian;
use crate::manager_prism::{EntityKind, Prism};
use crate::models::{
    DataPoint, DeviceBranch, DeviceRecord, InchPoint, RainBranch, ReferenceBranch, Site,
    SiteAggregate, SiteReference, TimeWindow,
};
use crate::units::{convert_length, round2, LengthUnit};

/// Builds the full dashboard view of one site over one window: the MHM
/// device level series, the site's reference source, and the rain gauge of
/// record.
///
/// The three branches are independent and run concurrently. A failing
/// branch degrades to an error field on that branch only; the aggregate
/// itself always comes back with all three branches present.
pub async fn aggregate_site(config: &Config, site: &Site, window: TimeWindow) -> SiteAggregate {
    let (mhm, reference, rain) = tokio::join!(
        device_branch(config, site, window),
        reference_branch(config, site, window),
        rain_branch(config, window),
    );

    SiteAggregate {
        site: site.clone(),
        timeframe: window,
        mhm,
        reference,
        rain,
    }
}

async fn device_branch(config: &Config, site: &Site, window: TimeWindow) -> DeviceBranch {
    let fetched = match Mhm::new(&config.mhm) {
        Ok(mhm) => mhm.fetch_level_data(window, &site.device_id).await,
        Err(e) => Err(e),
    };

    match fetched {
        Ok(record) => device_branch_from_record(record),
        Err(e) => {
            warn!("device branch for site {} failed: {}", site.site_id, e);
            DeviceBranch {
                device_id: site.device_id.clone(),
                last_water_level_in: None,
                last_fill_percent: None,
                time_series: Vec::new(),
                error: Some(e.to_string()),
            }
        }
    }
}

/// Converts a finalized device record to the display branch: levels in
/// inches, sensor gaps dropped.
fn device_branch_from_record(record: DeviceRecord) -> DeviceBranch {
    let time_series = record
        .measurements
        .iter()
        .filter_map(|m| {
            convert_length(m.value, LengthUnit::Millimeters, LengthUnit::Inches)
                .map(|level_in| InchPoint { t: m.t, level_in })
        })
        .collect();

    DeviceBranch {
        device_id: record.device_id,
        last_water_level_in: convert_length(
            record.last_water_level_mm,
            LengthUnit::Millimeters,
            LengthUnit::Inches,
        ),
        last_fill_percent: record.last_fill_percent,
        time_series,
        error: None,
    }
}

async fn reference_branch(config: &Config, site: &Site, window: TimeWindow) -> ReferenceBranch {
    match &site.reference {
        Some(SiteReference::Ads { location_id }) => {
            let fetched = match Prism::new(&config.prism) {
                Ok(prism) => {
                    prism
                        .fetch_telemetry(window, EntityKind::Depth, &[*location_id])
                        .await
                }
                Err(e) => Err(e),
            };

            match fetched {
                Ok(raw) => ReferenceBranch::ads(*location_id, extract_series(&raw), None),
                Err(e) => {
                    warn!("reference branch for site {} failed: {}", site.site_id, e);
                    ReferenceBranch::ads(*location_id, Vec::new(), Some(e.to_string()))
                }
            }
        }
        Some(SiteReference::Ebmud { tags }) => {
            let result = PiHistorian::new(&config.pi).fetch_interpolated(window, tags).await;
            ReferenceBranch::ebmud(tags.clone(), result.time_series, result.error)
        }
        None => ReferenceBranch::unconfigured(),
    }
}

async fn rain_branch(config: &Config, window: TimeWindow) -> RainBranch {
    let gauge = config.prism.rain_location_id;
    let fetched = match Prism::new(&config.prism) {
        Ok(prism) => prism.fetch_rain(window).await,
        Err(e) => Err(e),
    };

    match fetched {
        Ok(raw) => {
            let data = extract_series(&raw);
            let cumulative_in = Some(cumulative_rain(&data));
            RainBranch {
                source: "ADS".to_string(),
                gauge_location_id: gauge,
                data,
                cumulative_in,
                error: None,
            }
        }
        Err(e) => {
            warn!("rain branch failed: {}", e);
            RainBranch {
                source: "ADS".to_string(),
                gauge_location_id: gauge,
                data: Vec::new(),
                cumulative_in: None,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Slices a PRISM telemetry response down to the first location's first
/// entity's data array. Points without a reading are sensor gaps and are
/// dropped from the emitted series.
pub fn extract_series(raw: &Value) -> Vec<DataPoint> {
    let points = raw
        .as_array()
        .and_then(|locations| locations.first())
        .and_then(|location| location.get("entities"))
        .and_then(|entities| entities.as_array())
        .and_then(|entities| entities.first())
        .and_then(|entity| entity.get("data"))
        .and_then(|data| data.as_array());

    let Some(points) = points else {
        return Vec::new();
    };

    points
        .iter()
        .filter_map(|point| {
            let date_time = point.get("dateTime")?.as_str()?.to_string();
            let reading = point.get("reading")?.as_f64()?;
            Some(DataPoint { date_time, reading })
        })
        .collect()
}

/// Sum of the present readings, rounded to two decimals. Gaps count as
/// zero and are already absent from the series.
fn cumulative_rain(data: &[DataPoint]) -> f64 {
    round2(data.iter().map(|p| p.reading).sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::models::Measurement;

    #[test]
    fn extract_takes_first_location_first_entity() {
        let raw = json!([
            {
                "locationName": "RG11",
                "entities": [
                    {
                        "entityId": 2123,
                        "data": [
                            { "dateTime": "2025-03-01T00:00:00", "reading": 0.1 },
                            { "dateTime": "2025-03-01T00:15:00", "reading": null },
                            { "dateTime": "2025-03-01T00:30:00", "reading": 0.2 },
                        ]
                    },
                    { "entityId": 9999, "data": [ { "dateTime": "x", "reading": 5.0 } ] }
                ]
            },
            { "entities": [] }
        ]);

        let series = extract_series(&raw);
        assert_eq!(series, vec![
            DataPoint { date_time: "2025-03-01T00:00:00".to_string(), reading: 0.1 },
            DataPoint { date_time: "2025-03-01T00:30:00".to_string(), reading: 0.2 },
        ]);
    }

    #[test]
    fn extract_of_unexpected_shape_is_empty() {
        assert!(extract_series(&json!({})).is_empty());
        assert!(extract_series(&json!([])).is_empty());
        assert!(extract_series(&json!([{ "entities": [] }])).is_empty());
        assert!(extract_series(&json!(null)).is_empty());
    }

    #[test]
    fn rain_gaps_are_dropped_but_counted_as_zero() {
        let raw = json!([
            {
                "entities": [
                    {
                        "data": [
                            { "dateTime": "2025-03-01T00:00:00", "reading": 0.1 },
                            { "dateTime": "2025-03-01T00:15:00", "reading": null },
                            { "dateTime": "2025-03-01T00:30:00", "reading": 0.2 },
                        ]
                    }
                ]
            }
        ]);

        let data = extract_series(&raw);
        assert_eq!(data.len(), 2);
        assert_eq!(cumulative_rain(&data), 0.3);
    }

    #[test]
    fn one_failed_branch_leaves_the_other_two_populated() {
        let site = Site {
            site_id: "MH-001".to_string(),
            site_name: "San Pablo Ave & Solano Ave".to_string(),
            device_id: "951".to_string(),
            reference: Some(SiteReference::Ebmud {
                tags: vec!["OAK_EST_UP_LVL".to_string()],
            }),
            lat: 37.8869,
            lng: -122.2982,
        };

        // Historian down: its branch carries the error, the others their data.
        let aggregate = SiteAggregate {
            site,
            timeframe: TimeWindow { start_unix: 0, end_unix: 900 },
            mhm: device_branch_from_record(DeviceRecord {
                device_id: "951".to_string(),
                coordinates: None,
                max_distance_mm: None,
                last_water_level_mm: Some(254.0),
                last_fill_percent: Some(12.0),
                window: TimeWindow { start_unix: 0, end_unix: 900 },
                measurements: vec![Measurement { t: 60, value: Some(254.0) }],
            }),
            reference: ReferenceBranch::ebmud(
                vec!["OAK_EST_UP_LVL".to_string()],
                Default::default(),
                Some("connection refused".to_string()),
            ),
            rain: RainBranch {
                source: "ADS".to_string(),
                gauge_location_id: 22,
                data: vec![DataPoint {
                    date_time: "2025-03-01T00:00:00".to_string(),
                    reading: 0.1,
                }],
                cumulative_in: Some(0.1),
                error: None,
            },
        };

        let json = serde_json::to_value(&aggregate).unwrap();
        assert_eq!(json["site"]["siteId"], "MH-001");
        assert_eq!(json["timeframe"]["endUnix"], 900);
        assert_eq!(json["mhm"]["timeSeries"][0]["levelIn"], 10.0);
        assert!(json["mhm"].get("error").is_none());
        assert_eq!(json["ref"]["source"], "EBMUD");
        assert_eq!(json["ref"]["error"], "connection refused");
        assert_eq!(json["rain"]["cumulativeIn"], 0.1);
        assert!(json["rain"].get("error").is_none());
    }

    #[test]
    fn device_branch_converts_to_inches_and_drops_gaps() {
        let record = DeviceRecord {
            device_id: "951".to_string(),
            coordinates: Some((37.88, -122.29)),
            max_distance_mm: Some(2108.0),
            last_water_level_mm: Some(208.0),
            last_fill_percent: Some(9.0),
            window: TimeWindow { start_unix: 0, end_unix: 100 },
            measurements: vec![
                Measurement { t: 10, value: Some(127.0) },
                Measurement { t: 20, value: None },
                Measurement { t: 30, value: Some(254.0) },
            ],
        };

        let branch = device_branch_from_record(record);
        assert_eq!(branch.last_water_level_in, Some(8.19));
        assert_eq!(branch.time_series, vec![
            InchPoint { t: 10, level_in: 5.0 },
            InchPoint { t: 30, level_in: 10.0 },
        ]);
        assert!(branch.error.is_none());
    }
}
