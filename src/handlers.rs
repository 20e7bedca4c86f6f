use actix_web::{get, post, web, HttpResponse, Responder};
use serde::Deserialize;
use crate::aggregator::aggregate_site;
use crate::manager_mhm::Mhm;
use crate::manager_prism::{EntityKind, Prism};
use crate::models::{TimeWindow, WindowError};
use crate::timeutil::TimeInput;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteDataParams {
    pub site_id: String,
    pub start_time: Option<TimeInput>,
    pub end_time: Option<TimeInput>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceLevelParams {
    pub device_id: String,
    pub start_time: Option<TimeInput>,
    pub end_time: Option<TimeInput>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryParams {
    pub location_id: u32,
    pub start_time: Option<TimeInput>,
    pub end_time: Option<TimeInput>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterTempParams {
    pub location_ids: Vec<u32>,
    pub start_time: Option<TimeInput>,
    pub end_time: Option<TimeInput>,
}

/// Full dashboard aggregate for one configured site. Branch failures are
/// embedded in the response; only a bad request shape fails the call.
#[post("/api/site_data")]
pub async fn site_data(
    data: web::Data<AppState>,
    params: web::Json<SiteDataParams>,
) -> impl Responder {
    let window = match build_window(&params.start_time, &params.end_time) {
        Ok(window) => window,
        Err(resp) => return resp,
    };

    let Some(site) = data.config.sites.iter().find(|s| s.site_id == params.site_id) else {
        return HttpResponse::NotFound()
            .json(serde_json::json!({ "detail": format!("unknown site {}", params.site_id) }));
    };

    let aggregate = aggregate_site(&data.config, site, window).await;

    HttpResponse::Ok().json(aggregate)
}

/// Raw level history for one MHM device.
#[post("/api/device_level")]
pub async fn device_level(
    data: web::Data<AppState>,
    params: web::Json<DeviceLevelParams>,
) -> impl Responder {
    let window = match build_window(&params.start_time, &params.end_time) {
        Ok(window) => window,
        Err(resp) => return resp,
    };

    let fetched = match Mhm::new(&data.config.mhm) {
        Ok(mhm) => mhm.fetch_level_data(window, &params.device_id).await,
        Err(e) => Err(e),
    };

    match fetched {
        Ok(record) => HttpResponse::Ok().json(record.into_payload()),
        Err(e) => HttpResponse::BadGateway().json(serde_json::json!({ "detail": e.to_string() })),
    }
}

/// Raw PRISM depth telemetry for one location, passed through unmodified.
#[post("/api/telemetry")]
pub async fn telemetry(
    data: web::Data<AppState>,
    params: web::Json<TelemetryParams>,
) -> impl Responder {
    let window = match build_window(&params.start_time, &params.end_time) {
        Ok(window) => window,
        Err(resp) => return resp,
    };

    let fetched = match Prism::new(&data.config.prism) {
        Ok(prism) => {
            prism
                .fetch_telemetry(window, EntityKind::Depth, &[params.location_id])
                .await
        }
        Err(e) => Err(e),
    };

    match fetched {
        Ok(raw) => HttpResponse::Ok().json(raw),
        Err(e) => HttpResponse::BadGateway().json(serde_json::json!({ "detail": e.to_string() })),
    }
}

/// Raw wastewater temperature telemetry across a set of locations.
#[post("/api/water_temp")]
pub async fn water_temp(
    data: web::Data<AppState>,
    params: web::Json<WaterTempParams>,
) -> impl Responder {
    let window = match build_window(&params.start_time, &params.end_time) {
        Ok(window) => window,
        Err(resp) => return resp,
    };

    let fetched = match Prism::new(&data.config.prism) {
        Ok(prism) => {
            prism
                .fetch_telemetry(window, EntityKind::WaterTemp, &params.location_ids)
                .await
        }
        Err(e) => Err(e),
    };

    match fetched {
        Ok(raw) => HttpResponse::Ok().json(raw),
        Err(e) => HttpResponse::BadGateway().json(serde_json::json!({ "detail": e.to_string() })),
    }
}

/// The configured site catalog, as the dashboard's site table expects it.
#[get("/api/sites")]
pub async fn sites(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(&data.config.sites)
}

/// Validates the request's time bounds: both must be present and parse,
/// and the window must not run backwards. Shape problems are a 400,
/// reported separately from any upstream degradation.
fn build_window(
    start: &Option<TimeInput>,
    end: &Option<TimeInput>,
) -> Result<TimeWindow, HttpResponse> {
    let (Some(start), Some(end)) = (start, end) else {
        return Err(HttpResponse::BadRequest()
            .json(serde_json::json!({ "detail": "startTime and endTime are required" })));
    };

    TimeWindow::new(start, end).map_err(|e| {
        let detail = match &e {
            WindowError::TimeFormat(msg) => msg.clone(),
            WindowError::Backwards(msg) => msg.clone(),
        };
        HttpResponse::BadRequest().json(serde_json::json!({ "detail": detail }))
    })
}
