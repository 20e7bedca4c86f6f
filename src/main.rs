mod aggregator;
mod errors;
mod handlers;
mod initialization;
mod logging;
mod manager_mhm;
mod manager_pi;
mod manager_prism;
mod models;
mod timeutil;
mod units;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use log::info;
use crate::errors::UnrecoverableError;
use crate::handlers::{device_level, site_data, sites, telemetry, water_temp};
use crate::initialization::{config, Config};
use crate::logging::setup_logger;

struct AppState {
    config: Config,
}

#[actix_web::main]
async fn main() -> Result<(), UnrecoverableError> {
    setup_logger();
    let config = config()?;
    let web_data = web::Data::new(AppState { config: config.clone() });

    info!("starting web server");
    HttpServer::new(move || {
        // The dashboard is served from another origin.
        App::new()
            .app_data(web_data.clone())
            .wrap(Cors::permissive())
            .service(site_data)
            .service(device_level)
            .service(telemetry)
            .service(water_temp)
            .service(sites)
    })
        .bind((config.web_server.bind_address.as_str(), config.web_server.bind_port))?
        .run()
        .await?;

    Ok(())
}
