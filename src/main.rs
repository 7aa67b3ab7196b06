use std::io;

use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use log::info;

use employee_records::app::{self, AppState};
use employee_records::config::Config;
use employee_records::db;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env().map_err(io::Error::other)?;

    let store = db::connect(&config).await.map_err(io::Error::other)?;
    if let Some(seed) = &config.admin {
        app::seed_admin(store.as_ref(), seed).await.map_err(io::Error::other)?;
    }

    let state = web::Data::new(AppState::new(&config, store));

    info!("Starting server at {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(app::configure)
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
