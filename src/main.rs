use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod service;
mod utils;

use std::sync::Arc;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::service::attendance::AttendanceEngine;
use crate::service::audit::{AuditSink, SqlAuditSink};
use crate::service::directory::{Directory, SqlDirectory};
use crate::service::history::{HistorySink, SqlHistorySink};
use crate::service::salary::SalaryService;
use crate::utils::department_cache;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Workforce Management API"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await;

    // Collaborators are constructed once, up front, and handed to whatever
    // consumes them; nothing reaches for a process-wide service instance.
    let directory: Arc<dyn Directory> = Arc::new(SqlDirectory::new(pool.clone()));
    let audit: Arc<dyn AuditSink> = Arc::new(SqlAuditSink::new(pool.clone()));
    let history: Arc<dyn HistorySink> = Arc::new(SqlHistorySink::new(pool.clone()));
    let engine = Arc::new(AttendanceEngine::new(
        pool.clone(),
        directory.clone(),
        audit.clone(),
        history.clone(),
    ));
    let salary = Arc::new(SalaryService::new(
        pool.clone(),
        directory.clone(),
        engine.clone(),
    ));

    let pool_for_warmup = pool.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = department_cache::warmup_department_cache(&pool_for_warmup, 250).await {
            eprintln!("Failed to warmup department cache: {:?}", e);
        }
    });

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::from(engine.clone()))
            .app_data(Data::from(salary.clone()))
            .app_data(Data::from(audit.clone()))
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
