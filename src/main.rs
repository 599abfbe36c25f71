use actix_cors::Cors;
use actix_files::{Files, NamedFile};
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;

mod billing;
mod config;
mod controllers;
mod db;
mod error;
mod models;
mod rate_limit;
mod status;
mod sync;

use billing::{CapDefaults, HeartbeatMeter, SpendCapEnforcer};
use config::Config;
use db::Database;
use rate_limit::RateLimiter;
use status::AgentStatusTracker;
use sync::ConfigSyncEngine;

pub struct AppState {
    pub db: Arc<Database>,
    pub config: Config,
    pub rate_limiter: Arc<RateLimiter>,
    pub sync_engine: Arc<ConfigSyncEngine>,
    pub meter: Arc<HeartbeatMeter>,
    pub spend: Arc<SpendCapEnforcer>,
    pub status_tracker: Arc<AgentStatusTracker>,
}

/// SPA fallback handler - serves index.html for client-side routing
async fn spa_fallback() -> actix_web::Result<NamedFile> {
    // Check both possible locations for frontend dist
    if std::path::Path::new("./meridian-frontend/dist/index.html").exists() {
        Ok(NamedFile::open("./meridian-frontend/dist/index.html")?)
    } else {
        Ok(NamedFile::open("../meridian-frontend/dist/index.html")?)
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let port = config.port;

    log::info!("Initializing database at {}", config.database_url);
    let db = Database::new(&config.database_url).expect("Failed to initialize database");
    let db = Arc::new(db);

    let spend = Arc::new(SpendCapEnforcer::new(
        db.clone(),
        CapDefaults {
            daily: config.default_daily_cap,
            monthly: config.default_monthly_cap,
        },
    ));
    let meter = Arc::new(HeartbeatMeter::new(
        db.clone(),
        spend.clone(),
        config.compute_cost_per_minute,
    ));
    let sync_engine = Arc::new(ConfigSyncEngine::new(db.clone()));
    let status_tracker = Arc::new(AgentStatusTracker::new(db.clone()));

    // One limiter for the whole process; per-worker copies would multiply
    // every budget by the worker count.
    let rate_limiter = Arc::new(RateLimiter::in_memory());

    // Hourly sweep of expired bearer sessions
    let purge_db = db.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            tick.tick().await;
            match purge_db.purge_expired_sessions() {
                Ok(0) => {}
                Ok(n) => log::info!("Purged {} expired sessions", n),
                Err(e) => log::warn!("Session purge failed: {}", e),
            }
        }
    });

    // Determine frontend dist path (check both locations)
    // Set DISABLE_FRONTEND=1 to disable static file serving (for separate dev server)
    let frontend_dist = if std::env::var("DISABLE_FRONTEND")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
    {
        log::info!("Frontend serving disabled via DISABLE_FRONTEND env var");
        ""
    } else if std::path::Path::new("./meridian-frontend/dist").exists() {
        "./meridian-frontend/dist"
    } else if std::path::Path::new("../meridian-frontend/dist").exists() {
        "../meridian-frontend/dist"
    } else {
        log::warn!("Frontend dist not found in ./meridian-frontend/dist or ../meridian-frontend/dist - static file serving disabled");
        ""
    };

    log::info!("Starting Meridian sync server on port {}", port);
    if !frontend_dist.is_empty() {
        log::info!("Serving frontend from: {}", frontend_dist);
    }

    let frontend_dist = frontend_dist.to_string();

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        let mut app = App::new()
            .app_data(web::Data::new(AppState {
                db: Arc::clone(&db),
                config: config.clone(),
                rate_limiter: Arc::clone(&rate_limiter),
                sync_engine: Arc::clone(&sync_engine),
                meter: Arc::clone(&meter),
                spend: Arc::clone(&spend),
                status_tracker: Arc::clone(&status_tracker),
            }))
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config)
            .configure(controllers::heartbeat::config)
            .configure(controllers::agent_sync::config)
            .configure(controllers::agent_status::config)
            .configure(controllers::skill_configs::config)
            .configure(controllers::spending::config)
            .configure(controllers::settings::config);

        // Serve static files only if frontend dist exists
        if !frontend_dist.is_empty() {
            app = app.service(
                Files::new("/", frontend_dist.clone())
                    .index_file("index.html")
                    .default_handler(actix_web::web::to(spa_fallback)),
            );
        }

        app
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
