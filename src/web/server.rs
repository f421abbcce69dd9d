use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use log::info;
use tokio::sync::RwLock;

use crate::store::ScoreboardService;
use crate::web::handlers;

/// Shared application state for web handlers
pub struct AppState {
    pub service: Arc<RwLock<ScoreboardService>>,
}

/// Start the web server for the scoreboard API.
pub async fn start_web_server(
    service: Arc<RwLock<ScoreboardService>>,
    bind_addr: String,
) -> std::io::Result<()> {
    info!("Starting web server on http://{}", bind_addr);

    let app_state = web::Data::new(AppState {
        service: service.clone(),
    });

    // Build the server handle before awaiting; `HttpServer` itself is not
    // `Send`, only the `Server` returned by `run` is.
    let server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(app_state.clone())
            .service(
                web::scope("/api")
                    // Score APIs
                    .route("/scores", web::get().to(handlers::scores::list_scores))
                    .route("/scores/ranking", web::get().to(handlers::scores::song_ranking))
                    .route("/scores/unified", web::get().to(handlers::scores::unified_scores))
                    // Stats APIs
                    .route("/stats/dancers", web::get().to(handlers::stats::dancers_summary))
                    // Song catalog APIs
                    .route("/songs", web::get().to(handlers::songs::list_songs))
                    // Profile APIs
                    .route("/profile", web::get().to(handlers::profile::get_profile))
                    .route("/profile", web::put().to(handlers::profile::update_profile))
                    // Customize APIs
                    .route("/customize", web::get().to(handlers::customize::get_customize))
                    .route("/customize", web::put().to(handlers::customize::update_customize)),
            )
    })
    .bind(bind_addr.as_str())?
    .run();

    server.await
}
