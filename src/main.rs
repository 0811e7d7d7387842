use graphite_costing::{config::Settings, db, logging, routes, state::AppState};

#[tokio::main]
async fn main() {
  let settings = Settings::load();
  logging::init(&settings.log_file);

  let pool = db::init_db(&settings.database_path).expect("Failed to initialize database");
  tracing::info!("Database ready at {}", settings.database_path.display());
  tracing::info!("Migrations directory: {}", settings.migrations_dir.display());

  let bind_addr = settings.bind_addr();
  let port = settings.server_port;
  let app = routes::router(AppState::new(pool, settings));

  let listener = tokio::net::TcpListener::bind(&bind_addr)
    .await
    .unwrap_or_else(|_| panic!("Failed to bind to {}", bind_addr));

  tracing::info!("Server running on http://localhost:{}", port);

  axum::serve(listener, app)
    .await
    .expect("Server failed to start");
}
