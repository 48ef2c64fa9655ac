use std::net::{IpAddr, TcpListener};
use std::sync::Arc;

use log::{error, info};
use warp::Filter;

use glowup::collage_generator::CollageGenerator;
use glowup::config::Config;
use glowup::gemini::GeminiClient;
use glowup::handlers_collage::build_collage_routes;
use glowup::handlers_health::build_health_routes;
use glowup::handlers_session::build_session_routes;
use glowup::orchestrator::Orchestrator;
use glowup::session::new_shared_session;
use glowup::warp_helpers::{cors, handle_rejection};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config::from_env()?;
    let port = config.port;

    info!("Starting GlowUp server on port {}", port);
    info!("Analysis model: {}", config.analysis_model);
    info!("Image model: {}", config.image_model);
    info!("Collage font: {}", config.font_path);
    if config.api_key.is_none() {
        error!("GEMINI_API_KEY is not set; analysis requests will fail until it is configured");
    }

    if !is_port_available(port) {
        error!(
            "Port {} is already in use. Please stop any existing GlowUp instances or use a different port.",
            port
        );
        return Err(format!("Port {} is already in use", port).into());
    }

    let host: IpAddr = config.host.parse()?;
    let config = Arc::new(config);

    let session = new_shared_session();
    let backend = Arc::new(GeminiClient::new(&config));
    let orchestrator = Arc::new(Orchestrator::new(session.clone(), backend));
    let collage_generator = Arc::new(CollageGenerator::new(&config));
    info!("Session and model services initialized");

    let health_routes = build_health_routes(config.clone(), collage_generator.clone());
    let session_routes = build_session_routes(session.clone(), orchestrator, config.clone());
    let collage_routes = build_collage_routes(session, collage_generator);

    let routes = health_routes
        .or(session_routes)
        .or(collage_routes)
        .with(cors())
        .with(warp::log("glowup"))
        .recover(handle_rejection);

    info!(
        "Server started successfully, listening on http://{}:{}",
        config.host, port
    );

    warp::serve(routes).run((host, port)).await;

    Ok(())
}

fn is_port_available(port: u16) -> bool {
    TcpListener::bind(("0.0.0.0", port)).is_ok()
}
