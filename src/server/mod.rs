/// HTTP front door for the gateway.
///
/// Two kinds of endpoint: the key configuration advertisement and one or
/// more encapsulation endpoints, each backed by its own application handler.
/// Outer-envelope failures surface as HTTP status codes; anything after a
/// successful decapsulation is sealed into the response and the outer status
/// stays 200, so the relay cannot classify outcomes.
pub mod routes;

use std::collections::HashMap;
use std::sync::Arc;

use axum::routing::{any, get};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::EncapsulationHandler;
use crate::metrics::MetricsFactory;
use crate::ohttp::gateway::Gateway;

/// Path serving the marshalled public key configurations.
pub const CONFIG_ENDPOINT: &str = "/ohttp-configs";

/// Default encapsulation endpoints.
pub const GATEWAY_ENDPOINT: &str = "/gateway";
pub const ECHO_ENDPOINT: &str = "/echo";

/// Shared application state available to all handlers.
pub struct AppState {
    /// The gateway core and its key registry.
    pub gateway: Arc<Gateway>,
    /// Encapsulation endpoint path → handler.
    pub handlers: HashMap<String, EncapsulationHandler>,
    /// One event per inbound encapsulation request.
    pub metrics: Arc<dyn MetricsFactory>,
    /// Whether error responses carry descriptive bodies.
    pub debug_response: bool,
}

/// Build the Axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(routes::health))
        .route(CONFIG_ENDPOINT, get(routes::config));

    for path in state.handlers.keys() {
        router = router.route(path, any(routes::gateway));
    }

    router
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
}

/// Start the gateway server.
pub async fn serve(state: AppState, addr: &str) -> crate::error::Result<()> {
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(crate::error::GatewayError::Io)?;

    tracing::info!("privacy gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(crate::error::GatewayError::Io)?;

    Ok(())
}
