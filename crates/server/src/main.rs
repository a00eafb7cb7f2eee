//! Conclave Server
//!
//! Axum server exposing the specialist panel over a WebSocket, plus a small
//! REST surface for live sessions, the conversation archive and the
//! effective panel configuration.

mod api;

use axum::{
    body::Body,
    http::{header, Response},
    response::IntoResponse,
    routing::get,
    Router,
};
use clap::{Parser, Subcommand};
use conclave_core::panel::{PanelConfig, PanelServices, SessionRegistry};
use conclave_core::state::ConclaveDb;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;

/// Application state
pub struct AppState {
    pub registry: SessionRegistry,
    pub db: Arc<ConclaveDb>,
}

pub type SharedState = Arc<AppState>;

#[derive(Parser, Clone)]
#[command(author, version, about = "Conclave - a specialist panel that plans your product")]
struct Args {
    /// Emit logs as JSON
    #[arg(long, global = true, env = "CONCLAVE_LOG_JSON")]
    json: bool,

    /// Serve options used when no subcommand is given
    #[command(flatten)]
    serve: ServeArgs,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(clap::Args, Clone, Debug)]
struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "CONCLAVE_PORT")]
    port: u16,
    /// Panel configuration overlay (JSON)
    #[arg(short, long, env = "CONCLAVE_CONFIG")]
    config: Option<PathBuf>,
    /// Archive database path
    #[arg(long, default_value = ".conclave/conclave.db", env = "CONCLAVE_DB")]
    db: PathBuf,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the Conclave server (default)
    Serve(ServeArgs),
    /// Validate a panel configuration file and exit
    CheckConfig {
        /// Configuration file to check
        path: PathBuf,
    },
}

// === OpenAPI Definition ===

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Conclave API",
        version = "1.0.0",
        description = "API for the Conclave specialist panel"
    ),
    paths(
        api::conversations::health,
        api::conversations::list_conversations,
        api::conversations::get_conversation,
        api::conversations::list_archive,
        api::conversations::get_archived,
        api::conversations::get_document_history,
        api::conversations::get_config,
        api::ws::conversation_socket
    ),
    components(
        schemas(
            api::conversations::HealthResponse,
            api::conversations::ConversationStatusResponse,
            api::conversations::ArchiveSummaryResponse,
            api::conversations::DocumentVersionResponse,
            api::conversations::ConfigResponse
        )
    ),
    tags(
        (name = "conversations", description = "Live sessions and the conversation archive"),
        (name = "config", description = "Effective panel configuration"),
        (name = "ws", description = "Conversation WebSocket")
    )
)]
struct ApiDoc;

async fn serve_openapi() -> impl IntoResponse {
    let doc = ApiDoc::openapi().to_json().unwrap_or_default();
    ([(header::CONTENT_TYPE, "application/json")], doc)
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("conclave_server=info,conclave_core=info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<PanelConfig> {
    match path {
        Some(path) => PanelConfig::load(path),
        None => {
            let config = PanelConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .nest("/api/v1", api::conversations::routes())
        .route("/api/v1/ws", get(api::ws::conversation_socket))
        .route("/api/v1/openapi.json", get(serve_openapi))
        .fallback(|| async {
            Response::builder()
                .status(axum::http::StatusCode::NOT_FOUND)
                .body(Body::from("Not found"))
                .unwrap_or_default()
        })
        .with_state(state)
}

async fn run_server(serve: ServeArgs) -> anyhow::Result<()> {
    let config = load_config(serve.config.as_ref())?;
    if let Some(path) = &serve.config {
        tracing::info!(path = %path.display(), "Loaded panel configuration");
    }

    let db = Arc::new(ConclaveDb::open_at(&serve.db)?);
    tracing::info!(path = %serve.db.display(), "Opened conversation archive");

    let registry = SessionRegistry::new(PanelServices::with_defaults(config)).with_archive(Arc::clone(&db));
    let state: SharedState = Arc::new(AppState { registry, db });

    let app = build_router(Arc::clone(&state));

    let addr = SocketAddr::from(([127, 0, 0, 1], serve.port));
    tracing::info!("Conclave Server running at http://{}", addr);
    tracing::info!("   Conversation: ws://{}/api/v1/ws", addr);
    tracing::info!("   Sessions:     /api/v1/conversations");
    tracing::info!("   Archive:      /api/v1/archive, /api/v1/archive/:id/documents/:doc_type");
    tracing::info!("   Config:       /api/v1/config");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("Shutting down; archiving live sessions");
    state.registry.shutdown().await;
    Ok(())
}

fn check_config(path: &PathBuf) -> anyhow::Result<()> {
    let config = PanelConfig::load(path)?;
    println!("Configuration OK: {}", path.display());
    for ty in conclave_core::state::ConversationType::ALL {
        let order: Vec<&str> = config.priority_order(ty).iter().map(|s| s.as_str()).collect();
        println!(
            "  {:<8} first responder: {:<18} order: {}",
            ty.as_str(),
            config.first_responder(ty).map(|s| s.as_str()).unwrap_or("-"),
            order.join(" > ")
        );
        println!("           documents: {}", config.required_doc_types(ty).join(", "));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.json);

    match args.command {
        Some(CliCommand::CheckConfig { path }) => check_config(&path),
        Some(CliCommand::Serve(serve)) => run_server(serve).await,
        None => run_server(args.serve).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_args_parse() {
        let args = Args::try_parse_from(["conclave", "serve", "--port", "9000", "--db", "/tmp/c.db"]).unwrap();
        match args.command {
            Some(CliCommand::Serve(serve)) => {
                assert_eq!(serve.port, 9000);
                assert!(serve.config.is_none());
                assert_eq!(serve.db, PathBuf::from("/tmp/c.db"));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_serve_options_apply_without_subcommand() {
        let args = Args::try_parse_from(["conclave", "--port", "9100", "--config", "panel.json"]).unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.serve.port, 9100);
        assert_eq!(args.serve.config, Some(PathBuf::from("panel.json")));
    }

    #[test]
    fn test_check_config_args_parse() {
        let args = Args::try_parse_from(["conclave", "check-config", "panel.json"]).unwrap();
        assert!(matches!(args.command, Some(CliCommand::CheckConfig { .. })));
    }

    #[test]
    fn test_openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/health"));
        assert!(doc.paths.paths.contains_key("/api/v1/archive/{id}"));
        assert!(doc
            .paths
            .paths
            .contains_key("/api/v1/archive/{id}/documents/{doc_type}"));
    }
}
