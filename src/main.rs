//src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::{AppState, Config};
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let config = Config::from_env()?;
    let app_state = AppState::new(&config).await?;

    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let app = build_router(app_state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(app_state: AppState) -> Router {
    // Rotas de autenticação (públicas)
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    let user_routes = Router::new()
        .route("/", get(handlers::users::list_users))
        .route("/me", get(handlers::users::get_me))
        .route("/{id}/approve", post(handlers::users::approve_user));

    let treasury_routes = Router::new()
        .route(
            "/material-requests",
            get(handlers::treasury::list_material_requests).post(handlers::treasury::create_material_request),
        )
        .route(
            "/material-requests/{id}/status",
            post(handlers::treasury::update_material_request_status),
        )
        .route("/export", post(handlers::treasury::export_to_treasury))
        .route("/payment-references", get(handlers::treasury::list_payment_references))
        .route("/payment-references/{id}", get(handlers::treasury::get_payment_reference))
        .route(
            "/payment-references/{id}/process",
            post(handlers::treasury::process_payment_reference),
        )
        .route(
            "/payment-references/{id}/cancel",
            post(handlers::treasury::cancel_payment_reference),
        )
        .route("/transactions", get(handlers::treasury::list_transactions))
        .route("/accounts", get(handlers::treasury::list_funding_accounts))
        .route(
            "/material-payments",
            get(handlers::material_payments::list_material_payments)
                .post(handlers::material_payments::create_material_payment),
        )
        .route(
            "/material-payments/{id}/process",
            post(handlers::material_payments::process_material_payment),
        );

    let dashboard_routes = Router::new()
        .route("/treasury-summary", get(handlers::dashboard::get_treasury_summary))
        .route("/expenses-by-month", get(handlers::dashboard::get_expenses_by_month))
        .route("/expenses-by-partida", get(handlers::dashboard::get_expenses_by_partida))
        .route("/payables-by-supplier", get(handlers::dashboard::get_payables_by_supplier));

    let document_routes = Router::new().route(
        "/payment-references/{id}/voucher",
        get(handlers::documents::payment_reference_voucher),
    );

    // Tudo fora de /api/auth exige usuário autenticado e aprovado
    let protected = Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/treasury", treasury_routes)
        .nest("/api/dashboard", dashboard_routes)
        .nest("/api/documents", document_routes)
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .merge(protected)
        .with_state(app_state)
}
