use axum::extract::{Path as AxumPath, RawQuery, State};
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use minijinja::value::Value as MiniValue;
use minijinja::Environment;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::aggregate::Aggregates;
use crate::charts::ChartId;
use crate::config::DashboardConfig;
use crate::pages::{PageRouter, Route};
use crate::theme::{self, ThemeMode};
use crate::utils;

const PAGE_TEMPLATE: &str = "page.html";
const HEADER_TITLE: &str = "d a r k . m a t t e r . r e s e a r c h . d a t a";

/// Read-only snapshot shared by every request; nothing writes after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DashboardConfig>,
    pub aggregates: Arc<Aggregates>,
    pub router: Arc<PageRouter>,
    pub palette: Arc<Vec<&'static str>>,
}

impl AppState {
    pub fn new(config: DashboardConfig, aggregates: Aggregates) -> Self {
        let palette = theme::shuffled_palette(config.palette_seed);
        Self {
            config: Arc::new(config),
            aggregates: Arc::new(aggregates),
            router: Arc::new(PageRouter::default()),
            palette: Arc::new(palette),
        }
    }

    fn theme_mode(&self, query: Option<String>) -> ThemeMode {
        utils::parse_query(query)
            .get("theme")
            .and_then(|vals| vals.first())
            .and_then(|raw| ThemeMode::parse(raw))
            .unwrap_or(self.config.default_theme)
    }
}

type SharedState = State<(AppState, Arc<Environment<'static>>)>;

pub fn build_template_env(templates_dir: &Path) -> Environment<'static> {
    let mut env = Environment::new();
    env.add_filter("tojson", |value: MiniValue| {
        let json = serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string());
        MiniValue::from_safe_string(json)
    });
    env.add_filter("commas", |value: i64| utils::format_with_commas(value));
    env.set_loader(minijinja::path_loader(templates_dir));
    env
}

pub fn build_router(state: AppState) -> Router {
    let env = build_template_env(&state.config.templates_dir);
    let assets_dir = state.config.assets_dir.clone();
    Router::new()
        .route("/health", get(health_check))
        .route("/api/pages", get(page_options))
        .route("/api/charts/:chart_id", get(chart_figure))
        .nest_service("/assets", ServeDir::new(assets_dir))
        .fallback(render_page)
        .with_state((state, Arc::new(env)))
}

pub async fn run(state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let addr = state.config.bind_addr();
    let app = build_router(state);
    info!(%addr, "starting dashboard server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_check(State((state, _env)): SharedState) -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "version": env!("CARGO_PKG_VERSION"),
        "papers": state.aggregates.records,
        "resolved": state.aggregates.resolved,
        "dropped": state.aggregates.dropped,
    }))
}

async fn page_options(State((state, _env)): SharedState) -> impl IntoResponse {
    Json(state.router.options())
}

async fn chart_figure(
    State((state, _env)): SharedState,
    AxumPath(chart_id): AxumPath<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let Some(chart) = ChartId::parse(&chart_id) else {
        warn!(%chart_id, "unknown chart requested");
        return (StatusCode::NOT_FOUND, format!("unknown chart {chart_id}")).into_response();
    };
    let theme = state.theme_mode(query).theme();
    Json(chart.build(&state.aggregates, &theme, &state.palette)).into_response()
}

async fn render_page(
    State((state, env)): SharedState,
    uri: Uri,
    RawQuery(query): RawQuery,
) -> Response {
    let mode = state.theme_mode(query);
    let route = state.router.resolve(uri.path());
    let status = match route {
        Route::Page(_) => StatusCode::OK,
        Route::NotFound => {
            warn!(path = uri.path(), "no layout for path");
            StatusCode::NOT_FOUND
        }
    };
    match render_layout(&state, &env, route, mode) {
        Ok(html) => (status, html).into_response(),
        Err(err) => {
            error!(path = uri.path(), %err, "page render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "page render failed").into_response()
        }
    }
}

fn render_layout(
    state: &AppState,
    env: &Environment<'static>,
    route: Route<'_>,
    mode: ThemeMode,
) -> crate::error::Result<Html<String>> {
    let theme = mode.theme();
    let layout = route.layout(&theme);
    let selected = match route {
        Route::Page(page) => page.path,
        Route::NotFound => "",
    };
    let ctx = json!({
        "header_title": HEADER_TITLE,
        "layout": layout,
        "options": state.router.options(),
        "selected": selected,
        "theme": mode.as_str(),
        "toggle_theme": mode.toggled().as_str(),
        "styles": theme.shell_styles(),
        "accent": theme::ACCENT,
        "papers": state.aggregates.records,
        "resolved": state.aggregates.resolved,
    });
    let template = env.get_template(PAGE_TEMPLATE)?;
    Ok(Html(template.render(&ctx)?))
}
