//! # QuickShare 서버 진입점
//!
//! 코드 하나로 모이는 임시 협업 세션(표, 캔버스, 텍스트, 채팅, 파일 공유) 서버입니다.
//!
//! 이 파일이 수행하는 작업:
//! 1. 환경변수(.env) 로딩
//! 2. 로깅(tracing) 초기화
//! 3. 설정 로딩과 데이터 디렉토리 생성
//! 4. 공유 상태 생성과 만료 세션 정리 작업 시작
//! 5. HTTP/WebSocket 라우터 설정
//! 6. 서버 시작

// ── 모듈 선언 ──
mod config;
mod error;
mod models;
mod realtime;
mod routes;
mod services;
mod store;

use std::path::Path;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use config::Config;
use routes::*;
use services::cleanup::spawn_cleanup;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1단계: 환경변수 로딩 ──
    // .env 파일이 없어도 에러 없이 넘어갑니다.
    dotenvy::dotenv().ok();

    // ── 2단계: 로깅(tracing) 초기화 ──
    // RUST_LOG가 없으면 quickshare, tower_http, axum 모듈을 debug 레벨로 설정
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quickshare=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ── 3단계: 설정 로딩 ──
    let config = Config::from_env();
    tracing::info!("Starting QuickShare server on {}:{}", config.host, config.port);

    let data_dir = Path::new(&config.data_dir);
    if !data_dir.exists() {
        tokio::fs::create_dir_all(data_dir).await?;
        tracing::info!("Created data directory: {}", config.data_dir);
    }

    // ── 4단계: 공유 상태 & 정리 작업 ──
    // 정리 작업은 시작 직후 한 번, 이후 한 시간마다 실행됩니다.
    let state = AppState::new(config.clone());
    spawn_cleanup(state.store.clone(), config.session_ttl_ms());

    // ── 5단계: 라우터 설정 ──
    let mut app_routes: Router<AppState> = Router::new()
        .route("/healthz", get(health_check))
        .route("/ws", get(ws_handler))
        .route("/api/public-sessions", get(list_public_sessions))
        .route("/api/session/{code}", put(ensure_session).delete(delete_session))
        .route("/api/session/{code}/public", put(set_session_public))
        .route("/api/session/{code}/files", get(list_files))
        // 업로드 크기는 핸들러가 MAX_UPLOAD_BYTES로 직접 제한합니다.
        .route(
            "/api/session/{code}/upload",
            post(upload_file).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/session/{code}/save-note", post(save_note))
        .route("/api/session/{code}/file/{id}", get(download_file).delete(delete_file));

    let public_dir = Path::new(&config.public_dir);
    if public_dir.exists() {
        tracing::info!("Serving static client from {}", config.public_dir);
        app_routes = with_static_client(app_routes, public_dir);
    } else {
        tracing::warn!("Public directory {} not found, serving API only", config.public_dir);
    }

    let app_routes = app_routes.with_state(state);

    // BASE_PATH가 있으면 모든 경로를 그 아래에 둡니다.
    let app = if config.base_path.is_empty() {
        app_routes
    } else {
        tracing::info!("Mounted under base path {}", config.base_path);
        Router::new().nest(&config.base_path, app_routes)
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = app.layer(cors).layer(TraceLayer::new_for_http());

    // ── 6단계: 서버 시작 ──
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// 정적 클라이언트를 붙입니다.
///
/// `/`와 `/join/{code}` 모두 같은 index.html을 사용합니다. `/join` 아래에도 정적
/// 디렉토리를 두어, join 페이지의 상대 경로 자원(`styles.css` 등)이 실제 파일로 응답합니다.
fn with_static_client(router: Router<AppState>, public_dir: &Path) -> Router<AppState> {
    let index = ServeFile::new(public_dir.join("index.html"));
    router
        .nest_service("/join", ServeDir::new(public_dir).fallback(index))
        .fallback_service(ServeDir::new(public_dir))
}
