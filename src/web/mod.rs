//! Read-only dashboard server.
//!
//! Serves the embedded single-page dashboard plus a small JSON API over the
//! artifacts written by the scrape and fit stages. Artifacts are re-read per
//! request: the files are small and fresh reads pick up whatever the batch
//! stages last renamed into place.

use std::fmt;
use std::path::PathBuf;

use actix_web::http::StatusCode;
use actix_web::{App, HttpResponse, HttpServer, ResponseError, web};
use serde::Serialize;
use tracing::info;

use crate::domain::ServeConfig;
use crate::error::AppError;

mod routes;

/// Shared per-worker state: just the data directory.
#[derive(Debug, Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
}

/// API-facing error, rendered as a JSON body with a matching status code.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => f.write_str(msg),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

/// Run the dashboard server until interrupted.
pub fn run_server(config: ServeConfig) -> Result<(), AppError> {
    actix_web::rt::System::new().block_on(serve(config))
}

async fn serve(config: ServeConfig) -> Result<(), AppError> {
    let state = AppState {
        data_dir: config.data_dir.clone(),
    };
    info!(host = %config.host, port = config.port, "starting dashboard server");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(routes::config)
    })
    .bind((config.host.as_str(), config.port))
    .map_err(|e| AppError::config(format!("Failed to bind {}:{}: {e}", config.host, config.port)))?
    .run()
    .await
    .map_err(|e| AppError::config(format!("Dashboard server failed: {e}")))
}
