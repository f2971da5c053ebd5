// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! HTTP surface for the grid service.
//!
//! # Routes
//!
//! - `GET /` renders the interactive grid page.
//! - `GET /grid` returns the current grid as JSON, rows in day order.
//! - `POST /submit` accepts a sparse day to person to cell JSON object, and
//!   returns a `{ "success": bool, "message": string }` verdict.
//!
//! Every route answers with status 200. Failures of the underlying service are
//! reported through the verdict, not the status code. A body that is not a
//! JSON object at all is rejected by the JSON extractor before the service
//! ever sees it.

pub mod page;

use crate::{
    grid::{Grid, SparseGrid},
    service::{GridService, Verdict},
    sync::RepoSync,
};

use axum::{
    extract::State,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use std::{io, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

/// Build router over shared grid service.
pub fn router<S>(service: Arc<GridService<S>>) -> Router
where
    S: RepoSync + 'static,
{
    Router::new()
        .route("/", get(index::<S>))
        .route("/grid", get(grid::<S>))
        .route("/submit", post(submit::<S>))
        .with_state(service)
}

/// Serve grid service on given address until the process is stopped.
///
/// # Errors
///
/// - Return [`io::Error`] if address cannot be bound.
/// - Return [`io::Error`] if server fails while accepting connections.
pub async fn serve<S>(bind: SocketAddr, service: Arc<GridService<S>>) -> io::Result<()>
where
    S: RepoSync + 'static,
{
    let listener = TcpListener::bind(bind).await?;
    info!("serving grid on http://{}", listener.local_addr()?);
    axum::serve(listener, router(service)).await
}

async fn index<S>(State(service): State<Arc<GridService<S>>>) -> Html<String>
where
    S: RepoSync + 'static,
{
    let grid = service.fetch_grid().await;
    let header = Local::now().format("%Y 年 %m 月份").to_string();
    Html(page::render(&grid, &header))
}

async fn grid<S>(State(service): State<Arc<GridService<S>>>) -> Json<Grid>
where
    S: RepoSync + 'static,
{
    Json(service.fetch_grid().await)
}

async fn submit<S>(
    State(service): State<Arc<GridService<S>>>,
    Json(incoming): Json<SparseGrid>,
) -> Json<Verdict>
where
    S: RepoSync + 'static,
{
    Json(service.submit_sparse(&incoming).await)
}
