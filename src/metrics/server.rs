// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A minimal Prometheus exporter.

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::routing::get;
use axum::Router;

use crate::error::Result;

use super::Collection;

/// A collection shared between the monitoring loop and the exporter.
pub type SharedCollection = Arc<Mutex<Collection>>;

async fn metrics(State(collection): State<SharedCollection>) -> String {
    collection.lock().expect("collection lock poisoned").render()
}

/// Serves `/metrics` on the given port until the process exits.
pub async fn serve(port: u16, collection: SharedCollection) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics))
        .with_state(collection);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
