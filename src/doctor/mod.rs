//! Connectivity checks for the external services the engine depends on

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Config;
use crate::store::graph::Neo4jEntityStore;
use crate::store::vector::QdrantChunkStore;

/// Outcome of one connectivity check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

/// Probe the graph store, vector store, and generation backend.
///
/// Each check is independent; a failure is reported, never propagated.
pub async fn run_checks(config: &Config, graph_password: &str) -> Vec<CheckOutcome> {
    let mut outcomes = Vec::new();

    outcomes.push(check_graph(config, graph_password).await);
    outcomes.push(check_vector(config).await);
    outcomes.push(check_generation(config).await);

    outcomes
}

async fn check_graph(config: &Config, password: &str) -> CheckOutcome {
    let result = Neo4jEntityStore::connect(
        &config.stores.graph_uri,
        &config.stores.graph_user,
        password,
    )
    .await;

    match result {
        Ok(_) => CheckOutcome {
            name: "graph store".to_string(),
            ok: true,
            detail: format!("connected to {}", config.stores.graph_uri),
        },
        Err(e) => CheckOutcome {
            name: "graph store".to_string(),
            ok: false,
            detail: e.to_string(),
        },
    }
}

async fn check_vector(config: &Config) -> CheckOutcome {
    let result = QdrantChunkStore::connect(
        &config.stores.vector_url,
        &config.stores.collection,
        crate::embedding::engine::EMBEDDING_DIM,
    )
    .await;

    match result {
        Ok(store) => match store.count().await {
            Ok(count) => CheckOutcome {
                name: "vector store".to_string(),
                ok: true,
                detail: format!(
                    "collection {} holds {count} chunks",
                    config.stores.collection
                ),
            },
            Err(e) => CheckOutcome {
                name: "vector store".to_string(),
                ok: false,
                detail: e.to_string(),
            },
        },
        Err(e) => CheckOutcome {
            name: "vector store".to_string(),
            ok: false,
            detail: e.to_string(),
        },
    }
}

async fn check_generation(config: &Config) -> CheckOutcome {
    let name = "generation backend".to_string();
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            return CheckOutcome {
                name,
                ok: false,
                detail: e.to_string(),
            }
        }
    };

    let url = format!(
        "{}/api/tags",
        config.generation.base_url.trim_end_matches('/')
    );
    match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => CheckOutcome {
            name,
            ok: true,
            detail: format!("reachable at {}", config.generation.base_url),
        },
        Ok(response) => CheckOutcome {
            name,
            ok: false,
            detail: format!("status {}", response.status()),
        },
        Err(e) => CheckOutcome {
            name,
            ok: false,
            detail: e.to_string(),
        },
    }
}
