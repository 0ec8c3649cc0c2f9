//! Neo4j-backed entity store
//!
//! Upserts are Cypher MERGE operations keyed by business identifiers, so
//! re-ingestion is idempotent: nodes and containment edges are matched
//! rather than duplicated, and scalar attributes are overwritten in place.

use neo4rs::{query, Graph};

use crate::errors::{EngineError, Result};
use crate::store::EntityStore;
use crate::types::{ModelRecord, Part, PartRecord};

/// Entity store over a Neo4j graph, constructed once at process start
/// and passed by handle into each component.
pub struct Neo4jEntityStore {
    graph: Graph,
}

impl Neo4jEntityStore {
    /// Connect to the graph store
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| EngineError::RetrievalUnavailable(format!("graph store: {e}")))?;
        Ok(Self { graph })
    }
}

fn store_err(e: neo4rs::Error) -> EngineError {
    EngineError::RetrievalUnavailable(format!("graph store: {e}"))
}

fn de_err(e: neo4rs::DeError) -> EngineError {
    EngineError::RetrievalUnavailable(format!("graph store row: {e}"))
}

#[async_trait::async_trait]
impl EntityStore for Neo4jEntityStore {
    async fn upsert_model(&self, model_id: &str) -> Result<()> {
        self.graph
            .run(query("MERGE (m:Model {id: $id})").param("id", model_id))
            .await
            .map_err(store_err)
    }

    async fn upsert_part(&self, part: &Part) -> Result<()> {
        // Only attributes present on the row are written, so absent values
        // never erase earlier ones.
        let mut clauses = Vec::new();
        if part.description.is_some() {
            clauses.push("p.description = $description");
        }
        if part.manufacturer_number.is_some() {
            clauses.push("p.manufacturer_number = $manufacturer_number");
        }
        if part.price.is_some() {
            clauses.push("p.price = $price");
        }
        if part.quantity.is_some() {
            clauses.push("p.quantity = $quantity");
        }
        if part.unit_of_measure.is_some() {
            clauses.push("p.unit_of_measure = $unit_of_measure");
        }

        let mut cypher = String::from("MERGE (p:Part {id: $id})");
        if !clauses.is_empty() {
            cypher.push_str(" SET ");
            cypher.push_str(&clauses.join(", "));
        }

        let mut q = query(&cypher).param("id", part.id.as_str());
        if let Some(v) = &part.description {
            q = q.param("description", v.as_str());
        }
        if let Some(v) = &part.manufacturer_number {
            q = q.param("manufacturer_number", v.as_str());
        }
        if let Some(v) = part.price {
            q = q.param("price", v);
        }
        if let Some(v) = part.quantity {
            q = q.param("quantity", v);
        }
        if let Some(v) = &part.unit_of_measure {
            q = q.param("unit_of_measure", v.as_str());
        }

        self.graph.run(q).await.map_err(store_err)?;

        for url in &part.manual_urls {
            self.graph
                .run(
                    query(
                        "MATCH (p:Part {id: $id}) \
                         MERGE (d:Manual {url: $url}) \
                         MERGE (p)-[:HAS_MANUAL]->(d)",
                    )
                    .param("id", part.id.as_str())
                    .param("url", url.as_str()),
                )
                .await
                .map_err(store_err)?;
        }

        Ok(())
    }

    async fn link_model_part(&self, model_id: &str, part_id: &str) -> Result<()> {
        self.graph
            .run(
                query(
                    "MERGE (m:Model {id: $model_id}) \
                     MERGE (p:Part {id: $part_id}) \
                     MERGE (m)-[:HAS_PART]->(p)",
                )
                .param("model_id", model_id)
                .param("part_id", part_id),
            )
            .await
            .map_err(store_err)
    }

    async fn part_by_id(&self, part_id: &str) -> Result<Option<PartRecord>> {
        let mut rows = self
            .graph
            .execute(
                query(
                    "MATCH (p:Part {id: $id}) \
                     OPTIONAL MATCH (m:Model)-[:HAS_PART]->(p) \
                     OPTIONAL MATCH (p)-[:HAS_MANUAL]->(d:Manual) \
                     RETURN p.id AS id, \
                            p.description AS description, \
                            p.manufacturer_number AS manufacturer_number, \
                            p.price AS price, \
                            p.quantity AS quantity, \
                            p.unit_of_measure AS unit_of_measure, \
                            [x IN collect(DISTINCT m.id) WHERE x IS NOT NULL] AS models, \
                            [x IN collect(DISTINCT d.url) WHERE x IS NOT NULL] AS manual_urls",
                )
                .param("id", part_id),
            )
            .await
            .map_err(store_err)?;

        let row = match rows.next().await.map_err(store_err)? {
            Some(row) => row,
            None => return Ok(None),
        };

        let mut manual_urls: Vec<String> = row.get("manual_urls").map_err(de_err)?;
        manual_urls.sort();
        let mut models: Vec<String> = row.get("models").map_err(de_err)?;
        models.sort();

        let part = Part {
            id: row.get("id").map_err(de_err)?,
            description: row.get("description").map_err(de_err)?,
            manufacturer_number: row.get("manufacturer_number").map_err(de_err)?,
            price: row.get("price").map_err(de_err)?,
            quantity: row.get("quantity").map_err(de_err)?,
            unit_of_measure: row.get("unit_of_measure").map_err(de_err)?,
            manual_urls,
        };

        Ok(Some(PartRecord { part, models }))
    }

    async fn model_by_id(&self, model_id: &str) -> Result<Option<ModelRecord>> {
        let mut rows = self
            .graph
            .execute(
                query(
                    "MATCH (m:Model {id: $id}) \
                     OPTIONAL MATCH (m)-[:HAS_PART]->(p:Part) \
                     RETURN m.id AS id, \
                            [x IN collect(DISTINCT p.id) WHERE x IS NOT NULL] AS part_ids",
                )
                .param("id", model_id),
            )
            .await
            .map_err(store_err)?;

        let row = match rows.next().await.map_err(store_err)? {
            Some(row) => row,
            None => return Ok(None),
        };

        // Sorted membership keeps model listings deterministic across calls.
        let mut part_ids: Vec<String> = row.get("part_ids").map_err(de_err)?;
        part_ids.sort();

        Ok(Some(ModelRecord {
            id: row.get("id").map_err(de_err)?,
            part_ids,
        }))
    }
}
