//! Qdrant-backed exercise vector store.

use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, CreateCollectionBuilder, DeletePointsBuilder, Distance, PointId,
    PointStruct, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use uuid::Uuid;

use repflow_core::models::ExercisePayload;
use repflow_core::{AppError, CollectionInfo, Config, VectorHit, VectorStore};

use crate::payload::{from_qdrant_payload, to_qdrant_payload};
use crate::EMBEDDING_DIM;

pub struct QdrantExerciseStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantExerciseStore {
    pub fn connect(config: &Config) -> Result<Self, AppError> {
        let mut builder = Qdrant::from_url(&config.qdrant_url).skip_compatibility_check();
        if let Some(api_key) = &config.qdrant_api_key {
            builder = builder.api_key(api_key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| AppError::Internal(format!("qdrant client: {}", e)))?;
        Ok(Self {
            client,
            collection: config.qdrant_collection.clone(),
            dimension: EMBEDDING_DIM,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Create the collection if it does not exist and verify the dimension if
    /// it does. A dimension mismatch is unrecoverable without a reindex, so
    /// it fails loudly instead of truncating vectors.
    #[tracing::instrument(skip(self), fields(collection = %self.collection))]
    pub async fn ensure_collection(&self) -> Result<(), AppError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(map_qdrant_err)?;
        if exists {
            let info = self.info().await?;
            if info.dimension != 0 && info.dimension != self.dimension {
                return Err(AppError::Internal(format!(
                    "collection '{}' has vector size {}, expected {}; \
                     reindex into a new collection to change dimensions",
                    self.collection, info.dimension, self.dimension
                )));
            }
            return Ok(());
        }

        tracing::info!(
            collection = %self.collection,
            dimension = self.dimension,
            "Creating vector collection"
        );
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
                ),
            )
            .await
            .map_err(map_qdrant_err)?;
        Ok(())
    }
}

fn map_qdrant_err(err: qdrant_client::QdrantError) -> AppError {
    AppError::PersistenceFailed(format!("vector store: {}", err))
}

fn point_id_to_uuid(id: &PointId) -> Option<Uuid> {
    match &id.point_id_options {
        Some(PointIdOptions::Uuid(s)) => Uuid::try_parse(s).ok(),
        _ => None,
    }
}

#[async_trait]
impl VectorStore for QdrantExerciseStore {
    #[tracing::instrument(skip(self, vector, payload), fields(collection = %self.collection))]
    async fn upsert(
        &self,
        vector_id: Uuid,
        vector: Vec<f32>,
        payload: ExercisePayload,
    ) -> Result<(), AppError> {
        if vector.len() != self.dimension {
            return Err(AppError::PersistenceFailed(format!(
                "vector dimension mismatch: got {}, collection '{}' expects {}",
                vector.len(),
                self.collection,
                self.dimension
            )));
        }
        let point = PointStruct::new(
            vector_id.to_string(),
            vector,
            qdrant_client::Payload::from(to_qdrant_payload(&payload)?),
        );
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]))
            .await
            .map_err(map_qdrant_err)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, query_vector), fields(collection = %self.collection))]
    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<VectorHit>, AppError> {
        let mut builder = SearchPointsBuilder::new(&self.collection, query_vector, limit as u64)
            .with_payload(true);
        if let Some(threshold) = score_threshold {
            builder = builder.score_threshold(threshold);
        }
        let response = self
            .client
            .search_points(builder)
            .await
            .map_err(map_qdrant_err)?;

        let mut hits = Vec::with_capacity(response.result.len());
        for point in response.result {
            let Some(vector_id) = point.id.as_ref().and_then(point_id_to_uuid) else {
                tracing::warn!("Skipping search hit with non-UUID point id");
                continue;
            };
            let Some(payload) = from_qdrant_payload(point.payload) else {
                tracing::warn!(%vector_id, "Skipping search hit with malformed payload");
                continue;
            };
            hits.push(VectorHit {
                vector_id,
                score: point.score,
                payload,
            });
        }
        Ok(hits)
    }

    #[tracing::instrument(skip(self), fields(collection = %self.collection))]
    async fn delete(&self, vector_id: Uuid) -> Result<(), AppError> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(vec![PointId::from(vector_id.to_string())]),
            )
            .await
            .map_err(map_qdrant_err)?;
        Ok(())
    }

    async fn info(&self) -> Result<CollectionInfo, AppError> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(map_qdrant_err)?;
        let result = info
            .result
            .ok_or_else(|| AppError::PersistenceFailed("collection info unavailable".into()))?;

        let dimension = result
            .config
            .as_ref()
            .and_then(|c| c.params.as_ref())
            .and_then(|p| p.vectors_config.as_ref())
            .and_then(|v| v.config.as_ref())
            .map(|c| match c {
                qdrant_client::qdrant::vectors_config::Config::Params(p) => p.size as usize,
                qdrant_client::qdrant::vectors_config::Config::ParamsMap(_) => 0,
            })
            .unwrap_or(0);

        Ok(CollectionInfo {
            points_count: result.points_count.unwrap_or(0),
            dimension,
        })
    }

    /// Scroll the whole collection, reporting each point's back-reference.
    /// Used by the reconciliation sweep to find orphans.
    async fn list_points(&self) -> Result<Vec<(Uuid, Option<Uuid>)>, AppError> {
        let mut points = Vec::new();
        let mut offset: Option<PointId> = None;
        let batch_size = 1000u32;

        loop {
            let mut builder = ScrollPointsBuilder::new(&self.collection)
                .limit(batch_size)
                .with_payload(true)
                .with_vectors(false);
            if let Some(o) = offset.take() {
                builder = builder.offset(o);
            }
            let response = self.client.scroll(builder).await.map_err(map_qdrant_err)?;
            if response.result.is_empty() {
                break;
            }
            for point in response.result {
                let Some(vector_id) = point.id.as_ref().and_then(point_id_to_uuid) else {
                    continue;
                };
                let database_id = from_qdrant_payload(point.payload).map(|p| p.database_id);
                points.push((vector_id, database_id));
            }
            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }
        Ok(points)
    }
}
