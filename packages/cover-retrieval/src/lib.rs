pub mod citation;
pub mod diversity;
pub mod query;
pub mod rerank;
pub mod similarity;
pub mod stitch;

mod error;

pub use error::{Error, Result};
pub use query::{Candidate, Passage, PipelineStats, RetrievalRequest, RetrievalResponse};

use std::{future::Future, pin::Pin, sync::Arc};

use cover_config::{Config, EmbeddingProviderConfig, ProviderConfig};
use cover_providers::{embedding, rerank as rerank_provider};
use cover_storage::{
	db::Db,
	models::{ChunkHit, ChunkSearch},
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>>;
}

/// Cross-encoder scoring. Implementations return one score per text, in input order.
pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>>;
}

pub trait VectorStore
where
	Self: Send + Sync,
{
	fn search_chunks<'a>(
		&'a self,
		search: &'a ChunkSearch,
	) -> BoxFuture<'a, cover_storage::Result<Vec<ChunkHit>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, rerank: Arc<dyn RerankProvider>) -> Self {
		Self { embedding, rerank }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(HttpProviders);

		Self { embedding: provider.clone(), rerank: provider }
	}
}

/// Stateless retrieval over injected collaborators. Safe to share across requests.
pub struct RetrievalService {
	pub cfg: Config,
	pub store: Arc<dyn VectorStore>,
	pub providers: Providers,
}
impl RetrievalService {
	pub fn new(cfg: Config, store: Arc<dyn VectorStore>) -> Self {
		Self { cfg, store, providers: Providers::default() }
	}

	pub fn with_providers(cfg: Config, store: Arc<dyn VectorStore>, providers: Providers) -> Self {
		Self { cfg, store, providers }
	}
}

struct HttpProviders;
impl EmbeddingProvider for HttpProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(embedding::embed(cfg, text))
	}
}
impl RerankProvider for HttpProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(rerank_provider::rerank(cfg, query, texts))
	}
}

impl VectorStore for Db {
	fn search_chunks<'a>(
		&'a self,
		search: &'a ChunkSearch,
	) -> BoxFuture<'a, cover_storage::Result<Vec<ChunkHit>>> {
		Box::pin(Db::search_chunks(self, search))
	}
}
