use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	/// Optional. Without a key the reranker keeps the diversity order and never calls out.
	#[serde(default)]
	pub api_key: Option<String>,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// Per-request defaults for the retrieval pipeline. Every field can be overridden by the caller.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	/// Rows requested from the vector store.
	pub top_n: u32,
	/// Candidates kept by the diversity selector.
	pub mmr_k: u32,
	/// Relevance/diversity trade-off. 1.0 is pure relevance.
	pub mmr_lambda: f32,
	/// Candidates kept after reranking.
	pub top_k: u32,
	/// Minimum cosine similarity for a chunk to be returned by the store.
	pub similarity_threshold: f32,
	pub use_reranking: bool,
	pub use_stitching: bool,
	pub rerank: RetrievalRerank,
	pub stitching: RetrievalStitching,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			top_n: 100,
			mmr_k: 24,
			mmr_lambda: 0.7,
			top_k: 8,
			similarity_threshold: 0.2,
			use_reranking: true,
			use_stitching: true,
			rerank: RetrievalRerank::default(),
			stitching: RetrievalStitching::default(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetrievalRerank {
	pub batch_size: u32,
	pub max_chars: u32,
}
impl Default for RetrievalRerank {
	fn default() -> Self {
		Self { batch_size: 32, max_chars: 2_000 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetrievalStitching {
	pub token_limit: u32,
	/// Subtracted from `token_limit` to leave room for the rest of the prompt.
	pub margin: u32,
}
impl Default for RetrievalStitching {
	fn default() -> Self {
		Self { token_limit: 2_200, margin: 200 }
	}
}

fn default_log_level() -> String {
	"info".to_string()
}
