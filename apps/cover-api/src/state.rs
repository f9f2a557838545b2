use std::sync::Arc;

use cover_retrieval::RetrievalService;
use cover_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<RetrievalService>,
}
impl AppState {
	pub async fn new(config: cover_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;
		let service = RetrievalService::new(config, Arc::new(db));

		Ok(Self::with_service(service))
	}

	pub fn with_service(service: RetrievalService) -> Self {
		Self { service: Arc::new(service) }
	}
}
