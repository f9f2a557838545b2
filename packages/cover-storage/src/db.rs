use serde_json::{Map, Value};
use sqlx::{FromRow, PgPool, postgres::PgPoolOptions};

use crate::{
	Error, Result,
	models::{ChunkHit, ChunkSearch, CitationFields},
	vector,
};

const SEARCH_CHUNKS_SQL: &str = "\
SELECT
	c.id::text AS chunk_id,
	c.document_id::text AS document_id,
	c.section_id::text AS section_id,
	c.chunk_index,
	c.text,
	c.page,
	c.metadata,
	c.embedding::text AS embedding,
	(1 - (c.embedding <=> $1::text::vector))::real AS similarity,
	d.title AS document_title,
	d.insurer,
	d.line_of_business,
	d.document_type,
	d.base_code,
	s.path AS section_path,
	s.label AS section_label
FROM document_chunks c
JOIN documents d ON d.id = c.document_id
LEFT JOIN document_sections s ON s.id = c.section_id
WHERE c.embedding IS NOT NULL
	AND (1 - (c.embedding <=> $1::text::vector)) >= $2
	AND ($3::text IS NULL OR d.line_of_business = $3)
	AND ($4::text IS NULL OR d.insurer = $4)
	AND ($5::text IS NULL OR d.document_type = $5)
	AND ($6::text IS NULL OR d.base_code = $6)
	AND ($7::date IS NULL OR d.effective_date >= $7)
	AND ($8::date IS NULL OR d.effective_date <= $8)
ORDER BY c.embedding <=> $1::text::vector, c.id
LIMIT $9";

pub struct Db {
	pub pool: PgPool,
}
impl Db {
	pub async fn connect(cfg: &cover_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	/// Nearest chunks to `search.query_vector` by cosine similarity, best first.
	///
	/// An empty result is not an error.
	pub async fn search_chunks(&self, search: &ChunkSearch) -> Result<Vec<ChunkHit>> {
		validate_search(search)?;

		let filters = &search.filters;
		let rows: Vec<ChunkHitRow> = sqlx::query_as(SEARCH_CHUNKS_SQL)
			.bind(vector::vector_to_pg(&search.query_vector))
			.bind(search.similarity_threshold)
			.bind(filters.line_of_business.as_deref())
			.bind(filters.insurer.as_deref())
			.bind(filters.document_type.as_deref())
			.bind(filters.base_code.as_deref())
			.bind(filters.date_from)
			.bind(filters.date_to)
			.bind(i64::from(search.max_results))
			.fetch_all(&self.pool)
			.await?;

		tracing::debug!(rows = rows.len(), "Chunk search returned rows.");

		rows.into_iter().map(ChunkHitRow::into_hit).collect()
	}
}

#[derive(Debug, FromRow)]
struct ChunkHitRow {
	chunk_id: String,
	document_id: String,
	section_id: Option<String>,
	chunk_index: i32,
	text: String,
	page: Option<i32>,
	metadata: Option<Value>,
	embedding: Option<String>,
	similarity: f32,
	document_title: Option<String>,
	insurer: Option<String>,
	line_of_business: Option<String>,
	document_type: Option<String>,
	base_code: Option<String>,
	section_path: Option<String>,
	section_label: Option<String>,
}
impl ChunkHitRow {
	fn into_hit(self) -> Result<ChunkHit> {
		let embedding = match self.embedding.as_deref() {
			Some(text) => Some(vector::parse_pg_vector(text)?),
			None => None,
		};
		let metadata = match self.metadata {
			Some(Value::Object(map)) => map,
			Some(Value::Null) | None => Map::new(),
			Some(_) => {
				tracing::warn!(chunk_id = %self.chunk_id, "Chunk metadata is not an object.");

				Map::new()
			},
		};

		Ok(ChunkHit {
			chunk_id: self.chunk_id,
			document_id: self.document_id,
			section_id: self.section_id,
			chunk_index: self.chunk_index,
			text: self.text,
			page: self.page,
			similarity: self.similarity,
			metadata,
			embedding,
			citation: CitationFields {
				document_title: self.document_title,
				insurer: self.insurer,
				line_of_business: self.line_of_business,
				document_type: self.document_type,
				base_code: self.base_code,
				section_path: self.section_path,
				section_label: self.section_label,
			},
		})
	}
}

fn validate_search(search: &ChunkSearch) -> Result<()> {
	if search.query_vector.is_empty() {
		return Err(Error::InvalidArgument("Query vector must be non-empty.".to_string()));
	}
	if search.max_results == 0 {
		return Err(Error::InvalidArgument("max_results must be greater than zero.".to_string()));
	}
	if !search.similarity_threshold.is_finite() {
		return Err(Error::InvalidArgument(
			"similarity_threshold must be a finite number.".to_string(),
		));
	}
	if let (Some(from), Some(to)) = (search.filters.date_from, search.filters.date_to)
		&& from > to
	{
		return Err(Error::InvalidArgument("date_from must not be after date_to.".to_string()));
	}

	Ok(())
}
