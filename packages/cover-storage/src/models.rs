use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::Date;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Optional predicates narrowing which chunks the store may return.
///
/// Keys are snake_case with camelCase aliases. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchFilters {
	#[serde(default, alias = "lineOfBusiness", skip_serializing_if = "Option::is_none")]
	pub line_of_business: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub insurer: Option<String>,
	#[serde(default, alias = "documentType", skip_serializing_if = "Option::is_none")]
	pub document_type: Option<String>,
	#[serde(default, alias = "baseCode", skip_serializing_if = "Option::is_none")]
	pub base_code: Option<String>,
	/// Inclusive lower bound on the document effective date.
	#[serde(
		default,
		alias = "dateFrom",
		with = "iso_date::option",
		skip_serializing_if = "Option::is_none"
	)]
	pub date_from: Option<Date>,
	/// Inclusive upper bound on the document effective date.
	#[serde(
		default,
		alias = "dateTo",
		with = "iso_date::option",
		skip_serializing_if = "Option::is_none"
	)]
	pub date_to: Option<Date>,
}

#[derive(Debug, Clone)]
pub struct ChunkSearch {
	pub query_vector: Vec<f32>,
	pub similarity_threshold: f32,
	pub max_results: u32,
	pub filters: SearchFilters,
}

/// Document and section fields used to build a human-readable citation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationFields {
	pub document_title: Option<String>,
	pub insurer: Option<String>,
	pub line_of_business: Option<String>,
	pub document_type: Option<String>,
	pub base_code: Option<String>,
	pub section_path: Option<String>,
	pub section_label: Option<String>,
}

/// One chunk returned by a similarity search, best match first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkHit {
	pub chunk_id: String,
	pub document_id: String,
	pub section_id: Option<String>,
	pub chunk_index: i32,
	pub text: String,
	pub page: Option<i32>,
	pub similarity: f32,
	pub metadata: Map<String, Value>,
	/// The chunk's own embedding. `None` when the row has no stored vector.
	pub embedding: Option<Vec<f32>>,
	pub citation: CitationFields,
}
