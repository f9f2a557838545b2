use cover_storage::models::CitationFields;

/// Builds a label such as `Home Policy Wording (Northwind Mutual) · 4.2 Flood · p. 3`.
pub fn label(fields: &CitationFields, page: Option<i32>) -> String {
	let mut parts = Vec::with_capacity(3);
	let title = non_blank(fields.document_title.as_deref())
		.or_else(|| non_blank(fields.document_type.as_deref()))
		.unwrap_or("Untitled document");

	match non_blank(fields.insurer.as_deref()) {
		Some(insurer) => parts.push(format!("{title} ({insurer})")),
		None => parts.push(title.to_string()),
	}

	match (non_blank(fields.section_path.as_deref()), non_blank(fields.section_label.as_deref())) {
		(Some(path), Some(label)) => parts.push(format!("{path} {label}")),
		(Some(section), None) | (None, Some(section)) => parts.push(section.to_string()),
		(None, None) => {},
	}

	if let Some(page) = page {
		parts.push(format!("p. {page}"));
	}

	parts.join(" · ")
}

/// Suffix appended to a stitched passage's label.
pub fn with_paragraph_count(label: &str, paragraphs: usize) -> String {
	let noun = if paragraphs == 1 { "paragraph" } else { "paragraphs" };

	format!("{label} · §{paragraphs} {noun}")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
	value.map(str::trim).filter(|value| !value.is_empty())
}
