use crate::{Error, Result};

pub fn vector_to_pg(vec: &[f32]) -> String {
	let mut out = String::with_capacity(vec.len() * 8);

	out.push('[');

	for (i, value) in vec.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}

		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

pub fn parse_pg_vector(text: &str) -> Result<Vec<f32>> {
	let trimmed = text.trim();
	let without_brackets = trimmed
		.strip_prefix('[')
		.and_then(|s| s.strip_suffix(']'))
		.ok_or_else(|| Error::MalformedRow("Vector text is not bracketed.".to_string()))?;

	if without_brackets.trim().is_empty() {
		return Ok(Vec::new());
	}

	let mut vec = Vec::new();

	for part in without_brackets.split(',') {
		let value: f32 = part.trim().parse().map_err(|_| {
			Error::MalformedRow("Vector text contains a non-numeric value.".to_string())
		})?;

		vec.push(value);
	}

	Ok(vec)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn renders_pgvector_literal() {
		assert_eq!(vector_to_pg(&[0.5, -1.0, 2.0]), "[0.5,-1,2]");
		assert_eq!(vector_to_pg(&[]), "[]");
	}

	#[test]
	fn parses_pgvector_text() {
		assert_eq!(parse_pg_vector("[0.5, -1,2]").expect("parse failed"), vec![0.5, -1.0, 2.0]);
		assert!(parse_pg_vector("[]").expect("parse failed").is_empty());
		assert!(parse_pg_vector("0.5,1").is_err());
		assert!(parse_pg_vector("[0.5,x]").is_err());
	}
}
