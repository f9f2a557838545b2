//! Vector math over equal-length embeddings.
//!
//! Every function requires `lhs.len() == rhs.len()`. Mismatched lengths are a caller bug and trip a
//! debug assertion; release builds do not truncate or pad.

pub fn dot(lhs: &[f32], rhs: &[f32]) -> f32 {
	debug_assert_eq!(lhs.len(), rhs.len(), "vectors must have the same dimension");

	lhs.iter().zip(rhs).map(|(l, r)| l * r).sum()
}

pub fn norm(vec: &[f32]) -> f32 {
	vec.iter().map(|v| v * v).sum::<f32>().sqrt()
}

/// Cosine of the angle between `lhs` and `rhs`, or 0 when either vector has zero norm.
pub fn cosine_similarity(lhs: &[f32], rhs: &[f32]) -> f32 {
	let denom = norm(lhs) * norm(rhs);

	if denom == 0.0 {
		return 0.0;
	}

	(dot(lhs, rhs) / denom).clamp(-1.0, 1.0)
}
