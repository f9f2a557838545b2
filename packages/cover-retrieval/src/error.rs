pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<cover_storage::Error> for Error {
	fn from(err: cover_storage::Error) -> Self {
		match err {
			cover_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			cover_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			cover_storage::Error::MalformedRow(message) => Self::Storage { message },
		}
	}
}
