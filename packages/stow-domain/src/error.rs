pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid search scope: {value:?}.")]
	InvalidScope { value: String },
	#[error("Invalid search mode: {value:?}.")]
	InvalidMode { value: String },
}
