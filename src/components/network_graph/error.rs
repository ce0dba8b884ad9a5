/// Errors raised while parsing graph options or loading member data.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
	/// A textual option did not name a known value.
	#[error("invalid {option}: {value:?}")]
	InvalidOption {
		/// Which option was being parsed.
		option: &'static str,
		/// The rejected input.
		value: String,
	},

	/// The member list was not valid JSON for the expected shape.
	#[error("network member fixture could not be decoded: {0}")]
	Fixture(#[from] serde_json::Error),
}

impl GraphError {
	pub(crate) fn invalid_option(option: &'static str, value: &str) -> Self {
		Self::InvalidOption {
			option,
			value: value.to_owned(),
		}
	}
}

/// Result alias for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
