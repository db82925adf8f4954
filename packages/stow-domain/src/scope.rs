use std::{fmt, str::FromStr};

use uuid::Uuid;

use crate::Error;

/// Tenant partition key. Every cache entry, vector-index filter, and
/// candidate fetch is isolated by this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchScope {
	Household(Uuid),
	Owner(Uuid),
}
impl SearchScope {
	pub fn key(&self) -> String {
		self.to_string()
	}

	pub fn id(&self) -> Uuid {
		match self {
			Self::Household(id) | Self::Owner(id) => *id,
		}
	}
}
impl fmt::Display for SearchScope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Household(id) => write!(f, "household:{id}"),
			Self::Owner(id) => write!(f, "owner:{id}"),
		}
	}
}
impl FromStr for SearchScope {
	type Err = Error;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		let invalid = || Error::InvalidScope { value: value.to_string() };
		let (kind, id) = value.split_once(':').ok_or_else(invalid)?;
		let id = Uuid::parse_str(id.trim()).map_err(|_| invalid())?;

		match kind.trim() {
			"household" => Ok(Self::Household(id)),
			"owner" => Ok(Self::Owner(id)),
			_ => Err(invalid()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn scope_keys_round_trip() {
		let id = Uuid::new_v4();
		let scope: SearchScope = format!("household:{id}").parse().expect("Expected scope.");

		assert_eq!(scope, SearchScope::Household(id));
		assert_eq!(scope.key(), format!("household:{id}"));

		let scope: SearchScope = format!("owner:{id}").parse().expect("Expected scope.");

		assert_eq!(scope, SearchScope::Owner(id));
	}

	#[test]
	fn malformed_scopes_are_rejected() {
		for value in ["", "household", "household:", "household:not-a-uuid", "garage:123"] {
			assert!(value.parse::<SearchScope>().is_err(), "Expected {value:?} to be rejected.");
		}
	}
}
