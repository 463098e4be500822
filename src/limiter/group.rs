//! Strongly typed endpoint-group identifier keyed into the rate-limit table.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

const GROUP_MAX_LEN: usize = 64;

/// Error returned when endpoint-group validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum EndpointGroupError {
	/// The identifier was empty.
	#[error("Endpoint group identifier cannot be empty.")]
	Empty,
	/// The identifier contains whitespace characters.
	#[error("Endpoint group identifier contains whitespace.")]
	ContainsWhitespace,
	/// The identifier exceeded the allowed character count.
	#[error("Endpoint group identifier exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
}

/// Logical grouping of API paths sharing one rate-limit configuration.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EndpointGroup(String);
impl EndpointGroup {
	/// Creates a new endpoint group after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, EndpointGroupError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}

	/// Shared fallback group used for paths with no configured quota.
	pub fn fallback() -> Self {
		Self("default".into())
	}
}
impl Deref for EndpointGroup {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for EndpointGroup {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for EndpointGroup {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<EndpointGroup> for String {
	fn from(value: EndpointGroup) -> Self {
		value.0
	}
}
impl TryFrom<String> for EndpointGroup {
	type Error = EndpointGroupError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl FromStr for EndpointGroup {
	type Err = EndpointGroupError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Debug for EndpointGroup {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "EndpointGroup({})", self.0)
	}
}
impl Display for EndpointGroup {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

fn validate_view(view: &str) -> Result<(), EndpointGroupError> {
	if view.is_empty() {
		return Err(EndpointGroupError::Empty);
	}
	if view.chars().any(char::is_whitespace) {
		return Err(EndpointGroupError::ContainsWhitespace);
	}
	if view.len() > GROUP_MAX_LEN {
		return Err(EndpointGroupError::TooLong { max: GROUP_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn groups_validate_on_construction() {
		assert!(EndpointGroup::new("").is_err());
		assert!(EndpointGroup::new("with space").is_err());
		assert!(EndpointGroup::new("a".repeat(GROUP_MAX_LEN + 1)).is_err());

		let group = EndpointGroup::new("orders").expect("Group fixture should be valid.");

		assert_eq!(group.as_ref(), "orders");
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let group: EndpointGroup =
			serde_json::from_str("\"catalog\"").expect("Group should deserialize successfully.");

		assert_eq!(group.as_ref(), "catalog");
		assert!(serde_json::from_str::<EndpointGroup>("\"with space\"").is_err());
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<EndpointGroup, u8> = HashMap::from_iter([(
			EndpointGroup::new("feeds").expect("Group used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("feeds"), Some(&7));
	}
}
