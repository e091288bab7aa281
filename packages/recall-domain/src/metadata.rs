use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Arbitrary per-record metadata, constrained to scalars and string lists so
/// well-known fields stay typed instead of free-form JSON lookups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(pub BTreeMap<String, MetadataValue>);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
	Bool(bool),
	Number(f64),
	String(String),
	List(Vec<String>),
}

const TAGS_KEY: &str = "tags";
const ENTITIES_KEY: &str = "entities";

impl Metadata {
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Tags attached to the record, empty when absent or not a list.
	pub fn tags(&self) -> &[String] {
		self.string_list(TAGS_KEY)
	}

	/// Entities co-mentioned with the record content.
	pub fn entities(&self) -> &[String] {
		self.string_list(ENTITIES_KEY)
	}

	fn string_list(&self, key: &str) -> &[String] {
		match self.0.get(key) {
			Some(MetadataValue::List(values)) => values.as_slice(),
			_ => &[],
		}
	}
}

impl FromIterator<(String, MetadataValue)> for Metadata {
	fn from_iter<I: IntoIterator<Item = (String, MetadataValue)>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}
