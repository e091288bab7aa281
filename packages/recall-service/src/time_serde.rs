//! RFC 3339 serde for lists of event dates; scalar and option cases use
//! `time::serde::rfc3339` directly.

pub mod vec {
	use serde::{Deserialize as _, Deserializer, Serializer, ser::SerializeSeq};
	use time::{OffsetDateTime, format_description::well_known::Rfc3339};

	pub fn serialize<S>(values: &[OffsetDateTime], serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut seq = serializer.serialize_seq(Some(values.len()))?;

		for value in values {
			let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;

			seq.serialize_element(&formatted)?;
		}

		seq.end()
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<OffsetDateTime>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = Vec::<String>::deserialize(deserializer)?;

		raw.iter()
			.map(|value| OffsetDateTime::parse(value, &Rfc3339))
			.collect::<Result<Vec<_>, _>>()
			.map_err(serde::de::Error::custom)
	}
}
