//! Ordered `application/x-www-form-urlencoded` payloads for the token endpoint.

// crates.io
use url::form_urlencoded::Serializer;
// self
use crate::_prelude::*;

/// Form body sent to the token endpoint.
///
/// Pairs keep insertion order so the encoded body matches the order fields were appended.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TokenForm(Vec<(&'static str, String)>);
impl TokenForm {
	/// Creates an empty form.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a field.
	pub fn append(&mut self, key: &'static str, value: impl Into<String>) -> &mut Self {
		self.0.push((key, value.into()));

		self
	}

	/// Returns the first value stored under `key`.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.iter().find(|(name, _)| *name == key).map(|(_, value)| value.as_str())
	}

	/// Returns `true` when `key` is present.
	pub fn contains(&self, key: &str) -> bool {
		self.get(key).is_some()
	}

	/// Returns the number of fields.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when the form has no fields.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Encodes the form as `application/x-www-form-urlencoded`.
	pub fn encode(&self) -> String {
		let mut serializer = Serializer::new(String::new());

		for (key, value) in &self.0 {
			serializer.append_pair(key, value);
		}

		serializer.finish()
	}
}
impl Debug for TokenForm {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut map = f.debug_map();

		for (key, value) in &self.0 {
			match *key {
				"code" | "refresh_token" => map.entry(key, &"<redacted>"),
				_ => map.entry(key, value),
			};
		}

		map.finish()
	}
}
