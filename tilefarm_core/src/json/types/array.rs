//! JSON array type and utilities for serializing, deserializing, and converting to Rust types.
use crate::json::*;
use anyhow::{Result, anyhow};
use std::fmt::Debug;

#[derive(Clone, Default, PartialEq)]
/// A JSON array, backed by a `Vec<JsonValue>`.
///
/// Provides methods for stringifying the array in compact or pretty formats,
/// and converting elements to Rust types (e.g., strings, numbers).
pub struct JsonArray(pub Vec<JsonValue>);

impl JsonArray {
	/// Serialize the JSON array to a compact string without extra whitespace.
	///
	/// # Examples
	///
	/// ```rust
	/// use tilefarm_core::json::{JsonArray, JsonValue};
	/// let arr = JsonArray(vec![JsonValue::from(1), JsonValue::from(2)]);
	/// assert_eq!(arr.stringify(), "[1,2]");
	/// ```
	pub fn stringify(&self) -> String {
		let items = self.0.iter().map(stringify).collect::<Vec<_>>();
		format!("[{}]", items.join(","))
	}

	/// Serialize the array to a single-line, pretty-printed string with spaces.
	///
	/// E.g., `[ 1, 2, 3 ]`.
	pub fn stringify_pretty_single_line(&self) -> String {
		let items = self.0.iter().map(stringify_pretty_single_line).collect::<Vec<_>>();
		format!("[ {} ]", items.join(", "))
	}

	/// Serialize the array to a multi-line, pretty-printed string.
	///
	/// `max_width` controls when to break lines, and `depth` sets the indentation level.
	pub fn stringify_pretty_multi_line(&self, max_width: usize, depth: usize) -> String {
		let indent = "  ".repeat(depth);
		let items = self
			.0
			.iter()
			.map(|value| {
				format!(
					"{indent}  {}",
					stringify_pretty_multi_line(value, max_width, depth + 1, depth * 2 + 2)
				)
			})
			.collect::<Vec<_>>();
		format!("[\n{}\n{}]", items.join(",\n"), indent)
	}

	/// Convert all elements to Rust `String`s, returning an error if any element is not a string.
	pub fn as_string_vec(&self) -> Result<Vec<String>> {
		self.0.iter().map(JsonValue::as_string).collect::<Result<Vec<_>>>()
	}

	/// Convert all elements to numbers of type `T`, returning an error if any element is not numeric.
	pub fn as_number_vec<T>(&self) -> Result<Vec<T>>
	where
		T: AsNumber<T>,
	{
		self.0.iter().map(JsonValue::as_number).collect::<Result<Vec<T>>>()
	}

	/// Get a reference to the underlying `Vec<JsonValue>`.
	pub fn as_vec(&self) -> &Vec<JsonValue> {
		&self.0
	}

	/// Convert elements to a fixed-size array of numbers, returning an error on mismatch or non-numeric elements.
	pub fn as_number_array<T, const N: usize>(&self) -> Result<[T; N]>
	where
		T: AsNumber<T>,
	{
		self
			.as_number_vec::<T>()?
			.try_into()
			.map_err(|e: Vec<T>| anyhow!("vector length mismatch {} != {}", e.len(), N))
	}
}

impl Debug for JsonArray {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:?}", self.0)
	}
}

impl<T> From<Vec<T>> for JsonArray
where
	JsonValue: From<T>,
{
	fn from(input: Vec<T>) -> Self {
		JsonArray(Vec::from_iter(input.into_iter().map(JsonValue::from)))
	}
}

impl<T> From<&Vec<T>> for JsonArray
where
	JsonValue: From<T>,
	T: Clone,
{
	fn from(input: &Vec<T>) -> Self {
		JsonArray(Vec::from_iter(input.iter().map(|v| JsonValue::from(v.clone()))))
	}
}

impl<T, const N: usize> From<&[T; N]> for JsonArray
where
	JsonValue: From<T>,
	T: Copy,
{
	fn from(input: &[T; N]) -> Self {
		JsonArray(Vec::from_iter(input.iter().map(|v| JsonValue::from(*v))))
	}
}
