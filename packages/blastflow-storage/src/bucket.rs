use std::time::Duration;

use reqwest::{Client, header::CONTENT_TYPE};
use serde_json::Value;

use crate::{Error, Result, listing::NameSize};

const GS_SCHEME: &str = "gs://";

/// `gs://bucket/prefix` split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketPath {
	pub bucket: String,
	pub prefix: String,
}
impl BucketPath {
	pub fn parse(url: &str) -> Option<Self> {
		let rest = url.strip_prefix(GS_SCHEME)?;
		let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));

		if bucket.is_empty() {
			return None;
		}

		Some(Self { bucket: bucket.to_string(), prefix: prefix.to_string() })
	}

	pub fn url_for(&self, name: &str) -> String {
		format!("{GS_SCHEME}{}/{name}", self.bucket)
	}
}

/// Minimal client for the object-storage JSON API: paged listing and single-shot uploads.
#[derive(Debug, Clone)]
pub struct BucketClient {
	client: Client,
	api_base: String,
	auth_token: Option<String>,
}
impl BucketClient {
	pub fn new(api_base: &str, auth_token: Option<String>, timeout_ms: u64) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?;

		Ok(Self { client, api_base: api_base.trim_end_matches('/').to_string(), auth_token })
	}

	pub async fn list(&self, path: &BucketPath) -> Result<Vec<NameSize>> {
		let url = format!("{}/storage/v1/b/{}/o", self.api_base, path.bucket);
		let mut entries = Vec::new();
		let mut page_token: Option<String> = None;

		loop {
			let mut query = vec![("prefix", path.prefix.clone())];

			if let Some(token) = page_token.take() {
				query.push(("pageToken", token));
			}

			let mut builder = self.client.get(&url).query(&query);

			if let Some(token) = self.auth_token.as_deref() {
				builder = builder.bearer_auth(token);
			}

			let json: Value = builder.send().await?.error_for_status()?.json().await?;

			page_token = parse_list_page(&json, &mut entries)?;

			if page_token.is_none() {
				break;
			}
		}

		Ok(entries)
	}

	pub async fn upload(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<()> {
		let url = format!("{}/upload/storage/v1/b/{bucket}/o", self.api_base);
		let mut builder = self
			.client
			.post(url)
			.query(&[("uploadType", "media"), ("name", key)])
			.header(CONTENT_TYPE, "application/octet-stream")
			.body(bytes);

		if let Some(token) = self.auth_token.as_deref() {
			builder = builder.bearer_auth(token);
		}

		builder.send().await?.error_for_status()?;

		Ok(())
	}
}

/// Appends one listing page to `entries` and returns the next page token, if any.
fn parse_list_page(json: &Value, entries: &mut Vec<NameSize>) -> Result<Option<String>> {
	let items: &[Value] = match json.get("items") {
		None | Some(Value::Null) => &[],
		Some(Value::Array(items)) => items,
		Some(_) => {
			return Err(Error::InvalidResponse("Listing items must be an array.".to_string()));
		},
	};

	for item in items {
		let name = item
			.get("name")
			.and_then(Value::as_str)
			.ok_or_else(|| Error::InvalidResponse("Listing item is missing name.".to_string()))?;
		// The JSON API reports sizes as decimal strings.
		let size = match item.get("size") {
			Some(Value::String(raw)) => raw.parse::<u64>().ok(),
			Some(value) => value.as_u64(),
			None => None,
		}
		.ok_or_else(|| Error::InvalidResponse(format!("Listing item {name:?} has no size.")))?;

		entries.push(NameSize { name: name.to_string(), size });
	}

	Ok(json.get("nextPageToken").and_then(Value::as_str).map(str::to_string))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_bucket_urls() {
		assert_eq!(
			BucketPath::parse("gs://blast-db/nt/2026"),
			Some(BucketPath { bucket: "blast-db".into(), prefix: "nt/2026".into() })
		);
		assert_eq!(
			BucketPath::parse("gs://blast-db"),
			Some(BucketPath { bucket: "blast-db".into(), prefix: String::new() })
		);
		assert_eq!(BucketPath::parse("/local/dir"), None);
		assert_eq!(BucketPath::parse("gs:///x"), None);
	}

	#[test]
	fn reads_string_sizes_and_page_token() {
		let json = serde_json::json!({
			"items": [{ "name": "nt.00.nsq", "size": "1024" }, { "name": "nt.00.nin", "size": 16 }],
			"nextPageToken": "abc"
		});
		let mut entries = Vec::new();
		let token = parse_list_page(&json, &mut entries).expect("parse failed");

		assert_eq!(token.as_deref(), Some("abc"));
		assert_eq!(entries[0].size, 1_024);
		assert_eq!(entries[1].size, 16);
	}

	#[test]
	fn empty_page_has_no_items() {
		let mut entries = Vec::new();
		let token = parse_list_page(&serde_json::json!({}), &mut entries).expect("parse failed");

		assert!(entries.is_empty());
		assert_eq!(token, None);
	}
}
