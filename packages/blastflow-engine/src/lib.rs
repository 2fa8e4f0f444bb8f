pub mod search;
pub mod traceback;

mod error;

pub use error::{Error, Result};
pub use search::EngineHit;
pub use traceback::EngineRecord;

use std::time::Duration;

use reqwest::{
	Client,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};

use blastflow_domain::{PartitionDescriptor, Request};

/// HTTP client for the search/traceback sidecar that wraps the native engine.
#[derive(Debug, Clone)]
pub struct HttpEngine {
	client: Client,
	search_url: String,
	traceback_url: String,
}
impl HttpEngine {
	pub fn new(cfg: &blastflow_config::Engine) -> Result<Self> {
		let headers = auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?;
		let client = Client::builder()
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.default_headers(headers)
			.build()?;

		Ok(Self {
			client,
			search_url: format!("{}{}", cfg.api_base, cfg.search_path),
			traceback_url: format!("{}{}", cfg.api_base, cfg.traceback_path),
		})
	}

	async fn post(&self, url: &str, body: &Value) -> Result<Value> {
		let res = self.client.post(url).json(body).send().await?;

		Ok(res.error_for_status()?.json().await?)
	}
}

pub fn auth_headers(
	api_key: Option<&str>,
	default_headers: &Map<String, Value>,
) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	if let Some(api_key) = api_key {
		headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
	}

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

fn partition_json(partition: &PartitionDescriptor) -> Value {
	serde_json::json!({
		"id": partition.id,
		"name": partition.name,
		"location": partition.location,
		"pattern": partition.pattern,
	})
}

fn request_json(request: &Request) -> Value {
	serde_json::json!({
		"RID": request.id,
		"db_tag": request.db_tag,
		"query_seq": request.query_sequence,
		"query_url": request.query_url,
		"program": request.program,
		"blast_params": request.parameters,
		"top_N_prelim": request.top_n_prelim.get(),
		"top_N_traceback": request.top_n_traceback.get(),
	})
}

fn parse_i32(item: &Value, field: &str, label: &str) -> Result<i32> {
	item.get(field)
		.and_then(Value::as_i64)
		.and_then(|value| i32::try_from(value).ok())
		.ok_or_else(|| Error::InvalidResponse {
			message: format!("{label} is missing integer field {field}."),
		})
}

fn parse_payload(item: &Value, label: &str) -> Result<Vec<u8>> {
	let values = item.get("payload").and_then(Value::as_array).ok_or_else(|| {
		Error::InvalidResponse { message: format!("{label} is missing payload array.") }
	})?;
	let mut payload = Vec::with_capacity(values.len());

	for value in values {
		let byte = value.as_u64().and_then(|raw| u8::try_from(raw).ok()).ok_or_else(|| {
			Error::InvalidResponse { message: format!("{label} payload must hold bytes.") }
		})?;

		payload.push(byte);
	}

	Ok(payload)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_out_of_range_payload_bytes() {
		let item = serde_json::json!({ "payload": [1, 256] });

		assert!(parse_payload(&item, "Hit").is_err());
	}

	#[test]
	fn rejects_scores_outside_i32() {
		let item = serde_json::json!({ "max_score": 5_000_000_000_i64 });

		assert!(parse_i32(&item, "max_score", "Hit").is_err());
	}
}
