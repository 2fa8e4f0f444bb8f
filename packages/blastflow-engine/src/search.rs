use serde_json::Value;

use blastflow_domain::{PartitionDescriptor, Request};

use crate::{Error, HttpEngine, Result};

/// One preliminary hit list as the engine reports it, before the stage stamps ids onto it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineHit {
	pub max_score: i32,
	pub payload: Vec<u8>,
}

impl HttpEngine {
	pub async fn search(
		&self,
		partition: &PartitionDescriptor,
		request: &Request,
	) -> Result<Vec<EngineHit>> {
		let body = serde_json::json!({
			"partition": crate::partition_json(partition),
			"request": crate::request_json(request),
		});
		let json = self.post(&self.search_url, &body).await?;

		parse_search_response(json)
	}
}

pub(crate) fn parse_search_response(json: Value) -> Result<Vec<EngineHit>> {
	let hits = json.get("hits").and_then(Value::as_array).ok_or_else(|| {
		Error::InvalidResponse { message: "Search response is missing hits array.".to_string() }
	})?;
	let mut parsed = Vec::with_capacity(hits.len());

	for item in hits {
		parsed.push(EngineHit {
			max_score: crate::parse_i32(item, "max_score", "Search hit")?,
			payload: crate::parse_payload(item, "Search hit")?,
		});
	}

	Ok(parsed)
}
