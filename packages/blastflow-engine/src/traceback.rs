use serde_json::Value;

use blastflow_domain::{PartitionDescriptor, Request, ScoredHit};

use crate::{Error, HttpEngine, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRecord {
	pub evalue: i32,
	pub score: i32,
	pub seqid_hash: i32,
	pub payload: Vec<u8>,
}

impl HttpEngine {
	pub async fn traceback(
		&self,
		hits: &[ScoredHit],
		partition: &PartitionDescriptor,
		request: &Request,
	) -> Result<Vec<EngineRecord>> {
		let hits: Vec<Value> = hits
			.iter()
			.map(|hit| serde_json::json!({ "max_score": hit.max_score, "payload": hit.payload }))
			.collect();
		let body = serde_json::json!({
			"partition": crate::partition_json(partition),
			"request": crate::request_json(request),
			"hits": hits,
		});
		let json = self.post(&self.traceback_url, &body).await?;

		parse_traceback_response(json)
	}
}

pub(crate) fn parse_traceback_response(json: Value) -> Result<Vec<EngineRecord>> {
	let records = json.get("records").and_then(Value::as_array).ok_or_else(|| {
		Error::InvalidResponse {
			message: "Traceback response is missing records array.".to_string(),
		}
	})?;
	let mut parsed = Vec::with_capacity(records.len());

	for item in records {
		parsed.push(EngineRecord {
			evalue: crate::parse_i32(item, "evalue", "Traceback record")?,
			score: crate::parse_i32(item, "score", "Traceback record")?,
			seqid_hash: crate::parse_i32(item, "seqid", "Traceback record")?,
			payload: crate::parse_payload(item, "Traceback record")?,
		});
	}

	Ok(parsed)
}
