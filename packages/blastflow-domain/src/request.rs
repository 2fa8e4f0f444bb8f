use std::num::NonZeroU32;

use serde::Deserialize;
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub const PROTOCOL_VERSION: &str = "1.0";

const MAX_ID_CHARS: usize = 128;

/// One admitted search submission. Never mutated after admission.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
	pub id: String,
	pub db_tag: String,
	pub query_sequence: String,
	pub query_url: String,
	pub program: String,
	/// Opaque engine parameters, kept as the JSON text they arrived in.
	pub parameters: String,
	pub top_n_prelim: NonZeroU32,
	pub top_n_traceback: NonZeroU32,
	pub start_time: Option<OffsetDateTime>,
	pub admitted_at: OffsetDateTime,
}
impl Request {
	/// Parses one ingestion record.
	///
	/// The protocol is checked before anything else so an unknown protocol is reported as such
	/// even when the remaining fields would not parse.
	pub fn parse(raw: &str, now: OffsetDateTime) -> Result<Self, Rejection> {
		let json: Value = serde_json::from_str(raw.trim()).map_err(|err| {
			Rejection::new(RejectCode::MalformedJson, None, None, err.to_string())
		})?;
		let protocol = json.get("protocol").and_then(Value::as_str).map(str::to_string);
		let rid = json.get("RID").and_then(Value::as_str).map(str::to_string);

		match protocol.as_deref() {
			Some(PROTOCOL_VERSION) => {},
			Some(other) =>
				return Err(Rejection::new(
					RejectCode::UnknownProtocol,
					protocol.clone(),
					rid,
					format!("Unknown protocol {other:?}."),
				)),
			None =>
				return Err(Rejection::new(
					RejectCode::UnknownProtocol,
					None,
					rid,
					"Missing protocol.".to_string(),
				)),
		}

		let wire: WireRequest = serde_json::from_value(json).map_err(|err| {
			Rejection::new(RejectCode::MissingField, protocol.clone(), rid.clone(), err.to_string())
		})?;

		wire.into_request(now)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCode {
	MalformedJson,
	UnknownProtocol,
	MissingField,
	InvalidId,
	InvalidTopN,
	MissingQuery,
	InvalidStartTime,
}

/// The explicit error record produced for a submission that never enters the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Request {rid:?} rejected ({code:?}): {detail}")]
pub struct Rejection {
	pub code: RejectCode,
	pub protocol: Option<String>,
	pub rid: Option<String>,
	pub detail: String,
}
impl Rejection {
	pub fn new(
		code: RejectCode,
		protocol: Option<String>,
		rid: Option<String>,
		detail: String,
	) -> Self {
		Self { code, protocol, rid, detail }
	}
}

#[derive(Debug, Deserialize)]
struct WireRequest {
	protocol: String,
	#[serde(rename = "RID")]
	rid: String,
	#[serde(default)]
	db_tag: String,
	#[serde(rename = "top_N_prelim")]
	top_n_prelim: i64,
	#[serde(rename = "top_N_traceback")]
	top_n_traceback: i64,
	#[serde(default)]
	query_seq: String,
	#[serde(default)]
	query_url: String,
	#[serde(default)]
	program: String,
	#[serde(default)]
	blast_params: Value,
	#[serde(rename = "StartTime", default)]
	start_time: Option<String>,
}
impl WireRequest {
	fn into_request(self, now: OffsetDateTime) -> Result<Request, Rejection> {
		let reject = |code, detail: String| {
			Rejection::new(code, Some(self.protocol.clone()), Some(self.rid.clone()), detail)
		};

		if !is_valid_id(&self.rid) {
			return Err(reject(
				RejectCode::InvalidId,
				"RID must be 1-128 characters of [A-Za-z0-9._-] and must not start with a dot."
					.to_string(),
			));
		}

		let top_n_prelim = to_top_n(self.top_n_prelim).ok_or_else(|| {
			reject(RejectCode::InvalidTopN, "top_N_prelim must be at least 1.".to_string())
		})?;
		let top_n_traceback = to_top_n(self.top_n_traceback).ok_or_else(|| {
			reject(RejectCode::InvalidTopN, "top_N_traceback must be at least 1.".to_string())
		})?;

		if self.query_seq.trim().is_empty() && self.query_url.trim().is_empty() {
			return Err(reject(
				RejectCode::MissingQuery,
				"One of query_seq or query_url must be non-empty.".to_string(),
			));
		}

		let start_time = match self.start_time.as_deref().map(str::trim) {
			None | Some("") => None,
			Some(raw) => Some(OffsetDateTime::parse(raw, &Rfc3339).map_err(|err| {
				reject(RejectCode::InvalidStartTime, format!("StartTime {raw:?}: {err}."))
			})?),
		};
		let parameters = match &self.blast_params {
			Value::Null => String::new(),
			Value::String(text) => text.clone(),
			other => other.to_string(),
		};

		Ok(Request {
			id: self.rid,
			db_tag: self.db_tag,
			query_sequence: self.query_seq,
			query_url: self.query_url,
			program: self.program,
			parameters,
			top_n_prelim,
			top_n_traceback,
			start_time,
			admitted_at: now,
		})
	}
}

fn to_top_n(value: i64) -> Option<NonZeroU32> {
	u32::try_from(value).ok().and_then(NonZeroU32::new)
}

/// Request ids name output artifacts, so they are restricted to path-safe characters.
pub fn is_valid_id(id: &str) -> bool {
	!id.is_empty()
		&& id.len() <= MAX_ID_CHARS
		&& !id.starts_with('.')
		&& id.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'))
}
