use crate::TracebackRecord;

/// Opens four indefinite-length BER constructs around the concatenated payloads.
pub const FRAME_PREFIX: [u8; 8] = [0x30, 0x80, 0xA4, 0x80, 0xA1, 0x80, 0x31, 0x80];
/// One end-of-contents pair per construct opened by [`FRAME_PREFIX`].
pub const FRAME_TERMINATOR: [u8; 8] = [0; 8];

/// The per-request binary artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedResult {
	pub request_id: String,
	pub records: usize,
	pub bytes: Vec<u8>,
}
impl FramedResult {
	/// Frames `records` in the order given. Callers sort and truncate first.
	pub fn frame(request_id: &str, records: &[TracebackRecord]) -> Self {
		let body: usize = records.iter().map(|record| record.payload.len()).sum();
		let mut bytes = Vec::with_capacity(FRAME_PREFIX.len() + body + FRAME_TERMINATOR.len());

		bytes.extend_from_slice(&FRAME_PREFIX);

		for record in records {
			bytes.extend_from_slice(&record.payload);
		}

		bytes.extend_from_slice(&FRAME_TERMINATOR);

		Self { request_id: request_id.to_string(), records: records.len(), bytes }
	}

	/// Deterministic artifact name derived from the request id.
	pub fn artifact_name(&self) -> String {
		format!("{}.asn1", self.request_id)
	}

	pub fn payload(&self) -> &[u8] {
		&self.bytes[FRAME_PREFIX.len()..self.bytes.len() - FRAME_TERMINATOR.len()]
	}
}
