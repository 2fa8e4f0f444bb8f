use blastflow_engine::EngineRecord;
use blastflow_testkit::{MemorySink, ScriptedEngine, request};

use super::Harness;

fn record(evalue: i32, score: i32, seqid_hash: i32, tag: u8) -> EngineRecord {
	EngineRecord { evalue, score, seqid_hash, payload: vec![tag] }
}

#[tokio::test]
async fn seqid_hash_breaks_evalue_and_score_ties() {
	let engine = ScriptedEngine::new()
		.with_scores(0, "T1", &[10])
		.with_scores(1, "T1", &[10])
		.with_records(0, "T1", vec![record(500, 80, 3, 0xA3)])
		.with_records(1, "T1", vec![record(500, 80, 7, 0xA7)]);
	let harness = Harness::new(2, 2, engine, MemorySink::new());

	harness.run(vec![request("T1", 5, 5)]).await;

	assert_eq!(harness.sink.get("output/T1.asn1"), Some(super::framed(&[vec![0xA7], vec![0xA3]])));
}

#[tokio::test]
async fn full_ties_keep_partition_order() {
	let engine = ScriptedEngine::new()
		.with_scores(0, "T2", &[1])
		.with_scores(1, "T2", &[1])
		.with_scores(2, "T2", &[1])
		.with_records(2, "T2", vec![record(9, 9, 9, 2)])
		.with_records(0, "T2", vec![record(9, 9, 9, 0)])
		.with_records(1, "T2", vec![record(9, 9, 9, 1)]);
	let harness = Harness::new(3, 3, engine, MemorySink::new());

	harness.run(vec![request("T2", 5, 2)]).await;

	assert_eq!(harness.sink.get("output/T2.asn1"), Some(super::framed(&[vec![0], vec![1]])));
}

#[tokio::test]
async fn identical_inputs_give_identical_bytes_for_any_worker_count() {
	let mut outputs = Vec::new();

	for workers in [1, 2, 3, 5] {
		let harness = Harness::new(3, workers, super::r1_engine(), MemorySink::new());

		harness.run(vec![request("R1", 5, 4)]).await;

		outputs.push(harness.sink.get("output/R1.asn1").expect("Missing R1 artifact."));
	}

	assert!(outputs.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn rerunning_a_batch_rewrites_the_same_artifact() {
	let harness = Harness::new(3, 2, super::r1_engine(), MemorySink::new());
	let first = harness.run(vec![request("R1", 5, 3)]).await;
	let first_bytes = harness.sink.get("output/R1.asn1");
	let second = harness.run(vec![request("R1", 5, 3)]).await;

	assert_eq!(first.artifacts, second.artifacts);
	assert_eq!(harness.sink.get("output/R1.asn1"), first_bytes);
	assert_eq!(harness.sink.attempts(), 2);
}
