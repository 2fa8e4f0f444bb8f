use blastflow_pipeline::{EventCategory, PipelineEvent, Stage};
use blastflow_testkit::{MemorySink, hit_payload, request};

use super::Harness;

#[tokio::test]
async fn failed_search_counts_as_zero_hits() {
	let engine = super::r1_engine().fail_search(0, "R1");
	let harness = Harness::new(3, 2, engine, MemorySink::new());
	let report = harness.run(vec![request("R1", 5, 3)]).await;

	assert_eq!(report.pairs, 3);
	assert_eq!(report.search_failures, 1);
	assert_eq!(report.hits, 3);
	assert_eq!(report.cutoffs.get("R1"), Some(&0));
	assert_eq!(
		harness.sink.get("output/R1.asn1"),
		Some(super::framed(&[hit_payload(2, 60), hit_payload(1, 45), hit_payload(1, 35)]))
	);

	let failures = harness.events.of(EventCategory::Failure);

	assert_eq!(failures.len(), 1);
	assert!(matches!(
		&failures[0],
		PipelineEvent::EngineFailed { stage: Stage::Search, partition_id: 0, .. }
	));
}

#[tokio::test]
async fn failed_traceback_group_leaves_siblings_alone() {
	let engine = super::r1_engine().fail_traceback(2, "R1");
	let harness = Harness::new(3, 2, engine, MemorySink::new());
	let report = harness.run(vec![request("R1", 5, 3)]).await;

	assert_eq!(report.traceback_groups, 3);
	assert_eq!(report.traceback_failures, 1);
	assert_eq!(report.traceback_records, 4);
	assert_eq!(
		harness.sink.get("output/R1.asn1"),
		Some(super::framed(&[hit_payload(0, 50), hit_payload(1, 45), hit_payload(0, 40)]))
	);
}

#[tokio::test]
async fn failed_write_loses_only_that_request() {
	let engine = super::r1_engine().with_scores(1, "R2", &[5]);
	let harness = Harness::new(3, 2, engine, MemorySink::new().failing_on("R1.asn1"));
	let report = harness.run(vec![request("R1", 5, 3), request("R2", 5, 3)]).await;

	assert_eq!(report.write_failures, 1);
	assert_eq!(harness.sink.attempts(), 2);
	assert_eq!(harness.sink.keys(), vec!["output/R2.asn1"]);
	assert_eq!(report.artifacts.len(), 1);
	assert_eq!(report.artifacts[0].request_id, "R2");
	assert!(harness.events.events().iter().any(|event| matches!(
		event,
		PipelineEvent::WriteFailed { request_id, .. } if request_id == "R1"
	)));
}

#[tokio::test]
async fn panicking_search_is_contained_to_its_pair() {
	let engine = super::r1_engine().panic_search(0, "R1").with_scores(1, "R2", &[5]);
	let harness = Harness::new(3, 2, engine, MemorySink::new());
	let report = harness.run(vec![request("R1", 5, 3), request("R2", 5, 3)]).await;

	assert_eq!(report.pairs, 6);
	assert_eq!(report.search_failures, 1);
	assert_eq!(
		harness.sink.get("output/R1.asn1"),
		Some(super::framed(&[hit_payload(2, 60), hit_payload(1, 45), hit_payload(1, 35)]))
	);
	assert_eq!(harness.sink.get("output/R2.asn1"), Some(super::framed(&[hit_payload(1, 5)])));
	assert!(harness.events.of(EventCategory::Failure).iter().any(|event| matches!(
		event,
		PipelineEvent::EngineFailed { stage: Stage::Search, partition_id: 0, message, .. }
			if message.contains("panicked")
	)));
}

#[tokio::test]
async fn panicking_traceback_is_contained_to_its_group() {
	let engine = super::r1_engine().panic_traceback(2, "R1");
	let harness = Harness::new(3, 2, engine, MemorySink::new());
	let report = harness.run(vec![request("R1", 5, 3)]).await;

	assert_eq!(report.traceback_failures, 1);
	assert_eq!(report.traceback_records, 4);
	assert_eq!(
		harness.sink.get("output/R1.asn1"),
		Some(super::framed(&[hit_payload(0, 50), hit_payload(1, 45), hit_payload(0, 40)]))
	);
}
