use blastflow_domain::Cutoff;
use blastflow_pipeline::{EventCategory, PipelineEvent};
use blastflow_testkit::{MemorySink, ScriptedEngine, TracebackCall, hit_payload, request};

use super::Harness;

#[tokio::test]
async fn global_cutoff_is_kth_largest_across_partitions() {
	let harness = Harness::new(3, 2, super::r1_engine(), MemorySink::new());
	let report = harness.run(vec![request("R1", 5, 3)]).await;

	assert_eq!(report.pairs, 3);
	assert_eq!(report.hits, 8);
	assert_eq!(report.cutoffs.get("R1"), Some(&35));
	assert_eq!(report.survivors, 5);
	assert_eq!(harness.engine.search_calls(), 3);
	assert_eq!(harness.engine.traceback_calls(), vec![
		TracebackCall { partition_id: 0, request_id: "R1".into(), scores: vec![50, 40] },
		TracebackCall { partition_id: 1, request_id: "R1".into(), scores: vec![45, 35] },
		TracebackCall { partition_id: 2, request_id: "R1".into(), scores: vec![60] },
	]);

	let cutoff_events = harness.events.of(EventCategory::Cutoff);

	assert_eq!(cutoff_events, vec![PipelineEvent::CutoffComputed {
		request_id: "R1".into(),
		threshold: 35,
		hits: 8,
	}]);
}

#[tokio::test]
async fn top_traceback_records_are_framed_in_significance_order() {
	let harness = Harness::new(3, 2, super::r1_engine(), MemorySink::new());
	let report = harness.run(vec![request("R1", 5, 3)]).await;

	assert_eq!(report.traceback_records, 5);
	assert_eq!(report.artifacts.len(), 1);
	assert_eq!(report.artifacts[0].key, "output/R1.asn1");
	assert_eq!(report.artifacts[0].records, 3);
	assert_eq!(
		harness.sink.get("output/R1.asn1"),
		Some(super::framed(&[hit_payload(2, 60), hit_payload(0, 50), hit_payload(1, 45)]))
	);
}

#[tokio::test]
async fn fewer_hits_than_k_disables_filtering() {
	let engine = ScriptedEngine::new()
		.with_scores(0, "R2", &[9, 8])
		.with_scores(1, "R2", &[7, 6, 5])
		.with_scores(3, "R2", &[1]);
	let harness = Harness::new(4, 3, engine, MemorySink::new());
	let report = harness.run(vec![request("R2", 10, 10)]).await;

	assert_eq!(report.cutoffs.get("R2"), Some(&Cutoff::NONE));
	assert_eq!(report.hits, 6);
	assert_eq!(report.survivors, 6);
	assert_eq!(report.traceback_groups, 3);
	assert_eq!(report.artifacts[0].records, 6);
}

#[tokio::test]
async fn boundary_ties_all_survive() {
	let engine = ScriptedEngine::new()
		.with_scores(0, "R3", &[30, 20, 20])
		.with_scores(1, "R3", &[20, 10]);
	let harness = Harness::new(2, 2, engine, MemorySink::new());
	let report = harness.run(vec![request("R3", 2, 10)]).await;

	assert_eq!(report.cutoffs.get("R3"), Some(&20));
	assert_eq!(report.survivors, 4);
}

#[tokio::test]
async fn requests_in_one_batch_get_independent_cutoffs() {
	let engine = super::r1_engine()
		.with_scores(0, "R2", &[9, 8])
		.with_scores(2, "R2", &[7]);
	let harness = Harness::new(3, 2, engine, MemorySink::new());
	let report = harness.run(vec![request("R1", 5, 3), request("R2", 2, 1)]).await;

	assert_eq!(report.cutoffs.get("R1"), Some(&35));
	assert_eq!(report.cutoffs.get("R2"), Some(&8));
	assert_eq!(report.survivors, 7);
	assert_eq!(harness.sink.keys(), vec!["output/R1.asn1", "output/R2.asn1"]);
	assert_eq!(harness.sink.get("output/R2.asn1"), Some(super::framed(&[hit_payload(0, 9)])));
}

#[tokio::test]
async fn request_without_hits_writes_nothing() {
	let harness = Harness::new(3, 2, ScriptedEngine::new(), MemorySink::new());
	let report = harness.run(vec![request("EMPTY", 5, 5)]).await;

	assert_eq!(report.pairs, 3);
	assert!(report.cutoffs.is_empty());
	assert!(report.artifacts.is_empty());
	assert_eq!(harness.sink.attempts(), 0);
}
