use std::{sync::Arc, time::Duration};

use tokio::{
	io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
	net::{TcpListener, TcpStream},
	sync::watch,
};

use blastflow_domain::RejectCode;
use blastflow_pipeline::{AdmissionQueue, EventCategory, EventSink, PipelineEvent};
use blastflow_testkit::{MemorySink, RecordingEvents, ScriptedEngine, TestDir};
use blastflow_worker::{
	sources::{self, Admitted, Admitter},
	worker::{self, WorkerState},
};

fn request_line(protocol: &str, rid: &str) -> String {
	format!(
		concat!(
			r#"{{"protocol":"{}","RID":"{}","db_tag":"nt_50M","top_N_prelim":5,"#,
			r#""top_N_traceback":3,"query_seq":"ACGTACGT","program":"blastn","#,
			r#""blast_params":{{"evalue":10}}}}"#,
		),
		protocol, rid
	)
}

fn admitter(capacity: u32) -> (Admitter, Arc<AdmissionQueue>, Arc<RecordingEvents>) {
	let queue = Arc::new(AdmissionQueue::new(capacity, Duration::from_millis(5)));
	let events = Arc::new(RecordingEvents::new());

	(Admitter::new(queue.clone(), events.clone(), 3), queue, events)
}

fn drained_ids(queue: &AdmissionQueue) -> Vec<String> {
	queue.drain(usize::MAX).iter().map(|request| request.id.clone()).collect()
}

#[tokio::test]
async fn unknown_protocol_is_rejected_with_an_event() {
	let (admitter, queue, events) = admitter(4);

	assert_eq!(admitter.admit(&request_line("2.0", "R1")).await, Admitted::Rejected);
	assert_eq!(admitter.admit("not json").await, Admitted::Rejected);
	assert!(queue.is_empty());

	let rejected = events.of(EventCategory::Failure);

	assert_eq!(rejected.len(), 2);
	assert!(matches!(
		&rejected[0],
		PipelineEvent::RequestRejected { code: RejectCode::UnknownProtocol, rid: Some(rid), .. }
			if rid == "R1"
	));
}

#[tokio::test]
async fn duplicate_ids_are_not_queued_twice() {
	let (admitter, queue, events) = admitter(4);

	assert_eq!(admitter.admit(&request_line("1.0", "R1")).await, Admitted::Accepted);
	assert_eq!(admitter.admit(&request_line("1.0", "R1")).await, Admitted::Duplicate);
	assert_eq!(queue.len(), 1);
	assert_eq!(events.of(EventCategory::Request), vec![PipelineEvent::RequestAdmitted {
		request_id: "R1".into(),
		partitions: 3,
	}]);
}

#[tokio::test]
async fn request_dir_admits_json_files_in_name_order() {
	let dir = TestDir::new().expect("Failed to create test dir.");

	dir.write("b.json", request_line("1.0", "R2")).expect("write failed");
	dir.write("a.json", request_line("1.0", "R1")).expect("write failed");
	dir.write("c.json", request_line("9.9", "R3")).expect("write failed");
	dir.write("notes.txt", request_line("1.0", "R4")).expect("write failed");

	let (admitter, queue, _) = admitter(8);
	let accepted = sources::admit_dir(dir.path(), &admitter).await.expect("Directory failed.");

	assert_eq!(accepted, 2);
	assert_eq!(drained_ids(&queue), vec!["R1", "R2"]);
}

#[tokio::test]
async fn request_list_follows_source_lines_and_skips_missing_files() {
	let dir = TestDir::new().expect("Failed to create test dir.");

	dir.write("requests/one.json", request_line("1.0", "L1")).expect("write failed");
	dir.write("requests/two.json", request_line("1.0", "L2")).expect("write failed");

	let list = format!(
		"# smoke\n:src={}\ntwo.json\nmissing.json\none.json\n",
		dir.path().join("requests").display()
	);
	let list_path = dir.write("list.txt", list).expect("write failed");
	let (admitter, queue, _) = admitter(8);
	let accepted = sources::admit_list(&list_path, &admitter).await.expect("List failed.");

	assert_eq!(accepted, 2);
	assert_eq!(drained_ids(&queue), vec!["L2", "L1"]);
}

#[tokio::test]
async fn socket_source_admits_one_request_per_line() {
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind socket.");
	let addr = listener.local_addr().expect("Failed to read socket address.");
	let (admitter, queue, _) = admitter(8);
	let server = tokio::spawn(sources::serve_socket(listener, admitter));
	let mut client = TcpStream::connect(addr).await.expect("Failed to connect.");
	let payload = format!("{}\n\n{}\n", request_line("1.0", "S1"), request_line("1.0", "S2"));

	client.write_all(payload.as_bytes()).await.expect("Failed to send requests.");
	client.shutdown().await.expect("Failed to close connection.");

	for _ in 0..200 {
		if queue.len() == 2 {
			break;
		}

		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	assert_eq!(drained_ids(&queue), vec!["S1", "S2"]);

	server.abort();
}

#[tokio::test]
async fn run_once_turns_the_backlog_into_artifacts() {
	let engine = ScriptedEngine::new().with_scores(0, "R1", &[7, 3]).with_scores(1, "R1", &[9]);
	let sink = Arc::new(MemorySink::new());
	let ctx = blastflow_testkit::context(
		blastflow_testkit::catalog(2),
		Arc::new(engine),
		sink.clone(),
		Arc::new(RecordingEvents::new()),
		2,
	)
	.expect("Failed to build context.");
	let (admitter, queue, _) = admitter(4);

	admitter.admit(&request_line("1.0", "R1")).await;

	let cfg = blastflow_testkit::test_config().expect("Failed to load test config.");
	let state = WorkerState::new(ctx, queue.clone(), &cfg.pipeline);
	let report = worker::run_once(&state).await.expect("Batch failed.").expect("Batch was empty.");

	assert_eq!(report.requests, 1);
	assert_eq!(report.artifacts.len(), 1);
	assert!(sink.get("output/R1.asn1").is_some());
	assert!(queue.is_empty());
	assert!(worker::run_once(&state).await.expect("Batch failed.").is_none());
}

#[tokio::test]
async fn worker_loop_stops_on_signal() {
	let ctx = blastflow_testkit::context(
		blastflow_testkit::catalog(1),
		Arc::new(ScriptedEngine::new()),
		Arc::new(MemorySink::new()),
		Arc::new(RecordingEvents::new()),
		1,
	)
	.expect("Failed to build context.");
	let cfg = blastflow_testkit::test_config().expect("Failed to load test config.");
	let queue = Arc::new(AdmissionQueue::from_config(&cfg.admission));
	let (stop_tx, stop_rx) = watch::channel(false);
	let handle =
		tokio::spawn(worker::run_worker(WorkerState::new(ctx, queue, &cfg.pipeline), stop_rx));

	tokio::time::sleep(Duration::from_millis(120)).await;
	stop_tx.send(true).expect("Worker dropped the stop receiver.");

	let stopped = tokio::time::timeout(Duration::from_secs(5), handle)
		.await
		.expect("Worker did not stop.")
		.expect("Worker panicked.");

	assert!(stopped.is_ok());
}

#[tokio::test]
async fn forwarder_sends_selected_events_as_lines() {
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind collector.");
	let addr = listener.local_addr().expect("Failed to read collector address.");
	let events = blastflow_worker::build_events(&blastflow_config::Events {
		log_cutoff: true,
		forward_addr: Some(addr.to_string()),
		..Default::default()
	});

	events.emit(&PipelineEvent::JobStarted { request_id: "R1".into(), partition_id: 0 });
	events.emit(&PipelineEvent::CutoffComputed { request_id: "R1".into(), threshold: 35, hits: 8 });

	let (stream, _) = listener.accept().await.expect("Forwarder never connected.");
	let mut lines = BufReader::new(stream).lines();
	let line = lines.next_line().await.expect("Read failed.").expect("Connection closed.");

	assert_eq!(line, "cutoff request=R1 threshold=35 hits=8");
}
