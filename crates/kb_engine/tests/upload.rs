use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kb_core::{
    AuthState, BatchSummary, CredentialStore, MemoryCredentialStore, NoticeKind, PollStatus,
    Role, Session,
};
use kb_engine::{
    AuthSession, ByteStream, ClientConfig, ClientError, ClientEvent, ClientSink, Diagnostic,
    FailureKind, KbApi, KbClient, LogoutReason, UploadFile, UploadOrchestrator, UploadOutcome,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct TestSink {
    events: Mutex<Vec<ClientEvent>>,
}

impl TestSink {
    fn take(&self) -> Vec<ClientEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ClientSink for TestSink {
    fn emit(&self, event: ClientEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Backend double with scripted answers. The last scripted status for a file repeats.
#[derive(Default)]
struct ScriptedApi {
    uploads: Mutex<HashMap<String, Result<String, ClientError>>>,
    statuses: Mutex<HashMap<String, VecDeque<Result<PollStatus, ClientError>>>>,
    listing: Mutex<Vec<String>>,
    listing_error: Mutex<Option<ClientError>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedApi {
    fn upload_answer(self, filename: &str, answer: Result<String, ClientError>) -> Self {
        self.uploads.lock().unwrap().insert(filename.to_string(), answer);
        self
    }

    fn statuses(self, filename: &str, answers: Vec<Result<PollStatus, ClientError>>) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .insert(filename.to_string(), answers.into());
        self
    }

    fn listing(self, files: &[&str]) -> Self {
        *self.listing.lock().unwrap() = files.iter().map(|f| f.to_string()).collect();
        self
    }

    fn listing_fails(self, err: ClientError) -> Self {
        *self.listing_error.lock().unwrap() = Some(err);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn unsupported() -> ClientError {
    ClientError::new(FailureKind::Network, "not scripted")
}

#[async_trait::async_trait]
impl KbApi for ScriptedApi {
    async fn login(&self, _username: &str, _password: &str) -> Result<AuthState, ClientError> {
        Err(unsupported())
    }

    async fn list_files(&self) -> Result<Vec<String>, ClientError> {
        self.record("list".to_string());
        if let Some(err) = self.listing_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.listing.lock().unwrap().clone())
    }

    async fn delete_file(&self, _filename: &str) -> Result<(), ClientError> {
        Err(unsupported())
    }

    async fn upload_file(&self, file: &UploadFile) -> Result<String, ClientError> {
        self.record(format!("upload:{}", file.filename));
        self.uploads
            .lock()
            .unwrap()
            .get(&file.filename)
            .cloned()
            .unwrap_or_else(|| Ok(file.filename.clone()))
    }

    async fn upload_status(&self, filename: &str) -> Result<PollStatus, ClientError> {
        self.record(format!("status:{filename}"));
        let mut statuses = self.statuses.lock().unwrap();
        let queue = statuses
            .get_mut(filename)
            .expect("status scripted for every polled file");
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }

    async fn open_chat(&self, _message: &str, _session: &Session) -> Result<ByteStream, ClientError> {
        Err(unsupported())
    }
}

fn files(names: &[&str]) -> Vec<UploadFile> {
    names
        .iter()
        .map(|name| UploadFile::new(*name, name.as_bytes().to_vec()))
        .collect()
}

fn orchestrator(
    api: Arc<ScriptedApi>,
    config: ClientConfig,
    sink: Arc<TestSink>,
) -> UploadOrchestrator {
    let store = Arc::new(MemoryCredentialStore::with_state(AuthState::new("tok", Role::Root)));
    let auth = Arc::new(AuthSession::restore(store));
    UploadOrchestrator::new(api, auth, config, sink)
}

fn notices(events: &[ClientEvent]) -> Vec<(NoticeKind, String)> {
    events
        .iter()
        .filter_map(|event| match event {
            ClientEvent::Notice(notice) => Some((notice.kind, notice.message.clone())),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn mixed_batch_reconciles_unknown_against_listing() {
    let api = Arc::new(
        ScriptedApi::default()
            .statuses(
                "a.pdf",
                vec![Ok(PollStatus::Processing), Ok(PollStatus::Completed)],
            )
            .statuses("b.pdf", vec![Ok(PollStatus::Error)])
            .statuses("c.xlsx", vec![Ok(PollStatus::Unknown)])
            .listing(&["c.xlsx"]),
    );
    let sink = Arc::new(TestSink::default());
    let uploads = orchestrator(api.clone(), ClientConfig::default(), sink.clone());

    let outcome = uploads
        .run(files(&["a.pdf", "b.pdf", "c.xlsx"]))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        UploadOutcome::Finished(BatchSummary {
            completed: 2,
            errored: 1,
            processing: 0,
            total: 3
        })
    );
    let events = sink.take();
    assert_eq!(
        notices(&events),
        vec![(NoticeKind::Info, "2 file(s) succeeded, 1 failed".to_string())]
    );
    assert!(events.contains(&ClientEvent::Status(
        "Processing: 1/3 done, 1 in progress...".to_string()
    )));
    assert!(events.contains(&ClientEvent::FilesRefreshed(vec!["c.xlsx".to_string()])));

    // Only a.pdf is still processing on the second tick.
    let status_calls: Vec<_> = api
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("status:"))
        .collect();
    assert_eq!(
        status_calls,
        vec!["status:a.pdf", "status:b.pdf", "status:c.xlsx", "status:a.pdf"]
    );
}

#[tokio::test(start_paused = true)]
async fn submissions_run_one_at_a_time_in_order() {
    let api = Arc::new(
        ScriptedApi::default()
            .statuses("a.pdf", vec![Ok(PollStatus::Completed)])
            .statuses("b.pdf", vec![Ok(PollStatus::Completed)]),
    );
    let sink = Arc::new(TestSink::default());
    let uploads = orchestrator(api.clone(), ClientConfig::default(), sink.clone());

    let outcome = uploads.run(files(&["a.pdf", "b.pdf"])).await.unwrap();

    assert!(matches!(outcome, UploadOutcome::Finished(summary) if summary.errored == 0));
    assert_eq!(&api.calls()[..2], &["upload:a.pdf", "upload:b.pdf"]);
    let events = sink.take();
    assert!(events.contains(&ClientEvent::Status(
        "Uploaded 2/2 file(s), processing...".to_string()
    )));
    assert_eq!(
        notices(&events),
        vec![(
            NoticeKind::Success,
            "Uploaded and processed 2 file(s)!".to_string()
        )]
    );
}

#[tokio::test]
async fn eleven_files_are_rejected_before_any_request() {
    let api = Arc::new(ScriptedApi::default());
    let sink = Arc::new(TestSink::default());
    let uploads = orchestrator(api.clone(), ClientConfig::default(), sink.clone());
    let names: Vec<String> = (0..11).map(|i| format!("f{i}.pdf")).collect();
    let batch = names
        .iter()
        .map(|name| UploadFile::new(name.clone(), Vec::new()))
        .collect();

    let err = uploads.run(batch).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::TooManyFiles { count: 11, max: 10 });
    assert!(api.calls().is_empty());
    assert!(!sink
        .take()
        .iter()
        .any(|event| matches!(event, ClientEvent::UploadProgress(_))));
}

#[tokio::test]
async fn upload_requires_login() {
    let api = Arc::new(ScriptedApi::default());
    let sink = Arc::new(TestSink::default());
    let auth = Arc::new(AuthSession::restore(Arc::new(MemoryCredentialStore::new())));
    let uploads = UploadOrchestrator::new(api.clone(), auth, ClientConfig::default(), sink.clone());

    let err = uploads.run(files(&["a.pdf"])).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::NotLoggedIn);
    assert!(api.calls().is_empty());
    assert_eq!(
        notices(&sink.take()),
        vec![(NoticeKind::Error, "Please log in first".to_string())]
    );
}

#[tokio::test]
async fn unauthorized_upload_aborts_remaining_submissions() {
    let api = Arc::new(ScriptedApi::default().upload_answer(
        "b.pdf",
        Err(ClientError::new(FailureKind::AuthExpired, "401")),
    ));
    let sink = Arc::new(TestSink::default());
    let uploads = orchestrator(api.clone(), ClientConfig::default(), sink.clone());

    let outcome = uploads.run(files(&["a.pdf", "b.pdf", "c.pdf"])).await.unwrap();

    assert_eq!(outcome, UploadOutcome::AuthExpired);
    assert_eq!(api.calls(), vec!["upload:a.pdf", "upload:b.pdf"]);
    assert_eq!(
        notices(&sink.take()),
        vec![(
            NoticeKind::Error,
            "Credentials expired, please log in again".to_string()
        )]
    );
}

#[tokio::test]
async fn all_failed_submissions_skip_polling() {
    let api = Arc::new(
        ScriptedApi::default()
            .upload_answer("a.pdf", Err(ClientError::new(FailureKind::HttpStatus(500), "boom")))
            .upload_answer("b.pdf", Err(ClientError::new(FailureKind::Network, "reset"))),
    );
    let sink = Arc::new(TestSink::default());
    let uploads = orchestrator(api.clone(), ClientConfig::default(), sink.clone());

    let outcome = uploads.run(files(&["a.pdf", "b.pdf"])).await.unwrap();

    assert_eq!(outcome, UploadOutcome::NothingAccepted { failed: 2 });
    assert!(api.calls().iter().all(|call| call.starts_with("upload:")));
    assert_eq!(
        notices(&sink.take()),
        vec![(NoticeKind::Error, "All file uploads failed".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn partial_submission_failure_still_polls_accepted_files() {
    let api = Arc::new(
        ScriptedApi::default()
            .upload_answer("bad.pdf", Err(ClientError::new(FailureKind::HttpStatus(413), "too big")))
            .statuses("good.pdf", vec![Ok(PollStatus::Completed)]),
    );
    let sink = Arc::new(TestSink::default());
    let uploads = orchestrator(api, ClientConfig::default(), sink.clone());

    let outcome = uploads.run(files(&["bad.pdf", "good.pdf"])).await.unwrap();

    assert!(matches!(
        outcome,
        UploadOutcome::Finished(BatchSummary { completed: 1, errored: 0, total: 1, .. })
    ));
    assert!(sink.take().contains(&ClientEvent::Status(
        "Processing: 1/2 done, 0 in progress...".to_string()
    )));
}

#[tokio::test(start_paused = true)]
async fn transient_poll_failures_are_tolerated() {
    let api = Arc::new(ScriptedApi::default().statuses(
        "a.pdf",
        vec![
            Err(ClientError::new(FailureKind::Network, "refused")),
            Ok(PollStatus::Other("queued".into())),
            Ok(PollStatus::Unknown),
            Ok(PollStatus::Completed),
        ],
    ));
    let sink = Arc::new(TestSink::default());
    let uploads = orchestrator(api.clone(), ClientConfig::default(), sink.clone());

    let started = tokio::time::Instant::now();
    let outcome = uploads.run(files(&["a.pdf"])).await.unwrap();

    assert!(matches!(outcome, UploadOutcome::Finished(s) if s.completed == 1));
    // Four ticks, three poll intervals apart.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(9) && elapsed < Duration::from_secs(12));
    let events = sink.take();
    assert!(events.iter().any(|event| matches!(
        event,
        ClientEvent::Diagnostic(Diagnostic::PollFailed { filename, .. }) if filename == "a.pdf"
    )));
}

#[tokio::test(start_paused = true)]
async fn poll_timeout_marks_stuck_jobs() {
    let api = Arc::new(
        ScriptedApi::default()
            .statuses("stuck.pdf", vec![Ok(PollStatus::Unknown)])
            .statuses("ok.pdf", vec![Ok(PollStatus::Completed)]),
    );
    let config = ClientConfig {
        poll_timeout: Some(Duration::from_secs(5)),
        ..ClientConfig::default()
    };
    let sink = Arc::new(TestSink::default());
    let uploads = orchestrator(api, config, sink.clone());

    let outcome = uploads.run(files(&["stuck.pdf", "ok.pdf"])).await.unwrap();

    assert_eq!(
        outcome,
        UploadOutcome::Finished(BatchSummary {
            completed: 1,
            errored: 1,
            processing: 0,
            total: 2
        })
    );
    assert_eq!(
        notices(&sink.take()),
        vec![(NoticeKind::Info, "1 file(s) succeeded, 1 failed".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn wider_submission_queue_is_configurable() {
    let api = Arc::new(
        ScriptedApi::default()
            .statuses("a.pdf", vec![Ok(PollStatus::Completed)])
            .statuses("b.pdf", vec![Ok(PollStatus::Completed)])
            .statuses("c.pdf", vec![Ok(PollStatus::Completed)]),
    );
    let config = ClientConfig {
        submit_concurrency: 3,
        ..ClientConfig::default()
    };
    let uploads = orchestrator(api.clone(), config, Arc::new(TestSink::default()));

    let outcome = uploads.run(files(&["a.pdf", "b.pdf", "c.pdf"])).await.unwrap();

    assert!(matches!(outcome, UploadOutcome::Finished(s) if s.completed == 3));
    let uploads_made = api
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("upload:"))
        .count();
    assert_eq!(uploads_made, 3);
}

#[tokio::test(start_paused = true)]
async fn status_endpoint_rejection_does_not_end_the_batch() {
    let api = Arc::new(ScriptedApi::default().statuses(
        "a.pdf",
        vec![
            Err(ClientError::new(FailureKind::AuthExpired, "401")),
            Ok(PollStatus::Completed),
        ],
    ));
    let sink = Arc::new(TestSink::default());
    let uploads = orchestrator(api, ClientConfig::default(), sink.clone());

    let outcome = uploads.run(files(&["a.pdf"])).await.unwrap();

    assert!(matches!(outcome, UploadOutcome::Finished(s) if s.completed == 1));
    let events = sink.take();
    assert!(events.iter().any(|event| matches!(
        event,
        ClientEvent::Diagnostic(Diagnostic::PollFailed { filename, .. }) if filename == "a.pdf"
    )));
    assert_eq!(
        notices(&events),
        vec![(
            NoticeKind::Success,
            "Uploaded and processed 1 file(s)!".to_string()
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn expired_login_during_reconciliation_aborts_polling() {
    let api = Arc::new(
        ScriptedApi::default()
            .statuses("a.pdf", vec![Ok(PollStatus::Unknown)])
            .listing_fails(ClientError::new(FailureKind::AuthExpired, "401")),
    );
    let sink = Arc::new(TestSink::default());
    let uploads = orchestrator(api, ClientConfig::default(), sink.clone());

    let outcome = uploads.run(files(&["a.pdf"])).await.unwrap();

    assert_eq!(outcome, UploadOutcome::AuthExpired);
    assert_eq!(
        notices(&sink.take()),
        vec![(
            NoticeKind::Error,
            "Credentials expired, please log in again".to_string()
        )]
    );
}

struct HttpFixture {
    server: MockServer,
    store: Arc<MemoryCredentialStore>,
    sink: Arc<TestSink>,
    client: KbClient,
}

async fn http_fixture() -> HttpFixture {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryCredentialStore::with_state(AuthState::new(
        "tok-1",
        Role::Root,
    )));
    let sink = Arc::new(TestSink::default());
    let config = ClientConfig {
        poll_interval: Duration::from_millis(20),
        ..ClientConfig::with_base_url(&server.uri()).unwrap()
    };
    let client = KbClient::new(config, store.clone(), sink.clone()).unwrap();
    HttpFixture {
        server,
        store,
        sink,
        client,
    }
}

fn pdf(name: &str) -> UploadFile {
    UploadFile::new(name, b"%PDF-1.7".to_vec())
}

#[tokio::test]
async fn unauthorized_status_poll_over_http_keeps_polling() {
    let f = http_fixture().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"filename": "a.pdf"})),
        )
        .mount(&f.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/upload-status"))
        .and(query_param("filename", "a.pdf"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&f.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/upload-status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "completed"})),
        )
        .mount(&f.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"files": ["a.pdf"]})),
        )
        .mount(&f.server)
        .await;

    let outcome = f.client.upload(vec![pdf("a.pdf")]).await.unwrap();

    assert!(matches!(outcome, UploadOutcome::Finished(s) if s.completed == 1 && s.errored == 0));
    assert!(f.client.is_logged_in());
    assert_eq!(f.store.load(), Some(AuthState::new("tok-1", Role::Root)));
    let events = f.sink.take();
    assert!(!events
        .iter()
        .any(|event| matches!(event, ClientEvent::LoggedOut { .. })));
    assert_eq!(
        notices(&events),
        vec![(
            NoticeKind::Success,
            "Uploaded and processed 1 file(s)!".to_string()
        )]
    );
}

#[tokio::test]
async fn unauthorized_upload_over_http_logs_out_once_and_stops_the_queue() {
    let f = http_fixture().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains("filename=\"a.pdf\""))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"filename": "a.pdf"})),
        )
        .mount(&f.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains("filename=\"b.pdf\""))
        .respond_with(ResponseTemplate::new(401))
        .mount(&f.server)
        .await;

    let outcome = f
        .client
        .upload(vec![pdf("a.pdf"), pdf("b.pdf"), pdf("c.pdf")])
        .await
        .unwrap();

    assert_eq!(outcome, UploadOutcome::AuthExpired);
    assert!(!f.client.is_logged_in());
    assert_eq!(f.store.load(), None);

    let events = f.sink.take();
    let logouts: Vec<_> = events
        .iter()
        .filter(|event| matches!(event, ClientEvent::LoggedOut { .. }))
        .collect();
    assert_eq!(
        logouts,
        vec![&ClientEvent::LoggedOut {
            reason: LogoutReason::Expired
        }]
    );
    assert!(events.contains(&ClientEvent::FilesRefreshed(Vec::new())));

    let uploads: Vec<String> = f
        .server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|request| request.url.path() == "/upload")
        .map(|request| String::from_utf8_lossy(&request.body).into_owned())
        .collect();
    assert_eq!(uploads.len(), 2);
    assert!(uploads.iter().all(|body| !body.contains("c.pdf")));
}
