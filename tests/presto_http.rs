//! The Presto driver against a local fake coordinator speaking HTTP/1.1

use futures::TryStreamExt;
use presto_stream::{connect, wait_for_presto, ClientConfig, Error, Row, TrustOverrides};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
struct Request {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Request {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Answers each connection with the next scripted response, then closes it
struct FakeCoordinator {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl FakeCoordinator {
    async fn start<F>(script: F) -> Self
    where
        F: FnOnce(&str) -> Vec<(u16, String)>,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let responses = script(&format!("http://{}", addr));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let request = read_request(&mut stream).await;
                recorded.lock().expect("requests lock").push(request);
                let response = format!(
                    "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self { addr, requests }
    }

    fn url(&self, userinfo: &str) -> String {
        format!("presto://{}127.0.0.1:{}/hive/default", userinfo, self.addr.port())
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().expect("requests lock").clone()
    }
}

async fn read_request(stream: &mut TcpStream) -> Request {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.expect("read request");
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split(' ');
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.expect("read body");
        assert!(n > 0, "client closed before sending body");
        buf.extend_from_slice(&chunk[..n]);
    }

    Request {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&buf[header_end..header_end + content_length]).to_string(),
    }
}

fn page(value: Value) -> (u16, String) {
    (200, value.to_string())
}

fn config(batch_size: usize) -> ClientConfig {
    ClientConfig::builder()
        .batch_size(batch_size)
        .trust_overrides(TrustOverrides::empty())
        .source("presto-stream-tests")
        .build()
}

fn ints(rows: &[Row]) -> Vec<i64> {
    rows.iter().map(|r| r[0].as_i64().expect("integer")).collect()
}

#[tokio::test]
async fn test_paged_results_stream_in_order() {
    let server = FakeCoordinator::start(|base| {
        vec![
            page(json!({
                "id": "q1",
                "nextUri": format!("{}/v1/statement/q1/1", base),
                "stats": {"state": "QUEUED", "queued": true}
            })),
            page(json!({
                "id": "q1",
                "nextUri": format!("{}/v1/statement/q1/2", base),
                "columns": [{"name": "n", "type": "integer"}],
                "data": [[1], [2]],
                "stats": {"state": "RUNNING"}
            })),
            page(json!({
                "id": "q1",
                "columns": [{"name": "n", "type": "integer"}],
                "data": [[3], [4], [5]],
                "stats": {"state": "FINISHED", "processedRows": 5}
            })),
        ]
    })
    .await;

    let conn = connect(&server.url("alice:secret@"), &config(2)).await.expect("connect");
    let mut cursor = conn.cursor().expect("cursor");
    cursor.execute("SELECT n FROM numbers").await.expect("execute");
    assert_eq!(cursor.column_names(), vec!["n"]);

    let rows: Vec<Row> = cursor.rows().try_collect().await.expect("rows");
    assert_eq!(ints(&rows), vec![1, 2, 3, 4, 5]);
    assert_eq!(cursor.inner().query_id(), Some("q1"));
    assert_eq!(cursor.inner().stats().map(|s| s.state.as_str()), Some("FINISHED"));

    let requests = server.requests();
    assert_eq!(requests.len(), 3);

    let post = &requests[0];
    assert_eq!(post.method, "POST");
    assert_eq!(post.path, "/v1/statement");
    assert_eq!(post.body, "SELECT n FROM numbers");
    assert_eq!(post.header("x-presto-user"), Some("alice"));
    assert_eq!(post.header("x-presto-catalog"), Some("hive"));
    assert_eq!(post.header("x-presto-schema"), Some("default"));
    assert_eq!(post.header("x-presto-source"), Some("presto-stream-tests"));
    // base64("alice:secret")
    assert_eq!(post.header("authorization"), Some("Basic YWxpY2U6c2VjcmV0"));

    assert_eq!(requests[1].method, "GET");
    assert_eq!(requests[1].path, "/v1/statement/q1/1");
    assert_eq!(requests[2].path, "/v1/statement/q1/2");
}

#[tokio::test]
async fn test_anonymous_user_sends_placeholder() {
    let server = FakeCoordinator::start(|_| {
        vec![page(json!({"id": "q2", "columns": [], "data": [], "stats": {"state": "FINISHED"}}))]
    })
    .await;

    let conn = connect(&server.url(""), &config(10)).await.expect("connect");
    let mut cursor = conn.cursor().expect("cursor");
    cursor.execute("SELECT 1 WHERE false").await.expect("execute");
    assert!(cursor.next_row().await.expect("next_row").is_none());

    let requests = server.requests();
    let post = &requests[0];
    assert_eq!(post.header("x-presto-user"), Some("ignored"));
    assert!(post.header("authorization").is_none());
}

#[tokio::test]
async fn test_error_in_submission_response() {
    let server = FakeCoordinator::start(|_| {
        vec![page(json!({
            "id": "q3",
            "stats": {"state": "FAILED"},
            "error": {
                "message": "line 1:15: Table hive.default.nope does not exist",
                "errorCode": 46,
                "errorName": "TABLE_NOT_FOUND",
                "errorType": "USER_ERROR"
            }
        }))]
    })
    .await;

    let conn = connect(&server.url(""), &config(10)).await.expect("connect");
    let mut cursor = conn.cursor().expect("cursor");

    let err = cursor.execute("SELECT * FROM nope").await.unwrap_err();
    let query_error = err.as_query_error().expect("query error");
    assert_eq!(query_error.error_name.as_deref(), Some("TABLE_NOT_FOUND"));
    assert_eq!(query_error.query_id.as_deref(), Some("q3"));
    assert!(query_error.is_user_error());
}

#[tokio::test]
async fn test_error_in_later_page_surfaces_at_execute() {
    let server = FakeCoordinator::start(|base| {
        vec![
            page(json!({
                "id": "q4",
                "nextUri": format!("{}/v1/statement/q4/1", base),
                "stats": {"state": "QUEUED"}
            })),
            page(json!({
                "id": "q4",
                "stats": {"state": "FAILED"},
                "error": {"message": "Access Denied: Cannot select from table secret", "errorType": "USER_ERROR"}
            })),
        ]
    })
    .await;

    let conn = connect(&server.url(""), &config(10)).await.expect("connect");
    let mut cursor = conn.cursor().expect("cursor");

    let err = cursor.execute("SELECT * FROM secret").await.unwrap_err();
    assert!(matches!(err, Error::Query(ref e) if e.message.starts_with("Access Denied")));
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn test_unavailable_is_retried() {
    let server = FakeCoordinator::start(|_| {
        vec![
            (503, String::new()),
            (503, String::new()),
            page(json!({
                "id": "q5",
                "columns": [{"name": "n", "type": "integer"}],
                "data": [[42]],
                "stats": {"state": "FINISHED"}
            })),
        ]
    })
    .await;

    let conn = connect(&server.url(""), &config(10)).await.expect("connect");
    let mut cursor = conn.cursor().expect("cursor");
    cursor.execute("SELECT 42").await.expect("execute");

    let rows: Vec<Row> = cursor.rows().try_collect().await.expect("rows");
    assert_eq!(ints(&rows), vec![42]);
    assert_eq!(server.requests().len(), 3);
}

#[tokio::test]
async fn test_server_error_keeps_status() {
    let server = FakeCoordinator::start(|_| vec![(500, "{\"message\":\"boom\"}".to_string())]).await;

    let conn = connect(&server.url(""), &config(10)).await.expect("connect");
    let mut cursor = conn.cursor().expect("cursor");

    let err = cursor.execute("SELECT 1").await.unwrap_err();
    assert!(matches!(err, Error::Status { status: 500, ref body, .. } if body.contains("boom")));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unauthorized_is_not_retried_by_readiness() {
    let server = FakeCoordinator::start(|_| vec![(401, String::new()); 5]).await;

    let start = std::time::Instant::now();
    let err = wait_for_presto(
        &server.url("mallory:wrong@"),
        "SELECT 1",
        Duration::from_secs(3),
        &config(10),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Status { status: 401, .. }));
    assert!(!err.is_transient());
    assert_eq!(server.requests().len(), 1);
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_close_cancels_unfinished_query() {
    let server = FakeCoordinator::start(|base| {
        vec![
            page(json!({
                "id": "q6",
                "nextUri": format!("{}/v1/statement/q6/1", base),
                "columns": [{"name": "n", "type": "integer"}],
                "data": [[1]],
                "stats": {"state": "RUNNING"}
            })),
            (204, String::new()),
        ]
    })
    .await;

    let conn = connect(&server.url(""), &config(10)).await.expect("connect");
    let mut cursor = conn.cursor().expect("cursor");
    cursor.execute("SELECT n FROM big").await.expect("execute");
    cursor.close().await.expect("close");

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].method, "DELETE");
    assert_eq!(requests[1].path, "/v1/statement/q6/1");
}

#[tokio::test]
async fn test_parameters_use_prepared_statement() {
    let server = FakeCoordinator::start(|_| {
        vec![page(json!({
            "id": "q7",
            "columns": [{"name": "id", "type": "integer"}],
            "data": [[7]],
            "stats": {"state": "FINISHED"}
        }))]
    })
    .await;

    let conn = connect(&server.url(""), &config(10)).await.expect("connect");
    let mut cursor = conn.cursor().expect("cursor");
    cursor
        .execute_with_params("SELECT id FROM t WHERE id = ? AND tag = ?", &[json!(7), json!("x'y")])
        .await
        .expect("execute");

    let requests = server.requests();
    let post = &requests[0];
    let prepared = post.header("x-presto-prepared-statement").expect("prepared statement header");
    let (name, encoded) = prepared.split_once('=').expect("name=statement");
    assert!(name.starts_with("st_"));
    assert_eq!(encoded, "SELECT+id+FROM+t+WHERE+id+%3D+%3F+AND+tag+%3D+%3F");
    assert_eq!(post.body, format!("EXECUTE {} USING 7, 'x''y'", name));
}

#[tokio::test]
async fn test_non_json_page_is_protocol_error() {
    let server = FakeCoordinator::start(|_| vec![(200, "<html>gateway</html>".to_string())]).await;

    let conn = connect(&server.url(""), &config(10)).await.expect("connect");
    let mut cursor = conn.cursor().expect("cursor");

    let err = cursor.execute("SELECT 1").await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
    assert!(!err.is_transient());
}
