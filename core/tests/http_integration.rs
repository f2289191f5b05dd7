//! REST behaviour against a scripted local HTTP responder.

use parking_lot::Mutex;
use raiderhub_core::resources::{Filter, Quest, ResourceCache};
use raiderhub_core::{
    ApiClient, AuthSession, ClientConfig, CurrentUser, Error, LocalStorage, NoticeLevel,
    PresenceStatus, RaiderClient, UserRef,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
struct Request {
    method: String,
    path: String,
    authorization: Option<String>,
    body: Value,
}

impl Request {
    fn line(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

type Seen = Arc<Mutex<Vec<Request>>>;

/// Serve every request with `route` and record it. Returns the API base URL.
async fn start_api<F>(route: F) -> (String, Seen)
where
    F: Fn(&Request) -> (u16, Value) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let route = Arc::new(route);

    let log = seen.clone();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let route = route.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let Some(req) = read_request(&mut stream).await else {
                    return;
                };
                let (status, body) = route(&req);
                log.lock().push(req);

                let body = body.to_string();
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    if status < 400 { "OK" } else { "Error" },
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (format!("http://127.0.0.1:{}/api", port), seen)
}

async fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let mut content_length = 0;
    let mut authorization = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().unwrap_or(0),
                "authorization" => authorization = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = serde_json::from_slice(&buf[header_end..]).unwrap_or(Value::Null);

    Some(Request {
        method,
        path,
        authorization,
        body,
    })
}

fn config_for(base: &str) -> ClientConfig {
    let mut config = ClientConfig::new(base);
    config.request_timeout = Duration::from_secs(5);
    config
}

fn client_for(base: &str) -> RaiderClient {
    let storage = Arc::new(LocalStorage::in_memory().unwrap());
    let mut client = RaiderClient::new(config_for(base), storage).unwrap();
    client
        .start_session(AuthSession {
            token: "tok-1".into(),
            user: CurrentUser {
                id: "me".into(),
                username: "Me".into(),
                email: None,
                avatar: None,
            },
        })
        .unwrap();
    client
}

fn not_found() -> (u16, Value) {
    (404, json!({ "message": "Not found" }))
}

#[tokio::test]
async fn test_send_without_socket_posts_and_reconciles() {
    let sent = json!({
        "_id": "srv-1",
        "senderId": "me",
        "receiverId": "bob",
        "content": "hi",
        "read": false,
        "createdAt": "2024-05-01T10:00:00Z"
    });
    let history = sent.clone();

    let (base, seen) = start_api(move |req| match (req.method.as_str(), req.path.as_str()) {
        ("POST", "/api/messages/send") => (201, sent.clone()),
        ("GET", "/api/messages/conversations") => (
            200,
            json!([{
                "conversationId": "c1",
                "otherUser": { "_id": "bob", "username": "Bob" },
                "unreadCount": 0
            }]),
        ),
        ("GET", "/api/messages/conversation/bob") => (200, json!([history.clone()])),
        _ => not_found(),
    })
    .await;

    let mut client = client_for(&base);
    client.open_conversation(UserRef::new("bob", "Bob")).await.unwrap();
    assert!(client.store().open_conversation().unwrap().key.is_pending());

    client.send_message("  hi ").await.unwrap();

    let requests = seen.lock().clone();
    let lines: Vec<String> = requests.iter().map(Request::line).collect();
    assert_eq!(
        lines,
        vec![
            "POST /api/messages/send",
            "GET /api/messages/conversations",
            "GET /api/messages/conversation/bob",
        ]
    );
    assert_eq!(requests[0].body, json!({ "receiverId": "bob", "content": "hi" }));
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer tok-1"));

    // Applied once as our own message, and the placeholder became the real thread.
    let open = client.store().open_conversation().unwrap();
    assert_eq!(open.messages().len(), 1);
    assert_eq!(open.messages()[0].id, "srv-1");
    assert!(open.messages()[0].is_own);
    assert_eq!(open.key.server_id(), Some("c1"));

    let notices = client.drain_notices();
    assert!(notices.iter().any(|n| n.level == NoticeLevel::Info));
    assert!(notices.iter().all(|n| n.level != NoticeLevel::Error));
}

#[tokio::test]
async fn test_mark_read_without_socket_uses_http() {
    let (base, seen) = start_api(|req| match (req.method.as_str(), req.path.as_str()) {
        ("PUT", "/api/messages/m1/read") => (200, json!({ "success": true })),
        _ => not_found(),
    })
    .await;

    let mut client = client_for(&base);
    client.mark_read("m1").await.unwrap();

    assert!(matches!(client.mark_read("m2").await, Err(Error::NotFound(_))));
    let lines: Vec<String> = seen.lock().iter().map(Request::line).collect();
    assert_eq!(lines, vec!["PUT /api/messages/m1/read", "PUT /api/messages/m2/read"]);
}

#[tokio::test]
async fn test_friends_not_found_means_none() {
    let (base, _seen) = start_api(|req| match req.path.as_str() {
        "/api/friends" => not_found(),
        "/api/friends/requests" => (500, json!({ "message": "boom" })),
        _ => not_found(),
    })
    .await;

    let api = ApiClient::new(&config_for(&base)).unwrap();
    assert!(api.list_friends().await.unwrap().is_empty());
    assert!(matches!(
        api.list_friend_requests().await,
        Err(Error::Status { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_friends_carry_presence() {
    let (base, _seen) = start_api(|req| match req.path.as_str() {
        "/api/friends" => (200, json!([{ "_id": "ann", "username": "Ann", "status": "online" }])),
        _ => not_found(),
    })
    .await;

    // No socket snapshot yet, so the stale server status is replaced by offline.
    let mut client = client_for(&base);
    let friends = client.friends().await.unwrap();
    assert_eq!(friends.len(), 1);
    assert_eq!(friends[0].status, Some(PresenceStatus::Offline));
}

#[tokio::test]
async fn test_resource_mutations_reload_list() {
    let lists = Arc::new(AtomicUsize::new(0));
    let counter = lists.clone();

    let (base, seen) = start_api(move |req| match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/api/quests?search=broken") => (500, json!({ "message": "boom" })),
        ("GET", "/api/quests?search=gear") => {
            let body = match counter.fetch_add(1, Ordering::SeqCst) {
                0 => json!([{ "_id": "q1", "title": "Gear run" }]),
                1 => json!([
                    { "_id": "q1", "title": "Gear run" },
                    { "_id": "q2", "title": "Gear hunt" }
                ]),
                2 => json!([
                    { "_id": "q1", "title": "Gear run II" },
                    { "_id": "q2", "title": "Gear hunt" }
                ]),
                _ => json!([{ "_id": "q2", "title": "Gear hunt" }]),
            };
            (200, body)
        }
        ("POST", "/api/quests") => (201, json!({ "_id": "q2", "title": "Gear hunt" })),
        ("PUT", "/api/quests/q1") => (200, json!({ "_id": "q1", "title": "Gear run II" })),
        ("DELETE", "/api/quests/q1") => (200, json!({ "success": true })),
        _ => not_found(),
    })
    .await;

    let api = ApiClient::new(&config_for(&base)).unwrap();
    let mut cache = ResourceCache::<Quest>::new();
    let filter = Filter::new().with("search", "gear");

    cache.reload(&api, filter.clone()).await.unwrap();
    assert_eq!(cache.items().len(), 1);

    let created = cache
        .create(&api, &json!({ "title": "Gear hunt" }))
        .await
        .unwrap();
    assert_eq!(created.id, "q2");
    assert_eq!(cache.items().len(), 2);

    cache
        .update(&api, "q1", &json!({ "title": "Gear run II" }))
        .await
        .unwrap();
    assert_eq!(cache.get("q1").unwrap().title, "Gear run II");

    cache.delete(&api, "q1").await.unwrap();
    assert!(cache.get("q1").is_none());
    assert_eq!(cache.items().len(), 1);

    // A failed reload keeps what was there.
    assert!(cache
        .reload(&api, Filter::new().with("search", "broken"))
        .await
        .is_err());
    assert_eq!(cache.items().len(), 1);
    assert_eq!(cache.filter(), &filter);

    let lines: Vec<String> = seen.lock().iter().map(Request::line).collect();
    assert_eq!(
        lines,
        vec![
            "GET /api/quests?search=gear",
            "POST /api/quests",
            "GET /api/quests?search=gear",
            "PUT /api/quests/q1",
            "GET /api/quests?search=gear",
            "DELETE /api/quests/q1",
            "GET /api/quests?search=gear",
            "GET /api/quests?search=broken",
        ]
    );
    assert_eq!(lists.load(Ordering::SeqCst), 4);
}
