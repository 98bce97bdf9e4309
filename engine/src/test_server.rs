//! Minimal in-process HTTP server for exercising the HTTP code paths. Replies
//! are scripted per route and every request is recorded.
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

#[derive(Debug, Clone)]
pub struct Reply {
    status: u16,
    content_type: String,
    body: Vec<u8>,
}

impl Reply {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::bytes(status, "application/json", body.to_string().into_bytes())
    }

    pub fn bytes(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

struct Route {
    method: String,
    path: String,
    replies: VecDeque<Reply>,
    repeat: Option<Reply>,
}

#[derive(Default)]
struct Inner {
    routes: Vec<Route>,
    requests: Vec<Recorded>,
}

#[derive(Clone)]
pub struct TestServer {
    base_url: String,
    inner: Arc<Mutex<Inner>>,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let server = Self {
            base_url,
            inner: Arc::default(),
        };

        let inner = server.inner.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let inner = inner.clone();
                tokio::spawn(async move {
                    _ = handle(stream, inner).await;
                });
            }
        });
        server
    }

    pub fn base_url(&self) -> String {
        self.base_url.clone()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Replies are handed out in order, one per request
    pub fn route(&self, method: &str, path: &str, replies: impl IntoIterator<Item = Reply>) {
        self.inner.lock().unwrap().routes.push(Route {
            method: method.into(),
            path: path.into(),
            replies: replies.into_iter().collect(),
            repeat: None,
        });
    }

    pub fn route_repeating(&self, method: &str, path: &str, reply: Reply) {
        self.inner.lock().unwrap().routes.push(Route {
            method: method.into(),
            path: path.into(),
            replies: VecDeque::new(),
            repeat: Some(reply),
        });
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.inner.lock().unwrap().requests.clone()
    }
}

async fn handle(mut stream: TcpStream, inner: Arc<Mutex<Inner>>) -> std::io::Result<()> {
    let mut buf = vec![];
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default();
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let headers = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect::<Vec<_>>();

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    let reply = {
        let mut inner = inner.lock().unwrap();
        inner.requests.push(Recorded {
            method: method.clone(),
            path: path.to_string(),
            query: query.to_string(),
            headers,
            body,
        });
        inner
            .routes
            .iter_mut()
            .filter(|r| r.method == method && r.path == path)
            .find_map(|r| r.replies.pop_front().or_else(|| r.repeat.clone()))
            .unwrap_or_else(|| Reply::bytes(404, "text/plain", b"no such route".to_vec()))
    };

    let head = format!(
        "HTTP/1.1 {} Scripted\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
        reply.status,
        reply.content_type,
        reply.body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&reply.body).await?;
    stream.shutdown().await
}
