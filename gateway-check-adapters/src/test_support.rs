//! In-process HTTP server for exercising the HTTP adapters in tests.
//!
//! Every request is recorded before the handler's response is sent.

use std::convert::Infallible;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tokio::net::TcpListener;

/// A request as seen by the stub.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path including the query string.
    pub path: String,
    /// Header names are lowercased.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Path without the query string.
    pub fn route(&self) -> &str {
        self.path.split('?').next().unwrap_or_default()
    }
}

pub struct StubResponse {
    status: u16,
    body: String,
}

impl StubResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self::json(status, "")
    }
}

type Handler = dyn Fn(&RecordedRequest) -> StubResponse + Send + Sync;
type Recorded = Arc<Mutex<Vec<RecordedRequest>>>;

pub struct StubServer {
    base: String,
    requests: Recorded,
}

impl StubServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&RecordedRequest) -> StubResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let requests: Recorded = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let recorded = requests.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let io = TokioIo::new(stream);
                let recorded = recorded.clone();
                let handler = handler.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let recorded = recorded.clone();
                        let handler = handler.clone();
                        async move { handle_request(req, &recorded, handler.as_ref()).await }
                    });

                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        eprintln!("stub connection error: {}", e);
                    }
                });
            }
        });

        Self { base, requests }
    }

    /// Absolute URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn host(&self) -> &str {
        self.base.trim_start_matches("http://")
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }
}

async fn handle_request(
    req: Request<Incoming>,
    recorded: &Recorded,
    handler: &Handler,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => String::from_utf8_lossy(&collected.to_bytes()).to_string(),
        Err(e) => panic!("stub failed to read request body: {}", e),
    };

    let request = RecordedRequest {
        method: parts.method.to_string(),
        path: parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string()),
        headers: parts
            .headers
            .iter()
            .map(|(n, v)| {
                (
                    n.as_str().to_ascii_lowercase(),
                    String::from_utf8_lossy(v.as_bytes()).to_string(),
                )
            })
            .collect(),
        body,
    };

    let response = handler(&request);
    recorded.lock().push(request);

    Ok(Response::builder()
        .status(StatusCode::from_u16(response.status).unwrap())
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(response.body)))
        .unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_chunked_body() {
        let server = StubServer::start(|_| StubResponse::empty(204)).await;

        let chunks: Vec<Result<&'static str, std::io::Error>> =
            vec![Ok("gateways,device_id=a "), Ok("status=1i")];
        let body = reqwest::Body::wrap_stream(futures_util::stream::iter(chunks));
        let response = reqwest::Client::new()
            .post(server.url("/write?db=lora"))
            .body(body)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 204);
        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].route(), "/write");
        assert_eq!(requests[0].header("transfer-encoding"), Some("chunked"));
        assert_eq!(requests[0].body, "gateways,device_id=a status=1i");
    }
}
