use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

const SHUTDOWN_PATH: &str = "/__shutdown";

/// One request as seen by the stub server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub body: String,
}

impl StubResponse {
    pub fn ok(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

/// Minimal scripted HTTP/1.1 responder bound to a loopback port. Serves
/// the queued responses in arrival order and records every request so
/// tests can assert on method, target, headers, and body.
pub struct StubHttpServer {
    base_url: String,
    queue: Arc<Mutex<VecDeque<StubResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: Option<JoinHandle<()>>,
}

impl StubHttpServer {
    pub fn start(responses: Vec<StubResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("stub server socket should bind");
        let port = listener
            .local_addr()
            .expect("stub server addr should be available")
            .port();
        let queue: Arc<Mutex<VecDeque<StubResponse>>> =
            Arc::new(Mutex::new(responses.into_iter().collect()));
        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::new(Mutex::new(Vec::new()));

        let thread_queue = Arc::clone(&queue);
        let thread_requests = Arc::clone(&requests);
        let handle = std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                match read_request(stream) {
                    Ok((request, mut stream)) => {
                        if request.target == SHUTDOWN_PATH {
                            let _ = write_response(&mut stream, &StubResponse::ok("bye"));
                            break;
                        }
                        let response = thread_queue
                            .lock()
                            .expect("stub response queue should not be poisoned")
                            .pop_front()
                            .unwrap_or_else(|| StubResponse::status(404, "response queue empty"));
                        thread_requests
                            .lock()
                            .expect("stub request log should not be poisoned")
                            .push(request);
                        let _ = write_response(&mut stream, &response);
                    }
                    Err(_) => continue,
                }
            }
        });

        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            queue,
            requests,
            handle: Some(handle),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Appends a response after start; used when a queued payload must
    /// embed the server's own address, which is only known once bound.
    pub fn enqueue(&self, response: StubResponse) {
        self.queue
            .lock()
            .expect("stub response queue should not be poisoned")
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .expect("stub request log should not be poisoned")
            .clone()
    }
}

impl Drop for StubHttpServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let addr = self.base_url.trim_start_matches("http://").to_string();
            if let Ok(mut stream) = TcpStream::connect(addr) {
                let _ = stream.write_all(
                    format!("GET {SHUTDOWN_PATH} HTTP/1.1\r\nHost: stub\r\n\r\n").as_bytes(),
                );
            }
            let _ = handle.join();
        }
    }
}

fn read_request(stream: TcpStream) -> Result<(RecordedRequest, TcpStream), std::io::Error> {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    let mut content_length = 0_usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_string();
            let value = value.trim().to_string();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap_or(0);
            }
            headers.push((name, value));
        }
    }

    let mut body = vec![0_u8; content_length];
    reader.read_exact(&mut body)?;

    let request = RecordedRequest {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    };

    Ok((request, reader.into_inner()))
}

fn write_response(stream: &mut TcpStream, response: &StubResponse) -> Result<(), std::io::Error> {
    let reason = match response.status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    };
    let payload = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        reason,
        response.body.len(),
        response.body
    );
    stream.write_all(payload.as_bytes())
}
