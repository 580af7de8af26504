//! One-shot HTTP fixtures for exercising the API client against canned
//! backend responses. Each fixture serves its responses in order, one
//! connection per response, and hands back the raw request texts so tests
//! can assert on method, path, and body.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

/// Build a full HTTP/1.1 response with a JSON body. `connection: close`
/// forces the client to open a fresh connection for the next request, so
/// responses pair 1:1 with fixture connections.
pub fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len(),
    )
}

/// Serve `responses` in order on an ephemeral port. Returns the base URL and
/// a handle that resolves to the requests received.
pub fn spawn_http_fixture(responses: Vec<String>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port for fixture");
    let port = listener.local_addr().expect("fixture local addr").port();

    let handle = thread::spawn(move || {
        let mut requests = Vec::new();
        for response in responses {
            let (mut stream, _addr) = listener.accept().expect("accept fixture connection");
            requests.push(read_http_request(&mut stream));
            stream
                .write_all(response.as_bytes())
                .expect("write fixture response");
            let _ = stream.flush();
        }
        requests
    });

    (format!("http://127.0.0.1:{port}"), handle)
}

/// Read one HTTP request: headers plus a content-length body if present.
fn read_http_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).expect("read fixture request");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(header_end) = find_subsequence(&buf, b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..header_end]);
            let content_length = headers
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
