#![allow(dead_code)]

use tiny_http::{Header, Response, Server};

/// A page much taller than the default window, narrower than any tested width.
pub const TALL_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Tall page</title>
<style>
  html, body { margin: 0; padding: 0; }
  #content { width: 300px; height: 2000px; background: linear-gradient(#2b5876, #4e4376); }
</style>
</head>
<body><div id="content">page-shot fixture</div></body>
</html>"#;

/// Serves `TALL_PAGE` on an ephemeral port and returns its base URL.
pub fn start_server() -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            let response = match request.url() {
                "/" => Response::from_string(TALL_PAGE).with_header(
                    "Content-Type: text/html; charset=utf-8"
                        .parse::<Header>()
                        .unwrap(),
                ),
                _ => Response::from_string("Not Found").with_status_code(404),
            };
            let _ = request.respond(response);
        }
    });
    format!("http://{addr}/")
}

/// Host that never resolves (`.invalid` is reserved).
pub const UNREACHABLE_URL: &str = "http://page-shot-test.invalid/";
