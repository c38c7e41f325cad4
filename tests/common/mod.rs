#![allow(dead_code)]

use std::{
    io::Read,
    sync::mpsc::{self, Receiver},
    thread,
};

pub struct Captured {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn form(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.body.as_bytes())
            .into_owned()
            .collect()
    }

    pub fn form_value(&self, key: &str) -> Option<String> {
        self.form().into_iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// Serves canned replies keyed by path prefix; anything else gets a 404.
/// Returns the base url and a feed of every request received.
pub fn mock_routes(routes: Vec<(&'static str, u16, &'static str)>) -> (String, Receiver<Captured>) {
    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for mut request in server.incoming_requests() {
            let mut body = String::new();
            request.as_reader().read_to_string(&mut body).unwrap();

            let captured = Captured {
                method: request.method().to_string(),
                url: request.url().to_string(),
                headers: request
                    .headers()
                    .iter()
                    .map(|h| (h.field.to_string(), h.value.as_str().to_string()))
                    .collect(),
                body,
            };

            let (status, reply) = routes
                .iter()
                .find(|(path, _, _)| captured.url.starts_with(path))
                .map(|&(_, status, reply)| (status, reply))
                .unwrap_or((404, r#"{"error":"not found"}"#));

            tx.send(captured).ok();

            let response = tiny_http::Response::from_string(reply)
                .with_status_code(status)
                .with_header(
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .unwrap(),
                );
            request.respond(response).ok();
        }
    });

    (format!("http://{addr}"), rx)
}

/// A single auth endpoint; returns its full url.
pub fn mock_endpoint(status: u16, reply: &'static str) -> (String, Receiver<Captured>) {
    let (base, rx) = mock_routes(vec![("/api/auth", status, reply)]);
    (format!("{base}/api/auth"), rx)
}

pub fn no_proxy() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
