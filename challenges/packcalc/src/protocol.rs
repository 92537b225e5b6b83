use std::borrow::Cow;
use std::collections::HashMap;

use percent_encoding::percent_decode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Options,
    Other(String),
}

impl Method {
    pub(crate) fn from_bytes(s: &[u8]) -> Method {
        match s {
            b"GET" => Method::Get,
            b"POST" => Method::Post,
            b"OPTIONS" => Method::Options,
            other => Method::Other(String::from_utf8_lossy(other).into_owned()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub(crate) fn from_bytes(s: &[u8]) -> Option<Version> {
        match s {
            b"HTTP/1.0" => Some(Version::Http10),
            b"HTTP/1.1" => Some(Version::Http11),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum HttpStatus {
    Ok = 200,
    NoContent = 204,
    BadRequest = 400,
    NotFound = 404,
    MethodNotAllowed = 405,
    InternalServerError = 500,
}

impl HttpStatus {
    pub fn code(self) -> u16 {
        self as u16
    }

    fn reason(self) -> &'static str {
        match self {
            HttpStatus::Ok => "OK",
            HttpStatus::NoContent => "No Content",
            HttpStatus::BadRequest => "Bad Request",
            HttpStatus::NotFound => "Not Found",
            HttpStatus::MethodNotAllowed => "Method Not Allowed",
            HttpStatus::InternalServerError => "Internal Server Error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,

    /// Path plus optional query, e.g. "/api/calc?items=12"
    pub target: String,

    pub version: Version,

    /// Header names are kept as sent; lookups ignore case.
    pub headers: Vec<(String, String)>,

    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn path(&self) -> Cow<'_, str> {
        let encoded = self
            .target
            .split_once('?')
            .map_or(self.target.as_str(), |s| s.0);
        percent_decode(encoded.as_bytes()).decode_utf8_lossy()
    }

    /// Query parameters. A repeated key keeps its first value.
    pub fn query(&self) -> HashMap<String, String> {
        let encoded = self.target.split_once('?').map_or("", |s| s.1);
        let mut query = HashMap::new();
        for (key, value) in form_urlencoded::parse(encoded.as_bytes()).into_owned() {
            query.entry(key).or_insert(value);
        }
        query
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// HTTP/1.1 keeps the connection open unless the client opts out; HTTP/1.0 closes
    /// unless the client opts in.
    pub fn wants_close(&self) -> bool {
        let connection = self.header("connection");
        match self.version {
            Version::Http11 => connection.is_some_and(|v| v.eq_ignore_ascii_case("close")),
            Version::Http10 => !connection.is_some_and(|v| v.eq_ignore_ascii_case("keep-alive")),
        }
    }
}

const TEXT: &str = "text/plain; charset=utf-8";
const JSON: &str = "application/json";
const HTML: &str = "text/html; charset=utf-8";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: HttpStatus,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// Close the connection once this response is written.
    pub close: bool,
}

impl HttpResponse {
    pub fn text(status: HttpStatus, body: impl Into<String>) -> HttpResponse {
        HttpResponse {
            status,
            content_type: TEXT,
            body: body.into().into_bytes(),
            close: false,
        }
    }

    pub fn json(body: Vec<u8>) -> HttpResponse {
        HttpResponse {
            status: HttpStatus::Ok,
            content_type: JSON,
            body,
            close: false,
        }
    }

    pub fn html(body: Vec<u8>) -> HttpResponse {
        HttpResponse {
            status: HttpStatus::Ok,
            content_type: HTML,
            body,
            close: false,
        }
    }

    pub fn no_content() -> HttpResponse {
        HttpResponse {
            status: HttpStatus::NoContent,
            content_type: TEXT,
            body: Vec::new(),
            close: false,
        }
    }

    pub fn closing(mut self) -> HttpResponse {
        self.close = true;
        self
    }

    /// Status line and headers, terminated by the blank line. CORS headers go on every response.
    pub(crate) fn head(&self) -> String {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Access-Control-Allow-Headers: Content-Type\r\n\
             Access-Control-Allow-Methods: GET,POST,OPTIONS\r\n",
            self.status.code(),
            self.status.reason(),
        );
        if self.status != HttpStatus::NoContent {
            head.push_str(&format!(
                "Content-Type: {}\r\nContent-Length: {}\r\n",
                self.content_type,
                self.body.len()
            ));
        }
        if self.close {
            head.push_str("Connection: close\r\n");
        }
        head.push_str("\r\n");
        head
    }
}

/// Body of `POST /api/calc`. A missing `items` decodes as 0 and is rejected later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CalcRequest {
    #[serde(default)]
    pub items: i64,
    #[serde(default)]
    pub sizes: Option<Vec<i64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackOut {
    pub size: u64,
    pub qty: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalcResponse {
    pub items_ordered: i64,
    pub total_items: u64,
    pub packs: Vec<PackOut>,
}
