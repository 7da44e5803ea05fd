//! Turns one routed request into handler arguments and calls the handler.

use std::collections::HashMap;
use std::fmt;

use http::StatusCode;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::db::Database;
use crate::error::Error;
use crate::handler::{Args, BoxedHandler, HandlerError};
use crate::reply::Reply;
use crate::request::Request;
use crate::response::Response;
use crate::signature::Classification;

/// A request the dispatcher refused, before or after running the handler.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClientError {
    /// `400`: malformed body, a missing required argument, or an argument
    /// the handler passed on that the ORM rejected.
    BadRequest(String),
    /// `415`: a body in a format handlers cannot receive.
    UnsupportedMediaType(String),
}

impl ClientError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        }
    }

    pub fn into_response(self) -> Response {
        let status = self.status();
        let (Self::BadRequest(msg) | Self::UnsupportedMediaType(msg)) = self;
        Response::builder().status(status).text(msg)
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest(m) => write!(f, "bad request: {m}"),
            Self::UnsupportedMediaType(m) => write!(f, "unsupported media type: {m}"),
        }
    }
}

impl std::error::Error for ClientError {}

/// A registered handler together with what it needs from each request.
pub(crate) struct RequestHandler {
    name: String,
    classification: Classification,
    handler: BoxedHandler,
}

impl RequestHandler {
    pub(crate) fn new(name: String, classification: Classification, handler: BoxedHandler) -> Self {
        Self { name, classification, handler }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Assembles the arguments for `req` and runs the handler.
    pub(crate) async fn call(
        &self,
        req: Request,
        database: Option<Database>,
    ) -> Result<Reply, ClientError> {
        let c = &self.classification;

        let parsed = if c.needs_arguments() {
            if req.method().has_body() {
                Some(parse_body(&req)?)
            } else if !req.query_string().is_empty() {
                Some(first_values(form_urlencoded_pairs(req.query_string().as_bytes())))
            } else {
                None
            }
        } else {
            None
        };

        let mut kw = match parsed.filter(|kw| !kw.is_empty()) {
            None => path_params(req.params()),
            Some(mut kw) => {
                if !c.accepts_any_keyword() && !c.named_keywords().is_empty() {
                    kw.retain(|k, _| c.named_keywords().contains(k));
                }
                for (k, v) in req.params() {
                    if kw.contains_key(k) {
                        warn!(handler = %self.name, arg = %k, "duplicate arg name in keyword and path params");
                    }
                    kw.insert(k.clone(), Value::String(v.clone()));
                }
                kw
            }
        };

        for name in c.required_keywords() {
            if !kw.contains_key(name) {
                return Err(ClientError::BadRequest(format!("Missing argument: {name}")));
            }
        }

        // A `request` key from the client never shadows the injected request.
        let request = if c.needs_request() {
            kw.remove(crate::signature::REQUEST);
            Some(req)
        } else {
            None
        };

        info!(handler = %self.name, args = ?kw.keys().collect::<Vec<_>>(), "call");

        match self.handler.call(Args { kw, request, database }).await {
            Ok(reply) => Ok(reply),
            Err(HandlerError::Api(e)) => {
                let mut map = Map::new();
                map.insert("error".to_owned(), e.error.into());
                map.insert("data".to_owned(), e.data.into());
                map.insert("message".to_owned(), e.message.into());
                Ok(Reply::Map(map))
            }
            Err(HandlerError::Internal(Error::InvalidArgument(msg))) => {
                warn!(handler = %self.name, error = %msg, "invalid argument");
                Err(ClientError::BadRequest(msg))
            }
            Err(HandlerError::Internal(e)) => {
                error!(handler = %self.name, error = %e, "handler failed");
                Ok(Reply::Response(Response::status(StatusCode::INTERNAL_SERVER_ERROR)))
            }
        }
    }
}

fn parse_body(req: &Request) -> Result<Map<String, Value>, ClientError> {
    let Some(content_type) = req.content_type() else {
        return Err(ClientError::BadRequest("Missing Content-Type.".to_owned()));
    };
    let mime = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();

    match mime.as_str() {
        "application/json" => match serde_json::from_slice::<Value>(req.body()) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ClientError::BadRequest("JSON body must be object.".to_owned())),
            Err(e) => Err(ClientError::BadRequest(format!("Invalid JSON body: {e}"))),
        },
        "application/x-www-form-urlencoded" => Ok(first_values(form_urlencoded_pairs(req.body()))),
        "multipart/form-data" => {
            let boundary = boundary(content_type)
                .ok_or_else(|| ClientError::BadRequest("Missing multipart boundary.".to_owned()))?;
            Ok(first_values(multipart_fields(req.body(), boundary)))
        }
        _ => Err(ClientError::UnsupportedMediaType(format!(
            "Unsupported Content-Type: {content_type}"
        ))),
    }
}

fn form_urlencoded_pairs(input: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(input).into_owned().collect()
}

/// Collapses repeated keys, keeping the first value of each.
fn first_values(pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.entry(k).or_insert(Value::String(v));
    }
    map
}

fn path_params(params: &HashMap<String, String>) -> Map<String, Value> {
    params.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect()
}

/// The `boundary` parameter of a multipart content type, unquoted.
fn boundary(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|p| {
        let (k, v) = p.trim().split_once('=')?;
        k.trim().eq_ignore_ascii_case("boundary").then(|| v.trim().trim_matches('"'))
    })
}

/// Named parts of a `multipart/form-data` body. The body is split on raw
/// bytes; parts whose content is not UTF-8 (binary uploads) are skipped.
fn multipart_fields(body: &[u8], boundary: &str) -> Vec<(String, String)> {
    let delimiter = format!("--{boundary}");
    let mut fields = Vec::new();

    for part in split_bytes(body, delimiter.as_bytes()).skip(1) {
        if part.starts_with(b"--") {
            break;
        }
        let part = part.strip_prefix(b"\r\n").unwrap_or(part);
        let Some(at) = find_bytes(part, b"\r\n\r\n") else {
            continue;
        };
        let (head, content) = (&part[..at], &part[at + 4..]);
        let head = String::from_utf8_lossy(head);
        let Some(name) = head.lines().find_map(disposition_name) else {
            continue;
        };
        let content = content.strip_suffix(b"\r\n").unwrap_or(content);
        match std::str::from_utf8(content) {
            Ok(text) => fields.push((name.to_owned(), text.to_owned())),
            Err(_) => debug!(field = name, bytes = content.len(), "skipping binary multipart part"),
        }
    }
    fields
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn split_bytes<'a>(mut rest: &'a [u8], delimiter: &'a [u8]) -> impl Iterator<Item = &'a [u8]> {
    let mut done = false;
    std::iter::from_fn(move || {
        if done {
            return None;
        }
        match find_bytes(rest, delimiter) {
            Some(at) => {
                let part = &rest[..at];
                rest = &rest[at + delimiter.len()..];
                Some(part)
            }
            None => {
                done = true;
                Some(rest)
            }
        }
    })
}

fn disposition_name(line: &str) -> Option<&str> {
    let (header, value) = line.split_once(':')?;
    if !header.trim().eq_ignore_ascii_case("content-disposition") {
        return None;
    }
    value.split(';').find_map(|p| {
        let (k, v) = p.trim().split_once('=')?;
        (k == "name").then(|| v.trim_matches('"'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_keeps_first_value_and_blanks() {
        let map = first_values(form_urlencoded_pairs(b"page=2&page=3&q=&name=a%20b"));
        assert_eq!(map["page"], "2");
        assert_eq!(map["q"], "");
        assert_eq!(map["name"], "a b");
    }

    #[test]
    fn boundary_parameter() {
        assert_eq!(boundary("multipart/form-data; boundary=xyz"), Some("xyz"));
        assert_eq!(boundary("multipart/form-data; charset=utf-8; Boundary=\"a b\""), Some("a b"));
        assert_eq!(boundary("multipart/form-data"), None);
    }

    #[test]
    fn multipart_text_fields() {
        let body = "--xyz\r\n\
            Content-Disposition: form-data; name=\"email\"\r\n\r\n\
            a@b.c\r\n\
            --xyz\r\n\
            Content-Disposition: form-data; name=\"note\"; filename=\"n.txt\"\r\n\
            Content-Type: text/plain\r\n\r\n\
            line one\r\nline two\r\n\
            --xyz\r\n\
            Content-Disposition: form-data; name=\"email\"\r\n\r\n\
            second@b.c\r\n\
            --xyz--\r\n";
        let map = first_values(multipart_fields(body.as_bytes(), "xyz"));
        assert_eq!(map["email"], "a@b.c");
        assert_eq!(map["note"], "line one\r\nline two");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn binary_parts_do_not_disturb_text_fields() {
        let mut body = b"--b0\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"p.png\"\r\n\
            Content-Type: image/png\r\n\r\n"
            .to_vec();
        body.extend_from_slice(&[0x89, b'P', b'N', b'G', 0xff, 0xfe, b'\r', b'\n', 0x00]);
        body.extend_from_slice(
            b"\r\n--b0\r\nContent-Disposition: form-data; name=\"caption\"\r\n\r\nsunset \xc3\xa9t\xc3\xa9\r\n--b0--\r\n",
        );

        let map = first_values(multipart_fields(&body, "b0"));
        assert_eq!(map["caption"], "sunset été");
        assert!(!map.contains_key("photo"));
    }

    #[test]
    fn client_errors_render_as_text() {
        let r = ClientError::UnsupportedMediaType("Unsupported Content-Type: text/xml".into()).into_response();
        assert_eq!(r.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(r.body(), b"Unsupported Content-Type: text/xml");
    }
}
