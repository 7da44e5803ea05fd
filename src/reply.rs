//! Handler return shapes and their normalization into a [`Response`].
//!
//! Handlers return whatever shape is natural and the first matching rule
//! below decides the response:
//!
//! | Shape | Response |
//! |---|---|
//! | [`Reply::Response`] | sent as is |
//! | [`Reply::Bytes`] | `application/octet-stream` |
//! | [`Reply::Text`] starting with `redirect:` | `302` to the rest of the string |
//! | any other [`Reply::Text`] | `text/html` |
//! | [`Reply::Map`] without a `__template__` | JSON object |
//! | [`Reply::Map`] with a `__template__` | rendered template |
//! | [`Reply::Int`] in `100..600` | bare status |
//! | [`Reply::Pair`] with a status in `100..600` | status with text message |
//! | anything else | `text/plain` rendering of the value |

use http::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::error;

use crate::response::Response;
use crate::template::{TEMPLATE_KEY, Templates};

/// Prefix marking a string reply as a redirect.
pub const REDIRECT: &str = "redirect:";

/// What a handler produced.
#[derive(Debug)]
pub enum Reply {
    Response(Response),
    Bytes(Vec<u8>),
    Text(String),
    Map(Map<String, Value>),
    Int(i64),
    /// `(status, message)`.
    Pair(Value, Value),
    Other(Value),
}

impl Reply {
    /// A map reply from any serializable value. Values that do not
    /// serialize to an object fall back to [`Reply::from`] on the JSON value.
    pub fn json(value: impl Serialize) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => v.into(),
            Err(e) => Self::Other(Value::String(e.to_string())),
        }
    }

    /// A map reply rendered through template `name`.
    pub fn template(name: &str, context: impl Serialize) -> Self {
        let mut map = match serde_json::to_value(context) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        map.insert(TEMPLATE_KEY.to_owned(), Value::String(name.to_owned()));
        Self::Map(map)
    }

    pub fn redirect(location: &str) -> Self {
        Self::Text(format!("{REDIRECT}{location}"))
    }
}

impl From<Response> for Reply {
    fn from(r: Response) -> Self {
        Self::Response(r)
    }
}

impl From<Vec<u8>> for Reply {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<String> for Reply {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Reply {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<Map<String, Value>> for Reply {
    fn from(m: Map<String, Value>) -> Self {
        Self::Map(m)
    }
}

impl From<i64> for Reply {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<u16> for Reply {
    fn from(n: u16) -> Self {
        Self::Int(n.into())
    }
}

impl<M: Into<Value>> From<(u16, M)> for Reply {
    fn from((status, message): (u16, M)) -> Self {
        Self::Pair(status.into(), message.into())
    }
}

impl From<Value> for Reply {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => Self::Text(s),
            Value::Object(m) => Self::Map(m),
            Value::Number(n) if n.is_i64() => Self::Int(n.as_i64().unwrap_or_default()),
            other => Self::Other(other),
        }
    }
}

/// Turns a handler's reply into the response sent to the client.
pub(crate) fn normalize(reply: Reply, templates: &dyn Templates) -> Response {
    match reply {
        Reply::Response(r) => r,
        Reply::Bytes(b) => Response::binary(b),
        Reply::Text(s) => match s.strip_prefix(REDIRECT) {
            Some(location) => Response::redirect(location),
            None => Response::html(s),
        },
        Reply::Map(mut map) => match map.get(TEMPLATE_KEY).and_then(Value::as_str) {
            Some(name) => match templates.render(name, &map) {
                Ok(html) => Response::html(html),
                Err(e) => {
                    error!(template = name, error = %e, "template rendering failed");
                    Response::status(StatusCode::INTERNAL_SERVER_ERROR)
                }
            },
            None => {
                map.remove(TEMPLATE_KEY);
                match serde_json::to_vec(&map) {
                    Ok(body) => Response::json(body),
                    Err(e) => {
                        error!(error = %e, "json encoding failed");
                        Response::status(StatusCode::INTERNAL_SERVER_ERROR)
                    }
                }
            }
        },
        Reply::Int(n) => match status_in_range(n) {
            Some(code) => Response::status(code),
            None => Response::text(n.to_string()),
        },
        Reply::Pair(status, message) => {
            match status.as_i64().and_then(status_in_range) {
                Some(code) => Response::builder().status(code).text(plain(&message)),
                None => Response::text(format!("({}, {})", plain(&status), plain(&message))),
            }
        }
        Reply::Other(v) => Response::text(plain(&v)),
    }
}

fn status_in_range(n: i64) -> Option<StatusCode> {
    if (100..600).contains(&n) {
        StatusCode::from_u16(n as u16).ok()
    } else {
        None
    }
}

/// Strings without their JSON quotes, everything else as JSON.
fn plain(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
