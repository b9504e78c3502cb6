use crate::util;
use hyper::body::Bytes;
use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};
use serde_json::Value;
use std::{fmt, iter::FromIterator};
use uuid::Uuid;

pub const UNPARSABLE_REQUEST_BODY: &str = "[Unable to parse body]";
pub const UNPARSABLE_RESPONSE_BODY: &str = "[Unable to parse response]";
pub const UNSUPPORTED_RESPONSE_BODY: &str = "[Binary or unsupported content type]";

/// Ordered header list. Names keep the case they were set with; lookups ignore case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList(Vec<(String, String)>);

impl HeaderList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Sets a header, replacing the value of an entry with the exact same name.
    pub fn set<S1: Into<String>, S2: Into<String>>(&mut self, name: S1, value: S2) {
        let name = name.into();
        let value = value.into();

        match self.0.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter().map(|(key, value)| (key, value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderList {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = HeaderList::new();
        for (key, value) in iter {
            headers.set(key, value);
        }
        headers
    }
}

impl Serialize for HeaderList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for HeaderList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeaderListVisitor;

        impl<'de> Visitor<'de> for HeaderListVisitor {
            type Value = HeaderList;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of header names to header values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<HeaderList, A::Error> {
                let mut headers = HeaderList::new();
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    headers.set(key, value);
                }
                Ok(headers)
            }
        }

        deserializer.deserialize_map(HeaderListVisitor)
    }
}

/// Which entry point issued the call.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    /// Promise-style: the caller awaits the response.
    Fetch,
    /// Event-style: the caller registers listeners and gets a completion event.
    Xhr,
}

/// Body handed to an entry point by page code.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Text(String),
    Json(Value),
    Bytes(Vec<u8>),
}

impl RequestBody {
    /// Best-effort text rendition used for records. Never fails.
    pub fn to_record_text(&self) -> String {
        match self {
            RequestBody::Text(text) => text.clone(),
            RequestBody::Json(value) => serde_json::to_string(value)
                .unwrap_or_else(|_| String::from(UNPARSABLE_REQUEST_BODY)),
            RequestBody::Bytes(bytes) => String::from_utf8(bytes.clone())
                .unwrap_or_else(|_| String::from(UNPARSABLE_REQUEST_BODY)),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        match self {
            RequestBody::Text(text) => Bytes::from(text.clone()),
            RequestBody::Json(value) => Bytes::from(value.to_string()),
            RequestBody::Bytes(bytes) => Bytes::from(bytes.clone()),
        }
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.into())
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

/// One call as issued by page code, before any instrumentation.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: String,
    pub url: String,
    pub headers: HeaderList,
    pub body: Option<RequestBody>,
}

impl OutboundRequest {
    pub fn new<S1: Into<String>, S2: Into<String>>(method: S1, url: S2) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HeaderList::new(),
            body: None,
        }
    }

    pub fn get<S: Into<String>>(url: S) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header<S1: Into<String>, S2: Into<String>>(mut self, name: S1, value: S2) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn with_body<B: Into<RequestBody>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn normalized_method(&self) -> String {
        if self.method.is_empty() {
            String::from("GET")
        } else {
            self.method.to_uppercase()
        }
    }
}

/// Response as seen by the page. `body` is shared, so cloning is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchedResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderList,
    pub body: Bytes,
}

impl DispatchedResponse {
    pub fn content_type(&self) -> &str {
        self.headers.get("content-type").unwrap_or("")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: CallKind,
    pub method: String,
    pub url: String,
    pub request_headers: HeaderList,
    pub request_body: Option<String>,
    pub response_headers: HeaderList,
    pub response_body: Value,
    pub status: u16,
    pub status_text: String,
    pub duration: u64,
    pub timestamp: u64,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub mocked: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub breakpoint_cancelled: bool,
}

impl RequestRecord {
    /// In-progress record for a call that was just issued.
    pub fn started(kind: CallKind, request: &OutboundRequest) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            method: request.normalized_method(),
            url: request.url.clone(),
            request_headers: request.headers.clone(),
            request_body: request.body.as_ref().map(RequestBody::to_record_text),
            response_headers: HeaderList::new(),
            response_body: Value::Null,
            status: 0,
            status_text: String::new(),
            duration: 0,
            timestamp: util::unix_millis(),
            error: None,
            mocked: false,
            breakpoint_cancelled: false,
        }
    }

    pub fn resolved(
        mut self,
        status: u16,
        status_text: String,
        response_headers: HeaderList,
        response_body: Value,
        duration: u64,
    ) -> Self {
        self.status = status;
        self.status_text = status_text;
        self.response_headers = response_headers;
        self.response_body = response_body;
        self.duration = duration;
        self.error = None;
        self
    }

    pub fn mocked(
        self,
        status: u16,
        response_headers: HeaderList,
        response_body: Value,
        duration: u64,
    ) -> Self {
        let mut record = self.resolved(
            status,
            String::from("OK (Mocked)"),
            response_headers,
            response_body,
            duration,
        );
        record.mocked = true;
        record
    }

    pub fn network_error<S: Into<String>>(mut self, message: S, duration: u64) -> Self {
        self.status = 0;
        self.status_text = String::from("Network Error");
        self.response_headers = HeaderList::new();
        self.response_body = Value::Null;
        self.duration = duration;
        self.error = Some(message.into());
        self
    }

    pub fn breakpoint_cancelled<S: Into<String>>(mut self, message: S, duration: u64) -> Self {
        self.status = 0;
        self.status_text = String::from("Cancelled");
        self.response_headers = HeaderList::new();
        self.response_body = Value::Null;
        self.duration = duration;
        self.error = Some(message.into());
        self.breakpoint_cancelled = true;
        self
    }
}

impl From<&RequestRecord> for OutboundRequest {
    fn from(record: &RequestRecord) -> Self {
        OutboundRequest {
            method: record.method.clone(),
            url: record.url.clone(),
            headers: record.request_headers.clone(),
            body: record.request_body.clone().map(RequestBody::Text),
        }
    }
}
