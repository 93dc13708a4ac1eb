/// What the server decided to send back for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Diagnostic page for a request that matched no route.
    Unknown,
    /// Live status page (or the fatal error banner).
    Status,
    Visitors,
    Log,
    Favicon,
    ButtonImage,
    /// Password form, sent instead of acting on an unauthorized button push.
    AskPassword,
    /// Nothing yet; the status page follows once the button action has run.
    None,
}

impl ResponseKind {
    pub fn name(&self) -> &'static str {
        match self {
            ResponseKind::Unknown => "unknown",
            ResponseKind::Status => "status",
            ResponseKind::Visitors => "visitors",
            ResponseKind::Log => "log",
            ResponseKind::Favicon => "favicon",
            ResponseKind::ButtonImage => "buttonimage",
            ResponseKind::AskPassword => "askpass",
            ResponseKind::None => "no_response",
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, ResponseKind::Favicon | ResponseKind::ButtonImage)
    }
}

/// Represents a complete HTTP response ready to be sent to a client.
///
/// Every response is `200 OK`; headers keep their insertion order.
#[derive(Debug, Clone)]
pub struct Response {
    pub kind: ResponseKind,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```
/// # use genserve::http::response::{ResponseBuilder, ResponseKind};
/// let response = ResponseBuilder::new(ResponseKind::Favicon)
///     .header("Content-Type", "image/jpg")
///     .body(vec![0xff, 0xd8])
///     .build();
/// assert_eq!(response.header("Content-Length"), Some("2"));
/// ```
pub struct ResponseBuilder {
    kind: ResponseKind,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ResponseBuilder {
    pub fn new(kind: ResponseKind) -> Self {
        Self {
            kind,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Adds or replaces a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.headers.push((key, value)),
        }
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Builds the final Response, adding `Content-Length` unless already set.
    pub fn build(mut self) -> Response {
        if !self.headers.iter().any(|(k, _)| k == "Content-Length") {
            self.headers
                .push(("Content-Length".to_string(), self.body.len().to_string()));
        }

        Response {
            kind: self.kind,
            headers: self.headers,
            body: self.body,
        }
    }
}

impl Response {
    /// An HTML page with the standard `Connection: close` header block.
    pub fn html(kind: ResponseKind, body: impl Into<Vec<u8>>) -> Self {
        ResponseBuilder::new(kind)
            .header("Content-Type", "text/html")
            .header("Connection", "close")
            .body(body.into())
            .build()
    }

    /// A fixed image, sent without any text processing.
    pub fn image(kind: ResponseKind, bytes: &[u8]) -> Self {
        ResponseBuilder::new(kind)
            .header("Content-Type", "image/jpg")
            .body(bytes.to_vec())
            .build()
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
