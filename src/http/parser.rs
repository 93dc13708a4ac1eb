use tracing::trace;

use crate::http::request::{Method, Request, Route};
use crate::net::ClientConnection;

/// Classifies a request line by exact, case-sensitive prefix match.
///
/// GET paths must be followed by a space, so `/logfile` is not `/log`.
/// POST paths are matched as bare prefixes.
pub fn classify_request_line(line: &str) -> Route {
    let Some((method, rest)) = line.split_once(' ') else {
        return Route::Unknown;
    };

    match Method::from_str(method) {
        Some(Method::GET) => {
            const GET_ROUTES: [(&str, Route); 5] = [
                ("/ ", Route::Root),
                ("/visitors ", Route::Visitors),
                ("/log ", Route::Log),
                ("/favicon.ico ", Route::Favicon),
                ("/buttonimage.jpg ", Route::ButtonImage),
            ];
            GET_ROUTES
                .iter()
                .find(|(prefix, _)| rest.starts_with(prefix))
                .map_or(Route::Unknown, |(_, route)| *route)
        }
        Some(Method::POST) => {
            if rest.starts_with("/pushbutton.html") {
                Route::PushButton
            } else if rest.starts_with("/setpass.html") {
                Route::SetPass
            } else {
                Route::Unknown
            }
        }
        None => Route::Unknown,
    }
}

/// Parses a `Content-Length` header line (name matched case-insensitively).
pub fn content_length(line: &str) -> Option<usize> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.trim().parse().ok()
}

/// Decodes one urlencoded form line and returns the first value for `key`.
pub fn form_field(line: &str, key: &str) -> Option<String> {
    url::form_urlencoded::parse(line.trim_end_matches(['\r', '\n']).as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Outcome of one bounded line read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Line bytes without the trailing `\n`; a `\r` is kept.
    pub text: String,
    /// The line was longer than the buffer and its tail was discarded.
    pub truncated: bool,
}

impl Line {
    /// A blank line (just `\r`, or nothing) ends the header block.
    pub fn is_blank(&self) -> bool {
        self.text.len() <= 1
    }

    /// The line with its trailing `\r` removed.
    pub fn trimmed(&self) -> &str {
        self.text.trim_end_matches('\r')
    }
}

/// Reads `\n`-terminated lines of at most `max_line - 1` bytes.
///
/// An over-long line is truncated: the bytes that fit are returned and the
/// rest of that line is read and dropped, so the next read starts on the
/// following line. Downstream classification then sees only the prefix.
pub struct LineReader {
    max_line: usize,
}

impl LineReader {
    pub fn new(max_line: usize) -> Self {
        Self { max_line }
    }

    /// Returns `None` when nothing at all could be read (timeout or EOF).
    pub async fn read_line<C: ClientConnection>(&self, client: &mut C) -> Option<Line> {
        self.read_line_limited(client, usize::MAX).await.map(|(line, _)| line)
    }

    /// Like [`read_line`](Self::read_line) but consumes at most `budget`
    /// bytes; also returns how many bytes were consumed.
    pub async fn read_line_limited<C: ClientConnection>(
        &self,
        client: &mut C,
        budget: usize,
    ) -> Option<(Line, usize)> {
        let limit = self.max_line.saturating_sub(1);
        let mut buf = Vec::with_capacity(limit.min(128));
        let mut consumed = 0usize;
        let mut truncated = false;

        while consumed < budget {
            let Some(byte) = client.read_byte().await else {
                break;
            };
            consumed += 1;
            if byte == b'\n' {
                break;
            }
            if buf.len() < limit {
                buf.push(byte);
            } else {
                truncated = true;
            }
        }

        if consumed == 0 {
            return None;
        }
        if truncated {
            trace!(kept = buf.len(), "Request line truncated");
        }
        let text = String::from_utf8_lossy(&buf).into_owned();
        Some((Line { text, truncated }, consumed))
    }
}

/// Reads the request line and headers until a blank line, then the form
/// body for routes that take one.
pub async fn read_request<C: ClientConnection>(client: &mut C, reader: &LineReader) -> Request {
    let mut request = Request::new(Route::Unknown);
    let mut first = true;

    while let Some(line) = reader.read_line(client).await {
        if line.is_blank() {
            break;
        }
        trace!(line = %line.trimmed(), "Request header");
        if first {
            request.route = classify_request_line(line.trimmed());
            first = false;
        } else if let Some(len) = content_length(line.trimmed()) {
            request.content_length = Some(len);
        }
    }

    if request.route.has_form_body() {
        request.body = read_body(client, reader, request.content_length).await;
    }
    request
}

/// Form posts carry a single field; body lines past this are left unread.
const MAX_BODY_LINES: usize = 4;

async fn read_body<C: ClientConnection>(
    client: &mut C,
    reader: &LineReader,
    content_length: Option<usize>,
) -> Vec<String> {
    let mut lines = Vec::new();
    match content_length {
        Some(declared) => {
            let mut remaining = declared.min(reader.max_line.saturating_mul(MAX_BODY_LINES));
            while remaining > 0 && lines.len() < MAX_BODY_LINES {
                let Some((line, used)) = reader.read_line_limited(client, remaining).await else {
                    break;
                };
                remaining -= used;
                lines.push(line.trimmed().to_string());
            }
        }
        None => {
            while lines.len() < MAX_BODY_LINES {
                let Some(line) = reader.read_line(client).await else {
                    break;
                };
                if line.is_blank() {
                    break;
                }
                lines.push(line.trimmed().to_string());
            }
        }
    }
    lines
}
