/// HTTP request methods the server recognises.
///
/// Only GET and POST reach a route; anything else classifies as unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a page or image
    GET,
    /// POST - Submit a form
    POST,
}

impl Method {
    /// Parses an HTTP method token (case-sensitive).
    ///
    /// # Example
    ///
    /// ```
    /// # use genserve::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            _ => None,
        }
    }
}

/// Everything the server knows how to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Unknown,
    Root,
    Visitors,
    Log,
    PushButton,
    SetPass,
    Favicon,
    ButtonImage,
}

impl Route {
    pub fn name(&self) -> &'static str {
        match self {
            Route::Unknown => "unknown",
            Route::Root => "root",
            Route::Visitors => "visitors",
            Route::Log => "log",
            Route::PushButton => "pushbutton",
            Route::SetPass => "setpass",
            Route::Favicon => "favicon",
            Route::ButtonImage => "buttonimage",
        }
    }

    /// Whether the request takes a form body.
    pub fn has_form_body(&self) -> bool {
        matches!(self, Route::PushButton | Route::SetPass)
    }
}

/// A classified request, after the header block has been read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub route: Route,
    /// Value of a `Content-Length` header, when one was sent.
    pub content_length: Option<usize>,
    /// Form body lines, read only for routes that take a body.
    pub body: Vec<String>,
}

impl Request {
    pub fn new(route: Route) -> Self {
        Self {
            route,
            content_length: None,
            body: Vec::new(),
        }
    }

    /// Looks up a form field across the body lines (case-sensitive key).
    pub fn form_field(&self, key: &str) -> Option<String> {
        self.body
            .iter()
            .find_map(|line| crate::http::parser::form_field(line, key))
    }
}
