use std::fmt;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use http::Method;
use serde_json::Value;

/// Body attached to a request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
    /// Sent verbatim, e.g. deliberately malformed JSON.
    Raw {
        content_type: String,
        content: String,
    },
}

#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn header_value(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// One HTTP call, fully described. Built by value and never mutated after being sent.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequestSpec {
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    body: Option<RequestBody>,
    headers: Vec<(String, String)>,
    basic_auth: Option<BasicAuth>,
    timeout: Option<Duration>,
}

impl HttpRequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
            basic_auth: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }
    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Query pairs keep insertion order.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn form<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.body = Some(RequestBody::Form(pairs));
        self
    }

    pub fn raw(mut self, content_type: impl Into<String>, content: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Raw {
            content_type: content_type.into(),
            content: content.into(),
        });
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some(BasicAuth::new(username, password));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }
    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
    pub fn auth(&self) -> Option<&BasicAuth> {
        self.basic_auth.as_ref()
    }
    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
