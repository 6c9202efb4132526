//! HTTP built-ins: one function per verb.
//!
//! `@get -h k:v URL` fetches a URL; body-carrying verbs accept `-d DATA`.
//! Response bodies surface as reader values, so they can be assigned,
//! piped or redirected like any other stream. `head` and `options`
//! return the response headers as a map instead.

use std::io;
use std::rc::Rc;
use std::time::Duration;

use cook_types::{Key, Kind, Reader, Value, ValueMap};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Method;
use tracing::debug;

use crate::error::ErrorKind;

use super::{FlagSpec, Function, FunctionArgs, Registry};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub(super) fn register(r: &mut Registry) {
    for verb in [
        Verb::Get,
        Verb::Head,
        Verb::Options,
        Verb::Post,
        Verb::Patch,
        Verb::Put,
        Verb::Delete,
    ] {
        r.register(Rc::new(HttpFunction { verb }));
    }
}

#[derive(Clone, Copy)]
enum Verb {
    Get,
    Head,
    Options,
    Post,
    Patch,
    Put,
    Delete,
}

impl Verb {
    fn name(self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Head => "head",
            Verb::Options => "options",
            Verb::Post => "post",
            Verb::Patch => "patch",
            Verb::Put => "put",
            Verb::Delete => "delete",
        }
    }

    fn method(self) -> Method {
        match self {
            Verb::Get => Method::GET,
            Verb::Head => Method::HEAD,
            Verb::Options => Method::OPTIONS,
            Verb::Post => Method::POST,
            Verb::Patch => Method::PATCH,
            Verb::Put => Method::PUT,
            Verb::Delete => Method::DELETE,
        }
    }

    fn takes_body(self) -> bool {
        matches!(self, Verb::Post | Verb::Patch | Verb::Put | Verb::Delete)
    }

    /// `head` and `options` report metadata rather than a body.
    fn returns_headers(self) -> bool {
        matches!(self, Verb::Head | Verb::Options)
    }
}

struct HttpFunction {
    verb: Verb,
}

const HTTP_FLAGS: &[FlagSpec] = &[
    FlagSpec::new(Some("h"), "header", Kind::Map, "request header entry k:v"),
    FlagSpec::new(Some("d"), "data", Kind::String, "request body"),
];

impl Function for HttpFunction {
    fn name(&self) -> &'static str {
        self.verb.name()
    }

    fn summary(&self) -> &'static str {
        match self.verb {
            Verb::Get => "HTTP GET, the response body as a reader",
            Verb::Head => "HTTP HEAD, the response headers as a map",
            Verb::Options => "HTTP OPTIONS, the response headers as a map",
            Verb::Post => "HTTP POST, the response body as a reader",
            Verb::Patch => "HTTP PATCH, the response body as a reader",
            Verb::Put => "HTTP PUT, the response body as a reader",
            Verb::Delete => "HTTP DELETE, the response body as a reader",
        }
    }

    fn flags(&self) -> &'static [FlagSpec] {
        HTTP_FLAGS
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        let url = args.string_at(0, "URL")?;
        let net_err = |context: String| move |e: reqwest::Error| {
            ErrorKind::io(context, io::Error::other(e.to_string()))
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(concat!("cook/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(net_err("build http client".into()))?;

        let mut req: RequestBuilder = client.request(self.verb.method(), &url);
        if let Some(Value::Map(headers)) = args.flag("header") {
            for (k, v) in headers {
                req = req.header(k.to_string(), v.to_string());
            }
        }
        if self.verb.takes_body() {
            if let Some(data) = args.flag_str("data") {
                req = req.body(data.to_string());
            }
        }

        debug!(verb = self.verb.name(), url = %url, "http request");
        let resp = req
            .send()
            .map_err(net_err(format!("{} {url}", self.verb.name())))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ErrorKind::io(
                format!("{} {url}", self.verb.name()),
                io::Error::other(format!("status {status}")),
            ));
        }

        if self.verb.returns_headers() {
            let mut map = ValueMap::new();
            for (name, value) in resp.headers() {
                map.insert(
                    Key::String(name.as_str().to_string()),
                    Value::String(value.to_str().unwrap_or_default().to_string()),
                );
            }
            return Ok(Value::Map(map));
        }

        let bytes = resp
            .bytes()
            .map_err(net_err(format!("{} {url}", self.verb.name())))?;
        Ok(Value::Reader(Reader::from_bytes(bytes.to_vec())))
    }
}
