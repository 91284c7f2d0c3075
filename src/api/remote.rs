//! Purpose: Provide an HTTP client for the ediwire conversion endpoint.
//! Exports: `RemoteClient`.
//! Role: Thin transport wrapper mirroring the local parse operation remotely.
//! Invariants: Requests carry `X-API-Key` only when a key is configured.
//! Invariants: Responses decode into the same `Document` shape the server emits.

use std::time::Duration;

use url::Url;

use crate::core::error::{Error, ErrorKind};
use crate::core::x12::Document;

type ApiResult<T> = Result<T, Error>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct RemoteClient {
    base_url: Url,
    api_key: Option<String>,
    agent: ureq::Agent,
}

impl RemoteClient {
    pub fn new(base_url: impl AsRef<str>) -> ApiResult<Self> {
        let base_url = Url::parse(base_url.as_ref()).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid server URL")
                .with_hint("Use a base URL like http://127.0.0.1:8080.")
                .with_source(err)
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("server URL must use http or https scheme"));
        }
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Ok(Self {
            base_url,
            api_key: None,
            agent,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Posts raw X12 text to the server and decodes the returned document.
    pub fn convert(&self, content: &str) -> ApiResult<Document> {
        let endpoint = self.base_url.join("convert").map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("failed to resolve convert endpoint")
                .with_source(err)
        })?;
        let mut request = self
            .agent
            .post(endpoint.as_str())
            .set("content-type", "text/plain; charset=utf-8");
        if let Some(api_key) = &self.api_key {
            request = request.set("x-api-key", api_key);
        }
        match request.send_string(content) {
            Ok(response) => response.into_json::<Document>().map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to decode server response")
                    .with_source(err)
            }),
            Err(ureq::Error::Status(code, response)) => Err(status_error(code, response)),
            Err(err) => Err(Error::new(ErrorKind::Io)
                .with_message("failed to reach server")
                .with_source(err)),
        }
    }
}

fn status_error(code: u16, response: ureq::Response) -> Error {
    let kind = match code {
        401 | 403 => ErrorKind::Permission,
        400..=499 => ErrorKind::Usage,
        _ => ErrorKind::Internal,
    };
    let message = response
        .into_string()
        .ok()
        .and_then(|body| envelope_message(&body))
        .unwrap_or_else(|| format!("server returned status {code}"));
    let err = Error::new(kind).with_message(message);
    if kind == ErrorKind::Permission {
        err.with_hint("Pass --api-key or --api-key-file matching the server's key.")
    } else {
        err
    }
}

fn envelope_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::{RemoteClient, envelope_message};
    use crate::core::error::ErrorKind;

    #[test]
    fn rejects_non_http_scheme() {
        let err = RemoteClient::new("ftp://127.0.0.1:8080").expect_err("expected usage error");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn rejects_unparseable_url() {
        let err = RemoteClient::new("not a url").expect_err("expected usage error");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn envelope_message_reads_server_errors() {
        let body = r#"{"error":{"kind":"Permission","message":"invalid API key"}}"#;
        assert_eq!(envelope_message(body).as_deref(), Some("invalid API key"));
        assert_eq!(envelope_message("not json"), None);
        assert_eq!(envelope_message("{}"), None);
    }
}
