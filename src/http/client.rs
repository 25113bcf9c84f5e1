use std::fmt;

use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::Serialize;

use super::debug::HttpDebugConfig;

/// JSON-over-HTTP client shared by the LLM providers.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    debug: HttpDebugConfig,
}

/// How a request carries its credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential<'a> {
    None,
    Bearer(&'a str),
    QueryKey(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseData {
    pub status: u16,
    pub body: String,
}

impl HttpResponseData {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("debug", &self.debug)
            .finish()
    }
}

impl HttpClient {
    pub fn new(inner: Client, debug: HttpDebugConfig) -> Self {
        Self { inner, debug }
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        credential: Credential<'_>,
        payload: &T,
    ) -> Result<HttpResponseData, reqwest::Error> {
        let mut builder = self.inner.post(url).json(payload);
        builder = match credential {
            Credential::None => builder,
            Credential::Bearer(token) => builder.bearer_auth(token),
            Credential::QueryKey(key) => builder.query(&[("key", key)]),
        };
        let request = builder.build()?;

        if self.debug.enabled {
            let body = request
                .body()
                .and_then(|body| body.as_bytes())
                .map(String::from_utf8_lossy)
                .unwrap_or_default();
            for line in request_log_lines(self.debug, &request, &body) {
                tracing::debug!(target: "titanic_chat::http", "{line}");
            }
        }

        let response = self.inner.execute(request).await.inspect_err(|err| {
            tracing::debug!(target: "titanic_chat::http", error = %err, "request failed");
        })?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;

        if self.debug.enabled {
            for line in response_log_lines(self.debug, status, &headers, &body) {
                tracing::debug!(target: "titanic_chat::http", "{line}");
            }
        }

        Ok(HttpResponseData { status, body })
    }
}

fn request_log_lines(
    debug: HttpDebugConfig,
    request: &reqwest::Request,
    body: &str,
) -> Vec<String> {
    let mut lines = vec![format!(
        "[http-debug] > {} {}",
        request.method(),
        debug.show_url(request.url())
    )];
    for (name, value) in request.headers() {
        lines.push(format!(
            "[http-debug] > {}: {}",
            name.as_str(),
            debug.show_header(name.as_str(), value)
        ));
    }
    lines.push("[http-debug] >".to_string());
    append_body_lines(&mut lines, '>', &debug.show_body(body));
    lines
}

fn response_log_lines(
    debug: HttpDebugConfig,
    status: u16,
    headers: &HeaderMap,
    body: &str,
) -> Vec<String> {
    let mut lines = vec![format!("[http-debug] < HTTP {status}")];
    for (name, value) in headers {
        lines.push(format!(
            "[http-debug] < {}: {}",
            name.as_str(),
            debug.show_header(name.as_str(), value)
        ));
    }
    lines.push("[http-debug] <".to_string());
    append_body_lines(&mut lines, '<', &debug.show_body(body));
    lines
}

fn append_body_lines(lines: &mut Vec<String>, direction: char, body: &str) {
    if body.is_empty() {
        lines.push(format!("[http-debug] {direction} <empty body>"));
        return;
    }
    lines.extend(
        body.lines()
            .map(|line| format!("[http-debug] {direction} {line}")),
    );
}

#[cfg(test)]
mod tests {
    use super::{Credential, HttpClient, request_log_lines, response_log_lines};
    use crate::http::debug::HttpDebugConfig;
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
    use reqwest::{Client, Method, Url};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn verbose() -> HttpDebugConfig {
        HttpDebugConfig::from_verbose(true)
    }

    #[tokio::test]
    async fn bearer_credential_is_sent_as_authorization_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer gsk-test"))
            .and(body_json(json!({"model": "m"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(Client::new(), verbose());
        let response = client
            .post_json(
                &format!("{}/v1/chat/completions", server.uri()),
                Credential::Bearer("gsk-test"),
                &json!({"model": "m"}),
            )
            .await
            .expect("request should succeed");

        assert_eq!(response.status, 200);
        assert!(response.is_success());
        assert_eq!(response.body, r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn query_credential_is_sent_as_key_param() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("key", "AIza-test"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(Client::new(), HttpDebugConfig::disabled());
        let response = client
            .post_json(&server.uri(), Credential::QueryKey("AIza-test"), &json!({}))
            .await
            .expect("transport should succeed");

        assert_eq!(response.status, 503);
        assert!(!response.is_success());
        assert_eq!(response.body, "overloaded");
    }

    #[test]
    fn request_log_lines_redact_credentials() {
        let mut request = reqwest::Request::new(
            Method::POST,
            Url::parse("https://api.example.com/v1/chat/completions?key=secret&view=full")
                .expect("valid url"),
        );
        request.headers_mut().insert(
            AUTHORIZATION,
            HeaderValue::from_static("Bearer secret-token"),
        );

        let lines = request_log_lines(
            verbose(),
            &request,
            r#"{"message":"hello","token":"abc"}"#,
        );
        insta::assert_snapshot!(lines.join("\n"), @r#"
        [http-debug] > POST https://api.example.com/v1/chat/completions?key=***REDACTED***&view=full
        [http-debug] > authorization: ***REDACTED***
        [http-debug] >
        [http-debug] > {"message":"hello","token":"***REDACTED***"}
        "#);
    }

    #[test]
    fn response_log_lines_redact_body_keys() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let lines = response_log_lines(
            verbose(),
            401,
            &headers,
            r#"{"api_key":"leak","error":{"message":"Invalid API Key"}}"#,
        );
        insta::assert_snapshot!(lines.join("\n"), @r#"
        [http-debug] < HTTP 401
        [http-debug] < content-type: application/json
        [http-debug] <
        [http-debug] < {"api_key":"***REDACTED***","error":{"message":"Invalid API Key"}}
        "#);
    }

    #[test]
    fn response_log_lines_truncate_long_bodies() {
        let debug = HttpDebugConfig {
            max_body_chars: 24,
            ..verbose()
        };
        let lines = response_log_lines(
            debug,
            200,
            &HeaderMap::new(),
            r#"{"message":"abcdefghijklmnopqrstuvwxyz"}"#,
        );
        assert_eq!(
            lines,
            vec![
                "[http-debug] < HTTP 200".to_string(),
                "[http-debug] <".to_string(),
                r#"[http-debug] < {"message":"abcdefghijkl... <truncated 16 chars>"#.to_string(),
            ]
        );
    }

    #[test]
    fn empty_bodies_are_marked() {
        let lines = response_log_lines(verbose(), 204, &HeaderMap::new(), "");
        assert_eq!(lines.last().map(String::as_str), Some("[http-debug] < <empty body>"));
    }
}
