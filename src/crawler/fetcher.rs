//! HTTP clients and page fetching
//!
//! Two clients are built per run: the page client (textual content only,
//! tight read timeout) and the image client (longer timeout, image accept
//! header). Timeouts bound every request; there is no retry logic, a
//! failed page is simply finalized with its failure status.

use crate::config::Config;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use std::time::Duration;

/// Result of a page fetch
#[derive(Debug)]
pub enum FetchOutcome {
    /// 200 response with the (possibly truncated) body text
    Success { body: String },

    /// Any non-200 HTTP response
    HttpError { status_code: u16 },

    /// Connect failure, timeout, or a body that could not be read
    NetworkError { error: String },
}

/// Builds the client used for page fetches
pub fn build_page_client(config: &Config) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("text/*"));

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
        .timeout(Duration::from_millis(config.page_timeout_ms))
        .build()
}

/// Builds the client used for image downloads
pub fn build_image_client(config: &Config) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("image/png, image/jpeg"));

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
        .timeout(Duration::from_millis(config.image_timeout_ms))
        .build()
}

/// Fetches one page, truncating the body to the configured maximum size
pub async fn fetch_page(client: &Client, url: &str, max_page_size: usize) -> FetchOutcome {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            return FetchOutcome::NetworkError {
                error: e.to_string(),
            }
        }
    };

    let status = response.status().as_u16();
    if status != 200 {
        return FetchOutcome::HttpError {
            status_code: status,
        };
    }

    match response.text().await {
        Ok(mut body) => {
            if body.len() > max_page_size {
                // Pathological pages get cut before parsing; back up to a
                // character boundary so the truncation is valid UTF-8.
                let mut end = max_page_size;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }
            FetchOutcome::Success { body }
        }
        Err(e) => FetchOutcome::NetworkError {
            error: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn clients_build_with_default_config() {
        let config = Config::default();
        assert!(build_page_client(&config).is_ok());
        assert!(build_image_client(&config).is_ok());
    }

    #[tokio::test]
    async fn fetch_returns_body_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hi</html>"))
            .mount(&server)
            .await;

        let client = build_page_client(&Config::default()).unwrap();
        let outcome = fetch_page(&client, &format!("{}/page", server.uri()), 1024).await;
        match outcome {
            FetchOutcome::Success { body } => assert!(body.contains("hi")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn fetch_reports_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = build_page_client(&Config::default()).unwrap();
        let outcome = fetch_page(&client, &format!("{}/gone", server.uri()), 1024).await;
        assert!(matches!(outcome, FetchOutcome::HttpError { status_code: 404 }));
    }

    #[tokio::test]
    async fn oversized_body_is_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
            .mount(&server)
            .await;

        let client = build_page_client(&Config::default()).unwrap();
        let outcome = fetch_page(&client, &format!("{}/big", server.uri()), 1000).await;
        match outcome {
            FetchOutcome::Success { body } => assert_eq!(body.len(), 1000),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn connection_refused_is_a_network_error() {
        let client = build_page_client(&Config::default()).unwrap();
        // Port 1 is never listening
        let outcome = fetch_page(&client, "http://127.0.0.1:1/", 1024).await;
        assert!(matches!(outcome, FetchOutcome::NetworkError { .. }));
    }
}
