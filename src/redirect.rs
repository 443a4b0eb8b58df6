//! Outbound HTTP with redirects followed by hand.
//!
//! The vendor's redirect targets still require authentication, so every hop
//! replays the exact method, headers and body. The transport's own redirect
//! handling is disabled because it may rewrite the method or drop headers.

use std::time::Duration;

use reqwest::header::{HeaderMap, CACHE_CONTROL, CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, Response, StatusCode, Url};

use crate::error::{ProxyError, Result};

pub const MAX_REDIRECTS: usize = 2;

/// Client shared by every vendor call: no automatic redirects, bounded hops.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .redirect(Policy::none())
        .timeout(timeout)
        .build()
        .map_err(|e| ProxyError::Internal(format!("failed to build HTTP client: {e}")))
}

#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// A fully read upstream response.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub url: Url,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub text: String,
}

fn is_followed(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 307 | 308)
}

/// Sends `request`, re-issuing it against `Location` for up to `max_hops`
/// redirects. Once the limit is hit the last redirect is returned as-is.
pub async fn send_following_redirects(
    client: &Client,
    request: &OutboundRequest,
    max_hops: usize,
) -> std::result::Result<Response, reqwest::Error> {
    let mut current = request.url.clone();
    let mut response = send_once(client, request, &current).await?;
    let mut hops = 0;

    while is_followed(response.status()) && hops < max_hops {
        let next = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|location| current.join(location).ok());
        let Some(next) = next else {
            tracing::warn!(url = %current, status = response.status().as_u16(), "Redirect without usable Location");
            break;
        };

        hops += 1;
        tracing::debug!(from = %current, to = %next, hop = hops, "Following vendor redirect");
        current = next;
        response = send_once(client, request, &current).await?;
    }

    Ok(response)
}

async fn send_once(
    client: &Client,
    request: &OutboundRequest,
    url: &Url,
) -> std::result::Result<Response, reqwest::Error> {
    let mut builder = client
        .request(request.method.clone(), url.clone())
        .headers(request.headers.clone())
        .header(CACHE_CONTROL, "no-store");
    if let Some(body) = &request.body {
        builder = builder.body(body.clone());
    }
    builder.send().await
}

/// [`send_following_redirects`] plus body read, with transport failures
/// mapped to [`ProxyError::Network`].
pub async fn fetch(client: &Client, request: &OutboundRequest, max_hops: usize) -> Result<Fetched> {
    let network = |e: reqwest::Error| ProxyError::Network {
        message: e.to_string(),
        url: request.url.to_string(),
    };

    let response = send_following_redirects(client, request, max_hops)
        .await
        .map_err(network)?;

    let url = response.url().clone();
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let text = response.text().await.map_err(network)?;

    Ok(Fetched {
        url,
        status,
        content_type,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::header::{HeaderValue, AUTHORIZATION};

    fn post(server: &MockServer, path: &str) -> OutboundRequest {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer t"));
        OutboundRequest {
            method: Method::POST,
            url: Url::parse(&server.url(path)).unwrap(),
            headers,
            body: Some(b"payload".to_vec()),
        }
    }

    fn client() -> Client {
        http_client(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn follows_one_relative_redirect_preserving_request() {
        let server = MockServer::start_async().await;
        let first = server
            .mock_async(|when, then| {
                when.method(POST).path("/start");
                then.status(302).header("location", "/next");
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/next")
                    .header("authorization", "Bearer t")
                    .header("cache-control", "no-store")
                    .body("payload");
                then.status(200).body("done");
            })
            .await;

        let fetched = fetch(&client(), &post(&server, "/start"), MAX_REDIRECTS)
            .await
            .unwrap();

        assert_eq!(fetched.status, StatusCode::OK);
        assert_eq!(fetched.text, "done");
        assert_eq!(fetched.url.path(), "/next");
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn stops_at_hop_limit_and_returns_last_redirect() {
        let server = MockServer::start_async().await;
        let a = server
            .mock_async(|when, then| {
                when.path("/a");
                then.status(302).header("location", "/b");
            })
            .await;
        let b = server
            .mock_async(|when, then| {
                when.path("/b");
                then.status(307).header("location", "/c");
            })
            .await;
        let c = server
            .mock_async(|when, then| {
                when.path("/c");
                then.status(308).header("location", "/d");
            })
            .await;
        let d = server
            .mock_async(|when, then| {
                when.path("/d");
                then.status(200);
            })
            .await;

        let fetched = fetch(&client(), &post(&server, "/a"), 2).await.unwrap();

        assert_eq!(fetched.status, StatusCode::PERMANENT_REDIRECT);
        assert_eq!(a.hits_async().await, 1);
        assert_eq!(b.hits_async().await, 1);
        assert_eq!(c.hits_async().await, 1);
        assert_eq!(d.hits_async().await, 0);
    }

    #[tokio::test]
    async fn see_other_is_not_followed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/start");
                then.status(303).header("location", "/elsewhere");
            })
            .await;
        let elsewhere = server
            .mock_async(|when, then| {
                when.path("/elsewhere");
                then.status(200);
            })
            .await;

        let fetched = fetch(&client(), &post(&server, "/start"), 2).await.unwrap();

        assert_eq!(fetched.status, StatusCode::SEE_OTHER);
        assert_eq!(elsewhere.hits_async().await, 0);
    }

    #[tokio::test]
    async fn redirect_without_location_is_returned() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/start");
                then.status(301);
            })
            .await;

        let fetched = fetch(&client(), &post(&server, "/start"), 2).await.unwrap();

        assert_eq!(fetched.status, StatusCode::MOVED_PERMANENTLY);
    }

    #[tokio::test]
    async fn absolute_location_is_followed() {
        let origin = MockServer::start_async().await;
        let target = MockServer::start_async().await;
        let moved = target
            .mock_async(|when, then| {
                when.method(POST).path("/moved").header("authorization", "Bearer t");
                then.status(201).body(r#"{"ok":true}"#);
            })
            .await;
        let location = target.url("/moved");
        origin
            .mock_async(move |when, then| {
                when.path("/start");
                then.status(301).header("location", location.as_str());
            })
            .await;

        let fetched = fetch(&client(), &post(&origin, "/start"), 2).await.unwrap();

        assert_eq!(fetched.status, StatusCode::CREATED);
        moved.assert_async().await;
    }

    #[tokio::test]
    async fn connection_failure_is_a_network_error() {
        let request = OutboundRequest {
            method: Method::GET,
            url: Url::parse("http://127.0.0.1:1/unreachable").unwrap(),
            headers: HeaderMap::new(),
            body: None,
        };

        let err = fetch(&client(), &request, 2).await.unwrap_err();

        assert!(matches!(err, ProxyError::Network { .. }));
    }
}
