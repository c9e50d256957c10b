//! Manual redirect walking
//!
//! The portal clients disable automatic redirects so every 3xx is observable:
//! the SSO handshakes need the intermediate `Location` values, and the
//! second portal sets cookies on hops that an auto-following client would
//! consume silently. This helper follows a chain one GET at a time, letting
//! the session's cookie jar accumulate every `Set-Cookie` along the way.

use campline_domain::{CamplineError, Result};
use reqwest::Response;
use tracing::debug;
use url::Url;

use crate::http::HttpClient;

/// Outcome of a manual redirect walk.
pub(crate) struct RedirectWalk {
    pub response: Response,
    pub final_url: Url,
    pub hops: usize,
    /// The chain was still redirecting when the hop cap was reached; the
    /// held response is the last 3xx.
    pub exhausted: bool,
}

/// GET `start` and follow `Location` headers until a non-redirect response
/// or `max_hops` redirects have been consumed.
pub(crate) async fn walk_redirects(
    client: &HttpClient,
    start: Url,
    max_hops: usize,
) -> Result<RedirectWalk> {
    let mut current = start;
    let mut hops = 0;

    loop {
        let response = client.send(client.get(current.clone())).await?;

        if !response.status().is_redirection() {
            return Ok(RedirectWalk { response, final_url: current, hops, exhausted: false });
        }

        let location = response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                CamplineError::Network("redirect response without a Location header".into())
            })?;

        let next = current.join(location).map_err(|err| {
            CamplineError::Network(format!("unresolvable redirect target {location:?}: {err}"))
        })?;

        debug!(hop = hops + 1, from = %current, to = %next, "following redirect");

        if hops >= max_hops {
            return Ok(RedirectWalk { response, final_url: current, hops, exhausted: true });
        }

        current = next;
        hops += 1;
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn plain_client() -> HttpClient {
        HttpClient::builder().no_redirects().max_attempts(1).build().expect("http client")
    }

    #[tokio::test]
    async fn follows_relative_redirects_to_completion() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/b"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(200).set_body_string("done"))
            .mount(&server)
            .await;

        let start = Url::parse(&format!("{}/a", server.uri())).expect("url");
        let walk = walk_redirects(&plain_client(), start, 5).await.expect("walk");

        assert_eq!(walk.hops, 1);
        assert!(!walk.exhausted);
        assert_eq!(walk.response.status().as_u16(), 200);
        assert!(walk.final_url.path().ends_with("/b"));
    }

    #[tokio::test]
    async fn reports_exhaustion_instead_of_looping_forever() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/again"))
            .mount(&server)
            .await;

        let start = Url::parse(&format!("{}/again", server.uri())).expect("url");
        let walk = walk_redirects(&plain_client(), start, 3).await.expect("walk");

        assert!(walk.exhausted);
        assert_eq!(walk.hops, 3);
        assert!(walk.response.status().is_redirection());
    }
}
