//! CAS-style SSO handshake
//!
//! The portal protects its API behind a central login server. The flow is
//! linear: a protected URL redirects to the SSO entry, the login page hands
//! out a one-time `execution` token, the credential submit echoes it back,
//! and the redirect chain back into the application establishes the session
//! cookies. Success is judged solely by the presence of the authentication
//! cookies in the jar afterwards.

use campline_domain::{CamplineError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};
use url::Url;

use crate::config::CampusConfig;
use crate::integrations::walk_redirects;
use crate::sessions::SessionContext;

/// Cookies that prove a completed login; either is sufficient.
const AUTH_COOKIES: [&str; 2] = ["CASTGC", "_WEU"];

/// Hop cap for the post-login redirect chain.
const FOLLOW_HOP_LIMIT: usize = 10;

// Attribute order on the hidden input is not stable across portal releases,
// so both orderings are matched.
static EXECUTION_NAME_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<input\s[^>]*?name=['"]execution['"][^>]*?value=['"]([^'"]*)['"]"#)
        .expect("valid regex")
});
static EXECUTION_VALUE_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<input\s[^>]*?value=['"]([^'"]*)['"][^>]*?name=['"]execution['"]"#)
        .expect("valid regex")
});

/// Pull the one-time `execution` token out of the login page markup.
pub(crate) fn extract_execution(login_page: &str) -> Result<String> {
    EXECUTION_NAME_FIRST
        .captures(login_page)
        .or_else(|| EXECUTION_VALUE_FIRST.captures(login_page))
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| {
            CamplineError::Auth("login page carries no execution token".into())
        })
}

/// Executes the CAS login handshake against the first portal.
pub struct SsoAuthenticator {
    config: CampusConfig,
}

impl SsoAuthenticator {
    pub fn new(config: CampusConfig) -> Self {
        Self { config }
    }

    /// Run the full handshake over `context`. `trigger_url` is any
    /// CAS-protected resource; its redirect reveals the SSO entry.
    pub async fn perform_login(
        &self,
        context: &SessionContext,
        trigger_url: &str,
        username: &str,
        password: &str,
    ) -> Result<()> {
        let client = context.client();

        // Step 1: the protected resource must bounce us to the SSO server.
        let trigger = client.send(client.get(trigger_url)).await?;
        if !trigger.status().is_redirection() {
            return Err(CamplineError::Auth(format!(
                "expected a redirect from the protected resource, got HTTP {}",
                trigger.status()
            )));
        }
        let sso_entry = trigger
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| CamplineError::Auth("login redirect without a Location".into()))?
            .to_string();
        let sso_entry = Url::parse(&sso_entry)
            .map_err(|err| CamplineError::Auth(format!("bad SSO entry URL: {err}")))?;

        // Step 2: fetch the login page and pull out the form token.
        let login_page = walk_redirects(client, sso_entry.clone(), FOLLOW_HOP_LIMIT).await?;
        if login_page.exhausted {
            return Err(CamplineError::Network("SSO entry redirect chain too long".into()));
        }
        let form_url = login_page.final_url.clone();
        let body = login_page
            .response
            .text()
            .await
            .map_err(|err| CamplineError::Network(format!("reading login page: {err}")))?;
        let execution = extract_execution(&body)?;
        debug!(form_url = %form_url, "extracted execution token");

        // Step 3: submit credentials, redirects still disabled.
        let submit = client
            .send(
                client
                    .request(reqwest::Method::POST, form_url.clone())
                    .form(&[
                        ("username", username),
                        ("password", password),
                        ("execution", execution.as_str()),
                        ("_eventId", "submit"),
                        ("geolocation", ""),
                    ])
                    .timeout(self.config.submit_timeout),
            )
            .await?;

        let status = submit.status();
        if !status.is_success() && !status.is_redirection() {
            return Err(CamplineError::Network(format!(
                "credential submit failed with HTTP {status}"
            )));
        }

        // Step 4: follow the callback chain so the application can set its
        // own session cookies.
        if status.is_redirection() {
            let location = submit
                .headers()
                .get("Location")
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    CamplineError::Auth("post-login redirect without a Location".into())
                })?;
            let target = form_url.join(location).map_err(|err| {
                CamplineError::Auth(format!("bad post-login redirect target: {err}"))
            })?;

            let follow = walk_redirects(client, target, FOLLOW_HOP_LIMIT).await?;
            if follow.exhausted {
                return Err(CamplineError::Network(
                    "post-login redirect chain too long".into(),
                ));
            }
        }

        // Step 5: the jar decides. Check cookies visible to both the SSO
        // server and the application host.
        let trigger_parsed = Url::parse(trigger_url)
            .map_err(|err| CamplineError::Auth(format!("bad trigger URL: {err}")))?;
        let mut names: Vec<String> = context
            .cookies_for(&sso_entry)
            .into_iter()
            .chain(context.cookies_for(&trigger_parsed))
            .map(|(name, _)| name)
            .collect();
        names.dedup();

        if names.iter().any(|name| AUTH_COOKIES.contains(&name.as_str())) {
            info!(username, "SSO login completed");
            Ok(())
        } else {
            Err(CamplineError::Auth(
                "login finished without an authentication cookie".into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const LOGIN_PAGE: &str = r#"
        <html><body><form method="post">
        <input type="text" name="username"/>
        <input type="password" name="password"/>
        <input type="hidden" name="execution" value="e1s1-token"/>
        </form></body></html>
    "#;

    fn test_context() -> SessionContext {
        SessionContext::ephemeral().expect("session context")
    }

    fn config_for(server: &MockServer) -> CampusConfig {
        CampusConfig { api_base_url: format!("{}/jwapp/sys", server.uri()), ..Default::default() }
    }

    async fn mount_happy_path(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/protected"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/login", server.uri()).as_str()),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_string_contains("execution=e1s1-token"))
            .and(body_string_contains("_eventId=submit"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", "/callback")
                    .insert_header("Set-Cookie", "CASTGC=TGT-1234; Path=/"),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/callback"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("Set-Cookie", "_WEU=weu-5678; Path=/"),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn completes_handshake_and_verifies_cookie() {
        let server = MockServer::start().await;
        mount_happy_path(&server).await;

        let context = test_context();
        let authenticator = SsoAuthenticator::new(config_for(&server));
        let trigger = format!("{}/protected", server.uri());

        authenticator
            .perform_login(&context, &trigger, "21371000", "secret")
            .await
            .expect("login should succeed");

        let url = Url::parse(&server.uri()).expect("url");
        let names: Vec<_> =
            context.cookies_for(&url).into_iter().map(|(name, _)| name).collect();
        assert!(names.contains(&"CASTGC".to_string()));
    }

    #[tokio::test]
    async fn non_redirect_trigger_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/protected"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let context = test_context();
        let authenticator = SsoAuthenticator::new(config_for(&server));
        let trigger = format!("{}/protected", server.uri());

        let err = authenticator
            .perform_login(&context, &trigger, "21371000", "secret")
            .await
            .expect_err("should fail");
        assert!(matches!(err, CamplineError::Auth(_)));
    }

    #[tokio::test]
    async fn missing_execution_token_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/protected"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/login", server.uri()).as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>no form here</html>"))
            .mount(&server)
            .await;

        let context = test_context();
        let authenticator = SsoAuthenticator::new(config_for(&server));
        let trigger = format!("{}/protected", server.uri());

        let err = authenticator
            .perform_login(&context, &trigger, "21371000", "secret")
            .await
            .expect_err("should fail");
        assert!(matches!(err, CamplineError::Auth(_)));
    }

    #[tokio::test]
    async fn missing_auth_cookie_after_submit_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/protected"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/login", server.uri()).as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
            .mount(&server)
            .await;
        // Credentials rejected: the CAS server re-serves the form, no cookie.
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
            .mount(&server)
            .await;

        let context = test_context();
        let authenticator = SsoAuthenticator::new(config_for(&server));
        let trigger = format!("{}/protected", server.uri());

        let err = authenticator
            .perform_login(&context, &trigger, "21371000", "wrong-password")
            .await
            .expect_err("should fail");
        assert!(matches!(err, CamplineError::Auth(_)));
    }

    #[test]
    fn execution_extraction_tolerates_attribute_order() {
        let name_first = r#"<input name="execution" type="hidden" value="abc"/>"#;
        let value_first = r#"<input type="hidden" value="xyz" name="execution"/>"#;
        let single_quotes = r#"<input name='execution' value='q1'/>"#;

        assert_eq!(extract_execution(name_first).unwrap(), "abc");
        assert_eq!(extract_execution(value_first).unwrap(), "xyz");
        assert_eq!(extract_execution(single_quotes).unwrap(), "q1");
        assert!(extract_execution("<input name=\"other\"/>").is_err());
    }
}
