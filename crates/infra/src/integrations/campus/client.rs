//! Authenticated data calls against the first portal
//!
//! Every response goes through one classification step: success envelope,
//! application error, need-login redirect, or transport failure. The portal
//! sometimes answers the first request after a login with a redirect and
//! succeeds on immediate repeat, so `call` retries exactly once on a 3xx.

use std::sync::Arc;

use campline_domain::{term_code_for, CamplineError, FetchOutcome, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::CampusConfig;
use crate::sessions::{SessionContext, SessionStore};

use super::sso::SsoAuthenticator;

/// Wire envelope of the portal's data endpoints.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    datas: Option<Value>,
    code: Option<Value>,
    msg: Option<String>,
}

impl ApiEnvelope {
    fn code_is_success(&self) -> bool {
        match &self.code {
            Some(Value::String(code)) => code == "0",
            Some(Value::Number(code)) => code.as_i64() == Some(0),
            _ => false,
        }
    }
}

/// Client for the first portal's JSON API.
pub struct CampusPortalClient {
    config: CampusConfig,
    sessions: Arc<SessionStore>,
    sso: SsoAuthenticator,
}

impl CampusPortalClient {
    pub fn new(config: CampusConfig, sessions: Arc<SessionStore>) -> Self {
        let sso = SsoAuthenticator::new(config.clone());
        Self { config, sessions, sso }
    }

    pub fn config(&self) -> &CampusConfig {
        &self.config
    }

    /// Run the SSO handshake for an existing session. The trigger is the
    /// schedule endpoint for `date`, any protected resource works.
    pub async fn login(
        &self,
        user_key: &str,
        username: &str,
        password: &str,
        date: NaiveDate,
    ) -> Result<()> {
        let context = self.session(user_key)?;
        let trigger = self.config.schedule_url(date);
        self.sso.perform_login(&context, &trigger, username, password).await
    }

    /// Probe the canary endpoint. Returns `(logged_in, login_redirect_url)`;
    /// transport failures count as logged out with no URL.
    pub async fn check_login_status(
        &self,
        user_key: &str,
        date: NaiveDate,
    ) -> (bool, Option<String>) {
        let Some(context) = self.sessions.get_session(user_key) else {
            return (false, None);
        };

        let url = self.config.schedule_url(date);
        let response = match self.data_request(&context, &url).await {
            Ok(response) => response,
            Err(err) => {
                debug!(user_key, %err, "login status probe failed");
                return (false, None);
            }
        };

        if response.status().is_redirection() {
            let location = response
                .headers()
                .get("Location")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return (false, location);
        }

        if response.status().is_success() {
            if let Ok(envelope) = response.json::<ApiEnvelope>().await {
                if envelope.code_is_success() {
                    return (true, None);
                }
            }
        }

        (false, None)
    }

    /// One classified GET against a data endpoint.
    pub async fn call(&self, user_key: &str, url: &str) -> Result<FetchOutcome<Vec<Value>>> {
        let Some(context) = self.sessions.get_session(user_key) else {
            return Ok(FetchOutcome::NeedLogin { login_url: None });
        };

        let mut response = self.data_request(&context, url).await?;

        // The portal occasionally bounces the first call after login and
        // serves the repeat. One retry, no backoff, deliberately.
        if response.status().is_redirection() {
            debug!(user_key, url, "data call redirected, retrying once with current cookies");
            response = self.data_request(&context, url).await?;
        }

        self.classify(response).await
    }

    /// Daily course schedule for `date`.
    pub async fn fetch_course_schedule(
        &self,
        user_key: &str,
        date: NaiveDate,
    ) -> Result<FetchOutcome<Vec<Value>>> {
        self.call(user_key, &self.config.schedule_url(date)).await
    }

    /// Exam listing for the term that `date` falls in.
    pub async fn fetch_exam_schedule(
        &self,
        user_key: &str,
        date: NaiveDate,
    ) -> Result<FetchOutcome<Vec<Value>>> {
        let term_code = term_code_for(date);
        debug!(user_key, term_code, "fetching exam schedule");
        self.call(user_key, &self.config.exam_url(&term_code)).await
    }

    fn session(&self, user_key: &str) -> Result<Arc<SessionContext>> {
        self.sessions.get_session(user_key).ok_or_else(|| {
            CamplineError::Auth("session missing or expired; create one first".into())
        })
    }

    async fn data_request(
        &self,
        context: &SessionContext,
        url: &str,
    ) -> Result<reqwest::Response> {
        let client = context.client();
        client
            .send(
                client
                    .get(url)
                    .header("Referer", &self.config.referer)
                    .header("X-Requested-With", "XMLHttpRequest"),
            )
            .await
    }

    async fn classify(&self, response: reqwest::Response) -> Result<FetchOutcome<Vec<Value>>> {
        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get("Location")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Ok(FetchOutcome::NeedLogin { login_url: location });
        }

        if !status.is_success() {
            return Err(CamplineError::Network(format!("HTTP {status} from data endpoint")));
        }

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|err| CamplineError::Data(format!("unparsable data response: {err}")))?;

        let (Some(datas), Some(_)) = (&envelope.datas, &envelope.code) else {
            return Err(CamplineError::Data("response missing datas/code envelope".into()));
        };

        if !envelope.code_is_success() {
            let message = envelope.msg.clone().unwrap_or_else(|| "unknown error".to_string());
            warn!(message, "portal returned application error");
            return Err(CamplineError::Data(message));
        }

        match datas {
            Value::Array(rows) => Ok(FetchOutcome::Data(rows.clone())),
            _ => Err(CamplineError::Data("datas field is not an array".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const SCHEDULE_PATH: &str = "/jwapp/sys/homeapp/api/home/teachingSchedule/detail.do";
    const EXAM_PATH: &str = "/jwapp/sys/homeapp/api/home/student/exams.do";

    fn client_for(server: &MockServer) -> (CampusPortalClient, String) {
        let sessions = Arc::new(SessionStore::new());
        let user_key = sessions.create_session("7", "21371000").expect("session");
        let config = CampusConfig {
            api_base_url: format!("{}/jwapp/sys", server.uri()),
            ..Default::default()
        };
        (CampusPortalClient::new(config, sessions), user_key)
    }

    fn query_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 1).expect("valid date")
    }

    fn success_body(rows: Value) -> Value {
        json!({"datas": rows, "code": "0", "msg": null})
    }

    #[tokio::test]
    async fn success_envelope_unwraps_datas() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SCHEDULE_PATH))
            .and(query_param("rq", "2025-12-01"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(success_body(json!([{"kcmc": "Algorithms"}]))),
            )
            .mount(&server)
            .await;

        let (client, user_key) = client_for(&server);
        let outcome =
            client.fetch_course_schedule(&user_key, query_date()).await.expect("fetch");

        match outcome {
            FetchOutcome::Data(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0]["kcmc"], "Algorithms");
            }
            other => panic!("expected data, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn application_error_code_maps_to_data_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "datas": [], "code": "500", "msg": "term not open"
            })))
            .mount(&server)
            .await;

        let (client, user_key) = client_for(&server);
        let err = client
            .fetch_course_schedule(&user_key, query_date())
            .await
            .expect_err("should fail");

        match err {
            CamplineError::Data(msg) => assert!(msg.contains("term not open")),
            other => panic!("expected data error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_success_body_maps_to_data_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hello": "world"})))
            .mount(&server)
            .await;

        let (client, user_key) = client_for(&server);
        let err = client
            .fetch_course_schedule(&user_key, query_date())
            .await
            .expect_err("should fail");
        assert!(matches!(err, CamplineError::Data(_)));
    }

    #[tokio::test]
    async fn persistent_redirect_retries_once_then_reports_need_login() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SCHEDULE_PATH))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", "https://sso.buaa.edu.cn/login?service=x"),
            )
            .expect(2)
            .mount(&server)
            .await;

        let (client, user_key) = client_for(&server);
        let outcome =
            client.fetch_course_schedule(&user_key, query_date()).await.expect("fetch");

        match outcome {
            FetchOutcome::NeedLogin { login_url } => {
                assert_eq!(login_url.as_deref(), Some("https://sso.buaa.edu.cn/login?service=x"));
            }
            other => panic!("expected need-login, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn transient_redirect_is_healed_by_the_single_retry() {
        let server = MockServer::start().await;
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        Mock::given(method("GET"))
            .and(path(SCHEDULE_PATH))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                if hits_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(302).insert_header("Location", "/somewhere")
                } else {
                    ResponseTemplate::new(200)
                        .set_body_json(json!({"datas": [], "code": "0", "msg": null}))
                }
            })
            .mount(&server)
            .await;

        let (client, user_key) = client_for(&server);
        let outcome =
            client.fetch_course_schedule(&user_key, query_date()).await.expect("fetch");

        assert!(matches!(outcome, FetchOutcome::Data(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unexpected_status_is_a_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (client, user_key) = client_for(&server);
        let err = client
            .fetch_course_schedule(&user_key, query_date())
            .await
            .expect_err("should fail");
        assert!(matches!(err, CamplineError::Network(_)));
    }

    #[tokio::test]
    async fn absent_session_surfaces_as_need_login() {
        let server = MockServer::start().await;
        let (client, _) = client_for(&server);

        let outcome =
            client.fetch_course_schedule("missing-key", query_date()).await.expect("fetch");
        assert!(outcome.is_need_login());
    }

    #[tokio::test]
    async fn exam_fetch_sends_the_derived_term_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(EXAM_PATH))
            .and(query_param("termCode", "2025-2026-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(success_body(json!([]))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (client, user_key) = client_for(&server);
        let outcome = client.fetch_exam_schedule(&user_key, query_date()).await.expect("fetch");
        assert!(matches!(outcome, FetchOutcome::Data(_)));
    }

    #[tokio::test]
    async fn login_status_reflects_canary_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(success_body(json!([]))),
            )
            .mount(&server)
            .await;

        let (client, user_key) = client_for(&server);
        let (logged_in, url) = client.check_login_status(&user_key, query_date()).await;
        assert!(logged_in);
        assert!(url.is_none());
    }

    #[tokio::test]
    async fn login_status_redirect_reports_login_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", "https://sso.buaa.edu.cn/login"),
            )
            .mount(&server)
            .await;

        let (client, user_key) = client_for(&server);
        let (logged_in, url) = client.check_login_status(&user_key, query_date()).await;
        assert!(!logged_in);
        assert_eq!(url.as_deref(), Some("https://sso.buaa.edu.cn/login"));
    }
}
