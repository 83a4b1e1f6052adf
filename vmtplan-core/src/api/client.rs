//! Blocking Turbonomic REST client.
//!
//! Talks to `/api/v3` with a cookie session established by a form login.
//! Every call maps HTTP failures to a [`ServiceError`]; nothing is retried.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use semver::Version;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use super::service::{EntityInfo, MarketInfo, PlanService, ScenarioInfo, ServiceError, StatSnapshot};
use crate::domain::{MarketId, ScenarioId};
use crate::scenario::{MarketParams, ScenarioDto};
use crate::version::parse_version_info;

const API_PREFIX: &str = "api/v3";

/// Longest response body excerpt carried in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for [`TurboClient`].
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Host name or base URL; `https://` is assumed when no scheme is given.
    pub host: String,
    pub username: String,
    pub password: String,
    /// Reject self-signed certificates. Appliances ship with one, so this
    /// is usually off.
    pub verify_tls: bool,
    pub timeout: Duration,
}

impl ConnectionSettings {
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            verify_tls: false,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionResponse {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    version_info: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    username: String,
}

/// Turbonomic API client.
pub struct TurboClient {
    client: Client,
    base_url: String,
    username: String,
}

impl TurboClient {
    /// Build the HTTP client and log in.
    pub fn connect(settings: &ConnectionSettings) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .cookie_store(true)
            .danger_accept_invalid_certs(!settings.verify_tls)
            .build()
            .map_err(|e| ServiceError::Network(format!("failed to build HTTP client: {e}")))?;

        let this = Self {
            client,
            base_url: base_url(&settings.host),
            username: settings.username.clone(),
        };
        this.login(&settings.password)?;
        Ok(this)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn login(&self, password: &str) -> Result<(), ServiceError> {
        let resp = self
            .client
            .post(self.url("login"))
            .form(&[("username", self.username.as_str()), ("password", password)])
            .send()
            .map_err(transport_error)?;
        match resp.status() {
            s if s.is_success() => {
                tracing::debug!(user = %self.username, "logged in");
                Ok(())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ServiceError::Authentication(
                format!("login rejected for user {}", self.username),
            )),
            status => Err(status_error(status, "login", &read_body(resp))),
        }
    }

    fn send(&self, path: &str, req: RequestBuilder) -> Result<Response, ServiceError> {
        let resp = req.send().map_err(transport_error)?;
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            Err(status_error(status, path, &read_body(resp)))
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        tracing::debug!(%method, path, "api request");
        self.client.request(method, self.url(path))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let resp = self.send(path, self.request(Method::GET, path))?;
        decode(path, resp)
    }
}

impl PlanService for TurboClient {
    fn server_version(&self) -> Result<Version, ServiceError> {
        let path = "admin/versions";
        let info: VersionResponse = self.get_json(path)?;
        info.version
            .as_deref()
            .and_then(parse_version_info)
            .or_else(|| info.version_info.as_deref().and_then(parse_version_info))
            .ok_or_else(|| ServiceError::Decode {
                path: path.into(),
                message: "no version number in response".into(),
            })
    }

    fn current_user(&self) -> Result<String, ServiceError> {
        let user: UserResponse = self.get_json("users/me")?;
        Ok(user.username)
    }

    fn entity(&self, uuid: &str) -> Result<EntityInfo, ServiceError> {
        // groups live under a separate collection
        match self.get_json(&format!("entities/{uuid}")) {
            Err(ServiceError::NotFound(_)) => self.get_json(&format!("groups/{uuid}")),
            other => other,
        }
    }

    fn create_scenario(&self, dto: &ScenarioDto) -> Result<ScenarioInfo, ServiceError> {
        let path = "scenarios";
        let resp = self.send(path, self.request(Method::POST, path).json(dto))?;
        decode(path, resp)
    }

    fn create_plan_market(
        &self,
        base_market: &str,
        scenario: &ScenarioId,
        market_name: &str,
        params: &MarketParams,
    ) -> Result<MarketInfo, ServiceError> {
        let path = format!("markets/{base_market}/scenarios/{scenario}");
        let query = plan_market_query(market_name, params);
        let resp = self.send(&path, self.request(Method::POST, &path).query(&query))?;
        decode(&path, resp)
    }

    fn market(&self, market: &MarketId) -> Result<MarketInfo, ServiceError> {
        self.get_json(&format!("markets/{market}"))
    }

    fn market_stats(&self, market: &MarketId) -> Result<Vec<StatSnapshot>, ServiceError> {
        self.get_json(&format!("markets/{market}/stats"))
    }

    fn stop_market(&self, market: &MarketId) -> Result<(), ServiceError> {
        let path = format!("markets/{market}");
        self.send(
            &path,
            self.request(Method::PUT, &path).query(&[("operation", "stop")]),
        )?;
        Ok(())
    }

    fn delete_market(&self, market: &MarketId) -> Result<(), ServiceError> {
        let path = format!("markets/{market}");
        self.send(&path, self.request(Method::DELETE, &path))?;
        Ok(())
    }

    fn delete_scenario(&self, scenario: &ScenarioId) -> Result<(), ServiceError> {
        let path = format!("scenarios/{scenario}");
        self.send(&path, self.request(Method::DELETE, &path))?;
        Ok(())
    }
}

/// Normalize a host or URL into the API root (`https://host/api/v3`).
fn base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    let root = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    };
    if root.ends_with(API_PREFIX) {
        root
    } else {
        format!("{root}/{API_PREFIX}")
    }
}

fn plan_market_query(market_name: &str, params: &MarketParams) -> Vec<(&'static str, String)> {
    let mut query = vec![("plan_market_name", market_name.to_string())];
    if params.ignore_constraints {
        query.push(("ignore_constraints", "true".to_string()));
    }
    query
}

fn transport_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Network(format!("request timed out: {e}"))
    } else {
        ServiceError::Network(e.to_string())
    }
}

fn read_body(resp: Response) -> String {
    resp.text().unwrap_or_default()
}

fn status_error(status: StatusCode, path: &str, body: &str) -> ServiceError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ServiceError::Authentication(format!("HTTP {status} from {path}"))
        }
        StatusCode::NOT_FOUND => ServiceError::NotFound(path.to_string()),
        _ => ServiceError::Http {
            status: status.as_u16(),
            path: path.to_string(),
            message: body.chars().take(MAX_ERROR_BODY).collect(),
        },
    }
}

fn decode<T: DeserializeOwned>(path: &str, resp: Response) -> Result<T, ServiceError> {
    resp.json().map_err(|e| ServiceError::Decode {
        path: path.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_normalization() {
        assert_eq!(base_url("turbo.local"), "https://turbo.local/api/v3");
        assert_eq!(base_url("http://10.0.0.5/"), "http://10.0.0.5/api/v3");
        assert_eq!(
            base_url("https://turbo.local/api/v3"),
            "https://turbo.local/api/v3"
        );
    }

    #[test]
    fn plan_market_query_includes_constraint_flag_only_when_set() {
        let q = plan_market_query("CUSTOM_admin_1", &MarketParams::default());
        assert_eq!(q, vec![("plan_market_name", "CUSTOM_admin_1".to_string())]);

        let q = plan_market_query(
            "m",
            &MarketParams {
                ignore_constraints: true,
            },
        );
        assert_eq!(q[1], ("ignore_constraints", "true".to_string()));
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "markets/x", ""),
            ServiceError::Authentication(_)
        ));
        assert_eq!(
            status_error(StatusCode::NOT_FOUND, "markets/x", ""),
            ServiceError::NotFound("markets/x".into())
        );
        let long = "e".repeat(2000);
        match status_error(StatusCode::INTERNAL_SERVER_ERROR, "scenarios", &long) {
            ServiceError::Http {
                status, message, ..
            } => {
                assert_eq!(status, 500);
                assert_eq!(message.len(), MAX_ERROR_BODY);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn version_response_parses_either_field() {
        let v: VersionResponse =
            serde_json::from_str(r#"{"versionInfo":"Turbonomic Operations Manager 7.21.3 (Build \"x\")"}"#)
                .unwrap();
        assert!(v.version.is_none());
        assert_eq!(
            v.version_info.as_deref().and_then(parse_version_info),
            Some(Version::new(7, 21, 3))
        );
    }
}
