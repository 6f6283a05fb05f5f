use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use time::{Date, Month};
use tracing::{info, warn};

// [business] Profile fields returned by Google's userinfo endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GoogleProfile {
    pub sub: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("access token rejected by Google (status {0})")]
    Rejected(u16),
    #[error("Google API unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),
}

/// Identity lookups for a Google OAuth access token.
#[async_trait]
pub trait GoogleIdentity: Send + Sync {
    async fn user_profile(&self, access_token: &str) -> Result<GoogleProfile, GoogleError>;

    /// Birth date from the People API; `None` when missing, partial or unavailable.
    async fn birth_date(&self, access_token: &str) -> Option<Date>;
}

pub struct GoogleClient {
    http: reqwest::Client,
    userinfo_url: String,
    people_url: String,
}

impl GoogleClient {
    pub fn new(userinfo_url: String, people_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            userinfo_url,
            people_url,
        }
    }
}

#[async_trait]
impl GoogleIdentity for GoogleClient {
    async fn user_profile(&self, access_token: &str) -> Result<GoogleProfile, GoogleError> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Google userinfo rejected access token: {}", status);
            return Err(GoogleError::Rejected(status.as_u16()));
        }

        Ok(response.json::<GoogleProfile>().await?)
    }

    async fn birth_date(&self, access_token: &str) -> Option<Date> {
        let response = match self
            .http
            .get(&self.people_url)
            .bearer_auth(access_token)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                info!("Google People API returned {}", response.status());
                return None;
            }
            Err(e) => {
                warn!("Google People API request failed: {}", e);
                return None;
            }
        };

        let people = response.json::<PeopleResponse>().await.ok()?;
        pick_birth_date(&people)
    }
}

#[derive(Debug, Default, Deserialize)]
struct PeopleResponse {
    #[serde(default)]
    birthdays: Vec<Birthday>,
}

#[derive(Debug, Deserialize)]
struct Birthday {
    #[serde(default)]
    metadata: BirthdayMetadata,
    date: Option<BirthdayDate>,
}

#[derive(Debug, Default, Deserialize)]
struct BirthdayMetadata {
    #[serde(default)]
    primary: bool,
}

#[derive(Debug, Deserialize)]
struct BirthdayDate {
    year: Option<i32>,
    month: Option<u8>,
    day: Option<u8>,
}

// Primary entry first; entries without a year cannot prove an age
fn pick_birth_date(people: &PeopleResponse) -> Option<Date> {
    let complete = |b: &Birthday| {
        let date = b.date.as_ref()?;
        let month = Month::try_from(date.month?).ok()?;
        Date::from_calendar_date(date.year?, month, date.day?).ok()
    };

    people
        .birthdays
        .iter()
        .filter(|b| b.metadata.primary)
        .chain(people.birthdays.iter().filter(|b| !b.metadata.primary))
        .find_map(complete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::date;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn parse(json: &str) -> PeopleResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_prefers_primary_complete_birthday() {
        let people = parse(
            r#"{"birthdays": [
                {"metadata": {"primary": false}, "date": {"year": 1980, "month": 1, "day": 2}},
                {"metadata": {"primary": true}, "date": {"year": 1995, "month": 6, "day": 15}}
            ]}"#,
        );
        assert_eq!(pick_birth_date(&people), Some(date!(1995 - 06 - 15)));
    }

    #[test]
    fn test_skips_partial_birthdays() {
        let people = parse(
            r#"{"birthdays": [
                {"metadata": {"primary": true}, "date": {"month": 6, "day": 15}},
                {"date": {"year": 2001, "month": 2, "day": 28}}
            ]}"#,
        );
        assert_eq!(pick_birth_date(&people), Some(date!(2001 - 02 - 28)));
    }

    #[test]
    fn test_no_usable_birthday() {
        assert_eq!(pick_birth_date(&parse("{}")), None);
        assert_eq!(
            pick_birth_date(&parse(r#"{"birthdays": [{"date": {"year": 2001, "month": 2, "day": 30}}]}"#)),
            None
        );
    }

    fn client(server: &MockServer) -> GoogleClient {
        GoogleClient::new(
            format!("{}/oauth2/v3/userinfo", server.uri()),
            format!("{}/v1/people/me", server.uri()),
        )
    }

    #[tokio::test]
    async fn test_userinfo_success_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth2/v3/userinfo"))
            .and(header("authorization", "Bearer ya29.valid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "1090",
                "email": "ines@gmail.com",
                "given_name": "Inès"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let profile = client(&server).user_profile("ya29.valid").await.unwrap();
        assert_eq!(profile.email.as_deref(), Some("ines@gmail.com"));
        assert_eq!(profile.given_name.as_deref(), Some("Inès"));
    }

    #[tokio::test]
    async fn test_userinfo_rejection_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth2/v3/userinfo"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_token"})))
            .mount(&server)
            .await;

        let result = client(&server).user_profile("expired").await;
        assert!(matches!(result, Err(GoogleError::Rejected(401))));
    }

    #[tokio::test]
    async fn test_userinfo_unreadable_body_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth2/v3/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let result = client(&server).user_profile("ya29.valid").await;
        assert!(matches!(result, Err(GoogleError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_unreachable_google() {
        // Nothing listens on a port that was just released
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .and_then(|listener| listener.local_addr())
            .map(|addr| addr.port())
            .unwrap();
        let google = GoogleClient::new(
            format!("http://127.0.0.1:{}/oauth2/v3/userinfo", port),
            format!("http://127.0.0.1:{}/v1/people/me", port),
        );

        assert!(matches!(
            google.user_profile("ya29.valid").await,
            Err(GoogleError::Unavailable(_))
        ));
        assert_eq!(google.birth_date("ya29.valid").await, None);
    }

    #[tokio::test]
    async fn test_people_birth_date() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/people/me"))
            .and(header("authorization", "Bearer ya29.valid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "birthdays": [
                    {"metadata": {"primary": true}, "date": {"year": 1996, "month": 4, "day": 9}}
                ]
            })))
            .mount(&server)
            .await;

        assert_eq!(client(&server).birth_date("ya29.valid").await, Some(date!(1996 - 04 - 09)));
    }

    #[tokio::test]
    async fn test_people_failures_mean_no_birth_date() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/people/me"))
            .and(header("authorization", "Bearer ya29.denied"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/people/me"))
            .and(header("authorization", "Bearer ya29.garbled"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let google = client(&server);
        assert_eq!(google.birth_date("ya29.denied").await, None);
        assert_eq!(google.birth_date("ya29.garbled").await, None);
    }

    #[test]
    fn test_profile_tolerates_missing_fields() {
        let profile: GoogleProfile = serde_json::from_str(r#"{"sub": "123"}"#).unwrap();
        assert_eq!(profile.email, None);
        assert_eq!(profile.sub.as_deref(), Some("123"));
    }
}
