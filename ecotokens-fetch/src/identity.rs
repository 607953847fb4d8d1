//! Identity provider boundary.
//!
//! Sign-in yields an [`Identity`] whose `uid` keys the remote aggregate.
//! Email is trimmed and lowercased before it is sent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::FetchError;
use crate::host::http::{HttpClient, endpoint, ensure_success};

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user id.
    pub uid: String,
    /// Normalized email address.
    pub email: String,
    /// Bearer token for authenticated calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Authentication service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Signs in with existing credentials.
    async fn login(&self, email: &str, password: &str) -> Result<Identity, FetchError>;

    /// Creates an account and signs in.
    async fn signup(&self, email: &str, password: &str) -> Result<Identity, FetchError>;

    /// Signs out. Succeeds when nobody is signed in.
    async fn logout(&self) -> Result<(), FetchError>;

    /// Returns the signed-in identity, if any.
    async fn current_user(&self) -> Option<Identity>;
}

/// Normalizes an email address for sign-in.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

// ============================================================================
// HTTP Implementation
// ============================================================================

/// [`IdentityProvider`] backed by a JSON HTTP API.
///
/// - `POST {base}/auth/login` and `POST {base}/auth/register` with
///   `{email, password}`, answering `{token, user: {email, uid?}}`
/// - `POST {base}/auth/logout` with the bearer token (best effort)
#[derive(Debug)]
pub struct HttpIdentityProvider {
    client: HttpClient,
    base: Url,
    session: RwLock<Option<Identity>>,
}

impl HttpIdentityProvider {
    /// Creates a provider with no active session.
    pub fn new(client: HttpClient, base: Url) -> Self {
        Self {
            client,
            base,
            session: RwLock::new(None),
        }
    }

    /// Creates a provider resuming a previously saved session.
    pub fn with_session(client: HttpClient, base: Url, session: Option<Identity>) -> Self {
        Self {
            client,
            base,
            session: RwLock::new(session),
        }
    }

    async fn authenticate(
        &self,
        action: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, FetchError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(FetchError::AuthenticationFailed(
                "Email and password required".to_string(),
            ));
        }

        let url = endpoint(&self.base, &["auth", action])?;
        let body = json!({ "email": email, "password": password });
        let response = self.client.post_json_with_auth(&url, &body, None).await?;
        let response = ensure_success(response).await?;
        let text = response
            .text()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;
        let identity = parse_auth_response(&text, &email)?;

        info!(uid = %identity.uid, action, "Signed in");
        *self.session.write().await = Some(identity.clone());
        Ok(identity)
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    #[instrument(skip(self, password))]
    async fn login(&self, email: &str, password: &str) -> Result<Identity, FetchError> {
        self.authenticate("login", email, password).await
    }

    #[instrument(skip(self, password))]
    async fn signup(&self, email: &str, password: &str) -> Result<Identity, FetchError> {
        self.authenticate("register", email, password).await
    }

    #[instrument(skip(self))]
    async fn logout(&self) -> Result<(), FetchError> {
        let Some(identity) = self.session.write().await.take() else {
            return Ok(());
        };
        let url = endpoint(&self.base, &["auth", "logout"])?;
        match self
            .client
            .post_json_with_auth(&url, &json!({}), identity.token.as_deref())
            .await
        {
            Ok(response) => debug!(status = %response.status(), "Logout acknowledged"),
            Err(e) => debug!(error = %e, "Logout request failed; session cleared locally"),
        }
        Ok(())
    }

    async fn current_user(&self) -> Option<Identity> {
        self.session.read().await.clone()
    }
}

/// Decodes `{token, user: {email, uid | id}}`.
///
/// The uid falls back to a top-level `uid`/`userId`, then to the normalized
/// email, so a server that only returns a token still yields a stable key.
fn parse_auth_response(body: &str, email: &str) -> Result<Identity, FetchError> {
    let value: Value = serde_json::from_str(body)?;
    let token = value
        .get("token")
        .and_then(Value::as_str)
        .map(str::to_string);
    let user = value.get("user");
    let text = |v: Option<&Value>, key: &str| {
        v.and_then(|v| v.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let email = text(user, "email").unwrap_or_else(|| email.to_string());
    let uid = text(user, "uid")
        .or_else(|| text(user, "id"))
        .or_else(|| text(Some(&value), "uid"))
        .or_else(|| text(Some(&value), "userId"))
        .unwrap_or_else(|| email.clone());

    if uid.is_empty() {
        return Err(FetchError::InvalidResponse(
            "sign-in response has no user id".to_string(),
        ));
    }
    Ok(Identity { uid, email, token })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn base_url(server: &MockServer) -> Url {
        Url::parse(&server.uri()).unwrap()
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.ORG "), "ada@example.org");
    }

    #[test]
    fn test_parse_auth_response_variants() {
        let id = parse_auth_response(
            r#"{"token":"t1","user":{"email":"a@b.c","uid":"u-9"}}"#,
            "a@b.c",
        )
        .unwrap();
        assert_eq!(id.uid, "u-9");
        assert_eq!(id.token.as_deref(), Some("t1"));

        let id =
            parse_auth_response(r#"{"token":"t2","user":{"email":"a@b.c"}}"#, "a@b.c").unwrap();
        assert_eq!(id.uid, "a@b.c");

        let id = parse_auth_response(r#"{"userId":"u-1"}"#, "x@y.z").unwrap();
        assert_eq!(id.uid, "u-1");
        assert_eq!(id.email, "x@y.z");
        assert!(id.token.is_none());

        assert!(parse_auth_response("not json", "a@b.c").is_err());
    }

    #[tokio::test]
    async fn test_login_sets_session_and_logout_clears() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(json!({ "email": "ada@example.org", "password": "pw" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "abc",
                "user": { "email": "ada@example.org", "uid": "u-1" }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/logout"))
            .and(header("authorization", "Bearer abc"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let provider = HttpIdentityProvider::new(HttpClient::new().unwrap(), base_url(&server));

        let identity = provider.login(" Ada@Example.org", "pw").await.unwrap();
        assert_eq!(identity.uid, "u-1");
        assert_eq!(identity.token.as_deref(), Some("abc"));
        assert_eq!(provider.current_user().await, Some(identity));

        provider.logout().await.unwrap();
        assert!(provider.current_user().await.is_none());
    }

    #[tokio::test]
    async fn test_signup_posts_to_register() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/register"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "token": "t", "userId": "u-7" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        let provider = HttpIdentityProvider::new(HttpClient::new().unwrap(), base_url(&server));

        let identity = provider.signup("grace@example.org", "pw").await.unwrap();
        assert_eq!(identity.uid, "u-7");
        assert_eq!(identity.email, "grace@example.org");
    }

    #[tokio::test]
    async fn test_logout_clears_session_when_server_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/logout"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let session = Identity {
            uid: "u-1".into(),
            email: "ada@example.org".into(),
            token: Some("abc".into()),
        };
        let provider = HttpIdentityProvider::with_session(
            HttpClient::new().unwrap(),
            base_url(&server),
            Some(session),
        );

        provider.logout().await.unwrap();
        assert!(provider.current_user().await.is_none());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({ "error": "Invalid email or password" })),
            )
            .mount(&server)
            .await;
        let provider = HttpIdentityProvider::new(HttpClient::new().unwrap(), base_url(&server));
        let err = provider.login("a@b.c", "wrong").await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::AuthenticationFailed(ref m) if m == "Invalid email or password"
        ));
        assert!(provider.current_user().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_credentials_rejected_locally() {
        let base = Url::parse("http://127.0.0.1:9").unwrap();
        let provider = HttpIdentityProvider::new(HttpClient::new().unwrap(), base);
        assert!(provider.signup("  ", "pw").await.is_err());
    }
}
