use actix_web::{
    dev::Payload,
    http::header::{HeaderMap, AUTHORIZATION},
    web, FromRequest, HttpRequest,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::{config::Configuration, error::Error, error_code::ErrorCode, repo::UserId};

const ISSUER: &str = "tubely-access";

#[derive(Debug, thiserror::Error)]
pub(crate) enum AuthError {
    #[error("Missing Authorization header")]
    MissingAuthorization,

    #[error("Authorization header is not a bearer token")]
    InvalidAuthorization,

    #[error("Access token is invalid")]
    Token(#[source] jsonwebtoken::errors::Error),

    #[error("Access token subject is not a user ID")]
    Subject(#[source] uuid::Error),

    #[error("Access token secret is not configured")]
    MissingSecret,
}

impl AuthError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingAuthorization => ErrorCode::MISSING_AUTHORIZATION,
            Self::InvalidAuthorization => ErrorCode::INVALID_AUTHORIZATION,
            Self::Token(_) | Self::Subject(_) => ErrorCode::INVALID_TOKEN,
            Self::MissingSecret => ErrorCode::UNKNOWN_ERROR,
        }
    }

    pub(crate) const fn is_unauthorized(&self) -> bool {
        !matches!(self, Self::MissingSecret)
    }
}

#[derive(Debug, serde::Deserialize, serde::Serialize)]
struct Claims {
    iss: String,
    sub: String,
    iat: i64,
    exp: i64,
}

/// The user a request's bearer token was issued to
#[derive(Clone, Copy, Debug)]
pub(crate) struct Authenticated(pub(crate) UserId);

impl FromRequest for Authenticated {
    type Error = Error;
    type Future = std::future::Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        std::future::ready(authenticate(req).map_err(Error::from))
    }
}

pub(crate) fn authenticate(req: &HttpRequest) -> Result<Authenticated, AuthError> {
    let config = req
        .app_data::<web::Data<Configuration>>()
        .ok_or(AuthError::MissingSecret)?;

    let token = bearer_token(req.headers())?;

    let user_id = validate_token(token, &config.server.jwt_secret)?;

    Ok(Authenticated(user_id))
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthorization)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorization)?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AuthError::InvalidAuthorization)?;

    if token.is_empty() {
        return Err(AuthError::InvalidAuthorization);
    }

    Ok(token)
}

pub(crate) fn validate_token(token: &str, secret: &str) -> Result<UserId, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);

    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(AuthError::Token)?;

    let uuid = data.claims.sub.parse().map_err(AuthError::Subject)?;

    Ok(UserId::from_uuid(uuid))
}

#[cfg(test)]
pub(crate) fn issue_token(user_id: UserId, secret: &str, expires_in: i64) -> String {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();

    let claims = Claims {
        iss: String::from(ISSUER),
        sub: user_id.to_string(),
        iat: now,
        exp: now + expires_in,
    };

    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Encoded token")
}

#[cfg(test)]
mod tests {
    use actix_web::http::header::{HeaderMap, HeaderValue, AUTHORIZATION};

    use crate::repo::UserId;

    use super::{bearer_token, issue_token, validate_token, AuthError};

    #[test]
    fn valid_tokens_name_their_user() {
        let user_id = UserId::from_uuid(uuid::Uuid::new_v4());
        let token = issue_token(user_id, "secret", 3600);

        assert_eq!(
            validate_token(&token, "secret").expect("Valid token"),
            user_id
        );
    }

    #[test]
    fn wrong_secret_and_expired_tokens_fail() {
        let user_id = UserId::from_uuid(uuid::Uuid::new_v4());

        let token = issue_token(user_id, "secret", 3600);
        assert!(matches!(
            validate_token(&token, "other-secret"),
            Err(AuthError::Token(_))
        ));

        let expired = issue_token(user_id, "secret", -3600);
        assert!(matches!(
            validate_token(&expired, "secret"),
            Err(AuthError::Token(_))
        ));
    }

    #[test]
    fn bearer_header_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            bearer_token(&headers),
            Err(AuthError::MissingAuthorization)
        ));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(
            bearer_token(&headers),
            Err(AuthError::InvalidAuthorization)
        ));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(matches!(
            bearer_token(&headers),
            Err(AuthError::InvalidAuthorization)
        ));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).expect("Token present"), "abc.def.ghi");
    }
}
