use actix_web::{
    Error as ActixError, FromRequest, HttpRequest, dev::Payload, error::ErrorUnauthorized,
    web::Data,
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::future::{Ready, ready};

use crate::config::Config;
use crate::database::models::Identity;

/// Claims of a bearer token issued by the club's identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // provider subject
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
    pub exp: usize,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        let name = if self.name.trim().is_empty() {
            self.email.clone()
        } else {
            self.name.clone()
        };
        Identity {
            subject: self.sub.clone(),
            email: self.email.clone(),
            name,
            avatar_url: self.picture.clone().filter(|p| !p.is_empty()),
        }
    }

    pub fn decode(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_ref()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
    }

    /// Signs the claims with the shared secret. Used by local tooling and tests
    /// standing in for the identity provider.
    pub fn encode(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        encode(
            &Header::new(Algorithm::HS256),
            self,
            &EncodingKey::from_secret(secret.as_ref()),
        )
    }
}

impl FromRequest for Claims {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = req
            .headers()
            .get("Authorization")
            .and_then(|header| header.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        let (Some(token), Some(config)) = (token, req.app_data::<Data<Config>>()) else {
            return ready(Err(ErrorUnauthorized(
                "Missing or invalid authorization header",
            )));
        };

        match Claims::decode(token, &config.jwt_secret) {
            Ok(claims) => ready(Ok(claims)),
            Err(e) => {
                log::debug!("Rejected bearer token: {}", e);
                ready(Err(ErrorUnauthorized("Invalid token")))
            }
        }
    }
}
