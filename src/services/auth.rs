// src/services/auth.rs

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::{
    common::error::AppError,
    models::auth::{AdminIdentity, Claims},
};

/// Valida os tokens emitidos pelo provedor de identidade dos administradores.
/// O serviço não emite tokens: login e cadastro ficam fora daqui.
#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    pub fn validate_token(&self, token: &str) -> Result<AdminIdentity, AppError> {
        let validation = Validation::new(Algorithm::HS256);
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|e| {
            tracing::debug!(error = %e, "token rejeitado");
            AppError::InvalidToken
        })?;

        let claims = token_data.claims;
        if claims.sub.trim().is_empty() {
            return Err(AppError::InvalidToken);
        }

        Ok(AdminIdentity { id: claims.sub, email: claims.email })
    }
}
