// src/models/auth.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Identidade do administrador, vinda do provedor de identidade federado
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminIdentity {
    #[schema(example = "google-oauth2|1029384756")]
    pub id: String,
    #[schema(example = "admin@example.com")]
    pub email: String,
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (ID do administrador)
    #[serde(default)]
    pub email: String,
    pub exp: usize, // Expiration time (quando o token expira)
    pub iat: usize, // Issued At (quando o token foi criado)
}
