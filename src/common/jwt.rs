use crate::common::types::{CommonError, CommonResult};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,   // Service account email
    pub scope: String, // Space separated OAuth scopes
    pub aud: String,   // Token endpoint
    pub iat: i64,      // Issued at timestamp
    pub exp: i64,      // Expiry timestamp
}

impl AssertionClaims {
    pub fn new(client_email: &str, scope: &str, token_uri: &str, issued_at: i64) -> Self {
        Self {
            iss: client_email.to_string(),
            scope: scope.to_string(),
            aud: token_uri.to_string(),
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct JwtHeader {
    alg: String,
    typ: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<String>, // Service account private key id
}

/// Builds an RS256 signed assertion for the JWT bearer grant.
pub fn sign_assertion(
    claims: &AssertionClaims,
    private_key_pem: &str,
    key_id: Option<&str>,
) -> CommonResult<String> {
    let header = JwtHeader {
        alg: "RS256".to_string(),
        typ: "JWT".to_string(),
        kid: key_id.map(str::to_string),
    };

    let header_json = serde_json::to_string(&header)?;
    let claims_json = serde_json::to_string(claims)?;

    let header_b64 = URL_SAFE_NO_PAD.encode(header_json.as_bytes());
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims_json.as_bytes());

    let message = format!("{header_b64}.{claims_b64}");

    let mut hasher = Sha256::new();
    hasher.update(message.as_bytes());
    let hash = hasher.finalize();

    let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
        .map_err(|e| CommonError::Authentication(format!("Invalid service account key: {e}")))?;

    let signature = private_key
        .sign(Pkcs1v15Sign::new::<Sha256>(), &hash)
        .map_err(|e| CommonError::Authentication(format!("Failed to sign assertion: {e}")))?;

    let signature_b64 = URL_SAFE_NO_PAD.encode(signature);

    Ok(format!("{message}.{signature_b64}"))
}
