//! `Authorization` header parsing

use axum::http::{HeaderMap, header};

use super::TokenError;

/// Extract the bearer token from request headers.
///
/// The header must be exactly two whitespace-separated parts, the first of
/// which is `Bearer` in any letter case.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, TokenError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(TokenError::Missing)?
        .to_str()
        .map_err(|_| TokenError::MalformedHeader)?;

    parse_authorization(value)
}

/// Parse an `Authorization` header value into its bearer token.
pub fn parse_authorization(value: &str) -> Result<&str, TokenError> {
    if value.trim().is_empty() {
        return Err(TokenError::Missing);
    }

    let mut parts = value.split_whitespace();
    let (Some(scheme), Some(token), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(TokenError::MalformedHeader);
    };

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(TokenError::InvalidScheme);
    }

    Ok(token)
}

/// Accept either a bare token or a full `Bearer <token>` header value.
///
/// Anything with a scheme goes through [`parse_authorization`], so the same
/// case-insensitive rules apply as on the gateway.
pub fn token_from_input(value: &str) -> Result<&str, TokenError> {
    let trimmed = value.trim();
    if trimmed.contains(char::is_whitespace) {
        return parse_authorization(trimmed);
    }
    if trimmed.is_empty() {
        return Err(TokenError::Missing);
    }
    Ok(trimmed)
}
