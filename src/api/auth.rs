//! Basic-auth header construction.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::config::Credentials;
use crate::error::{AmplitudeError, Result};

/// `Basic base64(api_key:secret_key)`
pub fn basic_auth_value(credentials: &Credentials) -> String {
    let pair = format!("{}:{}", credentials.api_key(), credentials.secret_key());
    format!("Basic {}", BASE64.encode(pair))
}

/// Headers sent with every Amplitude request.
pub fn auth_headers(credentials: &Credentials) -> Result<HeaderMap> {
    let mut auth = HeaderValue::from_str(&basic_auth_value(credentials)).map_err(|_| {
        AmplitudeError::config("credentials contain characters not allowed in a header")
    })?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_auth_value() {
        let creds = Credentials::new("k", "s").unwrap();
        // base64("k:s")
        assert_eq!(basic_auth_value(&creds), "Basic azpz");
    }

    #[test]
    fn test_auth_headers() {
        let creds = Credentials::new("api", "secret").unwrap();
        let headers = auth_headers(&creds).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Basic YXBpOnNlY3JldA==");
        assert!(headers[AUTHORIZATION].is_sensitive());
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }
}
