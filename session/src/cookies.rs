//! Cookie wire format.
//!
//! Reads the session cookie from `Cookie` request headers and renders
//! `Set-Cookie` response headers from [`SessionOptions`].

use crate::error::{Result, SessionError};
use crate::state::SessionOptions;
use cookie::Cookie;
use http::{header, HeaderMap, HeaderValue};
use time::{Duration, OffsetDateTime};

/// Value of the first cookie named `name` across all `Cookie` headers.
pub(crate) fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(std::result::Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

/// Build a session cookie carrying `value` with the given options.
///
/// A positive `max_age` sets `Max-Age`, plus `Expires` when that instant is
/// representable. A non-positive `max_age` yields an expired cookie (`Max-Age=0` and an
/// `Expires` in the past) that tells the client to discard it.
pub(crate) fn build_cookie(name: &str, value: &str, options: &SessionOptions) -> Cookie<'static> {
    let mut builder = Cookie::build((name.to_string(), value.to_string()))
        .path(options.path.clone())
        .secure(options.secure)
        .http_only(options.http_only);

    if let Some(domain) = &options.domain {
        builder = builder.domain(domain.clone());
    }
    if let Some(same_site) = options.same_site {
        builder = builder.same_site(same_site);
    }

    builder = if options.max_age > 0 {
        let max_age = Duration::seconds(options.max_age);
        // Expires is dropped when it would fall past year 9999; Max-Age
        // still carries the lifetime.
        match OffsetDateTime::now_utc().checked_add(max_age) {
            Some(expires) => builder.max_age(max_age).expires(expires),
            None => builder.max_age(max_age),
        }
    } else {
        builder
            .max_age(Duration::ZERO)
            .expires(OffsetDateTime::UNIX_EPOCH)
    };

    builder.build()
}

/// Append a `Set-Cookie` header.
///
/// # Errors
///
/// Returns `SessionError::Encoding` if the rendered cookie is not a valid
/// header value.
pub(crate) fn write_cookie(headers: &mut HeaderMap, cookie: &Cookie<'_>) -> Result<()> {
    let value = HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| SessionError::Encoding(format!("Invalid Set-Cookie header: {e}")))?;
    headers.append(header::SET_COOKIE, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cookie::SameSite;

    #[test]
    fn test_read_cookie_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark; lang=en"));
        headers.append(header::COOKIE, HeaderValue::from_static("_session=abc; _session=def"));

        assert_eq!(read_cookie(&headers, "_session").as_deref(), Some("abc"));
        assert_eq!(read_cookie(&headers, "lang").as_deref(), Some("en"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_build_cookie_attributes() {
        let options = SessionOptions::default()
            .with_domain("example.com")
            .with_secure(true)
            .with_same_site(Some(SameSite::Strict))
            .with_max_age(3600);

        let cookie = build_cookie("_session", "value", &options);

        assert_eq!(cookie.name(), "_session");
        assert_eq!(cookie.value(), "value");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(3600)));
    }

    #[test]
    fn test_expired_cookie() {
        let options = SessionOptions::default().with_max_age(-1);
        let cookie = build_cookie("_session", "", &options);

        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        assert_eq!(cookie.expires_datetime(), Some(OffsetDateTime::UNIX_EPOCH));
    }

    #[test]
    fn test_far_future_max_age_omits_expires() {
        let options = SessionOptions::default().with_max_age(400_000_000_000);
        let cookie = build_cookie("_session", "value", &options);

        assert_eq!(cookie.max_age(), Some(Duration::seconds(400_000_000_000)));
        assert_eq!(cookie.expires(), None);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_write_cookie_appends() {
        let mut headers = HeaderMap::new();
        let options = SessionOptions::default();
        write_cookie(&mut headers, &build_cookie("a", "1", &options)).unwrap();
        write_cookie(&mut headers, &build_cookie("b", "2", &options)).unwrap();

        let values: Vec<_> = headers.get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(values.len(), 2);
        assert!(values[0].to_str().unwrap().starts_with("a=1"));
    }
}
