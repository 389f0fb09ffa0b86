//! Django CSRF cookie handling.
//!
//! The server sets its CSRF token in a cookie named `csrftoken`; every
//! mutating request must echo it back in the `X-CSRFToken` header.

/// Name of the cookie carrying the CSRF token.
pub const CSRF_COOKIE: &str = "csrftoken";

/// Header the token is sent in.
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Look up a cookie by name in a `Cookie` header string.
///
/// The value is percent-decoded. A value that does not decode as UTF-8 is
/// returned as-is. The first matching cookie wins.
///
/// # Example
///
/// ```rust
/// use utils::csrf::get_cookie;
///
/// let header = "sessionid=abc; csrftoken=x%2By";
/// assert_eq!(get_cookie(header, "csrftoken"), Some("x+y".to_string()));
/// assert_eq!(get_cookie(header, "missing"), None);
/// ```
pub fn get_cookie(cookie_header: &str, name: &str) -> Option<String> {
    if cookie_header.trim().is_empty() || name.is_empty() {
        return None;
    }

    cookie_header
        .split(';')
        .map(str::trim)
        .find_map(|cookie| {
            cookie
                .strip_prefix(name)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .map(|raw| match urlencoding::decode(raw) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => raw.to_string(),
        })
}

/// Extract the CSRF token from a `Cookie` header string.
pub fn csrf_token_from_cookies(cookie_header: &str) -> Option<String> {
    get_cookie(cookie_header, CSRF_COOKIE)
}
