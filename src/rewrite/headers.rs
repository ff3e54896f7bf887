use http::header::{HeaderValue, LOCATION, SET_COOKIE};
use http::HeaderMap;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Whether `path` is already inside the mount, so that prefixing it again
/// would double the mount.
pub fn is_mount_scoped(path: &str, mount: &str) -> bool {
    mount == "/" || (path.starts_with(mount) && path[mount.len()..].starts_with('/'))
}

/// Rewrite a redirect `Location` so same-origin absolute paths stay inside
/// the mount.
///
/// The header is resolved against the incoming request origin; when the
/// resolved origin matches, the mount is prepended to the path and the
/// serialized absolute URL written back. Unparseable values pass through
/// unchanged.
pub fn rewrite_location(headers: &mut HeaderMap, origin: &Url, mount: &str) {
    let Some(raw) = headers.get(LOCATION).and_then(|v| v.to_str().ok()) else {
        return;
    };
    let Ok(mut target) = origin.join(raw) else {
        return;
    };
    if mount != "/" && target.origin() == origin.origin() {
        let scoped = format!("{}{}", mount, target.path());
        target.set_path(&scoped);
    }
    if let Ok(value) = HeaderValue::from_str(target.as_str()) {
        headers.insert(LOCATION, value);
    }
}

fn cookie_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i);\s*path=/").expect("cookie path regex"))
}

/// Scope `Set-Cookie` paths to the mount.
///
/// Each cookie carrying a `; Path=/` segment has that first occurrence
/// replaced with `; Path=<mount>/`. The header list is rebuilt from scratch
/// so ordering is preserved. No-op at the root mount.
pub fn rewrite_set_cookie(headers: &mut HeaderMap, mount: &str) {
    if mount == "/" {
        return;
    }
    let cookies: Vec<HeaderValue> = headers.get_all(SET_COOKIE).iter().cloned().collect();
    if cookies.is_empty() {
        return;
    }

    let replacement = format!("; Path={}/", mount);
    headers.remove(SET_COOKIE);
    for cookie in cookies {
        let rewritten = cookie.to_str().ok().and_then(|text| {
            if !cookie_path_re().is_match(text) {
                return None;
            }
            let scoped = cookie_path_re().replace(text, regex::NoExpand(&replacement));
            HeaderValue::from_str(&scoped).ok()
        });
        headers.append(SET_COOKIE, rewritten.unwrap_or(cookie));
    }
}
