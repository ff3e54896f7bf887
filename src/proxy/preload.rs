use crate::proxy::context::{full_body, BoxBody};
use http::header::{CACHE_CONTROL, CONTENT_TYPE};
use http::StatusCode;
use hyper::Response;

/// Mount-relative path of the synthesized preload script.
pub const SCRIPT_PATH: &str = "/__mf-preload.js";

/// Absolute src of the preload script for a given mount.
pub fn script_src(mount: &str) -> String {
    if mount == "/" {
        SCRIPT_PATH.to_string()
    } else {
        format!("{}{}", mount, SCRIPT_PATH)
    }
}

/// Classify a User-Agent as Chromium.
///
/// Chromium markers are `chrome`, `edg/`, `opr/`, `brave`; Firefox always
/// disqualifies, as does `safari` when `chrome` is absent (real Safari).
pub fn is_chromium(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    let marker = ua.contains("chrome")
        || ua.contains("edg/")
        || ua.contains("opr/")
        || ua.contains("brave");
    marker && !ua.contains("firefox") && !(ua.contains("safari") && !ua.contains("chrome"))
}

/// The synthesized client script: fetch every preload mount with GET,
/// same-origin credentials and default cache, immediately when the document
/// is already parsed, otherwise on DOMContentLoaded.
pub fn render_script(targets: &[String]) -> String {
    let urls = serde_json::to_string(targets).unwrap_or_else(|_| "[]".to_string());
    format!(
        "(function(){{var urls={};\
function prefetch(){{urls.forEach(function(u){{\
fetch(u,{{method:\"GET\",credentials:\"same-origin\",cache:\"default\"}});}});}}\
if(document.readyState===\"loading\"){{\
document.addEventListener(\"DOMContentLoaded\",prefetch);}}\
else{{prefetch();}}}})();",
        urls
    )
}

pub fn script_response(targets: &[String]) -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/javascript; charset=utf-8")
        .header(CACHE_CONTROL, "public, max-age=300")
        .body(full_body(render_script(targets)))
        .unwrap()
}
