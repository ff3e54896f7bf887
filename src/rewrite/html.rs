use crate::proxy::preload;
use crate::rewrite::assets::AssetPrefixSet;
use crate::rewrite::headers::is_mount_scoped;
use lol_html::errors::RewritingError;
use lol_html::html_content::{ContentType, Element};
use lol_html::{element, rewrite_str, RewriteStrSettings};
use std::cell::Cell;

/// Attributes eligible for mount rewriting. This is a closed set.
const REWRITE_ATTRS: &[&str] = &[
    "href",
    "src",
    "poster",
    "content",
    "action",
    "cite",
    "formaction",
    "manifest",
    "ping",
    "archive",
    "code",
    "codebase",
    "data",
    "url",
    "srcset",
    "data-src",
    "data-href",
    "data-url",
    "data-srcset",
    "data-background",
    "data-image",
    "data-link",
    "data-poster",
    "data-video",
    "data-audio",
    "component-url",
    "astro-component-url",
    "sveltekit-url",
    "renderer-url",
    "background",
    "xlink:href",
];

const SMOOTH_TRANSITIONS_CSS: &str = "\
@supports (view-transition-name: none) {
  ::view-transition-old(root),
  ::view-transition-new(root) {
    animation-duration: 0.3s;
    animation-timing-function: ease-in-out;
  }
  main { view-transition-name: main-content; }
  nav { view-transition-name: navigation; }
}";

pub struct HtmlRewriteOptions<'a> {
    pub mount: &'a str,
    pub assets: &'a AssetPrefixSet,
    pub smooth_transitions: bool,
    pub preload_targets: &'a [String],
    /// Whether the requesting browser was classified as Chromium; selects
    /// speculation rules over the deferred preload script.
    pub chromium: bool,
}

/// Run the streaming HTML transformation.
///
/// Handlers fire in registration order on each element: attribute
/// rewriting, head script/base prepend, smooth-transitions style append,
/// then speculation rules (head) or the deferred preload script (body).
/// Every injector is one-shot — only the first matching element receives
/// its markup.
pub fn rewrite_html(html: &str, opts: &HtmlRewriteOptions<'_>) -> Result<String, RewritingError> {
    let head_injected = Cell::new(false);
    let style_injected = Cell::new(false);
    let preload_injected = Cell::new(false);

    let head_markup = head_injection(opts.mount);
    let style_markup = opts
        .smooth_transitions
        .then(|| format!("<style>{}</style>", SMOOTH_TRANSITIONS_CSS));
    let (rules_markup, script_markup) = if opts.preload_targets.is_empty() {
        (None, None)
    } else if opts.chromium {
        (Some(speculation_rules(opts.preload_targets)), None)
    } else {
        (None, Some(preload_script_tag(opts.mount)))
    };

    let mut handlers = vec![
        element!("*", |el| {
            rewrite_element(el, opts.mount, opts.assets)?;
            Ok(())
        }),
        element!("head", |el| {
            if !head_injected.get() {
                head_injected.set(true);
                el.prepend(&head_markup, ContentType::Html);
            }
            Ok(())
        }),
    ];
    if let Some(markup) = &style_markup {
        handlers.push(element!("head", |el| {
            if !style_injected.get() {
                style_injected.set(true);
                el.append(markup, ContentType::Html);
            }
            Ok(())
        }));
    }
    if let Some(markup) = &rules_markup {
        handlers.push(element!("head", |el| {
            if !preload_injected.get() {
                preload_injected.set(true);
                el.append(markup, ContentType::Html);
            }
            Ok(())
        }));
    }
    if let Some(markup) = &script_markup {
        handlers.push(element!("body", |el| {
            if !preload_injected.get() {
                preload_injected.set(true);
                el.append(markup, ContentType::Html);
            }
            Ok(())
        }));
    }

    let result = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::default()
        },
    );
    result
}

fn rewrite_element(
    el: &mut Element<'_, '_>,
    mount: &str,
    assets: &AssetPrefixSet,
) -> Result<(), lol_html::errors::AttributeNameError> {
    // Favicons live outside the asset roots, so <link rel*=icon> is scoped
    // unconditionally.
    if el.tag_name() == "link" && is_icon_link(el) {
        if let Some(href) = el.get_attribute("href") {
            if href.starts_with('/') && !is_mount_scoped(&href, mount) {
                el.set_attribute("href", &format!("{}{}", mount, href))?;
            }
        }
    }

    for name in REWRITE_ATTRS {
        let Some(value) = el.get_attribute(name) else {
            continue;
        };
        let rewritten = if *name == "srcset" {
            rewrite_srcset(&value, mount, assets)
        } else {
            rewrite_path_attr(&value, mount, assets)
        };
        if let Some(new_value) = rewritten {
            el.set_attribute(name, &new_value)?;
        }
    }
    Ok(())
}

fn is_icon_link(el: &Element<'_, '_>) -> bool {
    el.get_attribute("rel")
        .map(|rel| {
            let rel = rel.to_ascii_lowercase();
            rel.contains("icon") || rel.contains("shortcut")
        })
        .unwrap_or(false)
}

/// Mount-scope an attribute value. Returns `None` when the value is left
/// alone: relative, already mount-scoped, or outside the asset roots.
fn rewrite_path_attr(value: &str, mount: &str, assets: &AssetPrefixSet) -> Option<String> {
    if value.starts_with('/') && !is_mount_scoped(value, mount) && assets.matches(value) {
        Some(format!("{}{}", mount, value))
    } else {
        None
    }
}

fn rewrite_srcset(value: &str, mount: &str, assets: &AssetPrefixSet) -> Option<String> {
    let mut changed = false;
    let candidates: Vec<String> = value
        .split(',')
        .map(|candidate| {
            let candidate = candidate.trim();
            let (url, descriptor) = match candidate.split_once(char::is_whitespace) {
                Some((url, rest)) => (url, Some(rest.trim())),
                None => (candidate, None),
            };
            if url.starts_with('/') && !is_mount_scoped(url, mount) && assets.matches(url) {
                changed = true;
                match descriptor {
                    Some(d) => format!("{}{} {}", mount, url, d),
                    None => format!("{}{}", mount, url),
                }
            } else {
                candidate.to_string()
            }
        })
        .collect();
    changed.then(|| candidates.join(", "))
}

/// Markup prepended to `<head>`: the base-path global, the fetch wrapper
/// translating `workerstack://` URLs, and the `<base>` element.
fn head_injection(mount: &str) -> String {
    let mount_json = serde_json::Value::String(mount.to_string()).to_string();
    let base_href = if mount == "/" {
        "/".to_string()
    } else {
        format!("{}/", mount)
    };
    let base_json = serde_json::Value::String(base_href.clone()).to_string();

    let mut out = String::new();
    out.push_str("<script>window.__BASE_PATH__ = ");
    out.push_str(&mount_json);
    out.push_str(";(function(){var scheme=\"workerstack://\";var base=");
    out.push_str(&base_json);
    out.push_str(
        ";var nativeFetch=globalThis.fetch.bind(globalThis);\
globalThis.fetch=function(input,init){\
if(typeof input===\"string\"&&input.indexOf(scheme)===0){\
return nativeFetch(base+input.slice(scheme.length),init);}\
if(input instanceof Request&&input.url.indexOf(scheme)===0){\
return nativeFetch(new Request(base+input.url.slice(scheme.length),input),init);}\
return nativeFetch(input,init);};})();</script>",
    );
    out.push_str(&format!("<base href=\"{}\">", base_href));
    out
}

fn speculation_rules(targets: &[String]) -> String {
    let rules = serde_json::json!({ "prefetch": [ { "urls": targets } ] });
    format!("<script type=\"speculationrules\">{}</script>", rules)
}

fn preload_script_tag(mount: &str) -> String {
    format!("<script src=\"{}\" defer></script>", preload::script_src(mount))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<html><head><title>t</title></head><body><p>hi</p></body></html>";

    fn opts<'a>(mount: &'a str, assets: &'a AssetPrefixSet) -> HtmlRewriteOptions<'a> {
        HtmlRewriteOptions {
            mount,
            assets,
            smooth_transitions: false,
            preload_targets: &[],
            chromium: false,
        }
    }

    fn rewrite(html: &str, mount: &str) -> String {
        let assets = AssetPrefixSet::default();
        rewrite_html(html, &opts(mount, &assets)).unwrap()
    }

    #[test]
    fn test_asset_attr_scoped() {
        let out = rewrite(r#"<img src="/assets/logo.png">"#, "/app");
        assert!(out.contains(r#"src="/app/assets/logo.png""#));
    }

    #[test]
    fn test_non_asset_attr_untouched() {
        let out = rewrite(r#"<a href="/about">x</a>"#, "/app");
        assert!(out.contains(r#"href="/about""#));
    }

    #[test]
    fn test_already_scoped_attr_is_identity() {
        let out = rewrite(r#"<img src="/app/assets/logo.png">"#, "/app");
        assert!(out.contains(r#"src="/app/assets/logo.png""#));
        assert!(!out.contains("/app/app/"));
    }

    #[test]
    fn test_root_mount_leaves_attrs() {
        let out = rewrite(r#"<img src="/assets/logo.png">"#, "/");
        assert!(out.contains(r#"src="/assets/logo.png""#));
    }

    #[test]
    fn test_data_attrs_scoped() {
        let out = rewrite(r#"<div data-src="/static/x.js" data-background="/build/bg.png"></div>"#, "/app");
        assert!(out.contains(r#"data-src="/app/static/x.js""#));
        assert!(out.contains(r#"data-background="/app/build/bg.png""#));
    }

    #[test]
    fn test_srcset_candidates_scoped() {
        let out = rewrite(
            r#"<img srcset="/assets/a.png 1x,/assets/b.png 2x, /cdn/c.png 3x">"#,
            "/app",
        );
        assert!(out.contains(
            r#"srcset="/app/assets/a.png 1x, /app/assets/b.png 2x, /cdn/c.png 3x""#
        ));
    }

    #[test]
    fn test_icon_link_scoped_without_asset_prefix() {
        let out = rewrite(r#"<link rel="shortcut icon" href="/favicon.ico">"#, "/app");
        assert!(out.contains(r#"href="/app/favicon.ico""#));
    }

    #[test]
    fn test_icon_link_not_double_scoped() {
        let out = rewrite(r#"<link rel="icon" href="/app/favicon.ico">"#, "/app");
        assert!(out.contains(r#"href="/app/favicon.ico""#));
        assert!(!out.contains("/app/app/"));
    }

    #[test]
    fn test_head_injection() {
        let out = rewrite(PAGE, "/app");
        assert_eq!(out.matches("window.__BASE_PATH__").count(), 1);
        assert!(out.contains(r#"window.__BASE_PATH__ = "/app""#));
        assert!(out.contains(r#"<base href="/app/">"#));
        assert!(out.contains("workerstack://"));
    }

    #[test]
    fn test_head_injection_at_root() {
        let out = rewrite(PAGE, "/");
        assert!(out.contains(r#"window.__BASE_PATH__ = "/""#));
        assert!(out.contains(r#"<base href="/">"#));
    }

    #[test]
    fn test_smooth_transitions_style() {
        let assets = AssetPrefixSet::default();
        let mut o = opts("/app", &assets);
        o.smooth_transitions = true;
        let out = rewrite_html(PAGE, &o).unwrap();
        assert_eq!(out.matches("view-transition-name: main-content").count(), 1);

        let out = rewrite(PAGE, "/app");
        assert!(!out.contains("view-transition-name"));
    }

    #[test]
    fn test_speculation_rules_for_chromium() {
        let assets = AssetPrefixSet::default();
        let targets = vec!["/shop".to_string(), "/blog".to_string()];
        let mut o = opts("/app", &assets);
        o.preload_targets = &targets;
        o.chromium = true;
        let out = rewrite_html(PAGE, &o).unwrap();
        assert!(out.contains(r#"<script type="speculationrules">"#));
        assert!(out.contains(r#""urls":["/shop","/blog"]"#));
        assert!(!out.contains("__mf-preload.js"));
    }

    #[test]
    fn test_preload_script_for_other_browsers() {
        let assets = AssetPrefixSet::default();
        let targets = vec!["/shop".to_string()];
        let mut o = opts("/app", &assets);
        o.preload_targets = &targets;
        let out = rewrite_html(PAGE, &o).unwrap();
        assert!(out.contains(r#"<script src="/app/__mf-preload.js" defer></script>"#));
        assert!(!out.contains("speculationrules"));
    }
}
