use crate::rewrite::assets::AssetPrefixSet;
use regex::{Captures, Regex};

/// Rewrite `url(...)` and `@import` targets that point at known asset roots
/// so they stay inside the mount.
///
/// Operates on the full stylesheet text; targets without a known asset
/// prefix are left alone. At the root mount the substitutions insert
/// nothing.
pub fn rewrite_css(css: &str, mount: &str, assets: &AssetPrefixSet) -> String {
    let alternation = assets.alternation();
    if alternation.is_empty() {
        return css.to_string();
    }
    let mount_prefix = if mount == "/" { "" } else { mount };

    let url_re = match Regex::new(&format!(r#"url\(\s*(['"]?)(/(?:{})/)"#, alternation)) {
        Ok(re) => re,
        Err(e) => {
            tracing::warn!("rewrite: css url pattern failed to compile, error={}", e);
            return css.to_string();
        }
    };
    let import_re = match Regex::new(&format!(r#"@import\s+(['"])(/(?:{})/)"#, alternation)) {
        Ok(re) => re,
        Err(e) => {
            tracing::warn!("rewrite: css import pattern failed to compile, error={}", e);
            return css.to_string();
        }
    };

    let pass = url_re.replace_all(css, |caps: &Captures| {
        format!("url({}{}{}", &caps[1], mount_prefix, &caps[2])
    });
    import_re
        .replace_all(&pass, |caps: &Captures| {
            format!("@import {}{}{}", &caps[1], mount_prefix, &caps[2])
        })
        .into_owned()
}
