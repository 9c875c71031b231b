//! Response security header policy.
//!
//! # Invariants
//! - `X-XSS-Protection` is emitted only when the XSS filter flag is set.
//! - CSP directives appear in the fixed order of `CSP_DIRECTIVE_ORDER` and
//!   only when their source list is non-empty.
//! - Source values are emitted verbatim; nothing is validated or rewritten.

use serde::{Deserialize, Serialize};

pub const X_XSS_PROTECTION: &str = "X-XSS-Protection";
pub const X_XSS_PROTECTION_VALUE: &str = "1; mode=block";
pub const CONTENT_SECURITY_POLICY: &str = "Content-Security-Policy";

pub const CSP_DIRECTIVE_ORDER: [&str; 7] = [
    "default-src",
    "script-src",
    "style-src",
    "img-src",
    "font-src",
    "connect-src",
    "frame-ancestors",
];

/// Security settings as loaded from configuration. Missing keys mean off/empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    pub secure_browser_xss_filter: bool,
    pub csp_default_src: Vec<String>,
    pub csp_script_src: Vec<String>,
    pub csp_style_src: Vec<String>,
    pub csp_img_src: Vec<String>,
    pub csp_font_src: Vec<String>,
    pub csp_connect_src: Vec<String>,
    pub csp_frame_ancestors: Vec<String>,
}

impl SecuritySettings {
    fn directive_sources(&self) -> [&[String]; 7] {
        [
            &self.csp_default_src,
            &self.csp_script_src,
            &self.csp_style_src,
            &self.csp_img_src,
            &self.csp_font_src,
            &self.csp_connect_src,
            &self.csp_frame_ancestors,
        ]
    }
}

/// Precomputed header values applied to every response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityHeaderPolicy {
    xss_protection: bool,
    content_security_policy: Option<String>,
}

impl SecurityHeaderPolicy {
    pub fn from_settings(settings: &SecuritySettings) -> Self {
        Self {
            xss_protection: settings.secure_browser_xss_filter,
            content_security_policy: compose_content_security_policy(settings),
        }
    }

    pub fn content_security_policy(&self) -> Option<&str> {
        self.content_security_policy.as_deref()
    }

    /// `(name, value)` pairs to set on an outgoing response.
    pub fn headers(&self) -> Vec<(&'static str, &str)> {
        let mut headers = Vec::with_capacity(2);
        if self.xss_protection {
            headers.push((X_XSS_PROTECTION, X_XSS_PROTECTION_VALUE));
        }
        if let Some(csp) = self.content_security_policy.as_deref() {
            headers.push((CONTENT_SECURITY_POLICY, csp));
        }
        headers
    }
}

/// Joins the non-empty directives with `; `. Returns `None` when no
/// directive is configured.
pub fn compose_content_security_policy(settings: &SecuritySettings) -> Option<String> {
    let parts: Vec<String> = CSP_DIRECTIVE_ORDER
        .iter()
        .zip(settings.directive_sources())
        .filter(|(_, sources)| !sources.is_empty())
        .map(|(name, sources)| format!("{name} {}", sources.join(" ")))
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn no_csp_settings_means_no_header() {
        let policy = SecurityHeaderPolicy::from_settings(&SecuritySettings::default());
        assert_eq!(policy.content_security_policy(), None);
        assert!(policy.headers().is_empty());
    }

    #[test]
    fn directives_follow_fixed_order_regardless_of_field_setup() {
        let settings = SecuritySettings {
            csp_frame_ancestors: strings(&["'none'"]),
            csp_script_src: strings(&["'self'", "https://cdn.example.com"]),
            csp_default_src: strings(&["'self'"]),
            ..SecuritySettings::default()
        };
        assert_eq!(
            compose_content_security_policy(&settings).as_deref(),
            Some("default-src 'self'; script-src 'self' https://cdn.example.com; frame-ancestors 'none'")
        );
    }

    #[test]
    fn all_seven_directives() {
        let settings = SecuritySettings {
            csp_default_src: strings(&["a"]),
            csp_script_src: strings(&["b"]),
            csp_style_src: strings(&["c"]),
            csp_img_src: strings(&["d"]),
            csp_font_src: strings(&["e"]),
            csp_connect_src: strings(&["f"]),
            csp_frame_ancestors: strings(&["g"]),
            ..SecuritySettings::default()
        };
        assert_eq!(
            compose_content_security_policy(&settings).as_deref(),
            Some("default-src a; script-src b; style-src c; img-src d; font-src e; connect-src f; frame-ancestors g")
        );
    }

    #[test]
    fn xss_header_only_when_enabled() {
        let enabled = SecurityHeaderPolicy::from_settings(&SecuritySettings {
            secure_browser_xss_filter: true,
            ..SecuritySettings::default()
        });
        assert_eq!(
            enabled.headers(),
            vec![(X_XSS_PROTECTION, X_XSS_PROTECTION_VALUE)]
        );
    }

    #[test]
    fn values_are_emitted_verbatim() {
        let settings = SecuritySettings {
            csp_img_src: strings(&["data:", "*"]),
            ..SecuritySettings::default()
        };
        assert_eq!(
            compose_content_security_policy(&settings).as_deref(),
            Some("img-src data: *")
        );
    }
}
