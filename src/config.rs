use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Sentinel stored under [`Resources::opt_out_key`] when the visitor opted out.
pub const OPT_OUT_MARKER: &str = include_str!("opt_out_marker.txt");

/// Immutable table of every text, URL and size the widget renders or emits.
///
/// The defaults are the canonical deployment; any subset can be overridden
/// from JSON with [`Resources::from_json_str`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    pub policy_url: String,
    pub policy_title: String,
    pub policy_title_cookies: String,
    pub text_prefix: String,
    pub text_prefix_cookies: String,
    pub text_suffix: String,

    pub stats_on_label: String,
    pub stats_off_label: String,
    pub stats_suffix: String,
    pub reload_prompt: String,

    pub tracker_server: String,
    pub tracker_script_path: String,
    pub tracker_server_attr: String,
    pub tracker_site_attr: String,

    pub opt_out_key: String,
    pub opt_out_value: String,

    /// Data attribute on the hosting script tag carrying the site identifier.
    pub site_id_attr: String,
    /// File name the widget is served under; used to find hosting tags in a page.
    pub script_name: String,

    pub border_size: String,
    pub small_space: String,
    pub large_space: String,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            policy_url: "https://inform.everyone.wtf".to_string(),
            policy_title: "my Privacy Policy and Imprint".to_string(),
            policy_title_cookies: "my Privacy Policy, Imprint and Cookie Policy".to_string(),
            text_prefix: "For legal reasons I must link ".to_string(),
            text_prefix_cookies: "This site makes use of cookies for essential features. "
                .to_string(),
            text_suffix: ". ".to_string(),
            stats_on_label: "Opt-Out of Stats".to_string(),
            stats_off_label: "Undo Opt-Out of Stats".to_string(),
            stats_suffix: ". ".to_string(),
            reload_prompt: "Your opt-out has been saved. To complete the opt-out, please reload the page. \n\nClick 'OK' to reload the page now. \nClick 'Cancel' to keep browsing and apply the preference when next reloading the page. ".to_string(),
            tracker_server: "https://track.everyone.wtf".to_string(),
            tracker_script_path: "/tracker.js".to_string(),
            tracker_server_attr: "data-ackee-server".to_string(),
            tracker_site_attr: "data-ackee-domain-id".to_string(),
            opt_out_key: "wtf.track.everyone.old.photos".to_string(),
            opt_out_value: OPT_OUT_MARKER.to_string(),
            site_id_attr: "data-site-id".to_string(),
            script_name: "legal.js".to_string(),
            border_size: "1px".to_string(),
            small_space: "5px".to_string(),
            large_space: "10px".to_string(),
        }
    }
}

impl Resources {
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).context("failed to parse resource table")
    }

    pub fn tracker_script_url(&self) -> String {
        format!("{}{}", self.tracker_server, self.tracker_script_path)
    }

    /// Link title, depending on whether the cookie notice is shown.
    pub fn policy_title(&self, cookies: bool) -> &str {
        if cookies {
            &self.policy_title_cookies
        } else {
            &self.policy_title
        }
    }

    /// Text placed before the policy link.
    pub fn prefix(&self, cookies: bool) -> String {
        if cookies {
            format!("{}{}", self.text_prefix_cookies, self.text_prefix)
        } else {
            self.text_prefix.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let res = Resources::from_json_str(
            r#"{"policy_url":"https://example.com/legal","tracker_server":"https://stats.example.com"}"#,
        )
        .unwrap();
        assert_eq!(res.policy_url, "https://example.com/legal");
        assert_eq!(res.tracker_script_url(), "https://stats.example.com/tracker.js");
        assert_eq!(res.opt_out_key, Resources::default().opt_out_key);
        assert_eq!(res.opt_out_value, OPT_OUT_MARKER);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(Resources::from_json_str("{not json").is_err());
    }

    #[test]
    fn cookie_variant_extends_prefix_and_title() {
        let res = Resources::default();
        assert_eq!(res.prefix(false), "For legal reasons I must link ");
        assert_eq!(
            res.prefix(true),
            "This site makes use of cookies for essential features. For legal reasons I must link "
        );
        assert_eq!(
            res.policy_title(true),
            "my Privacy Policy, Imprint and Cookie Policy"
        );
    }

    #[test]
    fn marker_is_stable() {
        assert!(OPT_OUT_MARKER.starts_with("When in the Course of human events"));
        assert!(OPT_OUT_MARKER.ends_with("our sacred Honor."));
    }
}
