//! Shareable location of the current article.
//!
//! The link is a navigation fragment such as `#action=knowledge?article_id=5`:
//! a base path, then a form-encoded query carrying `article_id`.

use url::form_urlencoded;

pub const ARTICLE_ID_PARAM: &str = "article_id";

/// Fragment used when no link was supplied.
pub const DEFAULT_FRAGMENT: &str = "#action=knowledge";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLink {
    fragment: String,
}

impl Default for DeepLink {
    fn default() -> Self {
        Self::parse(DEFAULT_FRAGMENT)
    }
}

impl DeepLink {
    /// Accepts the fragment with or without its leading `#`.
    pub fn parse(fragment: &str) -> Self {
        let trimmed = fragment.trim();
        let fragment = if trimmed.starts_with('#') {
            trimmed.to_string()
        } else {
            format!("#{trimmed}")
        };
        Self { fragment }
    }

    pub fn as_str(&self) -> &str {
        &self.fragment
    }

    fn split(&self) -> (&str, &str) {
        let body = &self.fragment[1..];
        body.split_once('?').unwrap_or((body, ""))
    }

    /// First value of `key` in the fragment query.
    pub fn param(&self, key: &str) -> Option<String> {
        let (_, query) = self.split();
        form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Article id carried by the link. Non-numeric values are ignored.
    pub fn article_id(&self) -> Option<i64> {
        self.param(ARTICLE_ID_PARAM)?.trim().parse().ok()
    }

    /// Set `key`, replacing the first occurrence in place and dropping any
    /// duplicates. Other parameters keep their order.
    pub fn set_param(&mut self, key: &str, value: &str) {
        let (base, query) = self.split();
        let mut replaced = false;
        let mut pairs: Vec<(String, String)> = Vec::new();
        for (k, v) in form_urlencoded::parse(query.as_bytes()) {
            if k == key {
                if !replaced {
                    pairs.push((k.into_owned(), value.to_string()));
                    replaced = true;
                }
            } else {
                pairs.push((k.into_owned(), v.into_owned()));
            }
        }
        if !replaced {
            pairs.push((key.to_string(), value.to_string()));
        }

        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.fragment = format!("#{base}?{encoded}");
    }

    pub fn set_article_id(&mut self, id: i64) {
        self.set_param(ARTICLE_ID_PARAM, &id.to_string());
    }
}
