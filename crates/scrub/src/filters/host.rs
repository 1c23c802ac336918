// ABOUTME: Per-host structural overrides applied before boilerplate scoring.
// ABOUTME: Templates come from embedded JSON, keyed by primary and supported domains.

//! Host templates.
//!
//! A template names CSS selectors whose matches are removed or unwrapped for
//! pages on that host.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::dom::selector::CssSelector;
use crate::dom::tree::{Document, NodeId};
use crate::dom::utils::unwrap;

/// Embedded JSON containing the builtin host templates.
const BUILTIN_TEMPLATES_JSON: &str = include_str!("../../data/host_templates.json");

/// Structural overrides for one site.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct HostTemplate {
    pub domain: String,
    #[serde(default)]
    pub supported_domains: Vec<String>,
    /// Selectors whose matches are deleted with their subtrees.
    #[serde(default)]
    pub remove: Vec<String>,
    /// Selectors whose matches are replaced by their children.
    #[serde(default)]
    pub unwrap: Vec<String>,
}

/// Host templates keyed by domain.
#[derive(Debug, Default, Clone)]
pub struct HostTemplateRegistry {
    map: HashMap<String, HostTemplate>,
}

impl HostTemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a template for its primary and supported domains.
    pub fn register(&mut self, template: HostTemplate) {
        for dom in &template.supported_domains {
            self.map.insert(dom.to_ascii_lowercase(), template.clone());
        }
        self.map
            .insert(template.domain.to_ascii_lowercase(), template);
    }

    /// Exact host first, then the host without a leading `www.`.
    pub fn get(&self, host: &str) -> Option<&HostTemplate> {
        let host = host.to_ascii_lowercase();
        self.map.get(&host).or_else(|| {
            host.strip_prefix("www.")
                .and_then(|bare| self.map.get(bare))
        })
    }

    pub fn for_url(&self, url: &Url) -> Option<&HostTemplate> {
        url.host_str().and_then(|h| self.get(h))
    }

    /// Number of registered domain mappings.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Loads the builtin registry from embedded JSON.
///
/// # Panics
///
/// Panics if the embedded JSON is malformed.
pub fn load_builtin_templates() -> HostTemplateRegistry {
    let templates: Vec<HostTemplate> =
        serde_json::from_str(BUILTIN_TEMPLATES_JSON).expect("failed to parse builtin host templates");

    let mut registry = HostTemplateRegistry::new();
    for template in templates {
        registry.register(template);
    }
    registry
}

fn compile(selectors: &[String], domain: &str) -> Vec<CssSelector> {
    selectors
        .iter()
        .filter_map(|s| match CssSelector::parse(s) {
            Ok(sel) => Some(sel),
            Err(err) => {
                tracing::warn!(domain, selector = s.as_str(), error = %err, "skipping invalid selector");
                None
            }
        })
        .collect()
}

/// Apply the template registered for `url`'s host to the body.
///
/// Returns the number of nodes removed or unwrapped.
pub fn apply_host_template(doc: &mut Document, registry: &HostTemplateRegistry, url: &Url) -> usize {
    let Some(template) = registry.for_url(url) else {
        return 0;
    };
    let Some(body) = doc.body() else {
        return 0;
    };

    let removals = compile(&template.remove, &template.domain);
    let mut touched = doc.remove_where(body, |d, id| removals.iter().any(|s| s.matches(d, id)));

    for selector in compile(&template.unwrap, &template.domain) {
        let matches: Vec<NodeId> = selector.select(doc, body);
        for id in matches {
            unwrap(doc, id);
            touched += 1;
        }
    }

    tracing::debug!(domain = template.domain.as_str(), touched, "applied host template");
    touched
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_templates_load() {
        let registry = load_builtin_templates();
        assert!(!registry.is_empty());
        assert!(registry.get("en.wikipedia.org").is_some());
        assert_eq!(
            registry.get("nytimes.com").map(|t| t.domain.as_str()),
            Some("www.nytimes.com")
        );
    }

    #[test]
    fn builtin_selectors_all_parse() {
        let templates: Vec<HostTemplate> = serde_json::from_str(BUILTIN_TEMPLATES_JSON).unwrap();
        for t in templates {
            for s in t.remove.iter().chain(t.unwrap.iter()) {
                assert!(CssSelector::parse(s).is_ok(), "{} in {}", s, t.domain);
            }
        }
    }

    #[test]
    fn lookup_falls_back_to_bare_host() {
        let mut registry = HostTemplateRegistry::new();
        registry.register(HostTemplate {
            domain: "example.com".into(),
            ..Default::default()
        });
        assert!(registry.get("www.example.com").is_some());
        assert!(registry.get("blog.example.com").is_none());
    }

    #[test]
    fn apply_removes_and_unwraps() {
        let mut registry = HostTemplateRegistry::new();
        registry.register(HostTemplate {
            domain: "news.example".into(),
            supported_domains: vec![],
            remove: vec!["div.share".into()],
            unwrap: vec!["div.wrapper".into()],
        });

        let mut doc = Document::parse(
            r#"<div class="wrapper"><p>Story</p><div class="share">Tweet</div></div>"#,
        );
        let url = Url::parse("https://news.example/a").unwrap();
        let touched = apply_host_template(&mut doc, &registry, &url);
        assert_eq!(touched, 2);
        assert_eq!(doc.inner_html(doc.body().unwrap()), "<p>Story</p>");

        let other = Url::parse("https://elsewhere.example/").unwrap();
        assert_eq!(apply_host_template(&mut doc, &registry, &other), 0);
    }

    #[test]
    fn combinator_selectors_apply() {
        let mut registry = HostTemplateRegistry::new();
        registry.register(HostTemplate {
            domain: "news.example".into(),
            supported_domains: vec![],
            remove: vec!["article > p.promo".into(), "div[x".into()],
            unwrap: vec!["section .inner".into()],
        });

        let mut doc = Document::parse(concat!(
            r#"<article><p class="promo">Subscribe</p><p>Story</p>"#,
            r#"<section><div><span class="inner">kept text</span></div></section></article>"#,
            r#"<p class="promo">outside</p>"#,
        ));
        let url = Url::parse("https://news.example/a").unwrap();
        assert_eq!(apply_host_template(&mut doc, &registry, &url), 2);
        assert_eq!(
            doc.inner_html(doc.body().unwrap()),
            concat!(
                "<article><p>Story</p><section><div>kept text</div></section></article>",
                r#"<p class="promo">outside</p>"#,
            )
        );
    }
}
