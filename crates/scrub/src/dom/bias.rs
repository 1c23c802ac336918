// ABOUTME: Immutable weight tables used by the boilerplate scorer.
// ABOUTME: Class/id token biases, child-tag biases, image buckets and ancestry penalties.

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-\d]+").unwrap());

const TOKEN_BIAS: &[(&str, i32)] = &[
    ("ad", -500),
    ("ads", -500),
    ("advert", -500),
    ("article", 500),
    ("banner", -300),
    ("body", 500),
    ("comment", -500),
    ("comments", -500),
    ("content", 500),
    ("contentpane", 500),
    ("entry", 200),
    ("footer", -300),
    ("gutter", -300),
    ("header", -100),
    ("left", -50),
    ("main", 500),
    ("menu", -200),
    ("meta", -50),
    ("nav", -200),
    ("navbar", -200),
    ("newsarticle", 500),
    ("page", 200),
    ("post", 300),
    ("promo", -100),
    ("rail", -300),
    ("rel", -50),
    ("relate", -500),
    ("related", -500),
    ("right", -50),
    ("share", -200),
    ("sidebar", -300),
    ("social", -200),
    ("sponsor", -300),
    ("story", 100),
    ("storytxt", 500),
    ("text", 100),
    ("tool", -200),
    ("tools", -200),
    ("widget", -200),
    ("zone", -50),
];

const TAG_BIAS: &[(&str, i32)] = &[
    ("a", -5),
    ("address", -3),
    ("article", 30),
    ("aside", -50),
    ("blockquote", 20),
    ("br", 3),
    ("button", -100),
    ("dd", -3),
    ("div", -50),
    ("dl", -10),
    ("dt", -3),
    ("figcaption", 10),
    ("figure", 10),
    ("footer", -20),
    ("form", -20),
    ("h1", 10),
    ("h2", 10),
    ("h3", 10),
    ("h4", 10),
    ("h5", 10),
    ("h6", 10),
    ("header", -5),
    ("li", -5),
    ("nav", -100),
    ("ol", -20),
    ("p", 10),
    ("pre", 10),
    ("section", -20),
    ("ul", -20),
];

/// Area thresholds (exclusive lower bound in px²) and their scores, largest first.
const IMAGE_AREA_BINS: &[(u64, i32)] = &[(100_000, 60), (50_000, 30), (10_000, 20)];

const CHROME_TAGS: &[&str] = &["nav", "aside", "header", "footer", "menu"];

/// Every constant the scorer consults. Build once and pass by reference.
#[derive(Debug, Clone)]
pub struct ScoringWeights {
    pub token_bias: HashMap<String, i32>,
    pub tag_bias: HashMap<String, i32>,
    pub image_area_bins: Vec<(u64, i32)>,
    /// Score for a known area below every bin.
    pub image_area_floor: i32,
    pub alt_bonus: i32,
    pub title_bonus: i32,
    pub caption_bonus: i32,
    /// Applied per image beyond the first.
    pub extra_image_penalty: i32,
    pub list_item_penalty: i32,
    pub chrome_penalty: i32,
    pub chrome_tags: Vec<String>,
    pub text_weight: f64,
    pub link_text_weight: f64,
    /// A table cell is only a candidate when it holds at least this share of the
    /// body's text; smaller cells are data, not layout.
    pub cell_min_text_share: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            token_bias: TOKEN_BIAS.iter().map(|&(k, v)| (k.to_string(), v)).collect(),
            tag_bias: TAG_BIAS.iter().map(|&(k, v)| (k.to_string(), v)).collect(),
            image_area_bins: IMAGE_AREA_BINS.to_vec(),
            image_area_floor: -10,
            alt_bonus: 20,
            title_bonus: 30,
            caption_bonus: 100,
            extra_image_penalty: -50,
            list_item_penalty: -200,
            chrome_penalty: -500,
            chrome_tags: CHROME_TAGS.iter().map(|t| t.to_string()).collect(),
            text_weight: 0.25,
            link_text_weight: 0.7,
            cell_min_text_share: 0.5,
        }
    }
}

impl ScoringWeights {
    /// Sum of token weights over the distinct tokens in the given attribute values.
    pub fn attribute_bias<'a, I>(&self, values: I) -> i32
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tokens = BTreeSet::new();
        for value in values {
            for token in TOKEN_SPLIT_RE.split(value) {
                if !token.is_empty() {
                    tokens.insert(token.to_lowercase());
                }
            }
        }
        tokens
            .iter()
            .filter_map(|t| self.token_bias.get(t))
            .sum()
    }

    pub fn tag_bias(&self, tag: &str) -> i32 {
        self.tag_bias.get(tag).copied().unwrap_or(0)
    }

    /// Bucket score for a pixel area; unknown area scores zero.
    pub fn image_area_score(&self, area: Option<u64>) -> i32 {
        let Some(area) = area else {
            return 0;
        };
        self.image_area_bins
            .iter()
            .find(|(threshold, _)| area > *threshold)
            .map(|&(_, score)| score)
            .unwrap_or(self.image_area_floor)
    }

    pub fn is_chrome_tag(&self, tag: &str) -> bool {
        self.chrome_tags.iter().any(|t| t == tag)
    }
}
