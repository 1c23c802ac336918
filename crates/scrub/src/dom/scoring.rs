// ABOUTME: Boilerplate scorer that picks the single best main-content subtree.
// ABOUTME: Sums text, child-tag, attribute, image and ancestry biases, then prunes everything unrelated.

use super::bias::ScoringWeights;
use super::index::PreorderIndex;
use super::tree::{Document, NodeId};
use super::utils::{condense_whitespace, parse_px};

/// Tags considered for main-content status.
pub const CANDIDATE_TAGS: &[&str] = &[
    "article", "content", "div", "layer", "main", "section", "span", "td",
];

/// Result of one scoring pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub best: NodeId,
    pub score: f64,
    pub candidates: usize,
    /// Nodes detached by pruning; zero when annotating.
    pub pruned: usize,
}

fn condensed_len(text: &str) -> usize {
    condense_whitespace(text).trim().chars().count()
}

fn text_bias(doc: &Document, id: NodeId, weights: &ScoringWeights) -> f64 {
    let text_len = condensed_len(&doc.text_content(id));
    let link_len: usize = doc
        .select(id, &["a"])
        .into_iter()
        .filter(|&a| !doc.ancestors(a).take_while(|&p| p != id).any(|p| doc.is_tag(p, "a")))
        .map(|a| condensed_len(&doc.text_content(a)))
        .sum();
    weights.text_weight * text_len as f64 - weights.link_text_weight * link_len as f64
}

fn child_tag_bias(doc: &Document, id: NodeId, weights: &ScoringWeights) -> i32 {
    doc.element_children(id)
        .filter_map(|c| doc.tag(c))
        .map(|t| weights.tag_bias(t))
        .sum()
}

fn ancestry_penalty(doc: &Document, id: NodeId, weights: &ScoringWeights) -> i32 {
    let mut penalty = 0;
    if doc.has_ancestor(id, &["li"]) {
        penalty += weights.list_item_penalty;
    }
    let in_chrome = doc
        .ancestors(id)
        .filter_map(|a| doc.tag(a))
        .any(|t| weights.is_chrome_tag(t));
    if in_chrome {
        penalty += weights.chrome_penalty;
    }
    penalty
}

fn attribute_bias(doc: &Document, id: NodeId, weights: &ScoringWeights) -> i32 {
    let values = ["id", "name", "class"]
        .into_iter()
        .filter_map(|a| doc.attr(id, a));
    weights.attribute_bias(values)
}

fn dimension(doc: &Document, img: NodeId, attr: &str) -> Option<u64> {
    doc.attr(img, attr)
        .and_then(parse_px)
        .filter(|v| *v >= 0.0)
        .map(|v| v as u64)
}

fn has_caption(doc: &Document, img: NodeId) -> bool {
    doc.closest(img, &["figure"]).is_some_and(|figure| {
        doc.element_children(figure)
            .filter(|&c| doc.is_tag(c, "figcaption"))
            .any(|c| !doc.text_content(c).trim().is_empty())
    })
}

fn image_bias(doc: &Document, id: NodeId, weights: &ScoringWeights) -> i32 {
    let images: Vec<NodeId> = doc
        .element_children(id)
        .filter(|&c| doc.is_tag(c, "img"))
        .collect();

    let mut bias = 0;
    for &img in &images {
        let area = match (dimension(doc, img, "width"), dimension(doc, img, "height")) {
            (Some(w), Some(h)) => Some(w * h),
            (Some(x), None) | (None, Some(x)) => Some(x * x),
            (None, None) => None,
        };
        bias += weights.image_area_score(area);

        let has_text = |attr: &str| doc.attr(img, attr).is_some_and(|v| !v.trim().is_empty());
        if has_text("alt") {
            bias += weights.alt_bonus;
        }
        if has_text("title") {
            bias += weights.title_bonus;
        }
        if has_caption(doc, img) {
            bias += weights.caption_bonus;
        }
    }

    if images.len() > 1 {
        bias += weights.extra_image_penalty * (images.len() as i32 - 1);
    }
    bias
}

/// Composite score of one candidate.
pub fn score_candidate(doc: &Document, id: NodeId, weights: &ScoringWeights) -> f64 {
    text_bias(doc, id, weights)
        + f64::from(child_tag_bias(doc, id, weights))
        + f64::from(ancestry_penalty(doc, id, weights))
        + f64::from(attribute_bias(doc, id, weights))
        + f64::from(image_bias(doc, id, weights))
}

/// Layout cells carry most of the page; data cells only a sliver of it.
fn is_layout_cell(doc: &Document, id: NodeId, body_len: usize, weights: &ScoringWeights) -> bool {
    if body_len == 0 {
        return false;
    }
    let share = condensed_len(&doc.text_content(id)) as f64 / body_len as f64;
    share >= weights.cell_min_text_share
}

/// Score every candidate in the body and return them with the winner.
///
/// The winner starts as the document element at zero; a candidate must beat the
/// current best strictly, so ties keep the earliest in document order. Table
/// cells compete only when they look like layout cells.
pub fn find_best(
    doc: &Document,
    body: NodeId,
    weights: &ScoringWeights,
) -> (NodeId, f64, Vec<(NodeId, f64)>) {
    let mut best = doc.document_element().unwrap_or(doc.root());
    let mut best_score = 0.0;
    let mut scored = Vec::new();
    let body_len = condensed_len(&doc.text_content(body));

    for candidate in doc.select(body, CANDIDATE_TAGS) {
        if doc.is_tag(candidate, "td") && !is_layout_cell(doc, candidate, body_len, weights) {
            continue;
        }
        let score = score_candidate(doc, candidate, weights);
        if score > best_score {
            best = candidate;
            best_score = score;
        }
        scored.push((candidate, score));
    }

    (best, best_score, scored)
}

/// Score the body's candidates and, unless annotating, delete everything that is
/// neither an ancestor nor a descendant of the winner.
///
/// Returns `None` when the document has no body.
pub fn score_and_prune(
    doc: &mut Document,
    weights: &ScoringWeights,
    annotate: bool,
) -> Option<ScoreOutcome> {
    let body = doc.body()?;
    let (best, score, scored) = find_best(doc, body, weights);

    tracing::debug!(
        best = doc.tag(best).unwrap_or("#document"),
        score,
        candidates = scored.len(),
        "boilerplate winner"
    );

    if annotate {
        for (node, s) in &scored {
            doc.set_attr(*node, "data-score", format!("{:.1}", s));
        }
        doc.set_attr(best, "data-best", "true");
        return Some(ScoreOutcome {
            best,
            score,
            candidates: scored.len(),
            pruned: 0,
        });
    }

    let index = PreorderIndex::build(doc, doc.root());
    let pruned = doc.remove_where(body, |_, id| !index.related(id, best));

    Some(ScoreOutcome {
        best,
        score,
        candidates: scored.len(),
        pruned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn weights() -> ScoringWeights {
        ScoringWeights::default()
    }

    fn by_id(doc: &Document, id: &str) -> NodeId {
        doc.descendants(doc.root())
            .into_iter()
            .find(|&n| doc.attr(n, "id") == Some(id))
            .unwrap()
    }

    #[test]
    fn text_bias_penalizes_links() {
        let doc = Document::parse(r#"<span id="s">aaaa <a href="x">bbbb</a></span>"#);
        let s = by_id(&doc, "s");
        let bias = text_bias(&doc, s, &weights());
        // 9 chars total, 4 of them linked
        assert!((bias - (0.25 * 9.0 - 0.7 * 4.0)).abs() < 1e-9);
    }

    #[test]
    fn ancestry_penalties_stack() {
        let doc = Document::parse(r#"<nav><ul><li><div id="d">x</div></li></ul></nav>"#);
        let d = by_id(&doc, "d");
        assert_eq!(ancestry_penalty(&doc, d, &weights()), -700);
    }

    #[test]
    fn image_bias_counts_direct_children() {
        let doc = Document::parse(concat!(
            r#"<figure><div id="d">"#,
            r#"<img src="a" width="400" height="300" alt="a">"#,
            r#"<img src="b" width="50" title="t">"#,
            r#"</div><figcaption>Caption</figcaption></figure>"#,
        ));
        let d = by_id(&doc, "d");
        // 60 + 20 + 100, then -10 + 30 + 100, then -50 for the second image
        assert_eq!(image_bias(&doc, d, &weights()), 250);
    }

    #[test]
    fn scenario_article_beats_ad() {
        let mut doc = Document::parse(concat!(
            r#"<div class="ad">x</div>"#,
            r##"<article>Real content with <a href="#">one link</a> and more prose text "##,
            "that keeps going for a while so the article clearly wins.</article>",
        ));
        let outcome = score_and_prune(&mut doc, &weights(), false).unwrap();
        assert!(doc.is_tag(outcome.best, "article"));
        let body = doc.body().unwrap();
        assert_eq!(doc.element_children(body).count(), 1);
        assert!(doc.inner_html(body).starts_with("<article>Real content"));
    }

    #[test]
    fn ties_keep_first_in_document_order() {
        let mut doc = Document::parse(concat!(
            r#"<section id="one">same words here for both</section>"#,
            r#"<section id="two">same words here for both</section>"#,
        ));
        let outcome = score_and_prune(&mut doc, &weights(), false).unwrap();
        assert_eq!(doc.attr(outcome.best, "id"), Some("one"));
        let body = doc.body().unwrap();
        assert_eq!(doc.text_content(body), "same words here for both");
    }

    #[test]
    fn no_positive_candidate_prunes_nothing() {
        let mut doc = Document::parse(r#"<p>intro</p><div class="ad">x</div>"#);
        let before = doc.to_html();
        let outcome = score_and_prune(&mut doc, &weights(), false).unwrap();
        assert!(doc.is_tag(outcome.best, "html"));
        assert_eq!(outcome.pruned, 0);
        assert_eq!(doc.to_html(), before);
    }

    #[test]
    fn pruning_keeps_ancestor_path_and_drops_siblings() {
        let mut doc = Document::parse(concat!(
            "lead text",
            r#"<div class="rail"><p>noise</p><article id="a">"#,
            "A long enough body of article text that comfortably scores above zero.",
            "</article><p>tail</p></div>",
        ));
        score_and_prune(&mut doc, &weights(), false).unwrap();
        let body = doc.body().unwrap();
        assert_eq!(
            doc.inner_html(body),
            concat!(
                r#"<div class="rail"><article id="a">"#,
                "A long enough body of article text that comfortably scores above zero.",
                "</article></div>"
            )
        );
    }

    #[test]
    fn layout_cell_wins_over_chrome() {
        let mut doc = Document::parse(concat!(
            r#"<table><tr><td>Home News</td>"#,
            r#"<td id="main">The whole story lives in this wide layout cell of the page.</td>"#,
            r#"</tr></table>"#,
        ));
        let outcome = score_and_prune(&mut doc, &weights(), false).unwrap();
        assert_eq!(doc.attr(outcome.best, "id"), Some("main"));
        assert!(!doc.text_content(doc.body().unwrap()).contains("Home"));
    }

    #[test]
    fn data_cells_do_not_compete() {
        let mut doc = Document::parse(concat!(
            "<p>A paragraph of prose that explains the figures in the table below.</p>",
            "<p>Another paragraph that carries on with the explanation for a while.</p>",
            "<table><tr><td>Cell with some descriptive text</td><td>value</td></tr></table>",
        ));
        let before = doc.to_html();
        let outcome = score_and_prune(&mut doc, &weights(), false).unwrap();
        assert!(doc.is_tag(outcome.best, "html"));
        assert_eq!(outcome.candidates, 0);
        assert_eq!(doc.to_html(), before);
    }

    #[test]
    fn annotate_marks_without_pruning() {
        let mut doc = Document::parse(concat!(
            r#"<div class="ad">x</div>"#,
            r#"<article>Plenty of real article text for the scorer to like.</article>"#,
        ));
        let outcome = score_and_prune(&mut doc, &weights(), true).unwrap();
        assert_eq!(outcome.pruned, 0);
        assert_eq!(doc.attr(outcome.best, "data-best"), Some("true"));
        let ad = doc.select(doc.root(), &["div"])[0];
        assert!(doc.attr(ad, "data-score").is_some());
    }

    #[test]
    fn missing_body_is_noop() {
        let mut doc = Document::new();
        assert!(score_and_prune(&mut doc, &weights(), false).is_none());
    }
}
