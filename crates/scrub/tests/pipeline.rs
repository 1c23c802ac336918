// ABOUTME: End-to-end tests for the Scrubber pipeline over realistic document fragments.
// ABOUTME: Covers extraction, tracker removal, normalization, idempotence and URL handling.

use digests_scrub::filters::attributes::allow_list_attributes;
use digests_scrub::{Document, Scrubber};
use pretty_assertions::assert_eq;
use url::Url;

const PAGE_URL: &str = "https://example.com/story";

fn scrubber() -> Scrubber {
    Scrubber::builder().probe_images(false).build()
}

async fn sanitize(html: &str) -> String {
    scrubber().sanitize_html(html, PAGE_URL).await.unwrap()
}

fn body_text(html: &str) -> String {
    let doc = Document::parse(html);
    let body = doc.body().unwrap();
    doc.text_content(body).trim().to_string()
}

#[tokio::test]
async fn keeps_only_the_article() {
    let html = concat!(
        r#"<html><body><div class="ad">x</div>"#,
        r#"<article>Real content with <a href="/more">one link</a> and more prose text that keeps going.</article>"#,
        r#"</body></html>"#,
    );
    let mut doc = Document::parse(html);
    let report = scrubber()
        .sanitize(&mut doc, &Url::parse(PAGE_URL).unwrap())
        .await;

    let extraction = report.extraction.unwrap();
    assert!(extraction.score > 0.0);
    assert!(extraction.pruned >= 1);

    let body = doc.body().unwrap();
    assert_eq!(
        doc.text_content(body),
        "Real content with one link and more prose text that keeps going."
    );
}

#[tokio::test]
async fn tracking_pixels_are_removed() {
    let out = sanitize(concat!(
        r#"<article><p>Story text that is long enough to win the scoring pass easily.</p>"#,
        r#"<img src="http://pagead2.googlesyndication.com/x.gif">"#,
        r#"<img src="https://cdn.example.com/hero.jpg" width="800" height="600" alt="hero"></article>"#,
    ))
    .await;
    assert!(!out.contains("googlesyndication"));
    assert!(out.contains(r#"src="https://cdn.example.com/hero.jpg""#));
}

#[tokio::test]
async fn adjacent_rules_collapse() {
    let out = sanitize(concat!(
        "<article><p>The first half of a story with enough words.</p>",
        "<hr><hr>",
        "<p>The second half of the same story.</p></article>",
    ))
    .await;
    assert_eq!(out.matches("<hr>").count(), 1);
}

#[tokio::test]
async fn second_run_is_a_fixed_point() {
    let html = concat!(
        "<html><head><title>t</title></head><body>\n",
        "<nav><ul><li><a href=\"/\">Home</a></li><li><a href=\"/news\">News</a></li></ul></nav>\n",
        "<article class=\"post\">\n  <h2>Heading</h2>\n",
        "  <p>First paragraph with <b>bold</b> and <i>italic</i> words in it.</p>\n",
        "  <ul><li>one</li><li>two</li></ul>\n",
        "  <p>Second   paragraph,\n spread over lines.</p>\n",
        "</article>\n<footer>(c) example</footer>\n</body></html>",
    );
    let first = sanitize(html).await;
    let second = sanitize(&first).await;
    assert_eq!(second, first);

    assert!(first.contains("<strong>bold</strong>"));
    assert!(first.contains("<em>italic</em>"));
    assert!(!first.contains("Home"));
    assert!(!first.contains("(c) example"));
}

#[tokio::test]
async fn data_tables_survive_a_second_run() {
    let html = concat!(
        "<article><p>A long paragraph of prose that explains the data shown in the table below it.</p>",
        "<p>Another paragraph with more prose so the article is clearly the main content.</p>",
        "<table><tr><td>Cell with some descriptive text</td><td>value</td></tr></table></article>",
    );
    let first = sanitize(html).await;
    let second = sanitize(&first).await;
    assert_eq!(second, first);

    assert!(first.contains("A long paragraph of prose"));
    assert!(first.contains("<td>Cell with some descriptive text</td><td>value</td>"));
}

#[tokio::test]
async fn stray_list_content_is_kept() {
    let out = sanitize(concat!(
        "<article><p>Intro paragraph of the story, long enough to be the main content.</p>",
        "<ul><p>Important paragraph inside a sloppy list.</p></ul>",
        "<ol><li>only item</li><p>trailing sibling paragraph</p></ol></article>",
    ))
    .await;
    assert!(out.contains("Important paragraph inside a sloppy list."));
    assert!(out.contains("only item"));
    assert!(out.contains("trailing sibling paragraph"));
}

#[tokio::test]
async fn first_of_equal_candidates_wins() {
    let out = sanitize(concat!(
        "<div>Same words in both blocks of this page.</div>",
        "<div>Same words in both blocks of this page.</div>",
    ))
    .await;
    assert_eq!(out.matches("Same words").count(), 1);
}

#[tokio::test]
async fn output_attributes_are_already_allow_listed() {
    let out = sanitize(concat!(
        r#"<article id="main" class="post" style="color:red" data-x="1">"#,
        r#"<p onclick="x()" align="center">Paragraph with a <a href="/a" target="_blank" ping="/p">link</a> inside it.</p>"#,
        r#"</article>"#,
    ))
    .await;
    let mut doc = Document::parse(&out);
    assert_eq!(allow_list_attributes(&mut doc, false), 0);
    assert!(out.contains(r#"<a href="https://example.com/a" rel="noreferrer">link</a>"#));
}

#[tokio::test]
async fn absolute_urls_pass_through_unchanged() {
    let out = sanitize(concat!(
        "<article><p>Body text long enough for the article to be selected. ",
        r#"<a href="https://other.example.org/path/page.html?q=1#frag">elsewhere</a></p></article>"#,
    ))
    .await;
    assert!(out.contains(r#"href="https://other.example.org/path/page.html?q=1#frag""#));
}

#[tokio::test]
async fn base_element_is_honoured() {
    let out = sanitize(concat!(
        r#"<html><head><base href="https://cdn.example.net/assets/"></head><body>"#,
        r#"<article><p>Article text with an illustration following it.</p>"#,
        r#"<img src="pic.png" width="400" height="300" alt="pic"></article></body></html>"#,
    ))
    .await;
    assert!(out.contains(r#"src="https://cdn.example.net/assets/pic.png""#));
    assert!(!out.contains("<base"));
}

#[tokio::test]
async fn lazy_and_small_images() {
    let out = sanitize(concat!(
        "<article><p>Photo essay text describing the pictures below.</p>",
        r#"<img data-src="/big.jpg" width="600" height="400" alt="big">"#,
        r#"<img src="/tiny.png" width="10" height="10" alt="tiny">"#,
        "</article>",
    ))
    .await;
    assert!(out.contains(r#"src="https://example.com/big.jpg""#));
    assert!(!out.contains("data-src"));
    assert!(!out.contains("tiny.png"));
}

#[tokio::test]
async fn hidden_content_is_dropped() {
    let out = sanitize(concat!(
        "<article><p>Visible paragraph of the story body text.</p>",
        r#"<p style="display: none">secret one</p>"#,
        r#"<p hidden>secret two</p>"#,
        r#"<p style="opacity: 0.1">secret three</p>"#,
        r#"<p style="opacity: 0.8">faded but readable</p>"#,
        "</article>",
    ))
    .await;
    assert!(!out.contains("secret"));
    assert!(out.contains("faded but readable"));
}

#[tokio::test]
async fn framesets_become_a_body() {
    let out = sanitize(concat!(
        "<html><frameset><frame src=\"a.html\">",
        "<noframes><p>Fallback text for older browsers.</p></noframes>",
        "</frameset></html>",
    ))
    .await;
    assert!(out.contains("<p>Fallback text for older browsers.</p>"));
    assert!(!out.contains("frame"));
    assert!(out.contains("<body>"));
}

#[tokio::test]
async fn annotate_keeps_everything() {
    let scrubber = Scrubber::builder()
        .probe_images(false)
        .annotate(true)
        .build();
    let out = scrubber
        .sanitize_html(
            concat!(
                r#"<div class="ad">advert copy</div>"#,
                r#"<div class="content">The real story text of this page, long enough to win.</div>"#,
            ),
            PAGE_URL,
        )
        .await
        .unwrap();
    assert!(out.contains("advert copy"));
    assert!(out.contains(r#"data-best="true""#));
    assert!(out.contains("data-score="));
    assert!(!out.contains("class="));
}

#[tokio::test]
async fn scripts_and_forms() {
    let out = sanitize(concat!(
        "<form action=\"/search\"><article>",
        "<p>Content wrapped in a page-wide form element.</p>",
        "<input name=q><button>Go</button><script>track()</script>",
        "</article></form>",
    ))
    .await;
    assert_eq!(body_text(&out), "Content wrapped in a page-wide form element.");
    assert!(!out.contains("<form"));
}
