//! Web-search augmentation.
//!
//! [`SearchAugmenter`] decides whether a chat message needs live context,
//! queries an HTML search page, and pulls a short plain-text snippet from
//! every result. All failures are soft: a failed search yields `None` and a
//! failed page yields [`SNIPPET_PLACEHOLDER`], never an error for the caller.

mod format;

pub use format::format_results;

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use futures::{Stream, StreamExt};
use reqwest::{StatusCode, Url};
use scraper::{Html, Selector};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Number of results fetched when the caller does not say otherwise.
pub const DEFAULT_MAX_RESULTS: usize = 3;

/// Snippets longer than this many characters are cut and suffixed with `...`.
pub const SNIPPET_MAX_CHARS: usize = 300;

/// Snippet text used when a result page cannot be fetched or parsed.
pub const SNIPPET_PLACEHOLDER: &str = "Content not available";

/// Bytes of a result page read before the rest is ignored.
const SNIPPET_BODY_LIMIT: usize = 512 * 1024;

/// Case-insensitive substrings that mark a message as time-sensitive.
const SEARCH_KEYWORDS: &[&str] = &[
    "latest",
    "recent",
    "current",
    "today",
    "news",
    "search",
    "find",
    "what is happening",
    "what happened",
    "when did",
    "price of",
    "weather",
    "stock",
    "current events",
    "breaking news",
    "latest news",
    "recent news",
    "search for",
    "look up",
    "now",
    "currently",
    "this year",
    "this month",
    "update",
    "status",
];

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// CSS selector for organic result links on the search page.
const RESULT_LINK_SELECTOR: &str = "a.result__a";

/// One organic search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("invalid search URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// The augmentation seam used by the generation controller.
pub trait Augmenter: Send + Sync + 'static {
    /// Heuristic trigger; false positives and negatives are accepted.
    fn should_augment(&self, message: &str) -> bool {
        should_augment(message)
    }

    /// Search and extract snippets. `None` means "no augmentation".
    fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> impl Future<Output = Option<Vec<SearchResult>>> + Send;
}

/// `true` when `message` contains any of the fixed trigger keywords.
pub fn should_augment(message: &str) -> bool {
    let lower = message.to_lowercase();
    let triggered: Vec<&str> = SEARCH_KEYWORDS
        .iter()
        .copied()
        .filter(|k| lower.contains(k))
        .collect();
    if triggered.is_empty() {
        debug!("no web search keywords detected");
        false
    } else {
        debug!(keywords = ?triggered, "web search triggered");
        true
    }
}

/// HTML search client with independent timeouts for the result page and
/// each snippet page.
#[derive(Debug, Clone)]
pub struct SearchAugmenter {
    client: reqwest::Client,
    search_url: Url,
    search_timeout: Duration,
    snippet_timeout: Duration,
}

impl SearchAugmenter {
    pub fn new(
        search_url: &str,
        search_timeout: Duration,
        snippet_timeout: Duration,
    ) -> Result<Self, SearchError> {
        let search_url = Url::parse(search_url).map_err(|source| SearchError::InvalidUrl {
            url: search_url.to_owned(),
            source,
        })?;
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            search_url,
            search_timeout,
            snippet_timeout,
        })
    }

    async fn try_search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        info!(query, "starting web search");
        let resp = self
            .client
            .get(self.search_url.clone())
            .query(&[("q", query)])
            .timeout(self.search_timeout)
            .send()
            .await?;
        if resp.status() != StatusCode::OK {
            return Err(SearchError::Status(resp.status()));
        }
        let body = resp.text().await?;

        let links = parse_result_links(&body, &self.search_url, max_results);
        debug!(count = links.len(), "parsed search result links");

        let snippets = join_all(links.iter().map(|(_, url)| self.snippet(url))).await;
        Ok(links
            .into_iter()
            .zip(snippets)
            .map(|((title, url), snippet)| SearchResult {
                title,
                url,
                snippet,
            })
            .collect())
    }

    /// Best-effort snippet; every failure maps to [`SNIPPET_PLACEHOLDER`].
    async fn snippet(&self, url: &str) -> String {
        match self.fetch_snippet(url).await {
            Ok(snippet) => snippet,
            Err(e) => {
                debug!(url, error = %e, "snippet fetch failed");
                SNIPPET_PLACEHOLDER.to_owned()
            }
        }
    }

    async fn fetch_snippet(&self, url: &str) -> Result<String, SearchError> {
        let resp = self
            .client
            .get(url)
            .timeout(self.snippet_timeout)
            .send()
            .await?;
        if resp.status() != StatusCode::OK {
            return Err(SearchError::Status(resp.status()));
        }
        let body = read_capped(Box::pin(resp.bytes_stream()), SNIPPET_BODY_LIMIT).await?;
        let body = String::from_utf8_lossy(&body);
        Ok(truncate_snippet(&extract_text(&body), SNIPPET_MAX_CHARS))
    }
}

/// Collect at most `limit` bytes of a body; the stream is not polled again
/// once the limit is reached.
async fn read_capped<S, E>(mut chunks: S, limit: usize) -> Result<Vec<u8>, E>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    let mut body = Vec::new();
    while body.len() < limit {
        let Some(chunk) = chunks.next().await else {
            break;
        };
        let chunk = chunk?;
        let room = limit - body.len();
        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }
    Ok(body)
}

impl Augmenter for SearchAugmenter {
    async fn search(&self, query: &str, max_results: usize) -> Option<Vec<SearchResult>> {
        match self.try_search(query, max_results).await {
            Ok(results) if !results.is_empty() => {
                info!(count = results.len(), "web search finished");
                Some(results)
            }
            Ok(_) => {
                info!("web search returned no results");
                None
            }
            Err(e) => {
                warn!(error = %e, "web search failed");
                None
            }
        }
    }
}

/// Extract `(title, url)` pairs for the first `max_results` result anchors.
///
/// Anchors without an `href` inside that window are dropped rather than
/// replaced by later ones.
fn parse_result_links(html: &str, base: &Url, max_results: usize) -> Vec<(String, String)> {
    let Ok(selector) = Selector::parse(RESULT_LINK_SELECTOR) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .take(max_results)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            let url = resolve_result_url(base, href)?;
            let title = collapse_whitespace(&link.text().collect::<String>());
            Some((title, url))
        })
        .collect()
}

/// Make `href` absolute and unwrap the engine's `/l/?uddg=<target>` redirect.
fn resolve_result_url(base: &Url, href: &str) -> Option<String> {
    let url = base.join(href).ok()?;
    if url.path().starts_with("/l/") {
        if let Some((_, target)) = url.query_pairs().find(|(k, _)| k == "uddg") {
            return Some(target.into_owned());
        }
    }
    Some(url.into())
}

/// Visible text of an HTML document with script and style bodies removed
/// and whitespace collapsed. Text nodes are joined as-is so inline markup
/// inside a word does not split it.
fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::new();
    for node in document.tree.nodes() {
        let Some(node_text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
        });
        if !hidden {
            text.push_str(node_text);
        }
    }
    collapse_whitespace(&text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    } else {
        text.to_owned()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode as AxumStatus;
    use axum::response::Html as HtmlBody;
    use axum::routing::get;

    #[test]
    fn trigger_keywords_match_case_insensitively() {
        assert!(should_augment("What's the LATEST on the Pi 5?"));
        assert!(should_augment("how is the weather in Oslo"));
        assert!(should_augment("Look Up the price of copper"));
    }

    #[test]
    fn messages_without_keywords_do_not_trigger() {
        assert!(!should_augment("Write me a haiku about cats"));
        assert!(!should_augment("Explain borrowing in Rust"));
    }

    #[test]
    fn text_extraction_drops_scripts_and_collapses_whitespace() {
        let html = "<html><head><style>body { color: red }</style></head>\
                    <body><h1>Title</h1>\n\n  <p>Some   text</p>\
                    <script>var x = 1;</script></body></html>";
        assert_eq!(extract_text(html), "Title Some text");
    }

    #[test]
    fn inline_markup_does_not_split_words() {
        let html = "<p>Hel<b>lo</b> <i>wor</i>ld</p><p>\n second line</p>";
        assert_eq!(extract_text(html), "Hello world second line");
    }

    #[tokio::test]
    async fn body_reads_stop_at_the_limit() {
        let chunks = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"aaaa")),
            Ok(Bytes::from_static(b"bbbb")),
            Err("never polled"),
        ]);
        let body = read_capped(chunks, 6).await.unwrap();
        assert_eq!(body, b"aaaabb");

        let short = futures::stream::iter(vec![Ok::<_, &str>(Bytes::from_static(b"abc"))]);
        assert_eq!(read_capped(short, 6).await.unwrap(), b"abc");
    }

    #[test]
    fn snippets_are_capped_with_ellipsis() {
        let long = "x".repeat(SNIPPET_MAX_CHARS + 20);
        let cut = truncate_snippet(&long, SNIPPET_MAX_CHARS);
        assert_eq!(cut.chars().count(), SNIPPET_MAX_CHARS + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate_snippet("short", SNIPPET_MAX_CHARS), "short");
    }

    #[test]
    fn redirect_links_are_unwrapped() {
        let base = Url::parse("https://html.duckduckgo.com/html/").unwrap();
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fa%3Fb%3D1&rut=abc";
        assert_eq!(
            resolve_result_url(&base, href).as_deref(),
            Some("https://example.com/a?b=1")
        );
        assert_eq!(
            resolve_result_url(&base, "https://example.org/x").as_deref(),
            Some("https://example.org/x")
        );
    }

    #[test]
    fn result_window_is_limited_before_filtering() {
        let base = Url::parse("http://search.local/html/").unwrap();
        let html = r#"<a class="result__a">no href</a>
            <a class="result__a" href="http://a.local/">A</a>
            <a class="other" href="http://skip.local/">skip</a>
            <a class="result__a" href="http://b.local/">B</a>"#;
        let links = parse_result_links(html, &base, 2);
        assert_eq!(links, vec![("A".to_owned(), "http://a.local/".to_owned())]);
    }

    async fn spawn_fake_web() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base = format!("http://{addr}");
        let results_page = format!(
            r#"<html><body>
                <a class="result__a" href="{base}/page/ok">Good <b>page</b></a>
                <a class="result__a" href="{base}/page/missing">Missing page</a>
            </body></html>"#
        );
        let app = Router::new()
            .route("/html/", get(move || async move { HtmlBody(results_page) }))
            .route(
                "/page/ok",
                get(|| async { HtmlBody("<html><body><p>Hello   from the page</p></body></html>") }),
            )
            .route("/page/missing", get(|| async { AxumStatus::NOT_FOUND }))
            .route(
                "/page/huge",
                get(|| async {
                    HtmlBody(format!(
                        "<html><body><p>Big page start</p>\n<p>{}</p></body></html>",
                        "x ".repeat(SNIPPET_BODY_LIMIT)
                    ))
                }),
            );
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        base
    }

    #[tokio::test]
    async fn search_degrades_failed_pages_to_placeholder() {
        let base = spawn_fake_web().await;
        let augmenter = SearchAugmenter::new(
            &format!("{base}/html/"),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap();

        let results = augmenter.search("anything", DEFAULT_MAX_RESULTS).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Good page");
        assert_eq!(results[0].snippet, "Hello from the page");
        assert_eq!(results[1].snippet, SNIPPET_PLACEHOLDER);
    }

    #[tokio::test]
    async fn oversized_pages_still_yield_a_snippet() {
        let base = spawn_fake_web().await;
        let augmenter = SearchAugmenter::new(
            &format!("{base}/html/"),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap();
        let snippet = augmenter.snippet(&format!("{base}/page/huge")).await;
        assert!(snippet.starts_with("Big page start x x"));
        assert!(snippet.ends_with("..."));
    }

    #[tokio::test]
    async fn failing_search_page_yields_none() {
        let base = spawn_fake_web().await;
        let augmenter = SearchAugmenter::new(
            &format!("{base}/does-not-exist/"),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(augmenter.search("anything", 3).await.is_none());
    }
}
