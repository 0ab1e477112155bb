//! Serialisation of search results into the delimited block embedded in
//! augmented prompts.
//!
//! Every literal line is wrapped in `[WEB_SEARCH_START]…[WEB_SEARCH_END]` so
//! the model can tell retrieved text apart from instructions. Existing prompt
//! tuning depends on this exact layout.

use std::fmt::Write;

use super::SearchResult;

const START: &str = "[WEB_SEARCH_START]";
const END: &str = "[WEB_SEARCH_END]";

/// Render `results` as the prompt context block.
pub fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No search results found.".to_owned();
    }

    let total = results.len();
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write!(out, "{START}=== WEB SEARCH RESULTS ==={END}\n\n");
    let _ = write!(
        out,
        "{START}Search completed successfully. Found {total} relevant sources:{END}\n\n"
    );

    for (i, result) in results.iter().enumerate() {
        let n = i + 1;
        let _ = writeln!(out, "{START}Source {n} of {total}:{END}");
        let _ = writeln!(out, "{START}Title: {}{END}", result.title);
        let _ = writeln!(out, "{START}URL: {}{END}", result.url);
        let _ = writeln!(out, "{START}Content Summary: {}{END}", result.snippet);
        let _ = write!(out, "{START}{}{END}\n\n", "-".repeat(60));
    }

    let _ = writeln!(
        out,
        "{START}Please use the above information to provide an accurate, current response.{END}"
    );
    let _ = write!(
        out,
        "{START}When referencing these sources, mention them by their source number \
         (e.g., 'According to Source 1...').{END}\n\n"
    );
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_results_have_a_fixed_message() {
        assert_eq!(format_results(&[]), "No search results found.");
    }

    #[test]
    fn block_layout_is_stable() {
        let results = vec![SearchResult {
            title: "Pi news".into(),
            url: "https://example.com/pi".into(),
            snippet: "A new Pi shipped.".into(),
        }];
        let dashes = "-".repeat(60);
        let expected = format!(
            "[WEB_SEARCH_START]=== WEB SEARCH RESULTS ===[WEB_SEARCH_END]\n\n\
             [WEB_SEARCH_START]Search completed successfully. Found 1 relevant sources:[WEB_SEARCH_END]\n\n\
             [WEB_SEARCH_START]Source 1 of 1:[WEB_SEARCH_END]\n\
             [WEB_SEARCH_START]Title: Pi news[WEB_SEARCH_END]\n\
             [WEB_SEARCH_START]URL: https://example.com/pi[WEB_SEARCH_END]\n\
             [WEB_SEARCH_START]Content Summary: A new Pi shipped.[WEB_SEARCH_END]\n\
             [WEB_SEARCH_START]{dashes}[WEB_SEARCH_END]\n\n\
             [WEB_SEARCH_START]Please use the above information to provide an accurate, current response.[WEB_SEARCH_END]\n\
             [WEB_SEARCH_START]When referencing these sources, mention them by their source number (e.g., 'According to Source 1...').[WEB_SEARCH_END]\n\n"
        );
        assert_eq!(format_results(&results), expected);
    }

    #[test]
    fn sources_are_numbered_out_of_the_total() {
        let results: Vec<_> = (0..3)
            .map(|i| SearchResult {
                title: format!("t{i}"),
                url: format!("https://example.com/{i}"),
                snippet: String::new(),
            })
            .collect();
        let block = format_results(&results);
        assert!(block.contains("Source 3 of 3:"));
        assert!(block.contains("Found 3 relevant sources"));
    }
}
