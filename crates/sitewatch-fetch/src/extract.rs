use scraper::{Html, Selector};
use sitewatch_core::FetchError;

pub fn parse_selector(selector: &str) -> Result<Selector, FetchError> {
    Selector::parse(selector).map_err(|err| FetchError::InvalidSelector {
        selector: selector.to_string(),
        reason: err.to_string(),
    })
}

/// Check selector syntax without fetching anything (used by `sitewatch add`).
pub fn validate_selector(selector: &str) -> Result<(), FetchError> {
    parse_selector(selector).map(|_| ())
}

/// Extract the trimmed text of every element matching `selector`.
///
/// Text of multiple matches is concatenated in document order. No match at
/// all is an error so that a page redesign is reported instead of silently
/// hashing an empty string.
pub fn extract_text(html: &str, url: &str, selector: &str) -> Result<String, FetchError> {
    let parsed = parse_selector(selector)?;
    match select_text(html, &parsed) {
        Some(text) => Ok(text),
        None => Err(FetchError::SelectorNotFound {
            url: url.to_string(),
            selector: selector.to_string(),
        }),
    }
}

/// `None` when nothing matches.
pub(crate) fn select_text(html: &str, selector: &Selector) -> Option<String> {
    let document = Html::parse_document(html);
    let mut matched = false;
    let mut text = String::new();
    for element in document.select(selector) {
        matched = true;
        for fragment in element.text() {
            text.push_str(fragment);
        }
    }
    matched.then(|| text.trim().to_string())
}
