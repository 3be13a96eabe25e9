//! Article field extraction
//!
//! Turns a fetched page into a [`Record`]. Each field is looked up on its own
//! and degrades to `None` when its markup is missing; only a missing root
//! container rejects the whole page.

use crate::config::SiteConfig;
use crate::crawler::fetcher::Document;
use crate::storage::Record;
use chrono::{DateTime, NaiveDate};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// Element whose class tokens carry the category
const ROOT_SELECTOR: &str = "body";

/// Main content block; paragraphs are only read from inside it
const CONTENT_SELECTOR: &str = "article";

const TITLE_SELECTOR: &str = "a.story__link";
const TITLE_FALLBACK_SELECTOR: &str = ".story__title";
const TIMESTAMP_SELECTOR: &str = ".timestamp--date";
const PARAGRAPH_SELECTOR: &str = ".story__content p";

/// Format the site prints dates in, e.g. "June 5, 2023"
const STRICT_DATE_FORMAT: &str = "%B %d, %Y";

/// Formats tried against three-word windows once commas and ordinals are gone
const WORD_DATE_FORMATS: &[&str] = &["%B %d %Y", "%d %B %Y", "%Y %B %d"];

/// Formats tried against single tokens
const NUMERIC_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y"];

/// Result of extracting a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Record(Record),
    /// The root container was missing or empty; nothing on the page can be trusted
    NoContent,
}

/// Extracts records for one source
#[derive(Debug, Clone)]
pub struct Extractor {
    source: String,
    categories: HashSet<String>,
}

impl Extractor {
    pub fn new(source: impl Into<String>, categories: impl IntoIterator<Item = String>) -> Self {
        Self {
            source: source.into(),
            categories: categories.into_iter().collect(),
        }
    }

    /// Builds an extractor for the configured site
    pub fn from_site(site: &SiteConfig) -> Self {
        Self::new(site.source.clone(), site.categories.iter().cloned())
    }

    /// Extracts a record from a fetched page
    ///
    /// # Example
    ///
    /// ```
    /// use idcrawl::crawler::{Document, Extraction, Extractor};
    ///
    /// let extractor = Extractor::new("dawn", vec!["world".to_string()]);
    /// let page = Document {
    ///     id: 7,
    ///     url: "https://www.dawn.com/news/7".to_string(),
    ///     status_code: 200,
    ///     body: r#"<html><body class="story world"><article>
    ///         <h2 class="story__title">Headline</h2>
    ///         </article></body></html>"#.to_string(),
    /// };
    ///
    /// match extractor.extract(&page) {
    ///     Extraction::Record(record) => {
    ///         assert_eq!(record.category.as_deref(), Some("world"));
    ///         assert_eq!(record.title.as_deref(), Some("Headline"));
    ///     }
    ///     Extraction::NoContent => unreachable!(),
    /// }
    /// ```
    pub fn extract(&self, document: &Document) -> Extraction {
        let html = Html::parse_document(&document.body);
        let page = html.root_element();

        // html5ever always synthesizes <body>, so an empty one means there was none
        let root = match select_first(page, ROOT_SELECTOR).filter(|el| has_content(*el)) {
            Some(root) => root,
            None => return Extraction::NoContent,
        };

        let mut record = Record::new(document.id, self.source.clone(), document.url.clone());
        record.category = self.classify(root);
        record.title = select_first(page, TITLE_SELECTOR)
            .and_then(element_text)
            .or_else(|| select_first(page, TITLE_FALLBACK_SELECTOR).and_then(element_text));
        record.date = select_first(page, TIMESTAMP_SELECTOR)
            .and_then(element_text)
            .and_then(|raw| parse_date(&raw));

        if let Some(content) = select_first(root, CONTENT_SELECTOR) {
            let (summary, body) = split_paragraphs(paragraphs(content));
            record.summary = Some(summary);
            record.body = Some(body);
        }

        Extraction::Record(record)
    }

    /// First class token of `root` that is in the keyword set
    fn classify(&self, root: ElementRef<'_>) -> Option<String> {
        root.value()
            .attr("class")?
            .split_whitespace()
            .find(|token| self.categories.contains(*token))
            .map(str::to_string)
    }
}

fn select_first<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    scope.select(&selector).next()
}

fn has_content(element: ElementRef<'_>) -> bool {
    element.children().any(|child| {
        child.value().is_element() || child.value().as_text().is_some_and(|t| !t.trim().is_empty())
    })
}

/// Whitespace-collapsed text of an element, `None` when blank
fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = collapse_whitespace(&element.text().collect::<String>());
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn paragraphs(content: ElementRef<'_>) -> Vec<String> {
    let Ok(selector) = Selector::parse(PARAGRAPH_SELECTOR) else {
        return Vec::new();
    };
    content
        .select(&selector)
        .map(|p| collapse_whitespace(&p.text().collect::<String>()))
        .collect()
}

/// First paragraph and the newline-joined rest; both empty for no paragraphs
fn split_paragraphs(paragraphs: Vec<String>) -> (String, String) {
    let mut iter = paragraphs.into_iter();
    let summary = iter.next().unwrap_or_default();
    let body = iter.collect::<Vec<_>>().join("\n");
    (summary, body)
}

/// Parses a human-readable date, strict format first
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let text = collapse_whitespace(raw);
    NaiveDate::parse_from_str(&text, STRICT_DATE_FORMAT)
        .ok()
        .or_else(|| parse_date_lenient(&text))
}

/// Looks for a date anywhere in free text such as "Published 5th June 2023 10:12am"
fn parse_date_lenient(text: &str) -> Option<NaiveDate> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp.date_naive());
    }

    let cleaned = text.replace([',', '|'], " ");
    let tokens: Vec<&str> = cleaned
        .split_whitespace()
        .map(|token| token.trim_end_matches('.'))
        .map(strip_ordinal)
        .collect();

    for window in tokens.windows(3) {
        let candidate = window.join(" ");
        for format in WORD_DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(&candidate, format) {
                return Some(date);
            }
        }
    }

    tokens.iter().find_map(|token| {
        // ISO timestamps carry the date in their first ten characters
        let head = token.get(..10).unwrap_or(*token);
        NUMERIC_DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(token, format).ok())
            .or_else(|| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
    })
}

/// "5th" -> "5"; anything else is returned unchanged
fn strip_ordinal(token: &str) -> &str {
    let lower = token.to_ascii_lowercase();
    for suffix in ["st", "nd", "rd", "th"] {
        if let Some(number) = lower.strip_suffix(suffix) {
            if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
                return &token[..number.len()];
            }
        }
    }
    token
}
