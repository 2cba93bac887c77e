use serde::{Deserialize, Serialize};

use custodia_core::{DomainError, DomainResult};
use custodia_custody::{CustodyKind, ExhaustionPolicy, Resource, ResourceKind};

const TITLE_MAX: usize = 200;
const AUTHOR_MAX: usize = 100;
const PUBLISHER_MAX: usize = 100;
const ISBN_MAX: usize = 13;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDetails {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub pages: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub pages: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookFilter {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

/// Library titles: many readers at once, loans only, records dropped on
/// full return.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct BookKind;

pub type Book = Resource<BookKind>;

fn check_len(field: &str, value: &str, max: usize) -> DomainResult<()> {
    if value.chars().count() > max {
        return Err(DomainError::validation(format!(
            "{field} cannot exceed {max} characters"
        )));
    }
    Ok(())
}

fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    match needle.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => haystack.to_lowercase().contains(&n.to_lowercase()),
        None => true,
    }
}

impl ResourceKind for BookKind {
    const NAME: &'static str = "book";
    const SINGLE_HOLDER: bool = false;
    const TRACKS_CONDITION: bool = false;
    const EXHAUSTION: ExhaustionPolicy = ExhaustionPolicy::DeleteRecord;

    type Details = BookDetails;
    type Patch = BookPatch;
    type Filter = BookFilter;

    fn accepts(kind: CustodyKind) -> bool {
        kind == CustodyKind::Loan
    }

    /// ISBN-10 or ISBN-13 with hyphens and spaces dropped: digits, with an
    /// optional trailing check character `X`.
    fn normalize_code(code: &str) -> DomainResult<String> {
        let isbn: String = code
            .chars()
            .filter(|c| !matches!(c, '-' | ' '))
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if isbn.is_empty() {
            return Err(DomainError::validation("ISBN cannot be empty"));
        }
        if !isbn.is_ascii() {
            return Err(DomainError::validation(format!(
                "ISBN '{isbn}' must contain only digits and an optional trailing X"
            )));
        }
        if isbn.len() > ISBN_MAX {
            return Err(DomainError::validation(format!(
                "ISBN cannot exceed {ISBN_MAX} characters"
            )));
        }
        let (body, last) = isbn.split_at(isbn.len() - 1);
        let valid = body.chars().all(|c| c.is_ascii_digit())
            && last.chars().all(|c| c.is_ascii_digit() || c == 'X');
        if !valid {
            return Err(DomainError::validation(format!(
                "ISBN '{isbn}' must contain only digits and an optional trailing X"
            )));
        }
        Ok(isbn)
    }

    fn validate(details: &BookDetails) -> DomainResult<()> {
        if details.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        if details.author.trim().is_empty() {
            return Err(DomainError::validation("author cannot be empty"));
        }
        check_len("title", details.title.trim(), TITLE_MAX)?;
        check_len("author", details.author.trim(), AUTHOR_MAX)?;
        if let Some(publisher) = &details.publisher {
            check_len("publisher", publisher, PUBLISHER_MAX)?;
        }
        if details.pages == Some(0) {
            return Err(DomainError::validation("page count must be positive"));
        }
        Ok(())
    }

    fn apply_patch(details: &mut BookDetails, patch: BookPatch) {
        if let Some(title) = patch.title {
            details.title = title;
        }
        if let Some(author) = patch.author {
            details.author = author;
        }
        if let Some(publisher) = patch.publisher {
            details.publisher = Some(publisher).filter(|p| !p.trim().is_empty());
        }
        if let Some(pages) = patch.pages {
            details.pages = Some(pages);
        }
    }

    fn matches(details: &BookDetails, filter: &BookFilter) -> bool {
        contains_ci(&details.title, filter.title.as_deref())
            && contains_ci(&details.author, filter.author.as_deref())
    }

    fn search_fields(details: &BookDetails) -> Vec<&str> {
        let mut fields = vec![details.title.as_str(), details.author.as_str()];
        if let Some(publisher) = &details.publisher {
            fields.push(publisher);
        }
        fields
    }

    fn label(details: &BookDetails) -> &str {
        &details.title
    }
}
