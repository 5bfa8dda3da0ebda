//! Cross-source deduplication and ranking of paper records.
//!
//! Records from different providers describing the same paper are collapsed
//! into one, preferring the most authoritative source for each field, then
//! ranked by query relevance and recency. Output order is deterministic for
//! a fixed input order.

use std::collections::HashMap;

use strsim::jaro_winkler;

use crate::models::{PaperRecord, SourceType};

/// Titles at or above this similarity are considered the same paper when
/// authors and year also agree.
const TITLE_SIMILARITY_THRESHOLD: f64 = 0.95;

/// Static preference ordering among sources, used to pick the primary
/// record when duplicates are collapsed and as a ranking tiebreaker.
#[derive(Debug, Clone)]
pub struct AuthorityRanking {
    order: Vec<String>,
}

impl Default for AuthorityRanking {
    fn default() -> Self {
        Self::new(["crossref", "pubmed", "semantic", "arxiv", "xrxiv"])
    }
}

impl AuthorityRanking {
    /// Build a ranking from most to least authoritative source name
    pub fn new<I, S>(order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            order: order.into_iter().map(Into::into).collect(),
        }
    }

    /// Rank of a source; unlisted sources rank after all listed ones
    pub fn rank(&self, source: &SourceType) -> usize {
        self.order
            .iter()
            .position(|name| name == source.id())
            .unwrap_or(self.order.len())
    }
}

/// Canonical cross-source identity of a record, strongest identifier first:
/// DOI, then arXiv ID, then a fuzzy title/author/year key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalKey {
    Doi(String),
    Arxiv(String),
    Fuzzy(String),
}

/// Compute the canonical key for a record
pub fn canonical_key(record: &PaperRecord) -> CanonicalKey {
    if let Some(doi) = &record.doi {
        return CanonicalKey::Doi(normalize_doi(doi));
    }

    if record.source == SourceType::Arxiv {
        // Strip any version suffix so 2301.12345v2 matches 2301.12345
        let id = record.paper_id.to_lowercase();
        let id = id.split('v').next().unwrap_or(&id).to_string();
        return CanonicalKey::Arxiv(id);
    }

    let surname = record
        .first_author()
        .map(|a| {
            a.split_whitespace()
                .last()
                .unwrap_or(a)
                .to_lowercase()
        })
        .unwrap_or_default();
    let year = record
        .published
        .map(|d| d.year.to_string())
        .unwrap_or_default();

    CanonicalKey::Fuzzy(format!(
        "{}|{}|{}",
        normalize_title(&record.title),
        surname,
        year
    ))
}

/// Lowercase a DOI and strip resolver prefixes
fn normalize_doi(doi: &str) -> String {
    doi.trim()
        .trim_start_matches("https://doi.org/")
        .trim_start_matches("http://doi.org/")
        .trim_start_matches("doi:")
        .to_lowercase()
}

/// Normalize a title for comparison: lowercase, alphanumeric words only
fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Check if two records plausibly share an author list
fn authors_overlap(a: &PaperRecord, b: &PaperRecord) -> bool {
    if a.authors.is_empty() || b.authors.is_empty() {
        // Missing author data is not evidence against a match
        return true;
    }
    a.authors.iter().any(|author_a| {
        let author_a = author_a.to_lowercase();
        b.authors
            .iter()
            .any(|author_b| author_b.to_lowercase() == author_a)
    })
}

/// Check if two records without strong identifiers describe the same paper
fn near_duplicate(a: &PaperRecord, b: &PaperRecord) -> bool {
    if a.source == b.source {
        return false;
    }
    if let (Some(da), Some(db)) = (a.published, b.published) {
        if da.year != db.year {
            return false;
        }
    }
    let similarity = jaro_winkler(&normalize_title(&a.title), &normalize_title(&b.title));
    similarity >= TITLE_SIMILARITY_THRESHOLD && authors_overlap(a, b)
}

/// Merge a lower-priority duplicate into the primary record, filling only
/// the fields the primary is missing. Present fields are never overwritten.
fn fill_missing(primary: &mut PaperRecord, duplicate: &PaperRecord) {
    if primary.doi.is_none() {
        primary.doi = duplicate.doi.clone();
    }
    if primary.abstract_text.is_none() {
        primary.abstract_text = duplicate.abstract_text.clone();
    }
    if primary.published.is_none() {
        primary.published = duplicate.published;
    }
    if primary.journal.is_none() {
        primary.journal = duplicate.journal.clone();
    }
    if primary.pdf_url.is_none() {
        primary.pdf_url = duplicate.pdf_url.clone();
    }
    if primary.authors.is_empty() {
        primary.authors = duplicate.authors.clone();
    }
}

/// Count query terms that appear as words in the title
fn title_match_count(title: &str, query_terms: &[String]) -> usize {
    let normalized = normalize_title(title);
    let words: Vec<&str> = normalized.split(' ').collect();
    query_terms
        .iter()
        .filter(|term| words.contains(&term.as_str()))
        .count()
}

/// Deduplicate and rank records from multiple sources.
///
/// Records sharing a canonical key collapse into one, keeping the record
/// from the most authoritative source and filling its gaps from the
/// duplicates. The merged list is stable-sorted by title match count
/// (descending), publication recency (descending, missing dates last), and
/// source authority, then truncated to `limit`.
pub fn merge_records(
    records: Vec<PaperRecord>,
    query: &str,
    authority: &AuthorityRanking,
    limit: usize,
) -> Vec<PaperRecord> {
    let original_count = records.len();

    // Group indices by canonical key, preserving first-seen order.
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut by_key: HashMap<CanonicalKey, usize> = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        let key = canonical_key(record);
        match by_key.get(&key) {
            Some(&group_idx) => groups[group_idx].push(idx),
            None => {
                by_key.insert(key, groups.len());
                groups.push(vec![idx]);
            }
        }
    }

    // Second pass: unite groups the keys could not. Two distinct DOIs are
    // conclusively different papers; any other pairing (an arXiv preprint
    // against its published DOI, or two fuzzy keys with spelling
    // differences) may still describe the same paper. Each group's DOI is
    // tracked across unions so a DOI-less record cannot transitively bridge
    // two groups that carry different DOIs.
    let mut group_doi: Vec<Option<String>> = groups
        .iter()
        .map(|members| records[members[0]].doi.as_deref().map(normalize_doi))
        .collect();
    let mut i = 0;
    while i < groups.len() {
        let mut j = i + 1;
        while j < groups.len() {
            let distinct_dois = matches!(
                (&group_doi[i], &group_doi[j]),
                (Some(a), Some(b)) if a != b
            );
            let a = &records[groups[i][0]];
            let b = &records[groups[j][0]];
            if !distinct_dois && near_duplicate(a, b) {
                let merged = groups.remove(j);
                groups[i].extend(merged);
                let doi = group_doi.remove(j);
                if group_doi[i].is_none() {
                    group_doi[i] = doi;
                }
            } else {
                j += 1;
            }
        }
        i += 1;
    }

    // Collapse each group: order members by authority (stable, so equal
    // ranks keep first-seen order), take the best as primary, fill gaps
    // from the rest.
    let mut merged: Vec<PaperRecord> = Vec::with_capacity(groups.len());
    for group in groups {
        let mut members = group;
        members.sort_by_key(|&idx| authority.rank(&records[idx].source));
        let mut primary = records[members[0]].clone();
        for &idx in &members[1..] {
            fill_missing(&mut primary, &records[idx]);
        }
        merged.push(primary);
    }

    if merged.len() < original_count {
        tracing::debug!(
            before = original_count,
            after = merged.len(),
            "Collapsed duplicate records"
        );
    }

    // Rank. A stable sort keeps first-seen order for equal scores, making
    // the output deterministic for a fixed input order.
    let query_terms: Vec<String> = normalize_title(query)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();

    merged.sort_by(|a, b| {
        let match_a = title_match_count(&a.title, &query_terms);
        let match_b = title_match_count(&b.title, &query_terms);
        match_b
            .cmp(&match_a)
            .then_with(|| match (a.published, b.published) {
                (Some(da), Some(db)) => db.cmp(&da),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| authority.rank(&a.source).cmp(&authority.rank(&b.source)))
    });

    // Truncate only after ranking so no source's ordering biases the cut.
    merged.truncate(limit);
    merged
}
