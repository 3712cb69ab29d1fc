//! Retrieval pipeline over the documents collection
//!
//! Two-stage strategy tuned for trading terminology: a regex text search
//! against the stored chunks runs first, then an Atlas vector-search
//! fallback fires when text matching comes up short.

// Allow non_std_lazy_statics because we use lazy_regex! macro which uses once_cell internally
// This is intentional and safe - lazy_regex! validates regex at compile time
#![allow(clippy::non_std_lazy_statics)]

use crate::config::{CONTEXT_MIN_CHARS, VECTOR_FALLBACK_THRESHOLD};
use crate::db::ChunkSource;
use crate::llm::Embedder;
use crate::utils::truncate_str;
use lazy_regex::lazy_regex;
use mongodb::bson::{doc, Document};
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Question words stripped before term expansion
const STOP_WORDS: [&str; 9] = [
    "what", "is", "are", "how", "does", "where", "when", "why", "which",
];

/// Collapse whitespace runs when cleaning extracted context
static RE_WHITESPACE: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"\s+");

/// Search terms expanded from one user query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedQuery {
    /// Query with stop words removed, used for the embedding fallback
    pub core_query: String,
    /// All search terms, deduplicated in insertion order
    pub terms: Vec<String>,
}

/// Expand a user query into the terms probed against the chunk store:
/// the stop-word-free core query, the cleaned query itself, each core
/// term, its uppercase form (acronyms) and adjacent term pairs.
#[must_use]
pub fn expand_query(query: &str) -> ExpandedQuery {
    let query_clean = query.to_lowercase().trim().to_string();
    let words: Vec<&str> = query_clean.split_whitespace().collect();
    let core_terms: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| !STOP_WORDS.contains(w))
        .collect();
    let core_query = core_terms.join(" ");

    let mut terms = vec![core_query.clone(), query_clean.clone()];
    terms.extend(core_terms.iter().map(ToString::to_string));
    terms.extend(core_terms.iter().map(|t| t.to_uppercase()));
    terms.extend(
        core_terms
            .windows(2)
            .map(|pair| format!("{} {}", pair[0], pair[1])),
    );
    terms.retain(|t| !t.is_empty());

    ExpandedQuery {
        core_query,
        terms: dedup_preserving_order(terms),
    }
}

/// Drop duplicates while keeping first occurrences in place
#[must_use]
pub fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// The seven regex families probed per term, matching how the source
/// documents mark definitions, bullet lists and FAQ entries.
fn pattern_family(term: &str) -> [String; 7] {
    let t = regex::escape(term);
    [
        format!("Definition:.*{t}"),
        format!("{t}.*definition"),
        format!("{t}[\\s]*:[^\\n]*"),
        format!("• {t}:"),
        format!("FAQ.*{t}"),
        format!("Question:.*{t}"),
        format!("\\b{t}\\b"),
    ]
}

/// Build the case-insensitive `$or` filter probing every pattern family
/// for every term.
#[must_use]
pub fn text_filter(terms: &[String]) -> Document {
    let mut clauses = Vec::new();
    for term in terms {
        for pattern in pattern_family(term) {
            clauses.push(doc! { "text": { "$regex": pattern, "$options": "i" } });
        }
    }
    doc! { "$or": clauses }
}

/// Extract context sections around every paragraph mentioning `term`.
///
/// A section is the matching paragraph plus one paragraph on each side,
/// whitespace-collapsed. Sections at or below [`CONTEXT_MIN_CHARS`]
/// characters are discarded as noise.
#[must_use]
pub fn context_sections(text: &str, term: &str) -> Vec<String> {
    // The escaped term is a literal, so compilation cannot fail
    let Ok(term_re) = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(term))) else {
        return Vec::new();
    };

    let paragraphs: Vec<&str> = text.split("\n\n").collect();
    let mut sections = Vec::new();

    for (i, paragraph) in paragraphs.iter().enumerate() {
        if term_re.is_match(paragraph) {
            let start = i.saturating_sub(1);
            let end = (i + 2).min(paragraphs.len());
            let context = paragraphs[start..end].join("\n\n");
            let context = RE_WHITESPACE.replace_all(&context, " ");
            let context = context.trim();
            if context.chars().count() > CONTEXT_MIN_CHARS {
                sections.push(context.to_string());
            }
        }
    }

    sections
}

fn sections_from_texts(texts: &[String], terms: &[String]) -> Vec<String> {
    let mut sections = Vec::new();
    for text in texts {
        for term in terms {
            sections.extend(context_sections(text, term));
        }
    }
    sections
}

/// Two-stage retriever pairing a chunk source with an embedder
pub struct Retriever<S, E> {
    source: S,
    embedder: E,
}

impl<S: ChunkSource, E: Embedder> Retriever<S, E> {
    /// Create a retriever over the given source and embedder
    #[must_use]
    pub fn new(source: S, embedder: E) -> Self {
        Self { source, embedder }
    }

    /// Retrieve up to `k` deduplicated context sections for `query`.
    ///
    /// Failures in either stage are logged and degrade to fewer
    /// (possibly zero) sections rather than erroring the caller.
    pub async fn search(&self, query: &str, k: usize) -> Vec<String> {
        info!("Searching for: {query}");

        let expanded = expand_query(query);
        if expanded.terms.is_empty() {
            info!("No results found");
            return Vec::new();
        }

        let texts = match self
            .source
            .text_search(text_filter(&expanded.terms), k)
            .await
        {
            Ok(texts) => {
                info!("Text search found {} matches", texts.len());
                texts
            }
            Err(e) => {
                warn!("Text search failed: {e}");
                Vec::new()
            }
        };

        let mut sections = dedup_preserving_order(sections_from_texts(&texts, &expanded.terms));

        if sections.len() < VECTOR_FALLBACK_THRESHOLD && !expanded.core_query.is_empty() {
            match self.vector_fallback(&expanded, k).await {
                Ok(extra) => {
                    sections.extend(extra);
                    sections = dedup_preserving_order(sections);
                }
                Err(e) => warn!("Vector search failed: {e}"),
            }
        }
        sections.truncate(k);

        if sections.is_empty() {
            info!("No results found");
        } else {
            info!("Found {} relevant chunks", sections.len());
            for (i, chunk) in sections.iter().take(2).enumerate() {
                debug!("Preview {}: {}", i + 1, truncate_str(chunk, 200));
            }
        }
        sections
    }

    async fn vector_fallback(
        &self,
        expanded: &ExpandedQuery,
        k: usize,
    ) -> anyhow::Result<Vec<String>> {
        let embedding = self.embedder.embed(&expanded.core_query).await?;
        let texts = self.source.vector_search(embedding, k).await?;
        info!("Vector search found {} results", texts.len());
        Ok(sections_from_texts(&texts, &expanded.terms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbError, MockChunkSource};
    use crate::llm::{LlmError, MockEmbedder};

    #[test]
    fn test_expand_query_term_order() {
        let expanded = expand_query("What is market structure shift");
        assert_eq!(expanded.core_query, "market structure shift");
        assert_eq!(
            expanded.terms,
            vec![
                "market structure shift",
                "what is market structure shift",
                "market",
                "structure",
                "shift",
                "MARKET",
                "STRUCTURE",
                "SHIFT",
                "market structure",
                "structure shift",
            ]
        );
    }

    #[test]
    fn test_expand_query_all_stop_words() {
        let expanded = expand_query("What is");
        assert_eq!(expanded.core_query, "");
        // the cleaned query itself still gets probed
        assert_eq!(expanded.terms, vec!["what is"]);
    }

    #[test]
    fn test_expand_query_empty() {
        assert!(expand_query("   ").terms.is_empty());
    }

    #[test]
    fn test_dedup_preserves_first_occurrence() {
        let deduped = dedup_preserving_order(vec![
            "b".to_string(),
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
            "a".to_string(),
        ]);
        assert_eq!(deduped, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_text_filter_shape() -> Result<(), Box<dyn std::error::Error>> {
        let filter = text_filter(&["mss".to_string(), "ob".to_string()]);
        let clauses = filter.get_array("$or")?;
        assert_eq!(clauses.len(), 14);

        let first = clauses[0]
            .as_document()
            .and_then(|c| c.get_document("text").ok())
            .ok_or("expected text clause")?;
        assert_eq!(first.get_str("$regex")?, "Definition:.*mss");
        assert_eq!(first.get_str("$options")?, "i");
        Ok(())
    }

    #[test]
    fn test_text_filter_escapes_regex_metacharacters() -> Result<(), Box<dyn std::error::Error>> {
        let filter = text_filter(&["a+b (test)".to_string()]);
        let clauses = filter.get_array("$or")?;
        let first = clauses[0]
            .as_document()
            .and_then(|c| c.get_document("text").ok())
            .ok_or("expected text clause")?;
        assert!(first.get_str("$regex")?.contains("a\\+b \\(test\\)"));
        Ok(())
    }

    fn sample_doc() -> String {
        [
            "Intro paragraph that pads the document with enough length to matter here.",
            "MSS stands for market structure shift and signals a reversal in order flow.",
            "Traders confirm an mss with displacement through a prior swing point first.",
            "Unrelated closing paragraph about risk management and position sizing rules.",
        ]
        .join("\n\n")
    }

    #[test]
    fn test_context_sections_window_and_cleanup() {
        let text = sample_doc();
        let sections = context_sections(&text, "mss");

        // paragraphs 2 and 3 both mention the term, each pulls one
        // neighbour on each side
        assert_eq!(sections.len(), 2);
        assert!(sections[0].starts_with("Intro paragraph"));
        assert!(sections[0].contains("MSS stands for"));
        assert!(sections[1].contains("Unrelated closing paragraph"));
        // paragraph breaks are collapsed to single spaces
        assert!(!sections[0].contains('\n'));
    }

    #[test]
    fn test_context_sections_discards_short_sections() {
        let sections = context_sections("mss here", "mss");
        assert!(sections.is_empty());
    }

    #[test]
    fn test_context_sections_requires_word_boundary() {
        // ticker MSSB contains the term but not on a word boundary
        let text = "Legacy broker MSSB shows up in this sentence padded to enough characters.";
        assert!(context_sections(text, "mss").is_empty());
    }

    #[tokio::test]
    async fn test_search_skips_vector_fallback_when_text_suffices() {
        let mut source = MockChunkSource::new();
        source
            .expect_text_search()
            .returning(|_, _| Ok(vec![sample_doc()]));
        source.expect_vector_search().never();
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().never();

        let retriever = Retriever::new(source, embedder);
        let sections = retriever.search("what is mss", 5).await;
        assert_eq!(sections.len(), 2);
    }

    #[tokio::test]
    async fn test_search_falls_back_to_vector_search() {
        let mut source = MockChunkSource::new();
        source.expect_text_search().returning(|_, _| Ok(Vec::new()));
        source
            .expect_vector_search()
            .returning(|_, _| Ok(vec![sample_doc()]));
        let mut embedder = MockEmbedder::new();
        embedder
            .expect_embed()
            .times(1)
            .returning(|_| Ok(vec![0.1, 0.2, 0.3]));

        let retriever = Retriever::new(source, embedder);
        let sections = retriever.search("what is mss", 5).await;
        assert_eq!(sections.len(), 2);
    }

    #[tokio::test]
    async fn test_search_survives_text_stage_failure() {
        let mut source = MockChunkSource::new();
        source
            .expect_text_search()
            .returning(|_, _| Err(DbError::Mongo(mongodb::error::Error::custom("reset"))));
        source
            .expect_vector_search()
            .returning(|_, _| Ok(vec![sample_doc()]));
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(|_| Ok(vec![0.5]));

        let retriever = Retriever::new(source, embedder);
        let sections = retriever.search("what is mss", 5).await;
        assert_eq!(sections.len(), 2);
    }

    #[tokio::test]
    async fn test_search_returns_empty_when_everything_fails() {
        let mut source = MockChunkSource::new();
        source.expect_text_search().returning(|_, _| Ok(Vec::new()));
        source.expect_vector_search().returning(|_, _| Ok(Vec::new()));
        let mut embedder = MockEmbedder::new();
        embedder
            .expect_embed()
            .returning(|_| Err(LlmError::NetworkError("timeout".to_string())));

        let retriever = Retriever::new(source, embedder);
        assert!(retriever.search("what is mss", 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_truncates_to_k() {
        let mut source = MockChunkSource::new();
        source
            .expect_text_search()
            .returning(|_, _| Ok(vec![sample_doc()]));
        source.expect_vector_search().never();
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().never();

        let retriever = Retriever::new(source, embedder);
        let sections = retriever.search("what is mss", 1).await;
        assert_eq!(sections.len(), 1);
    }
}
