use super::{ClassificationIndex, IndexError, RetrievedEntry};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Read;
use tracing::debug;

const TOKEN_WEIGHT: f64 = 0.7;
const DICE_WEIGHT: f64 = 0.3;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "item", "other", "all", "of", "is", "a", "an", "in", "to",
];

#[derive(Debug, Deserialize)]
struct TaxonomyRow {
    code: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone)]
struct TaxonomyEntry {
    code: String,
    title: String,
    text: String,
    normalized: String,
    tokens: HashSet<String>,
}

/// In-memory lexical index over classification codes and titles.
///
/// Scores blend the share of query tokens found in the entry with the
/// Sorensen-Dice similarity of the whole strings. Ties go to the lower code
/// so results are deterministic.
#[derive(Debug, Clone, Default)]
pub struct TaxonomyIndex {
    entries: Vec<TaxonomyEntry>,
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn stem(token: &str) -> &str {
    if token.len() > 3 && token.ends_with('s') && !token.ends_with("ss") {
        &token[..token.len() - 1]
    } else {
        token
    }
}

fn tokenize(normalized: &str) -> HashSet<String> {
    normalized
        .split(' ')
        .filter(|t| t.len() > 1 && !STOPWORDS.contains(t))
        .map(|t| stem(t).to_string())
        .collect()
}

impl TaxonomyIndex {
    pub fn from_entries<I, C, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (C, T)>,
        C: Into<String>,
        T: Into<String>,
    {
        let mut index = Self::default();
        for (code, title) in entries {
            index.push(code.into(), title.into(), None);
        }
        index
    }

    /// Loads a CSV with a `code,title` header and an optional `description`
    /// column. Rows with a blank code are skipped.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, IndexError> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut index = Self::default();

        for row in csv_reader.deserialize::<TaxonomyRow>() {
            let row = row.map_err(|e| IndexError::Load {
                message: e.to_string(),
            })?;
            if row.code.is_empty() {
                continue;
            }
            index.push(row.code, row.title, row.description);
        }

        debug!(entries = index.len(), "Loaded classification taxonomy");
        Ok(index)
    }

    fn push(&mut self, code: String, title: String, description: Option<String>) {
        let text = match description.filter(|d| !d.trim().is_empty()) {
            Some(desc) => format!("{} {}", title, desc),
            None => title.clone(),
        };
        let normalized = normalize(&text);
        let tokens = tokenize(&normalized);
        self.entries.push(TaxonomyEntry {
            code,
            title,
            text,
            normalized,
            tokens,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn score(entry: &TaxonomyEntry, query_normalized: &str, query_tokens: &HashSet<String>) -> f64 {
        let overlap = if query_tokens.is_empty() {
            0.0
        } else {
            query_tokens.intersection(&entry.tokens).count() as f64 / query_tokens.len() as f64
        };
        let dice = strsim::sorensen_dice(query_normalized, &entry.normalized);
        TOKEN_WEIGHT * overlap + DICE_WEIGHT * dice
    }

    pub fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedEntry>, IndexError> {
        let query_normalized = normalize(query);
        if query_normalized.is_empty() {
            return Err(IndexError::InvalidQuery {
                message: "query is empty".to_string(),
            });
        }
        let query_tokens = tokenize(&query_normalized);

        let mut scored: Vec<(f64, &TaxonomyEntry)> = self
            .entries
            .iter()
            .map(|e| (Self::score(e, &query_normalized, &query_tokens), e))
            .collect();

        scored.sort_by(|(sa, ea), (sb, eb)| {
            sb.total_cmp(sa).then_with(|| ea.code.cmp(&eb.code))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, e)| RetrievedEntry {
                code: e.code.clone(),
                title: e.title.clone(),
                text: e.text.clone(),
                score,
            })
            .collect())
    }
}

#[async_trait]
impl ClassificationIndex for TaxonomyIndex {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedEntry>, IndexError> {
        self.search(query, k)
    }

    fn name(&self) -> &str {
        "taxonomy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAXONOMY_CSV: &str = "\
code,title,description
315990,Apparel Accessories and Other Apparel Manufacturing,\"gloves, mittens, belts\"
339920,Sporting and Athletic Goods Manufacturing,
316998,All Other Leather Good and Allied Product Manufacturing,synthetic leather goods
311111,Dog and Cat Food Manufacturing,
324110,Petroleum Refineries,
";

    #[test]
    fn test_loads_csv_with_optional_description() {
        let index = TaxonomyIndex::from_csv_reader(TAXONOMY_CSV.as_bytes()).unwrap();
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn test_gloves_query_ranks_apparel_and_leather_first() {
        let index = TaxonomyIndex::from_csv_reader(TAXONOMY_CSV.as_bytes()).unwrap();
        let results = index
            .search("The item is a synthetic leather large work gloves", 3)
            .unwrap();

        assert_eq!(results.len(), 3);
        let codes: Vec<_> = results.iter().map(|r| r.code.as_str()).collect();
        assert!(codes.contains(&"315990"));
        assert!(codes.contains(&"316998"));
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_ties_break_by_code() {
        let index = TaxonomyIndex::from_entries(vec![("222", "Widgets"), ("111", "Widgets")]);
        let results = index.search("widgets", 2).unwrap();
        assert_eq!(results[0].code, "111");
        assert_eq!(results[1].code, "222");
    }

    #[test]
    fn test_k_bounds_results() {
        let index = TaxonomyIndex::from_csv_reader(TAXONOMY_CSV.as_bytes()).unwrap();
        assert_eq!(index.search("food", 1).unwrap().len(), 1);
        assert!(index.search("food", 0).unwrap().is_empty());
    }

    #[test]
    fn test_empty_query_is_rejected() {
        let index = TaxonomyIndex::from_entries(vec![("1", "x")]);
        assert!(matches!(
            index.search("  ...  ", 3),
            Err(IndexError::InvalidQuery { .. })
        ));
    }

    #[test]
    fn test_missing_title_column_fails_to_load() {
        let result = TaxonomyIndex::from_csv_reader("code\n123\n".as_bytes());
        assert!(matches!(result, Err(IndexError::Load { .. })));
    }
}
