//! Keyword categorization against an injected, immutable taxonomy.

use agenda_shared::{CategorySubject, FALLBACK_CATEGORY, RawEventRecord, SourceConfig, TaxonomyEntry};

struct Category {
    label: String,
    /// Lower-cased at construction.
    keywords: Vec<String>,
}

/// Maps free text to one taxonomy label.
///
/// Categories are scanned in declaration order and the first one with any
/// keyword contained in the lower-cased text wins. Text matching nothing gets
/// [`FALLBACK_CATEGORY`]. The result is always a declared label or the fallback.
pub struct Categorizer {
    categories: Vec<Category>,
}

impl Categorizer {
    pub fn new(taxonomy: Vec<TaxonomyEntry>) -> Self {
        let categories = taxonomy
            .into_iter()
            .map(|entry| Category {
                label: entry.label,
                keywords: entry
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
            })
            .collect();
        Self { categories }
    }

    /// Label for `text`, or the fallback.
    pub fn categorize(&self, text: &str) -> &str {
        let haystack = text.to_lowercase();
        self.categories
            .iter()
            .find(|c| c.keywords.iter().any(|k| haystack.contains(k.as_str())))
            .map_or(FALLBACK_CATEGORY, |c| c.label.as_str())
    }

    /// The declared label equal to `text` ignoring case and surrounding space.
    pub fn label_for(&self, text: &str) -> Option<&str> {
        let wanted = text.trim().to_lowercase();
        if wanted == FALLBACK_CATEGORY.to_lowercase() {
            return Some(FALLBACK_CATEGORY);
        }
        self.categories
            .iter()
            .find(|c| c.label.to_lowercase() == wanted)
            .map(|c| c.label.as_str())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.label.as_str())
    }

    /// Category for one record under its source's policy.
    ///
    /// A `fixed_category` wins outright. With `category_from = "hint"`, a hint
    /// naming a label is taken as that label and any other hint is
    /// categorized like free text; records without a hint fall back to the title.
    pub fn resolve(&self, source: &SourceConfig, record: &RawEventRecord) -> String {
        if let Some(fixed) = source.fixed_category.as_deref() {
            if let Some(label) = self.label_for(fixed) {
                return label.to_string();
            }
        }

        let category = match source.category_from {
            CategorySubject::Title => self.categorize(&record.title),
            CategorySubject::TitleLocation => {
                let location = record.location.as_deref().unwrap_or_default();
                self.categorize(&format!("{} {location}", record.title))
            }
            CategorySubject::Hint => match record.category_hint.as_deref() {
                Some(hint) => self
                    .label_for(hint)
                    .unwrap_or_else(|| self.categorize(hint)),
                None => self.categorize(&record.title),
            },
        };
        category.to_string()
    }
}
