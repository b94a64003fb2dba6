use crate::config::Config;
use crate::feed::Item;
use crate::util::sanitize_line;

const DEFAULT_TAG: &str = "reddit";
const UNKNOWN_AUTHOR: &str = "unknown";

/// How relayed items are rendered into chat lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFormat {
    /// Use the item's first category as the tag instead of `reddit`.
    pub show_category: bool,
    /// Prefix for `{short_link_base}{id suffix}`.
    pub short_link_base: String,
}

impl Default for MessageFormat {
    fn default() -> Self {
        Self {
            show_category: false,
            short_link_base: "https://redd.it/".to_string(),
        }
    }
}

impl MessageFormat {
    pub fn from_config(config: &Config) -> Self {
        Self {
            show_category: config.show_category,
            short_link_base: config.short_link_base.clone(),
        }
    }

    /// Render `[tag] [author] title link` as a single line.
    ///
    /// `suffix` is the id with its type prefix removed.
    pub fn format(&self, item: &Item, suffix: &str) -> String {
        let tag = self
            .category_tag(item)
            .unwrap_or_else(|| DEFAULT_TAG.to_string());

        let author = item
            .author
            .as_deref()
            .map(sanitize_line)
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

        format!(
            "[{}] [{}] {} {}{}",
            tag,
            author,
            sanitize_line(&item.title),
            self.short_link_base,
            suffix
        )
    }

    fn category_tag(&self, item: &Item) -> Option<String> {
        if !self.show_category {
            return None;
        }
        let first = item.categories.first()?;
        let trimmed = first.trim_start_matches('/');
        let name = trimmed.strip_prefix("r/").unwrap_or(trimmed);
        let tag = sanitize_line(name);
        (!tag.is_empty()).then_some(tag)
    }
}
