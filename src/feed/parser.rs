use feed_rs::parser;

/// One entry of a fetched feed.
///
/// Lives only for the duration of one fetch-and-process pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Opaque entry id (`t3_1abcde` for Reddit link posts).
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    /// Category terms in feed order. Reddit puts the subreddit name first.
    pub categories: Vec<String>,
    /// Unix seconds. Informational only; ordering is by id.
    pub published: Option<i64>,
}

/// Parse an RSS or Atom document into its entries, preserving feed order.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<Item>, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());
            let author = entry
                .authors
                .into_iter()
                .map(|p| p.name.trim().to_string())
                .find(|name| !name.is_empty());
            let categories = entry
                .categories
                .into_iter()
                .map(|c| c.term)
                .filter(|term| !term.trim().is_empty())
                .collect();
            let published = entry.published.or(entry.updated).map(|dt| dt.timestamp());

            Item {
                id: entry.id.trim().to_string(),
                title,
                author,
                categories,
                published,
            }
        })
        .collect();

    Ok(items)
}
