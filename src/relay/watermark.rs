/// Only Reddit link posts (`t3_`) are relayed; comments, accounts and
/// subreddits use other type prefixes.
pub const LINK_PREFIX: &str = "t3_";

/// Decode a feed item id into its watermark key.
///
/// Returns the numeric key and the id suffix (the base-36 part after the
/// prefix, used for short links). `None` means the item is not eligible:
/// wrong type prefix, empty suffix, non base-36 characters, or a value that
/// overflows `u64`.
///
/// # Examples
///
/// ```
/// use feedrelay::relay::decode_key;
///
/// assert_eq!(decode_key("t3_AB"), Some((371, "AB")));
/// assert_eq!(decode_key("t1_AB"), None);
/// ```
pub fn decode_key(id: &str) -> Option<(u64, &str)> {
    let suffix = id.strip_prefix(LINK_PREFIX)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    // from_str_radix accepts either case for digits above 9.
    let key = u64::from_str_radix(suffix, 36).ok()?;
    Some((key, suffix))
}

/// Highest item key processed so far.
///
/// Owned by the poll controller; nothing else mutates it. Between cycles it
/// holds the maximum key observed by the previous completed cycle, which may
/// be lower than the value before that cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Watermark {
    highest: Option<u64>,
}

impl Watermark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn highest(&self) -> Option<u64> {
        self.highest
    }

    /// Whether `key` lies above the watermark. Everything is new until a
    /// value has been recorded.
    pub fn is_new(&self, key: u64) -> bool {
        self.highest.map_or(true, |highest| key > highest)
    }

    /// Record the baseline found by the first run.
    pub fn seed(&mut self, max: Option<u64>) {
        self.highest = max;
    }

    /// End-of-cycle update: the cycle maximum replaces the watermark, even
    /// when it is lower. A cycle that saw no eligible item holds the value.
    pub fn replace(&mut self, cycle_max: Option<u64>) {
        if let Some(max) = cycle_max {
            self.highest = Some(max);
        }
    }
}
