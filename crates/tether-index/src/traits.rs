use tether_types::ContentAddress;

use crate::error::IndexResult;

/// Suffix -> latest applied anchor.
///
/// Implementations must apply `put_bulk` all-or-nothing and must never roll
/// a suffix back on their own; callers decide whether a newer anchor
/// supersedes the recorded one.
pub trait DidAnchorIndex: Send + Sync {
    /// Record `address` as the latest anchor for every suffix in `suffixes`.
    fn put_bulk(&self, suffixes: &[String], address: &ContentAddress) -> IndexResult<()>;

    /// Latest anchor for `suffix`, or `None` if it was never indexed.
    fn get(&self, suffix: &str) -> IndexResult<Option<ContentAddress>>;

    /// [`get`](Self::get) for several suffixes, in input order.
    fn get_bulk(&self, suffixes: &[String]) -> IndexResult<Vec<Option<ContentAddress>>> {
        suffixes.iter().map(|s| self.get(s)).collect()
    }
}
