//! Reference documents published by peers.
//!
//! Peers expose lists of references (followers, witnesses, anchor
//! references) as ActivityPub-style objects. A document is decoded by
//! peeking its `type` field and decoding into the matching variant; an
//! unrecognized type is rejected.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::transport::HttpFetcher;

/// A single service actor.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ServiceDoc {
    pub id: String,
}

/// A (possibly ordered) collection that points at its first page.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDoc {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub total_items: u64,
    #[serde(default)]
    pub first: Option<String>,
}

/// One page of a collection.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDoc {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "orderedItems")]
    pub items: Vec<Value>,
    #[serde(default)]
    pub next: Option<String>,
}

impl PageDoc {
    /// Item references: plain IRIs, or the `id` of embedded objects.
    pub fn references(&self) -> DiscoveryResult<Vec<String>> {
        self.items
            .iter()
            .map(|item| match item {
                Value::String(iri) => Ok(iri.clone()),
                Value::Object(obj) => obj
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| DiscoveryError::Decode("collection item without id".into())),
                other => Err(DiscoveryError::Decode(format!("unexpected collection item {other}"))),
            })
            .collect()
    }
}

/// Closed set of reference documents this node understands.
#[derive(Clone, Debug, PartialEq)]
pub enum ReferenceDocument {
    Service(ServiceDoc),
    Collection(CollectionDoc),
    OrderedCollection(CollectionDoc),
    CollectionPage(PageDoc),
    OrderedCollectionPage(PageDoc),
}

impl ReferenceDocument {
    pub fn from_json(data: &[u8]) -> DiscoveryResult<Self> {
        let value: Value =
            serde_json::from_slice(data).map_err(|e| DiscoveryError::Decode(e.to_string()))?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| DiscoveryError::Decode("missing type".into()))?
            .to_string();

        match kind.as_str() {
            "Service" => decode(value).map(Self::Service),
            "Collection" => decode(value).map(Self::Collection),
            "OrderedCollection" => decode(value).map(Self::OrderedCollection),
            "CollectionPage" => decode(value).map(Self::CollectionPage),
            "OrderedCollectionPage" => decode(value).map(Self::OrderedCollectionPage),
            _ => Err(DiscoveryError::UnknownType(kind)),
        }
    }

    fn into_page(self) -> Option<PageDoc> {
        match self {
            Self::CollectionPage(page) | Self::OrderedCollectionPage(page) => Some(page),
            _ => None,
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> DiscoveryResult<T> {
    serde_json::from_value(value).map_err(|e| DiscoveryError::Decode(e.to_string()))
}

/// Walks every reference reachable from a reference document, fetching
/// collection pages lazily.
pub struct ReferenceIterator {
    fetcher: Arc<dyn HttpFetcher>,
    pending: VecDeque<String>,
    next_page: Option<String>,
    visited: HashSet<String>,
    total_items: Option<u64>,
}

impl ReferenceIterator {
    /// Fetch the document at `url` and prepare to iterate its references.
    pub async fn open(fetcher: Arc<dyn HttpFetcher>, url: &str) -> DiscoveryResult<Self> {
        let body = fetcher.get(url).await?;
        let mut iter = Self {
            fetcher,
            pending: VecDeque::new(),
            next_page: None,
            visited: HashSet::from([url.to_string()]),
            total_items: None,
        };

        match ReferenceDocument::from_json(&body)? {
            ReferenceDocument::Service(service) => iter.pending.push_back(service.id),
            ReferenceDocument::Collection(c) | ReferenceDocument::OrderedCollection(c) => {
                iter.total_items = Some(c.total_items);
                iter.next_page = c.first;
            }
            ReferenceDocument::CollectionPage(page)
            | ReferenceDocument::OrderedCollectionPage(page) => iter.absorb(page)?,
        }
        Ok(iter)
    }

    /// `totalItems` as advertised by the collection, if it was one.
    pub fn total_items(&self) -> Option<u64> {
        self.total_items
    }

    /// Next reference, or `None` once every page has been consumed.
    pub async fn next(&mut self) -> DiscoveryResult<Option<String>> {
        loop {
            if let Some(reference) = self.pending.pop_front() {
                return Ok(Some(reference));
            }
            let Some(url) = self.next_page.take() else {
                return Ok(None);
            };
            if !self.visited.insert(url.clone()) {
                return Err(DiscoveryError::Decode(format!("collection page cycle at {url}")));
            }
            let body = self.fetcher.get(&url).await?;
            let page = ReferenceDocument::from_json(&body)?
                .into_page()
                .ok_or_else(|| DiscoveryError::Decode(format!("{url} is not a collection page")))?;
            self.absorb(page)?;
        }
    }

    /// Drain the iterator into a vector.
    pub async fn collect_all(mut self) -> DiscoveryResult<Vec<String>> {
        let mut out = Vec::new();
        while let Some(reference) = self.next().await? {
            out.push(reference);
        }
        Ok(out)
    }

    fn absorb(&mut self, page: PageDoc) -> DiscoveryResult<()> {
        self.pending.extend(page.references()?);
        self.next_page = page.next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StaticFetcher;
    use tether_types::{Classify, ErrorClass};

    #[test]
    fn decodes_each_variant() {
        let service = br#"{"type":"Service","id":"https://p/services/node"}"#;
        assert!(matches!(
            ReferenceDocument::from_json(service).unwrap(),
            ReferenceDocument::Service(ServiceDoc { ref id }) if id == "https://p/services/node"
        ));

        let coll = br#"{"type":"OrderedCollection","totalItems":3,"first":"https://p/c?page=1"}"#;
        match ReferenceDocument::from_json(coll).unwrap() {
            ReferenceDocument::OrderedCollection(c) => {
                assert_eq!(c.total_items, 3);
                assert_eq!(c.first.as_deref(), Some("https://p/c?page=1"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let page = br#"{"type":"OrderedCollectionPage","orderedItems":["a",{"id":"b"}]}"#;
        let page = ReferenceDocument::from_json(page).unwrap().into_page().unwrap();
        assert_eq!(page.references().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn unknown_type_is_malformed() {
        let err = ReferenceDocument::from_json(br#"{"type":"Note"}"#).unwrap_err();
        assert!(matches!(err, DiscoveryError::UnknownType(ref t) if t == "Note"));
        assert_eq!(err.class(), ErrorClass::Malformed);
        assert!(ReferenceDocument::from_json(br#"{"id":"x"}"#).is_err());
    }

    #[tokio::test]
    async fn iterates_across_pages() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.serve(
            "https://p/c",
            br#"{"type":"Collection","totalItems":3,"first":"https://p/c/1"}"#.to_vec(),
        );
        fetcher.serve(
            "https://p/c/1",
            br#"{"type":"CollectionPage","items":["r1","r2"],"next":"https://p/c/2"}"#.to_vec(),
        );
        fetcher.serve("https://p/c/2", br#"{"type":"CollectionPage","items":["r3"]}"#.to_vec());

        let iter = ReferenceIterator::open(fetcher.clone(), "https://p/c").await.unwrap();
        assert_eq!(iter.total_items(), Some(3));
        assert_eq!(iter.collect_all().await.unwrap(), vec!["r1", "r2", "r3"]);
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn service_yields_single_reference() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.serve("https://p/s", br#"{"type":"Service","id":"https://p/s"}"#.to_vec());
        let refs = ReferenceIterator::open(fetcher, "https://p/s")
            .await
            .unwrap()
            .collect_all()
            .await
            .unwrap();
        assert_eq!(refs, vec!["https://p/s"]);
    }

    #[tokio::test]
    async fn page_cycle_is_rejected() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.serve(
            "https://p/c/1",
            br#"{"type":"CollectionPage","items":["r1"],"next":"https://p/c/1"}"#.to_vec(),
        );
        let mut iter = ReferenceIterator::open(fetcher, "https://p/c/1").await.unwrap();
        assert_eq!(iter.next().await.unwrap().as_deref(), Some("r1"));
        assert!(iter.next().await.is_err());
    }
}
