use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use tether_cas::ContentResolver;
use tether_types::{AnchorCredential, Classify, ContentAddress, DiscoveryHint, ErrorClass};

use crate::error::{GraphError, GraphResult};

/// Upper bound on the number of anchors a single history walk may visit.
pub const DEFAULT_MAX_DEPTH: usize = 10_000;

/// An anchor credential together with the address it was read from.
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorNode {
    pub address: ContentAddress,
    pub credential: AnchorCredential,
}

/// The result of a bounded history walk for one suffix.
#[derive(Clone, Debug, PartialEq)]
pub struct DidHistory {
    /// Anchors visited, oldest first, ending at the anchor the walk started at.
    pub anchors: Vec<AnchorNode>,
    /// Whether the walk stopped because it reached the requested stop anchor
    /// (as opposed to reaching the suffix's first anchor).
    pub reached_stop: bool,
}

/// Read access to the anchor DAG through a content resolver.
#[derive(Debug)]
pub struct AnchorGraph {
    resolver: Arc<ContentResolver>,
    max_depth: usize,
}

impl AnchorGraph {
    pub fn new(resolver: Arc<ContentResolver>) -> Self {
        Self {
            resolver,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn resolver(&self) -> &Arc<ContentResolver> {
        &self.resolver
    }

    /// Serialize `credential` and write it through the resolver.
    pub fn add(&self, credential: &AnchorCredential) -> GraphResult<ContentAddress> {
        let bytes = credential
            .to_json()
            .map_err(|e| GraphError::Serialization(e.to_string()))?;
        let address = self.resolver.write(&bytes)?;
        debug!(
            address = %address.short(),
            namespace = %credential.payload().namespace,
            "added anchor"
        );
        Ok(address)
    }

    /// Fetch and decode exactly one anchor credential.
    pub async fn read(
        &self,
        address: &ContentAddress,
        hint: Option<&DiscoveryHint>,
    ) -> GraphResult<AnchorCredential> {
        let bytes = match self.resolver.resolve(address, hint).await {
            Ok(bytes) => bytes,
            Err(e) if e.class() == ErrorClass::NotFound => {
                return Err(GraphError::AnchorNotFound(address.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        AnchorCredential::from_json(&bytes).map_err(|e| GraphError::Malformed {
            address: address.clone(),
            reason: e.to_string(),
        })
    }

    /// Full history of `suffix` ending at `address`, oldest first.
    ///
    /// For an anchor whose chain of previous links for `suffix` has length
    /// n, the result holds n + 1 entries.
    pub async fn get_did_anchors(
        &self,
        address: &ContentAddress,
        suffix: &str,
        hint: Option<&DiscoveryHint>,
    ) -> GraphResult<Vec<AnchorNode>> {
        Ok(self
            .get_did_anchors_until(address, suffix, None, hint)
            .await?
            .anchors)
    }

    /// History of `suffix` ending at `address`, stopping before `stop_at`.
    ///
    /// `stop_at` itself is never included. If `address == stop_at` the
    /// history is empty and `reached_stop` is set.
    pub async fn get_did_anchors_until(
        &self,
        address: &ContentAddress,
        suffix: &str,
        stop_at: Option<&ContentAddress>,
        hint: Option<&DiscoveryHint>,
    ) -> GraphResult<DidHistory> {
        let mut anchors: Vec<AnchorNode> = Vec::new();
        let mut visited = HashSet::new();
        let mut current = address.clone();
        let mut reached_stop = false;

        loop {
            if stop_at == Some(&current) {
                reached_stop = true;
                break;
            }
            if anchors.len() >= self.max_depth {
                return Err(GraphError::DepthExceeded {
                    suffix: suffix.to_string(),
                    max_depth: self.max_depth,
                });
            }
            if !visited.insert(current.clone()) {
                return Err(GraphError::Malformed {
                    address: current,
                    reason: format!("previous-anchor cycle for suffix {suffix}"),
                });
            }

            let credential = match self.read(&current, hint).await {
                Ok(credential) => credential,
                Err(GraphError::AnchorNotFound(missing)) => {
                    return Err(match anchors.last() {
                        Some(last) => GraphError::MissingLink {
                            anchor: last.address.clone(),
                            missing,
                            suffix: suffix.to_string(),
                        },
                        None => GraphError::AnchorNotFound(missing),
                    });
                }
                Err(e) => return Err(e),
            };

            let previous = credential
                .payload()
                .previous_anchor(suffix)
                .map_err(|e| GraphError::Malformed {
                    address: current.clone(),
                    reason: e.to_string(),
                })?;

            anchors.push(AnchorNode {
                address: current,
                credential,
            });

            match previous {
                Some(previous) => current = previous,
                None => break,
            }
        }

        anchors.reverse();
        debug!(
            address = %address.short(),
            suffix,
            len = anchors.len(),
            reached_stop,
            "walked anchor history"
        );
        Ok(DidHistory {
            anchors,
            reached_stop,
        })
    }

    /// Whether `candidate` is `descendant` itself or one of its ancestors
    /// along `suffix`'s history.
    pub async fn is_ancestor(
        &self,
        candidate: &ContentAddress,
        descendant: &ContentAddress,
        suffix: &str,
        hint: Option<&DiscoveryHint>,
    ) -> GraphResult<bool> {
        Ok(self
            .get_did_anchors_until(descendant, suffix, Some(candidate), hint)
            .await?
            .reached_stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_discovery::StaticFetcher;
    use tether_store::{ContentStore, InMemoryContentStore};
    use tether_types::AnchorPayload;

    fn graph() -> AnchorGraph {
        let resolver = ContentResolver::new(
            Arc::new(InMemoryContentStore::new()),
            Arc::new(StaticFetcher::new()),
        );
        AnchorGraph::new(Arc::new(resolver))
    }

    fn anchor(core: &str, links: &[(&str, Option<&ContentAddress>)]) -> AnchorCredential {
        let payload = links
            .iter()
            .fold(AnchorPayload::new("did:tether", 1, core), |p, (suffix, prev)| {
                p.with_previous(*suffix, *prev)
            });
        AnchorCredential::new("https://node1.example.com", payload)
    }

    /// Chain of `len` anchors for suffix "d1"; returns addresses oldest first.
    fn chain(g: &AnchorGraph, len: usize) -> Vec<ContentAddress> {
        let mut addrs: Vec<ContentAddress> = Vec::new();
        for i in 0..len {
            let vc = anchor(&format!("core{i}"), &[("d1", addrs.last())]);
            addrs.push(g.add(&vc).unwrap());
        }
        addrs
    }

    fn addresses(nodes: &[AnchorNode]) -> Vec<ContentAddress> {
        nodes.iter().map(|n| n.address.clone()).collect()
    }

    // ------------------------------------------------------------------
    // add / read
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn add_then_read() {
        let g = graph();
        let vc = anchor("core", &[("d1", None)]);
        let addr = g.add(&vc).unwrap();
        assert_eq!(g.add(&vc).unwrap(), addr);
        assert_eq!(g.read(&addr, None).await.unwrap(), vc);
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let g = graph();
        let err = g.read(&ContentAddress::of(b"nope"), None).await.unwrap_err();
        assert!(matches!(err, GraphError::AnchorNotFound(_)));
        assert_eq!(err.class(), ErrorClass::NotFound);
    }

    #[tokio::test]
    async fn read_garbage_is_malformed() {
        let g = graph();
        let addr = g.resolver().write(b"{\"not\":\"a credential\"}").unwrap();
        let err = g.read(&addr, None).await.unwrap_err();
        assert!(matches!(err, GraphError::Malformed { .. }));
        assert_eq!(err.class(), ErrorClass::Malformed);
    }

    // ------------------------------------------------------------------
    // History walks
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn history_is_oldest_first_with_n_plus_one_entries() {
        let g = graph();
        let addrs = chain(&g, 4);
        let history = g.get_did_anchors(&addrs[3], "d1", None).await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(addresses(&history), addrs);
        assert_eq!(history.last().unwrap().address, addrs[3]);
    }

    #[tokio::test]
    async fn genesis_history_has_one_entry() {
        let g = graph();
        let addrs = chain(&g, 1);
        let history = g.get_did_anchors(&addrs[0], "d1", None).await.unwrap();
        assert_eq!(addresses(&history), addrs);
    }

    #[tokio::test]
    async fn histories_follow_their_own_suffix() {
        let g = graph();
        let a1 = g.add(&anchor("a1", &[("d1", None)])).unwrap();
        let b1 = g.add(&anchor("b1", &[("d2", None)])).unwrap();
        let both = g
            .add(&anchor("both", &[("d1", Some(&a1)), ("d2", Some(&b1))]))
            .unwrap();

        let d1 = g.get_did_anchors(&both, "d1", None).await.unwrap();
        let d2 = g.get_did_anchors(&both, "d2", None).await.unwrap();
        assert_eq!(addresses(&d1), vec![a1, both.clone()]);
        assert_eq!(addresses(&d2), vec![b1, both]);
    }

    #[tokio::test]
    async fn untouched_suffix_is_malformed() {
        let g = graph();
        let addrs = chain(&g, 2);
        let err = g.get_did_anchors(&addrs[1], "other", None).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Malformed);
    }

    #[tokio::test]
    async fn missing_middle_link_is_transient() {
        let g = graph();
        let addrs = chain(&g, 3);
        g.resolver().store().delete(&addrs[1]).unwrap();

        let err = g.get_did_anchors(&addrs[2], "d1", None).await.unwrap_err();
        match &err {
            GraphError::MissingLink { anchor, missing, suffix } => {
                assert_eq!(anchor, &addrs[2]);
                assert_eq!(missing, &addrs[1]);
                assert_eq!(suffix, "d1");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.class().is_retryable());
    }

    #[tokio::test]
    async fn depth_bound_is_enforced() {
        let g = graph().with_max_depth(3);
        let addrs = chain(&g, 5);
        let err = g.get_did_anchors(&addrs[4], "d1", None).await.unwrap_err();
        assert!(matches!(err, GraphError::DepthExceeded { max_depth: 3, .. }));
        assert_eq!(err.class(), ErrorClass::Malformed);
        assert_eq!(g.get_did_anchors(&addrs[2], "d1", None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn walk_stops_before_stop_anchor() {
        let g = graph();
        let addrs = chain(&g, 4);

        let tail = g
            .get_did_anchors_until(&addrs[3], "d1", Some(&addrs[1]), None)
            .await
            .unwrap();
        assert!(tail.reached_stop);
        assert_eq!(addresses(&tail.anchors), addrs[2..].to_vec());

        let same = g
            .get_did_anchors_until(&addrs[3], "d1", Some(&addrs[3]), None)
            .await
            .unwrap();
        assert!(same.reached_stop);
        assert!(same.anchors.is_empty());
    }

    #[tokio::test]
    async fn walk_without_reaching_stop() {
        let g = graph();
        let addrs = chain(&g, 2);
        let unrelated = g.add(&anchor("x", &[("d1", None)])).unwrap();
        let history = g
            .get_did_anchors_until(&addrs[1], "d1", Some(&unrelated), None)
            .await
            .unwrap();
        assert!(!history.reached_stop);
        assert_eq!(addresses(&history.anchors), addrs);
    }

    #[tokio::test]
    async fn ancestry_checks() {
        let g = graph();
        let addrs = chain(&g, 3);
        let fork = g.add(&anchor("fork", &[("d1", Some(&addrs[0]))])).unwrap();

        assert!(g.is_ancestor(&addrs[0], &addrs[2], "d1", None).await.unwrap());
        assert!(g.is_ancestor(&addrs[2], &addrs[2], "d1", None).await.unwrap());
        assert!(!g.is_ancestor(&addrs[2], &addrs[0], "d1", None).await.unwrap());
        assert!(!g.is_ancestor(&addrs[1], &fork, "d1", None).await.unwrap());
    }

    #[tokio::test]
    async fn history_resolves_through_hint() {
        let peer = InMemoryContentStore::new();
        let http = Arc::new(StaticFetcher::new());
        let mut prev: Option<ContentAddress> = None;
        let mut addrs = Vec::new();
        for i in 0..3 {
            let bytes = anchor(&format!("remote{i}"), &[("d1", prev.as_ref())])
                .to_json()
                .unwrap();
            let addr = peer.put(&bytes).unwrap();
            http.serve(format!("https://peer.example.com/cas/{addr}"), bytes);
            prev = Some(addr.clone());
            addrs.push(addr);
        }

        let resolver = ContentResolver::new(Arc::new(InMemoryContentStore::new()), http.clone());
        let g = AnchorGraph::new(Arc::new(resolver));
        let hint = DiscoveryHint::parse("https://peer.example.com/cas").unwrap();

        let history = g.get_did_anchors(&addrs[2], "d1", Some(&hint)).await.unwrap();
        assert_eq!(addresses(&history), addrs);
        assert_eq!(http.calls(), 3);

        g.get_did_anchors(&addrs[2], "d1", Some(&hint)).await.unwrap();
        assert_eq!(http.calls(), 3);
    }
}
