// Reference panel cache.
//
// The panel is loaded once per batch and replicated so that concurrent
// lanes never contend on a single copy: lanes 2k and 2k+1 read replica k.
// Replicas are byte-identical and read-only; there is no way to mutate a
// cache after load, so the panel a lane sees is the panel the batch was
// submitted with.

use crate::codec::PackedSequence;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Largest panel the cache will hold
pub const MAX_PANEL_SIZE: usize = 1000;

pub struct ReferenceCache {
    replicas: Vec<Arc<Vec<PackedSequence>>>,
    panel_len: usize,
}

impl ReferenceCache {
    /// Build the replicated cache for a panel and a lane count.
    ///
    /// Panels over [`MAX_PANEL_SIZE`] are rejected with `PanelTooLarge`
    /// rather than truncated: a silently shortened panel would shrink every
    /// result row without any signal to the caller.
    pub fn load(panel: &[PackedSequence], lanes: usize) -> Result<Self> {
        assert!(lanes >= 1, "lane count must be at least 1");
        if panel.len() > MAX_PANEL_SIZE {
            return Err(Error::PanelTooLarge { count: panel.len() });
        }

        // Two adjacent lanes share one replica.
        let replica_count = (lanes + 1) / 2;
        let replicas = (0..replica_count)
            .map(|_| Arc::new(panel.to_vec()))
            .collect();

        log::debug!(
            "reference cache loaded: {} sequences x {} replicas for {} lanes",
            panel.len(),
            replica_count,
            lanes
        );

        Ok(Self {
            replicas,
            panel_len: panel.len(),
        })
    }

    /// Number of sequences in the panel
    pub fn panel_len(&self) -> usize {
        self.panel_len
    }

    /// Number of read-only replicas
    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    /// The replica assigned to a lane (lane / 2). Panics on a lane outside
    /// the count the cache was built for; that is a wiring bug, not input.
    pub fn replica_for_lane(&self, lane: usize) -> Arc<Vec<PackedSequence>> {
        Arc::clone(&self.replicas[lane / 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel(n: usize) -> Vec<PackedSequence> {
        (0..n)
            .map(|_| PackedSequence::pack(b"ACGT").unwrap())
            .collect()
    }

    #[test]
    fn replica_count_is_half_the_lanes_rounded_up() {
        assert_eq!(ReferenceCache::load(&panel(3), 1).unwrap().replica_count(), 1);
        assert_eq!(ReferenceCache::load(&panel(3), 2).unwrap().replica_count(), 1);
        assert_eq!(ReferenceCache::load(&panel(3), 5).unwrap().replica_count(), 3);
        assert_eq!(ReferenceCache::load(&panel(3), 20).unwrap().replica_count(), 10);
    }

    #[test]
    fn adjacent_lanes_share_a_replica() {
        let cache = ReferenceCache::load(&panel(2), 6).unwrap();
        assert!(Arc::ptr_eq(
            &cache.replica_for_lane(0),
            &cache.replica_for_lane(1)
        ));
        assert!(!Arc::ptr_eq(
            &cache.replica_for_lane(1),
            &cache.replica_for_lane(2)
        ));
    }

    #[test]
    fn replicas_are_identical() {
        let refs = panel(5);
        let cache = ReferenceCache::load(&refs, 4).unwrap();
        for lane in 0..4 {
            assert_eq!(*cache.replica_for_lane(lane), refs);
        }
    }

    #[test]
    fn rejects_over_cap_panels() {
        let too_big = panel(MAX_PANEL_SIZE + 1);
        assert!(matches!(
            ReferenceCache::load(&too_big, 4),
            Err(Error::PanelTooLarge { count: 1001 })
        ));
    }
}
