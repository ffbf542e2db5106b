use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

/// Number of reads handed to each chunk server since the master started.
///
/// Counters only grow: a client that never follows up on an assignment still
/// counts, and finished reads are never subtracted.
#[derive(Clone, Debug, Default)]
pub struct LoadTracker {
    loads: Arc<Mutex<HashMap<String, u64>>>,
}

impl LoadTracker {
    pub fn new(server_ids: &[String]) -> Self {
        let loads = server_ids.iter().map(|id| (id.clone(), 0)).collect();
        Self {
            loads: Arc::new(Mutex::new(loads)),
        }
    }
    pub async fn load_of(&self, server_id: &str) -> u64 {
        self.loads
            .lock()
            .await
            .get(server_id)
            .copied()
            .unwrap_or_default()
    }
    /// Picks the least loaded of `candidates` and bumps its counter under
    /// one lock. Ties go to the candidate listed first.
    pub async fn assign_least_loaded(&self, candidates: &[String]) -> Option<(String, u64)> {
        let mut loads = self.loads.lock().await;
        let mut chosen: Option<(&String, u64)> = None;
        for candidate in candidates {
            let load = loads.get(candidate).copied().unwrap_or_default();
            match chosen {
                Some((_, lowest)) if lowest <= load => {}
                _ => chosen = Some((candidate, load)),
            }
        }
        let (server_id, _) = chosen?;
        let load = loads.entry(server_id.clone()).or_default();
        *load += 1;
        Some((server_id.clone(), *load))
    }
    #[cfg(test)]
    pub async fn snapshot(&self) -> HashMap<String, u64> {
        self.loads.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn ties_go_to_the_first_candidate() {
        let tracker = LoadTracker::new(&ids(&["A", "B", "C"]));
        assert_eq!(
            tracker.assign_least_loaded(&ids(&["B", "A", "C"])).await,
            Some(("B".to_owned(), 1))
        );
        assert_eq!(
            tracker.assign_least_loaded(&ids(&["B", "A", "C"])).await,
            Some(("A".to_owned(), 1))
        );
        assert_eq!(
            tracker.assign_least_loaded(&ids(&["B", "A", "C"])).await,
            Some(("C".to_owned(), 1))
        );
    }

    #[tokio::test]
    async fn prefers_lowest_counter() {
        let tracker = LoadTracker::new(&ids(&["A", "B"]));
        tracker.assign_least_loaded(&ids(&["A"])).await;
        tracker.assign_least_loaded(&ids(&["A"])).await;
        let (chosen, load) = tracker
            .assign_least_loaded(&ids(&["A", "B"]))
            .await
            .unwrap();
        assert_eq!((chosen.as_str(), load), ("B", 1));
        assert_eq!(tracker.load_of("A").await, 2);
    }

    #[tokio::test]
    async fn no_candidates_no_assignment() {
        let tracker = LoadTracker::new(&ids(&["A"]));
        assert_eq!(tracker.assign_least_loaded(&[]).await, None);
        assert_eq!(tracker.load_of("A").await, 0);
    }
}
