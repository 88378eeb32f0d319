use std::thread;

use tracing::debug;

use crate::cache::EntityCache;
use crate::domain::{Entity, EntityKind};
use crate::error::PolisError;

/// Outcome of one fan-out: one result per distinct input id, paired with the
/// id and kept in first-seen input order. Callers correlate by id, never by
/// position alone.
#[derive(Debug)]
pub struct FetchOutcome {
    results: Vec<(String, Result<Entity, PolisError>)>,
}

impl FetchOutcome {
    pub fn results(&self) -> &[(String, Result<Entity, PolisError>)] {
        &self.results
    }

    pub fn get(&self, id: &str) -> Option<&Result<Entity, PolisError>> {
        self.results
            .iter()
            .find(|(result_id, _)| result_id == id)
            .map(|(_, result)| result)
    }

    /// First failure by input order, if any fetch failed.
    pub fn first_error(&self) -> Option<&PolisError> {
        self.results
            .iter()
            .find_map(|(_, result)| result.as_ref().err())
    }

    /// All entities in input order, or the first error by input order.
    pub fn into_entities(self) -> Result<Vec<Entity>, PolisError> {
        let mut entities = Vec::with_capacity(self.results.len());
        for (_, result) in self.results {
            entities.push(result?);
        }
        Ok(entities)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Fetches a set of ids concurrently, consulting the cache first. Fresh cache
/// entries short-circuit the fetch entirely; misses are dispatched on scoped
/// threads and their results written back whole-entity. Duplicate input ids
/// collapse to a single underlying fetch.
pub fn fetch_entities<F>(
    cache: &EntityCache,
    kind: EntityKind,
    ids: &[String],
    fetch: F,
) -> FetchOutcome
where
    F: Fn(&str) -> Result<Entity, PolisError> + Sync,
{
    let mut distinct: Vec<&String> = Vec::new();
    for id in ids {
        if !distinct.contains(&id) {
            distinct.push(id);
        }
    }

    let mut hits: Vec<(usize, Entity)> = Vec::new();
    let mut misses: Vec<(usize, &String)> = Vec::new();
    for (index, id) in distinct.iter().enumerate() {
        match cache.get_fresh(kind, id) {
            Some(entity) => hits.push((index, entity)),
            None => misses.push((index, *id)),
        }
    }
    debug!(
        kind = kind.as_str(),
        requested = distinct.len(),
        cached = hits.len(),
        "fan-out"
    );

    let fetched: Vec<(usize, Result<Entity, PolisError>)> = thread::scope(|scope| {
        let handles: Vec<_> = misses
            .iter()
            .map(|(index, id)| {
                let fetch = &fetch;
                let index = *index;
                let id = id.as_str();
                scope.spawn(move || (index, fetch(id)))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("fetch thread panicked"))
            .collect()
    });

    let mut slots: Vec<Option<Result<Entity, PolisError>>> =
        (0..distinct.len()).map(|_| None).collect();
    for (index, entity) in hits {
        slots[index] = Some(Ok(entity));
    }
    for (index, result) in fetched {
        if let Ok(entity) = &result {
            cache.set(entity.clone());
        }
        slots[index] = Some(result);
    }

    FetchOutcome {
        results: distinct
            .into_iter()
            .zip(slots)
            .map(|(id, slot)| (id.clone(), slot.expect("unfilled fetch slot")))
            .collect(),
    }
}

/// Best-effort batch: runs every job, aborts on none, and returns the
/// successes and failures separately. Classification of a partially-failed
/// batch becomes an explicit function of the returned pair.
pub fn gather<T, E, F>(jobs: Vec<F>) -> (Vec<T>, Vec<E>)
where
    F: FnOnce() -> Result<T, E> + Send,
    T: Send,
    E: Send,
{
    let results: Vec<Result<T, E>> = thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| scope.spawn(job))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("gather thread panicked"))
            .collect()
    });

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    for result in results {
        match result {
            Ok(value) => succeeded.push(value),
            Err(err) => failed.push(err),
        }
    }
    (succeeded, failed)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crate::domain::{CountryId, Policy};

    use super::*;

    fn policy(id: &str) -> Entity {
        Entity::Policy(Policy {
            id: id.to_string(),
            country_id: "us".parse::<CountryId>().unwrap(),
            label: None,
            params: Vec::new(),
        })
    }

    #[test]
    fn results_keep_input_order() {
        let cache = EntityCache::new();
        let ids: Vec<String> = ["b", "a", "c"].iter().map(|s| s.to_string()).collect();

        let outcome = fetch_entities(&cache, EntityKind::Policy, &ids, |id| Ok(policy(id)));
        let order: Vec<&str> = outcome
            .results()
            .iter()
            .map(|(id, _)| id.as_str())
            .collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn duplicate_ids_fetch_once() {
        let cache = EntityCache::new();
        let calls = Mutex::new(0usize);
        let ids: Vec<String> = ["a", "a", "a"].iter().map(|s| s.to_string()).collect();

        let outcome = fetch_entities(&cache, EntityKind::Policy, &ids, |id| {
            *calls.lock().unwrap() += 1;
            Ok(policy(id))
        });

        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(outcome.len(), 1);
    }

    #[test]
    fn cache_hit_skips_fetch() {
        let cache = EntityCache::new();
        cache.set(policy("a"));
        let calls = Mutex::new(0usize);
        let ids = vec!["a".to_string()];

        fetch_entities(&cache, EntityKind::Policy, &ids, |id| {
            *calls.lock().unwrap() += 1;
            Ok(policy(id))
        });

        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn first_error_by_input_order() {
        let cache = EntityCache::new();
        let ids: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();

        let outcome = fetch_entities(&cache, EntityKind::Policy, &ids, |id| match id {
            "b" => Err(PolisError::ApiHttp("b failed".to_string())),
            "c" => Err(PolisError::ApiHttp("c failed".to_string())),
            id => Ok(policy(id)),
        });

        match outcome.first_error().unwrap() {
            PolisError::ApiHttp(message) => assert_eq!(message, "b failed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_input_resolves_empty() {
        let cache = EntityCache::new();
        let outcome = fetch_entities(&cache, EntityKind::Policy, &[], |_| {
            panic!("fetch must not run")
        });
        assert!(outcome.is_empty());
        assert!(outcome.first_error().is_none());
    }

    #[test]
    fn gather_partitions_results() {
        let jobs: Vec<Box<dyn FnOnce() -> Result<u32, String> + Send>> = vec![
            Box::new(|| Ok(1)),
            Box::new(|| Err("boom".to_string())),
            Box::new(|| Ok(3)),
        ];

        let (succeeded, failed) = gather(jobs);
        assert_eq!(succeeded, vec![1, 3]);
        assert_eq!(failed, vec!["boom".to_string()]);
    }
}
