//! Endpoint pool: the set of reachable search nodes.
//!
//! Every query picks its node independently and uniformly at random, which
//! spreads load evenly over many queries without any shared counters. The
//! pool is immutable after construction and safe to share without locking.

use std::collections::HashSet;

use rand::Rng;

use alias_mapper_repository::Endpoint;

use crate::errors::PipelineError;

#[derive(Debug, Clone)]
pub struct EndpointPool {
    endpoints: Vec<Endpoint>,
}

impl EndpointPool {
    /// Build a pool, dropping duplicate endpoints.
    ///
    /// # Returns
    ///
    /// * `Err(PipelineError::ConfigError)` - If no endpoint is given
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self, PipelineError> {
        let mut seen = HashSet::new();
        let endpoints: Vec<Endpoint> = endpoints
            .into_iter()
            .filter(|endpoint| seen.insert(endpoint.clone()))
            .collect();

        if endpoints.is_empty() {
            return Err(PipelineError::config("endpoint pool is empty"));
        }

        Ok(Self { endpoints })
    }

    /// Pick one endpoint uniformly at random.
    pub fn pick(&self) -> &Endpoint {
        let i = rand::thread_rng().gen_range(0..self.endpoints.len());
        &self.endpoints[i]
    }

    /// Pick uniformly among the endpoints other than `avoid`.
    ///
    /// Falls back to [`pick`](Self::pick) when `avoid` is the only endpoint
    /// or not part of the pool.
    pub fn pick_excluding(&self, avoid: &Endpoint) -> &Endpoint {
        let Some(pos) = self.endpoints.iter().position(|e| e == avoid) else {
            return self.pick();
        };
        if self.endpoints.len() == 1 {
            return &self.endpoints[0];
        }

        let mut i = rand::thread_rng().gen_range(0..self.endpoints.len() - 1);
        if i >= pos {
            i += 1;
        }
        &self.endpoints[i]
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn endpoints(ports: &[u16]) -> Vec<Endpoint> {
        ports
            .iter()
            .map(|p| Endpoint::parse(&format!("http://localhost:{}", p)).unwrap())
            .collect()
    }

    #[test]
    fn test_empty_pool_is_config_error() {
        assert!(matches!(
            EndpointPool::new(Vec::new()),
            Err(PipelineError::ConfigError(_))
        ));
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let pool = EndpointPool::new(endpoints(&[9501, 9502, 9501])).unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_pick_covers_every_endpoint() {
        let pool = EndpointPool::new(endpoints(&[9501, 9502, 9503, 9504])).unwrap();
        let mut counts: HashMap<Endpoint, usize> = HashMap::new();

        for _ in 0..4000 {
            *counts.entry(pool.pick().clone()).or_default() += 1;
        }

        assert_eq!(counts.len(), 4);
        // uniform draws: each node gets roughly a quarter
        assert!(counts.values().all(|&c| c > 700 && c < 1300));
    }

    #[test]
    fn test_pick_excluding_never_returns_avoided() {
        let all = endpoints(&[9501, 9502, 9503]);
        let pool = EndpointPool::new(all.clone()).unwrap();

        for _ in 0..500 {
            assert_ne!(pool.pick_excluding(&all[1]), &all[1]);
        }
    }

    #[test]
    fn test_pick_excluding_single_endpoint() {
        let all = endpoints(&[9501]);
        let pool = EndpointPool::new(all.clone()).unwrap();
        assert_eq!(pool.pick_excluding(&all[0]), &all[0]);
    }
}
