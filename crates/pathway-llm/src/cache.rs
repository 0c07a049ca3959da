use mini_moka::sync::Cache;
use pathway_config::CacheConfig;
use sha2::{Digest, Sha256};

use crate::types::{AiRequest, AiResponse};

/// TTL cache of answers to low-temperature requests
#[derive(Clone)]
pub struct ResponseCache {
    cache: Cache<String, AiResponse>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.ttl)
            .build();

        Self { cache }
    }

    /// Cached answer for an identical request
    pub fn get(&self, request: &AiRequest) -> Option<AiResponse> {
        self.cache.get(&cache_key(request))
    }

    pub fn insert(&self, request: &AiRequest, response: AiResponse) {
        self.cache.insert(cache_key(request), response);
    }

    /// Approximate number of cached answers
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache").field("entries", &self.len()).finish()
    }
}

/// Hash of the tagged request payload
fn cache_key(request: &AiRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.use_case().as_bytes());
    hasher.update(b":");
    if let Ok(payload) = serde_json::to_vec(request) {
        hasher.update(&payload);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn math(problem: &str) -> AiRequest {
        serde_json::from_value(json!({"use_case": "mathematics", "problem": problem})).unwrap()
    }

    fn answer(content: &str) -> AiResponse {
        AiResponse {
            model_id: "a".to_owned(),
            use_case: "mathematics".to_owned(),
            content: content.to_owned(),
            data: None,
            usage: None,
        }
    }

    fn cache() -> ResponseCache {
        ResponseCache::new(&CacheConfig {
            enabled: true,
            ttl: Duration::from_secs(60),
            max_capacity: 100,
        })
    }

    #[test]
    fn identical_requests_share_an_entry() {
        let cache = cache();
        cache.insert(&math("2 + 2"), answer("4"));

        assert_eq!(cache.get(&math("2 + 2")).map(|r| r.content), Some("4".to_owned()));
        assert!(cache.get(&math("3 + 3")).is_none());
    }

    #[test]
    fn keys_differ_by_payload() {
        assert_eq!(cache_key(&math("x")), cache_key(&math("x")));
        assert_ne!(cache_key(&math("x")), cache_key(&math("y")));
        assert_eq!(cache_key(&math("x")).len(), 64);
    }
}
