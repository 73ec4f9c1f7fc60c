use std::fmt;

use storefront_search::QueryDescriptor;

use super::backend::CacheError;

/// A cache key whose first segment is always the owning topic.
///
/// Keys can only be built through the constructors below, which keeps topic
/// sweeps (`*topic*`) able to reach every entry written for that topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// `{topic}:list:{descriptor-json}`. The descriptor serializes with sorted
    /// filters, so equal queries map to the same key.
    pub fn for_list(topic: &str, descriptor: &QueryDescriptor) -> Result<Self, CacheError> {
        let encoded = serde_json::to_string(descriptor)?;
        Ok(Self(format!("{topic}:list:{encoded}")))
    }

    pub fn for_document(topic: &str, id: &str) -> Self {
        Self(format!("{topic}:doc:{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
