use async_trait::async_trait;

use crate::query::QueryDescriptor;

/// Optional post-processor that may rewrite a translated query.
///
/// Enhancers run in registration order after translation. Any of them may be
/// absent; a failing enhancer is skipped and the previous descriptor is kept.
#[async_trait]
pub trait QueryEnhancer: Send + Sync {
    /// Short identifier used in logs and metrics.
    fn name(&self) -> &str;

    /// Returns a possibly modified descriptor for `original_text`.
    async fn enhance(
        &self,
        descriptor: QueryDescriptor,
        original_text: &str,
    ) -> anyhow::Result<QueryDescriptor>;
}
