use crate::error::SourceResult;
use crate::types::{Listing, RepositoryRef, SearchHit, SearchScope};
use async_trait::async_trait;

/// Remote repository tree reachable through a listing/content/search API.
///
/// Implementations own transport concerns (auth headers, pagination, retry
/// policy). Components receive one as `Arc<dyn RepositorySource>` at
/// construction time.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Short identifier reported in response metadata.
    fn name(&self) -> &'static str;

    async fn list(
        &self,
        repo: &RepositoryRef,
        path: &str,
        git_ref: Option<&str>,
    ) -> SourceResult<Listing>;

    async fn read_file(
        &self,
        repo: &RepositoryRef,
        path: &str,
        git_ref: Option<&str>,
    ) -> SourceResult<Vec<u8>>;

    /// Hits in the collaborator's own ranking order, restricted to `scope`.
    async fn search_text(
        &self,
        repo: &RepositoryRef,
        query: &str,
        scope: &SearchScope,
    ) -> SourceResult<Vec<SearchHit>>;
}
