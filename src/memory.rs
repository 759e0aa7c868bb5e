//! Typed memory and graph operations built on [`MemVaultClient::send`].

use futures_util::stream::{self, StreamExt};
use serde::Deserialize;

use crate::{
    request::path_with_query, Memory, MemoryLink, MemoryUpdate, MemVaultClient, MemVaultError,
    NewMemory, RelatedMemory, RequestSpec, Result, SearchHit, SearchQuery,
};

/// Maximum concurrent requests issued by bulk operations.
pub const BULK_CONCURRENCY: usize = 5;

#[derive(Deserialize)]
struct MemoryList {
    #[serde(default)]
    memories: Vec<Memory>,
}

#[derive(Deserialize)]
struct SearchResults {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct RelatedList {
    #[serde(default)]
    related: Vec<RelatedMemory>,
}

impl MemVaultClient {
    /// Stores a new memory.
    pub async fn store_memory(&self, memory: NewMemory) -> Result<Memory> {
        self.send_json(RequestSpec::post("/memories").with_json(&memory)?).await
    }

    /// Stores many memories, at most [`BULK_CONCURRENCY`] in flight.
    ///
    /// Results are returned in input order; one failure does not abort the rest.
    pub async fn store_memories<I>(&self, memories: I) -> Vec<Result<Memory>>
    where
        I: IntoIterator<Item = NewMemory>,
    {
        stream::iter(memories)
            .map(|memory| self.store_memory(memory))
            .buffered(BULK_CONCURRENCY)
            .collect()
            .await
    }

    pub async fn get_memory(&self, id: &str) -> Result<Memory> {
        let path = format!("/memories/{}", path_segment(id)?);
        self.send_json(RequestSpec::get(path)).await
    }

    pub async fn update_memory(&self, id: &str, update: MemoryUpdate) -> Result<Memory> {
        let path = format!("/memories/{}", path_segment(id)?);
        self.send_json(RequestSpec::patch(path).with_json(&update)?).await
    }

    pub async fn delete_memory(&self, id: &str) -> Result<()> {
        let path = format!("/memories/{}", path_segment(id)?);
        self.send(RequestSpec::delete(path)).await.map(|_| ())
    }

    /// Lists stored memories, newest first.
    pub async fn list_memories(
        &self,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<Memory>> {
        let path = path_with_query(
            "/memories",
            [
                ("limit", limit.map(|v| v.to_string())),
                ("offset", offset.map(|v| v.to_string())),
            ],
        );
        let list: MemoryList = self.send_json(RequestSpec::get(path)).await?;
        Ok(list.memories)
    }

    pub async fn search_memories(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        if query.query.trim().is_empty() {
            return Err(MemVaultError::InvalidRequest(
                "search query must not be empty".to_owned(),
            ));
        }
        let path = path_with_query(
            "/memories/search",
            [
                ("q", Some(query.query.clone())),
                ("limit", query.limit.map(|v| v.to_string())),
                ("tag", query.tag.clone()),
            ],
        );
        let results: SearchResults = self.send_json(RequestSpec::get(path)).await?;
        Ok(results.results)
    }

    /// Creates a directed edge between two memories.
    pub async fn link_memories(&self, link: &MemoryLink) -> Result<MemoryLink> {
        path_segment(&link.source_id)?;
        path_segment(&link.target_id)?;
        self.send_json(RequestSpec::post("/graph/links").with_json(link)?).await
    }

    /// Walks the graph from `id` up to `depth` hops.
    pub async fn related_memories(
        &self,
        id: &str,
        depth: Option<u32>,
    ) -> Result<Vec<RelatedMemory>> {
        let path = path_with_query(
            &format!("/graph/memories/{}/related", path_segment(id)?),
            [("depth", depth.map(|v| v.to_string()))],
        );
        let related: RelatedList = self.send_json(RequestSpec::get(path)).await?;
        Ok(related.related)
    }
}

fn path_segment(id: &str) -> Result<&str> {
    let valid = !id.is_empty()
        && !id.chars().all(|c| c == '.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));
    if valid {
        Ok(id)
    } else {
        Err(MemVaultError::InvalidRequest(format!("invalid memory id '{id}'")))
    }
}
