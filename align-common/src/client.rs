//! Stack service client
//!
//! `StackClient` is the seam between the reconciliation core and the render
//! web service; `RenderClient` is the reqwest implementation. Tests use the
//! in-memory implementation from [`crate::testing`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::collection::ResolvedTileSpecCollection;
use crate::error::{Error, Result};
use crate::spec::TileSpec;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("render-align/", env!("CARGO_PKG_VERSION"));

/// One section id with its canonical z value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionData {
    pub section_id: String,
    pub z: f64,
}

/// Stack lifecycle state. COMPLETE is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StackState {
    Loading,
    Complete,
    Offline,
}

impl StackState {
    fn as_path_segment(self) -> &'static str {
        match self {
            StackState::Loading => "LOADING",
            StackState::Complete => "COMPLETE",
            StackState::Offline => "OFFLINE",
        }
    }
}

/// Identity of a stack within the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackId {
    pub owner: String,
    pub project: String,
    pub stack: String,
}

/// Version parameters carried over when deriving one stack from another.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackVersion {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_step_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_resolution_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_resolution_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_resolution_z: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_notes: Option<String>,
}

/// Stack metadata as served by the stack service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackMetaData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_id: Option<StackId>,
    pub state: StackState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_version: Option<StackVersion>,
}

/// Operations the reconciliation core needs from the stack store.
#[async_trait]
pub trait StackClient: Send + Sync {
    /// Fetch one tile spec by id.
    async fn get_tile(&self, stack: &str, tile_id: &str) -> Result<TileSpec>;

    /// Fetch the full tile collection for one z-layer.
    async fn get_resolved_tiles(&self, stack: &str, z: f64)
        -> Result<ResolvedTileSpecCollection>;

    /// Store a collection. `z: None` means the tiles carry their own
    /// (possibly remapped) z values.
    async fn save_resolved_tiles(
        &self,
        tiles: &ResolvedTileSpecCollection,
        stack: &str,
        z: Option<f64>,
    ) -> Result<()>;

    /// Section id to z mapping for the stack, optionally bounded.
    async fn get_stack_section_data(
        &self,
        stack: &str,
        min_z: Option<f64>,
        max_z: Option<f64>,
    ) -> Result<Vec<SectionData>>;

    async fn get_stack_meta_data(&self, stack: &str) -> Result<StackMetaData>;

    /// Create `new_stack` with version parameters copied from
    /// `basis_meta_data`.
    async fn setup_derived_stack(
        &self,
        basis_meta_data: &StackMetaData,
        new_stack: &str,
    ) -> Result<()>;

    async fn set_stack_state(&self, stack: &str, state: StackState) -> Result<()>;
}

/// reqwest client for one owner/project of a render web service instance.
#[derive(Debug, Clone)]
pub struct RenderClient {
    base_data_url: String,
    owner: String,
    project: String,
    http: reqwest::Client,
}

impl RenderClient {
    pub fn new(base_data_url: &str, owner: &str, project: &str) -> Result<RenderClient> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(RenderClient {
            base_data_url: base_data_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            project: project.to_string(),
            http,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn stack_url(&self, stack: &str) -> String {
        format!(
            "{}/owner/{}/project/{}/stack/{}",
            self.base_data_url, self.owner, self.project, stack
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let url = response.url().to_string();
            let body = response.text().await.unwrap_or_default();
            Err(Error::Client {
                status: status.as_u16(),
                url,
                body,
            })
        }
    }
}

#[async_trait]
impl StackClient for RenderClient {
    async fn get_tile(&self, stack: &str, tile_id: &str) -> Result<TileSpec> {
        let url = format!("{}/tile/{}", self.stack_url(stack), tile_id);
        debug!(url = %url, "get_tile");
        let response = Self::check(self.http.get(&url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn get_resolved_tiles(
        &self,
        stack: &str,
        z: f64,
    ) -> Result<ResolvedTileSpecCollection> {
        let url = format!("{}/z/{}/resolvedTiles", self.stack_url(stack), z);
        debug!(url = %url, "get_resolved_tiles");
        let response = Self::check(self.http.get(&url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn save_resolved_tiles(
        &self,
        tiles: &ResolvedTileSpecCollection,
        stack: &str,
        z: Option<f64>,
    ) -> Result<()> {
        let url = match z {
            Some(z) => format!("{}/z/{}/resolvedTiles", self.stack_url(stack), z),
            None => format!("{}/resolvedTiles", self.stack_url(stack)),
        };
        info!(url = %url, tile_count = tiles.tile_count(), "save_resolved_tiles");
        Self::check(self.http.put(&url).json(tiles).send().await?).await?;
        Ok(())
    }

    async fn get_stack_section_data(
        &self,
        stack: &str,
        min_z: Option<f64>,
        max_z: Option<f64>,
    ) -> Result<Vec<SectionData>> {
        let url = format!("{}/sectionData", self.stack_url(stack));
        debug!(url = %url, "get_stack_section_data");
        let response = Self::check(self.http.get(&url).send().await?).await?;
        let mut section_data: Vec<SectionData> = response.json().await?;
        if min_z.is_some() || max_z.is_some() {
            section_data.retain(|section| {
                min_z.map_or(true, |min| section.z >= min)
                    && max_z.map_or(true, |max| section.z <= max)
            });
        }
        Ok(section_data)
    }

    async fn get_stack_meta_data(&self, stack: &str) -> Result<StackMetaData> {
        let url = self.stack_url(stack);
        debug!(url = %url, "get_stack_meta_data");
        let response = Self::check(self.http.get(&url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn setup_derived_stack(
        &self,
        basis_meta_data: &StackMetaData,
        new_stack: &str,
    ) -> Result<()> {
        let url = self.stack_url(new_stack);
        let version = basis_meta_data.current_version.clone().unwrap_or_default();
        info!(url = %url, "setup_derived_stack");
        Self::check(self.http.post(&url).json(&version).send().await?).await?;
        Ok(())
    }

    async fn set_stack_state(&self, stack: &str, state: StackState) -> Result<()> {
        let url = format!(
            "{}/state/{}",
            self.stack_url(stack),
            state.as_path_segment()
        );
        info!(url = %url, "set_stack_state");
        Self::check(self.http.put(&url).send().await?).await?;
        Ok(())
    }
}
