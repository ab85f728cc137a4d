//! MCP (Model Context Protocol) server implementation.
//!
//! Provides MCP tools for generation:
//! - `generate_image` - Generate images from one prompt
//! - `batch_generate_images` - Run several image generations under a concurrency cap
//! - `generate_video` - Submit a video job and wait for the result
//! - `get_video_status` - Query a video job once

use axum::Router;
use rmcp::{
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
    },
    ErrorData as McpError, ServerHandler,
};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use genrun_core::{AspectRatio, BatchRequest, CoreError, JobHandle, SizeClass, TaskSpec, VideoRequest};
use genrun_engine::Engine;

use crate::summary::{to_json, BatchSummary, JobStatusSummary, TaskSummary, VideoSummary};

/// MCP server for generation operations.
#[derive(Clone)]
pub struct GenrunMcpServer {
    engine: Engine,
    shutdown: CancellationToken,
    tool_router: rmcp::handler::server::router::tool::ToolRouter<Self>,
}

// ============================================================================
// Tool Parameter Types
// ============================================================================

/// Parameters for generate_image tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GenerateImageParams {
    /// Text description of the image to generate.
    pub prompt: String,

    /// Size class: "small" (512x512), "medium" (1024x1024) or "large" (2048x2048).
    #[serde(default)]
    pub size: Option<String>,

    /// Guidance strength between 1.0 and 10.0 (default 7.5).
    #[serde(default)]
    pub guidance_scale: Option<f64>,

    /// Seed between 0 and 2147483647.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Number of images, 1 to 4 (default 1).
    #[serde(default)]
    pub num_images: Option<u32>,

    /// Reference images: http(s) URLs or local file paths.
    #[serde(default)]
    pub reference_images: Option<Vec<String>>,

    /// Directory to save images into. Omit to skip saving; pass "" to save
    /// into the default directory.
    #[serde(default)]
    pub output_dir: Option<String>,

    /// Filename for saved images; an index is appended when several are saved.
    #[serde(default)]
    pub filename: Option<String>,
}

impl GenerateImageParams {
    /// Build a task specification. Range checks happen in the runner.
    pub fn into_spec(self) -> Result<TaskSpec, CoreError> {
        let mut spec = TaskSpec::new(self.prompt);

        if let Some(size) = self.size.as_deref() {
            spec = spec.with_size(size.parse::<SizeClass>()?);
        }
        if let Some(guidance) = self.guidance_scale {
            spec = spec.with_guidance(guidance);
        }
        if let Some(seed) = self.seed {
            spec = spec.with_seed(seed);
        }
        if let Some(count) = self.num_images {
            spec = spec.with_count(count);
        }
        for locator in self.reference_images.unwrap_or_default() {
            spec = spec.with_reference_image(locator);
        }
        if let Some(dir) = self.output_dir {
            spec = spec.with_output_dir(dir);
        }
        if let Some(filename) = self.filename {
            spec = spec.with_filename(filename);
        }

        Ok(spec)
    }
}

/// Parameters for batch_generate_images tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct BatchGenerateParams {
    /// Image generation tasks (1 to 20), each with the same fields as generate_image.
    pub tasks: Vec<GenerateImageParams>,

    /// Maximum number of tasks running at once, 1 to 10 (default 3).
    #[serde(default)]
    pub concurrency: Option<usize>,
}

impl BatchGenerateParams {
    pub fn into_request(self) -> Result<BatchRequest, CoreError> {
        let tasks = self
            .tasks
            .into_iter()
            .enumerate()
            .map(|(index, params)| {
                params
                    .into_spec()
                    .map_err(|e| CoreError::InvalidParams(format!("task {}: {}", index, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut request = BatchRequest::new(tasks);
        if let Some(concurrency) = self.concurrency {
            request = request.with_concurrency(concurrency);
        }
        Ok(request)
    }
}

/// Parameters for generate_video tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateVideoParams {
    /// Text description of the video.
    pub prompt: String,

    /// Model override; the server default is used when omitted.
    #[serde(default)]
    pub model: Option<String>,

    /// "landscape" (16:9, default), "portrait" (9:16) or "square" (1:1).
    #[serde(default)]
    pub aspect_ratio: Option<String>,

    /// High-definition rendering (slower).
    #[serde(default)]
    pub hd: Option<bool>,

    /// Duration in seconds, 5 to 25 (default 10).
    #[serde(default)]
    pub duration: Option<u32>,

    /// Add a watermark (default false).
    #[serde(default)]
    pub watermark: Option<bool>,

    /// Keep the video private (default true).
    #[serde(default)]
    pub private: Option<bool>,

    /// Image URLs to animate or reference.
    #[serde(default)]
    pub image_urls: Option<Vec<String>>,

    /// Directory to download the video into. Omit to skip; pass "" for the default directory.
    #[serde(default)]
    pub output_dir: Option<String>,
}

impl GenerateVideoParams {
    pub fn into_request(self) -> Result<VideoRequest, CoreError> {
        let mut request = VideoRequest::new(self.prompt);

        if let Some(ratio) = self.aspect_ratio.as_deref() {
            request = request.with_aspect_ratio(ratio.parse::<AspectRatio>()?);
        }
        if let Some(hd) = self.hd {
            request = request.with_hd(hd);
        }
        if let Some(duration) = self.duration {
            request = request.with_duration(duration);
        }
        if let Some(watermark) = self.watermark {
            request.watermark = watermark;
        }
        if let Some(private) = self.private {
            request.private = private;
        }
        request.model = self.model;
        request.image_urls = self.image_urls.unwrap_or_default();
        request.output_dir = self.output_dir;

        Ok(request)
    }
}

/// Parameters for get_video_status tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetVideoStatusParams {
    /// Job ID returned by generate_video.
    pub job_id: String,
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[tool_router]
impl GenrunMcpServer {
    /// Create a new MCP server around an engine.
    ///
    /// `shutdown` is cancelled when the process is asked to stop.
    pub fn new(engine: Engine, shutdown: CancellationToken) -> Self {
        Self {
            engine,
            shutdown,
            tool_router: Self::tool_router(),
        }
    }

    /// Generate one or more images from a prompt.
    #[tool(description = "Generate images from a text prompt, optionally guided by reference images. \
        Returns the generated image locators and, when output_dir is given, the saved file paths.")]
    async fn generate_image(
        &self,
        Parameters(params): Parameters<GenerateImageParams>,
    ) -> Result<CallToolResult, McpError> {
        let spec = match params.into_spec() {
            Ok(spec) => spec,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(e.to_string())]));
            }
        };

        let result = self.engine.runner.run(&spec).await;
        let summary = TaskSummary::from_result(None, &result);
        let response = to_json(&summary);

        if result.is_success() {
            info!(outputs = summary.output_count, "Generated images via MCP");
            Ok(CallToolResult::success(vec![Content::text(response)]))
        } else {
            Ok(CallToolResult::error(vec![Content::text(response)]))
        }
    }

    /// Run several image generations concurrently.
    #[tool(description = "Generate images for several prompts at once (1 to 20 tasks) with at most \
        `concurrency` (1 to 10, default 3) running at the same time. Each task reports its own outcome; \
        results are listed in input order.")]
    async fn batch_generate_images(
        &self,
        Parameters(params): Parameters<BatchGenerateParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = match params.into_request() {
            Ok(request) => request,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Invalid batch: {}",
                    e
                ))]));
            }
        };

        match self.engine.batch.run(request).await {
            Ok(batch) => {
                let summary = BatchSummary::from(&batch);
                info!(
                    total = summary.total,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    "Batch generation finished via MCP"
                );
                Ok(CallToolResult::success(vec![Content::text(to_json(&summary))]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Invalid batch: {}",
                e
            ))])),
        }
    }

    /// Generate a video and wait for the job to finish.
    #[tool(description = "Generate a video from a prompt. Submits a job and waits for it to finish \
        (up to 10 minutes, longer for hd or videos over 10 seconds). Returns the video URL and, \
        when output_dir is given, the saved file path.")]
    async fn generate_video(
        &self,
        Parameters(params): Parameters<GenerateVideoParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = match params.into_request() {
            Ok(request) => request,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(e.to_string())]));
            }
        };

        let cancel = self.shutdown.child_token();
        match self.engine.video.generate(&request, &cancel).await {
            Ok(outcome) => {
                info!(job_id = %outcome.job, "Generated video via MCP");
                Ok(CallToolResult::success(vec![Content::text(to_json(
                    &VideoSummary::from(&outcome),
                ))]))
            }
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "Video generation failed");
                Ok(CallToolResult::error(vec![Content::text(format!(
                    "Video generation failed ({}): {}",
                    e.kind(),
                    e
                ))]))
            }
        }
    }

    /// Check a video job once.
    #[tool(description = "Get the current status of a video job: state, progress, result URL or error.")]
    async fn get_video_status(
        &self,
        Parameters(params): Parameters<GetVideoStatusParams>,
    ) -> Result<CallToolResult, McpError> {
        let job_id = params.job_id.trim();
        if job_id.is_empty() {
            return Ok(CallToolResult::error(vec![Content::text(
                "job_id must not be empty".to_string(),
            )]));
        }

        let job = JobHandle::new(job_id);
        match self.engine.video.status(&job).await {
            Ok(query) => {
                let summary = JobStatusSummary::from_query(&job, &query);
                info!(job_id = %job, status = summary.status, "Retrieved video status via MCP");
                Ok(CallToolResult::success(vec![Content::text(to_json(&summary))]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Status query for job {} failed ({}): {}",
                job,
                e.kind(),
                e
            ))])),
        }
    }
}

// ============================================================================
// Server Handler Implementation
// ============================================================================

#[tool_handler]
impl ServerHandler for GenrunMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: rmcp::model::Implementation {
                name: "genrun-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                website_url: None,
                icons: None,
            },
            instructions: Some(
                "Genrun MCP Server - Generate images and videos from text prompts. \
                 Use generate_image for one prompt, batch_generate_images for several, \
                 generate_video for a video job and get_video_status to check a job."
                    .to_string(),
            ),
        }
    }
}

// ============================================================================
// HTTP Server Setup
// ============================================================================

/// Create an axum Router serving MCP over Streamable HTTP at `/mcp`.
pub fn create_mcp_router(engine: Engine, ct: CancellationToken) -> Router {
    let shutdown = ct.clone();
    let service = StreamableHttpService::new(
        move || Ok(GenrunMcpServer::new(engine.clone(), shutdown.clone())),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig {
            cancellation_token: ct,
            ..Default::default()
        },
    );

    info!("MCP server initialized with Streamable HTTP transport");

    Router::new().nest_service("/mcp", service)
}
