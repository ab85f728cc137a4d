//! Single-task runner.
//!
//! Executes one [`TaskSpec`] end to end and always yields a [`TaskResult`];
//! failures are classified, never propagated.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use genrun_client::{ContentPart, Fetcher, GenerationBackend, GenerationRequest, Message};
use genrun_core::{ImageReference, TaskId, TaskResult, TaskSpec};

use crate::config::Config;
use crate::error::GenerationError;
use crate::extract::extract_images;
use crate::normalize::ReferenceNormalizer;
use crate::persist::OutputWriter;

/// Sampling temperature sent with every generation request.
pub const TEMPERATURE: f32 = 0.7;

/// Response length cap sent with every generation request.
pub const MAX_TOKENS: u32 = 4096;

const SYSTEM_INSTRUCTION: &str = "You are an image generation model. Generate the image(s) \
described by the user, honoring the listed generation parameters. Return each generated image \
as inline base64 data or as a URL.";

/// Runs single generation tasks against one backend.
pub struct TaskRunner {
    backend: Arc<dyn GenerationBackend>,
    normalizer: ReferenceNormalizer,
    writer: OutputWriter,
    model: String,
}

impl TaskRunner {
    /// Create a runner from the process configuration and its collaborators.
    pub fn new(config: &Config, backend: Arc<dyn GenerationBackend>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            backend,
            normalizer: ReferenceNormalizer::new(fetcher.clone()),
            writer: OutputWriter::new(fetcher, config.default_output_dir()),
            model: config.model.clone(),
        }
    }

    /// Run one task to completion.
    pub async fn run(&self, spec: &TaskSpec) -> TaskResult {
        let task_id = TaskId::generate();
        info!(
            task_id = %task_id,
            size = %spec.size,
            count = spec.count,
            references = spec.reference_images.len(),
            "Running generation task"
        );

        match self.execute(&task_id, spec).await {
            Ok(result) => result,
            Err(e) => {
                warn!(task_id = %task_id, kind = %e.kind(), error = %e, "Generation task failed");
                e.into()
            }
        }
    }

    async fn execute(&self, task_id: &TaskId, spec: &TaskSpec) -> Result<TaskResult, GenerationError> {
        spec.validate()?;

        let references = if spec.reference_images.is_empty() {
            Vec::new()
        } else {
            self.normalizer.normalize(&spec.reference_images).await?
        };

        let request = build_request(&self.model, spec, &references);
        let text = self.backend.generate(&request).await?;
        debug!(task_id = %task_id, chars = text.len(), "Generation response text received");

        let outputs = extract_images(&text);
        if outputs.is_empty() {
            return Err(GenerationError::NoImageData);
        }

        let saved_paths: Vec<Option<PathBuf>> = match self.writer.resolve_dir(spec.output_dir.as_deref()) {
            Some(dir) => {
                self.writer
                    .save_all(&outputs, &dir, spec.filename.as_deref())
                    .await
            }
            None => vec![None; outputs.len()],
        };

        info!(
            task_id = %task_id,
            outputs = outputs.len(),
            saved = saved_paths.iter().filter(|p| p.is_some()).count(),
            "Generation task completed"
        );

        Ok(TaskResult::Success {
            outputs,
            saved_paths,
        })
    }
}

/// Build the generation request for one task.
///
/// The user message carries the prompt followed by the declared parameters,
/// then each reference image as its own entry.
pub fn build_request(model: &str, spec: &TaskSpec, references: &[ImageReference]) -> GenerationRequest {
    let mut parts = Vec::with_capacity(1 + references.len());
    parts.push(ContentPart::text(render_prompt(spec)));
    parts.extend(references.iter().map(|r| ContentPart::image(r.locator())));

    GenerationRequest {
        model: model.to_string(),
        messages: vec![Message::system(SYSTEM_INSTRUCTION), Message::user(parts)],
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
    }
}

fn render_prompt(spec: &TaskSpec) -> String {
    let mut text = format!(
        "{}\n\nGeneration parameters:\n- size: {}\n- guidance_scale: {}\n",
        spec.prompt.trim(),
        spec.size,
        spec.guidance
    );
    if let Some(seed) = spec.seed {
        text.push_str(&format!("- seed: {}\n", seed));
    }
    text.push_str(&format!("- number_of_images: {}", spec.count));
    text
}
