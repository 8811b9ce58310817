use super::{ExecutionRequest, ExecutionStrategy, StrategyOutput};
use crate::errors::ExecutionFault;
use crate::output::{ansi, SinkHandle};
use crate::preview::{PreviewSurface, SandboxedDocument};
use crate::registry::{LanguageDescriptor, PreviewFlavor, Strategy};
use async_trait::async_trait;
use std::sync::Arc;

/// Hands markup to an isolated rendering surface. Nothing is executed here.
pub struct PreviewStrategy {
    surface: Arc<dyn PreviewSurface>,
}

impl PreviewStrategy {
    pub fn new(surface: Arc<dyn PreviewSurface>) -> Self {
        Self { surface }
    }
}

#[async_trait]
impl ExecutionStrategy for PreviewStrategy {
    async fn execute(
        &self,
        descriptor: &LanguageDescriptor,
        request: &ExecutionRequest,
        sink: &SinkHandle,
    ) -> Result<StrategyOutput, ExecutionFault> {
        let flavor = match descriptor.strategy {
            Strategy::Preview { flavor } => flavor,
            _ => PreviewFlavor::Html,
        };
        let document = SandboxedDocument::from_source(flavor, &request.source);
        let artifact = self.surface.render(&document)?;

        let notice = match &artifact.location {
            Some(path) => format!("{} preview rendered to {}", descriptor.display_name, path.display()),
            None => format!("{} preview rendered", descriptor.display_name),
        };
        sink.write_line(&ansi::notice(&notice));

        Ok(StrategyOutput {
            succeeded: true,
            artifact: Some(artifact),
            ..Default::default()
        })
    }
}
