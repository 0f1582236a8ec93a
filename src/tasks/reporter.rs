use crate::error::ResearchError;
use crate::models::ResearchContext;
use crate::research::ReportSynthesizer;
use crate::tasks::record_task_time;
use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use std::sync::Arc;
use tracing::{info, instrument};

/// Turns the accumulated learnings into the final markdown report.
pub struct ReporterTask {
    reporter: Arc<ReportSynthesizer>,
}

impl ReporterTask {
    pub fn new(reporter: Arc<ReportSynthesizer>) -> Self {
        Self { reporter }
    }
}

#[async_trait]
impl Task for ReporterTask {
    fn id(&self) -> &str {
        "report_writer"
    }

    #[instrument(skip(self, context))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();
        info!("Starting report generation task");

        let mut research_context: ResearchContext = context
            .get("research_context")
            .await
            .ok_or_else(|| GraphError::ContextError("Research context not found".to_string()))?;
        let result = research_context
            .result
            .as_ref()
            .ok_or_else(|| GraphError::ContextError("Research result not found".to_string()))?;

        let report = self
            .reporter
            .write(&research_context.query, &result.learnings, &result.visited_urls)
            .await
            .map_err(|e| GraphError::Other(anyhow::Error::new(ResearchError::Report(e))))?;

        info!("Generated report with {} characters", report.len());
        research_context.report = report;
        context.set("research_context", research_context).await;

        record_task_time(&context, "report_writer", start_time).await;

        Ok(TaskResult::new(
            Some("Report generated successfully".to_string()),
            NextAction::End,
        ))
    }
}
