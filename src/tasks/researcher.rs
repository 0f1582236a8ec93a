use crate::error::ResearchError;
use crate::models::ResearchContext;
use crate::research::{progress_channel, Accumulator, ResearchOrchestrator, RunOptions};
use crate::sessions::SessionRegistry;
use crate::tasks::record_task_time;
use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Runs the recursive research tree for the session's query.
pub struct DeepResearchTask {
    orchestrator: Arc<ResearchOrchestrator>,
    sessions: Arc<SessionRegistry>,
}

impl DeepResearchTask {
    pub fn new(orchestrator: Arc<ResearchOrchestrator>, sessions: Arc<SessionRegistry>) -> Self {
        Self {
            orchestrator,
            sessions,
        }
    }
}

#[async_trait]
impl Task for DeepResearchTask {
    fn id(&self) -> &str {
        "deep_research"
    }

    #[instrument(skip(self, context))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();
        info!("Starting deep research task");

        let mut research_context: ResearchContext = context
            .get("research_context")
            .await
            .ok_or_else(|| GraphError::ContextError("Research context not found".to_string()))?;
        let session_id = research_context.session_id.clone();

        let (progress_tx, mut progress_rx) = progress_channel();
        let listener = {
            let sessions = self.sessions.clone();
            let session_id = session_id.clone();
            tokio::spawn(async move {
                while let Some(progress) = progress_rx.recv().await {
                    debug!(
                        depth = progress.current_depth,
                        completed = progress.completed_queries,
                        total = progress.total_queries,
                        "Research progress: {}",
                        progress.current_query.as_deref().unwrap_or("-")
                    );
                    sessions.record_progress(&session_id, progress);
                }
            })
        };

        let cancel = self.sessions.cancel_token(&session_id).unwrap_or_default();
        let options = RunOptions {
            progress: Some(progress_tx),
            cancel: cancel.clone(),
            accumulator: Accumulator::new(),
        };
        let outcome = self
            .orchestrator
            .run_with(
                &research_context.query,
                research_context.breadth,
                research_context.depth,
                options,
            )
            .await;
        // Every sender is gone once the run returns, so the listener drains and exits.
        let _ = listener.await;

        let result = outcome.map_err(|e| GraphError::Other(anyhow::Error::new(e)))?;
        if cancel.is_cancelled() {
            // Keep what was gathered, but no report is written for a cancelled run.
            warn!(
                "Session {} cancelled after {} learnings",
                session_id,
                result.learnings.len()
            );
            self.sessions.record_result(&session_id, result);
            return Err(GraphError::Other(anyhow::Error::new(ResearchError::Cancelled)));
        }
        info!(
            "Research collected {} learnings from {} urls",
            result.learnings.len(),
            result.visited_urls.len()
        );
        self.sessions.record_result(&session_id, result.clone());
        research_context.result = Some(result);
        context.set("research_context", research_context).await;

        record_task_time(&context, "deep_research", start_time).await;

        Ok(TaskResult::new(
            Some("Research completed successfully".to_string()),
            NextAction::ContinueAndExecute,
        ))
    }
}
