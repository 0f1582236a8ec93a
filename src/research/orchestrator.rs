use crate::config::{validate_run_bounds, FOLLOW_UPS_PER_QUERY, LEARNINGS_PER_QUERY};
use crate::error::ResearchError;
use crate::generation::StructuredGenerator;
use crate::models::{ResearchProgress, ResearchQuery, ResearchResult};
use crate::research::extractor::ContentExtractor;
use crate::research::planner::QueryPlanner;
use crate::research::progress::{ProgressSender, ProgressTracker};
use crate::tools::SearchClient;
use futures::future::{join_all, BoxFuture, FutureExt};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Learnings and visited URLs of one top-level run, appended to by every
/// branch of the tree. Cloning yields another handle to the same state, so a
/// caller can snapshot a run while it is still in flight.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    inner: Arc<Mutex<ResearchResult>>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ResearchResult {
        self.lock().clone()
    }

    pub fn learnings(&self) -> Vec<String> {
        self.lock().learnings.clone()
    }

    /// Appends one branch's contribution under a single lock so concurrent
    /// branches never interleave inside it.
    fn append(&self, learnings: Vec<String>, urls: Vec<String>) {
        let mut result = self.lock();
        result.learnings.extend(learnings);
        result.visited_urls.extend(urls);
    }

    fn record(&self, outcome: &BranchOutcome) {
        let mut result = self.lock();
        let stats = &mut result.branches;
        match outcome {
            BranchOutcome::Contributed { .. } => stats.contributed += 1,
            BranchOutcome::Empty => stats.empty += 1,
            BranchOutcome::Failed(_) => stats.failed += 1,
            BranchOutcome::Cancelled => stats.cancelled += 1,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResearchResult> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How a single branch (search, extract, recurse) settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    Contributed { learnings: usize, urls: usize },
    /// Search returned no documents, or extraction kept no learnings.
    Empty,
    /// Search or extraction failed; the branch contributed nothing.
    Failed(String),
    Cancelled,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub progress: Option<ProgressSender>,
    pub cancel: CancellationToken,
    pub accumulator: Accumulator,
}

struct RunContext {
    accumulator: Accumulator,
    progress: Option<ProgressSender>,
    cancel: CancellationToken,
    total_depth: usize,
    total_breadth: usize,
}

/// Recursive breadth/depth bounded research driver.
pub struct ResearchOrchestrator {
    planner: QueryPlanner,
    extractor: ContentExtractor,
    search: Arc<dyn SearchClient>,
    /// Bounds in-flight search+extract pipelines across every run sharing this orchestrator.
    limiter: Semaphore,
}

impl ResearchOrchestrator {
    pub fn new(
        generator: Arc<StructuredGenerator>,
        search: Arc<dyn SearchClient>,
        concurrency: usize,
    ) -> Self {
        Self {
            planner: QueryPlanner::new(generator.clone()),
            extractor: ContentExtractor::new(generator),
            search,
            limiter: Semaphore::new(concurrency.max(1)),
        }
    }

    pub async fn run(
        &self,
        query: &str,
        breadth: usize,
        depth: usize,
        progress: Option<ProgressSender>,
    ) -> Result<ResearchResult, ResearchError> {
        let options = RunOptions {
            progress,
            ..RunOptions::default()
        };
        self.run_with(query, breadth, depth, options).await
    }

    /// Runs the whole tree. Planning failures and cancellation before the
    /// first plan are fatal; every failure below a branch boundary is absorbed.
    pub async fn run_with(
        &self,
        query: &str,
        breadth: usize,
        depth: usize,
        options: RunOptions,
    ) -> Result<ResearchResult, ResearchError> {
        validate_run_bounds(breadth, depth).map_err(ResearchError::InvalidParameters)?;
        if query.trim().is_empty() {
            return Err(ResearchError::InvalidParameters(
                "query must not be empty".to_string(),
            ));
        }

        let ctx = RunContext {
            accumulator: options.accumulator,
            progress: options.progress,
            cancel: options.cancel,
            total_depth: depth,
            total_breadth: breadth,
        };

        info!("Starting research on '{}' (breadth {}, depth {})", query, breadth, depth);
        self.descend(query.to_string(), breadth, depth, &ctx).await?;

        let result = ctx.accumulator.snapshot();
        info!(
            learnings = result.learnings.len(),
            urls = result.visited_urls.len(),
            failed_branches = result.branches.failed,
            "Research finished"
        );
        Ok(result)
    }

    fn descend<'a>(
        &'a self,
        query: String,
        breadth: usize,
        depth: usize,
        ctx: &'a RunContext,
    ) -> BoxFuture<'a, Result<(), ResearchError>> {
        let span = info_span!("research_level", depth, breadth);
        async move {
            if ctx.cancel.is_cancelled() {
                return Err(ResearchError::Cancelled);
            }

            let prior = ctx.accumulator.learnings();
            let queries = self
                .planner
                .plan(&query, &prior, breadth)
                .await
                .map_err(ResearchError::Planning)?;

            let tracker = ProgressTracker::new(
                ResearchProgress {
                    current_depth: depth,
                    total_depth: ctx.total_depth,
                    current_breadth: breadth,
                    total_breadth: ctx.total_breadth,
                    ..ResearchProgress::default()
                },
                ctx.progress.clone(),
            );
            // Coarse model: totals describe this level's fan-out only.
            tracker.update(|p| {
                p.total_queries = queries.len();
                p.current_query = queries.first().map(|q| q.text.clone());
            });

            let outcomes = join_all(
                queries
                    .into_iter()
                    .map(|q| self.branch(q, breadth, depth, ctx, &tracker)),
            )
            .await;
            debug!(branches = outcomes.len(), "Level settled");
            Ok(())
        }
        .instrument(span)
        .boxed()
    }

    async fn branch(
        &self,
        query: ResearchQuery,
        breadth: usize,
        depth: usize,
        ctx: &RunContext,
        tracker: &ProgressTracker,
    ) -> BranchOutcome {
        let outcome = self.run_branch(query, breadth, depth, ctx, tracker).await;
        ctx.accumulator.record(&outcome);
        outcome
    }

    async fn run_branch(
        &self,
        query: ResearchQuery,
        breadth: usize,
        depth: usize,
        ctx: &RunContext,
        tracker: &ProgressTracker,
    ) -> BranchOutcome {
        if ctx.cancel.is_cancelled() {
            return BranchOutcome::Cancelled;
        }

        // The permit covers search and extraction only. Children of this branch
        // draw from the same limiter, so it must be released before descending.
        let (follow_ups, outcome) = {
            let _permit = match self.limiter.acquire().await {
                Ok(permit) => permit,
                Err(e) => return BranchOutcome::Failed(e.to_string()),
            };
            if ctx.cancel.is_cancelled() {
                return BranchOutcome::Cancelled;
            }

            tracker.update(|p| {
                p.current_query = Some(query.text.clone());
                p.completed_queries += 1;
            });

            let response = match self.search.search(&query.text).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Error running query '{}': {}", query.text, e);
                    return BranchOutcome::Failed(e.to_string());
                }
            };
            if response.documents.is_empty() {
                info!("No results found for query: {}", query.text);
                return BranchOutcome::Empty;
            }

            let extraction = match self
                .extractor
                .extract(
                    &query.text,
                    &response.documents,
                    LEARNINGS_PER_QUERY,
                    FOLLOW_UPS_PER_QUERY,
                )
                .await
            {
                Ok(extraction) => extraction,
                Err(e) => {
                    warn!("Extraction failed for query '{}': {}", query.text, e);
                    return BranchOutcome::Failed(e.to_string());
                }
            };

            let learnings = extraction.annotated_learnings();
            let urls: Vec<String> = response.documents.into_iter().map(|d| d.url).collect();
            let outcome = if learnings.is_empty() {
                info!("No usable learnings for query: {}", query.text);
                BranchOutcome::Empty
            } else {
                BranchOutcome::Contributed {
                    learnings: learnings.len(),
                    urls: urls.len(),
                }
            };
            ctx.accumulator.append(learnings, urls);
            (extraction.follow_up_questions, outcome)
        };

        if depth > 1 && !follow_ups.is_empty() {
            let next_breadth = breadth.saturating_sub(1).max(1);
            debug!(
                "Descending into {} follow-ups of '{}' (breadth {}, depth {})",
                follow_ups.len(),
                query.text,
                next_breadth,
                depth - 1
            );
            let results = join_all(
                follow_ups
                    .into_iter()
                    .map(|q| self.descend(q, next_breadth, depth - 1, ctx)),
            )
            .await;
            for result in results {
                if let Err(e) = result {
                    warn!("Follow-up research under '{}' failed: {}", query.text, e);
                }
            }
        }

        outcome
    }
}
