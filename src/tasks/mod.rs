mod reporter;
mod researcher;

pub use reporter::ReporterTask;
pub use researcher::DeepResearchTask;

use graph_flow::Context;
use std::collections::HashMap;
use std::time::Instant;

pub(crate) async fn record_task_time(context: &Context, task: &str, started: Instant) {
    let elapsed = started.elapsed().as_millis() as u64;
    let mut task_times: HashMap<String, u64> =
        context.get("task_times").await.unwrap_or_default();
    task_times.insert(task.to_string(), elapsed);
    context.set("task_times", task_times).await;
}
