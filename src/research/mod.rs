pub mod extractor;
pub mod feedback;
pub mod orchestrator;
pub mod planner;
pub mod progress;
pub mod report;

pub use extractor::{ContentExtractor, Extraction};
pub use feedback::FeedbackGenerator;
pub use orchestrator::{Accumulator, BranchOutcome, ResearchOrchestrator, RunOptions};
pub use planner::QueryPlanner;
pub use progress::{progress_channel, ProgressReceiver, ProgressSender};
pub use report::ReportSynthesizer;
