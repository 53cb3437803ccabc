pub mod app;
pub mod engine;
pub mod indexer;
pub mod job;
pub mod results;
pub mod task;
pub mod wordcount;
pub mod worker;

pub use app::{KeyValue, MapFn, MrApp, ReduceFn};
pub use job::{JobDoneResponse, JobInfo, JobPhase, TaskInfo};
pub use results::JobResults;
pub use task::{Task, TaskId, TaskKind, TaskStatus};
pub use worker::{
    ProducedFile, TaskAssignmentRequest, TaskAssignmentResponse, TaskCompleteRequest,
    TaskCompleteResponse, WorkerId,
};
