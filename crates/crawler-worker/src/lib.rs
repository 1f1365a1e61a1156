//! Fetch worker: the process that actually talks to the open web. Polls
//! the coordinator for a URL, runs it through the shared [`Fetcher`], and
//! reports back. Holds no crawl state of its own; the coordinator is the
//! only source of truth for what has been seen, queued, or leased.

mod client;
mod run;

pub use client::{
    AssignedTask, CoordinatorClient, HttpCoordinatorClient, HttpIndexPublisher, IndexPublisher, NullIndexPublisher,
    WorkerClientError,
};
pub use run::WorkerRuntime;
