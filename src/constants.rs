//! Option defaults, validation bounds, and the environment contract handed
//! to spawned compute.

/// Default recursion depth ceiling when `maxDepth` is omitted.
pub const DEFAULT_MAX_DEPTH: u32 = 10;

/// Largest accepted `maxDepth`.
pub const MAX_MAX_DEPTH: u32 = 100;

/// Default downstream parallelism hint when `parallelBatchSize` is omitted.
pub const DEFAULT_PARALLEL_BATCH_SIZE: u32 = 10;

/// Largest accepted `parallelBatchSize`.
pub const MAX_PARALLEL_BATCH_SIZE: u32 = 100;

/// Prefix for the spawned compute resource's name: `task-{task_id}`.
pub const SPAWN_NAME_PREFIX: &str = "task-";

/// Prefix under which spawned compute is expected to write artifacts:
/// `artifacts/{task_id}/`.
pub const ARTIFACT_KEY_PREFIX: &str = "artifacts";

// Environment variables injected into every spawn request. The external
// compute reads these to find its input and its callback address.

/// Task identifier.
pub const ENV_TASK_ID: &str = "TASK_ID";
/// Absolute callback URL for the completion signal.
pub const ENV_CALLBACK_URL: &str = "CALLBACK_URL";
/// Subject identifier from the creation request.
pub const ENV_SUBJECT: &str = "SUBJECT";
/// JSON-encoded task options.
pub const ENV_TASK_OPTIONS: &str = "TASK_OPTIONS";
/// Object store bucket the artifact should be written to.
pub const ENV_ARTIFACT_BUCKET: &str = "ARTIFACT_BUCKET";
/// Key prefix the artifact should be written under.
pub const ENV_ARTIFACT_PREFIX: &str = "ARTIFACT_PREFIX";
