/// Role and enrollment checks shared by every operation.
pub mod access;
/// Activity authoring, lookup, quick join and deletion.
pub mod activity_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// One-shot expiry timers keyed by start epoch.
pub mod expiry_service;
/// CSV export of activity responses.
pub mod export;
/// Health check service.
pub mod health_service;
/// Start, stop, reset, expire, submit and status.
pub mod lifecycle_service;
/// Re-arming expiry timers after a restart or reconnect.
pub mod recovery;
/// Aggregated results per activity kind.
pub mod results;
/// Room event construction and publishing.
pub mod room_events;
/// Answer grading for quizzes and memory games.
pub mod scoring;
/// Server-Sent Events streaming of activity rooms.
pub mod sse_service;
/// Storage connection supervisor with degraded-mode handling.
pub mod storage_supervisor;
/// WebSocket connection and room membership handling.
pub mod websocket_service;
