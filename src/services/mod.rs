/// Snapshot and restore of a running round.
pub mod backup;
/// Chat command recognition.
pub mod commands;
/// Session engine owning the round.
pub mod engine;
/// Hint rendering.
pub mod hints;
/// Per-user score table.
pub mod ledger;
/// Candidate answer matching.
pub mod matcher;
/// Quiz set sampling.
pub mod quiz_builder;
/// Question deadlines and deferred events.
pub mod timer;
