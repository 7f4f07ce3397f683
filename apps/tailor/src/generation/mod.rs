// Generation stages.
// Every model call goes through runner::RetryingStageRunner; no stage talks to
// the generation client directly.

pub mod cover_letter;
pub mod intelligence;
pub mod prompts;
pub mod resume;
pub mod runner;
