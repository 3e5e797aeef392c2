pub mod achievements;
pub mod curve;
pub mod engine;
pub mod outcome;
pub mod payout;
pub mod ranking;
pub mod registry;
pub mod types;

pub use types::*;
pub use curve::CrashCurve;
pub use engine::{Bookkeeping, EngineBuilder, RoundEngine, Settlement, StartRequest};
pub use outcome::{OutcomeGenerator, SeededSource, ScriptedSource, ThreadRngSource, UniformSource};
pub use registry::SessionRegistry;
