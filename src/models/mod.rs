pub mod candidate;
pub mod loaders;
pub mod progress;
pub mod run;
pub mod spec;

pub use candidate::{ProductCandidate, ScoreSet, SearchHit};
pub use loaders::load_toml_to_spec;
pub use progress::{ChannelSink, DiscoveryEvent, LogSink, NullSink, ProgressSink, StepName, StepStatus};
pub use run::{build_trace, ItemRun, ItemRunResult};
pub use spec::{ItemConstraints, LineItem, ShoppingSpec};
