pub mod calibrate;
pub mod classify;
pub mod compress;
pub mod config;
pub mod discover;
pub mod orchestrator;
pub mod permissions;
pub mod scheduler;
pub mod testing;

pub use calibrate::{
    CalibrationEngine, CalibrationInvoker, CalibrationOutcome, EngineConfig, EngineError,
    ExternalEngine,
};
pub use classify::{Classification, ClassifyError, FileClass, FileClassifier, OrphanAction};
pub use compress::{CompressError, GzCompressor};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use discover::{only_one_segment, DataFile, StorageForm};
pub use orchestrator::{OrchestratorConfig, OrchestratorError, PipelineReport, PipelineRunner};
pub use permissions::{
    GroupRule, NoopPermissionBracket, PermissionBracket, PermissionConfig, UnixPermissionBracket,
};
pub use scheduler::{LoadAwareScheduler, LoadProbe, LoadSample, SchedulerConfig, SchedulerError};
