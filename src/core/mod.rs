pub mod error;
pub mod lock;
pub mod logging;
pub mod timestamp;

pub use error::{ConfigError, StoreError, StoreResult};
pub use logging::{ComponentLogger, FacadeSink, LogContext, LogSink, NullSink};
pub use timestamp::*;
