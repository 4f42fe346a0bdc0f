mod init;
mod trace_id;

pub use init::init_logger;
pub use trace_id::{TraceId, stream_span};
