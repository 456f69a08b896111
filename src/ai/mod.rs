//! Intent analysis, compression and context orchestration

pub mod compressor;
pub mod context;
pub mod intent;
pub mod message;
pub mod router;

pub use compressor::{CompressionResult, Compressor};
pub use context::{ContextManager, OptimizedContext, Strategy};
pub use intent::{IntentAnalyzer, IntentKind, QueryIntent};
pub use message::{Message, Role};
