mod context;
mod limiter;

pub use context::NodeConfig;
pub use context::NodeContext;
pub use limiter::DeleteLimiter;
