pub mod activity;
pub mod filter;
pub mod subscription;

pub use activity::{Activity, ActivityKind, StatusCategory};
pub use filter::ChannelFilter;
pub use subscription::Subscription;
