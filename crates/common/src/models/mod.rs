//! Domain models shared across crates

mod notice;
mod report;

pub use notice::{compose_notice_id, Notice, NoticeCategory};
pub use report::{DeliveryReport, SourceReport};
