mod alert;
pub(crate) mod de;
mod report;
mod risk;

pub use alert::{Alert, Instance};
pub use report::{Previous, Report, Site};
pub use risk::RiskLevel;
