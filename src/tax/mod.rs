// Tax module - German options taxation (Termingeschäfte, Stillhaltergeschäfte)

pub mod aggregate;
pub mod classifier;
pub mod diagnostics;
pub mod pipeline;

pub use aggregate::{aggregate, legend, truncate, ReportLine, TaxSummary, DISCLAIMER};
pub use diagnostics::ClassificationGap;
pub use pipeline::{process_statement, process_statement_for, TaxReport};
