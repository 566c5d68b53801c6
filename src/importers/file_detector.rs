use tracing::info;

use super::{ibkr_csv, normalize_label};
use crate::error::ParseError;
use crate::models::Broker;

/// Detect the broker export format from the statement text
///
/// Detection strategy:
/// - Any row starting with the `Transaktionen` section marker → IBKR activity statement
/// - Header row containing `LONG_SHORT_IND` → TastyTrade gain/loss export
/// - Otherwise → error listing what was expected
pub fn detect_broker(text: &str) -> Result<Broker, ParseError> {
    let has_ibkr_section = text.lines().any(|line| {
        let first = line.split(',').next().unwrap_or_default().trim_matches('"');
        normalize_label(first) == ibkr_csv::SECTION_MARKER
    });
    if has_ibkr_section {
        info!("Detected IBKR format (found '{}' section)", ibkr_csv::SECTION_MARKER);
        return Ok(Broker::Ibkr);
    }

    let header = text.lines().find(|line| !line.trim().is_empty());
    if let Some(header) = header {
        let is_tasty = header
            .split(',')
            .any(|h| normalize_label(h.trim_matches('"')) == "LONG_SHORT_IND");
        if is_tasty {
            info!("Detected TastyTrade format (found LONG_SHORT_IND column)");
            return Ok(Broker::TastyTrade);
        }
    }

    Err(ParseError::UnknownFormat(format!(
        "expected either an IBKR activity statement with a '{}' section \
         or a TastyTrade export with a LONG_SHORT_IND column",
        ibkr_csv::SECTION_MARKER
    )))
}
