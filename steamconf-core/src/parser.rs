//! Confirmation document parsing.

use crate::{ConfirmationError, Result};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

const CONFIRMATION_SELECTOR: &str = "[data-confid]";
const DESCRIPTION_SELECTOR: &str = ".mobileconf_list_entry_description > div";

/// One confirmation record as it appears in the listing document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationData {
    pub id: u64,
    pub key: String,
    pub descriptions: Vec<String>,
    /// Raw `data-accept` attribute (button label on the listing page).
    pub accept: Option<String>,
    /// Raw `data-cancel` attribute.
    pub cancel: Option<String>,
}

/// Extract every complete confirmation record from a listing document.
///
/// Elements without a numeric `data-confid`, or carrying neither a
/// `data-accept` nor a `data-cancel` value, are not records and are skipped.
pub fn parse_confirmations(document: &str) -> Result<Vec<ConfirmationData>> {
    let confirmation_selector = selector(CONFIRMATION_SELECTOR)?;
    let description_selector = selector(DESCRIPTION_SELECTOR)?;

    let html = Html::parse_document(document);
    let mut records = Vec::new();

    for element in html.select(&confirmation_selector) {
        let Some(raw_id) = data_attr(&element, "confid") else {
            continue;
        };
        let id = match raw_id.trim().parse::<u64>() {
            Ok(id) => id,
            Err(_) => {
                tracing::debug!(raw_id, "skipping confirmation with non-numeric id");
                continue;
            }
        };

        let accept = data_attr(&element, "accept").map(str::to_string);
        let cancel = data_attr(&element, "cancel").map(str::to_string);
        if accept.is_none() && cancel.is_none() {
            continue;
        }

        let key = data_attr(&element, "key").unwrap_or_default().to_string();
        let descriptions = element
            .select(&description_selector)
            .map(|div| div.text().collect::<String>())
            .collect();

        records.push(ConfirmationData {
            id,
            key,
            descriptions,
            accept,
            cancel,
        });
    }

    Ok(records)
}

/// Non-empty `data-<name>` attribute value.
fn data_attr<'a>(element: &ElementRef<'a>, name: &str) -> Option<&'a str> {
    element
        .value()
        .attr(&format!("data-{}", name))
        .filter(|value| !value.is_empty())
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ConfirmationError::MalformedResponse(format!("selector {}: {}", css, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, key: &str, accept: &str, cancel: &str, lines: &[&str]) -> String {
        let descriptions: String = lines.iter().map(|l| format!("<div>{}</div>", l)).collect();
        format!(
            r#"<div class="mobileconf_list_entry" data-confid="{id}" data-key="{key}" data-accept="{accept}" data-cancel="{cancel}">
                 <div class="mobileconf_list_entry_description">{descriptions}</div>
               </div>"#
        )
    }

    #[test]
    fn test_parse_complete_entries() {
        let doc = format!(
            "<html><body>{}{}</body></html>",
            entry("10", "k10", "Accept", "Cancel", &["Trade with Alice", "2 items"]),
            entry("11", "k11", "Confirm", "", &["Market listing"]),
        );

        let records = parse_confirmations(&doc).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].id, 10);
        assert_eq!(records[0].key, "k10");
        assert_eq!(records[0].descriptions, vec!["Trade with Alice", "2 items"]);
        assert_eq!(records[0].accept.as_deref(), Some("Accept"));
        assert_eq!(records[0].cancel.as_deref(), Some("Cancel"));

        assert_eq!(records[1].id, 11);
        assert_eq!(records[1].descriptions, vec!["Market listing"]);
        assert!(records[1].cancel.is_none());
    }

    #[test]
    fn test_skip_entries_without_tokens() {
        let doc = format!(
            "<html><body>{}{}</body></html>",
            entry("10", "k10", "", "", &["Incomplete"]),
            entry("12", "k12", "Accept", "Cancel", &["Complete"]),
        );

        let records = parse_confirmations(&doc).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 12);
    }

    #[test]
    fn test_skip_non_numeric_id() {
        let doc = format!(
            "<html><body>{}</body></html>",
            entry("abc", "k", "Accept", "Cancel", &["Bad id"]),
        );
        assert!(parse_confirmations(&doc).unwrap().is_empty());
    }

    #[test]
    fn test_only_direct_description_children() {
        let doc = r#"<div data-confid="5" data-key="k" data-accept="Accept">
                <div class="mobileconf_list_entry_description">
                    <div>Line one</div>
                    <span><div>nested</div></span>
                </div>
            </div>"#;

        let records = parse_confirmations(doc).unwrap();
        assert_eq!(records[0].descriptions, vec!["Line one"]);
    }

    #[test]
    fn test_empty_document() {
        assert!(parse_confirmations("<html><body>Nothing to confirm</body></html>")
            .unwrap()
            .is_empty());
    }
}
