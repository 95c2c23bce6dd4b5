//! How each record status is rendered in the results table.
//!
//! A status cell shows a badge text, a help text with the detailed status
//! and a bootstrap icon whose classes encode the severity.

use anyhow::Result;
use derive_more::Display;
use fantoccini::Locator;
use fantoccini::elements::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StatusKey {
    Dismissed,
    Expired,
    Exported,
    #[display("Incomplete Requirements")]
    IncompleteRequirements,
    Ineligible,
    Ready,
    Unassigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUiSpec {
    pub must_contain: &'static [&'static str],
    pub required_icon_selectors: &'static [&'static str],
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum StatusMismatch {
    #[error("{status} status cell should contain {expected:?}, text was {actual:?}")]
    MissingText {
        status: StatusKey,
        expected: &'static str,
        actual: String,
    },
    #[error("{status} status cell should contain an icon matching {selector:?}")]
    MissingIcon {
        status: StatusKey,
        selector: &'static str,
    },
}

impl StatusKey {
    pub const ALL: [StatusKey; 7] = [
        StatusKey::Dismissed,
        StatusKey::Expired,
        StatusKey::Exported,
        StatusKey::IncompleteRequirements,
        StatusKey::Ineligible,
        StatusKey::Ready,
        StatusKey::Unassigned,
    ];

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|key| key.to_string() == label)
    }

    pub fn spec(self) -> StatusUiSpec {
        let (must_contain, required_icon_selectors): (&[&str], &[&str]) =
            match self {
                StatusKey::Dismissed => (
                    &["Dismissed", "Dismissed"],
                    &["i.bi-dash-circle-fill.text-secondary"],
                ),
                StatusKey::Expired => (
                    &["Ineligible", "Expired"],
                    &["i.bi-x-circle-fill.text-danger"],
                ),
                StatusKey::Exported => (
                    &["Submitted", "Exported"],
                    &["i.bi-dash-circle-fill.text-secondary"],
                ),
                StatusKey::IncompleteRequirements => (
                    &["Incomplete", "Incomplete Requirements"],
                    &["i.bi-exclamation.text-warning"],
                ),
                StatusKey::Ineligible => (
                    &["Ineligible", "Ineligible"],
                    &["i.bi-x-circle-fill.text-danger"],
                ),
                StatusKey::Ready => (
                    &["Submitted", "Ready"],
                    &["i.bi-check-circle-fill.text-success"],
                ),
                StatusKey::Unassigned => (
                    &["Incomplete", "Unassigned"],
                    &["i.bi-exclamation.text-danger"],
                ),
            };
        StatusUiSpec {
            must_contain,
            required_icon_selectors,
        }
    }
}

impl StatusUiSpec {
    /// Check a rendered cell given its text and a way to count the icons
    /// matching a selector inside it.
    pub fn verify(
        &self,
        status: StatusKey,
        text: &str,
        icon_count: impl Fn(&str) -> usize,
    ) -> Result<(), StatusMismatch> {
        for &selector in self.required_icon_selectors {
            if icon_count(selector) == 0 {
                return Err(StatusMismatch::MissingIcon { status, selector });
            }
        }
        for &expected in self.must_contain {
            if !text.contains(expected) {
                return Err(StatusMismatch::MissingText {
                    status,
                    expected,
                    actual: text.to_string(),
                });
            }
        }
        Ok(())
    }
}

pub async fn assert_status_cell_matches_spec(
    cell: &Element,
    status: StatusKey,
) -> Result<()> {
    let spec = status.spec();
    let text = cell.text().await?;

    let mut counts = Vec::with_capacity(spec.required_icon_selectors.len());
    for &selector in spec.required_icon_selectors {
        counts.push((selector, cell.find_all(Locator::Css(selector)).await?.len()));
    }

    spec.verify(status, &text, |selector| {
        counts
            .iter()
            .find(|(s, _)| *s == selector)
            .map_or(0, |(_, n)| *n)
    })?;
    Ok(())
}
