//! Validation report accumulated while fetching and evaluating trusted lists.
//!
//! A report is an ordered log of findings. Each finding is either
//! informational or marks a failed check; a single failed check makes the
//! whole report invalid.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pki::certificate::Certificate;

/// Severity of a single report item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportItemStatus {
    Info,
    Invalid,
}

impl fmt::Display for ReportItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportItemStatus::Info => f.write_str("INFO"),
            ReportItemStatus::Invalid => f.write_str("INVALID"),
        }
    }
}

/// Overall verdict of a [`ValidationReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid,
}

/// One finding produced by a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportItem {
    pub check_name: String,
    pub message: String,
    pub exception_cause: Option<String>,
    pub status: ReportItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Certificate>,
}

impl ReportItem {
    pub fn new(
        check_name: impl Into<String>,
        message: impl Into<String>,
        status: ReportItemStatus,
    ) -> Self {
        Self {
            check_name: check_name.into(),
            message: message.into(),
            exception_cause: None,
            status,
            certificate: None,
        }
    }

    pub fn info(check_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(check_name, message, ReportItemStatus::Info)
    }

    pub fn invalid(check_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(check_name, message, ReportItemStatus::Invalid)
    }

    /// Attach the error that caused this finding.
    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.exception_cause = Some(cause.to_string());
        self
    }

    /// Attach the certificate this finding is about.
    pub fn with_certificate(mut self, certificate: Certificate) -> Self {
        self.certificate = Some(certificate);
        self
    }
}

impl fmt::Display for ReportItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.status, self.check_name, self.message)?;
        if let Some(cause) = &self.exception_cause {
            write!(f, " ({cause})")?;
        }
        Ok(())
    }
}

/// Ordered collection of [`ReportItem`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    report_items: Vec<ReportItem>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_report_item(&mut self, item: ReportItem) {
        self.report_items.push(item);
    }

    pub fn items(&self) -> &[ReportItem] {
        &self.report_items
    }

    pub fn len(&self) -> usize {
        self.report_items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.report_items.is_empty()
    }

    /// Items with status [`ReportItemStatus::Invalid`].
    pub fn failures(&self) -> impl Iterator<Item = &ReportItem> {
        self.report_items
            .iter()
            .filter(|item| item.status == ReportItemStatus::Invalid)
    }

    pub fn validation_result(&self) -> ValidationResult {
        if self.failures().next().is_some() {
            ValidationResult::Invalid
        } else {
            ValidationResult::Valid
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validation_result() == ValidationResult::Valid
    }

    /// Append every item of `other`, keeping order.
    pub fn merge(&mut self, other: &ValidationReport) {
        self.report_items.extend(other.report_items.iter().cloned());
    }

    /// Turn every finding into an informational one.
    pub fn downgrade_to_info(&mut self) {
        for item in &mut self.report_items {
            item.status = ReportItemStatus::Info;
        }
    }

    pub fn has_check(&self, check_name: &str) -> bool {
        self.report_items
            .iter()
            .any(|item| item.check_name == check_name)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = match self.validation_result() {
            ValidationResult::Valid => "VALID",
            ValidationResult::Invalid => "INVALID",
        };
        writeln!(f, "Validation report: {verdict}")?;
        for item in &self.report_items {
            writeln!(f, "  {item}")?;
        }
        Ok(())
    }
}
