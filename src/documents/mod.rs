//! Sanction document issuance
//!
//! Renders the sanction letter for an approved loan and returns an opaque
//! reference to it. Errors are never swallowed: a failed render fails the turn.

use crate::eligibility;
use crate::error::OrchestrationError;
use crate::models::{CustomerProfile, DocumentReference};
use crate::underwriting::format_amount;
use crate::Result;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::path::PathBuf;
use tracing::info;

#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(
        &self,
        profile: &CustomerProfile,
        amount: f64,
        tenure_months: u32,
    ) -> Result<DocumentReference>;
}

/// Terms printed on every letter.
#[derive(Debug, Clone)]
pub struct LetterTerms {
    pub annual_rate_percent: f64,
    pub validity_days: i64,
    pub processing_fee: u32,
    pub security: &'static str,
    pub conditions: &'static [&'static str],
}

impl Default for LetterTerms {
    fn default() -> Self {
        Self {
            annual_rate_percent: 12.0,
            validity_days: 60,
            processing_fee: 999,
            security: "No collateral required",
            conditions: &["PAN verification", "Salary slip last 3 months"],
        }
    }
}

/// Writes HTML sanction letters into a directory.
pub struct FileLetterRenderer {
    output_dir: PathBuf,
    terms: LetterTerms,
}

impl FileLetterRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            terms: LetterTerms::default(),
        }
    }
}

/// Filesystem-safe form of a customer name.
fn safe_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = false;
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "customer".to_string()
    } else {
        trimmed.to_string()
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
impl DocumentRenderer for FileLetterRenderer {
    async fn render(
        &self,
        profile: &CustomerProfile,
        amount: f64,
        tenure_months: u32,
    ) -> Result<DocumentReference> {
        let now = Utc::now();
        let application_no = format!("APP-{}", now.timestamp());
        let sanctioned_on = now.format("%d-%b-%Y").to_string();
        let valid_until = (now + ChronoDuration::days(self.terms.validity_days))
            .format("%d-%b-%Y")
            .to_string();
        let emi = eligibility::emi(amount, self.terms.annual_rate_percent, tenure_months as i64)
            .map(format_amount)
            .unwrap_or_else(|| "N/A".to_string());

        let conditions: String = self
            .terms
            .conditions
            .iter()
            .map(|c| format!("      <li>{}</li>\n", escape_html(c)))
            .collect();

        let html = format!(
            r#"<!DOCTYPE html>
<html>
  <head><meta charset="utf-8"><title>Loan Sanction Letter {application_no}</title></head>
  <body>
    <h1>Personal Loan Sanction Letter</h1>
    <p>Date: {sanctioned_on}</p>
    <p>Dear {name}{city},</p>
    <p>We are pleased to inform you that your personal loan application
       {application_no} (customer {customer_id}) has been sanctioned.</p>
    <table>
      <tr><td>Loan amount</td><td>₹{amount}</td></tr>
      <tr><td>Tenure</td><td>{tenure} months</td></tr>
      <tr><td>Rate of interest</td><td>{rate}% p.a.</td></tr>
      <tr><td>EMI</td><td>₹{emi}</td></tr>
      <tr><td>Processing fee</td><td>₹{fee}</td></tr>
      <tr><td>Other charges</td><td>NIL</td></tr>
      <tr><td>Security</td><td>{security}</td></tr>
      <tr><td>Valid until</td><td>{valid_until}</td></tr>
    </table>
    <p>Conditions precedent to disbursal:</p>
    <ul>
{conditions}    </ul>
    <p>This is a system-generated sanction letter.</p>
  </body>
</html>
"#,
            application_no = application_no,
            sanctioned_on = sanctioned_on,
            name = escape_html(&profile.name),
            city = profile
                .city
                .as_deref()
                .map(|c| format!(", {}", escape_html(c)))
                .unwrap_or_default(),
            customer_id = escape_html(&profile.customer_id),
            amount = format_amount(amount),
            tenure = tenure_months,
            rate = self.terms.annual_rate_percent,
            emi = emi,
            fee = self.terms.processing_fee,
            security = self.terms.security,
            valid_until = valid_until,
            conditions = conditions,
        );

        tokio::fs::create_dir_all(&self.output_dir).await.map_err(|e| {
            OrchestrationError::CollaboratorFailure(format!(
                "cannot create {}: {}",
                self.output_dir.display(),
                e
            ))
        })?;

        let file_name = format!(
            "Sanction_Letter_{}_{}.html",
            safe_name(&profile.name),
            application_no
        );
        let location = self.output_dir.join(&file_name);
        tokio::fs::write(&location, html).await.map_err(|e| {
            OrchestrationError::CollaboratorFailure(format!(
                "failed to write sanction letter {}: {}",
                location.display(),
                e
            ))
        })?;

        info!(customer_id = %profile.customer_id, file = %file_name, "Sanction letter issued");

        Ok(DocumentReference {
            file_name,
            location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> CustomerProfile {
        CustomerProfile {
            customer_id: "cust01".to_string(),
            name: "Ramesh S.".to_string(),
            email: "ramesh@example.com".to_string(),
            phone: String::new(),
            credit_score: 810,
            salary: 80_000.0,
            pre_approved_limit: 1_200_000.0,
            current_loan_status: "NA".to_string(),
            pan_number: None,
            city: Some("Mumbai".to_string()),
            age: None,
        }
    }

    #[test]
    fn test_safe_name() {
        assert_eq!(safe_name("Ramesh S."), "Ramesh_S");
        assert_eq!(safe_name("  A/B  C "), "A_B_C");
        assert_eq!(safe_name("..."), "customer");
    }

    #[tokio::test]
    async fn test_render_writes_letter() {
        let dir = std::env::temp_dir().join(format!("sanctions-{}", uuid::Uuid::new_v4()));
        let renderer = FileLetterRenderer::new(&dir);

        let doc = renderer.render(&profile(), 500_000.0, 60).await.unwrap();

        assert!(doc.file_name.starts_with("Sanction_Letter_Ramesh_S_APP-"));
        let html = tokio::fs::read_to_string(&doc.location).await.unwrap();
        assert!(html.contains("₹500,000"));
        assert!(html.contains("60 months"));
        assert!(html.contains("₹11,122"));
        assert!(html.contains("Dear Ramesh S., Mumbai"));
        assert!(html.contains("<li>PAN verification</li>"));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
