//! Direct debit mandates
//!
//! Mandate creation is a two-phase exchange with the provider: local format
//! validation first, then a remote modulus check and registration. The
//! instruction is only committed after the provider accepts, so a provider
//! failure leaves no partial state.

use chrono::{DateTime, Utc};
use core_kernel::{MandateBankDetails, MandateId, MandateRegistrar, MandateRegistration};
use serde::{Deserialize, Serialize};
use tracing::info;

use domain_billing::ValidationReport;

use crate::error::DirectDebitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstructionStatus {
    Active,
    Cancelled,
}

/// A committed direct debit instruction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectDebitInstruction {
    pub id: MandateId,
    pub account_name: String,
    pub sort_code: String,
    pub account_number: String,
    pub status: InstructionStatus,
    pub created_at: DateTime<Utc>,
}

impl DirectDebitInstruction {
    pub fn is_active(&self) -> bool {
        self.status == InstructionStatus::Active
    }

    pub fn cancel(&mut self) -> Result<(), DirectDebitError> {
        if !self.is_active() {
            return Err(DirectDebitError::invalid_transition(format!(
                "Instruction {} is not active",
                self.id
            )));
        }
        self.status = InstructionStatus::Cancelled;
        Ok(())
    }
}

/// Local format validation, run before any provider call
pub fn validate_bank_details(details: &MandateBankDetails) -> Result<(), DirectDebitError> {
    let mut report = ValidationReport::new();
    if details.account_name.trim().is_empty() {
        report.add("accountName", "Enter the name on the account");
    }
    let sort_code_digits =
        details.sort_code.len() == 6 && details.sort_code.bytes().all(|b| b.is_ascii_digit());
    if !sort_code_digits || details.sort_code == "000000" {
        report.add("sortCode", "Enter a valid sort code");
    }
    if details.account_number.len() != 8
        || !details.account_number.bytes().all(|b| b.is_ascii_digit())
    {
        report.add("accountNumber", "Enter a valid account number");
    }
    if report.is_empty() {
        Ok(())
    } else {
        Err(DirectDebitError::Validation(report))
    }
}

/// Registers a mandate with the provider and returns the instruction
///
/// Validation, modulus check and registration happen in that order; the
/// first failure aborts the whole exchange and nothing is committed. The
/// caller switches the account's payment method only on success.
pub async fn register_mandate(
    registrar: &dyn MandateRegistrar,
    client_reference: &str,
    surname: &str,
    bank_details: MandateBankDetails,
) -> Result<DirectDebitInstruction, DirectDebitError> {
    validate_bank_details(&bank_details)?;
    registrar
        .modulus_check(&bank_details.sort_code, &bank_details.account_number)
        .await?;
    registrar
        .create_mandate(&MandateRegistration {
            client_reference: client_reference.to_string(),
            surname: surname.to_string(),
            bank_details: bank_details.clone(),
        })
        .await?;
    info!(%client_reference, "direct debit mandate registered");
    Ok(DirectDebitInstruction {
        id: MandateId::new(),
        account_name: bank_details.account_name,
        sort_code: bank_details.sort_code,
        account_number: bank_details.account_number,
        status: InstructionStatus::Active,
        created_at: Utc::now(),
    })
}

/// Cancels the mandate with the provider, then the local instruction
pub async fn cancel_mandate(
    registrar: &dyn MandateRegistrar,
    client_reference: &str,
    instruction: &mut DirectDebitInstruction,
) -> Result<(), DirectDebitError> {
    if !instruction.is_active() {
        return Err(DirectDebitError::invalid_transition(format!(
            "Instruction {} is not active",
            instruction.id
        )));
    }
    registrar.cancel_mandate(client_reference).await?;
    instruction.cancel()?;
    info!(%client_reference, "direct debit mandate cancelled");
    Ok(())
}
