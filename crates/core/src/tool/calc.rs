//! Loan amortization and deposit interest calculators. Pure
//! computation, no repository access.

use super::{fmt_amount, opt_f64, opt_i64, opt_str, reject_unknown, Args, BankingTool, ToolError};
use crate::types::ToolOutput;
use async_trait::async_trait;
use serde_json::json;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub struct LoanAmortization;

#[async_trait]
impl BankingTool for LoanAmortization {
    fn name(&self) -> &str {
        "loan_amortization"
    }

    fn description(&self) -> &str {
        "Eşit taksitli (annuite) kredi geri ödeme planı hesaplar. Anapara, \
         yıllık faiz oranı ve vade (ay) ister."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "principal": {"type": "number", "description": "Kredi tutarı"},
                "annual_rate": {"type": "number", "description": "Yıllık faiz oranı, yüzde"},
                "term_months": {"type": "integer", "description": "Vade, ay"},
                "currency": {"type": "string", "description": "Para birimi, varsayılan TRY"}
            },
            "required": ["principal", "annual_rate", "term_months"]
        })
    }

    async fn call(&self, args: Args) -> Result<ToolOutput, ToolError> {
        reject_unknown(&args, &["principal", "annual_rate", "term_months", "currency"])?;
        let principal = opt_f64(&args, "principal")?
            .ok_or_else(|| ToolError::InvalidInput("eksik parametre: principal".into()))?;
        let annual_rate = opt_f64(&args, "annual_rate")?
            .ok_or_else(|| ToolError::InvalidInput("eksik parametre: annual_rate".into()))?;
        let term_months = opt_i64(&args, "term_months")?
            .ok_or_else(|| ToolError::InvalidInput("eksik parametre: term_months".into()))?;
        let currency = opt_str(&args, "currency").unwrap_or_else(|| "TRY".into());

        if principal <= 0.0 {
            return Err(ToolError::InvalidInput("Kredi tutarı pozitif olmalı.".into()));
        }
        if annual_rate < 0.0 {
            return Err(ToolError::InvalidInput("Faiz oranı negatif olamaz.".into()));
        }
        if term_months < 1 || term_months > 480 {
            return Err(ToolError::InvalidInput("Vade 1 ile 480 ay arasında olmalı.".into()));
        }

        let i = annual_rate / 100.0 / 12.0;
        let n = term_months as f64;
        let installment = if i == 0.0 {
            principal / n
        } else {
            let growth = (1.0 + i).powf(n);
            principal * i * growth / (growth - 1.0)
        };

        let mut schedule = Vec::with_capacity(term_months as usize);
        let mut remaining = principal;
        let mut total_interest = 0.0;
        for month in 1..=term_months {
            let interest = remaining * i;
            // Last installment closes whatever is left so rounding
            // never leaves a residual balance.
            let (pay, principal_part) = if month == term_months {
                (remaining + interest, remaining)
            } else {
                (installment, installment - interest)
            };
            remaining -= principal_part;
            total_interest += interest;
            schedule.push(json!({
                "month": month,
                "installment": round2(pay),
                "principal": round2(principal_part),
                "interest": round2(interest),
                "remaining": round2(remaining.max(0.0)),
            }));
        }

        let total_payment = round2(principal + total_interest);
        Ok(ToolOutput::Data(json!({
            "summary": {
                "principal": round2(principal),
                "annual_rate": annual_rate,
                "term_months": term_months,
                "currency": currency,
                "monthly_installment": round2(installment),
                "total_interest": round2(total_interest),
                "total_payment": total_payment,
            },
            "schedule": schedule,
            "text": format!(
                "{} ay vadeli kredinin aylık taksiti {} {}, toplam geri ödeme {} {}.",
                term_months,
                fmt_amount(installment),
                currency,
                fmt_amount(total_payment),
                currency
            ),
            "ui_component": {
                "type": "amortization_table_card",
                "summary": {
                    "monthly_installment": round2(installment),
                    "total_payment": total_payment,
                },
                "schedule": schedule,
            },
        })))
    }
}

pub struct DepositInterest;

#[async_trait]
impl BankingTool for DepositInterest {
    fn name(&self) -> &str {
        "deposit_interest"
    }

    fn description(&self) -> &str {
        "Vadeli mevduat getirisi hesaplar. Anapara, yıllık faiz oranı ve \
         vade (ay) ister; aylık bileşik faiz uygular."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "principal": {"type": "number", "description": "Mevduat tutarı"},
                "annual_rate": {"type": "number", "description": "Yıllık faiz oranı, yüzde"},
                "term_months": {"type": "integer", "description": "Vade, ay"},
                "currency": {"type": "string", "description": "Para birimi, varsayılan TRY"}
            },
            "required": ["principal", "annual_rate", "term_months"]
        })
    }

    async fn call(&self, args: Args) -> Result<ToolOutput, ToolError> {
        reject_unknown(&args, &["principal", "annual_rate", "term_months", "currency"])?;
        let principal = opt_f64(&args, "principal")?
            .ok_or_else(|| ToolError::InvalidInput("eksik parametre: principal".into()))?;
        let annual_rate = opt_f64(&args, "annual_rate")?
            .ok_or_else(|| ToolError::InvalidInput("eksik parametre: annual_rate".into()))?;
        let term_months = opt_i64(&args, "term_months")?
            .ok_or_else(|| ToolError::InvalidInput("eksik parametre: term_months".into()))?;
        let currency = opt_str(&args, "currency").unwrap_or_else(|| "TRY".into());

        if principal <= 0.0 {
            return Err(ToolError::InvalidInput("Mevduat tutarı pozitif olmalı.".into()));
        }
        if annual_rate < 0.0 {
            return Err(ToolError::InvalidInput("Faiz oranı negatif olamaz.".into()));
        }
        if term_months < 1 || term_months > 120 {
            return Err(ToolError::InvalidInput("Vade 1 ile 120 ay arasında olmalı.".into()));
        }

        let i = annual_rate / 100.0 / 12.0;
        let maturity = principal * (1.0 + i).powf(term_months as f64);
        let interest = maturity - principal;

        Ok(ToolOutput::Data(json!({
            "summary": {
                "principal": round2(principal),
                "annual_rate": annual_rate,
                "term_months": term_months,
                "currency": currency,
                "interest_earned": round2(interest),
                "maturity_amount": round2(maturity),
            },
            "text": format!(
                "{} ay sonunda mevduatınız {} {} olur ({} {} faiz getirisi).",
                term_months,
                fmt_amount(maturity),
                currency,
                fmt_amount(interest),
                currency
            ),
            "ui_component": {
                "type": "deposit_interest_card",
                "maturity_amount": round2(maturity),
                "interest_earned": round2(interest),
            },
        })))
    }
}
