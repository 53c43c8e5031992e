//! Simulated invoice: a believable, reproducible bill for an account and month.
//!
//! The consumption figure is derived from a SHA-256 seed of the account
//! number and month, so the same inputs always produce the same invoice.

use crate::common::{Clock, capitalize, system_clock, thousands};
use async_trait::async_trait;
use celsia_core::error::ToolError;
use celsia_core::tool::{Tool, ToolResult};
use chrono::{Datelike, Duration};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// COP per kWh
pub const RATE_PER_KWH: u64 = 550;
const MIN_CONSUMPTION_KWH: u64 = 120;
const CONSUMPTION_SPREAD: u64 = 231;
const OTHER_CHARGES_PCT: u64 = 8;
const DUE_IN_DAYS: i64 = 15;

pub struct InvoiceTool {
    clock: Clock,
}

impl InvoiceTool {
    pub fn new() -> Self {
        Self {
            clock: system_clock(),
        }
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self { clock }
    }
}

impl Default for InvoiceTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invoice {
    pub account_number: String,
    pub month: String,
    pub year: i32,
    pub consumption_kwh: u64,
    pub consumption_value: u64,
    pub other_charges: u64,
    pub total: u64,
    pub due_date: String,
}

/// Consumption in [120, 350] kWh, fixed per (account, month).
pub fn consumption_for(account_number: &str, month: &str) -> u64 {
    let digest = Sha256::digest(format!("{account_number}:{}", month.trim().to_lowercase()));
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest[..8]);
    MIN_CONSUMPTION_KWH + u64::from_be_bytes(seed) % CONSUMPTION_SPREAD
}

fn is_account_number(s: &str) -> bool {
    s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit())
}

impl InvoiceTool {
    fn compute(&self, account_number: &str, month: &str) -> Invoice {
        let consumption_kwh = consumption_for(account_number, month);
        let consumption_value = consumption_kwh * RATE_PER_KWH;
        let other_charges = consumption_value * OTHER_CHARGES_PCT / 100;
        let now = (self.clock)();

        Invoice {
            account_number: account_number.to_string(),
            month: month.trim().to_string(),
            year: now.year(),
            consumption_kwh,
            consumption_value,
            other_charges,
            total: consumption_value + other_charges,
            due_date: (now + Duration::days(DUE_IN_DAYS)).format("%Y-%m-%d").to_string(),
        }
    }
}

fn render(invoice: &Invoice) -> String {
    format!(
        "📄 **FACTURA DE ENERGÍA - {month_upper}**\n\n\
         Cuenta: {account}\n\
         Período: {month} {year}\n\n\
         ⚡ Consumo: {kwh} kWh\n\
         💵 Valor consumo: ${value} COP\n\
         📊 Otros cargos: ${other} COP\n\n\
         💰 **TOTAL A PAGAR: ${total} COP**\n\
         📅 Vence: {due}\n\n\
         Paga en: https://clientes.celsia.com",
        month_upper = invoice.month.to_uppercase(),
        account = invoice.account_number,
        month = capitalize(&invoice.month),
        year = invoice.year,
        kwh = invoice.consumption_kwh,
        value = thousands(invoice.consumption_value),
        other = thousands(invoice.other_charges),
        total = thousands(invoice.total),
        due = invoice.due_date,
    )
}

#[async_trait]
impl Tool for InvoiceTool {
    fn name(&self) -> &str {
        "generate_simulated_invoice"
    }

    fn description(&self) -> &str {
        "Genera una factura simulada con consumo y valor a pagar. Usar si el usuario pide ver su factura indicando número de cuenta y mes."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "account_number": {
                    "type": "string",
                    "description": "Número de cuenta de 8 dígitos (ej: '12345678')"
                },
                "month": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Mes a consultar (ej: 'octubre', 'noviembre')"
                }
            },
            "required": ["account_number", "month"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let account = arguments["account_number"].as_str().unwrap_or_default().trim();
        let month = arguments["month"].as_str().unwrap_or_default();

        if !is_account_number(account) {
            return Err(ToolError::InvalidArguments(
                "El número de cuenta debe tener 8 dígitos.".into(),
            ));
        }
        if month.trim().is_empty() {
            return Err(ToolError::InvalidArguments("Debes indicar el mes a consultar.".into()));
        }

        let invoice = self.compute(account, month);
        Ok(ToolResult::success(render(&invoice))
            .with_data(serde_json::to_value(&invoice).unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use std::sync::Arc;

    fn fixed_tool() -> InvoiceTool {
        InvoiceTool::with_clock(Arc::new(|| {
            Local.with_ymd_and_hms(2025, 10, 20, 9, 30, 0).unwrap()
        }))
    }

    #[tokio::test]
    async fn invoice_is_deterministic() {
        let tool = fixed_tool();
        let args = serde_json::json!({"account_number": "12345678", "month": "octubre"});
        let first = tool.execute(args.clone()).await.unwrap();
        let second = tool.execute(args).await.unwrap();
        assert_eq!(first.output, second.output);
        assert!(first.output.contains("FACTURA DE ENERGÍA - OCTUBRE"));
        assert!(first.output.contains("Período: Octubre 2025"));
        assert!(first.output.contains("Vence: 2025-11-04"));
    }

    #[test]
    fn month_is_case_insensitive_for_the_seed() {
        assert_eq!(consumption_for("12345678", "Octubre "), consumption_for("12345678", "octubre"));
    }

    #[tokio::test]
    async fn figures_follow_the_tariff() {
        let tool = fixed_tool();
        let result = tool
            .execute(serde_json::json!({"account_number": "87654321", "month": "enero"}))
            .await
            .unwrap();
        let data = result.data.unwrap();
        let kwh = data["consumption_kwh"].as_u64().unwrap();
        assert!((120..=350).contains(&kwh));
        assert_eq!(data["consumption_value"], kwh * 550);
        assert_eq!(data["other_charges"], kwh * 550 * 8 / 100);
        assert_eq!(
            data["total"].as_u64().unwrap(),
            data["consumption_value"].as_u64().unwrap() + data["other_charges"].as_u64().unwrap()
        );
    }

    #[tokio::test]
    async fn seven_digit_account_is_rejected() {
        let tool = fixed_tool();
        let err = tool
            .execute(serde_json::json!({"account_number": "1234567", "month": "enero"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(ref m) if m.contains("8 dígitos")));
    }

    #[tokio::test]
    async fn non_digit_account_is_rejected() {
        let tool = fixed_tool();
        assert!(tool
            .execute(serde_json::json!({"account_number": "1234567a", "month": "enero"}))
            .await
            .is_err());
    }

    #[test]
    fn consumption_stays_in_range() {
        for account in ["00000000", "12345678", "99999999", "31415926"] {
            for month in ["enero", "febrero", "diciembre"] {
                let kwh = consumption_for(account, month);
                assert!((120..=350).contains(&kwh), "{account}/{month} -> {kwh}");
            }
        }
    }
}
