//! Rooftop solar quote from monthly consumption.

use crate::common::{HELP_LINE, thousands};
use async_trait::async_trait;
use celsia_core::error::ToolError;
use celsia_core::tool::{Tool, ToolResult};
use serde::Serialize;

const MAX_CONSUMPTION_KWH: i64 = 5000;
/// Monthly kWh produced per installed kWp
const KWH_PER_KWP: f64 = 120.0;
const PANEL_KWP: f64 = 0.45;
const COST_PER_KWP: f64 = 3_500_000.0;
const TARIFF_COP_PER_KWH: f64 = 600.0;
const SAVINGS_SHARE: f64 = 0.8;

pub struct SolarEstimateTool;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolarQuote {
    pub monthly_consumption_kwh: u32,
    pub city: String,
    pub capacity_kwp: f64,
    pub panels: u32,
    pub installation_cost: u64,
    pub monthly_savings: u64,
    pub annual_savings: u64,
    pub payback_years: f64,
}

pub fn quote(monthly_consumption_kwh: u32, city: &str) -> SolarQuote {
    let kwh = f64::from(monthly_consumption_kwh);
    let capacity_kwp = kwh / KWH_PER_KWP;
    let panels = (capacity_kwp / PANEL_KWP).floor() as u32 + 1;
    let installation_cost = (capacity_kwp * COST_PER_KWP).floor() as u64;
    let monthly_savings = (kwh * TARIFF_COP_PER_KWH * SAVINGS_SHARE).floor() as u64;
    let annual_savings = monthly_savings * 12;
    let payback_years = (installation_cost as f64 / annual_savings as f64 * 10.0).round() / 10.0;

    SolarQuote {
        monthly_consumption_kwh,
        city: city.to_string(),
        capacity_kwp,
        panels,
        installation_cost,
        monthly_savings,
        annual_savings,
        payback_years,
    }
}

fn render(q: &SolarQuote) -> String {
    format!(
        "☀️ **INSTALACIÓN SOLAR EN {city}**\n\n\
         📊 Sistema recomendado:\n\
         • Paneles de 450W: {panels} unidades\n\
         • Potencia: {capacity:.1} kWp\n\n\
         💰 Inversión: ${cost} COP\n\
         💵 Ahorro mensual: ${monthly} COP\n\
         💵 Ahorro anual: ${annual} COP\n\n\
         📈 Recuperas tu inversión en: {payback:.1} años\n\n\
         Para cotización: {HELP_LINE}\n\
         Web: https://www.celsia.com/es/soluciones-en-eficiencia-energetica-para-empresas-y-constructoras/",
        city = q.city.to_uppercase(),
        panels = q.panels,
        capacity = q.capacity_kwp,
        cost = thousands(q.installation_cost),
        monthly = thousands(q.monthly_savings),
        annual = thousands(q.annual_savings),
        payback = q.payback_years,
    )
}

#[async_trait]
impl Tool for SolarEstimateTool {
    fn name(&self) -> &str {
        "estimate_solar_installation"
    }

    fn description(&self) -> &str {
        "Calcula el costo de instalación de paneles solares, el ahorro y el tiempo de retorno de la inversión a partir del consumo mensual."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "monthly_consumption_kwh": {
                    "type": "integer",
                    "exclusiveMinimum": 0,
                    "maximum": MAX_CONSUMPTION_KWH,
                    "description": "Consumo mensual en kWh, entre 1 y 5000 (ej: 200, 350)"
                },
                "city": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Ciudad donde instalar"
                }
            },
            "required": ["monthly_consumption_kwh", "city"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let kwh = arguments["monthly_consumption_kwh"].as_i64().unwrap_or(0);
        if kwh <= 0 || kwh > MAX_CONSUMPTION_KWH {
            return Err(ToolError::InvalidArguments(
                "El consumo debe estar entre 1 y 5000 kWh".into(),
            ));
        }
        let city = arguments["city"].as_str().unwrap_or_default().trim();

        let q = quote(kwh as u32, city);
        Ok(ToolResult::success(render(&q)).with_data(serde_json::to_value(&q).unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use celsia_core::tool::{ToolCall, ToolRegistry};

    #[test]
    fn quote_for_200_kwh() {
        let q = quote(200, "Cali");
        assert_eq!(q.panels, 4);
        assert_eq!(q.installation_cost, 5_833_333);
        assert_eq!(q.monthly_savings, 96_000);
        assert_eq!(q.annual_savings, 1_152_000);
        assert!((q.payback_years - 5.1).abs() < 1e-9);
        let exact = q.installation_cost as f64 / q.annual_savings as f64;
        assert!((q.payback_years - (exact * 10.0).round() / 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn rendered_quote() {
        let result = SolarEstimateTool
            .execute(serde_json::json!({"monthly_consumption_kwh": 200, "city": "Cali"}))
            .await
            .unwrap();
        assert!(result.output.contains("INSTALACIÓN SOLAR EN CALI"));
        assert!(result.output.contains("Paneles de 450W: 4 unidades"));
        assert!(result.output.contains("Potencia: 1.7 kWp"));
        assert!(result.output.contains("$5.833.333 COP"));
        assert!(result.output.contains("5.1 años"));
        assert_eq!(result.data.unwrap()["payback_years"], 5.1);
    }

    #[tokio::test]
    async fn out_of_range_consumption_rejected_by_tool() {
        for kwh in [0, 5001, -3] {
            let err = SolarEstimateTool
                .execute(serde_json::json!({"monthly_consumption_kwh": kwh, "city": "Cali"}))
                .await
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidArguments(_)));
        }
    }

    #[tokio::test]
    async fn out_of_range_consumption_rejected_by_registry() {
        let registry = ToolRegistry::builder().tool(SolarEstimateTool).build().unwrap();
        for kwh in [0, 5001] {
            let result = registry
                .execute(&ToolCall {
                    id: "c".into(),
                    name: "estimate_solar_installation".into(),
                    arguments: serde_json::json!({"monthly_consumption_kwh": kwh, "city": "Cali"}),
                })
                .await;
            assert!(!result.success);
            assert!(result.output.contains("invalid arguments"));
        }
    }

    #[tokio::test]
    async fn numeric_string_is_accepted_through_registry() {
        let registry = ToolRegistry::builder().tool(SolarEstimateTool).build().unwrap();
        let result = registry
            .execute(&ToolCall {
                id: "c".into(),
                name: "estimate_solar_installation".into(),
                arguments: serde_json::json!({"monthly_consumption_kwh": "5000", "city": "Ibagué"}),
            })
            .await;
        assert!(result.success, "{}", result.output);
    }
}
