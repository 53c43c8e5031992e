//! Scheduled outage lookup by city.

use crate::common::{HELP_LINE, fold_accents};
use async_trait::async_trait;
use celsia_core::error::ToolError;
use celsia_core::tool::{Tool, ToolResult};

/// Scheduled work, keyed by accent-folded lowercase city name.
const SCHEDULED_WORK: [(&str, &str); 3] = [
    (
        "buenaventura",
        "Hay mantenimiento programado en la red eléctrica el 09/11 de 10:00 a 12:00",
    ),
    ("tulua", "Hay mantenimiento programado en el 08/11 de 14:00 a 17:00"),
    ("ibague", "Reparación en el Centro el 07/11 de 08:00 a 12:00"),
];

pub struct ServiceStatusTool;

/// The scheduled-work notice for `city`, if any.
pub fn scheduled_work(city: &str) -> Option<&'static str> {
    let key = fold_accents(city);
    SCHEDULED_WORK
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, notice)| *notice)
}

#[async_trait]
impl Tool for ServiceStatusTool {
    fn name(&self) -> &str {
        "check_service_status"
    }

    fn description(&self) -> &str {
        "Verifica si hay interrupciones programadas del servicio de energía en una ciudad (Palmira, Tuluá, Ibagué, Buenaventura...)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Ciudad a consultar (ej: Palmira, Tuluá, Ibagué, Buenaventura)"
                }
            },
            "required": ["city"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let city = arguments["city"].as_str().unwrap_or_default().trim();
        if city.is_empty() {
            return Err(ToolError::InvalidArguments("Debes indicar la ciudad.".into()));
        }

        let city_upper = city.to_uppercase();
        let (output, notice) = match scheduled_work(city) {
            Some(notice) => (
                format!(
                    "⚠️ **INTERRUPCIÓN PROGRAMADA EN {city_upper}**\n\n\
                     {notice}\n\n\
                     Recomendaciones:\n\
                     • Desconecta equipos sensibles\n\
                     • Ten cargado tu celular\n\n\
                     📞 Más info: {HELP_LINE}"
                ),
                Some(notice),
            ),
            None => (
                format!(
                    "✅ **SERVICIO NORMAL EN {city_upper}**\n\n\
                     No hay interrupciones programadas.\n\
                     El servicio opera con normalidad.\n\n\
                     Si tienes problemas, repórtalos al: {HELP_LINE}"
                ),
                None,
            ),
        };

        Ok(ToolResult::success(output).with_data(serde_json::json!({
            "city": city,
            "scheduled_work": notice,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scheduled_city_matches_with_or_without_accents() {
        for city in ["Tuluá", "tulua", "  TULUA "] {
            let result = ServiceStatusTool
                .execute(serde_json::json!({"city": city}))
                .await
                .unwrap();
            assert!(result.output.contains("INTERRUPCIÓN PROGRAMADA"), "{city}");
            assert!(result.output.contains("08/11 de 14:00 a 17:00"));
        }
    }

    #[tokio::test]
    async fn decomposed_accents_match_through_the_registry() {
        let registry = celsia_core::tool::ToolRegistry::builder()
            .tool(ServiceStatusTool)
            .build()
            .unwrap();
        // "Tuluá" and "Ibagué" typed as base letter plus combining acute accent.
        for city in ["Tulua\u{301}", "IBAGUE\u{301}"] {
            let result = registry
                .execute(&celsia_core::tool::ToolCall {
                    id: "call_1".into(),
                    name: "check_service_status".into(),
                    arguments: serde_json::json!({"city": city}),
                })
                .await;
            assert!(result.success);
            assert!(result.output.contains("INTERRUPCIÓN PROGRAMADA"), "{city}");
            assert!(!result.output.contains("SERVICIO NORMAL"), "{city}");
        }
    }

    #[tokio::test]
    async fn other_city_reports_normal_service() {
        let result = ServiceStatusTool
            .execute(serde_json::json!({"city": "Palmira"}))
            .await
            .unwrap();
        assert!(result.output.contains("SERVICIO NORMAL EN PALMIRA"));
        assert!(result.output.contains(HELP_LINE));
        assert_eq!(result.data.unwrap()["scheduled_work"], serde_json::Value::Null);
    }

    #[test]
    fn lookup_table() {
        assert!(scheduled_work("Ibagué").is_some());
        assert!(scheduled_work("Buenaventura").is_some());
        assert!(scheduled_work("Cali").is_none());
    }
}
