//! Damage reports and the in-memory ticket table behind them.
//!
//! [`TicketStore`] is shared between [`ReportDamageTool`] and
//! [`CheckReportStatusTool`]. Ticket ids are assigned under the table's
//! mutex, so concurrent reports get unique, gapless `TKT-<n>` ids.

use crate::common::{Clock, HELP_LINE, fold_accents, system_clock};
use async_trait::async_trait;
use celsia_core::error::ToolError;
use celsia_core::tool::{SideEffect, Tool, ToolResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

const FIRST_TICKET_NUMBER: u64 = 1001;
const STATUS_IN_PROGRESS: &str = "En proceso";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    Outage,
    DamagedPole,
    FallenCable,
    Fluctuation,
}

impl DamageType {
    /// Canonical spellings: the English names, then the Spanish aliases.
    /// [`DamageType::parse`] also accepts them in any case, with or without
    /// accents, and with spaces instead of underscores.
    pub const ACCEPTED: [&'static str; 9] = [
        "outage",
        "damaged_pole",
        "fallen_cable",
        "fluctuation",
        "apagon",
        "poste_dañado",
        "poste_danado",
        "cable_caido",
        "fluctuacion",
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match fold_accents(s).replace(' ', "_").as_str() {
            "outage" | "apagon" => Some(Self::Outage),
            "damaged_pole" | "poste_danado" => Some(Self::DamagedPole),
            "fallen_cable" | "cable_caido" => Some(Self::FallenCable),
            "fluctuation" | "fluctuacion" => Some(Self::Fluctuation),
            _ => None,
        }
    }

    /// Customer-facing label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Outage => "apagon",
            Self::DamagedPole => "poste_dañado",
            Self::FallenCable => "cable_caido",
            Self::Fluctuation => "fluctuacion",
        }
    }

    /// Estimated resolution window.
    pub fn resolution_window(self) -> &'static str {
        match self {
            Self::Outage => "2-4 horas",
            Self::DamagedPole => "4-8 horas",
            Self::FallenCable => "1-3 horas (URGENTE)",
            Self::Fluctuation => "8-24 horas",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketRecord {
    pub ticket_id: String,
    pub damage_type: DamageType,
    pub address: String,
    pub phone: String,
    pub created_at: String,
    pub status: String,
}

#[derive(Debug)]
struct TicketTable {
    next: u64,
    tickets: HashMap<String, TicketRecord>,
}

/// Process-lifetime ticket table. Cheap to clone; clones share the table.
#[derive(Debug, Clone)]
pub struct TicketStore {
    inner: Arc<Mutex<TicketTable>>,
}

impl Default for TicketStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(TicketTable {
                next: FIRST_TICKET_NUMBER,
                tickets: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TicketTable> {
        // A panic while holding the lock cannot leave the table half-written.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create a ticket with the next sequential id.
    pub fn create(
        &self,
        damage_type: DamageType,
        address: &str,
        phone: &str,
        created_at: String,
    ) -> TicketRecord {
        let mut table = self.lock();
        let ticket_id = format!("TKT-{}", table.next);
        table.next += 1;

        let record = TicketRecord {
            ticket_id: ticket_id.clone(),
            damage_type,
            address: address.to_string(),
            phone: phone.to_string(),
            created_at,
            status: STATUS_IN_PROGRESS.to_string(),
        };
        table.tickets.insert(ticket_id, record.clone());
        record
    }

    /// Case-insensitive lookup by ticket id.
    pub fn get(&self, ticket_id: &str) -> Option<TicketRecord> {
        let key = ticket_id.trim().to_uppercase();
        self.lock().tickets.get(&key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct ReportDamageTool {
    store: TicketStore,
    clock: Clock,
}

impl ReportDamageTool {
    pub fn new(store: TicketStore) -> Self {
        Self {
            store,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl Tool for ReportDamageTool {
    fn name(&self) -> &str {
        "report_service_damage"
    }

    fn description(&self) -> &str {
        "Registra un reporte de daño en el servicio eléctrico (apagón, poste dañado, cable caído, fluctuación) y devuelve un número de ticket."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "damage_type": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Tipo de daño: outage (apagón), damaged_pole (poste dañado), fallen_cable (cable caído) o fluctuation (fluctuación)"
                },
                "address": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Dirección donde ocurre el daño"
                },
                "phone": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Teléfono de contacto"
                }
            },
            "required": ["damage_type", "address", "phone"]
        })
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Stateful
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let raw_type = arguments["damage_type"].as_str().unwrap_or_default();
        let Some(damage_type) = DamageType::parse(raw_type) else {
            return Err(ToolError::InvalidArguments(format!(
                "Tipo de daño no reconocido: '{raw_type}'. Usa uno de: {}.",
                DamageType::ACCEPTED.join(", ")
            )));
        };
        let address = arguments["address"].as_str().unwrap_or_default().trim();
        let phone = arguments["phone"].as_str().unwrap_or_default().trim();
        if address.is_empty() || phone.is_empty() {
            return Err(ToolError::InvalidArguments(
                "Debes indicar la dirección y un teléfono de contacto.".into(),
            ));
        }

        let created_at = (self.clock)().format("%Y-%m-%d %H:%M").to_string();
        let ticket = self.store.create(damage_type, address, phone, created_at);
        info!(ticket = %ticket.ticket_id, damage_type = ?damage_type, "Damage report created");

        let output = format!(
            "✅ **REPORTE CREADO**\n\n\
             🎫 Ticket: {id}\n\
             📋 Tipo: {label}\n\
             📍 Dirección: {address}\n\
             📞 Contacto: {phone}\n\
             📅 Fecha: {date}\n\n\
             ⏱️ Tiempo estimado: {window}\n\n\
             Guarda tu número de ticket para seguimiento.\n\
             Línea de ayuda: {HELP_LINE}",
            id = ticket.ticket_id,
            label = damage_type.label(),
            address = ticket.address,
            phone = ticket.phone,
            date = ticket.created_at,
            window = damage_type.resolution_window(),
        );
        Ok(ToolResult::success(output).with_data(serde_json::to_value(&ticket).unwrap_or_default()))
    }
}

pub struct CheckReportStatusTool {
    store: TicketStore,
}

impl CheckReportStatusTool {
    pub fn new(store: TicketStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CheckReportStatusTool {
    fn name(&self) -> &str {
        "check_report_status"
    }

    fn description(&self) -> &str {
        "Consulta el estado de un reporte de daño a partir de su número de ticket (formato TKT-XXXX)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "ticket_id": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Número de ticket (ej: TKT-1001)"
                }
            },
            "required": ["ticket_id"]
        })
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Stateful
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let ticket_id = arguments["ticket_id"].as_str().unwrap_or_default().trim();

        let Some(ticket) = self.store.get(ticket_id) else {
            return Ok(ToolResult::success(format!(
                "❌ **TICKET NO ENCONTRADO**\n\n\
                 El ticket '{ticket_id}' no existe.\n\
                 Verifica el número (formato: TKT-XXXX)\n\n\
                 📞 Ayuda: {HELP_LINE}"
            ))
            .with_data(serde_json::json!({"ticket_id": ticket_id, "found": false})));
        };

        let output = format!(
            "🎫 **ESTADO DEL TICKET: {id}**\n\n\
             📊 Estado: {status}\n\
             📋 Tipo: {label}\n\
             📍 Dirección: {address}\n\
             📅 Reportado: {date}\n\n\
             💡 Un técnico se comunicará contigo pronto.\n\n\
             📞 Seguimiento: {HELP_LINE}",
            id = ticket.ticket_id,
            status = ticket.status,
            label = ticket.damage_type.label(),
            address = ticket.address,
            date = ticket.created_at,
        );
        let mut data = serde_json::to_value(&ticket).unwrap_or_default();
        data["found"] = serde_json::Value::Bool(true);
        Ok(ToolResult::success(output).with_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use std::collections::HashSet;

    fn report_args(damage_type: &str) -> serde_json::Value {
        serde_json::json!({
            "damage_type": damage_type,
            "address": "Calle 10 # 5-20",
            "phone": "3001234567"
        })
    }

    #[test]
    fn parses_english_and_spanish_names() {
        assert_eq!(DamageType::parse("outage"), Some(DamageType::Outage));
        assert_eq!(DamageType::parse("Apagón"), Some(DamageType::Outage));
        assert_eq!(DamageType::parse("poste_dañado"), Some(DamageType::DamagedPole));
        assert_eq!(DamageType::parse("cable caído"), Some(DamageType::FallenCable));
        assert_eq!(DamageType::parse("fluctuacion"), Some(DamageType::Fluctuation));
        assert_eq!(DamageType::parse("earthquake"), None);
        for name in DamageType::ACCEPTED {
            assert!(DamageType::parse(name).is_some(), "{name}");
        }
    }

    #[tokio::test]
    async fn report_creates_sequential_tickets() {
        let store = TicketStore::new();
        let tool = ReportDamageTool::new(store.clone()).with_clock(Arc::new(|| {
            Local.with_ymd_and_hms(2025, 11, 7, 14, 5, 0).unwrap()
        }));

        let first = tool.execute(report_args("fallen_cable")).await.unwrap();
        assert!(first.output.contains("Ticket: TKT-1001"));
        assert!(first.output.contains("1-3 horas (URGENTE)"));
        assert!(first.output.contains("Fecha: 2025-11-07 14:05"));
        assert_eq!(first.data.unwrap()["status"], "En proceso");

        let second = tool.execute(report_args("outage")).await.unwrap();
        assert!(second.output.contains("Ticket: TKT-1002"));
        assert!(second.output.contains("2-4 horas"));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn unknown_damage_type_is_rejected() {
        let tool = ReportDamageTool::new(TicketStore::new());
        let err = tool.execute(report_args("earthquake")).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn concurrent_reports_get_unique_ids() {
        let store = TicketStore::new();
        let tool = Arc::new(ReportDamageTool::new(store.clone()));

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let tool = Arc::clone(&tool);
                tokio::spawn(async move { tool.execute(report_args("outage")).await })
            })
            .collect();
        let results = futures::future::join_all(handles).await;

        let ids: HashSet<String> = results
            .into_iter()
            .map(|r| r.unwrap().unwrap().data.unwrap()["ticket_id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids.len(), 50);
        for n in 1001..1051 {
            assert!(ids.contains(&format!("TKT-{n}")));
        }

        let status = CheckReportStatusTool::new(store);
        for id in &ids {
            let result = status.execute(serde_json::json!({"ticket_id": id})).await.unwrap();
            assert_eq!(result.data.unwrap()["found"], true);
        }
    }

    #[tokio::test]
    async fn status_lookup_is_case_insensitive() {
        let store = TicketStore::new();
        ReportDamageTool::new(store.clone())
            .execute(report_args("damaged_pole"))
            .await
            .unwrap();

        let result = CheckReportStatusTool::new(store)
            .execute(serde_json::json!({"ticket_id": "tkt-1001"}))
            .await
            .unwrap();
        assert!(result.output.contains("ESTADO DEL TICKET: TKT-1001"));
        assert!(result.output.contains("Estado: En proceso"));
        assert!(result.output.contains("Tipo: poste_dañado"));
    }

    #[tokio::test]
    async fn unknown_ticket_is_not_found() {
        let result = CheckReportStatusTool::new(TicketStore::new())
            .execute(serde_json::json!({"ticket_id": "TKT-9999"}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("TICKET NO ENCONTRADO"));
        assert!(result.output.contains("'TKT-9999'"));
        assert_eq!(result.data.unwrap()["found"], false);
    }
}
