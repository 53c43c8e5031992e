//! Built-in tools for the Celsia assistant.
//!
//! Direct tools answer fixed customer questions (phones, offices, links),
//! simulate account operations (invoices, solar quotes) and manage damage
//! tickets. The knowledge tool answers everything else from the indexed
//! corpus.

pub mod common;
pub mod damage_report;
pub mod invoice;
pub mod knowledge_search;
pub mod reference;
pub mod service_status;
pub mod solar;

use celsia_core::error::ToolError;
use celsia_core::tool::{ToolRegistry, ToolRegistryBuilder};

pub use damage_report::{CheckReportStatusTool, DamageType, ReportDamageTool, TicketRecord, TicketStore};
pub use invoice::InvoiceTool;
pub use knowledge_search::{FALLBACK_ANSWER, KnowledgeAnswer, KnowledgeSettings, KnowledgeTool};
pub use service_status::ServiceStatusTool;
pub use solar::SolarEstimateTool;

/// Builder pre-loaded with every deterministic tool, sharing `tickets`.
pub fn direct_tools(tickets: TicketStore) -> ToolRegistryBuilder {
    reference::register(ToolRegistry::builder())
        .tool(InvoiceTool::new())
        .tool(ServiceStatusTool)
        .tool(SolarEstimateTool)
        .tool(ReportDamageTool::new(tickets.clone()))
        .tool(CheckReportStatusTool::new(tickets))
}

/// The full registry: direct tools first, then the knowledge tool when available.
pub fn default_registry(
    tickets: TicketStore,
    knowledge: Option<KnowledgeTool>,
) -> Result<ToolRegistry, ToolError> {
    let mut builder = direct_tools(tickets);
    if let Some(knowledge) = knowledge {
        builder = builder.tool(knowledge);
    }
    builder.build()
}
