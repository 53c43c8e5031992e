//! Fixed reference answers: phone lines, offices, social media, PQR and
//! billing links. Zero-argument, pure.

use celsia_core::tool::{SideEffect, ToolRegistryBuilder, ToolResult};
use serde_json::json;

pub const PHONE: &str =
    "Linea Colombia: 01 8000 112 115, Línea Panamá: 00 800 2262591 y (507) 832 7907";

pub const ADDRESSES: &str = "Celsia Yumbo: CALLE 15 # 29B-30 AUTOPISTA, Autopista Cali - Yumbo, Yumbo, Valle del Cauca\nCelsia Ibagué: Calle 39A No. 5-15 Restrepo, Ibagué, Tolima";

pub const SOCIAL_MEDIA: &str = "X: @Celsia_Energia, Facebook: Celsia Energía, Instagram: celsia_enegia, TikTok: @celsia_energia";

pub const PQR: &str = "Para PQR, por favor entra al siguiente enlace: [PQR Celsia](https://clientes.celsia.com/clientes/home-pqr)";

pub const BILLING: &str = "Para pagar tu factura de Celsia, por favor visita el siguiente enlace: [Pago de Factura Celsia](https://clientes.celsia.com/clientes/login), deberás iniciar sesión o crear un usuario si eres cliente nuevo.";

/// (name, description, answer)
const REFERENCE_TOOLS: [(&str, &str, &str); 5] = [
    (
        "get_phone",
        "Obtiene los números de teléfono de atención de Celsia. Usar SÓLO si el usuario pide explícitamente el número de teléfono.",
        PHONE,
    ),
    (
        "get_address",
        "Obtiene las direcciones de las oficinas de Celsia. Usar SÓLO si el usuario pide explícitamente la dirección.",
        ADDRESSES,
    ),
    (
        "get_social_media",
        "Obtiene las redes sociales de Celsia. Usar SÓLO si el usuario pide explícitamente las redes sociales.",
        SOCIAL_MEDIA,
    ),
    (
        "get_pqr_link",
        "Obtiene el enlace para radicar peticiones, quejas y reclamos (PQR). Usar SÓLO si el usuario pide explícitamente el PQR.",
        PQR,
    ),
    (
        "get_billing_link",
        "Obtiene el enlace para pagar la factura de Celsia. Usar SÓLO si el usuario pide explícitamente cómo pagar la factura.",
        BILLING,
    ),
];

/// Add the reference tools to a registry under construction.
pub fn register(mut builder: ToolRegistryBuilder) -> ToolRegistryBuilder {
    for (name, description, answer) in REFERENCE_TOOLS {
        builder = builder.function(
            name,
            description,
            json!({"type": "object", "properties": {}}),
            SideEffect::Pure,
            move |_| Ok(ToolResult::success(answer)),
        );
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use celsia_core::tool::{ToolCall, ToolRegistry};

    fn call(name: &str) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments: json!({}),
        }
    }

    #[tokio::test]
    async fn reference_tools_return_fixed_strings() {
        let registry = register(ToolRegistry::builder()).build().unwrap();
        assert_eq!(registry.len(), 5);

        let phone = registry.execute(&call("get_phone")).await;
        assert!(phone.success);
        assert_eq!(phone.output, PHONE);
        assert_eq!(phone.call_id, "call_1");

        let address = registry.execute(&call("get_address")).await;
        assert!(address.output.contains("Yumbo"));
        assert!(address.output.contains("Ibagué"));
    }

    #[tokio::test]
    async fn extra_arguments_are_ignored() {
        let registry = register(ToolRegistry::builder()).build().unwrap();
        let mut c = call("get_billing_link");
        c.arguments = json!({"unused": true});
        assert_eq!(registry.execute(&c).await.output, BILLING);
    }
}
