//! Retrieval-backed knowledge tool.
//!
//! Answers a free-form question from the indexed corpus: retrieve passages,
//! pack them into a bounded context, and ask the language engine to answer
//! strictly from that context. Failures never escape as errors; the agent
//! gets a short diagnostic it can relay to the customer.

use crate::common::HELP_LINE;
use async_trait::async_trait;
use celsia_core::error::ToolError;
use celsia_core::message::Message;
use celsia_core::provider::{Provider, ProviderRequest, SamplingParams};
use celsia_core::tool::{Tool, ToolResult};
use celsia_retrieval::{QueryOptions, RetrievedPassage, VectorIndex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Returned verbatim when the corpus has nothing relevant.
pub const FALLBACK_ANSWER: &str = "Lamento no poder ofrecer una respuesta precisa basada en la información disponible. Por favor, consulta los canales oficiales de CELSIA o llama a la línea de servicio al cliente.";

const PASSAGE_SEPARATOR: &str = "\n\n";
const CHARS_PER_TOKEN: usize = 4;

/// Knobs for one knowledge tool instance.
#[derive(Debug, Clone)]
pub struct KnowledgeSettings {
    pub model: String,
    pub sampling: SamplingParams,
    pub max_tokens: Option<u32>,
    pub query: QueryOptions,
    /// Context budget in tokens (~4 chars each)
    pub max_context_tokens: usize,
    pub retrieval_timeout: Duration,
    pub llm_timeout: Duration,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            model: "qwen3:4b".into(),
            sampling: SamplingParams::default(),
            max_tokens: None,
            query: QueryOptions::new(5),
            max_context_tokens: 3000,
            retrieval_timeout: Duration::from_secs(30),
            llm_timeout: Duration::from_secs(120),
        }
    }
}

/// What the knowledge tool produced for one question.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeAnswer {
    pub text: String,
    pub sources: Vec<String>,
    /// False when retrieval or the engine failed
    pub grounded: bool,
}

impl KnowledgeAnswer {
    fn fallback() -> Self {
        Self {
            text: FALLBACK_ANSWER.to_string(),
            sources: Vec::new(),
            grounded: true,
        }
    }

    fn unavailable() -> Self {
        Self {
            text: format!(
                "No pude consultar la base de conocimiento en este momento. Por favor, consulta los canales oficiales de CELSIA o llama al {HELP_LINE}."
            ),
            sources: Vec::new(),
            grounded: false,
        }
    }
}

pub struct KnowledgeTool {
    index: Arc<VectorIndex>,
    engine: Arc<dyn Provider>,
    settings: KnowledgeSettings,
}

impl KnowledgeTool {
    pub fn new(index: Arc<VectorIndex>, engine: Arc<dyn Provider>, settings: KnowledgeSettings) -> Self {
        Self {
            index,
            engine,
            settings,
        }
    }

    /// Answer `question` from the corpus.
    pub async fn answer(&self, question: &str) -> KnowledgeAnswer {
        let started = Instant::now();

        let retrieval = tokio::time::timeout(
            self.settings.retrieval_timeout,
            self.index.query(question, self.settings.query),
        )
        .await;
        let passages = match retrieval {
            Ok(Ok(passages)) => passages,
            Ok(Err(e)) => {
                warn!(error = %e, "Knowledge retrieval failed");
                return KnowledgeAnswer::unavailable();
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.settings.retrieval_timeout.as_secs(),
                    "Knowledge retrieval timed out"
                );
                return KnowledgeAnswer::unavailable();
            }
        };

        if passages.is_empty() {
            debug!("No passages retrieved, answering with the fallback");
            return KnowledgeAnswer::fallback();
        }

        let kept = within_budget(&passages, self.settings.max_context_tokens * CHARS_PER_TOKEN);
        let context = kept
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(PASSAGE_SEPARATOR);
        let mut sources: Vec<String> = Vec::new();
        for p in kept {
            if !sources.contains(&p.source) {
                sources.push(p.source.clone());
            }
        }

        let request = ProviderRequest {
            model: self.settings.model.clone(),
            messages: vec![Message::user(render_prompt(&context, question))],
            sampling: self.settings.sampling,
            max_tokens: self.settings.max_tokens,
            tools: Vec::new(),
        };

        let response = tokio::time::timeout(self.settings.llm_timeout, self.engine.complete(request)).await;
        let text = match response {
            Ok(Ok(response)) => response.message.content,
            Ok(Err(e)) => {
                warn!(error = %e, "Knowledge answer generation failed");
                return KnowledgeAnswer::unavailable();
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.settings.llm_timeout.as_secs(),
                    "Knowledge answer generation timed out"
                );
                return KnowledgeAnswer::unavailable();
            }
        };

        debug!(
            passages = kept.len(),
            context_chars = context.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Knowledge answer ready"
        );

        // Whitespace-only output carries no answer.
        if text.trim().is_empty() {
            return KnowledgeAnswer::fallback();
        }
        KnowledgeAnswer {
            text,
            sources,
            grounded: true,
        }
    }
}

/// Leading passages whose joined length fits `max_chars`; never fewer than one.
fn within_budget(passages: &[RetrievedPassage], max_chars: usize) -> &[RetrievedPassage] {
    let mut used = 0;
    for (i, passage) in passages.iter().enumerate() {
        let cost = passage.text.len() + if i == 0 { 0 } else { PASSAGE_SEPARATOR.len() };
        if i > 0 && used + cost > max_chars {
            return &passages[..i];
        }
        used += cost;
    }
    passages
}

/// The grounded-answer prompt sent as a single user message.
///
/// The engine must answer only from `context`, reply with
/// [`FALLBACK_ANSWER`] verbatim when the context does not settle the
/// question, and check every claim against the context before answering.
pub fn render_prompt(context: &str, question: &str) -> String {
    format!(
        "**[ROL: BUSCADOR OFICIAL DE DOCUMENTOS DE CELSIA]**\n\
         Tu fuente de conocimiento es **ÚNICAMENTE** el **CONTEXTO** proporcionado. Responde a la **PREGUNTA** con total fidelidad a la fuente.\n\n\
         **[PROTOCOLO DE RESPUESTA]**\n\
         1.  Lee el **CONTEXTO**. Es tu único universo de datos.\n\
         2.  Localiza la información que responde a la **PREGUNTA**. Una respuesta implícita solo es válida si se deduce **directamente** de hechos presentes en el CONTEXTO, nunca de una suposición.\n\
         3.  Genera una respuesta cortés, profesional, directa y concisa, usando los términos exactos del CONTEXTO.\n\n\
         **[REGLAS INQUEBRANTABLES]**\n\
         1.  **CONDICIÓN DE ÉXITO:** **SI** la respuesta se puede verificar explícita o implícitamente con el CONTEXTO, responde.\n\
         2.  **CONDICIÓN DE FALLO:** **SI** la respuesta no existe en el CONTEXTO, o la información es contradictoria, insuficiente, ambigua o no se puede verificar con certeza, responde **ÚNICAMENTE** con esta frase, sin preámbulos ni explicaciones:\n\
         \"{FALLBACK_ANSWER}\"\n\
         3.  **PROHIBICIONES:**\n\
         - **NUNCA** utilices conocimiento general, fechas, tarifas, procesos ni ningún dato que no figure en el CONTEXTO.\n\
         - **NUNCA** intentes rellenar huecos o especular.\n\
         - **NUNCA** reformules la frase de fallback (Regla 2).\n\n\
         **[VERIFICACIÓN FINAL (Self-Check)]**\n\
         Antes de entregar la respuesta, verifica: ¿cada afirmación se deriva **directamente** del CONTEXTO? Si no es así, aplica la Condición de Fallo (Regla 2).\n\n\
         Contexto:\n{context}\n\n\
         Pregunta: {question}\n\n\
         Respuesta:"
    )
}

#[async_trait]
impl Tool for KnowledgeTool {
    fn name(&self) -> &str {
        "search_knowledge_base"
    }

    fn description(&self) -> &str {
        "Busca en la base de conocimiento de Celsia (noticias, trámites, tarifas, servicios, publicaciones) y responde la pregunta con esa información. Usar solo si ninguna herramienta directa aplica."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "minLength": 1,
                    "description": "La pregunta del usuario, completa y en español"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"].as_str().unwrap_or_default().trim();
        if query.is_empty() {
            return Err(ToolError::InvalidArguments("La consulta no puede estar vacía.".into()));
        }

        let answer = self.answer(query).await;
        let data = serde_json::json!({
            "sources": answer.sources,
            "grounded": answer.grounded,
        });
        Ok(ToolResult::success(answer.text).with_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use celsia_core::error::ProviderError;
    use celsia_core::provider::{EmbeddingRequest, EmbeddingResponse, ProviderResponse};
    use celsia_retrieval::{Document, MemoryCollection};
    use std::sync::Mutex;

    /// Embeds by keyword; answers every completion with a fixed text.
    struct ScriptedEngine {
        reply: Result<String, ProviderError>,
        delay: Duration,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedEngine {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                delay: Duration::ZERO,
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(ProviderError::Network("connection refused".into())),
                ..Self::replying("")
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for ScriptedEngine {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.prompts
                .lock()
                .unwrap()
                .push(request.messages[0].content.clone());
            tokio::time::sleep(self.delay).await;
            let text = self.reply.clone()?;
            Ok(ProviderResponse {
                message: Message::assistant(text),
                usage: None,
                model: request.model,
            })
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            let embeddings = request
                .inputs
                .iter()
                .map(|t| {
                    if t.contains("factura") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect();
            Ok(EmbeddingResponse {
                embeddings,
                model: request.model,
            })
        }
    }

    async fn tool_with(engine: Arc<ScriptedEngine>, docs: Vec<Document>, settings: KnowledgeSettings) -> KnowledgeTool {
        let index = VectorIndex::new(Arc::new(MemoryCollection::new()), engine.clone(), "embed");
        index.upsert(docs).await.unwrap();
        KnowledgeTool::new(Arc::new(index), engine, settings)
    }

    fn corpus() -> Vec<Document> {
        vec![
            Document::new("a#0", "La factura se puede pagar en línea en clientes.celsia.com")
                .with_metadata("source", "https://www.celsia.com/pagos"),
            Document::new("b#0", "Celsia instaló paneles solares en Tuluá")
                .with_metadata("source", "https://www.celsia.com/noticias"),
        ]
    }

    #[tokio::test]
    async fn empty_corpus_returns_exact_fallback_without_engine_call() {
        let engine = Arc::new(ScriptedEngine::replying("should not be used"));
        let tool = tool_with(engine.clone(), Vec::new(), KnowledgeSettings::default()).await;

        let answer = tool.answer("¿Cómo pago mi factura?").await;
        assert_eq!(answer.text, FALLBACK_ANSWER);
        assert!(engine.prompts().is_empty());
    }

    #[tokio::test]
    async fn prompt_carries_context_and_question() {
        let engine = Arc::new(ScriptedEngine::replying("  Puedes pagar en clientes.celsia.com  "));
        let settings = KnowledgeSettings {
            query: QueryOptions::new(2),
            ..Default::default()
        };
        let tool = tool_with(engine.clone(), corpus(), settings).await;

        let result = tool
            .execute(serde_json::json!({"query": "¿Cómo pago mi factura?"}))
            .await
            .unwrap();
        assert_eq!(result.output, "  Puedes pagar en clientes.celsia.com  ");

        let prompts = engine.prompts();
        assert_eq!(prompts.len(), 1);
        let prompt = &prompts[0];
        assert!(prompt.contains("Contexto:\nLa factura se puede pagar"));
        assert!(prompt.contains("Pregunta: ¿Cómo pago mi factura?"));
        assert!(prompt.contains(FALLBACK_ANSWER));
        assert!(prompt.ends_with("Respuesta:"));

        let rules = prompt.to_lowercase();
        assert!(rules.contains("contradictoria"));
        assert!(rules.contains("ambigua"));
        assert!(rules.contains("insuficiente"));
        assert!(rules.contains("nunca** reformules la frase de fallback"));
        assert!(rules.contains("verificación final (self-check)"));
        assert!(rules.contains("nunca** utilices conocimiento general"));

        let sources = &result.data.unwrap()["sources"];
        assert_eq!(sources[0], "https://www.celsia.com/pagos");
    }

    #[tokio::test]
    async fn whitespace_only_output_becomes_fallback() {
        let engine = Arc::new(ScriptedEngine::replying(" \n "));
        let tool = tool_with(engine, corpus(), KnowledgeSettings::default()).await;

        let answer = tool.answer("¿Cómo pago mi factura?").await;
        assert_eq!(answer.text, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn engine_failure_becomes_diagnostic() {
        let engine = Arc::new(ScriptedEngine::failing());
        let tool = tool_with(engine, corpus(), KnowledgeSettings::default()).await;

        let answer = tool.answer("factura").await;
        assert!(!answer.grounded);
        assert!(answer.text.contains(HELP_LINE));
    }

    #[tokio::test(start_paused = true)]
    async fn engine_timeout_becomes_diagnostic() {
        let engine = Arc::new(ScriptedEngine {
            delay: Duration::from_secs(600),
            ..ScriptedEngine::replying("tarde")
        });
        let settings = KnowledgeSettings {
            llm_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let tool = tool_with(engine, corpus(), settings).await;

        let answer = tool.answer("factura").await;
        assert!(!answer.grounded);
    }

    #[test]
    fn budget_keeps_whole_passages_in_order() {
        let passage = |text: &str| RetrievedPassage {
            text: text.to_string(),
            source: "s".into(),
            score: 0.1,
            metadata: Default::default(),
        };
        let passages = vec![passage("aaaaaaaaaa"), passage("bbbbbbbbbb"), passage("cccccccccc")];

        assert_eq!(within_budget(&passages, 22).len(), 2);
        assert_eq!(within_budget(&passages, 100).len(), 3);
        // The first passage is always kept.
        assert_eq!(within_budget(&passages, 3).len(), 1);
    }
}
