/// MCP Tool handlers for lingorag.
///
/// 1. ask         – answer a question from the indexed passages
/// 2. search      – top-k passage lookup
/// 3. build_index – (re)build the index and reload the engine
/// 4. health      – index and model status
use crate::engine::Engine;
use crate::language::Language;
use crate::mcp::server::McpContext;
use crate::retriever::RetrievalOutcome;
use rmcp::handler::server::ServerHandler;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, handler::server::tool::ToolRouter, model::*, tool, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

// ── Parameter structs ────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct AskParams {
    /// Question in English, Hindi, Telugu or Kannada
    question: String,
    /// Answer language code: en | hi | te | kn (detected if omitted)
    language: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
struct SearchParams {
    /// Search query (natural language)
    query: String,
    /// Max results (default: top_k from the config)
    top_k: Option<usize>,
}

#[derive(Deserialize, JsonSchema)]
struct BuildIndexParams {
    /// Directory with .txt and .pdf files (default: data_folder from the config)
    directory: Option<String>,
    /// Delete and rebuild an existing index (default: false)
    force: Option<bool>,
}

// ── Response helpers ─────────────────────────────────────────────────

fn json_result(value: serde_json::Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&value).unwrap_or_default(),
    )]))
}

fn error_result(msg: &str) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg.to_string())]))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, McpError> {
    serde_json::to_value(value)
        .map_err(|e| McpError::internal_error(format!("serialization failed: {e}"), None))
}

/// Runs blocking engine work (inference, file I/O) off the async runtime.
async fn blocking<T, F>(engine: Arc<Engine>, f: F) -> Result<T, McpError>
where
    T: Send + 'static,
    F: FnOnce(&Engine) -> T + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&engine))
        .await
        .map_err(|e| McpError::internal_error(format!("worker task failed: {e}"), None))
}

// ── Tool implementations ─────────────────────────────────────────────

#[derive(Clone)]
pub struct AppTools {
    pub ctx: McpContext,
    pub tool_router: ToolRouter<Self>,
}

impl ServerHandler for AppTools {}

#[tool_router]
impl AppTools {
    pub fn new(ctx: McpContext) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    // ── Tool 1: ask ─────────────────────────────────────────────────

    #[tool(
        description = "Answer a question from Sai Baba's teachings in English, Hindi, Telugu or Kannada. Medical, legal and predictive questions are declined. The answer quotes the retrieved passages and lists their sources."
    )]
    async fn ask(&self, params: Parameters<AskParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let language = match p.language.as_deref().map(str::parse::<Language>) {
            None => None,
            Some(Ok(language)) => Some(language),
            Some(Err(e)) => return error_result(&e.to_string()),
        };

        let engine = self.ctx.current_engine().await;
        let answer = blocking(engine, move |engine| engine.ask(&p.question, language)).await?;
        json_result(to_json(&answer)?)
    }

    // ── Tool 2: search ──────────────────────────────────────────────

    #[tool(description = "Vector search over the indexed passages, returning text, source file, chunk id and similarity score")]
    async fn search(&self, params: Parameters<SearchParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        if p.query.trim().is_empty() {
            return error_result("query is required");
        }
        let top_k = p.top_k.unwrap_or(self.ctx.config.top_k);
        if top_k == 0 {
            return error_result("top_k must be positive");
        }

        let engine = self.ctx.current_engine().await;
        match blocking(engine, move |engine| engine.search(&p.query, top_k)).await? {
            RetrievalOutcome::Retrieved(passages) => {
                json_result(serde_json::json!({ "results": to_json(&passages)? }))
            }
            RetrievalOutcome::NoIndex => {
                error_result("no index available; run build_index first")
            }
            RetrievalOutcome::Failed(reason) => error_result(&format!("search failed: {reason}")),
        }
    }

    // ── Tool 3: build_index ─────────────────────────────────────────

    #[tool(
        description = "Build the vector index from .txt and .pdf files. An existing index is kept unless force is true."
    )]
    async fn build_index(
        &self,
        params: Parameters<BuildIndexParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let directory = p.directory.map(PathBuf::from);
        let force = p.force.unwrap_or(false);

        let engine = self.ctx.current_engine().await;
        let result = blocking(engine, move |engine| {
            let report = engine.build_index(directory.as_deref(), force)?;
            let reloaded = if report.skipped {
                None
            } else {
                Some(engine.reload()?)
            };
            anyhow::Ok((report, reloaded))
        })
        .await?;

        let (report, reloaded) = match result {
            Ok(done) => done,
            Err(e) => return error_result(&format!("index build failed: {e:#}")),
        };
        if let Some(engine) = reloaded {
            self.ctx.replace_engine(engine).await;
            info!("Engine reloaded with {} chunks", report.chunks);
        }

        json_result(serde_json::json!({ "success": true, "report": to_json(&report)? }))
    }

    // ── Tool 4: health ──────────────────────────────────────────────

    #[tool(description = "Report whether an index is loaded, its size, and the embedding model in use")]
    async fn health(&self) -> Result<CallToolResult, McpError> {
        let engine = self.ctx.current_engine().await;
        json_result(to_json(&engine.health())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::embedder::mock::MockEmbedder;
    use tempfile::tempdir;
    use tokio::sync::RwLock;

    fn context(dir: &std::path::Path) -> McpContext {
        let config = Config {
            data_folder: dir.join("data").to_string_lossy().into_owned(),
            vector_db_path: dir.join("db").to_string_lossy().into_owned(),
            chunk_size: 80,
            chunk_overlap: 10,
            ..Config::default()
        };
        let engine = Engine::new(config.clone(), Arc::new(MockEmbedder::new(32))).unwrap();
        McpContext {
            engine: Arc::new(RwLock::new(Arc::new(engine))),
            config: Arc::new(config),
        }
    }

    #[tokio::test]
    async fn test_build_index_swaps_engine() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("faith.txt"), "Faith and patience.").unwrap();

        let tools = AppTools::new(context(dir.path()));
        assert!(tools.ctx.current_engine().await.store().is_none());

        let result = tools
            .build_index(Parameters(BuildIndexParams {
                directory: None,
                force: None,
            }))
            .await
            .unwrap();
        assert_ne!(result.is_error, Some(true));

        let engine = tools.ctx.current_engine().await;
        assert_eq!(engine.health().vectors, 1);
    }

    #[tokio::test]
    async fn test_build_index_reports_empty_corpus() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();

        let tools = AppTools::new(context(dir.path()));
        let result = tools
            .build_index(Parameters(BuildIndexParams {
                directory: None,
                force: Some(true),
            }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn test_ask_rejects_unknown_language() {
        let dir = tempdir().unwrap();
        let tools = AppTools::new(context(dir.path()));
        let result = tools
            .ask(Parameters(AskParams {
                question: "What is faith?".to_string(),
                language: Some("xx".to_string()),
            }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn test_search_without_index() {
        let dir = tempdir().unwrap();
        let tools = AppTools::new(context(dir.path()));
        let result = tools
            .search(Parameters(SearchParams {
                query: "faith".to_string(),
                top_k: Some(3),
            }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }
}
