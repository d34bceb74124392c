/// MCP Server setup using `rmcp` with stdio transport.
///
/// Provides `McpContext` (shared state) and `McpServer` (startup logic).
use crate::mcp::tools::AppTools;
use anyhow::{Context, Result};
use rmcp::{ServiceExt, handler::server::router::Router, transport::io::stdio};
use std::sync::Arc;
use tracing::info;

use crate::{config::Config, engine::Engine};
use tokio::sync::RwLock;

/// Shared application context available to all tool handlers.
///
/// The engine sits behind a lock so `build_index` can swap in a freshly
/// loaded one; readers clone the inner `Arc` and release the lock at once.
#[derive(Clone)]
pub struct McpContext {
    pub engine: Arc<RwLock<Arc<Engine>>>,
    pub config: Arc<Config>,
}

impl McpContext {
    /// The engine currently serving queries.
    pub async fn current_engine(&self) -> Arc<Engine> {
        self.engine.read().await.clone()
    }

    pub async fn replace_engine(&self, engine: Engine) {
        *self.engine.write().await = Arc::new(engine);
    }
}

/// MCP Server wrapping the context and serving via stdio.
#[derive(Clone)]
pub struct McpServer {
    pub ctx: McpContext,
}

impl McpServer {
    pub fn new(ctx: McpContext) -> Self {
        Self { ctx }
    }

    /// Start the MCP server on stdio transport (blocks until the client disconnects).
    pub async fn start(self) -> Result<()> {
        info!("Starting MCP server on stdio...");
        let (stdin, stdout) = stdio();

        let app_tools = AppTools::new(self.ctx.clone());
        let router = Router::new(app_tools.clone()).with_tools(app_tools.tool_router.clone());

        router
            .serve((stdin, stdout))
            .await
            .context("MCP Server encountered an error during stdio transport")?;

        Ok(())
    }
}
