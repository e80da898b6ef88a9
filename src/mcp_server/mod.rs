//! MCP server for the MATLAB bridge.
//!
//! Exposes `runMatlabCode` and `getVariable` as MCP tools over stdio transport
//! using the rmcp SDK. Both tools answer with a JSON body carrying a `status`
//! field; the MCP error flag mirrors `status == "error"`.

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bridge::Bridge;

// ---------------------------------------------------------------------------
// Parameter structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RunMatlabCodeParams {
    /// The MATLAB code string to execute.
    pub code: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetVariableParams {
    /// Name of the workspace variable to read.
    pub variable_name: String,
}

// ---------------------------------------------------------------------------
// Server struct
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct MatlabMcpServer {
    bridge: Bridge,
    tool_router: ToolRouter<Self>,
}

// ---------------------------------------------------------------------------
// Tool definitions
// ---------------------------------------------------------------------------

#[tool_router]
impl MatlabMcpServer {
    pub fn new(bridge: Bridge) -> Self {
        Self {
            bridge,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "runMatlabCode",
        description = "Runs arbitrary MATLAB code in the shared MATLAB session. WARNING: executing arbitrary code can be a security risk. The code is first run from a temporary script file; if MATLAB rejects it there, it is evaluated directly and the console output is returned. Returns status, output on success, and error_type, stage and message on error."
    )]
    async fn run_matlab_code(
        &self,
        Parameters(params): Parameters<RunMatlabCodeParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self.bridge.run_code(params.code).await;
        Ok(tool_result(&response, response.is_error()))
    }

    #[tool(
        name = "getVariable",
        description = "Gets the value of a variable from the MATLAB workspace. Numeric and logical arrays come back as (nested) lists, text as strings; other types are returned in their string form. Returns status, variable and value on success, and error_type and message on error."
    )]
    async fn get_variable(
        &self,
        Parameters(params): Parameters<GetVariableParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self.bridge.get_variable(params.variable_name).await;
        Ok(tool_result(&response, response.is_error()))
    }
}

// ---------------------------------------------------------------------------
// ServerHandler: #[tool_handler] auto-generates list_tools + call_tool
// ---------------------------------------------------------------------------

#[tool_handler]
impl ServerHandler for MatlabMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "MATLAB bridge: run code in a persistent MATLAB session with runMatlabCode \
                 and read workspace variables as JSON with getVariable"
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn tool_result<T: Serialize>(response: &T, is_error: bool) -> CallToolResult {
    let text = serde_json::to_string_pretty(response).unwrap_or_else(|e| {
        format!(
            r#"{{"status":"error","error_type":"Unserializable","message":"response could not be encoded: {}"}}"#,
            e
        )
    });
    if is_error {
        CallToolResult::error(vec![Content::text(text)])
    } else {
        CallToolResult::success(vec![Content::text(text)])
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Serve the bridge over stdio until the client disconnects.
pub async fn serve_stdio(bridge: Bridge) -> anyhow::Result<()> {
    info!("Starting MATLAB MCP server");
    let service = MatlabMcpServer::new(bridge).serve(stdio()).await?;
    service.waiting().await?;
    info!("MATLAB MCP server has shut down");
    Ok(())
}
