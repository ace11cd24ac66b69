use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

pub async fn tools_list() -> impl IntoResponse {
    let tools = vec![
        ToolDescriptor {
            name: "search_repo",
            description: "Search the indexed project for a query string, returning scored line hits",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "limit": {"type": "integer", "default": 10},
                },
                "required": ["query"],
            }),
        },
        ToolDescriptor {
            name: "get_file",
            description: "Return the full contents of an indexed file by project-relative path",
            input_schema: json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"],
            }),
        },
        ToolDescriptor {
            name: "list_files",
            description: "List indexed files, optionally filtered by language",
            input_schema: json!({
                "type": "object",
                "properties": {"language": {"type": "string"}},
            }),
        },
    ];
    Json(json!({ "tools": tools }))
}

#[derive(Debug, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Deserialize)]
struct SearchRepoArgs {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct GetFileArgs {
    path: String,
}

#[derive(Debug, Deserialize)]
struct ListFilesArgs {
    #[serde(default)]
    language: Option<String>,
}

pub async fn tools_call(
    State(state): State<AppState>,
    Json(body): Json<ToolCallRequest>,
) -> AppResult<Json<Value>> {
    state.metrics.record_tools();

    let text = match body.name.as_str() {
        "search_repo" => {
            let args: SearchRepoArgs = serde_json::from_value(body.arguments)
                .map_err(|e| AppError::BadRequest(format!("invalid arguments: {}", e)))?;
            let limit = args.limit.unwrap_or(10).clamp(1, 100);
            let hits = state.indexer.search(&args.query, limit);
            if hits.is_empty() {
                "No matches found.".to_string()
            } else {
                hits.iter()
                    .map(|h| format!("{}:{}: {} (score={:.2})", h.file, h.line, h.content, h.score))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        "get_file" => {
            let args: GetFileArgs = serde_json::from_value(body.arguments)
                .map_err(|e| AppError::BadRequest(format!("invalid arguments: {}", e)))?;
            match state.indexer.get_file(&args.path) {
                Ok(record) => record.content,
                Err(AppError::PathUnsafe(p)) => return Err(AppError::PathUnsafe(p)),
                Err(_) => "File not found".to_string(),
            }
        }
        "list_files" => {
            let args: ListFilesArgs = serde_json::from_value(body.arguments)
                .map_err(|e| AppError::BadRequest(format!("invalid arguments: {}", e)))?;
            let files = state.indexer.list_files(args.language.as_deref());
            if files.is_empty() {
                "No indexed files.".to_string()
            } else {
                files
                    .iter()
                    .map(|f| format!("{} [{}] {} lines", f.path, f.language, f.lines))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        other => return Err(AppError::BadRequest(format!("unknown tool: {}", other))),
    };

    Ok(Json(json!({ "content": [{ "type": "text", "text": text }] })))
}
