use serde_json::Value;

/// A tool the agent asks the client to run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClientToolCall {
    tool_name: String,
    tool_call_id: String,
    #[serde(default)]
    parameters: Value,
}

impl ClientToolCall {
    pub fn new(tool_name: &str, tool_call_id: &str) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            tool_call_id: tool_call_id.to_string(),
            parameters: Value::Null,
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }

    pub fn parameters(&self) -> &Value {
        &self.parameters
    }
}

/// `client_tool_result` payload
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClientToolResult {
    tool_call_id: String,
    result: String,
    is_error: bool,
}

impl ClientToolResult {
    pub fn success(tool_call_id: &str, result: &str) -> Self {
        Self {
            tool_call_id: tool_call_id.to_string(),
            result: result.to_string(),
            is_error: false,
        }
    }

    pub fn failure(tool_call_id: &str, message: &str) -> Self {
        Self {
            tool_call_id: tool_call_id.to_string(),
            result: message.to_string(),
            is_error: true,
        }
    }

    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }
}
