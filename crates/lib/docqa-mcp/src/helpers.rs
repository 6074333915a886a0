use std::borrow::Cow;

use rmcp::ErrorData;
use rmcp::model::ErrorCode;
use serde_json::Value;

pub fn mcp_err(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> ErrorData {
    mcp_err_with_data(code, message, None)
}

pub fn mcp_err_with_data(
    code: ErrorCode,
    message: impl Into<Cow<'static, str>>,
    data: Option<Value>,
) -> ErrorData {
    ErrorData {
        code,
        message: message.into(),
        data,
    }
}
