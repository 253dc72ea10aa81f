//! Tool trait definition

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::error::InvokeError;

/// A unit of work that can fail
///
/// Every resilience layer in this crate both consumes and implements this
/// trait, so layers compose by plain wrapping.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable tool name, used in errors and logs
    fn name(&self) -> &str;

    /// Run the tool once
    async fn invoke(&self, input: Value) -> Result<Value, InvokeError>;
}

#[async_trait]
impl<T: Tool + ?Sized> Tool for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn invoke(&self, input: Value) -> Result<Value, InvokeError> {
        (**self).invoke(input).await
    }
}

#[async_trait]
impl<T: Tool + ?Sized> Tool for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn invoke(&self, input: Value) -> Result<Value, InvokeError> {
        (**self).invoke(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolError;

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        async fn invoke(&self, input: Value) -> Result<Value, InvokeError> {
            let text = input
                .as_str()
                .ok_or_else(|| ToolError::validation(self.name(), "expected a string"))?;
            Ok(Value::String(text.to_uppercase()))
        }
    }

    #[tokio::test]
    async fn test_boxed_tool_delegates() {
        let tool: Box<dyn Tool> = Box::new(Upper);
        assert_eq!(tool.name(), "upper");
        assert_eq!(tool.invoke(Value::from("abc")).await.unwrap(), Value::from("ABC"));
    }

    #[tokio::test]
    async fn test_arc_tool_delegates_errors() {
        let tool = Arc::new(Upper);
        let err = tool.invoke(Value::from(1)).await.unwrap_err();
        assert!(matches!(err, InvokeError::Tool(e) if e.kind == crate::tools::ErrorKind::Validation));
    }
}
