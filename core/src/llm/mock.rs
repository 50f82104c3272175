//! Scripted LLM client for strategy and engine tests. Kept as a regular
//! (non-`#[cfg(test)]`) public type, matching the teacher's own `StubLlm`
//! test double living alongside the real adapters.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{LlmClient, LlmError, LlmRequest, LlmResponse};

/// Replays a fixed queue of responses, one per `invoke` call. Returns a
/// provider error once the queue runs dry — tests should script exactly as
/// many turns as they drive.
pub struct MockLlm {
    scripted: Mutex<Vec<LlmResponse>>,
    calls: Mutex<Vec<LlmRequest>>,
}

impl MockLlm {
    pub fn new(mut responses: Vec<LlmResponse>) -> Self {
        responses.reverse();
        Self { scripted: Mutex::new(responses), calls: Mutex::new(Vec::new()) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<LlmRequest> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.calls.lock().unwrap().push(request);
        self.scripted
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| LlmError::Provider("MockLlm: response queue exhausted".into()))
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_scripted_responses_in_order() {
        let mock = MockLlm::new(vec![LlmResponse::text("first"), LlmResponse::text("second")]);
        let r1 = mock.invoke(LlmRequest::new(vec![])).await.unwrap();
        let r2 = mock.invoke(LlmRequest::new(vec![])).await.unwrap();
        assert_eq!(r1.as_text(), Some("first"));
        assert_eq!(r2.as_text(), Some("second"));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_queue_errors_instead_of_panicking() {
        let mock = MockLlm::new(vec![]);
        let result = mock.invoke(LlmRequest::new(vec![])).await;
        assert!(result.is_err());
    }
}
