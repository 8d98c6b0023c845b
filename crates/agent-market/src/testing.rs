//! Mock reasoning backend shared by the unit tests

use agent_llm::{CompletionRequest, CompletionResponse, LLMProvider};
use async_trait::async_trait;
use mockall::mock;
use std::collections::VecDeque;
use std::sync::Mutex;

mock! {
    pub Backend {}

    #[async_trait]
    impl LLMProvider for Backend {
        async fn complete(&self, request: CompletionRequest) -> agent_llm::Result<CompletionResponse>;
        fn name(&self) -> &str;
    }
}

/// Backend replying with `replies` in order, repeating the last one
pub fn scripted_backend(replies: &[&str]) -> MockBackend {
    let queue: Mutex<VecDeque<String>> =
        Mutex::new(replies.iter().map(ToString::to_string).collect());
    let mut backend = MockBackend::new();
    backend.expect_complete().returning(move |_| {
        let mut queue = queue.lock().unwrap();
        let reply = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };
        Ok(CompletionResponse::text(reply))
    });
    backend.expect_name().return_const("mock".to_string());
    backend
}
