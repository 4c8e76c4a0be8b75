/// DIAL-style chat-completion deployments over HTTP + SSE.
pub mod dial;
