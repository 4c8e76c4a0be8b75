use std::sync::Arc;

use orchestrator_agent_tool::init_observability;
use orchestrator_agent_tool::prelude::*;
use orchestrator_agent_tool::progress::ChannelSink;
use orchestrator_agent_tool::vendors::dial::DialTransport;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ToolError> {
    init_observability();

    let tool = AgentTool::new(AgentSpec::web_search(), Arc::new(DialTransport::from_env()?))
        .with_options(InvokeOptions::default().timeout(std::time::Duration::from_secs(120)));

    let transcript = vec![ConversationTurn::user("What is new in Rust?")];
    let call = ToolCall::new(
        "call-1",
        "web_search_agent",
        r#"{"prompt":"Summarize the latest stable Rust release"}"#,
    );

    let (sink, mut progress) = ChannelSink::channel(64);
    let printer = tokio::spawn(async move {
        while let Some(event) = progress.recv().await {
            match event {
                ProgressEvent::Content(text) => print!("{text}"),
                ProgressEvent::StageOpened { index, name } => {
                    eprintln!("\n[stage {index}] {}", name.unwrap_or_default());
                }
                ProgressEvent::StageClosed { index } => eprintln!("[stage {index}] done"),
                ProgressEvent::Attachment(attachment) => {
                    eprintln!("[attachment] {:?}", attachment.url().or(attachment.title()));
                }
                _ => {}
            }
        }
    });

    let reply = tool
        .invoke(&call, InvocationContext::new(&transcript, &sink))
        .await?;
    drop(sink);
    let _ = printer.await;

    println!();
    println!(
        "state: {}",
        reply
            .state()
            .map(ToString::to_string)
            .unwrap_or_else(|| "none".into())
    );
    Ok(())
}
