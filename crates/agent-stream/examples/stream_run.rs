use agent_stream::init_observability;
use agent_stream::prelude::*;

// Usage: cargo run --example stream_run -- [events|text|json] "message"
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), StreamError> {
    init_observability();

    let mut args = std::env::args().skip(1);
    let format = match args.next() {
        Some(raw) => raw.parse::<StreamFormat>().map_err(StreamError::Config)?,
        None => StreamFormat::Text,
    };
    let message = args
        .next()
        .unwrap_or_else(|| "Say hello in one short sentence.".to_string());

    let client = RunClient::from_env()?;
    let mut run = client.create_run(message).await?;

    while let Some(item) = run.next_item(format).await {
        match item? {
            StreamItem::Text(text) => print!("{text}"),
            StreamItem::Json(value) => println!("{value}"),
            StreamItem::Event(event) => match &event.kind {
                EventKind::ToolCallStart { tool_name, .. } => {
                    println!("\n[tool] {}", tool_name.as_deref().unwrap_or("?"))
                }
                EventKind::Error { message } => eprintln!("\n[error] {message}"),
                _ => {
                    if let Some(delta) = event.text_delta() {
                        print!("{delta}");
                    }
                }
            },
        }
    }
    println!();

    let acc = run.accumulator();
    for call in acc.tool_calls() {
        println!(
            "tool {} ({}): {:?}",
            call.name.as_deref().unwrap_or("?"),
            call.id,
            call.status
        );
    }
    if let Some(metrics) = acc.metrics() {
        println!(
            "tokens in={:?} out={:?} cost={:?}",
            metrics.input_tokens_used(),
            metrics.output_tokens_used(),
            metrics.token_cost_usd()
        );
    }
    if acc.has_errors() {
        eprintln!("run reported errors: {:?}", acc.errors());
    }
    Ok(())
}
