//! Tutor Hive 命令行
//!
//! 用法：
//! ```text
//! tutor-hive [--config <path>] [--model <id>] [--temperature <t>] [--rounds <n>] [--mock] [--transcript] <问题...>
//! ```
//! `--mock` 使用离线 Mock 客户端（不访问 API，适合演示流程）。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tutor_hive::config::load_config;
use tutor_hive::llm::MockLlmClient;
use tutor_hive::observability;
use tutor_hive::service::{ChatRequest, ChatService, SharedClientFactory};

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    model: Option<String>,
    temperature: Option<f32>,
    rounds: Option<usize>,
    mock: bool,
    transcript: bool,
    message: Vec<String>,
}

fn parse_args(mut it: impl Iterator<Item = String>) -> anyhow::Result<Args> {
    let mut args = Args::default();
    while let Some(a) = it.next() {
        match a.as_str() {
            "--config" => args.config = Some(it.next().context("--config needs a path")?.into()),
            "--model" => args.model = Some(it.next().context("--model needs a value")?),
            "--temperature" => {
                let v = it.next().context("--temperature needs a value")?;
                args.temperature = Some(v.parse().with_context(|| format!("bad temperature: {v}"))?);
            }
            "--rounds" => {
                let v = it.next().context("--rounds needs a value")?;
                args.rounds = Some(v.parse().with_context(|| format!("bad rounds: {v}"))?);
            }
            "--mock" => args.mock = true,
            "--transcript" => args.transcript = true,
            _ => args.message.push(a),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let args = parse_args(std::env::args().skip(1))?;
    let message = args.message.join(" ");
    if message.trim().is_empty() {
        bail!("usage: tutor-hive [--mock] [--model <id>] [--rounds <n>] <question>");
    }

    let mut cfg = load_config(args.config.clone()).context("Failed to load config")?;
    let service = if args.mock {
        // 离线模式不需要真实 Key
        cfg.llm.api_key.get_or_insert_with(|| "mock".to_string());
        ChatService::with_factory(cfg, Arc::new(SharedClientFactory(Arc::new(MockLlmClient::new()))))
    } else {
        ChatService::new(cfg)
    };
    tracing::debug!("{}", service.models().debug_summary());

    let request = ChatRequest {
        message,
        model: args.model,
        max_rounds: args.rounds,
        temperature: args.temperature,
    };
    let outcome = service
        .run_chat_outcome(&request)
        .await
        .context("Chat failed")?;

    if args.transcript {
        for turn in outcome.transcript.turns() {
            println!("[{}] {}\n", turn.speaker, turn.content);
        }
        println!("--- {:?} after {} rounds ---", outcome.stop_reason, outcome.rounds);
    }
    println!("{}", outcome.final_result);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = parse_args(
            ["--mock", "--rounds", "3", "Solve", "x+1=2"]
                .into_iter()
                .map(String::from),
        )
        .unwrap();
        assert!(args.mock);
        assert_eq!(args.rounds, Some(3));
        assert_eq!(args.message.join(" "), "Solve x+1=2");
        assert!(parse_args(["--rounds"].into_iter().map(String::from)).is_err());
    }
}
