//! Subcommand implementations

use anyhow::Context;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};
use triage_classifiers::{TriageConfig, TriageEngine};
use triage_core::{ClassificationResult, CustomerSnapshot};

use crate::config::redacted;

/// One output line of the batch command
#[derive(Debug, Serialize)]
pub struct BatchLine {
    pub line: usize,
    pub issue: String,
    #[serde(flatten)]
    pub result: ClassificationResult,
}

/// Classify a single issue and print the result
pub async fn classify(
    engine: &TriageEngine,
    text: &str,
    name: Option<String>,
    email: Option<String>,
) -> anyhow::Result<()> {
    let customer = CustomerSnapshot { name, email };
    let customer = (!customer.is_empty()).then_some(customer);

    let result = engine.classify_priority(text, customer.as_ref()).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Classify every non-blank input line, printing JSON lines in input order
pub async fn batch(
    engine: &TriageEngine,
    input: Option<&Path>,
    concurrency: usize,
) -> anyhow::Result<()> {
    let raw = read_input(input).await?;
    let issues = issue_lines(&raw);
    info!(issues = issues.len(), concurrency, "Classifying batch");

    let mut results = stream::iter(issues)
        .map(|(line, issue)| async move {
            let result = engine.classify_priority(issue, None).await;
            BatchLine {
                line,
                issue: issue.to_string(),
                result,
            }
        })
        .buffered(concurrency);

    let stdout = std::io::stdout();
    while let Some(line) = results.next().await {
        let mut out = stdout.lock();
        serde_json::to_writer(&mut out, &line)?;
        writeln!(out)?;
    }

    debug!(cached = engine.cache().len(), "Batch complete");
    Ok(())
}

/// Print the effective configuration as YAML
pub fn show_config(config: &TriageConfig) -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&redacted(config))?);
    Ok(())
}

async fn read_input(input: Option<&Path>) -> anyhow::Result<String> {
    match input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

/// Non-blank lines with their 1-based line numbers
pub fn issue_lines(raw: &str) -> Vec<(usize, &str)> {
    raw.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::{Priority, ResultSource};

    #[test]
    fn test_issue_lines_skip_blanks() {
        let raw = "charged twice\n\n   \n  where is my order  \r\nthanks";
        assert_eq!(
            issue_lines(raw),
            vec![(1, "charged twice"), (4, "where is my order"), (5, "thanks")]
        );
    }

    #[test]
    fn test_batch_line_shape() {
        let line = BatchLine {
            line: 3,
            issue: "wrong size".to_string(),
            result: ClassificationResult::new(Priority::Medium, "exchange", ResultSource::Rules),
        };
        let value = serde_json::to_value(&line).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "line": 3,
                "issue": "wrong size",
                "priority": "Medium",
                "reason": "exchange",
                "source": "rules"
            })
        );
    }

    #[tokio::test]
    async fn test_batch_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "package never arrived\n\ninvoice please\n").unwrap();

        let engine = TriageEngine::builder(TriageConfig::default()).build().unwrap();
        batch(&engine, Some(file.path()), 2).await.unwrap();
        assert_eq!(engine.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_batch_missing_file() {
        let engine = TriageEngine::builder(TriageConfig::default()).build().unwrap();
        assert!(batch(&engine, Some(Path::new("/nonexistent/issues.txt")), 1)
            .await
            .is_err());
    }
}
