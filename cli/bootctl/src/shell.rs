//! External command execution

use anyhow::{Context, bail};
use tokio::process::Command;
use tracing::info;

/// Run a command, failing on a non-zero exit status
pub async fn run(program: &str, args: &[&str]) -> anyhow::Result<()> {
    info!(command = %display(program, args), "Running");
    let status = Command::new(program)
        .args(args)
        .status()
        .await
        .with_context(|| format!("failed to start {program}"))?;
    if !status.success() {
        bail!("{} exited with {status}", display(program, args));
    }
    Ok(())
}

/// Run a command and capture its stdout
pub async fn output(program: &str, args: &[&str]) -> anyhow::Result<String> {
    info!(command = %display(program, args), "Running");
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .with_context(|| format!("failed to start {program}"))?;
    if !output.status.success() {
        bail!(
            "{} exited with {}: {}",
            display(program, args),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    String::from_utf8(output.stdout).with_context(|| format!("{program} printed non-UTF-8 output"))
}

fn display(program: &str, args: &[&str]) -> String {
    std::iter::once(program).chain(args.iter().copied()).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_output_captures_stdout() {
        assert_eq!(output("echo", &["hello"]).await.unwrap(), "hello\n");
    }

    #[tokio::test]
    async fn test_failure_names_the_command() {
        let err = run("false", &[]).await.unwrap_err();
        assert!(err.to_string().starts_with("false exited with"));
    }
}
