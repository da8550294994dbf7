//! Operator confirmation gate.
//!
//! Every optional step asks a human before it touches the device. The answer
//! is a single line; a case-insensitive `y` runs the step and anything else,
//! including end of input, skips it.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};

/// Decides whether a step should run.
#[async_trait]
pub trait Operator: Send {
    /// Asks whether to run `step`. Blocks until an answer is available.
    async fn confirm(&mut self, step: &str) -> std::io::Result<bool>;
}

/// Returns true for the accepted affirmative answer.
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

/// Prompts on a writer and reads answers line by line from a reader.
pub struct LineOperator<R, W> {
    input: R,
    output: W,
}

impl LineOperator<BufReader<Stdin>, Stdout> {
    /// An operator on the process's stdin and stdout.
    pub fn console() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> LineOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

#[async_trait]
impl<R, W> Operator for LineOperator<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn confirm(&mut self, step: &str) -> std::io::Result<bool> {
        self.output
            .write_all(format!("Run {step}? (Y/N): ").as_bytes())
            .await?;
        self.output.flush().await?;

        let mut line = String::new();
        let n = self.input.read_line(&mut line).await?;
        if n == 0 {
            return Ok(false);
        }
        Ok(is_affirmative(&line))
    }
}

/// Approves every step without asking. For unattended runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

#[async_trait]
impl Operator for AutoApprove {
    async fn confirm(&mut self, _step: &str) -> std::io::Result<bool> {
        Ok(true)
    }
}
