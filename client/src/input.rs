//! Line-oriented terminal input with validation.

use shared::protocol::FIELD_SEPARATOR;
use shared::ReviewScores;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};

/// Result of reading one menu choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Number(i32),
    /// The line was not an integer.
    Invalid,
    /// Input reached end of file.
    Closed,
}

pub struct Console<R, W> {
    reader: R,
    writer: W,
}

impl Console<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub async fn print(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await
    }

    pub async fn println(&mut self, text: &str) -> io::Result<()> {
        self.print(&format!("{text}\n")).await
    }

    /// Prints `label` and reads one trimmed line. `None` at end of input.
    pub async fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        self.print(label).await?;
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    pub async fn choice(&mut self, label: &str) -> io::Result<Choice> {
        Ok(match self.prompt(label).await? {
            None => Choice::Closed,
            Some(line) => line.parse().map(Choice::Number).unwrap_or(Choice::Invalid),
        })
    }

    /// Reads a request field, asking again while it contains the field separator.
    pub async fn field(&mut self, label: &str) -> io::Result<Option<String>> {
        loop {
            match self.prompt(label).await? {
                Some(value) if value.contains(FIELD_SEPARATOR) => {
                    self.println(&format!("Error: '{FIELD_SEPARATOR}' is not allowed.")).await?;
                }
                other => return Ok(other),
            }
        }
    }

    /// Reads a score, asking again until it is an integer between 1 and 5.
    pub async fn score(&mut self, label: &str) -> io::Result<Option<i32>> {
        loop {
            match self.choice(label).await? {
                Choice::Closed => return Ok(None),
                Choice::Number(n) if (ReviewScores::MIN..=ReviewScores::MAX).contains(&n) => {
                    return Ok(Some(n))
                }
                Choice::Number(_) => {}
                Choice::Invalid => self.println("\nError: enter a valid number.\n").await?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console(input: &'static str) -> Console<&'static [u8], Vec<u8>> {
        Console::new(input.as_bytes(), Vec::new())
    }

    #[tokio::test]
    async fn test_prompt_trims_and_detects_eof() {
        let mut console = console("  alice  \n");
        assert_eq!(console.prompt("Username: ").await.unwrap().as_deref(), Some("alice"));
        assert_eq!(console.prompt("Password: ").await.unwrap(), None);
        assert_eq!(console.writer(), b"Username: Password: ");
    }

    #[tokio::test]
    async fn test_choice_parsing() {
        let mut console = console("3\nabc\n");
        assert_eq!(console.choice("> ").await.unwrap(), Choice::Number(3));
        assert_eq!(console.choice("> ").await.unwrap(), Choice::Invalid);
        assert_eq!(console.choice("> ").await.unwrap(), Choice::Closed);
    }

    #[tokio::test]
    async fn test_score_reprompts_until_in_range() {
        let mut console = console("0\nsix\n6\n4\n");
        assert_eq!(console.score("Cleaning (1-5): ").await.unwrap(), Some(4));
        let output = String::from_utf8(console.writer().clone()).unwrap();
        assert_eq!(output.matches("Cleaning (1-5): ").count(), 4);
        assert!(output.contains("enter a valid number"));
    }

    #[tokio::test]
    async fn test_field_rejects_separator() {
        let mut console = console("Hotel;Roma\nHotel Roma 1\n");
        assert_eq!(console.field("Hotel: ").await.unwrap().as_deref(), Some("Hotel Roma 1"));
    }
}
