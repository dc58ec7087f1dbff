use std::path::PathBuf;

use crate::config::HistoryConfig;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("CLI history file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("CLI history file is empty: {}", .0.display())]
    Empty(PathBuf),

    #[error("failed to read CLI history file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// On-disk layout of the history file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFormat {
    /// One command per line (bash `HISTFILE`, hand-written lists).
    Plain,
    /// zsh `EXTENDED_HISTORY`: `: <epoch>:<duration>;<command>`.
    Zsh,
}

impl HistoryFormat {
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "zsh" => Self::Zsh,
            _ => Self::Plain,
        }
    }
}

/// Where commands come from and how to read them.
#[derive(Debug, Clone)]
pub struct HistorySource {
    pub path: PathBuf,
    pub format: HistoryFormat,
    pub max_commands: Option<usize>,
}

impl HistorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: HistoryFormat::Plain,
            max_commands: None,
        }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self {
            path: config.path.clone(),
            format: HistoryFormat::from_str_loose(&config.format),
            max_commands: config.max_commands,
        }
    }

    /// Read the file and return its commands in file order.
    ///
    /// A missing file, or one with no non-blank lines, is `NotFound`/`Empty`.
    /// Bytes that are not UTF-8 (zsh metafied characters, latin-1 leftovers)
    /// become U+FFFD instead of failing the whole file.
    pub async fn load(&self) -> Result<Vec<String>, HistoryError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HistoryError::NotFound(self.path.clone()));
            }
            Err(e) => {
                return Err(HistoryError::Io {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };

        let contents = String::from_utf8_lossy(&bytes);
        let mut commands = parse_commands(&contents, self.format);
        if commands.is_empty() {
            return Err(HistoryError::Empty(self.path.clone()));
        }

        if let Some(max) = self.max_commands {
            if commands.len() > max {
                commands.drain(..commands.len() - max);
            }
        }
        Ok(commands)
    }
}

/// Split history text into trimmed, non-empty commands. Duplicates are kept.
pub fn parse_commands(contents: &str, format: HistoryFormat) -> Vec<String> {
    contents
        .lines()
        .map(|line| match format {
            HistoryFormat::Plain => line,
            HistoryFormat::Zsh => strip_zsh_prefix(line),
        })
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_zsh_prefix(line: &str) -> &str {
    let Some(rest) = line.strip_prefix(": ") else {
        return line;
    };
    match rest.split_once(';') {
        Some((meta, command))
            if !meta.is_empty() && meta.chars().all(|c| c.is_ascii_digit() || c == ':') =>
        {
            command
        }
        _ => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_trims_and_drops_blank_lines() {
        let commands = parse_commands("  ls -la \n\n\t\ngit status\r\n", HistoryFormat::Plain);
        assert_eq!(commands, vec!["ls -la", "git status"]);
    }

    #[test]
    fn test_parse_keeps_duplicates_in_order() {
        let commands = parse_commands("ls -la\ncd /tmp\nls -la\n", HistoryFormat::Plain);
        assert_eq!(commands, vec!["ls -la", "cd /tmp", "ls -la"]);
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        let commands = parse_commands("LS\nls\n", HistoryFormat::Plain);
        assert_eq!(commands, vec!["LS", "ls"]);
    }

    #[test]
    fn test_parse_zsh_extended_history() {
        let text = ": 1700000000:0;git log --oneline\n: 1700000005:3;cargo fmt\nplain line\n";
        let commands = parse_commands(text, HistoryFormat::Zsh);
        assert_eq!(commands, vec!["git log --oneline", "cargo fmt", "plain line"]);
    }

    #[test]
    fn test_zsh_prefix_requires_numeric_metadata() {
        assert_eq!(strip_zsh_prefix(": not;history"), ": not;history");
        assert_eq!(strip_zsh_prefix(": 12:0;echo a;b"), "echo a;b");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = HistorySource::new(dir.path().join("missing.txt"));
        let err = source.load().await.unwrap_err();
        assert!(matches!(err, HistoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_load_blank_file_is_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "   \n\n").unwrap();
        let source = HistorySource::new(file.path());
        let err = source.load().await.unwrap_err();
        assert!(matches!(err, HistoryError::Empty(_)));
    }

    #[tokio::test]
    async fn test_load_tolerates_invalid_utf8() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"ls -la\necho caf\xe9\ngit status\n").unwrap();
        let source = HistorySource::new(file.path());
        let commands = source.load().await.unwrap();
        assert_eq!(commands, vec!["ls -la", "echo caf\u{fffd}", "git status"]);
    }

    #[tokio::test]
    async fn test_load_keeps_most_recent_commands() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "one\ntwo\nthree\nfour").unwrap();
        let mut source = HistorySource::new(file.path());
        source.max_commands = Some(2);
        let commands = source.load().await.unwrap();
        assert_eq!(commands, vec!["three", "four"]);
    }
}
