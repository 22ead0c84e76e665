// Don't measure coverage, this is support code for CLI
#![cfg(not(tarpaulin_include))]

use color_eyre::eyre::{Context, Result};
use std::{
    fs::File,
    io::{BufWriter, Read, Stdin, Stdout, Write},
    path::{Path, PathBuf},
};

/// Where ciphertext, plaintext or a corpus is read from
pub enum Input {
    File(File, PathBuf),
    Stdin(Stdin),
}

impl Input {
    /// Reads everything into a string
    pub fn read_text(mut self) -> Result<String> {
        let mut text = String::new();
        let name = self.to_string();
        let reader: &mut dyn Read = match &mut self {
            Self::File(f, _) => f,
            Self::Stdin(s) => s,
        };
        reader
            .read_to_string(&mut text)
            .wrap_err_with(|| format!("Cannot read text from {name}"))?;
        Ok(text)
    }
}

/// `None` means stdin
impl TryFrom<Option<PathBuf>> for Input {
    type Error = color_eyre::Report;

    fn try_from(path: Option<PathBuf>) -> Result<Self, Self::Error> {
        Ok(match path {
            Some(path) => Self::File(
                File::open(&path).wrap_err_with(|| open_error("input", &path))?,
                path,
            ),
            None => Self::Stdin(std::io::stdin()),
        })
    }
}

impl std::fmt::Display for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(_, path) => path.display().fmt(f),
            Self::Stdin(_) => write!(f, "stdin"),
        }
    }
}

/// Where results are written to, buffered
pub enum Output {
    File(BufWriter<File>, PathBuf),
    Stdout(BufWriter<Stdout>),
}

impl Output {
    /// Writes `line` and a newline, then flushes
    pub fn write_line(&mut self, line: impl std::fmt::Display) -> Result<()> {
        let name = self.to_string();
        let writer: &mut dyn Write = self.as_mut();
        writeln!(writer, "{line}")
            .and_then(|()| writer.flush())
            .wrap_err_with(|| format!("Cannot write to {name}"))
    }
}

/// `None` means stdout
impl TryFrom<Option<PathBuf>> for Output {
    type Error = color_eyre::Report;

    fn try_from(path: Option<PathBuf>) -> Result<Self, Self::Error> {
        Ok(match path {
            Some(path) => Self::File(
                BufWriter::new(File::create(&path).wrap_err_with(|| open_error("output", &path))?),
                path,
            ),
            None => Self::Stdout(BufWriter::new(std::io::stdout())),
        })
    }
}

/// Dynamic dispatch writes, used for binary table output
impl<'a> AsMut<dyn Write + 'a> for Output {
    fn as_mut(&mut self) -> &mut (dyn Write + 'a) {
        match self {
            Self::File(f, _) => f,
            Self::Stdout(s) => s,
        }
    }
}

impl std::fmt::Display for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(_, path) => path.display().fmt(f),
            Self::Stdout(_) => write!(f, "stdout"),
        }
    }
}

fn open_error(what: &str, path: &Path) -> String {
    format!("Cannot open {} for {what}", path.display())
}
