//! Interactive session: the terminal counterpart of keeping the page open.
//!
//! The session owns both result areas and the chart renderer, so a chart
//! drawn by one prediction is replaced by the next one.

use std::io::{BufRead, Write};
use std::path::Path;

use crate::api::PredictionService;
use crate::chart::{ChartRenderer, ChartSurface};
use crate::form::{Submission, ValidationError, submit_text, submit_upload};
use crate::view::{ResultArea, alert};

const HELP: &str = "commands: predict <file> | text <content> | help | quit";

/// A parsed session line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Predict(Option<String>),
    Text(String),
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word {
            "predict" | "upload" => {
                Command::Predict((!rest.is_empty()).then(|| rest.to_string()))
            }
            "text" => Command::Text(rest.to_string()),
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        };
        Some(command)
    }
}

pub struct Session<'a, S: PredictionService + ?Sized, W: Write, C: ChartSurface> {
    service: &'a S,
    upload_area: ResultArea<W>,
    text_area: ResultArea<W>,
    chart: ChartRenderer<C>,
}

impl<'a, S, W, C> Session<'a, S, W, C>
where
    S: PredictionService + ?Sized,
    W: Write,
    C: ChartSurface,
{
    pub fn new(service: &'a S, upload_out: W, text_out: W, surface: C) -> Self {
        Self {
            service,
            upload_area: ResultArea::new(upload_out),
            text_area: ResultArea::new(text_out),
            chart: ChartRenderer::new(surface),
        }
    }

    pub fn predict(&mut self, file: Option<&Path>) -> Result<Submission, ValidationError> {
        submit_upload(self.service, file, &mut self.upload_area, &mut self.chart)
    }

    pub fn classify(&mut self, text: &str) -> Result<Submission, ValidationError> {
        submit_text(self.service, text, &mut self.text_area)
    }

    pub fn chart(&self) -> &ChartRenderer<C> {
        &self.chart
    }

    pub fn upload_area(&self) -> &ResultArea<W> {
        &self.upload_area
    }

    pub fn text_area(&self) -> &ResultArea<W> {
        &self.text_area
    }

    /// Reads commands until `quit` or end of input.
    pub fn run<R: BufRead>(&mut self, input: R) -> std::io::Result<()> {
        alert(HELP);
        for line in input.lines() {
            let Some(command) = Command::parse(&line?) else {
                continue;
            };

            let validation = match command {
                Command::Predict(file) => self.predict(file.as_deref().map(Path::new)).err(),
                Command::Text(text) => self.classify(&text).err(),
                Command::Help => {
                    alert(HELP);
                    None
                }
                Command::Quit => break,
                Command::Unknown(word) => {
                    alert(format!("unknown command `{word}`; {HELP}"));
                    None
                }
            };

            if let Some(err) = validation {
                alert(err);
            }
        }
        Ok(())
    }
}
