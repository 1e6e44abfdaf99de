// =============================================================================
// Command line and interactive prompts
// =============================================================================

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;

use crate::pipeline::{ChartRequest, PipelineError};
use crate::runtime_config::DEFAULT_CONFIG_PATH;

const DATE_PROMPT_SUFFIX: &str =
    "date in format Month/Day/Year separated by forward slashes (ex. July 3rd, 2014 = 7/3/2014)";
const TICKER_PROMPT: &str = "Enter stock ticker (ex. Facebook = FB)";
const AGAIN_PROMPT: &str = "Generate another graph (y/n)? ";

/// Chart a stock's daily closes with a 20-day mean and Bollinger bands.
///
/// With `--start`, `--end` and `--ticker` a single chart is produced;
/// otherwise the program prompts for them interactively.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// First date of the range, Month/Day/Year (ex. 7/3/2014)
    #[arg(long, requires_all = ["end", "ticker"])]
    pub start: Option<String>,

    /// Last date of the range, Month/Day/Year
    #[arg(long, requires_all = ["start", "ticker"])]
    pub end: Option<String>,

    /// Stock ticker symbol, any case (ex. fb)
    #[arg(long, requires_all = ["start", "end"])]
    pub ticker: Option<String>,

    /// Runtime configuration file (JSON)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Write the default configuration to the config path and exit
    #[arg(long)]
    pub init_config: bool,
}

impl Cli {
    /// `(start, end, ticker)` when all three were given on the command line.
    pub fn one_shot(&self) -> Option<(&str, &str, &str)> {
        match (&self.start, &self.end, &self.ticker) {
            (Some(s), Some(e), Some(t)) => Some((s.as_str(), e.as_str(), t.as_str())),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Prompter
// ---------------------------------------------------------------------------

/// Line-oriented prompts over any reader/writer pair.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print a line for the user.
    pub fn say(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.output, "{message}")?;
        self.output.flush()
    }

    /// Show `prompt` and read one line, trimmed. `None` at end of input.
    pub fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Ask until the answer is `y` or `n` (any case). `None` at end of input.
    pub fn ask_yes_no(&mut self, prompt: &str) -> io::Result<Option<bool>> {
        loop {
            match self.ask(prompt)?.map(|a| a.to_lowercase()) {
                None => return Ok(None),
                Some(a) if a == "y" => return Ok(Some(true)),
                Some(a) if a == "n" => return Ok(Some(false)),
                Some(_) => continue,
            }
        }
    }

    /// Prompt for start, end and ticker until they form a valid request.
    ///
    /// Input errors are shown and the three questions asked again. `None`
    /// at end of input.
    pub fn ask_request(&mut self) -> io::Result<Option<ChartRequest>> {
        loop {
            let Some(start) = self.ask(&format!("Enter start {DATE_PROMPT_SUFFIX}\n"))? else {
                return Ok(None);
            };
            let Some(end) = self.ask(&format!("Enter end {DATE_PROMPT_SUFFIX}\n"))? else {
                return Ok(None);
            };
            let Some(ticker) = self.ask(&format!("{TICKER_PROMPT}\n"))? else {
                return Ok(None);
            };

            match ChartRequest::parse(&start, &end, &ticker) {
                Ok(request) => return Ok(Some(request)),
                Err(e) => self.say(&format!("ERROR: {e}"))?,
            }
        }
    }

    /// Ask whether to produce another chart.
    pub fn ask_again(&mut self) -> io::Result<bool> {
        Ok(self.ask_yes_no(AGAIN_PROMPT)?.unwrap_or(false))
    }
}

/// User-facing text for a pipeline failure.
pub fn describe_failure(err: &PipelineError) -> String {
    if err.is_empty_series() {
        format!("No data in range: {err}")
    } else if err.is_input_error() {
        format!("ERROR: {err}")
    } else {
        format!("ERROR: could not create chart: {err}")
    }
}
