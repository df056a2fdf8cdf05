use scrape_core::AggregationPolicy;

pub const HELP: &str = "\
Commands:
  <url>                submit a URL for scraping
  r | refresh          fetch the job list now
  p | policy <rule>    domain totals over `completed` or `all` jobs
  d | dismiss          clear the error line
  h | help             show this help
  q | quit             exit";

/// One line of stdin input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Submit(String),
    Refresh,
    Policy(AggregationPolicy),
    Dismiss,
    Help,
    Quit,
    Empty,
    /// Parsed but unusable; carries the message to show.
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "" => Command::Empty,
            "r" | "refresh" => Command::Refresh,
            "d" | "dismiss" => Command::Dismiss,
            "h" | "help" | "?" => Command::Help,
            "q" | "quit" | "exit" => Command::Quit,
            "p" | "policy" => match rest.parse() {
                Ok(policy) => Command::Policy(policy),
                Err(err) => Command::Invalid(err),
            },
            // Anything else is taken as a URL; validation happens on submit.
            _ => Command::Submit(line.to_string()),
        }
    }
}
