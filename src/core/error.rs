use std::fmt;

#[derive(Debug)]
pub enum SimError {
    IoError(String),
    ParseError { line: usize, text: String },
    ConfigError(String),
    InvariantError(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::IoError(msg) => write!(f, "IO Error: {}", msg),
            SimError::ParseError { line, text } => {
                write!(f, "Parse Error: line {} ({:?})", line, text)
            }
            SimError::ConfigError(msg) => write!(f, "Invalid Configuration: {}", msg),
            SimError::InvariantError(msg) => write!(f, "Invariant Violated: {}", msg),
        }
    }
}

impl std::error::Error for SimError {}

impl SimError {
    pub fn io_error(message: &str) -> Self {
        SimError::IoError(message.to_string())
    }
    pub fn parse(line: usize, text: &str) -> Self {
        SimError::ParseError {
            line,
            text: text.to_string(),
        }
    }
    pub fn config(message: &str) -> Self {
        SimError::ConfigError(message.to_string())
    }
    pub fn invariant(message: &str) -> Self {
        SimError::InvariantError(message.to_string())
    }
}

impl From<std::io::Error> for SimError {
    fn from(e: std::io::Error) -> Self {
        SimError::IoError(e.to_string())
    }
}
