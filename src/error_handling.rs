use std::fmt::Display;
use std::path::PathBuf;

pub trait ErrorType: Display + PartialEq {}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize
}

impl Location {
    pub fn in_file(file: PathBuf, line: usize) -> Self {
        Location { file, line }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.file.as_os_str().is_empty(), self.line) {
            (true, 0) => write!(f, "<rule>"),
            (true, line) => write!(f, "line {}", line),
            (false, 0) => write!(f, "{}", self.file.display()),
            (false, line) => write!(f, "{}:{}", self.file.display(), line),
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Error<T: ErrorType> {
    pub location: Location,
    // The offending rule text, empty when the error concerns the whole grammar
    pub context: String,
    pub error: T
}

impl<T: ErrorType> Error<T> {
    pub fn new(error: T, context: impl Into<String>) -> Self {
        Error {
            location: Location::default(),
            context: context.into(),
            error
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }
}

impl<T: ErrorType> Display for Error<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]  {}", self.location, self.error)?;
        if !self.context.is_empty() {
            write!(f, " in `{}`", self.context)?;
        }
        Ok(())
    }
}

impl<T: ErrorType + std::fmt::Debug> std::error::Error for Error<T> {}

pub type Errors<T> = Vec<Error<T>>;

// Joins every error onto its own line, the way the command line reports them
pub fn render_errors<T: ErrorType>(errors: &Errors<T>) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n")
}
