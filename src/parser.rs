use crate::errors::ParseError;

/// Upper bound on the number of segments in one pipeline.
pub const MAX_SEGMENTS: usize = 10;

/// Characters that separate tokens.
const DELIMITERS: &[char] = &[' ', '\t', '\r', '\n', '\x07'];

/// Token that, in last position, sends the whole pipeline to the background.
const BACKGROUND_MARKER: &str = "&";

/// Split input on whitespace. No quoting, escaping or expansion.
pub fn tokenize(input: &str) -> Vec<String> {
    input
        .split(DELIMITERS)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Remove a trailing `&` token. Returns whether one was present.
pub fn strip_background(tokens: &mut Vec<String>) -> bool {
    if tokens.last().is_some_and(|t| t == BACKGROUND_MARKER) {
        tokens.pop();
        return true;
    }
    false
}

/// One program invocation: program name, arguments, and any embedded
/// redirection operators with their operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    tokens: Vec<String>,
}

impl Segment {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    /// Tokenize a single segment's text (no `|` handling).
    pub fn parse(text: &str) -> Self {
        Self::new(tokenize(text))
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Segments joined left to right by pipes, plus a single background flag for
/// the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub segments: Vec<Segment>,
    pub background: bool,
}

impl Pipeline {
    /// Build a pipeline from a line's tokens. A trailing `&` is stripped first,
    /// then the remaining text is split on `|`. Empty segments (e.g. from `||`)
    /// are dropped.
    pub fn from_tokens(mut tokens: Vec<String>) -> Result<Self, ParseError> {
        let background = strip_background(&mut tokens);
        let joined = tokens.join(" ");

        let segments: Vec<Segment> = joined
            .split('|')
            .map(Segment::parse)
            .filter(|segment| !segment.is_empty())
            .collect();

        if segments.is_empty() {
            return Err(ParseError::Empty);
        }
        if segments.len() > MAX_SEGMENTS {
            return Err(ParseError::TooManySegments);
        }

        Ok(Self { segments, background })
    }

    pub fn parse(line: &str) -> Result<Self, ParseError> {
        Self::from_tokens(tokenize(line))
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
