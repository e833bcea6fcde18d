//! Function signatures, built by hand or parsed from a declaration

use crate::error::{LlmError, Result};

const NOT_CALLABLE: &str = "Provided item must be a callable function.";

/// A single declared parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    /// Type annotation as written (`int`, `list[str]`, ...)
    pub annotation: Option<String>,
    /// Default value as written; `None` means the parameter is required
    pub default: Option<String>,
}

impl Parameter {
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.default.is_none()
    }

    /// Annotation name, `Any` when none was given
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.annotation.as_deref().unwrap_or("Any")
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)?;
        if let Some(annotation) = &self.annotation {
            write!(f, ": {annotation}")?;
        }
        if let Some(default) = &self.default {
            if self.annotation.is_some() {
                write!(f, " = {default}")?;
            } else {
                write!(f, "={default}")?;
            }
        }
        Ok(())
    }
}

/// Name, doc string, parameters and return annotation of a callable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: String,
    pub doc: Option<String>,
    pub parameters: Vec<Parameter>,
    pub returns: Option<String>,
}

impl FunctionSignature {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            parameters: Vec::new(),
            returns: None,
        }
    }

    #[must_use]
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Add a required, annotated parameter
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, annotation: impl Into<String>) -> Self {
        self.parameters.push(Parameter {
            name: name.into(),
            annotation: Some(annotation.into()),
            default: None,
        });
        self
    }

    /// Add an annotated parameter with a default, which makes it optional
    #[must_use]
    pub fn param_with_default(
        mut self,
        name: impl Into<String>,
        annotation: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        self.parameters.push(Parameter {
            name: name.into(),
            annotation: Some(annotation.into()),
            default: Some(default.into()),
        });
        self
    }

    /// Add a required parameter without a type annotation
    #[must_use]
    pub fn untyped_param(mut self, name: impl Into<String>) -> Self {
        self.parameters.push(Parameter {
            name: name.into(),
            annotation: None,
            default: None,
        });
        self
    }

    #[must_use]
    pub fn returns(mut self, annotation: impl Into<String>) -> Self {
        self.returns = Some(annotation.into());
        self
    }

    /// Names of parameters without defaults, in declaration order
    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter(|p| p.is_required())
            .map(|p| p.name.as_str())
    }

    /// Render the parameter list and return annotation, e.g. `(a: int, b: str = "x") -> str`
    #[must_use]
    pub fn render(&self) -> String {
        let params = self
            .parameters
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        match &self.returns {
            Some(returns) => format!("({params}) -> {returns}"),
            None => format!("({params})"),
        }
    }

    /// Parse a declaration such as `sample_function(param1: int, param2: str = "default") -> str`
    ///
    /// A leading `def`/`fn`/`async` keyword and a trailing `:` are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::NotCallable`] if `declaration` is not a function declaration
    pub fn parse(declaration: &str, doc: Option<&str>) -> Result<Self> {
        let decl = declaration.trim();
        let decl = decl.strip_prefix("async ").map_or(decl, str::trim_start);
        let decl = decl
            .strip_prefix("def ")
            .or_else(|| decl.strip_prefix("fn "))
            .map_or(decl, str::trim_start);
        let decl = decl.strip_suffix(':').map_or(decl, str::trim_end);

        let open = decl.find('(').ok_or_else(not_callable)?;
        let name = decl[..open].trim();
        if !is_identifier(name) {
            return Err(not_callable());
        }

        let close = matching_paren(decl, open).ok_or_else(not_callable)?;
        let rest = decl[close + 1..].trim();
        let returns = if rest.is_empty() {
            None
        } else {
            let annotation = rest.strip_prefix("->").ok_or_else(not_callable)?.trim();
            if annotation.is_empty() {
                return Err(not_callable());
            }
            Some(annotation.to_string())
        };

        let parameters = split_top_level(&decl[open + 1..close], ',')
            .into_iter()
            .map(str::trim)
            // bare `*` and `/` only mark keyword-only / positional-only sections
            .filter(|p| !p.is_empty() && *p != "*" && *p != "/")
            .map(parse_parameter)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            doc: doc
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            parameters,
            returns,
        })
    }
}

fn not_callable() -> LlmError {
    LlmError::NotCallable(NOT_CALLABLE.to_string())
}

fn parse_parameter(src: &str) -> Result<Parameter> {
    let (head, default) = match find_top_level(src, '=') {
        Some(idx) => (&src[..idx], Some(src[idx + 1..].trim())),
        None => (src, None),
    };
    if default.is_some_and(str::is_empty) {
        return Err(not_callable());
    }

    let (name, annotation) = match head.find(':') {
        Some(idx) => (head[..idx].trim(), Some(head[idx + 1..].trim())),
        None => (head.trim(), None),
    };
    let name = name.trim_start_matches('*');
    if !is_identifier(name) || annotation.is_some_and(str::is_empty) {
        return Err(not_callable());
    }

    Ok(Parameter {
        name: name.to_string(),
        annotation: annotation.map(str::to_string),
        default: default.map(str::to_string),
    })
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Quote tracking shared by the bracket scanners
#[derive(Default)]
struct QuoteState {
    quote: Option<char>,
    escaped: bool,
}

impl QuoteState {
    /// Feed one char; `true` when it sits outside any quoted literal
    fn is_code(&mut self, c: char) -> bool {
        match self.quote {
            Some(q) => {
                if self.escaped {
                    self.escaped = false;
                } else if c == '\\' {
                    self.escaped = true;
                } else if c == q {
                    self.quote = None;
                }
                false
            }
            None if c == '"' || c == '\'' => {
                self.quote = Some(c);
                false
            }
            None => true,
        }
    }
}

/// Index of the `)` closing the `(` at `open`, skipping nested brackets and quoted text
fn matching_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quotes = QuoteState::default();
    for (idx, c) in s.char_indices().skip_while(|(i, _)| *i < open) {
        if !quotes.is_code(c) {
            continue;
        }
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return (c == ')').then_some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// First `needle` outside brackets, generics and quoted text
///
/// The `>` of a `->` arrow is not a closing bracket.
fn find_top_level(s: &str, needle: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut quotes = QuoteState::default();
    let mut prev: Option<char> = None;
    for (idx, c) in s.char_indices() {
        let last = prev.replace(c);
        if !quotes.is_code(c) {
            continue;
        }
        match c {
            '(' | '[' | '{' | '<' => depth += 1,
            '>' if last == Some('-') => {}
            ')' | ']' | '}' | '>' => depth = depth.saturating_sub(1),
            c if c == needle && depth == 0 => return Some(idx),
            _ => {}
        }
    }
    None
}

fn split_top_level(s: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = s;
    while let Some(idx) = find_top_level(rest, separator) {
        parts.push(&rest[..idx]);
        rest = &rest[idx + separator.len_utf8()..];
    }
    parts.push(rest);
    parts
}
