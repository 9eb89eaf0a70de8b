//! Expansion of `###` marker lines into generated Java methods.

use crate::providers::{CodeGenerator, ProviderError};
use crate::types::FunctionRequest;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^###\s*([A-Za-z_$][\w$]*)\s*\(\s*(.*?)\s*\)\s*#\s*(.+?)\s*#\s*([\w$]+(?:\[\])?)\s*$")
        .expect("marker regex is valid")
});

static QUALIFIED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:public|protected|private)\s+static\b").expect("qualifier regex is valid")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MarkerError {
    #[error("AI function syntax invalid in line `{0}`; expected `###name(params) # description # return_type`")]
    Malformed(String),
}

/// What a marker line turned into.
#[derive(Debug)]
pub enum Expansion {
    /// Normalized method text, ready to splice, with the tokens it cost.
    Generated { code: String, tokens: Option<u32> },
    /// The service failed; `code` is a comment naming the function.
    Placeholder { code: String, error: ProviderError },
}

impl Expansion {
    pub fn code(&self) -> &str {
        match self {
            Expansion::Generated { code, .. } => code,
            Expansion::Placeholder { code, .. } => code,
        }
    }
}

/// Parses `###name(params) # intent # return_type`.
///
/// # Examples
///
/// ```
/// use guav_core::bridge::parse_marker;
///
/// let req = parse_marker("###sum(int a, int b) # adds a and b # int").unwrap();
/// assert_eq!(req.name, "sum");
/// assert_eq!(req.params, vec!["int a", "int b"]);
/// assert_eq!(req.intent, "adds a and b");
/// assert_eq!(req.return_type, "int");
/// ```
pub fn parse_marker(line: &str) -> Result<FunctionRequest, MarkerError> {
    let caps = MARKER_RE
        .captures(line.trim())
        .ok_or_else(|| MarkerError::Malformed(line.to_string()))?;
    let params = caps[2]
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(ToString::to_string)
        .collect();
    Ok(FunctionRequest {
        name: caps[1].to_string(),
        params,
        intent: caps[3].to_string(),
        return_type: caps[4].to_string(),
    })
}

/// Turns raw service text into a closed, signed method block.
pub fn normalize_generated(req: &FunctionRequest, raw: &str) -> String {
    let body = strip_code_fences(raw);
    let mut code = if QUALIFIED_RE.is_match(&body) {
        body
    } else {
        format!(
            "public static {} {}({}) {{\n{}\n}}",
            req.return_type,
            req.name,
            req.param_list(),
            body
        )
    };
    if !code.trim_end().ends_with('}') {
        code.push_str("\n}");
    }
    code.push('\n');
    code
}

/// Comment spliced in place of a function the service could not produce.
pub fn placeholder(name: &str, error: &ProviderError) -> String {
    let reason = error.to_string().replace(['\r', '\n'], " ");
    format!("// Error generating function {name}: {reason}\n")
}

fn is_fence_line(line: &str) -> bool {
    line.trim()
        .strip_prefix("```")
        .is_some_and(|tag| tag.chars().all(|c| c.is_ascii_alphanumeric()))
}

fn strip_code_fences(raw: &str) -> String {
    raw.lines()
        .filter(|line| !is_fence_line(line))
        .map(|line| line.replace("```", ""))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Couples marker parsing to a [`CodeGenerator`].
pub struct AiFunctionBridge<P>
where
    P: CodeGenerator,
{
    provider: P,
}

impl<P> AiFunctionBridge<P>
where
    P: CodeGenerator,
{
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Expands one marker line. Service failures never surface as `Err`;
    /// they become an [`Expansion::Placeholder`].
    pub async fn expand(&self, line: &str) -> Result<Expansion, MarkerError> {
        let req = parse_marker(line)?;
        debug!(function = %req.name, params = req.params.len(), "requesting generated function");
        match self.provider.generate(req.clone()).await {
            Ok(generated) => Ok(Expansion::Generated {
                code: normalize_generated(&req, &generated.code),
                tokens: generated.tokens,
            }),
            Err(error) => Ok(Expansion::Placeholder {
                code: placeholder(&req.name, &error),
                error,
            }),
        }
    }
}
