use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One line of guav source, trimmed, with its 1-based position.
///
/// A leading byte-order mark is dropped along with the whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine<'a> {
    pub number: usize,
    pub text: &'a str,
}

impl<'a> SourceLine<'a> {
    pub fn new(number: usize, raw: &'a str) -> Self {
        Self {
            number,
            text: raw.trim_start_matches('\u{feff}').trim(),
        }
    }
}

/// Name of the compilable unit declared by the `@name` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDirective {
    pub name: String,
    pub line: usize,
}

/// A request for a generated function, parsed from a `###` marker line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRequest {
    pub name: String,
    pub params: Vec<String>,
    pub intent: String,
    pub return_type: String,
}

/// Instruction appended to every generation prompt.
pub const DECODING_INSTRUCTION: &str = "Only output the function body without any additional text, \
explanations or code fences. Do not repeat the function name or parameters. \
Only print if the description says to print.";

impl FunctionRequest {
    pub fn param_list(&self) -> String {
        self.params.join(", ")
    }

    /// Renders the natural-language prompt shared by every provider.
    pub fn prompt(&self) -> String {
        format!(
            "Generate only the Java function '{}' with parameters ({}) that {}. \
The function should be static with a return type of {}. {}",
            self.name,
            self.param_list(),
            self.intent,
            self.return_type,
            DECODING_INSTRUCTION
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedCode {
    pub code: String,
    /// Completion tokens billed for the answer, when the service reports them.
    pub tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonEnvelope {
    pub status: String,
    pub phase: String,
    pub message: String,
    pub details: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub endpoint: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_tokens: u32,
    pub endpoint_env_var: String,
    pub api_key_env_var: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            endpoint: None,
            model: "gemini-1.5-flash".to_string(),
            temperature: 1.0,
            top_p: 0.95,
            top_k: 64,
            max_tokens: 512,
            endpoint_env_var: "GUAV_LLM_ENDPOINT".to_string(),
            api_key_env_var: "GUAV_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "output".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainConfig {
    pub javac: String,
    pub java: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            javac: "javac".to_string(),
            java: "java".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub output: OutputConfig,
    pub toolchain: ToolchainConfig,
    pub log: LogConfig,
}
