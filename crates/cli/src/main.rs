use guav_core::engine::{Engine, EngineError, TranslationReport};
#[cfg(feature = "provider-gemini")]
use guav_core::providers::GeminiProvider;
#[cfg(feature = "provider-ollama")]
use guav_core::providers::OllamaProvider;
#[cfg(feature = "provider-openai-compat")]
use guav_core::providers::OpenAICompatProvider;
use guav_core::providers::{CodeGenerator, MockProvider, Sampling};
use guav_core::runner::JavaToolchain;
use guav_core::types::{AppConfig, JsonEnvelope};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use toml::Value;
use tracing::Level;
use url::Url;

#[derive(Debug, Parser)]
#[command(
    name = "guav",
    version,
    about = "Translate guav programs into Java, with AI-generated functions"
)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Debug, Args)]
struct TranslateArgs {
    file: PathBuf,
    #[arg(long = "out-dir")]
    out_dir: Option<PathBuf>,
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    model: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    InitConfig {
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Translate a .guav file into a Java unit.
    Translate(TranslateArgs),
    /// Translate, compile and run a .guav file, printing its output.
    Run(TranslateArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { force } = cli.cmd {
        init_config_file(Path::new(".guav.toml"), force)?;
        println!("initialized .guav.toml");
        return Ok(());
    }

    let mut cfg = load_config()?;
    init_logging(&cfg, cli.verbose);

    match cli.cmd {
        Commands::InitConfig { .. } => {}
        Commands::Translate(args) => {
            apply_cli_overrides(&mut cfg, &args);
            let report = translate(&cfg, &args.file).await?;
            if cli.json {
                print_envelope("translate", "translation completed", &report, None)?;
            } else {
                println!("{}", report.output_path.display());
            }
        }
        Commands::Run(args) => {
            apply_cli_overrides(&mut cfg, &args);
            let report = translate(&cfg, &args.file).await?;
            let toolchain = JavaToolchain::from(&cfg.toolchain);
            let stdout = toolchain.compile_and_run(&report.output_path).await?;
            if cli.json {
                print_envelope("execute", "run completed", &report, Some(&stdout))?;
            } else {
                println!("{stdout}");
            }
        }
    }

    Ok(())
}

async fn translate(cfg: &AppConfig, file: &Path) -> anyhow::Result<TranslationReport> {
    let provider = build_provider(cfg, |k| std::env::var(k).ok())?;
    let engine = Engine::new(provider).with_output_dir(&cfg.output.dir);
    engine
        .translate_file(file)
        .await
        .map_err(render_engine_error)
}

fn print_envelope(
    phase: &str,
    message: &str,
    report: &TranslationReport,
    stdout: Option<&str>,
) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&JsonEnvelope {
            status: "ok".to_string(),
            phase: phase.to_string(),
            message: message.to_string(),
            details: json!({
                "unit": report.unit_name,
                "output_path": report.output_path,
                "diagnostics": report.diagnostics,
                "tokens_used": report.tokens_used,
                "stdout": stdout,
            }),
        })?
    );
    Ok(())
}

fn apply_cli_overrides(cfg: &mut AppConfig, args: &TranslateArgs) {
    if let Some(p) = &args.provider {
        cfg.llm.provider = p.clone();
    }
    if let Some(m) = &args.model {
        cfg.llm.model = m.clone();
    }
    if let Some(dir) = &args.out_dir {
        cfg.output.dir = dir.to_string_lossy().to_string();
    }
}

/// `cfg.log.level` was checked by [`validate_config`].
fn init_logging(cfg: &AppConfig, verbose: bool) {
    let level = if verbose {
        Level::DEBUG
    } else {
        Level::from_str(&cfg.log.level).unwrap_or(Level::WARN)
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_provider<F>(cfg: &AppConfig, env_get: F) -> anyhow::Result<Box<dyn CodeGenerator>>
where
    F: Fn(&str) -> Option<String> + Copy,
{
    let provider = cfg.llm.provider.to_ascii_lowercase();
    let endpoint = resolve_provider_endpoint(cfg, env_get)?;
    let api_key = env_get(&cfg.llm.api_key_env_var).filter(|v| !v.trim().is_empty());
    let sampling = Sampling {
        temperature: cfg.llm.temperature,
        top_p: cfg.llm.top_p,
        top_k: cfg.llm.top_k,
        max_tokens: cfg.llm.max_tokens,
    };

    let provider: Box<dyn CodeGenerator> = match provider.as_str() {
        "mock" => Box::new(MockProvider),
        #[cfg(feature = "provider-ollama")]
        "ollama" => Box::new(OllamaProvider::new(
            endpoint.unwrap_or_else(|| "http://127.0.0.1:11434/api/generate".to_string()),
            cfg.llm.model.clone(),
            sampling,
        )),
        #[cfg(feature = "provider-openai-compat")]
        "chatgpt" | "openai_compat" => Box::new(OpenAICompatProvider::new(
            endpoint.unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string()),
            api_key,
            cfg.llm.model.clone(),
            sampling,
        )),
        #[cfg(feature = "provider-openai-compat")]
        "openrouter" => Box::new(OpenAICompatProvider::new(
            endpoint.unwrap_or_else(|| "https://openrouter.ai/api/v1/chat/completions".to_string()),
            api_key,
            cfg.llm.model.clone(),
            sampling,
        )),
        #[cfg(feature = "provider-gemini")]
        "gemini" => Box::new(GeminiProvider::new(
            endpoint.unwrap_or_else(|| GeminiProvider::DEFAULT_ENDPOINT.to_string()),
            api_key,
            cfg.llm.model.clone(),
            sampling,
        )),
        other => anyhow::bail!(
            "unknown or disabled provider `{other}`; expected one of: mock, gemini, chatgpt, openrouter, openai_compat, ollama"
        ),
    };
    Ok(provider)
}

fn resolve_provider_endpoint<F>(cfg: &AppConfig, env_get: F) -> anyhow::Result<Option<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let endpoint = cfg
        .llm
        .endpoint
        .clone()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| env_get(&cfg.llm.endpoint_env_var))
        .filter(|v| !v.trim().is_empty());
    if let Some(raw) = &endpoint {
        Url::parse(raw).map_err(|e| anyhow::anyhow!("invalid provider endpoint `{raw}`: {e}"))?;
    }
    Ok(endpoint)
}

fn load_config() -> anyhow::Result<AppConfig> {
    let local_path = PathBuf::from(".guav.toml");
    let home_path = std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".guav.toml"));

    let home = match &home_path {
        Some(path) => read_config_value(path)?,
        None => None,
    };
    let local = read_config_value(&local_path)?;

    resolve_config(home, local, |k| std::env::var(k).ok())
}

fn resolve_config<F>(
    home: Option<Value>,
    local: Option<Value>,
    env_get: F,
) -> anyhow::Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut merged = Value::try_from(AppConfig::default())?;
    if let Some(home_value) = home {
        merge_toml(&mut merged, home_value);
    }
    if let Some(local_value) = local {
        merge_toml(&mut merged, local_value);
    }

    let mut cfg: AppConfig = merged.try_into()?;
    apply_env_overrides(&mut cfg, env_get);
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Rejects settings that would only fail later, after a provider was called.
fn validate_config(cfg: &AppConfig) -> anyhow::Result<()> {
    Level::from_str(&cfg.log.level).map_err(|_| {
        anyhow::anyhow!(
            "log.level `{}` is not one of: error, warn, info, debug, trace",
            cfg.log.level
        )
    })?;

    let dir = cfg.output.dir.trim();
    if dir.is_empty() {
        anyhow::bail!("output.dir must name a directory for generated .java units");
    }
    if Path::new(dir).is_file() {
        anyhow::bail!("output.dir `{dir}` is an existing file, not a directory");
    }
    Ok(())
}

fn read_config_value(path: &Path) -> anyhow::Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    let parsed = raw
        .parse::<Value>()
        .with_context(|| format!("invalid TOML in {}", path.display()))?;
    Ok(Some(parsed))
}

fn merge_toml(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base_map), Value::Table(overlay_map)) => {
            for (key, value) in overlay_map {
                if let Some(base_value) = base_map.get_mut(&key) {
                    merge_toml(base_value, value);
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value;
        }
    }
}

fn apply_env_overrides<F>(cfg: &mut AppConfig, env_get: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = env_get("GUAV_PROVIDER") {
        cfg.llm.provider = v;
    }
    if let Some(v) = env_get("GUAV_MODEL") {
        cfg.llm.model = v;
    }
    if let Some(v) = env_get("GUAV_ENDPOINT") {
        cfg.llm.endpoint = Some(v);
    }
    if let Some(v) = env_get("GUAV_TEMPERATURE").and_then(|v| v.parse::<f32>().ok()) {
        cfg.llm.temperature = v;
    }
    if let Some(v) = env_get("GUAV_TOP_P").and_then(|v| v.parse::<f32>().ok()) {
        cfg.llm.top_p = v;
    }
    if let Some(v) = env_get("GUAV_TOP_K").and_then(|v| v.parse::<u32>().ok()) {
        cfg.llm.top_k = v;
    }
    if let Some(v) = env_get("GUAV_MAX_TOKENS").and_then(|v| v.parse::<u32>().ok()) {
        cfg.llm.max_tokens = v;
    }
    if let Some(v) = env_get("GUAV_ENDPOINT_ENV_VAR") {
        cfg.llm.endpoint_env_var = v;
    }
    if let Some(v) = env_get("GUAV_API_KEY_ENV_VAR") {
        cfg.llm.api_key_env_var = v;
    }

    if let Some(v) = env_get("GUAV_OUTPUT_DIR") {
        cfg.output.dir = v;
    }
    if let Some(v) = env_get("GUAV_JAVAC") {
        cfg.toolchain.javac = v;
    }
    if let Some(v) = env_get("GUAV_JAVA") {
        cfg.toolchain.java = v;
    }
    if let Some(v) = env_get("GUAV_LOG_LEVEL") {
        cfg.log.level = v;
    }
}

fn init_config_file(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; re-run with --force to overwrite",
            path.display()
        );
    }
    fs::write(path, config_template())?;
    Ok(())
}

fn config_template() -> &'static str {
    r#"# guav configuration
# precedence: CLI > env > local .guav.toml > home ~/.guav.toml > defaults

[llm]
# provider options: gemini, mock, chatgpt, openrouter, openai_compat, ollama
provider = "gemini"
# optional explicit endpoint override
endpoint = ""
model = "gemini-1.5-flash"
temperature = 1.0
top_p = 0.95
top_k = 64
max_tokens = 512
endpoint_env_var = "GUAV_LLM_ENDPOINT"
# the key itself is read from this environment variable, never from this file
api_key_env_var = "GUAV_API_KEY"

[output]
dir = "output"

[toolchain]
javac = "javac"
java = "java"

[log]
# error, warn, info, debug, trace
level = "warn"
"#
}

fn render_engine_error(err: EngineError) -> anyhow::Error {
    match err {
        EngineError::MissingDirective => {
            anyhow::anyhow!(
                "{}; add a line such as `@Main` at the top of the file",
                EngineError::MissingDirective
            )
        }
        other => anyhow::anyhow!(other),
    }
}
