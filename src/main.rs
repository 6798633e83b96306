use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use test_filter::config::ReplConfig;
use test_filter::{script, FilterDocument};

const CONFIG_FILE: &str = "test_filter.json";

/// 加载REPL配置，失败时使用默认配置
fn load_config() -> ReplConfig {
    match ReplConfig::from_json_file(CONFIG_FILE) {
        Ok(config) => {
            info!(
                file = CONFIG_FILE,
                presets = config.presets.len(),
                "loaded configuration"
            );
            config
        }
        Err(e) => {
            warn!(error = %e, "using default configuration");
            ReplConfig::default()
        }
    }
}

/// 输出编译结果，可选输出选择树
fn print_document(document: &FilterDocument, emit_selection: bool) -> Result<()> {
    println!("{}", document);
    if emit_selection {
        let selection = document
            .parse()
            .context("compiled document could not be parsed")?;
        println!("{}", serde_json::to_string_pretty(&selection)?);
    }
    Ok(())
}

enum Flow {
    Continue,
    Quit,
}

fn execute(line: &str, config: &ReplConfig) -> Result<Flow> {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some(":quit") | Some(":q") => return Ok(Flow::Quit),
        Some(":help") => {
            println!("  <script>        编译构建脚本, 例如: cat Smoke and not test~ .*Slow.*");
            println!("  :presets        列出预设过滤器");
            println!("  :preset NAME    编译预设过滤器");
            println!("  :quit           退出");
        }
        Some(":presets") => {
            for (name, script) in &config.presets {
                println!("  {} -> {}", name, script);
            }
        }
        Some(":preset") => {
            let name = parts.next().context("usage: :preset NAME")?;
            let source = config
                .preset(name)
                .with_context(|| format!("preset `{}` is not defined", name))?;
            print_document(&script::compile(source)?, config.emit_selection)?;
        }
        Some(command) if command.starts_with(':') => {
            anyhow::bail!("unknown command `{}` (try :help)", command);
        }
        _ => print_document(&script::compile(line)?, config.emit_selection)?,
    }
    Ok(Flow::Continue)
}

fn repl(config: &ReplConfig) -> Result<()> {
    let mut editor = DefaultEditor::new().context("failed to initialise line editor")?;
    if let Some(history) = &config.history_file {
        if let Err(e) = editor.load_history(history) {
            debug!(error = %e, "no history loaded");
        }
    }

    println!("--- Test Filter: 构建脚本到过滤文档 (:help 查看命令) ---");
    loop {
        match editor.readline(&config.prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line)?;
                match execute(line, config) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Quit) => break,
                    Err(e) => println!("✗ {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("failed to read input"),
        }
    }

    if let Some(history) = &config.history_file {
        if let Err(e) = editor.save_history(history) {
            warn!(error = %e, "failed to save history");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = load_config();

    // 带参数时只编译一次，不进入REPL
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        let document = script::compile_args(&args)?;
        return print_document(&document, config.emit_selection);
    }

    repl(&config)
}
