//! Lodstat command line shell
//!
//! Reads a protection request from a JSON file, applies the statistical
//! secret and prints the publishable table. Core logic lives in the
//! `lodstat-secret` crate.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use lodstat_core::AppConfig;
use lodstat_secret::{
    apply_stat_secret, MalformedRow, ProtectedTable, ProtectionRequest, RenderedTable,
    StaticReferenceSource,
};
use serde::{Deserialize, Serialize};
use tracing::info;

const EXIT_FAILURE: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_MALFORMED: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Protect { request: PathBuf },
    Config { write: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    command: Option<Command>,
    config_path: Option<PathBuf>,
    format: OutputFormat,
    debug: bool,
    visible: bool,
    ranges: bool,
    show_help: bool,
}

/// A protection request plus the reference tables its constraints consult.
#[derive(Debug, Deserialize)]
struct RequestFile {
    #[serde(flatten)]
    request: ProtectionRequest,
    #[serde(default)]
    reference_tables: StaticReferenceSource,
}

#[derive(Debug, Serialize)]
struct JsonOutput<'a> {
    headers: &'a [String],
    rows: &'a [Vec<String>],
    suppressed: bool,
    warning: Option<&'a str>,
    iterations: usize,
    malformed: &'a [MalformedRow],
}

fn main() {
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();

    let exit_code = run(std::env::args_os(), &mut stdout, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Initialize tracing subscriber for logging
fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // A subscriber may already be installed when `run` is called more than once
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(io::stderr))
        .with(filter)
        .try_init();
}

fn run<I, W, E>(args: I, out: &mut W, err: &mut E) -> i32
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let options = match parse_args(args) {
        Ok(options) => options,
        Err(message) => {
            let _ = writeln!(err, "error: {message}");
            let _ = write_usage(err);
            return EXIT_USAGE;
        }
    };

    if options.show_help {
        if write_usage(out).is_err() {
            return EXIT_FAILURE;
        }
        return 0;
    }

    let Some(command) = options.command.clone() else {
        let _ = writeln!(err, "error: missing command");
        let _ = write_usage(err);
        return EXIT_USAGE;
    };

    let config = match load_config(options.config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let _ = writeln!(err, "error: {e:#}");
            return EXIT_FAILURE;
        }
    };
    init_tracing(&config.logging.filter);

    let outcome = match command {
        Command::Protect { request } => protect(&request, &options, &config, out, err),
        Command::Config { write } => show_config(&config, write, out).map(|()| 0),
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            let _ = writeln!(err, "error: {e:#}");
            EXIT_FAILURE
        }
    }
}

fn parse_args<I>(args: I) -> Result<CliOptions, String>
where
    I: IntoIterator<Item = OsString>,
{
    let mut iter = args.into_iter();
    let _argv0 = iter.next();

    let mut command: Option<Command> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut format = OutputFormat::Text;
    let mut debug = false;
    let mut visible = false;
    let mut ranges = false;
    let mut write = false;
    let mut show_help = false;

    while let Some(argument) = iter.next() {
        let arg = argument.to_string_lossy();

        match arg.as_ref() {
            "-h" | "--help" => show_help = true,
            "protect" => {
                if command.is_some() {
                    return Err(String::from("only one command may be given"));
                }
                let next = iter
                    .next()
                    .ok_or_else(|| String::from("missing request path for `protect`"))?;
                command = Some(Command::Protect {
                    request: PathBuf::from(next),
                });
            }
            "config" => {
                if command.is_some() {
                    return Err(String::from("only one command may be given"));
                }
                command = Some(Command::Config { write: false });
            }
            "--config" => {
                if config_path.is_some() {
                    return Err(String::from("`--config` may only be provided once"));
                }
                let next = iter
                    .next()
                    .ok_or_else(|| String::from("missing path for `--config`"))?;
                config_path = Some(PathBuf::from(next));
            }
            "--format" => {
                let next = iter
                    .next()
                    .ok_or_else(|| String::from("missing value for `--format`"))?;
                format = match next.to_string_lossy().as_ref() {
                    "text" => OutputFormat::Text,
                    "json" => OutputFormat::Json,
                    other => {
                        return Err(format!(
                            "invalid `--format` value `{other}`: expected text or json"
                        ))
                    }
                };
            }
            "--debug" => debug = true,
            "--visible" => visible = true,
            "--ranges" => ranges = true,
            "--write" => write = true,
            other if other.starts_with('-') => {
                return Err(format!("unknown option `{other}`"));
            }
            other => return Err(format!("unexpected argument `{other}`")),
        }
    }

    if write {
        match &mut command {
            Some(Command::Config { write: w }) => *w = true,
            _ => return Err(String::from("`--write` only applies to `config`")),
        }
    }

    Ok(CliOptions {
        command,
        config_path,
        format,
        debug,
        visible,
        ranges,
        show_help,
    })
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            config.apply_env()?;
            Ok(config)
        }
        None => AppConfig::load_with_env().context("loading config"),
    }
}

fn protect<W, E>(
    path: &Path,
    options: &CliOptions,
    config: &AppConfig,
    out: &mut W,
    err: &mut E,
) -> anyhow::Result<i32>
where
    W: Write,
    E: Write,
{
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading request {}", path.display()))?;
    let file: RequestFile = serde_json::from_str(&contents)
        .with_context(|| format!("parsing request {}", path.display()))?;

    let mut request = file.request;
    request.options.debug |= options.debug;
    request.options.visible |= options.visible;
    request.options.ranges |= options.ranges;

    info!(
        "Protecting {} ({} rows, {} reference tables)",
        path.display(),
        request.result.rows.len(),
        file.reference_tables.len()
    );
    let protected = apply_stat_secret(&request, &file.reference_tables, &config.secret)?;
    let rendered = protected.render(&request.options.render_options(&config.secret));

    match options.format {
        OutputFormat::Text => write_text(out, &rendered, &protected)?,
        OutputFormat::Json => write_json(out, &rendered, &protected)?,
    }

    if protected.malformed.is_empty() {
        return Ok(0);
    }
    for row in &protected.malformed {
        writeln!(
            err,
            "warning: input row {} excluded, non-numeric '{}' in {}",
            row.row, row.value, row.column
        )?;
    }
    Ok(EXIT_MALFORMED)
}

fn show_config<W: Write>(config: &AppConfig, write: bool, out: &mut W) -> anyhow::Result<()> {
    out.write_all(toml::to_string_pretty(config)?.as_bytes())?;
    if write {
        config.save()?;
        writeln!(out, "# written to {}", AppConfig::config_path()?.display())?;
    }
    Ok(())
}

fn write_text<W: Write>(
    out: &mut W,
    rendered: &RenderedTable,
    protected: &ProtectedTable,
) -> io::Result<()> {
    let labels = rendered.labels;
    let mut widths: Vec<usize> = rendered.headers.iter().map(|h| h.chars().count()).collect();
    for row in &rendered.rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let format_line = |cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, &width))| {
                if i < labels {
                    format!("{cell:<width$}")
                } else {
                    format!("{cell:>width$}")
                }
            })
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    writeln!(out, "{}", format_line(&rendered.headers))?;
    for row in &rendered.rows {
        writeln!(out, "{}", format_line(row))?;
    }
    if let Some(warning) = &protected.warning {
        writeln!(out)?;
        writeln!(out, "{warning}")?;
    }
    Ok(())
}

fn write_json<W: Write>(
    out: &mut W,
    rendered: &RenderedTable,
    protected: &ProtectedTable,
) -> anyhow::Result<()> {
    let output = JsonOutput {
        headers: &rendered.headers,
        rows: &rendered.rows,
        suppressed: protected.suppressed,
        warning: protected.warning.as_deref(),
        iterations: protected.iterations,
        malformed: &protected.malformed,
    };
    serde_json::to_writer_pretty(&mut *out, &output)?;
    writeln!(out)?;
    Ok(())
}

fn write_usage<W>(out: &mut W) -> io::Result<()>
where
    W: Write,
{
    writeln!(
        out,
        "Usage: lodstat protect REQUEST.json [--config PATH] [--format text|json]\n\
         \x20                       [--debug] [--visible] [--ranges]\n\
         \x20      lodstat config [--config PATH] [--write]\n\
         \n\
         Examples:\n\
         \n\
         lodstat protect request.json\n\
         lodstat protect request.json --format json --debug\n\
         lodstat config --write\n",
    )
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;
    use std::fs;
    use std::path::PathBuf;

    use serde_json::json;
    use tempfile::TempDir;

    use super::{parse_args, run, Command, OutputFormat, EXIT_MALFORMED, EXIT_USAGE};

    fn parse_from(args: &[&str]) -> Result<super::CliOptions, String> {
        let os_args: Vec<OsString> = args.iter().map(OsString::from).collect();
        parse_args(os_args)
    }

    fn run_with(args: &[&str]) -> (i32, String, String) {
        let os_args: Vec<OsString> = args.iter().map(OsString::from).collect();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = run(os_args, &mut out, &mut err);
        (
            code,
            String::from_utf8(out).expect("utf8 stdout"),
            String::from_utf8(err).expect("utf8 stderr"),
        )
    }

    /// Writes a config and an example request into a temp dir.
    fn fixture(request: &serde_json::Value) -> (TempDir, String, String) {
        let dir = TempDir::new().expect("temp dir");
        let config = dir.path().join("config.toml");
        fs::write(&config, "[secret]\ndefault_threshold = 3.0\n").expect("write config");
        let path = dir.path().join("request.json");
        fs::write(&path, request.to_string()).expect("write request");
        (
            dir,
            path.display().to_string(),
            config.display().to_string(),
        )
    }

    fn example_request() -> serde_json::Value {
        json!({
            "result": {
                "headers": ["comune", "sesso", "residenti"],
                "rows": [
                    ["A", "X", 1], ["A", "Y", 5],
                    ["B", "X", 2], ["B", "Y", 2],
                    ["C", "X", 10], ["C", "Y", 10]
                ]
            },
            "pivot": { "rows": ["comune"], "columns": ["sesso"], "measures": ["residenti"] },
            "rules": { "columns": [{ "name": "residenti", "secret": true }] },
            "reference_tables": {}
        })
    }

    #[test]
    fn test_parse_protect_with_flags() {
        let options = parse_from(&[
            "lodstat",
            "protect",
            "req.json",
            "--format",
            "json",
            "--debug",
            "--config",
            "lodstat.toml",
        ])
        .expect("parse");
        assert_eq!(
            options.command,
            Some(Command::Protect {
                request: PathBuf::from("req.json")
            })
        );
        assert_eq!(options.format, OutputFormat::Json);
        assert!(options.debug);
        assert!(!options.visible);
        assert_eq!(options.config_path, Some(PathBuf::from("lodstat.toml")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_from(&["lodstat", "protect"]).is_err());
        assert!(parse_from(&["lodstat", "protect", "a.json", "--format", "xml"]).is_err());
        assert!(parse_from(&["lodstat", "protect", "a.json", "--bogus"]).is_err());
        assert!(parse_from(&["lodstat", "protect", "a.json", "--write"]).is_err());
        assert!(parse_from(&["lodstat", "config", "protect", "a.json"]).is_err());
    }

    #[test]
    fn test_parse_config_write() {
        let options = parse_from(&["lodstat", "config", "--write"]).expect("parse");
        assert_eq!(options.command, Some(Command::Config { write: true }));
    }

    #[test]
    fn test_usage_errors_exit_two() {
        let (code, out, err) = run_with(&["lodstat"]);
        assert_eq!(code, EXIT_USAGE);
        assert!(out.is_empty());
        assert!(err.contains("missing command"));

        let (code, out, _) = run_with(&["lodstat", "--help"]);
        assert_eq!(code, 0);
        assert!(out.starts_with("Usage: lodstat"));
    }

    #[test]
    fn test_protect_text_output() {
        let (_dir, request, config) = fixture(&example_request());
        let (code, out, err) = run_with(&["lodstat", "protect", &request, "--config", &config]);
        assert_eq!(code, 0, "stderr: {err}");

        let lines: Vec<Vec<&str>> = out
            .lines()
            .map(|line| line.split_whitespace().collect())
            .collect();
        assert_eq!(lines[0], vec!["comune", "X", "Y", "Total"]);
        assert_eq!(lines[1], vec!["A", "*", "*", "6"]);
        assert_eq!(lines[3], vec!["C", "10", "10", "20"]);
        assert_eq!(lines[4], vec!["Total", "13", "17", "30"]);
        assert!(out.contains("Some values are asterisked to preserve the statistical secret"));
    }

    #[test]
    fn test_protect_json_debug_output() {
        let (_dir, request, config) = fixture(&example_request());
        let (code, out, err) = run_with(&[
            "lodstat", "protect", &request, "--config", &config, "--format", "json", "--debug",
        ]);
        assert_eq!(code, 0, "stderr: {err}");

        let value: serde_json::Value = serde_json::from_str(&out).expect("json output");
        assert_eq!(value["suppressed"], json!(true));
        assert_eq!(value["iterations"], json!(2));
        assert_eq!(value["rows"][0][1], json!("*P(1)"));
        assert_eq!(value["rows"][0][2], json!("*C(5)"));
    }

    #[test]
    fn test_visible_flag_skips_suppression() {
        let (_dir, request, config) = fixture(&example_request());
        let (code, out, _) = run_with(&[
            "lodstat", "protect", &request, "--config", &config, "--visible",
        ]);
        assert_eq!(code, 0);
        assert!(!out.contains('*'));
    }

    #[test]
    fn test_flat_listing_printed_as_received() {
        let (_dir, request, config) = fixture(&json!({
            "result": {
                "headers": ["comune", "provincia"],
                "rows": [["Arco", "TN"], ["Merano", "BZ"]]
            },
            "dimensions": ["comune"]
        }));
        let (code, out, err) = run_with(&["lodstat", "protect", &request, "--config", &config]);
        assert_eq!(code, 0, "stderr: {err}");

        let lines: Vec<Vec<&str>> = out
            .lines()
            .map(|line| line.split_whitespace().collect())
            .collect();
        assert_eq!(lines[0], vec!["comune", "provincia"]);
        assert_eq!(lines[2], vec!["Merano", "BZ"]);
        assert!(!out.contains("Total"));
    }

    #[test]
    fn test_malformed_rows_fail() {
        let mut request = example_request();
        request["result"]["rows"]
            .as_array_mut()
            .expect("rows")
            .push(json!(["C", "X", "n.d."]));
        let (_dir, request, config) = fixture(&request);

        let (code, out, err) = run_with(&["lodstat", "protect", &request, "--config", &config]);
        assert_eq!(code, EXIT_MALFORMED);
        assert!(out.contains("Total"));
        assert!(err.contains("input row 6 excluded"));
    }

    #[test]
    fn test_engine_errors_reported() {
        let mut request = example_request();
        request["result"]["rows"] = json!([]);
        let (_dir, request, config) = fixture(&request);

        let (code, _, err) = run_with(&["lodstat", "protect", &request, "--config", &config]);
        assert_eq!(code, 1);
        assert!(err.contains("empty result set"));

        let (code, _, err) = run_with(&["lodstat", "protect", "/nonexistent/request.json"]);
        assert_eq!(code, 1);
        assert!(err.contains("error:"));
    }

    #[test]
    fn test_config_prints_effective_settings() {
        let (_dir, _request, config) = fixture(&example_request());
        let (code, out, _) = run_with(&["lodstat", "config", "--config", &config]);
        assert_eq!(code, 0);
        assert!(out.contains("default_threshold = 3.0"));
        assert!(out.contains("[logging]"));
    }
}
