use std::fs;
use std::io::{BufRead, BufReader};
use std::sync::Arc;

use anyhow::Context;
use spgbuild::config::ConfigOverrides;
use spgbuild::model::RecordAlterOperation;
use spgbuild::{
    BaseRecord, BuilderConfig, BuilderContext, BuilderPipeline, BuilderRecord, InMemoryCatalog,
    JobConfig, ProjectSchema,
};
use tracing_subscriber::EnvFilter;

fn parse_arg(flag: &str) -> Option<String> {
    let mut args = std::env::args();
    while let Some(arg) = args.next() {
        if arg == flag {
            return args.next();
        }
    }
    None
}

fn has_flag(flag: &str) -> bool {
    std::env::args().any(|arg| arg == flag)
}

fn overrides() -> anyhow::Result<ConfigOverrides> {
    let mut overrides = ConfigOverrides {
        job_name: parse_arg("--job-name"),
        graph_store_url: parse_arg("--graph-store"),
        search_engine_url: parse_arg("--search-engine"),
        ..ConfigOverrides::default()
    };
    if let Some(value) = parse_arg("--batch-size") {
        overrides.batch_size = Some(value.parse()?);
    }
    if let Some(value) = parse_arg("--parallelism") {
        overrides.parallelism = Some(value.parse()?);
    }
    if has_flag("--delete") {
        overrides.operation = Some(RecordAlterOperation::Delete);
    }
    Ok(overrides)
}

fn load_records(path: &str) -> anyhow::Result<Vec<BaseRecord>> {
    let file = fs::File::open(path).with_context(|| format!("opening input {path}"))?;
    let mut records = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: BuilderRecord = serde_json::from_str(&line)
            .with_context(|| format!("{path}:{}: invalid record", line_no + 1))?;
        records.push(BaseRecord::Builder(record));
    }
    Ok(records)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let (Some(schema_path), Some(job_path), Some(input_path)) =
        (parse_arg("--schema"), parse_arg("--job"), parse_arg("--input"))
    else {
        eprintln!(
            "usage: spgbuild_run [--config <toml>] --schema <json> --job <json> --input <jsonl> \
             [--job-name <name>] [--batch-size <n>] [--parallelism <n>] \
             [--graph-store <url>] [--search-engine <url>] [--delete]"
        );
        std::process::exit(2);
    };

    let config = BuilderConfig::load(parse_arg("--config").as_deref(), overrides()?)?;
    let schema = ProjectSchema::from_json(&fs::read_to_string(&schema_path)?)?;
    let catalog = Arc::new(InMemoryCatalog::from_schema(schema)?);
    let mut job = JobConfig::from_file(&job_path)?;
    if job.reasoning {
        tracing::warn!("no rule evaluator is bundled; reasoning disabled for this run");
        job.reasoning = false;
    }

    let context = Arc::new(BuilderContext::new(config, catalog));
    let pipeline = BuilderPipeline::build(context, &job)?;
    let report = pipeline.run(load_records(&input_path)?);
    pipeline.close()?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}
