use std::collections::BTreeMap;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ddmcp::{server, telemetry, tools};
use ddmcp_client::DatadogClient;
use ddmcp_core::config::Config;
use ddmcp_core::query::{
    AggregateFormat, AggregateParams, DEFAULT_LIMIT, TraceFormat, TracesParams,
};
use ddmcp_core::time::TimeRange;

#[derive(Parser)]
#[command(name = "ddmcp", version, about = "Datadog trace tools over MCP and the command line")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the MCP server over stdio
    Serve,
    /// Search APM trace spans
    Traces {
        #[arg(long, default_value = "1h")]
        time_range: TimeRange,
        /// Field filter as key=value; repeatable
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
        /// Free-text query ANDed with the filters
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
        /// Pagination cursor from a previous run
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long, default_value = "table")]
        format: TraceFormat,
        /// Fetch every span of each matched trace
        #[arg(long)]
        include_children: bool,
    },
    /// Count trace spans, optionally grouped by fields
    Aggregate {
        #[arg(long, default_value = "1h")]
        time_range: TimeRange,
        /// Field filter as key=value; repeatable
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
        /// Free-text query ANDed with the filters
        #[arg(long)]
        query: Option<String>,
        /// Field to group counts by; repeatable
        #[arg(long = "group-by", value_name = "FIELD")]
        group_by: Vec<String>,
        #[arg(long, default_value = "table")]
        format: AggregateFormat,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing();

    let config = Config::from_env().context("loading Datadog configuration")?;
    let client = DatadogClient::new(config)?;
    let max_pages = client.max_pages_per_trace();

    match cli.command {
        Command::Serve => server::run(&client, max_pages).await,
        Command::Traces {
            time_range,
            filters,
            query,
            limit,
            cursor,
            format,
            include_children,
        } => {
            let params = TracesParams {
                time_range,
                filters: parse_filters(&filters)?,
                query,
                limit,
                cursor,
                format,
                include_children,
            };
            finish(tools::get_traces::handle(&client, max_pages, params).await)
        }
        Command::Aggregate {
            time_range,
            filters,
            query,
            group_by,
            format,
        } => {
            let params = AggregateParams {
                time_range,
                filters: parse_filters(&filters)?,
                query,
                group_by,
                format,
            };
            finish(tools::aggregate_traces::handle(&client, params).await)
        }
    }
}

fn finish(result: tools::ToolResult) -> anyhow::Result<()> {
    if result.is_error {
        eprintln!("{}", result.text);
        std::process::exit(1);
    }
    println!("{}", result.text);
    Ok(())
}

fn parse_filters(raw: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
    let mut filters = BTreeMap::new();
    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .with_context(|| format!("invalid filter '{entry}', expected key=value"))?;
        if key.is_empty() {
            anyhow::bail!("invalid filter '{entry}', key must not be empty");
        }
        filters.insert(key.to_string(), value.to_string());
    }
    Ok(filters)
}
