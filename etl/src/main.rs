use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use std::process;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "config/etl.toml";

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .default_value(DEFAULT_CONFIG)
        .help("Sets a custom config file")
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_etl(config_path: &str) -> anyhow::Result<()> {
    let summary = songplay_etl::run_etl_pipeline(config_path)
        .await
        .with_context(|| format!("ETL pipeline failed (config: {})", config_path))?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn run_query(config_path: &str, sql: &str) -> anyhow::Result<()> {
    let rows = songplay_etl::run_query(config_path, sql)
        .await
        .with_context(|| format!("Query failed: {}", sql))?;

    for row in rows {
        println!("{}", row);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let matches = Command::new("Songplay ETL")
        .version("1.0")
        .about("Builds the songplay star schema from song catalog and event log JSON")
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("etl")
                .about("Run the ETL pipeline")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("query")
                .about("Run SQL against the written star schema")
                .arg(config_arg())
                .arg(
                    Arg::new("sql")
                        .long("sql")
                        .value_name("SQL")
                        .required(true)
                        .help("Query to run, e.g. SELECT hour, COUNT(*) FROM songplays JOIN \"time\" USING (start_time) GROUP BY hour"),
                ),
        )
        .get_matches();

    init_logging(matches.get_flag("json-logs"));

    let result = match matches.subcommand() {
        Some(("etl", etl_matches)) => {
            let config_path = etl_matches
                .get_one::<String>("config")
                .map(|s| s.as_str())
                .unwrap_or(DEFAULT_CONFIG);
            run_etl(config_path).await
        }
        Some(("query", query_matches)) => {
            let config_path = query_matches
                .get_one::<String>("config")
                .map(|s| s.as_str())
                .unwrap_or(DEFAULT_CONFIG);
            match query_matches.get_one::<String>("sql") {
                Some(sql) => run_query(config_path, sql).await,
                None => Err(anyhow::anyhow!("--sql is required")),
            }
        }
        _ => {
            eprintln!("Please specify a valid subcommand. Use --help for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
