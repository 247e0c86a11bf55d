use sqlbind::config::{default_config_path, load_config};
use sqlbind::{Databases, Result, RowMap, SqlbindError};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

const USAGE: &str = "Usage: sqlbind [config] <client> <sql>";

/// Command-line invocation after argument parsing.
#[derive(Debug, PartialEq)]
struct Invocation {
    config: PathBuf,
    client: String,
    sql: String,
}

fn parse_args(args: &[String]) -> Result<Invocation> {
    let (config, client, sql) = match args {
        [client, sql] => {
            let config = default_config_path()
                .ok_or_else(|| SqlbindError::Config("no default configuration directory".to_string()))?;
            (config, client, sql)
        }
        [config, client, sql] => (PathBuf::from(config), client, sql),
        _ => return Err(SqlbindError::Config(USAGE.to_string())),
    };

    Ok(Invocation {
        config,
        client: client.clone(),
        sql: sql.clone(),
    })
}

fn run(invocation: &Invocation) -> Result<Vec<String>> {
    let config = load_config(&invocation.config)?;
    let client = Databases::open_client(&config, &invocation.client)?;

    let mut rows: Vec<RowMap> = Vec::new();
    client.query(&invocation.sql, &[]).scan(&mut rows)?;
    info!(client = %invocation.client, rows = rows.len(), "query finished");

    let lines = rows
        .iter()
        .map(|row| serde_json::to_string(&row.iter().collect::<BTreeMap<_, _>>()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    client.close()?;
    Ok(lines)
}

fn main() {
    // Logs go to stderr so stdout stays one JSON object per line.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let outcome = parse_args(&args).and_then(|invocation| run(&invocation));

    match outcome {
        Ok(lines) => {
            for line in lines {
                println!("{}", line);
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
