use std::path::PathBuf;
use std::process;

use chrono::Utc;
use serde_json::Value;

use lbry_wallet::{
    config::{self, Config},
    load_api_keys, select_api_key, ApiClient, WalletError,
};

fn parse_param(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

async fn run(config: &Config, method: &str, params: Vec<Value>) -> Result<Value, WalletError> {
    let keys = load_api_keys(&config.rpc.auth.keys_path)?;
    let key = select_api_key(&keys, &config.rpc.auth.key_name, Utc::now())?;

    let client = ApiClient::from_config(&config.rpc, key)?;
    let mut session = client.login().await?;

    match method.rsplit_once('.') {
        Some((service, name)) => client.service(service).call(&mut session, name, params).await,
        None => client.call(&mut session, method, params).await,
    }
}

#[tokio::main]
async fn main() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let matches = config::cli().get_matches();

    let data_dir = match config::data_dir(&matches) {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    };
    let conf_path = matches
        .get_one::<String>("conf")
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir.join("lbrynet.conf"));

    let config = match Config::load(&conf_path, &matches) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {}", err);
            process::exit(1);
        }
    };

    let method = matches.get_one::<String>("method").cloned().unwrap_or_default();
    let params = matches
        .get_many::<String>("params")
        .map(|values| values.map(|raw| parse_param(raw)).collect())
        .unwrap_or_default();

    log::info!("Calling {} on {}:{}", method, config.rpc.host, config.rpc.port);
    match run(&config, &method, params).await {
        Ok(result) => match serde_json::to_string_pretty(&result) {
            Ok(pretty) => println!("{}", pretty),
            Err(_) => println!("{}", result),
        },
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    }
}
