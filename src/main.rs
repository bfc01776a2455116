#![warn(rust_2018_idioms)]

use std::{collections::BTreeMap, env, process, sync::Arc};

use http_garage::{
  config::{Config, DEFAULT_CONFIG_FILE},
  door::{Door, Feature, Identifier},
};
use log::LevelFilter;
use serde_json::json;
use simple_logger::SimpleLogger;
use tokio::{
  io::{self, AsyncBufReadExt, BufReader},
  signal,
  task::JoinSet,
};

#[tokio::main]
async fn main() {
  SimpleLogger::new()
    .with_level(LevelFilter::Info)
    .env()
    .with_module_level("reqwest", LevelFilter::Warn)
    .with_module_level("hyper_util", LevelFilter::Warn)
    .init()
    .unwrap();

  let path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
  let config = match Config::load(&path) {
    Ok(config) => config,
    Err(err) => {
      log::error!("{path}: {err}");
      process::exit(1);
    }
  };

  let mut doors = BTreeMap::new();
  for (identifier, door_config) in config.doors {
    // a door that can't be reached is left out, the others still come up
    match Door::initialize(identifier.clone(), door_config).await {
      Ok(door) => {
        doors.insert(identifier, door);
      }
      Err(err) => log::error!("{err}"),
    }
  }
  if doors.is_empty() {
    log::error!("No doors could be initialised");
    process::exit(1);
  }

  // commands run on their own so stdin and Ctrl-C stay responsive while a door is slow
  let doors = Arc::new(doors);
  let mut commands = JoinSet::new();
  let mut lines = BufReader::new(io::stdin()).lines();
  loop {
    tokio::select! {
      line = lines.next_line() => match line {
        Ok(Some(line)) => {
          let doors = Arc::clone(&doors);
          commands.spawn(async move { handle_line(&doors, &line).await });
        }
        Ok(None) => break,
        Err(err) => {
          log::error!("Failed to read commands: {err}");
          break;
        }
      },
      Some(finished) = commands.join_next(), if !commands.is_empty() => {
        if let Err(err) = finished {
          log::error!("Command task failed: {err}");
        }
      }
      _ = signal::ctrl_c() => break,
    }
  }

  commands.shutdown().await;
  if let Ok(mut doors) = Arc::try_unwrap(doors) {
    for door in doors.values_mut() {
      door.shutdown();
    }
  }
}

/// Handle a `<door> <open|close|stop|state>` line
async fn handle_line(doors: &BTreeMap<Identifier, Door>, line: &str) {
  let mut words = line.split_whitespace();
  let (Some(identifier), Some(command)) = (words.next(), words.next())
  else {
    if !line.trim().is_empty() {
      log::warn!("Expected `<door> <open|close|stop|state>`, got: {line}");
    }
    return;
  };

  let Some(door) = doors.get(&Identifier::from(identifier))
  else {
    log::warn!("No door named {identifier}");
    return;
  };

  if command == "state" {
    let snapshot = door.snapshot();
    let report = json!({
      "door": door.identifier(),
      "name": door.name(),
      "unique_id": door.unique_id(),
      "state": door.state(),
      "last_value": snapshot.last_value,
      "last_error": snapshot.last_error.map(|err| err.to_string()),
      "last_update": snapshot.last_update,
    });
    println!("{report}");
    return;
  }

  match command.parse::<Feature>() {
    Ok(feature) => {
      if let Err(err) = door.command(feature).await {
        log::error!("{door} failed to {feature}: {err}");
      }
    }
    Err(()) => log::warn!("Unknown command: {command}"),
  }
}
