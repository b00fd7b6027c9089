// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `check` command.

use uabridge::{BridgeConfig, CoercionTable, ItemPath, ItemSpec};

use crate::cli::{CheckArgs, Cli, OutputFormat};
use crate::commands::load_config;
use crate::error::{BinError, BinResult};

/// One checked item.
#[derive(Debug)]
pub(crate) struct CheckedItem<'a> {
    pub spec: &'a ItemSpec,
    pub path: Result<ItemPath, String>,
}

/// Parses every configured item path without contacting a server.
pub(crate) fn check_items(config: &BridgeConfig) -> Vec<CheckedItem<'_>> {
    config
        .items
        .iter()
        .map(|spec| CheckedItem {
            spec,
            path: ItemPath::parse(&spec.path).map_err(|e| e.to_string()),
        })
        .collect()
}

/// Executes the `check` command.
pub fn check(cli: &Cli, args: CheckArgs) -> BinResult<()> {
    let config = load_config(&cli.config)?;
    let table = CoercionTable::standard();
    table
        .validate()
        .map_err(|e| BinError::config(format!("Coercion table incomplete: {}", e)))?;

    let items = check_items(&config);
    let invalid = items.iter().filter(|i| i.path.is_err()).count();

    match args.format {
        OutputFormat::Text => {
            println!("Configuration: {}", cli.config.display());
            println!("  Server: {}", config.server_url);
            println!("  Auto connect: {}", config.auto_connect);
            println!("  Coercion rules: {}", table.len());
            println!("  Items: {}", items.len());
            println!();
            println!(
                "{:>4} {:<20} {:<6} {:<12} {:<8} path",
                "idx", "name", "dir", "type", "kind"
            );
            for (index, item) in items.iter().enumerate() {
                let spec = item.spec;
                let local = match spec.array_size {
                    Some(n) => format!("{}[{}]", spec.local_type, n),
                    None => spec.local_type.to_string(),
                };
                let kind = match &item.path {
                    Ok(path) if path.is_browse() => "browse".to_string(),
                    Ok(_) => "direct".to_string(),
                    Err(_) => "invalid".to_string(),
                };
                print!(
                    "{:>4} {:<20} {:<6} {:<12} {:<8} {}",
                    index,
                    spec.name,
                    direction_name(spec),
                    local,
                    kind,
                    spec.path
                );
                match &item.path {
                    Err(reason) => println!("  ({})", reason),
                    Ok(_) => println!(),
                }
            }
        }
        OutputFormat::Json => {
            let rows: Vec<_> = items
                .iter()
                .map(|item| {
                    serde_json::json!({
                        "name": item.spec.name,
                        "path": item.spec.path,
                        "direction": direction_name(item.spec),
                        "local_type": item.spec.local_type,
                        "array_size": item.spec.array_size,
                        "valid": item.path.is_ok(),
                        "error": item.path.as_ref().err(),
                    })
                })
                .collect();
            let output = serde_json::json!({
                "config_path": cli.config.display().to_string(),
                "server_url": config.server_url,
                "coercion_rules": table.len(),
                "invalid_items": invalid,
                "items": rows,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    if invalid > 0 {
        return Err(BinError::config(format!(
            "{} item path(s) could not be parsed",
            invalid
        )));
    }
    Ok(())
}

fn direction_name(spec: &ItemSpec) -> &'static str {
    if spec.direction.is_output() {
        "output"
    } else {
        "input"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uabridge::{Direction, LocalType};

    #[test]
    fn test_check_items_flags_bad_paths() {
        let config = BridgeConfig::builder("opc.tcp://sim:4840")
            .item(ItemSpec::new("level", "2:Plant.Tank.Level", Direction::Input, LocalType::Float64))
            .item(ItemSpec::new("speed", "2,1", Direction::Output, LocalType::Int32))
            .item(ItemSpec::new("broken", "Plant.Tank", Direction::Input, LocalType::Int32))
            .build()
            .unwrap();

        let items = check_items(&config);
        assert!(items[0].path.as_ref().unwrap().is_browse());
        assert!(!items[1].path.as_ref().unwrap().is_browse());
        assert!(items[2].path.is_err());
    }

    #[test]
    fn test_standard_table_is_complete() {
        assert!(CoercionTable::standard().validate().is_ok());
    }
}
