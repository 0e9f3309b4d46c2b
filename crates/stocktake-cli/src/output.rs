use serde_json::Value;

use crate::cli::OutputFormat;
use crate::commands::CommandOutput;
use crate::error::CliError;

pub fn render(output: &CommandOutput, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(&output.data)?
            } else {
                serde_json::to_string(&output.data)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => render_table(&output.data)?,
    }

    if !output.warnings.is_empty() {
        eprintln!("warnings:");
        for warning in &output.warnings {
            eprintln!("  - {warning}");
        }
    }

    Ok(())
}

fn render_table(data: &Value) -> Result<(), CliError> {
    match data {
        Value::Object(map) => {
            let width = map.keys().map(String::len).max().unwrap_or(0);
            for (key, value) in map {
                match value {
                    Value::Object(_) | Value::Array(_) => {
                        println!("{key:width$}:");
                        let nested = serde_json::to_string_pretty(value)?;
                        for line in nested.lines() {
                            println!("  {line}");
                        }
                    }
                    Value::String(s) => println!("{key:width$}: {s}"),
                    other => println!("{key:width$}: {other}"),
                }
            }
        }
        other => {
            println!("{}", serde_json::to_string_pretty(other)?);
        }
    }
    Ok(())
}
