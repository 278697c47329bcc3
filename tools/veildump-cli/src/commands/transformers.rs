//! The `list-transformers` and `show-transformer` commands.

use veildump::Error;
use veildump_transform::TransformerDefinition;

use crate::context::CliContext;
use crate::OutputFormat;

pub fn list(ctx: &CliContext, format: OutputFormat) -> veildump::Result<()> {
    match format {
        OutputFormat::Json => {
            let definitions: Vec<&TransformerDefinition> =
                ctx.registry.iter().map(|definition| definition.as_ref()).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&definitions)
                    .map_err(|e| Error::Config(e.to_string()))?
            );
        }
        OutputFormat::Text => {
            for definition in ctx.registry.iter() {
                println!("{:<16} {}", definition.name, definition.description);
            }
        }
    }
    Ok(())
}

pub fn show(ctx: &CliContext, name: &str, format: OutputFormat) -> veildump::Result<()> {
    let definition = ctx
        .registry
        .get(name)
        .ok_or_else(|| Error::Config(format!("unknown transformer {name:?}")))?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(definition.as_ref())
                    .map_err(|e| Error::Config(e.to_string()))?
            );
        }
        OutputFormat::Text => {
            println!("{}", definition.name);
            println!("  {}", definition.description);
            for parameter in &definition.parameters {
                println!("  parameter {}", parameter.name);
                println!("    description  {}", parameter.description);
                println!("    required     {}", parameter.required);
                if let Some(default) = &parameter.default_value {
                    println!("    default      {default}");
                }
                if let Some(link) = &parameter.link_column_parameter {
                    println!("    linked to    {link}");
                }
                if let Some(cast) = &parameter.cast_db_type {
                    println!("    cast to      {cast}");
                }
                if let Some(properties) = &parameter.column_properties {
                    let allowed = if properties.allowed_types.is_empty() {
                        "any".to_owned()
                    } else {
                        properties.allowed_types.join(", ")
                    };
                    println!("    allowed types      {allowed}");
                    println!("    affected           {}", properties.affected);
                    println!("    skip original data {}", properties.skip_original_data);
                    println!("    skip on null       {}", properties.skip_on_null);
                }
            }
        }
    }
    Ok(())
}
