//! EPROM type listing.

use anyhow::Result;
use console::style;
use prompro::EpromType;

use crate::Cli;
use crate::config::Config;

/// Render one catalog entry as a single line of text.
fn describe(eprom: &EpromType, is_default: bool) -> String {
    let segments = eprom
        .segments
        .iter()
        .map(|s| format!("{}@0x{:06X}", s.device_type_id, s.offset))
        .collect::<Vec<_>>()
        .join(" ");
    let segments = if segments.is_empty() {
        "(no segments)".to_string()
    } else {
        segments
    };
    format!(
        "{:<12} {:>7} bytes/segment {:>7} bytes total  {}{}",
        eprom.name,
        eprom.segment_size,
        eprom.image_size(),
        segments,
        if is_default { "  (default)" } else { "" }
    )
}

/// List-types command implementation.
pub(crate) fn cmd_list_types(cli: &Cli, config: &Config, json: bool) -> Result<()> {
    let catalog = config.catalog()?;

    if json {
        let types: Vec<&EpromType> = catalog.iter().collect();
        println!("{}", serde_json::to_string_pretty(&types)?);
        return Ok(());
    }

    if catalog.is_empty() {
        if !cli.quiet {
            eprintln!("{} No EPROM types configured", style("⚠").yellow());
        }
        return Ok(());
    }

    let default = cli
        .eprom
        .as_deref()
        .or(config.defaults.eprom.as_deref());
    for eprom in catalog.iter() {
        println!("{}", describe(eprom, default == Some(eprom.name.as_str())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_segments() {
        let eprom = EpromType::new("27C512", 32768)
            .with_segment("27256", 0)
            .with_segment("27256", 0x8000);
        let line = describe(&eprom, true);
        assert!(line.starts_with("27C512"));
        assert!(line.contains("27256@0x000000 27256@0x008000"));
        assert!(line.contains("65536 bytes total"));
        assert!(line.ends_with("(default)"));
    }

    #[test]
    fn test_describe_empty() {
        let line = describe(&EpromType::new("2716", 2048), false);
        assert!(line.contains("(no segments)"));
        assert!(!line.contains("default"));
    }
}
