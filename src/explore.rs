use normattiva_kb::config::KbConfig;
use normattiva_kb::ingest::{plan_ingest, StoredVersion};
use normattiva_kb::logging::{init_tracing, level_from_env};
use normattiva_kb::references::{extract_references, UrnResolver};
use normattiva_kb::sources::DocumentParser;
use serde_json::json;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

fn main() -> Result<(), DynError> {
    init_tracing(level_from_env());

    let mut args = std::env::args().skip(1).collect::<Vec<_>>();
    let config_path = take_flag(&mut args, "--config");
    if args.is_empty() || args.len() > 2 {
        eprintln!("Usage: explore [--config <kb.json>] <xml_file> [path_substring]");
        std::process::exit(2);
    }
    let xml_path = PathBuf::from(args.remove(0));
    let needle = args.pop().unwrap_or_default();

    let config = match config_path {
        Some(path) => KbConfig::load_from_file(Path::new(&path))?,
        None => KbConfig::default(),
    };
    let parser = DocumentParser::from_config(&config)?;
    let source_name = xml_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string());

    let mut input = BufReader::new(File::open(&xml_path)?);
    let outcome = parser.parse_reader(&mut input, source_name.as_deref())?;
    let no_versions: HashMap<(String, String), StoredVersion> = HashMap::new();
    let plan = plan_ingest(&outcome.document, &no_versions)?;

    let document_urn = outcome
        .document
        .header
        .frbr
        .as_ref()
        .and_then(|f| f.work_urn.clone().or_else(|| f.urn.clone()));
    let mut resolver = UrnResolver::new(config.alias_table(), document_urn.as_deref());
    let aliases = config.alias_table();

    println!(
        "{}",
        json!({
            "dialect": outcome.document.dialect.as_str(),
            "document": plan.document,
            "version": plan.version,
            "status": plan.status,
            "quality": plan.quality,
            "warnings": outcome.warnings,
        })
    );

    for node in plan
        .nodes
        .iter()
        .filter(|n| n.canonical_path.contains(needle.as_str()))
    {
        let references = extract_references(&node.text_clean, &aliases)
            .into_iter()
            .map(|candidate| {
                let resolution = resolver.resolve(&candidate.match_text, &candidate.raw_snippet);
                json!({ "candidate": candidate, "resolution": resolution })
            })
            .collect::<Vec<_>>();
        println!("{}", json!({ "node": node, "references": references }));
    }

    Ok(())
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> Option<String> {
    let index = args.iter().position(|a| a == flag)?;
    if index + 1 >= args.len() {
        return None;
    }
    let value = args.remove(index + 1);
    args.remove(index);
    Some(value)
}
