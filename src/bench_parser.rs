use normattiva_kb::config::KbConfig;
use normattiva_kb::logging::{init_tracing, level_from_env};
use normattiva_kb::sources::{sniff_dialect, DocumentParser};
use normattiva_kb::types::ParseOutcome;
use normattiva_kb::xml_tree::SaxReader;
use std::time::{Duration, Instant};

fn count_sax_events(xml: &str) -> usize {
    let mut reader = SaxReader::new(xml.as_bytes());
    let mut count = 0;
    loop {
        match reader.next_event() {
            Ok(Some(_)) => count += 1,
            Ok(None) => break,
            Err(e) => panic!("XML error at position {}: {}", reader.position(), e),
        }
    }
    count
}

fn summarize(label: &str, durations: &[Duration]) -> f64 {
    let avg = durations.iter().map(|d| d.as_secs_f64()).sum::<f64>() / durations.len() as f64;
    let min = durations
        .iter()
        .map(|d| d.as_secs_f64())
        .fold(f64::INFINITY, f64::min);
    println!("{label} avg: {:.3}s, min: {:.3}s\n", avg, min);
    avg
}

fn path_text_pairs(outcome: &ParseOutcome) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = outcome
        .document
        .nodes
        .iter()
        .map(|n| (n.canonical_path.clone(), n.text_clean.clone()))
        .collect();
    pairs.sort();
    pairs
}

fn main() {
    init_tracing(level_from_env());

    let path = std::env::args().nth(1).expect("Usage: bench_parser <xml_file>");
    let xml = std::fs::read_to_string(&path).expect("Failed to read XML file");
    let config = KbConfig::default();
    let documents = DocumentParser::from_config(&config).expect("Default config is valid");
    let parser = documents.parser_for(sniff_dialect(&xml));
    let source_name = std::path::Path::new(&path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string());

    let iterations = 5;

    // Baseline: just iterate XML events
    let _ = count_sax_events(&xml);
    let mut baseline = Vec::new();
    for i in 0..iterations {
        let start = Instant::now();
        let events = count_sax_events(&xml);
        let elapsed = start.elapsed();
        baseline.push(elapsed);
        println!("Baseline {}: {:.3}s ({} events)", i + 1, elapsed.as_secs_f64(), events);
    }
    let baseline_avg = summarize("Baseline", &baseline);

    let mut in_memory = Vec::new();
    let mut last_tree = None;
    for i in 0..iterations {
        let start = Instant::now();
        let outcome = parser
            .parse_str(&xml, source_name.as_deref())
            .expect("In-memory parse failed");
        let elapsed = start.elapsed();
        in_memory.push(elapsed);
        println!(
            "In-memory {}: {:.3}s ({} nodes, {} warnings)",
            i + 1,
            elapsed.as_secs_f64(),
            outcome.document.nodes.len(),
            outcome.warnings.len()
        );
        last_tree = Some(outcome);
    }
    let tree_avg = summarize("In-memory", &in_memory);

    let mut streaming = Vec::new();
    let mut last_stream = None;
    for i in 0..iterations {
        let start = Instant::now();
        let outcome = parser
            .parse_stream(&mut xml.as_bytes(), source_name.as_deref())
            .expect("Streaming parse failed");
        let elapsed = start.elapsed();
        streaming.push(elapsed);
        println!(
            "Streaming {}: {:.3}s ({} nodes, {} warnings)",
            i + 1,
            elapsed.as_secs_f64(),
            outcome.document.nodes.len(),
            outcome.warnings.len()
        );
        last_stream = Some(outcome);
    }
    let stream_avg = summarize("Streaming", &streaming);

    println!("In-memory overhead vs baseline: {:.1}x", tree_avg / baseline_avg);
    println!("Streaming overhead vs baseline: {:.1}x", stream_avg / baseline_avg);

    if let (Some(tree), Some(stream)) = (last_tree, last_stream) {
        if path_text_pairs(&tree) == path_text_pairs(&stream) {
            println!("Modes agree on {} nodes", tree.document.nodes.len());
        } else {
            eprintln!("Modes disagree: in-memory and streaming produced different nodes");
            std::process::exit(1);
        }
    }
}
