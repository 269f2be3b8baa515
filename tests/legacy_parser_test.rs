mod common;

use common::{default_parser, load_fixture, path_text_pairs, paths};
use normattiva_kb::error::ParseWarning;
use normattiva_kb::types::{Dialect, ParseOutcome};

fn parse_fixture() -> ParseOutcome {
    let xml = load_fixture("legacy_dpr_917_1986.xml");
    default_parser()
        .parse_document(&xml, Some("dpr_917_1986.xml"))
        .unwrap()
}

fn node<'a>(outcome: &'a ParseOutcome, path: &str) -> &'a normattiva_kb::types::ParsedNode {
    outcome
        .document
        .nodes
        .iter()
        .find(|n| n.canonical_path == path)
        .unwrap_or_else(|| panic!("no node at {path}"))
}

#[test]
fn walks_units_in_document_order() {
    let outcome = parse_fixture();
    assert_eq!(outcome.document.dialect, Dialect::Legacy);
    assert_eq!(
        paths(&outcome),
        vec![
            "atto/preambolo",
            "art:1",
            "art:1/c:1",
            "art:1/c:1/lett:a",
            "art:1/c:1/lett:b",
            "art:1/c:1/lett:b/num:1",
            "art:1/c:1/lett:b/num:2",
            "art:1-bis",
            "art:1-bis/c:1",
            "art:1-bis/c:1-bis",
            "art:2",
            "art:4",
            "allegato:A",
            "allegato:A/tabella:1",
            "nota:1",
        ]
    );
}

#[test]
fn meta_block_fills_header() {
    let header = parse_fixture().document.header;
    assert_eq!(header.canonical_doc, "dpr:917:1986");
    assert_eq!(header.doc_type, "dpr");
    assert_eq!(header.number, Some(917));
    assert_eq!(header.year, Some(1986));
    assert_eq!(header.title.as_deref(), Some("Testo unico delle imposte sui redditi"));
    assert_eq!(header.version_tag.as_deref(), Some("vigente-2024"));
    assert_eq!(header.valid_from.map(|d| d.to_string()).as_deref(), Some("1986-12-22"));
    assert_eq!(header.valid_to, None);
    assert_eq!(header.source_name.as_deref(), Some("dpr_917_1986.xml"));
}

#[test]
fn each_unit_keeps_only_its_own_text() {
    let outcome = parse_fixture();
    let article = node(&outcome, "art:1");
    assert_eq!(article.text_clean, "");
    assert_eq!(article.heading.as_deref(), Some("Presupposto dell'imposta"));
    assert_eq!(article.label, "Art. 1");

    assert_eq!(
        node(&outcome, "art:1/c:1").text_clean,
        "Presupposto dell'imposta sul reddito delle persone fisiche è il possesso di redditi."
    );
    assert_eq!(
        node(&outcome, "art:1/c:1/lett:b").text_clean,
        "redditi di capitale, tra cui:"
    );
    assert_eq!(node(&outcome, "art:1/c:1/lett:b/num:2").text_clean, "dividendi;");
    assert_eq!(
        node(&outcome, "allegato:A").text_clean,
        "Allegato con tabelle."
    );
    assert_eq!(
        node(&outcome, "allegato:A/tabella:1").text_clean,
        "Aliquote: 23%, 25%, 35%."
    );
}

#[test]
fn article_without_commas_is_not_split() {
    let outcome = parse_fixture();
    let article = node(&outcome, "art:2");
    assert_eq!(article.text_clean, "Articolo senza commi, con testo proprio.");
    assert!(!outcome
        .document
        .nodes
        .iter()
        .any(|n| n.canonical_path.starts_with("art:2/")));
}

#[test]
fn labels_levels_and_breadcrumbs() {
    let outcome = parse_fixture();
    let numero = node(&outcome, "art:1/c:1/lett:b/num:2");
    assert_eq!(numero.node_type, "numero");
    assert_eq!(numero.label, "num. 2");
    assert_eq!(numero.level, 3);
    assert_eq!(numero.sort_key, "art:1_c:1_lett:b_num:2");
    assert_eq!(
        numero.hierarchy_string.as_deref(),
        Some("Art. 1 > Comma 1 > lett. b > n. 2")
    );

    let preambolo = node(&outcome, "atto/preambolo");
    assert_eq!(preambolo.node_type, "atto_preambolo");
    assert_eq!(preambolo.hierarchy_string.as_deref(), Some("Atto > Preambolo"));

    let tabella = node(&outcome, "allegato:A/tabella:1");
    assert_eq!(tabella.label, "Tabella 1");
    assert_eq!(
        tabella.hierarchy_string.as_deref(),
        Some("Allegato A > Tabella 1")
    );
}

#[test]
fn missing_article_id_is_reported() {
    let outcome = parse_fixture();
    assert_eq!(
        outcome.warnings,
        vec![ParseWarning::AmbiguousArticleId {
            unit: "articolo".to_string(),
            raw: None,
            assigned: "4".to_string(),
        }]
    );
    assert!(outcome.is_partial());
}

#[test]
fn duplicate_comma_ids_stay_distinct() {
    let xml = r#"<documento>
        <articolo id="3">
            <comma id="1">Primo.</comma>
            <comma id="1">Ripetuto.</comma>
        </articolo>
    </documento>"#;
    let outcome = default_parser().parse_document(xml, None).unwrap();
    assert_eq!(paths(&outcome), vec!["art:3/c:1", "art:3/c:1-2"]);
    assert_eq!(outcome.document.header.canonical_doc, "altro:0:0");
    assert!(matches!(
        &outcome.warnings[..],
        [ParseWarning::AmbiguousArticleId { unit, .. }] if unit == "comma"
    ));
}

#[test]
fn streaming_matches_in_memory() {
    let xml = load_fixture("legacy_dpr_917_1986.xml");
    let parser = default_parser();
    let legacy = parser.parser_for(Dialect::Legacy);
    let tree = legacy.parse_str(&xml, None).unwrap();
    let stream = legacy.parse_stream(&mut xml.as_bytes(), None).unwrap();
    assert_eq!(path_text_pairs(&tree), path_text_pairs(&stream));
    assert_eq!(paths(&tree), paths(&stream));
    assert_eq!(tree.document.header, stream.document.header);
    assert_eq!(tree.warnings, stream.warnings);
}

#[test]
fn streaming_threshold_switches_mode() {
    let xml = load_fixture("legacy_dpr_917_1986.xml");
    let mut config = normattiva_kb::config::KbConfig::default();
    config.streaming_threshold_bytes = 10;
    let streaming = normattiva_kb::sources::DocumentParser::from_config(&config).unwrap();
    let outcome = streaming.parse_document(&xml, None).unwrap();
    assert_eq!(
        path_text_pairs(&outcome),
        path_text_pairs(&default_parser().parse_document(&xml, None).unwrap())
    );
}

#[test]
fn text_after_a_nested_unit_is_not_glued() {
    let xml = r#"<documento>
        <articolo id="1">Testo<comma id="1">uno</comma>seguito</articolo>
        <articolo id="2"><comma id="1">Alfa<lettera id="a">beta</lettera>gamma</comma></articolo>
    </documento>"#;
    let parser = default_parser();
    let legacy = parser.parser_for(Dialect::Legacy);
    for outcome in [
        legacy.parse_str(xml, None).unwrap(),
        legacy.parse_stream(&mut xml.as_bytes(), None).unwrap(),
    ] {
        let texts: Vec<(&str, &str)> = outcome
            .document
            .nodes
            .iter()
            .map(|n| (n.canonical_path.as_str(), n.text_clean.as_str()))
            .collect();
        assert_eq!(
            texts,
            vec![
                ("art:1", "Testo seguito"),
                ("art:1/c:1", "uno"),
                ("art:2/c:1", "Alfa gamma"),
                ("art:2/c:1/lett:a", "beta"),
            ]
        );
    }
}
