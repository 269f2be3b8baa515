mod common;

use common::{default_parser, load_fixture, path_text_pairs, paths};
use normattiva_kb::error::{ParseError, ParseWarning};
use normattiva_kb::types::Dialect;

const ART_1: &str = "akomaNtoso/act/body/article:art_1";
const ART_2: &str = "akomaNtoso/act/body/article:art_2";

#[test]
fn emits_structural_nodes_in_document_order() {
    let xml = load_fixture("akn_legge_212_2000.xml");
    let outcome = default_parser().parse_document(&xml, Some("legge_212.xml")).unwrap();
    assert_eq!(outcome.document.dialect, Dialect::AkomaNtoso);
    assert!(!outcome.is_partial());
    assert_eq!(
        paths(&outcome),
        vec![
            ART_1.to_string(),
            format!("{ART_1}/paragraph:art_1__para_1"),
            format!("{ART_1}/paragraph:art_1__para_2"),
            ART_2.to_string(),
            format!("{ART_2}/paragraph"),
            format!("{ART_2}/paragraph-2"),
        ]
    );
}

#[test]
fn article_text_excludes_paragraphs() {
    let xml = load_fixture("akn_legge_212_2000.xml");
    let outcome = default_parser().parse_document(&xml, None).unwrap();
    let article = &outcome.document.nodes[0];
    assert_eq!(article.node_type, "article");
    assert_eq!(article.text_clean, "Art. 1 Principi generali");
    assert_eq!(article.heading.as_deref(), Some("Principi generali"));
    assert_eq!(article.level, 3);
    assert_eq!(article.element_id.as_deref(), Some("art_1"));
    assert_eq!(
        article.hierarchy_string.as_deref(),
        Some("Art. art_1")
    );
}

#[test]
fn unknown_and_inline_tags_keep_their_text() {
    let xml = load_fixture("akn_legge_212_2000.xml");
    let outcome = default_parser().parse_document(&xml, None).unwrap();
    let paragraph = &outcome.document.nodes[2];
    assert_eq!(
        paragraph.text_clean,
        "2. Si applica il TUIR come integrato dalla legge."
    );
    assert_eq!(paragraph.mentions.len(), 1);
    assert_eq!(paragraph.mentions[0].href, "/akn/it/act/dpr/stato/1986-12-22/917");
    assert_eq!(paragraph.mentions[0].text, "TUIR");
    assert_eq!(
        paragraph.hierarchy_string.as_deref(),
        Some("Art. art_1 > Comma art_1__para_2")
    );
}

#[test]
fn header_comes_from_frbr_identification() {
    let xml = load_fixture("akn_legge_212_2000.xml");
    let outcome = default_parser().parse_document(&xml, None).unwrap();
    let header = &outcome.document.header;
    assert_eq!(header.canonical_doc, "legge:212:2000");
    assert_eq!(header.doc_type, "legge");
    assert_eq!(header.number, Some(212));
    assert_eq!(header.year, Some(2000));
    assert_eq!(header.authority.as_deref(), Some("stato"));
    assert_eq!(
        header.version_tag.as_deref(),
        Some("/akn/it/act/legge/stato/2000-07-27/212/ita@2020-01-01")
    );
    assert_eq!(header.valid_from.map(|d| d.to_string()).as_deref(), Some("2020-01-01"));
    let frbr = header.frbr.as_ref().unwrap();
    assert_eq!(frbr.publication_date.as_deref(), Some("2020-02-01"));
}

#[test]
fn streaming_matches_in_memory() {
    let xml = load_fixture("akn_legge_212_2000.xml");
    let parser = default_parser();
    let akoma = parser.parser_for(Dialect::AkomaNtoso);
    let tree = akoma.parse_str(&xml, None).unwrap();
    let stream = akoma.parse_stream(&mut xml.as_bytes(), None).unwrap();
    assert_eq!(path_text_pairs(&tree), path_text_pairs(&stream));
    assert_eq!(tree.document.header, stream.document.header);
    let headings = |o: &normattiva_kb::types::ParseOutcome| {
        o.document
            .nodes
            .iter()
            .map(|n| n.heading.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(headings(&tree), headings(&stream));
}

#[test]
fn reader_entry_point_streams() {
    let xml = load_fixture("akn_legge_212_2000.xml");
    let parser = default_parser();
    let from_reader = parser.parse_reader(&mut xml.as_bytes(), None).unwrap();
    let from_str = parser.parse_document(&xml, None).unwrap();
    assert_eq!(path_text_pairs(&from_reader), path_text_pairs(&from_str));
}

#[test]
fn repeated_parse_gives_identical_nodes() {
    let xml = load_fixture("akn_legge_212_2000.xml");
    let parser = default_parser();
    let first = parser.parse_document(&xml, None).unwrap();
    let second = parser.parse_document(&xml, None).unwrap();
    assert_eq!(first.document.nodes, second.document.nodes);
}

#[test]
fn mismatched_tag_recovers_with_warning() {
    let xml = r#"<akomaNtoso><act><body>
        <article eId="art_1"><paragraph eId="p1"><content><p>Testo <b>grassetto</p></content></paragraph></article>
        <article eId="art_2"><paragraph eId="p1"><content><p>Dopo.</p></content></paragraph></article>
    </body></act></akomaNtoso>"#;
    let parser = default_parser();
    let akoma = parser.parser_for(Dialect::AkomaNtoso);
    for outcome in [
        akoma.parse_str(xml, None).unwrap(),
        akoma.parse_stream(&mut xml.as_bytes(), None).unwrap(),
    ] {
        assert!(outcome.is_partial());
        assert!(outcome
            .warnings
            .iter()
            .any(|w| matches!(w, ParseWarning::MalformedInput { .. })));
        let texts: Vec<&str> = outcome
            .document
            .nodes
            .iter()
            .map(|n| n.text_clean.as_str())
            .collect();
        assert_eq!(texts, vec!["Testo grassetto", "Dopo."]);
    }
}

#[test]
fn truncated_input_keeps_what_was_read() {
    let xml = r#"<akomaNtoso><act><body><article eId="art_1"><paragraph><content><p>Interrotto"#;
    let outcome = default_parser().parse_document(xml, None).unwrap();
    assert!(outcome.is_partial());
    assert_eq!(paths(&outcome), vec!["akomaNtoso/act/body/article:art_1/paragraph"]);
    assert_eq!(outcome.document.nodes[0].text_clean, "Interrotto");
}

#[test]
fn document_without_elements_is_fatal() {
    let parser = default_parser();
    let akoma = parser.parser_for(Dialect::AkomaNtoso);
    assert!(matches!(
        akoma.parse_str("solo testo", None),
        Err(ParseError::NotWellFormed { .. })
    ));
    assert!(matches!(
        akoma.parse_stream(&mut "".as_bytes(), None),
        Err(ParseError::NotWellFormed { .. })
    ));
}

#[test]
fn empty_body_warns_but_succeeds() {
    let xml = "<akomaNtoso><act><body/></act></akomaNtoso>";
    let outcome = default_parser().parse_document(xml, None).unwrap();
    assert!(outcome.document.nodes.is_empty());
    assert_eq!(outcome.warnings, vec![ParseWarning::EmptyDocument]);
}

#[test]
fn metadata_text_never_reaches_nodes() {
    let xml = r#"<akomaNtoso><act>
        <meta><proprietary>interno</proprietary></meta>
        <body><article eId="a"><content><p>Visibile <eli>nascosto</eli></p></content></article></body>
    </act></akomaNtoso>"#;
    let outcome = default_parser().parse_document(xml, None).unwrap();
    assert_eq!(outcome.document.nodes.len(), 1);
    assert_eq!(outcome.document.nodes[0].text_clean, "Visibile");
}

#[test]
fn text_after_a_nested_unit_is_not_glued() {
    let xml = r#"<akomaNtoso><act><body>
        <article eId="a1">Prima<paragraph eId="p1"><p>interno</p></paragraph>dopo</article>
        <article eId="a2"><p>x</p><wrapper>y<article eId="a3">z</article>w</wrapper></article>
    </body></act></akomaNtoso>"#;
    let parser = default_parser();
    let akoma = parser.parser_for(Dialect::AkomaNtoso);
    for outcome in [
        akoma.parse_str(xml, None).unwrap(),
        akoma.parse_stream(&mut xml.as_bytes(), None).unwrap(),
    ] {
        assert_eq!(
            path_text_pairs(&outcome),
            vec![
                ("akomaNtoso/act/body/article:a1".to_string(), "Prima dopo".to_string()),
                (
                    "akomaNtoso/act/body/article:a1/paragraph:p1".to_string(),
                    "interno".to_string()
                ),
                ("akomaNtoso/act/body/article:a2".to_string(), "x y w".to_string()),
                (
                    "akomaNtoso/act/body/article:a2/wrapper/article:a3".to_string(),
                    "z".to_string()
                ),
            ]
        );
    }
}

#[test]
fn reader_finds_root_past_a_long_prolog() {
    let xml = format!(
        "<?xml version=\"1.0\"?>\n<!-- {} -->\n<akomaNtoso><act><body>\
         <article eId=\"a1\"><p>Testo.</p></article></body></act></akomaNtoso>",
        "prologo ".repeat(200)
    );
    let parser = default_parser();
    let mut input = std::io::BufReader::with_capacity(64, xml.as_bytes());
    let outcome = parser.parse_reader(&mut input, None).unwrap();
    assert_eq!(outcome.document.dialect, Dialect::AkomaNtoso);
    assert_eq!(paths(&outcome), vec!["akomaNtoso/act/body/article:a1"]);
    assert_eq!(outcome.document.nodes[0].text_clean, "Testo.");
}
