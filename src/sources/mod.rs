use crate::config::KbConfig;
use crate::error::{ConfigError, ParseError};
use crate::types::{Dialect, ParseOutcome};
use crate::xml_tree::{SaxEvent, SaxReader};
use std::io::{self, BufRead, Cursor, Read};

pub mod akoma;
pub mod common;
pub mod legacy;

pub const AKN_NAMESPACE_PREFIX: &str = "http://docs.oasis-open.org/legaldocml/ns/akn/";

/// One XML dialect's structural parser.
///
/// `parse_str` builds the whole tree first; `parse_stream` works off the event
/// stream and drops each finished subtree. Both must yield the same nodes.
pub trait StructuralParser: Send + Sync {
    fn dialect(&self) -> Dialect;

    fn parse_str(&self, xml: &str, source_name: Option<&str>) -> Result<ParseOutcome, ParseError>;

    fn parse_stream(
        &self,
        input: &mut dyn BufRead,
        source_name: Option<&str>,
    ) -> Result<ParseOutcome, ParseError>;
}

/// Decide the dialect from the root element. Anything that is not
/// recognisably Akoma Ntoso is treated as legacy.
pub fn sniff_dialect(xml: &str) -> Dialect {
    let mut reader = SaxReader::new(xml.as_bytes());
    match reader.next_event() {
        Ok(Some(event)) => dialect_of_root(&event),
        _ => Dialect::Legacy,
    }
}

fn dialect_of_root(event: &SaxEvent) -> Dialect {
    let SaxEvent::Open { tag_name, attrs } = event else {
        return Dialect::Legacy;
    };
    let akoma_root = tag_name.eq_ignore_ascii_case("akomaNtoso");
    let akoma_ns = attrs.iter().any(|(key, value)| {
        (key == "xmlns" || key.starts_with("xmlns:")) && value.starts_with(AKN_NAMESPACE_PREFIX)
    });
    if akoma_root || akoma_ns {
        Dialect::AkomaNtoso
    } else {
        Dialect::Legacy
    }
}

/// Passes reads through while keeping a copy of every consumed byte.
struct Recorded<'a> {
    inner: &'a mut dyn BufRead,
    consumed: Vec<u8>,
}

impl Read for Recorded<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

impl BufRead for Recorded<'_> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        if let Ok(available) = self.inner.fill_buf() {
            let n = amt.min(available.len());
            self.consumed.extend_from_slice(&available[..n]);
        }
        self.inner.consume(amt);
    }
}

/// Read up to the root start tag and decide the dialect from it.
///
/// Returns the bytes consumed on the way, which the caller replays in front
/// of the rest of `input`.
fn sniff_reader(input: &mut dyn BufRead) -> Result<(Dialect, Vec<u8>), ParseError> {
    let mut recorded = Recorded {
        inner: input,
        consumed: Vec::new(),
    };
    let dialect = {
        let mut reader = SaxReader::new(&mut recorded);
        match reader.next_event()? {
            Some(event) => dialect_of_root(&event),
            None => Dialect::Legacy,
        }
    };
    Ok((dialect, recorded.consumed))
}

/// Dialect dispatch plus the in-memory/streaming choice.
pub struct DocumentParser {
    akoma: akoma::AkomaParser,
    legacy: legacy::LegacyParser,
    streaming_threshold_bytes: u64,
}

impl DocumentParser {
    pub fn from_config(config: &KbConfig) -> Result<Self, ConfigError> {
        let taxonomy = config.taxonomy.build()?;
        let hierarchy = config.hierarchy.formatter();
        Ok(Self {
            akoma: akoma::AkomaParser::new(taxonomy.clone(), hierarchy.clone()),
            legacy: legacy::LegacyParser::new(taxonomy, hierarchy),
            streaming_threshold_bytes: config.streaming_threshold_bytes,
        })
    }

    pub fn parser_for(&self, dialect: Dialect) -> &dyn StructuralParser {
        match dialect {
            Dialect::AkomaNtoso => &self.akoma,
            Dialect::Legacy => &self.legacy,
        }
    }

    /// Parse a document held in memory, streaming it when it exceeds the
    /// configured threshold.
    pub fn parse_document(
        &self,
        xml: &str,
        source_name: Option<&str>,
    ) -> Result<ParseOutcome, ParseError> {
        let parser = self.parser_for(sniff_dialect(xml));
        if xml.len() as u64 > self.streaming_threshold_bytes {
            tracing::debug!(
                "[Parser] {} bytes over threshold, streaming",
                xml.len()
            );
            parser.parse_stream(&mut xml.as_bytes(), source_name)
        } else {
            parser.parse_str(xml, source_name)
        }
    }

    /// Stream a document, sniffing the dialect from its root start tag.
    pub fn parse_reader(
        &self,
        input: &mut dyn BufRead,
        source_name: Option<&str>,
    ) -> Result<ParseOutcome, ParseError> {
        let (dialect, head) = sniff_reader(input)?;
        let mut replay = Cursor::new(head).chain(input);
        self.parser_for(dialect).parse_stream(&mut replay, source_name)
    }
}
