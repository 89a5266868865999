//! Event-level XML access for the workbook readers.
//!
//! Both package formats store cells as XML. The readers walk events with
//! [`match_xml_events!`], look attributes up on start tags through
//! [`AttributeLookup`], and gather cell text with [`append_text`] or
//! [`XmlReader::read_text`].

use crate::error::ChunkerError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Unknown entity '&{0};'")]
    UnknownEntity(String),

    #[error("Character reference '&{0};' is not a valid character")]
    InvalidCharacter(String),

    #[error("Attribute '{name}' has an unexpected value '{value}'")]
    InvalidAttribute { name: String, value: String },
}

/// Runs `match` over every event of an [`XmlReader`] until the document ends.
/// Events without a matching arm are skipped.
#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(event) = $reader.next()? {
            match event {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}

/// Which character data [`XmlReader::read_text`] keeps
#[derive(Clone, Copy)]
pub(crate) enum TextScope<'a> {
    /// Everything up to the end tag, as in `<v>42</v>`
    Whole,
    /// Text runs inside `text` elements, minus any `ignored` subtree
    Runs { text: QName<'a>, ignored: QName<'a> },
}

impl TextScope<'_> {
    fn opens_run(&self, name: QName) -> bool {
        matches!(self, TextScope::Runs { text, .. } if *text == name)
    }

    fn ignores(&self, name: QName) -> bool {
        matches!(self, TextScope::Runs { ignored, .. } if *ignored == name)
    }
}

/// Pull reader over one XML document with a single reused event buffer
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    pub(crate) fn new(source: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        // Self-closing cells arrive as a start and an end event
        config.expand_empty_elements = true;
        config.trim_text(false);
        XmlReader { reader, buffer: Vec::with_capacity(1024) }
    }

    /// Next event, or `None` once the document is exhausted
    pub(crate) fn next(&mut self) -> Result<Option<Event<'_>>, ChunkerError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer)? {
            Event::Eof => Ok(None),
            event => Ok(Some(event)),
        }
    }

    /// Collects the text of the current element up to `end_tag`, which is consumed.
    pub(crate) fn read_text(&mut self, end_tag: QName, scope: TextScope) -> Result<String, ChunkerError> {
        let mut text = String::new();
        let mut in_run = matches!(scope, TextScope::Whole);
        let mut ignored_depth = 0usize;
        match_xml_events!(self => {
            Event::End(event) if event.name() == end_tag => break,
            Event::Start(event) if scope.ignores(event.name()) => ignored_depth += 1,
            Event::End(event) if scope.ignores(event.name()) => ignored_depth = ignored_depth.saturating_sub(1),
            Event::Start(event) if ignored_depth == 0 && scope.opens_run(event.name()) => in_run = true,
            Event::End(event) if scope.opens_run(event.name()) => in_run = false,
            event if in_run && ignored_depth == 0 => append_text(&mut text, &event)?,
        });
        Ok(text)
    }
}

/// Appends the character data of a text, CDATA or reference event.
/// Other events leave `target` unchanged.
pub(crate) fn append_text(target: &mut String, event: &Event) -> Result<(), ChunkerError> {
    match event {
        Event::Text(text) => target.push_str(&text.xml_content()?),
        Event::CData(data) => target.push_str(&data.xml_content()?),
        Event::GeneralRef(reference) => append_reference(target, &reference.xml_content()?)?,
        _ => (),
    }
    Ok(())
}

/// `name` is the reference body: `amp`, `#65` or `#x41`
fn append_reference(target: &mut String, name: &str) -> Result<(), XmlError> {
    match name.strip_prefix('#') {
        Some(code) => {
            let code = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => code.parse::<u32>().ok(),
            };
            let character = code
                .and_then(char::from_u32)
                .ok_or_else(|| XmlError::InvalidCharacter(name.to_owned()))?;
            target.push(character);
        }
        None => {
            let entity = resolve_xml_entity(name).ok_or_else(|| XmlError::UnknownEntity(name.to_owned()))?;
            target.push_str(entity);
        }
    }
    Ok(())
}

/// Attribute access on start tags, values unescaped
pub(crate) trait AttributeLookup<'a> {
    fn attribute(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, ChunkerError>;

    /// Parses the attribute, failing with [`XmlError::InvalidAttribute`] on a malformed value
    fn attribute_as<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, ChunkerError>;

    /// `true` for `1` or `true` in any case, `false` otherwise or when absent
    fn attribute_flag(&'a self, name: &str) -> Result<bool, ChunkerError>;
}

impl<'a> AttributeLookup<'a> for BytesStart<'a> {
    fn attribute(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, ChunkerError> {
        match self.try_get_attribute(name)? {
            Some(attribute) => Ok(Some(attribute.unescape_value()?)),
            None => Ok(None),
        }
    }

    fn attribute_as<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, ChunkerError> {
        let Some(value) = self.attribute(name)? else {
            return Ok(None);
        };
        value.trim().parse().map(Some).map_err(|_| {
            XmlError::InvalidAttribute { name: name.to_owned(), value: value.into_owned() }.into()
        })
    }

    fn attribute_flag(&'a self, name: &str) -> Result<bool, ChunkerError> {
        Ok(self.attribute(name)?
            .is_some_and(|value| value == "1" || value.eq_ignore_ascii_case("true")))
    }
}
