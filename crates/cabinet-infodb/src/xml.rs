//! Streaming path-keyed XML dispatch.
//!
//! [`XmlParser`] walks a document with quick-xml's pull reader and calls an
//! [`XmlHandler`] whenever an element on a registered path begins or ends.
//! Elements on unregistered paths are skipped along with their subtrees, and
//! character data is only collected for elements with an end registration,
//! so memory use does not grow with the document.

use std::borrow::Cow;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};

use hashbrown::HashMap as FastHashMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;

use crate::types::parse_bool;
use crate::{Error, Result};

type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;

/// Receives begin/end callbacks for registered element paths.
pub trait XmlHandler<K> {
    /// An element on a path registered with [`XmlParser::on_begin`] started.
    fn begin(&mut self, key: K, attributes: &Attributes<'_>) -> Result<()>;

    /// An element on a path registered with [`XmlParser::on_end`] ended.
    fn end(&mut self, key: K, text: String) -> Result<()>;
}

#[derive(Debug)]
struct Node<K> {
    children: FxHashMap<Box<[u8]>, usize>,
    begin: Option<K>,
    end: Option<K>,
}

impl<K> Default for Node<K> {
    fn default() -> Self {
        Self { children: FxHashMap::default(), begin: None, end: None }
    }
}

/// Path-keyed dispatcher over a streaming XML reader.
///
/// Paths are absolute from the document element, e.g.
/// `&["mame", "machine", "rom"]`.
#[derive(Debug)]
pub struct XmlParser<K> {
    nodes: Vec<Node<K>>,
}

impl<K: Copy> Default for XmlParser<K> {
    fn default() -> Self {
        Self::new()
    }
}

struct Frame {
    node: Option<usize>,
    text: Option<String>,
}

impl<K: Copy> XmlParser<K> {
    /// Create a parser with no registrations.
    pub fn new() -> Self {
        Self { nodes: vec![Node::default()] }
    }

    fn node_for(&mut self, path: &[&str]) -> usize {
        let mut current = 0;
        for segment in path {
            let next = self.nodes.len();
            let child = *self.nodes[current]
                .children
                .entry(segment.as_bytes().into())
                .or_insert(next);
            if child == next {
                self.nodes.push(Node::default());
            }
            current = child;
        }
        current
    }

    /// Dispatch `key` to [`XmlHandler::begin`] when any of `paths` starts.
    pub fn on_begin(&mut self, paths: &[&[&str]], key: K) -> &mut Self {
        for path in paths {
            let node = self.node_for(path);
            self.nodes[node].begin = Some(key);
        }
        self
    }

    /// Dispatch `key` to [`XmlHandler::end`] when any of `paths` ends.
    pub fn on_end(&mut self, paths: &[&[&str]], key: K) -> &mut Self {
        for path in paths {
            let node = self.node_for(path);
            self.nodes[node].end = Some(key);
        }
        self
    }

    fn child(&self, parent: Option<&Frame>, name: &[u8]) -> Option<usize> {
        let parent = match parent {
            Some(frame) => frame.node?,
            None => 0,
        };
        self.nodes[parent].children.get(name).copied()
    }

    /// Stream `input` through the registered handlers.
    ///
    /// `cancel` is polled between events; once set, parsing stops with
    /// [`Error::Cancelled`].
    pub fn parse<R, H>(&self, input: R, handler: &mut H, cancel: Option<&AtomicBool>) -> Result<()>
    where
        R: BufRead,
        H: XmlHandler<K>,
    {
        let mut reader = Reader::from_reader(input);
        let mut buf = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();

        loop {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(Error::Cancelled);
            }

            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| Error::xml(reader.error_position() as u64, e.to_string()))?;

            match event {
                Event::Start(e) => {
                    let frame = self.open(&e, stack.last(), handler)?;
                    stack.push(frame);
                }
                Event::Empty(e) => {
                    let frame = self.open(&e, stack.last(), handler)?;
                    self.close(frame, handler)?;
                }
                Event::End(_) => {
                    let frame = stack.pop().ok_or_else(|| {
                        Error::xml(reader.buffer_position() as u64, "unbalanced end tag")
                    })?;
                    self.close(frame, handler)?;
                }
                Event::Text(e) => {
                    if let Some(text) = stack.last_mut().and_then(|f| f.text.as_mut()) {
                        let unescaped = e
                            .unescape()
                            .map_err(|e| Error::xml(reader.buffer_position() as u64, e.to_string()))?;
                        text.push_str(&unescaped);
                    }
                }
                Event::CData(e) => {
                    if let Some(text) = stack.last_mut().and_then(|f| f.text.as_mut()) {
                        text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Event::Eof => {
                    if !stack.is_empty() {
                        return Err(Error::xml(
                            reader.buffer_position() as u64,
                            "unexpected end of document",
                        ));
                    }
                    return Ok(());
                }
                _ => {}
            }
            buf.clear();
        }
    }

    fn open<H: XmlHandler<K>>(
        &self,
        start: &BytesStart<'_>,
        parent: Option<&Frame>,
        handler: &mut H,
    ) -> Result<Frame> {
        let node = self.child(parent, start.name().as_ref());
        let mut text = None;
        if let Some(node) = node.map(|n| &self.nodes[n]) {
            if let Some(key) = node.begin {
                handler.begin(key, &Attributes { start })?;
            }
            if node.end.is_some() {
                text = Some(String::new());
            }
        }
        Ok(Frame { node, text })
    }

    fn close<H: XmlHandler<K>>(&self, frame: Frame, handler: &mut H) -> Result<()> {
        if let Some(key) = frame.node.and_then(|n| self.nodes[n].end) {
            handler.end(key, frame.text.unwrap_or_default())?;
        }
        Ok(())
    }
}

/// Attribute access for the element that just began.
///
/// Malformed values are reported as absent, so callers fall back to their
/// documented defaults.
pub struct Attributes<'a> {
    start: &'a BytesStart<'a>,
}

impl<'a> Attributes<'a> {
    /// Get an attribute value, unescaped.
    pub fn get(&self, name: &str) -> Option<Cow<'a, str>> {
        self.start
            .attributes()
            .flatten()
            .find(|attr| attr.key.as_ref() == name.as_bytes())
            .and_then(|attr| attr.unescape_value().ok())
    }

    /// Get an attribute and parse it with `parse`.
    pub fn get_with<T>(&self, name: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        self.get(name).and_then(|v| parse(&v))
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get_with(name, parse_bool)
    }

    pub fn get_u8(&self, name: &str) -> Option<u8> {
        self.get_with(name, |v| v.parse().ok())
    }

    pub fn get_u32(&self, name: &str) -> Option<u32> {
        self.get_with(name, |v| v.parse().ok())
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get_with(name, |v| v.parse().ok())
    }

    /// Get an unsigned integer written in `radix` without a prefix.
    pub fn get_u64_radix(&self, name: &str, radix: u32) -> Option<u64> {
        self.get_with(name, |v| u64::from_str_radix(v, radix).ok())
    }

    pub fn get_f32(&self, name: &str) -> Option<f32> {
        self.get_with(name, |v| v.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Key {
        Root,
        Item,
        Label,
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl XmlHandler<Key> for Recorder {
        fn begin(&mut self, key: Key, attributes: &Attributes<'_>) -> Result<()> {
            let id = attributes.get("id").unwrap_or_default();
            self.events.push(format!("begin {key:?} {id}"));
            Ok(())
        }

        fn end(&mut self, key: Key, text: String) -> Result<()> {
            self.events.push(format!("end {key:?} {text}"));
            Ok(())
        }
    }

    fn parser() -> XmlParser<Key> {
        let mut parser = XmlParser::new();
        parser
            .on_begin(&[&["root"]], Key::Root)
            .on_begin(&[&["root", "item"], &["root", "alias"]], Key::Item)
            .on_end(&[&["root", "item", "label"]], Key::Label);
        parser
    }

    #[test]
    fn test_dispatch_by_path() {
        let xml = r#"<root id="r">
            <item id="1"><label>One &amp; only</label></item>
            <skip><item id="nested"/></skip>
            <alias id="2"/>
        </root>"#;
        let mut recorder = Recorder::default();
        parser().parse(xml.as_bytes(), &mut recorder, None).unwrap();

        assert_eq!(
            recorder.events,
            vec!["begin Root r", "begin Item 1", "end Label One & only", "begin Item 2"]
        );
    }

    #[test]
    fn test_truncated_document() {
        let xml = r#"<root><item id="1">"#;
        let err = parser().parse(xml.as_bytes(), &mut Recorder::default(), None).unwrap_err();
        assert!(matches!(err, Error::Xml { .. }), "{err}");
    }

    #[test]
    fn test_cancelled() {
        let cancel = AtomicBool::new(true);
        let err = parser()
            .parse("<root/>".as_bytes(), &mut Recorder::default(), Some(&cancel))
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_attribute_parsing() {
        let start = BytesStart::from_content(
            r#"rom size="16384" offset="1f00" flag="yes" bad="12x" rate="59.94""#,
            3,
        );
        let attrs = Attributes { start: &start };
        assert_eq!(attrs.get_u32("size"), Some(16384));
        assert_eq!(attrs.get_u64_radix("offset", 16), Some(0x1F00));
        assert_eq!(attrs.get_bool("flag"), Some(true));
        assert_eq!(attrs.get_u32("bad"), None);
        assert_eq!(attrs.get_u32("missing"), None);
        assert!((attrs.get_f32("rate").unwrap() - 59.94).abs() < 1e-4);
    }
}
