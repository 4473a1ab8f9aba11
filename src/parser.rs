use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;

use crate::error::{Error, Result};
use crate::model::{Attribute, Document, Element, Node};

/// Reads a whole XML document into memory.
///
/// Whitespace-only text between elements is dropped so that the writer can
/// re-indent the output without blank-text artifacts. Non-blank text is kept
/// verbatim.
pub fn parse_document<R: BufRead>(input: R) -> Result<Document> {
    let mut reader = NsReader::from_reader(input);
    let mut buf = Vec::new();

    let mut doctype = None;
    let mut prolog = Vec::new();
    let mut epilog = Vec::new();
    let mut root: Option<Element> = None;
    let mut stack: Vec<Element> = Vec::new();

    loop {
        let (resolved, event) = reader.read_resolved_event_into(&mut buf)?;
        let node = match event {
            Event::Start(e) => {
                stack.push(start_element(resolved, &e)?);
                None
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    Error::MalformedDocument("closing tag without an open element".to_string())
                })?;
                Some(Node::Element(element))
            }
            Event::Empty(e) => Some(Node::Element(start_element(resolved, &e)?)),
            Event::Text(e) => {
                let text = e.unescape()?;
                if text.trim().is_empty() {
                    None
                } else {
                    Some(Node::Text(text.into_owned()))
                }
            }
            Event::CData(e) => Some(Node::CData(std::str::from_utf8(&e)?.to_string())),
            Event::Comment(e) => Some(Node::Comment(std::str::from_utf8(&e)?.to_string())),
            Event::PI(e) => Some(Node::ProcessingInstruction(
                std::str::from_utf8(&e)?.to_string(),
            )),
            Event::DocType(e) => {
                doctype = Some(std::str::from_utf8(&e)?.trim().to_string());
                None
            }
            Event::Decl(_) => None,
            Event::Eof => break,
        };

        if let Some(node) = node {
            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => match node {
                    Node::Element(element) => {
                        if root.is_some() {
                            return Err(Error::MalformedDocument(format!(
                                "second root element <{}>",
                                element.qname
                            )));
                        }
                        root = Some(element);
                    }
                    Node::Text(text) | Node::CData(text) => {
                        return Err(Error::MalformedDocument(format!(
                            "text outside of the root element: {:?}",
                            text
                        )));
                    }
                    other if root.is_some() => epilog.push(other),
                    other => prolog.push(other),
                },
            }
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(Error::MalformedDocument(format!(
            "unexpected end of document inside <{}>",
            open.qname
        )));
    }
    let root =
        root.ok_or_else(|| Error::MalformedDocument("document has no root element".to_string()))?;

    tracing::debug!("Parsed document with root <{}>", root.qname);

    Ok(Document {
        doctype,
        prolog,
        root,
        epilog,
    })
}

fn start_element(resolved: ResolveResult, start: &BytesStart) -> Result<Element> {
    let qname = std::str::from_utf8(start.name().as_ref())?.to_string();
    let namespace = match resolved {
        ResolveResult::Bound(Namespace(uri)) => Some(std::str::from_utf8(uri)?.to_string()),
        ResolveResult::Unbound => None,
        ResolveResult::Unknown(prefix) => {
            return Err(Error::MalformedDocument(format!(
                "undeclared namespace prefix '{}' on <{}>",
                String::from_utf8_lossy(&prefix),
                qname
            )));
        }
    };

    let mut element = Element::new(qname, namespace.as_deref());
    for attr in start.attributes() {
        let attr = attr?;
        element.attributes.push(Attribute {
            key: std::str::from_utf8(attr.key.as_ref())?.to_string(),
            value: attr.unescape_value()?.into_owned(),
        });
    }
    Ok(element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KML_NS;

    fn parse(xml: &str) -> Result<Document> {
        parse_document(xml.as_bytes())
    }

    #[test]
    fn test_parse_resolves_default_namespace() {
        let doc = parse(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark><name> 123 </name></Placemark>
  </Document>
</kml>"#,
        )
        .unwrap();

        assert!(doc.root.is(KML_NS, "kml"));
        let document = doc.root.find_child(KML_NS, "Document").unwrap();
        let placemark = document.find_child(KML_NS, "Placemark").unwrap();
        let name = placemark.find_child(KML_NS, "name").unwrap();
        assert_eq!(name.text(), " 123 ");
    }

    #[test]
    fn test_parse_resolves_prefixed_namespace() {
        let doc = parse(
            r#"<k:kml xmlns:k="http://www.opengis.net/kml/2.2"><k:Placemark/><Placemark/></k:kml>"#,
        )
        .unwrap();

        let children: Vec<_> = doc.root.child_elements().collect();
        assert_eq!(children.len(), 2);
        assert!(children[0].is(KML_NS, "Placemark"));
        assert_eq!(children[0].qname, "k:Placemark");
        assert_eq!(children[1].namespace, None);
    }

    #[test]
    fn test_parse_drops_blank_text_only() {
        let doc = parse("<a>\n  <b>  x  </b>\n  <c/>\n</a>").unwrap();
        assert_eq!(doc.root.children.len(), 2);
        assert_eq!(child(&doc.root, "b").text(), "  x  ");
    }

    #[test]
    fn test_parse_keeps_comments_attributes_and_cdata() {
        let doc = parse(
            r#"<!-- head --><a id="x &amp; y"><!-- inner --><d><![CDATA[<b>bold</b>]]></d></a><!-- tail -->"#,
        )
        .unwrap();

        assert_eq!(doc.prolog, vec![Node::Comment(" head ".to_string())]);
        assert_eq!(doc.epilog, vec![Node::Comment(" tail ".to_string())]);
        assert_eq!(doc.root.attribute("id"), Some("x & y"));
        assert_eq!(doc.root.children[0], Node::Comment(" inner ".to_string()));
        assert_eq!(child(&doc.root, "d").text(), "<b>bold</b>");
    }

    #[test]
    fn test_parse_rejects_mismatched_tags() {
        assert!(parse("<a><b></a>").is_err());
    }

    #[test]
    fn test_parse_rejects_unclosed_document() {
        assert!(parse("<a><b></b>").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_input() {
        let err = parse("").unwrap_err();
        assert!(err.to_string().contains("no root element"));
    }

    #[test]
    fn test_parse_rejects_text_outside_root() {
        assert!(parse("garbage").is_err());
    }

    fn child<'a>(parent: &'a Element, local: &str) -> &'a Element {
        parent
            .child_elements()
            .find(|e| e.local_name == local)
            .unwrap()
    }
}
