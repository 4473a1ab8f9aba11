use std::io::Write;

use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::Result;
use crate::model::{Document, Element, Node};

const INDENT_SIZE: usize = 2;

/// Serializes a [`Document`] as indented UTF-8 XML.
#[derive(Default)]
pub struct KmlWriter {}

impl KmlWriter {
    pub fn new() -> Self {
        Self {}
    }

    pub fn write<W: Write>(&self, document: &Document, output: W) -> Result<()> {
        let mut writer = Writer::new_with_indent(output, b' ', INDENT_SIZE);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        if let Some(doctype) = &document.doctype {
            writer.write_event(Event::DocType(BytesText::from_escaped(doctype.as_str())))?;
        }
        for node in &document.prolog {
            self.write_node(&mut writer, node)?;
        }
        self.write_element(&mut writer, &document.root)?;
        for node in &document.epilog {
            self.write_node(&mut writer, node)?;
        }

        let mut output = writer.into_inner();
        output.write_all(b"\n")?;
        output.flush()?;
        Ok(())
    }

    /// Convenience wrapper returning the serialized bytes.
    pub fn to_bytes(&self, document: &Document) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write(document, &mut buf)?;
        Ok(buf)
    }

    fn write_element<W: Write>(&self, writer: &mut Writer<W>, element: &Element) -> Result<()> {
        let mut start = BytesStart::new(element.qname.as_str());
        for attr in &element.attributes {
            start.push_attribute((attr.key.as_str(), attr.value.as_str()));
        }

        if element.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        for child in &element.children {
            self.write_node(writer, child)?;
        }
        writer.write_event(Event::End(BytesEnd::new(element.qname.as_str())))?;
        Ok(())
    }

    fn write_node<W: Write>(&self, writer: &mut Writer<W>, node: &Node) -> Result<()> {
        match node {
            Node::Element(element) => self.write_element(writer, element)?,
            Node::Text(text) => {
                writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(
                    text.as_str(),
                ))))?
            }
            Node::CData(text) => writer.write_event(Event::CData(BytesCData::new(text.as_str())))?,
            Node::Comment(raw) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(raw.as_str())))?
            }
            Node::ProcessingInstruction(raw) => {
                writer.write_event(Event::PI(BytesPI::new(raw.as_str())))?
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribute, KML_NS};
    use crate::parser::parse_document;

    fn render(xml: &str) -> String {
        let document = parse_document(xml.as_bytes()).unwrap();
        String::from_utf8(KmlWriter::new().to_bytes(&document).unwrap()).unwrap()
    }

    #[test]
    fn test_write_indents_and_drops_blank_text() {
        let output = render(
            "<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n\n   <Placemark>   <name>x</name><Polygon></Polygon></Placemark></kml>",
        );

        let expected = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n  \
<Placemark>\n    \
<name>x</name>\n    \
<Polygon/>\n  \
</Placemark>\n\
</kml>\n";
        assert_eq!(output, expected);
    }

    #[test]
    fn test_write_escapes_text_and_attributes() {
        let mut root = Element::new("description", Some(KML_NS));
        root.attributes.push(Attribute {
            key: "title".to_string(),
            value: "a \"b\" & c".to_string(),
        });
        root.children.push(Node::Text("1 < 2 & 3\nnext".to_string()));

        let bytes = KmlWriter::new().to_bytes(&Document::new(root)).unwrap();
        let output = String::from_utf8(bytes).unwrap();
        assert!(output.contains("title=\"a &quot;b&quot; &amp; c\""), "{}", output);
        assert!(output.contains(">1 &lt; 2 &amp; 3\nnext</description>"), "{}", output);
    }

    #[test]
    fn test_write_round_trips_comments_and_prefixes() {
        let source = r#"<!-- registry export -->
<k:kml xmlns:k="http://www.opengis.net/kml/2.2" xmlns:gx="http://www.google.com/kml/ext/2.2">
  <!-- placemarks follow -->
  <k:Placemark><gx:balloonVisibility>1</gx:balloonVisibility></k:Placemark>
  <k:description><![CDATA[<b>x</b>]]></k:description>
</k:kml>"#;
        let output = render(source);

        assert!(output.contains("<!-- registry export -->"));
        assert!(output.contains("<!-- placemarks follow -->"));
        assert!(output.contains("xmlns:gx=\"http://www.google.com/kml/ext/2.2\""));
        assert!(output.contains("<gx:balloonVisibility>1</gx:balloonVisibility>"));
        assert!(output.contains("<![CDATA[<b>x</b>]]>"));

        let reparsed = parse_document(output.as_bytes()).unwrap();
        assert_eq!(reparsed, parse_document(source.as_bytes()).unwrap());
    }
}
