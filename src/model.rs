//! In-memory KML tree.
//!
//! Elements keep their raw qualified name (so prefixes and namespace
//! declarations survive a round trip) next to the resolved namespace URI and
//! local name used for lookups.

/// KML 2.2 default namespace.
pub const KML_NS: &str = "http://www.opengis.net/kml/2.2";

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub key: String,
    /// Unescaped value.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Unescaped character data.
    Text(String),
    CData(String),
    /// Raw comment content, without the `<!--` `-->` delimiters.
    Comment(String),
    /// Raw processing instruction content, without `<?` `?>`.
    ProcessingInstruction(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Qualified name as written in the source, e.g. `kml:Placemark`.
    pub qname: String,
    pub local_name: String,
    pub namespace: Option<String>,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(qname: impl Into<String>, namespace: Option<&str>) -> Self {
        let qname = qname.into();
        let local_name = match qname.split_once(':') {
            Some((_, local)) => local.to_string(),
            None => qname.clone(),
        };
        Self {
            qname,
            local_name,
            namespace: namespace.map(str::to_string),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// True when this element is `{ns}local`.
    pub fn is(&self, ns: &str, local: &str) -> bool {
        self.local_name == local && self.namespace.as_deref() == Some(ns)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// First direct child named `{ns}local`.
    pub fn find_child(&self, ns: &str, local: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.is(ns, local))
    }

    pub fn find_child_mut(&mut self, ns: &str, local: &str) -> Option<&mut Element> {
        self.child_elements_mut().find(|e| e.is(ns, local))
    }

    /// Index into `children` of the first direct child named `{ns}local`.
    pub fn position_child(&self, ns: &str, local: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|node| matches!(node, Node::Element(e) if e.is(ns, local)))
    }

    /// Removes every direct child named `{ns}local`, returning how many went.
    pub fn remove_children(&mut self, ns: &str, local: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|node| !matches!(node, Node::Element(e) if e.is(ns, local)));
        before - self.children.len()
    }

    /// Concatenated text and CDATA directly inside this element.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            match node {
                Node::Text(t) | Node::CData(t) => text.push_str(t),
                _ => {}
            }
        }
        text
    }

    /// Replaces all direct text and CDATA with a single leading text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children
            .retain(|node| !matches!(node, Node::Text(_) | Node::CData(_)));
        let text = text.into();
        if !text.is_empty() {
            self.children.insert(0, Node::Text(text));
        }
    }

    /// Pre-order walk over all descendant elements.
    pub fn walk_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Element),
    {
        for child in self.child_elements_mut() {
            f(child);
            child.walk_mut(f);
        }
    }

    /// Pre-order walk over all descendant elements that stops at the first error.
    pub fn try_walk_mut<F, E>(&mut self, f: &mut F) -> Result<(), E>
    where
        F: FnMut(&mut Element) -> Result<(), E>,
    {
        for child in self.child_elements_mut() {
            f(child)?;
            child.try_walk_mut(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Raw DOCTYPE content, if the source had one.
    pub doctype: Option<String>,
    /// Comments and processing instructions before the root element.
    pub prolog: Vec<Node>,
    pub root: Element,
    /// Comments and processing instructions after the root element.
    pub epilog: Vec<Node>,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self {
            doctype: None,
            prolog: Vec::new(),
            root,
            epilog: Vec::new(),
        }
    }

    /// Pre-order walk over every element, root included.
    pub fn walk_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Element),
    {
        f(&mut self.root);
        self.root.walk_mut(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kml(local: &str) -> Element {
        Element::new(local, Some(KML_NS))
    }

    #[test]
    fn test_local_name_strips_prefix() {
        let e = Element::new("kml:Placemark", Some(KML_NS));
        assert_eq!(e.local_name, "Placemark");
        assert!(e.is(KML_NS, "Placemark"));
        assert!(!e.is("http://example.com/other", "Placemark"));
    }

    #[test]
    fn test_set_text_replaces_text_and_cdata() {
        let mut name = kml("name");
        name.children.push(Node::Text("a".to_string()));
        name.children.push(Node::Comment(" keep ".to_string()));
        name.children.push(Node::CData("b".to_string()));
        assert_eq!(name.text(), "ab");

        name.set_text("c");
        assert_eq!(name.text(), "c");
        assert_eq!(name.children.len(), 2);
        assert_eq!(name.children[0], Node::Text("c".to_string()));
    }

    #[test]
    fn test_remove_children_only_matches_namespace() {
        let mut polygon = kml("Polygon");
        polygon.children.push(Node::Element(kml("altitudeMode")));
        polygon
            .children
            .push(Node::Element(Element::new("altitudeMode", None)));
        polygon.children.push(Node::Element(kml("altitudeMode")));

        assert_eq!(polygon.remove_children(KML_NS, "altitudeMode"), 2);
        assert_eq!(polygon.children.len(), 1);
    }

    #[test]
    fn test_walk_visits_nested_elements_in_order() {
        let mut ring = kml("LinearRing");
        ring.children.push(Node::Element(kml("coordinates")));
        let mut outer = kml("outerBoundaryIs");
        outer.children.push(Node::Element(ring));
        let mut polygon = kml("Polygon");
        polygon.children.push(Node::Element(outer));

        let mut seen = Vec::new();
        polygon.walk_mut(&mut |e: &mut Element| seen.push(e.local_name.clone()));
        assert_eq!(seen, vec!["outerBoundaryIs", "LinearRing", "coordinates"]);
    }

    #[test]
    fn test_try_walk_stops_at_first_error() {
        let mut root = kml("Polygon");
        root.children.push(Node::Element(kml("a")));
        root.children.push(Node::Element(kml("b")));
        root.children.push(Node::Element(kml("c")));

        let mut visited = 0;
        let result = root.try_walk_mut(&mut |e: &mut Element| {
            visited += 1;
            if e.local_name == "b" {
                Err(e.local_name.clone())
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err("b".to_string()));
        assert_eq!(visited, 2);
    }
}
