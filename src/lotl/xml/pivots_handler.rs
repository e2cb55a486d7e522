use super::{ElementState, XmlAttributes, XmlTagHandler};
use crate::lotl::uris::{LOTL_PIVOT_MARKER, OFFICIAL_JOURNAL_MARKER};

/// Collects the pivot and Official Journal URIs of the scheme information,
/// in document order.
#[derive(Debug, Default)]
pub struct PivotsHandler {
    state: ElementState,
    uris: Vec<String>,
}

impl PivotsHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_uris(self) -> Vec<String> {
        self.uris
    }
}

impl XmlTagHandler for PivotsHandler {
    fn start_element(&mut self, name: &str, _attributes: &XmlAttributes) {
        self.state.start(name);
    }

    fn end_element(&mut self, name: &str) {
        let in_scheme_uri = self.state.within("SchemeInformationURI");
        let text = self.state.end();
        if name == "URI"
            && in_scheme_uri
            && (text.contains(LOTL_PIVOT_MARKER) || text.contains(OFFICIAL_JOURNAL_MARKER))
        {
            self.uris.push(text);
        }
    }

    fn characters(&mut self, text: &str) {
        self.state.characters(text);
    }
}
