use super::{ElementState, XmlAttributes, XmlTagHandler};
use crate::lotl::country_lotl::CountrySpecificLotl;
use crate::lotl::uris::{EU_TERRITORY, TSL_XML_MIME_TYPE};

#[derive(Debug, Default)]
struct PointerBuilder {
    location: Option<String>,
    territory: Option<String>,
    mime_type: Option<String>,
}

/// Extracts the national trusted-list pointers of the list of trusted lists.
#[derive(Debug, Default)]
pub struct PointersHandler {
    state: ElementState,
    current: Option<PointerBuilder>,
    pointers: Vec<CountrySpecificLotl>,
}

impl PointersHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_pointers(self) -> Vec<CountrySpecificLotl> {
        self.pointers
    }
}

impl XmlTagHandler for PointersHandler {
    fn start_element(&mut self, name: &str, _attributes: &XmlAttributes) {
        if name == "OtherTSLPointer" {
            self.current = Some(PointerBuilder::default());
        }
        self.state.start(name);
    }

    fn end_element(&mut self, name: &str) {
        let text = self.state.end();
        match name {
            "TSLLocation" => {
                if let Some(pointer) = self.current.as_mut() {
                    pointer.location = Some(text);
                }
            }
            "SchemeTerritory" => {
                if let Some(pointer) = self.current.as_mut() {
                    pointer.territory = Some(text);
                }
            }
            "MimeType" => {
                if let Some(pointer) = self.current.as_mut() {
                    pointer.mime_type = Some(text);
                }
            }
            "OtherTSLPointer" => {
                let Some(PointerBuilder {
                    location: Some(location),
                    territory: Some(territory),
                    mime_type: Some(mime_type),
                }) = self.current.take()
                else {
                    return;
                };
                // The list of trusted lists points at itself under EU
                if mime_type == TSL_XML_MIME_TYPE && territory != EU_TERRITORY {
                    self.pointers
                        .push(CountrySpecificLotl::new(territory, location, mime_type));
                }
            }
            _ => {}
        }
    }

    fn characters(&mut self, text: &str) {
        self.state.characters(text);
    }
}
