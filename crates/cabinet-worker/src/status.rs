//! Emulator status updates.
//!
//! The worker plugin reports its state as a one-line XML fragment:
//!
//! ```text
//! <status paused="0" frameskip="auto" speed_text="100%" throttled="1" throttle_rate="1.0">
//!   <images><image tag="cart" instance_name="cartridge" filename="zork.bin" .../></images>
//! </status>
//! ```
//!
//! Every attribute is optional; a push that omits one leaves the previous
//! value in place.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use cabinet_infodb::parse_bool;

#[cfg(feature = "serde")]
use serde::Serialize;

/// State of one image device.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ImageStatus {
    pub tag: String,
    pub instance_name: String,
    pub is_readable: bool,
    pub is_writeable: bool,
    pub is_createable: bool,
    pub must_be_loaded: bool,
    /// Mounted file, empty when nothing is loaded.
    pub file_name: String,
}

/// A partial status report.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct StatusUpdate {
    pub paused: Option<bool>,
    pub frameskip: Option<String>,
    pub speed_text: Option<String>,
    pub throttled: Option<bool>,
    pub throttle_rate: Option<f32>,
    /// Present only when the report carried an `<images>` element.
    pub images: Option<Vec<ImageStatus>>,
}

/// Error parsing a status fragment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed status: {0}")]
pub struct StatusParseError(pub String);

fn attr(start: &BytesStart<'_>, name: &str) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name.as_bytes())
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

fn attr_bool(start: &BytesStart<'_>, name: &str) -> Option<bool> {
    attr(start, name).and_then(|v| parse_bool(&v))
}

impl StatusUpdate {
    /// Parse a `<status>` fragment.
    pub fn parse(xml: &str) -> Result<Self, StatusParseError> {
        let mut reader = Reader::from_str(xml);
        let mut update = None;

        loop {
            let event = reader.read_event().map_err(|e| StatusParseError(e.to_string()))?;
            match event {
                Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                    b"status" => update = Some(Self::from_element(&e)),
                    b"images" => {
                        if let Some(update) = update.as_mut() {
                            update.images.get_or_insert_with(Vec::new);
                        }
                    }
                    b"image" => {
                        if let Some(images) = update.as_mut().and_then(|u| u.images.as_mut()) {
                            images.push(ImageStatus {
                                tag: attr(&e, "tag").unwrap_or_default(),
                                instance_name: attr(&e, "instance_name").unwrap_or_default(),
                                is_readable: attr_bool(&e, "is_readable").unwrap_or(false),
                                is_writeable: attr_bool(&e, "is_writeable").unwrap_or(false),
                                is_createable: attr_bool(&e, "is_createable").unwrap_or(false),
                                must_be_loaded: attr_bool(&e, "must_be_loaded").unwrap_or(false),
                                file_name: attr(&e, "filename").unwrap_or_default(),
                            });
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        update.ok_or_else(|| StatusParseError("no <status> element".into()))
    }

    fn from_element(e: &BytesStart<'_>) -> Self {
        Self {
            paused: attr_bool(e, "paused"),
            frameskip: attr(e, "frameskip"),
            speed_text: attr(e, "speed_text"),
            throttled: attr_bool(e, "throttled"),
            throttle_rate: attr(e, "throttle_rate").and_then(|v| v.parse().ok()),
            images: None,
        }
    }
}

/// Accumulated emulator state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct StatusState {
    pub paused: bool,
    pub frameskip: String,
    pub speed_text: String,
    pub throttled: bool,
    pub throttle_rate: f32,
    pub images: Vec<ImageStatus>,
}

impl Default for StatusState {
    fn default() -> Self {
        Self {
            paused: false,
            frameskip: String::new(),
            speed_text: String::new(),
            throttled: true,
            throttle_rate: 1.0,
            images: Vec::new(),
        }
    }
}

impl StatusState {
    /// Merge the fields present in `update`.
    pub fn apply(&mut self, update: StatusUpdate) {
        if let Some(paused) = update.paused {
            self.paused = paused;
        }
        if let Some(frameskip) = update.frameskip {
            self.frameskip = frameskip;
        }
        if let Some(speed_text) = update.speed_text {
            self.speed_text = speed_text;
        }
        if let Some(throttled) = update.throttled {
            self.throttled = throttled;
        }
        if let Some(throttle_rate) = update.throttle_rate {
            self.throttle_rate = throttle_rate;
        }
        if let Some(images) = update.images {
            self.images = images;
        }
    }

    /// Find an image device by tag.
    pub fn image(&self, tag: &str) -> Option<&ImageStatus> {
        self.images.iter().find(|image| image.tag == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_status() {
        let update = StatusUpdate::parse(
            r#"<status paused="1" frameskip="auto" speed_text="98%" throttled="0" throttle_rate="0.5"><images><image tag="ext:fdc:wd17xx:0" instance_name="floppydisk1" is_readable="1" is_writeable="1" is_createable="0" must_be_loaded="0" filename="/disks/zork.dsk"/></images></status>"#,
        )
        .unwrap();

        assert_eq!(update.paused, Some(true));
        assert_eq!(update.frameskip.as_deref(), Some("auto"));
        assert_eq!(update.speed_text.as_deref(), Some("98%"));
        assert_eq!(update.throttled, Some(false));
        assert_eq!(update.throttle_rate, Some(0.5));

        let images = update.images.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].instance_name, "floppydisk1");
        assert!(images[0].is_writeable);
        assert!(!images[0].must_be_loaded);
        assert_eq!(images[0].file_name, "/disks/zork.dsk");
    }

    #[test]
    fn test_parse_partial_status() {
        let update = StatusUpdate::parse(r#"<status paused="0"/>"#).unwrap();
        assert_eq!(update, StatusUpdate { paused: Some(false), ..Default::default() });
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(
            StatusUpdate::parse("<paused/>").unwrap_err().to_string(),
            "malformed status: no <status> element"
        );
        assert!(StatusUpdate::parse(r#"<status paused="1"><images></status>"#).is_err());
    }

    #[test]
    fn test_apply_keeps_unreported_fields() {
        let mut state = StatusState::default();
        state.apply(StatusUpdate::parse(r#"<status paused="1" speed_text="100%"><images><image tag="cart"/></images></status>"#).unwrap());
        state.apply(StatusUpdate::parse(r#"<status speed_text="50%"/>"#).unwrap());

        assert!(state.paused);
        assert_eq!(state.speed_text, "50%");
        assert!(state.throttled);
        assert!(state.image("cart").is_some());
    }
}
