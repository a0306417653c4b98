//! Enumerated attribute types stored as single bytes in the database.
//!
//! Each enum has a fixed token table matching the attribute values the
//! emulator writes in its `-listxml` output. Unknown or absent tokens fall
//! back to the first variant, which is `0` on disk.

macro_rules! token_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal => $token:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[repr(u8)]
        pub enum $name {
            #[default]
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl $name {
            /// Attribute tokens and the variants they decode to.
            pub const TOKENS: &'static [(&'static str, Self)] = &[$( ($token, Self::$variant), )+];

            /// Parse an attribute token.
            pub fn from_token(token: &str) -> Option<Self> {
                Self::TOKENS.iter().find(|(t, _)| *t == token).map(|&(_, v)| v)
            }

            /// Decode the on-disk byte, falling back to the default.
            pub fn from_u8(value: u8) -> Self {
                match value {
                    $( $value => Self::$variant, )+
                    _ => Self::default(),
                }
            }

            /// The attribute token for this value.
            pub fn token(&self) -> &'static str {
                match self {
                    $( Self::$variant => $token, )+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.token())
            }
        }
    };
}

token_enum! {
    /// Dump status of a ROM or disk image.
    pub enum DumpStatus {
        Good = 0 => "good",
        BadDump = 1 => "baddump",
        NoDump = 2 => "nodump",
    }
}

token_enum! {
    /// Whether a software list is original to the machine or compatible.
    pub enum SoftwareListStatus {
        Original = 0 => "original",
        Compatible = 1 => "compatible",
    }
}

token_enum! {
    /// Comparison used by a configuration condition.
    pub enum Relation {
        Eq = 0 => "eq",
        Ne = 1 => "ne",
        Gt = 2 => "gt",
        Le = 3 => "le",
        Lt = 4 => "lt",
        Ge = 5 => "ge",
    }
}

impl Relation {
    /// Evaluate the condition against a masked port value.
    pub fn holds(&self, actual: u32, expected: u32) -> bool {
        match self {
            Self::Eq => actual == expected,
            Self::Ne => actual != expected,
            Self::Gt => actual > expected,
            Self::Le => actual <= expected,
            Self::Lt => actual < expected,
            Self::Ge => actual >= expected,
        }
    }
}

token_enum! {
    /// Area of emulation a feature flag refers to.
    pub enum FeatureType {
        Unknown = 0 => "unknown",
        Protection = 1 => "protection",
        Timing = 2 => "timing",
        Graphics = 3 => "graphics",
        Palette = 4 => "palette",
        Sound = 5 => "sound",
        Capture = 6 => "capture",
        Camera = 7 => "camera",
        Microphone = 8 => "microphone",
        Controls = 9 => "controls",
        Keyboard = 10 => "keyboard",
        Mouse = 11 => "mouse",
        Media = 12 => "media",
        Disk = 13 => "disk",
        Printer = 14 => "printer",
        Tape = 15 => "tape",
        Punch = 16 => "punch",
        Drum = 17 => "drum",
        Rom = 18 => "rom",
        Comms = 19 => "comms",
        Lan = 20 => "lan",
        Wan = 21 => "wan",
    }
}

token_enum! {
    /// How well a feature is emulated.
    pub enum FeatureQuality {
        Unknown = 0 => "unknown",
        Unemulated = 1 => "unemulated",
        Imperfect = 2 => "imperfect",
    }
}

token_enum! {
    /// Kind of chip.
    pub enum ChipType {
        Unknown = 0 => "unknown",
        Cpu = 1 => "cpu",
        Audio = 2 => "audio",
    }
}

token_enum! {
    /// Display technology.
    pub enum DisplayType {
        Unknown = 0 => "unknown",
        Raster = 1 => "raster",
        Vector = 2 => "vector",
        Lcd = 3 => "lcd",
        Svg = 4 => "svg",
    }
}

token_enum! {
    /// Screen rotation in degrees.
    pub enum Rotation {
        Rot0 = 0 => "0",
        Rot90 = 1 => "90",
        Rot180 = 2 => "180",
        Rot270 = 3 => "270",
    }
}

token_enum! {
    /// Overall driver quality.
    pub enum DriverQuality {
        Unknown = 0 => "unknown",
        Good = 1 => "good",
        Imperfect = 2 => "imperfect",
        Preliminary = 3 => "preliminary",
    }
}

/// A boolean that may be absent from the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Tristate {
    False = 0x00,
    True = 0x01,
    #[default]
    Unspecified = 0xFF,
}

impl Tristate {
    /// Decode the on-disk byte. Anything else is treated as unspecified.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => Self::False,
            0x01 => Self::True,
            _ => Self::Unspecified,
        }
    }

    /// Get the value, if specified.
    pub fn as_option(&self) -> Option<bool> {
        match self {
            Self::False => Some(false),
            Self::True => Some(true),
            Self::Unspecified => None,
        }
    }

    /// Get the value, or `default` when unspecified.
    pub fn unwrap_or(&self, default: bool) -> bool {
        self.as_option().unwrap_or(default)
    }

    /// Replace with `value` when present, otherwise keep `self`.
    pub fn or_keep(self, value: Option<bool>) -> Self {
        value.map_or(self, Self::from)
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

impl From<Option<bool>> for Tristate {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Self::Unspecified, Self::from)
    }
}

/// Parse a boolean attribute value.
pub fn parse_bool(token: &str) -> Option<bool> {
    match token {
        "yes" | "1" | "true" => Some(true),
        "no" | "0" | "false" => Some(false),
        _ => None,
    }
}

/// Parse the driver `savestate` attribute.
pub fn parse_supported(token: &str) -> Option<bool> {
    match token {
        "supported" => Some(true),
        "unsupported" => Some(false),
        _ => None,
    }
}
