//! Line framing for the worker protocol.
//!
//! Each line the emulator writes to stdout is one of:
//!
//! ```text
//! @OK [text]          terminal success, text may be "STATUS <status .../>"
//! @ERROR message      terminal failure
//! @STATUS <status/>   asynchronous push, may arrive at any time
//! anything else       console noise
//! ```

use crate::status::StatusUpdate;

/// Kind of terminal response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Ok,
    Error,
}

/// Terminal response to a command.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub kind: ResponseKind,
    /// Text after the `@OK` / `@ERROR` token.
    pub text: String,
    /// Status carried by an `@OK STATUS ...` response.
    pub update: Option<StatusUpdate>,
}

impl Response {
    pub fn is_ok(&self) -> bool {
        self.kind == ResponseKind::Ok
    }
}

/// Classification of one line of emulator output.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Response(Response),
    Push(StatusUpdate),
    /// An `@` line that could not be understood.
    Unrecognized(String),
    /// Not part of the protocol.
    Noise,
}

/// Tag attached to a chatter callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatterType {
    Command,
    GoodResponse,
    ErrorResponse,
}

fn strip_token<'a>(line: &'a str, token: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(token)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix(' ')
    }
}

/// Classify a line with its line terminator already removed.
pub fn classify(line: &str) -> Line {
    if !line.starts_with('@') {
        return Line::Noise;
    }

    if let Some(text) = strip_token(line, "@OK") {
        let update = match text.strip_prefix("STATUS ") {
            Some(xml) => match StatusUpdate::parse(xml) {
                Ok(update) => Some(update),
                Err(err) => {
                    tracing::warn!(%err, "ignoring status in @OK response");
                    None
                }
            },
            None => None,
        };
        return Line::Response(Response {
            kind: ResponseKind::Ok,
            text: text.to_owned(),
            update,
        });
    }

    if let Some(text) = strip_token(line, "@ERROR") {
        return Line::Response(Response {
            kind: ResponseKind::Error,
            text: text.to_owned(),
            update: None,
        });
    }

    if let Some(xml) = strip_token(line, "@STATUS") {
        return match StatusUpdate::parse(xml) {
            Ok(update) => Line::Push(update),
            Err(_) => Line::Unrecognized(line.to_owned()),
        };
    }

    Line::Unrecognized(line.to_owned())
}

/// Join arguments into a command line, quoting empty arguments and those
/// containing spaces.
pub fn build_command<S: AsRef<str>>(args: &[S]) -> String {
    let mut command = String::new();
    for arg in args {
        let arg = arg.as_ref();
        if !command.is_empty() {
            command.push(' ');
        }
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            command.push('"');
            command.push_str(arg);
            command.push('"');
        } else {
            command.push_str(arg);
        }
    }
    command.push_str("\r\n");
    command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_ok() {
        match classify("@OK") {
            Line::Response(r) => {
                assert!(r.is_ok());
                assert_eq!(r.text, "");
                assert!(r.update.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }

        match classify(r#"@OK STATUS <status paused="1"/>"#) {
            Line::Response(r) => assert_eq!(r.update.unwrap().paused, Some(true)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_classify_error() {
        match classify("@ERROR Unknown command 'frob'") {
            Line::Response(r) => {
                assert_eq!(r.kind, ResponseKind::Error);
                assert_eq!(r.text, "Unknown command 'frob'");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_classify_push_and_noise() {
        assert!(matches!(classify(r#"@STATUS <status speed_text="99%"/>"#), Line::Push(_)));
        assert!(matches!(classify("@STATUS not xml"), Line::Unrecognized(_)));
        assert!(matches!(classify("@OKAY"), Line::Unrecognized(_)));
        assert_eq!(classify("Loading ROMs..."), Line::Noise);
        assert_eq!(classify(""), Line::Noise);
    }

    #[test]
    fn test_build_command() {
        assert_eq!(build_command(&["pause"]), "pause\r\n");
        assert_eq!(build_command(&["throttle_rate", "0.5"]), "throttle_rate 0.5\r\n");
        assert_eq!(
            build_command(&["load", "cart", "/roms/My Game.bin", ""]),
            "load cart \"/roms/My Game.bin\" \"\"\r\n"
        );
    }
}
